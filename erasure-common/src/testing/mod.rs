//! An in-memory [`ErasureStore`] with the same transactional behaviour as the
//! Postgres store: each erasure works on a copy of the tables that only
//! replaces the originals once every statement and the audit record succeed.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::billing::EntitlementLookup;
use crate::db::DaoError;
use crate::erasure::{
    DeletionCounts, DeletionFailed, ErasureOperation, ErasurePlan, ANONYMIZED_SENTINEL,
};
use crate::jobs::ErasureStore;
use crate::models::deletion_request::{DeletionRequest, DeletionStatus};
use crate::models::subscription::ACTIVE_SUBSCRIPTION_STATUSES;

pub type Row = BTreeMap<String, Option<String>>;

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<String, Vec<Row>>,
    requests: Vec<DeletionRequest>,
    failing_entities: HashSet<String>,
    transactions_opened: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("Lock was poisoned")
    }

    pub fn insert_row(&self, table: &str, values: &[(&str, Option<&str>)]) {
        let row = values
            .iter()
            .map(|(column, value)| (String::from(*column), value.map(String::from)))
            .collect::<Row>();

        self.state()
            .tables
            .entry(String::from(table))
            .or_default()
            .push(row);
    }

    pub fn insert_user(&self, user_id: &str) {
        self.insert_row(
            "user",
            &[
                ("id", Some(user_id)),
                ("email", Some(format!("{user_id}@erasure.test").as_str())),
            ],
        );
    }

    pub fn insert_subscription(&self, user_id: &str, status: &str, provider_id: Option<&str>) {
        self.insert_row(
            "subscriptions",
            &[
                ("user_id", Some(user_id)),
                ("status", Some(status)),
                ("stripe_subscription_id", provider_id),
            ],
        );
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn count_where(&self, table: &str, column: &str, value: &str) -> usize {
        self.rows(table)
            .iter()
            .filter(|row| row.get(column).and_then(|v| v.as_deref()) == Some(value))
            .count()
    }

    pub fn add_request(&self, user_id: &str, scheduled_for: SystemTime) -> Uuid {
        let id = Uuid::now_v7();
        self.state().requests.push(DeletionRequest {
            id,
            user_id: String::from(user_id),
            status: DeletionStatus::Pending,
            scheduled_for,
            completed_at: None,
            claimed_until: None,
        });

        id
    }

    pub fn request(&self, request_id: Uuid) -> Option<DeletionRequest> {
        self.state()
            .requests
            .iter()
            .find(|r| r.id == request_id)
            .cloned()
    }

    /// Simulates a lease held by a concurrent run.
    pub fn hold_claim(&self, request_id: Uuid, until: SystemTime) {
        if let Some(request) = self
            .state()
            .requests
            .iter_mut()
            .find(|r| r.id == request_id)
        {
            request.claimed_until = Some(until);
        }
    }

    /// Makes every statement against `entity` fail until cleared.
    pub fn fail_on(&self, entity: &str) {
        self.state().failing_entities.insert(String::from(entity));
    }

    pub fn clear_failures(&self) {
        self.state().failing_entities.clear();
    }

    pub fn transactions_opened(&self) -> usize {
        self.state().transactions_opened
    }
}

fn column_value<'r>(row: &'r Row, column: &str) -> Option<&'r str> {
    row.get(column).and_then(|v| v.as_deref())
}

fn apply(operation: &ErasureOperation, rows: &mut Vec<Row>, user_id: &str) -> usize {
    match operation {
        ErasureOperation::Delete { ownership, .. } => {
            let before = rows.len();
            rows.retain(|row| !ownership.is_owned_by(|c| column_value(row, c), user_id));
            before - rows.len()
        }
        ErasureOperation::Anonymize {
            ownership, scrub, ..
        } => {
            let mut updated = 0;

            for row in rows.iter_mut() {
                let owned = ownership.is_owned_by(|c| column_value(row, c), user_id);
                let already_anonymized = scrub
                    .iter()
                    .all(|c| column_value(row, c) == Some(ANONYMIZED_SENTINEL));

                if owned && !already_anonymized {
                    for column in scrub.iter() {
                        row.insert(
                            String::from(*column),
                            Some(String::from(ANONYMIZED_SENTINEL)),
                        );
                    }
                    updated += 1;
                }
            }

            updated
        }
    }
}

#[async_trait]
impl EntitlementLookup for MemoryStore {
    async fn active_provider_subscription_id(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, DaoError> {
        Ok(self
            .rows("subscriptions")
            .iter()
            .filter(|row| column_value(row, "user_id") == Some(user_id))
            .filter(|row| {
                column_value(row, "status")
                    .map(|s| ACTIVE_SUBSCRIPTION_STATUSES.contains(&s))
                    .unwrap_or(false)
            })
            .find_map(|row| column_value(row, "stripe_subscription_id").map(String::from)))
    }
}

#[async_trait]
impl ErasureStore for MemoryStore {
    async fn ready_requests(&self, now: SystemTime) -> Result<Vec<DeletionRequest>, DaoError> {
        let mut ready = self
            .state()
            .requests
            .iter()
            .filter(|r| r.is_ready(now) && !r.is_claimed(now))
            .cloned()
            .collect::<Vec<_>>();
        ready.sort_by_key(|r| r.scheduled_for);

        Ok(ready)
    }

    async fn user_email(&self, user_id: &str) -> Result<Option<String>, DaoError> {
        Ok(self
            .rows("user")
            .iter()
            .find(|row| column_value(row, "id") == Some(user_id))
            .and_then(|row| column_value(row, "email").map(String::from)))
    }

    async fn claim_request(&self, request_id: Uuid, lease: Duration) -> Result<bool, DaoError> {
        let now = SystemTime::now();
        let mut state = self.state();

        match state.requests.iter_mut().find(|r| r.id == request_id) {
            Some(request)
                if request.status == DeletionStatus::Pending && !request.is_claimed(now) =>
            {
                request.claimed_until = Some(now + lease);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_claim(&self, request_id: Uuid) -> Result<(), DaoError> {
        let mut state = self.state();

        if let Some(request) = state
            .requests
            .iter_mut()
            .find(|r| r.id == request_id && r.status == DeletionStatus::Pending)
        {
            request.claimed_until = None;
        }

        Ok(())
    }

    async fn erase_user(
        &self,
        request: &DeletionRequest,
        plan: &ErasurePlan,
    ) -> Result<DeletionCounts, DeletionFailed> {
        let mut state = self.state();
        state.transactions_opened += 1;

        let mut tables = state.tables.clone();
        let mut counts = DeletionCounts::default();

        for operation in plan.operations() {
            if state.failing_entities.contains(operation.entity()) {
                return Err(DeletionFailed::OperationFailed {
                    entity: operation.entity(),
                    reason: String::from("injected failure"),
                });
            }

            let rows = tables.entry(String::from(operation.entity())).or_default();
            counts.record(operation.entity(), apply(operation, rows, &request.user_id));
        }

        let Some(stored) = state.requests.iter_mut().find(|r| r.id == request.id) else {
            return Err(DeletionFailed::AuditRecordFailed(format!(
                "Deletion request {} could not be marked completed",
                request.id
            )));
        };

        if stored.status == DeletionStatus::Pending {
            stored.status = DeletionStatus::Completed;
            stored.completed_at = Some(SystemTime::now());
            stored.claimed_until = None;
        }

        state.tables = tables;
        Ok(counts)
    }
}
