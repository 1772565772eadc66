use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::billing::{BillingProvider, EntitlementCanceller, EntitlementLookup};
use crate::db::DaoError;
use crate::email::DeletionNotifier;
use crate::erasure::{DeletionCounts, DeletionFailed, ErasurePlan};
use crate::models::deletion_request::DeletionRequest;

/// Storage operations the batch driver needs. Implemented over Postgres by
/// [`crate::db::store::PgErasureStore`].
#[async_trait]
pub trait ErasureStore: EntitlementLookup {
    async fn ready_requests(&self, now: SystemTime) -> Result<Vec<DeletionRequest>, DaoError>;
    /// Read before erasure, since the address goes with the user row.
    async fn user_email(&self, user_id: &str) -> Result<Option<String>, DaoError>;
    async fn claim_request(&self, request_id: Uuid, lease: Duration) -> Result<bool, DaoError>;
    async fn release_claim(&self, request_id: Uuid) -> Result<(), DaoError>;
    async fn erase_user(
        &self,
        request: &DeletionRequest,
        plan: &ErasurePlan,
    ) -> Result<DeletionCounts, DeletionFailed>;
}

#[derive(Debug)]
pub enum JobError {
    DaoFailure(DaoError),
}

impl std::error::Error for JobError {}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::DaoFailure(e) => write!(f, "JobError: {e}"),
        }
    }
}

impl From<DaoError> for JobError {
    fn from(e: DaoError) -> Self {
        JobError::DaoFailure(e)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOutcome {
    pub user_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UserOutcome {
    fn succeeded(user_id: String) -> Self {
        Self {
            user_id,
            success: true,
            error: None,
        }
    }

    fn failed(user_id: String, error: String) -> Self {
        Self {
            user_id,
            success: false,
            error: Some(error),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub errors: usize,
    pub details: Vec<UserOutcome>,
}

impl BatchSummary {
    fn from_outcomes(outcomes: impl IntoIterator<Item = UserOutcome>) -> Self {
        let mut summary = BatchSummary::default();

        for outcome in outcomes {
            if outcome.success {
                summary.processed += 1;
            } else {
                summary.errors += 1;
            }

            summary.details.push(outcome);
        }

        summary
    }
}

/// Erases every user whose deletion request is due. A failure for one user is
/// recorded in the summary and never stops the rest of the batch.
#[derive(Clone)]
pub struct ProcessDeletionsJob {
    store: Arc<dyn ErasureStore>,
    billing_provider: Arc<dyn BillingProvider>,
    notifier: DeletionNotifier,
    plan: Arc<ErasurePlan>,
    claim_lease: Duration,
    max_concurrent_users: usize,
}

impl ProcessDeletionsJob {
    pub fn new(
        store: Arc<dyn ErasureStore>,
        billing_provider: Arc<dyn BillingProvider>,
        notifier: DeletionNotifier,
        plan: Arc<ErasurePlan>,
        claim_lease: Duration,
        max_concurrent_users: usize,
    ) -> Self {
        Self {
            store,
            billing_provider,
            notifier,
            plan,
            claim_lease,
            max_concurrent_users: max_concurrent_users.max(1),
        }
    }

    pub fn name(&self) -> &'static str {
        "Process Deletions"
    }

    pub async fn execute(&self) -> Result<BatchSummary, JobError> {
        let ready_requests = self.store.ready_requests(SystemTime::now()).await?;

        if ready_requests.is_empty() {
            log::info!("{}: no deletion requests are due", self.name());
            return Ok(BatchSummary::default());
        }

        log::info!(
            "{}: {} deletion request(s) due",
            self.name(),
            ready_requests.len()
        );

        let outcomes = stream::iter(ready_requests)
            .map(|request| self.process_request(request))
            .buffered(self.max_concurrent_users)
            .collect::<Vec<_>>()
            .await;

        let summary = BatchSummary::from_outcomes(outcomes.into_iter().flatten());

        log::info!(
            "{}: {} user(s) erased, {} failed",
            self.name(),
            summary.processed,
            summary.errors
        );

        Ok(summary)
    }

    /// Returns `None` when another run holds the request.
    async fn process_request(&self, request: DeletionRequest) -> Option<UserOutcome> {
        match self.store.claim_request(request.id, self.claim_lease).await {
            Ok(true) => (),
            Ok(false) => {
                log::info!(
                    "Deletion request {} for user {} is held by another run; skipping",
                    request.id,
                    request.user_id
                );
                return None;
            }
            Err(e) => {
                log::error!(
                    "Failed to claim deletion request {} for user {}: {}",
                    request.id,
                    request.user_id,
                    e
                );
                return Some(UserOutcome::failed(request.user_id, e.to_string()));
            }
        }

        let user_email = match self.store.user_email(&request.user_id).await {
            Ok(email) => email,
            Err(e) => {
                log::warn!(
                    "Failed to look up email address for user {}; no deletion notice will be sent: {}",
                    request.user_id,
                    e
                );
                None
            }
        };

        EntitlementCanceller::new(self.store.as_ref(), self.billing_provider.as_ref())
            .cancel_for_user(&request.user_id)
            .await;

        match self.store.erase_user(&request, &self.plan).await {
            Ok(counts) => {
                log::info!("Erased user {} ({})", request.user_id, counts);

                // Only the run that removed the user row sends the notice
                if counts.rows_for(self.plan.root_entity()) > 0 {
                    if let Some(user_email) = user_email {
                        self.notifier.notify(&request.user_id, &user_email).await;
                    }
                }

                Some(UserOutcome::succeeded(request.user_id))
            }
            Err(e) => {
                log::error!("User deletion failed for user {}: {}", request.user_id, e);

                if let Err(release_err) = self.store.release_claim(request.id).await {
                    log::warn!(
                        "Failed to release claim on deletion request {}: {}",
                        request.id,
                        release_err
                    );
                }

                Some(UserOutcome::failed(request.user_id, e.to_string()))
            }
        }
    }
}
