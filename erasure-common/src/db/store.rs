use async_trait::async_trait;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::billing::EntitlementLookup;
use crate::db::{deletion_request, erasure, subscription, user};
use crate::db::{DaoError, DbAsyncPool};
use crate::erasure::{DeletionCounts, DeletionFailed, ErasurePlan};
use crate::jobs::ErasureStore;
use crate::models::deletion_request::DeletionRequest;

/// The Postgres-backed store the server runs against.
pub struct PgErasureStore {
    db_async_pool: DbAsyncPool,
}

impl PgErasureStore {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }
}

#[async_trait]
impl EntitlementLookup for PgErasureStore {
    async fn active_provider_subscription_id(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, DaoError> {
        subscription::Dao::new(&self.db_async_pool)
            .get_active_provider_subscription_id(user_id)
            .await
    }
}

#[async_trait]
impl ErasureStore for PgErasureStore {
    async fn ready_requests(&self, now: SystemTime) -> Result<Vec<DeletionRequest>, DaoError> {
        deletion_request::Dao::new(&self.db_async_pool)
            .get_all_requests_ready_for_processing(now)
            .await
    }

    async fn user_email(&self, user_id: &str) -> Result<Option<String>, DaoError> {
        user::Dao::new(&self.db_async_pool)
            .get_user_email(user_id)
            .await
    }

    async fn claim_request(&self, request_id: Uuid, lease: Duration) -> Result<bool, DaoError> {
        deletion_request::Dao::new(&self.db_async_pool)
            .claim_request(request_id, lease)
            .await
    }

    async fn release_claim(&self, request_id: Uuid) -> Result<(), DaoError> {
        deletion_request::Dao::new(&self.db_async_pool)
            .release_claim(request_id)
            .await
    }

    async fn erase_user(
        &self,
        request: &DeletionRequest,
        plan: &ErasurePlan,
    ) -> Result<DeletionCounts, DeletionFailed> {
        erasure::Dao::new(&self.db_async_pool)
            .erase_user(request, plan)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::billing::providers::MockBillingProvider;
    use crate::db::test_utils;
    use crate::email::senders::MockSender;
    use crate::email::DeletionNotifier;
    use crate::jobs::ProcessDeletionsJob;
    use crate::models::deletion_request::DeletionStatus;
    use crate::registry::ClassificationRegistry;

    #[ignore]
    #[tokio::test]
    async fn standard_plan_erases_user_end_to_end() {
        let user_id = test_utils::unique_user_id();

        let request_id = {
            let mut conn = test_utils::db_async_conn().await;
            test_utils::insert_user(&mut conn, &user_id).await;
            test_utils::insert_owned_row(&mut conn, "session", "userId", &user_id).await;
            test_utils::insert_owned_row(&mut conn, "tarot_readings", "user_id", &user_id).await;
            test_utils::insert_owned_row(&mut conn, "conversion_events", "user_id", &user_id)
                .await;
            test_utils::insert_consent(&mut conn, &user_id).await;
            test_utils::insert_deletion_request(
                &mut conn,
                &user_id,
                SystemTime::now() - Duration::from_secs(1),
            )
            .await
        };

        let registry = ClassificationRegistry::standard().unwrap();
        let sender = Arc::new(MockSender::new());
        let job = ProcessDeletionsJob::new(
            Arc::new(PgErasureStore::new(test_utils::db_async_pool())),
            Arc::new(MockBillingProvider::new()),
            DeletionNotifier::new(
                sender.clone(),
                "accounts@erasure.test".parse().unwrap(),
                "accounts@erasure.test".parse().unwrap(),
            ),
            Arc::new(ErasurePlan::from_registry(&registry)),
            Duration::from_secs(900),
            1,
        );

        let summary = job.execute().await.unwrap();
        let outcome = summary
            .details
            .iter()
            .find(|d| d.user_id == user_id)
            .unwrap();
        assert!(outcome.success);

        let notified = format!("{user_id}@erasure.test");
        assert!(sender.sent().iter().any(|m| m.destination == notified));

        let mut conn = test_utils::db_async_conn().await;
        for (table, column) in [
            ("user", "id"),
            ("session", "userId"),
            ("tarot_readings", "user_id"),
            ("conversion_events", "user_id"),
        ] {
            assert_eq!(
                test_utils::count_owned_rows(&mut conn, table, column, &user_id).await,
                0
            );
        }
        assert_eq!(
            test_utils::count_owned_rows(&mut conn, "consent_log", "user_id", &user_id).await,
            1
        );
        drop(conn);

        let request = deletion_request::Dao::new(test_utils::db_async_pool())
            .get_request(request_id)
            .await
            .unwrap();
        assert_eq!(request.status, DeletionStatus::Completed);

        test_utils::remove_audit_rows(&user_id).await;
    }
}
