use diesel::{
    dsl, BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::deletion_request::{DeletionRequest, DeletionStatus};

use crate::schema::deletion_requests as deletion_request_fields;
use crate::schema::deletion_requests::dsl::deletion_requests;

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }

    /// Pending requests whose grace period has elapsed and that no other run
    /// currently holds a claim on.
    pub async fn get_all_requests_ready_for_processing(
        &self,
        now: SystemTime,
    ) -> Result<Vec<DeletionRequest>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(deletion_requests
            .select(DeletionRequest::as_select())
            .filter(deletion_request_fields::status.eq(DeletionStatus::Pending))
            .filter(deletion_request_fields::scheduled_for.le(now))
            .filter(
                deletion_request_fields::claimed_until
                    .is_null()
                    .or(deletion_request_fields::claimed_until.le(now)),
            )
            .order(deletion_request_fields::scheduled_for.asc())
            .load(&mut conn)
            .await?)
    }

    /// Takes a lease on a pending request. Returns `false` if the request is no
    /// longer pending or another run holds a live lease.
    pub async fn claim_request(&self, request_id: Uuid, lease: Duration) -> Result<bool, DaoError> {
        let now = SystemTime::now();

        let mut conn = self.db_async_pool.get().await?;
        let claimed = dsl::update(
            deletion_requests
                .filter(deletion_request_fields::id.eq(request_id))
                .filter(deletion_request_fields::status.eq(DeletionStatus::Pending))
                .filter(
                    deletion_request_fields::claimed_until
                        .is_null()
                        .or(deletion_request_fields::claimed_until.le(now)),
                ),
        )
        .set(deletion_request_fields::claimed_until.eq(Some(now + lease)))
        .execute(&mut conn)
        .await?;

        Ok(claimed == 1)
    }

    pub async fn release_claim(&self, request_id: Uuid) -> Result<(), DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        dsl::update(
            deletion_requests
                .filter(deletion_request_fields::id.eq(request_id))
                .filter(deletion_request_fields::status.eq(DeletionStatus::Pending)),
        )
        .set(deletion_request_fields::claimed_until.eq(None::<SystemTime>))
        .execute(&mut conn)
        .await?;

        Ok(())
    }

    pub async fn get_request(&self, request_id: Uuid) -> Result<DeletionRequest, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(deletion_requests
            .find(request_id)
            .select(DeletionRequest::as_select())
            .first(&mut conn)
            .await?)
    }
}

/// Marks a request completed. Runs on the caller's connection so that it can
/// share the erasure transaction; returns the number of requests updated, which
/// is zero if the request was not pending.
pub async fn record_completion(
    conn: &mut AsyncPgConnection,
    request_id: Uuid,
    completed_at: SystemTime,
) -> Result<usize, diesel::result::Error> {
    dsl::update(
        deletion_requests
            .filter(deletion_request_fields::id.eq(request_id))
            .filter(deletion_request_fields::status.eq(DeletionStatus::Pending)),
    )
    .set((
        deletion_request_fields::status.eq(DeletionStatus::Completed),
        deletion_request_fields::completed_at.eq(Some(completed_at)),
        deletion_request_fields::claimed_until.eq(None::<SystemTime>),
    ))
    .execute(conn)
    .await
}

/// The request's status as seen by the caller's connection, or `None` if there
/// is no such request.
pub async fn get_status(
    conn: &mut AsyncPgConnection,
    request_id: Uuid,
) -> Result<Option<DeletionStatus>, diesel::result::Error> {
    deletion_requests
        .find(request_id)
        .select(deletion_request_fields::status)
        .first::<DeletionStatus>(conn)
        .await
        .optional()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::test_utils;

    fn dao() -> Dao {
        Dao::new(test_utils::db_async_pool())
    }

    #[ignore]
    #[tokio::test]
    async fn ready_requests_respect_schedule_and_claims() {
        let dao = dao();
        let ready_user = test_utils::unique_user_id();
        let future_user = test_utils::unique_user_id();

        let (ready_id, future_id) = {
            let mut conn = test_utils::db_async_conn().await;
            (
                test_utils::insert_deletion_request(
                    &mut conn,
                    &ready_user,
                    SystemTime::now() - Duration::from_secs(60),
                )
                .await,
                test_utils::insert_deletion_request(
                    &mut conn,
                    &future_user,
                    SystemTime::now() + Duration::from_secs(3600),
                )
                .await,
            )
        };

        let ready = dao
            .get_all_requests_ready_for_processing(SystemTime::now())
            .await
            .unwrap();
        let ready_ids = ready.iter().map(|r| r.id).collect::<Vec<_>>();
        assert!(ready_ids.contains(&ready_id));
        assert!(!ready_ids.contains(&future_id));

        assert!(dao
            .claim_request(ready_id, Duration::from_secs(300))
            .await
            .unwrap());
        assert!(!dao
            .claim_request(ready_id, Duration::from_secs(300))
            .await
            .unwrap());

        let ready = dao
            .get_all_requests_ready_for_processing(SystemTime::now())
            .await
            .unwrap();
        assert!(!ready.iter().any(|r| r.id == ready_id));

        dao.release_claim(ready_id).await.unwrap();
        assert!(dao
            .claim_request(ready_id, Duration::from_secs(300))
            .await
            .unwrap());

        test_utils::remove_audit_rows(&ready_user).await;
        test_utils::remove_audit_rows(&future_user).await;
    }

    #[ignore]
    #[tokio::test]
    async fn record_completion_only_touches_pending_requests() {
        let dao = dao();
        let user_id = test_utils::unique_user_id();

        let mut conn = test_utils::db_async_conn().await;
        let request_id =
            test_utils::insert_deletion_request(&mut conn, &user_id, SystemTime::now()).await;

        let before = dao.get_request(request_id).await.unwrap();
        assert_eq!(before.status, DeletionStatus::Pending);
        assert!(before.completed_at.is_none());

        let updated = record_completion(&mut conn, request_id, SystemTime::now())
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let after = dao.get_request(request_id).await.unwrap();
        assert_eq!(after.status, DeletionStatus::Completed);
        assert!(after.completed_at.is_some());
        assert_eq!(after.user_id, before.user_id);
        assert_eq!(after.scheduled_for, before.scheduled_for);

        let updated = record_completion(&mut conn, request_id, SystemTime::now())
            .await
            .unwrap();
        assert_eq!(updated, 0);
        assert_eq!(
            get_status(&mut conn, request_id).await.unwrap(),
            Some(DeletionStatus::Completed)
        );
        assert_eq!(get_status(&mut conn, Uuid::now_v7()).await.unwrap(), None);

        drop(conn);
        test_utils::remove_audit_rows(&user_id).await;
    }
}
