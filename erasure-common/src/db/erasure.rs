use diesel::sql_types::Text;
use diesel_async::RunQueryDsl;
use scoped_futures::ScopedFutureExt;
use std::time::SystemTime;

use crate::db::deletion_request;
use crate::db::DbAsyncPool;
use crate::erasure::{DeletionCounts, DeletionFailed, ErasurePlan, ANONYMIZED_SENTINEL};
use crate::models::deletion_request::{DeletionRequest, DeletionStatus};

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }

    /// Runs every statement in `plan` for the request's user and records the
    /// request as completed, all in one transaction.
    pub async fn erase_user(
        &self,
        request: &DeletionRequest,
        plan: &ErasurePlan,
    ) -> Result<DeletionCounts, DeletionFailed> {
        let mut db_connection = self
            .db_async_pool
            .get()
            .await
            .map_err(|e| DeletionFailed::ConnectionUnavailable(e.to_string()))?;

        let user_id = request.user_id.as_str();
        let request_id = request.id;

        db_connection
            .build_transaction()
            .run::<_, DeletionFailed, _>(|conn| {
                async move {
                    let mut counts = DeletionCounts::default();

                    for operation in plan.operations() {
                        let query = diesel::sql_query(operation.to_sql()).bind::<Text, _>(user_id);

                        let rows = if operation.binds_sentinel() {
                            query
                                .bind::<Text, _>(ANONYMIZED_SENTINEL)
                                .execute(conn)
                                .await
                        } else {
                            query.execute(conn).await
                        }
                        .map_err(|e| DeletionFailed::OperationFailed {
                            entity: operation.entity(),
                            reason: e.to_string(),
                        })?;

                        counts.record(operation.entity(), rows);
                    }

                    let recorded =
                        deletion_request::record_completion(conn, request_id, SystemTime::now())
                            .await?;

                    // A request another run already completed is a no-op, not a failure
                    if recorded == 0 {
                        match deletion_request::get_status(conn, request_id).await? {
                            Some(DeletionStatus::Completed) => log::info!(
                                "Deletion request {request_id} was already completed"
                            ),
                            _ => {
                                return Err(DeletionFailed::AuditRecordFailed(format!(
                                    "Deletion request {request_id} could not be marked completed"
                                )));
                            }
                        }
                    }

                    Ok(counts)
                }
                .scope_boxed()
            })
            .await
    }
}
