use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::subscription::Subscription;

use crate::schema::subscriptions as subscription_fields;
use crate::schema::subscriptions::dsl::subscriptions;

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }

    /// The billing provider's id for the user's live subscription, if there is one.
    pub async fn get_active_provider_subscription_id(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        let user_subscriptions = subscriptions
            .select(Subscription::as_select())
            .filter(subscription_fields::user_id.eq(user_id))
            .order(subscription_fields::id.desc())
            .load::<Subscription>(&mut conn)
            .await?;

        Ok(user_subscriptions
            .into_iter()
            .filter(|s| s.is_active())
            .find_map(|s| s.stripe_subscription_id))
    }
}
