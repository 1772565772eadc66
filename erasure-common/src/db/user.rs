use diesel::{ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::RunQueryDsl;

use crate::db::{DaoError, DbAsyncPool};

use crate::schema::user as user_fields;
use crate::schema::user::dsl::user;

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }

    pub async fn get_user_email(&self, user_id: &str) -> Result<Option<String>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(user
            .select(user_fields::email)
            .filter(user_fields::id.eq(user_id))
            .first::<String>(&mut conn)
            .await
            .optional()?)
    }
}
