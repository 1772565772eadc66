use diesel::sql_types::Text;
use diesel_async::RunQueryDsl;

use crate::db::{DaoError, DbAsyncPool};
use crate::registry::SchemaColumn;

#[derive(QueryableByName)]
struct ColumnRow {
    #[diesel(sql_type = Text)]
    table_name: String,
    #[diesel(sql_type = Text)]
    column_name: String,
}

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }

    /// Every column of every base table in the connection's current schema.
    pub async fn get_all_columns(&self) -> Result<Vec<SchemaColumn>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        let rows = diesel::sql_query(
            "SELECT c.table_name::text AS table_name, c.column_name::text AS column_name \
             FROM information_schema.columns c \
             JOIN information_schema.tables t \
               ON t.table_schema = c.table_schema AND t.table_name = c.table_name \
             WHERE c.table_schema = current_schema() AND t.table_type = 'BASE TABLE' \
             ORDER BY c.table_name, c.ordinal_position",
        )
        .load::<ColumnRow>(&mut conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SchemaColumn {
                table_name: row.table_name,
                column_name: row.column_name,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::test_utils;
    use crate::registry::ClassificationRegistry;

    #[ignore]
    #[tokio::test]
    async fn migrated_schema_matches_standard_registry() {
        let dao = Dao::new(test_utils::db_async_pool());
        let columns = dao.get_all_columns().await.unwrap();

        assert!(columns
            .iter()
            .any(|c| c.table_name == "deletion_requests" && c.column_name == "claimed_until"));

        ClassificationRegistry::standard()
            .unwrap()
            .validate_against_schema(&columns)
            .unwrap();
    }
}
