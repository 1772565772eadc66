use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::deletion_requests;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum DeletionStatus {
    Pending,
    Completed,
}

impl DeletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionStatus::Pending => "pending",
            DeletionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for DeletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Pg> for DeletionStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for DeletionStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"pending" => Ok(DeletionStatus::Pending),
            b"completed" => Ok(DeletionStatus::Completed),
            other => Err(format!(
                "Unrecognized deletion request status: {}",
                String::from_utf8_lossy(other)
            )
            .into()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable, Selectable)]
#[diesel(table_name = deletion_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeletionRequest {
    pub id: Uuid,
    pub user_id: String,
    pub status: DeletionStatus,
    pub scheduled_for: SystemTime,
    pub completed_at: Option<SystemTime>,
    pub claimed_until: Option<SystemTime>,
}

impl DeletionRequest {
    pub fn is_ready(&self, now: SystemTime) -> bool {
        self.status == DeletionStatus::Pending && self.scheduled_for <= now
    }

    pub fn is_claimed(&self, now: SystemTime) -> bool {
        matches!(self.claimed_until, Some(until) if until > now)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = deletion_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewDeletionRequest<'a> {
    pub id: Uuid,
    pub user_id: &'a str,
    pub status: DeletionStatus,
    pub scheduled_for: SystemTime,
}
