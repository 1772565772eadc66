use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::consent_log;

// Rows here are retained for the legal audit trail and are never erased.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = consent_log)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ConsentLogEntry {
    pub id: Uuid,
    pub user_id: String,
    pub consent_type: String,
    pub granted: bool,
    pub recorded_at: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = consent_log)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewConsentLogEntry<'a> {
    pub id: Uuid,
    pub user_id: &'a str,
    pub consent_type: &'a str,
    pub granted: bool,
    pub recorded_at: SystemTime,
}
