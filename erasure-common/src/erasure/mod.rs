//! Expansion of the classification registry into the ordered list of statements
//! that erase one user.

use std::collections::BTreeMap;
use std::fmt;

use crate::db::DaoError;
use crate::registry::{ClassificationRegistry, Ownership, Treatment};

/// Written over identifying columns of anonymized rows.
pub const ANONYMIZED_SENTINEL: &str = "deleted";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErasureOperation {
    Delete {
        entity: &'static str,
        ownership: Ownership,
    },
    Anonymize {
        entity: &'static str,
        ownership: Ownership,
        scrub: &'static [&'static str],
    },
}

impl ErasureOperation {
    pub fn entity(&self) -> &'static str {
        match self {
            ErasureOperation::Delete { entity, .. } => *entity,
            ErasureOperation::Anonymize { entity, .. } => *entity,
        }
    }

    pub fn ownership(&self) -> Ownership {
        match self {
            ErasureOperation::Delete { ownership, .. } => *ownership,
            ErasureOperation::Anonymize { ownership, .. } => *ownership,
        }
    }

    /// Whether the statement binds the sentinel as `$2` in addition to the user
    /// id as `$1`.
    pub fn binds_sentinel(&self) -> bool {
        matches!(self, ErasureOperation::Anonymize { .. })
    }

    pub fn to_sql(&self) -> String {
        let owned = owner_clause(self.ownership());

        match self {
            ErasureOperation::Delete { entity, .. } => {
                format!("DELETE FROM \"{entity}\" WHERE {owned}")
            }
            ErasureOperation::Anonymize { entity, scrub, .. } => {
                let assignments = scrub
                    .iter()
                    .map(|column| format!("\"{column}\" = $2"))
                    .collect::<Vec<_>>()
                    .join(", ");

                // Rows whose columns already all hold the sentinel are left alone
                let not_yet_anonymized = scrub
                    .iter()
                    .map(|column| format!("\"{column}\" IS DISTINCT FROM $2"))
                    .collect::<Vec<_>>()
                    .join(" OR ");

                format!(
                    "UPDATE \"{entity}\" SET {assignments} WHERE {owned} AND ({not_yet_anonymized})"
                )
            }
        }
    }
}

fn owner_clause(ownership: Ownership) -> String {
    let clause = ownership
        .columns()
        .iter()
        .map(|column| format!("\"{column}\" = $1"))
        .collect::<Vec<_>>()
        .join(" OR ");

    if ownership.is_bidirectional() {
        format!("({clause})")
    } else {
        clause
    }
}

/// Statements for erasing a single user. PRESERVE entities never appear and the
/// root entity's delete is always the final operation.
#[derive(Clone, Debug)]
pub struct ErasurePlan {
    root_entity: &'static str,
    operations: Vec<ErasureOperation>,
}

impl ErasurePlan {
    pub fn from_registry(registry: &ClassificationRegistry) -> Self {
        let mut operations = Vec::with_capacity(registry.entries().len());
        let mut root = None;

        for entry in registry.entries() {
            let operation = match entry.treatment {
                Treatment::Preserve => continue,
                Treatment::HardDelete => ErasureOperation::Delete {
                    entity: entry.entity,
                    ownership: entry.ownership,
                },
                Treatment::Anonymize { scrub } => ErasureOperation::Anonymize {
                    entity: entry.entity,
                    ownership: entry.ownership,
                    scrub,
                },
            };

            if entry.entity == registry.root_entity() {
                root = Some(operation);
            } else {
                operations.push(operation);
            }
        }

        // The registry refuses to build without a hard-deleted root
        operations.extend(root);

        Self {
            root_entity: registry.root_entity(),
            operations,
        }
    }

    pub fn root_entity(&self) -> &'static str {
        self.root_entity
    }

    pub fn operations(&self) -> &[ErasureOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Rows affected per entity by one user's erasure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeletionCounts(BTreeMap<&'static str, usize>);

impl DeletionCounts {
    pub fn record(&mut self, entity: &'static str, rows: usize) {
        *self.0.entry(entity).or_insert(0) += rows;
    }

    pub fn rows_for(&self, entity: &str) -> usize {
        self.0.get(entity).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.0.iter().map(|(entity, rows)| (*entity, *rows))
    }
}

impl fmt::Display for DeletionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (entity, rows) in self.iter().filter(|(_, rows)| *rows > 0) {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{entity}={rows}")?;
            first = false;
        }

        if first {
            f.write_str("no rows")?;
        }

        Ok(())
    }
}

/// Raised when a user's erasure transaction could not commit. Nothing from the
/// transaction is visible afterward.
#[derive(Debug)]
pub enum DeletionFailed {
    ConnectionUnavailable(String),
    OperationFailed {
        entity: &'static str,
        reason: String,
    },
    AuditRecordFailed(String),
    TransactionFailed(String),
}

impl std::error::Error for DeletionFailed {}

impl fmt::Display for DeletionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionFailed::ConnectionUnavailable(e) => {
                write!(f, "DeletionFailed: No database connection: {e}")
            }
            DeletionFailed::OperationFailed { entity, reason } => {
                write!(f, "DeletionFailed: Operation on '{entity}' failed: {reason}")
            }
            DeletionFailed::AuditRecordFailed(e) => {
                write!(f, "DeletionFailed: Could not record completion: {e}")
            }
            DeletionFailed::TransactionFailed(e) => {
                write!(f, "DeletionFailed: Transaction failed: {e}")
            }
        }
    }
}

impl From<diesel::result::Error> for DeletionFailed {
    fn from(error: diesel::result::Error) -> Self {
        DeletionFailed::TransactionFailed(error.to_string())
    }
}

impl From<DaoError> for DeletionFailed {
    fn from(error: DaoError) -> Self {
        match error {
            DaoError::DbAsyncPoolFailure(e) => DeletionFailed::ConnectionUnavailable(e),
            e => DeletionFailed::TransactionFailed(e.to_string()),
        }
    }
}
