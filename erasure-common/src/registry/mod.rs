//! Declarative classification of every user-reachable table.
//!
//! Each entity is mapped to exactly one [`Treatment`] and an [`Ownership`]
//! predicate describing which columns tie a row to a user. The erasure plan is
//! assembled from this data alone, so adding a user-owned table is a change to
//! [`entries`], not to the executor.

use std::collections::{HashMap, HashSet};
use std::fmt;

pub mod entries;

pub use entries::{REGISTRY_VERSION, ROOT_ENTITY};

pub const DELETION_REQUESTS_ENTITY: &str = "deletion_requests";
pub const CONSENT_LOG_ENTITY: &str = "consent_log";

/// Column names that mark a table as holding user-identifying data.
const IDENTIFYING_COLUMNS: [&str; 3] = ["user_id", "userId", "user_email"];
const IDENTIFYING_COLUMN_SUFFIX: &str = "_user_id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Treatment {
    HardDelete,
    /// Identifying columns in `scrub` are overwritten with the sentinel; the row is kept.
    Anonymize {
        scrub: &'static [&'static str],
    },
    Preserve,
}

impl Treatment {
    pub fn name(&self) -> &'static str {
        match self {
            Treatment::HardDelete => "HARD_DELETE",
            Treatment::Anonymize { .. } => "ANONYMIZE",
            Treatment::Preserve => "PRESERVE",
        }
    }
}

/// One or more columns, combined with OR. A row belongs to a user if any of the
/// columns holds the user's id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ownership(pub &'static [&'static str]);

impl Ownership {
    pub fn columns(&self) -> &'static [&'static str] {
        self.0
    }

    pub fn is_bidirectional(&self) -> bool {
        self.0.len() > 1
    }

    /// Evaluates the predicate against a single row. `column_value` returns the
    /// row's value for a column, or `None` for NULL or a missing column.
    pub fn is_owned_by<'r, F>(&self, column_value: F, user_id: &str) -> bool
    where
        F: Fn(&str) -> Option<&'r str>,
    {
        self.0
            .iter()
            .any(|column| column_value(column) == Some(user_id))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassificationEntry {
    pub entity: &'static str,
    pub treatment: Treatment,
    pub ownership: Ownership,
}

impl ClassificationEntry {
    pub const fn hard_delete(entity: &'static str, ownership: &'static [&'static str]) -> Self {
        Self {
            entity,
            treatment: Treatment::HardDelete,
            ownership: Ownership(ownership),
        }
    }

    pub const fn anonymize(
        entity: &'static str,
        ownership: &'static [&'static str],
        scrub: &'static [&'static str],
    ) -> Self {
        Self {
            entity,
            treatment: Treatment::Anonymize { scrub },
            ownership: Ownership(ownership),
        }
    }

    pub const fn preserve(entity: &'static str, ownership: &'static [&'static str]) -> Self {
        Self {
            entity,
            treatment: Treatment::Preserve,
            ownership: Ownership(ownership),
        }
    }

    /// Every column the entry refers to.
    fn columns(&self) -> impl Iterator<Item = &'static str> {
        let scrub: &'static [&'static str] = match self.treatment {
            Treatment::Anonymize { scrub } => scrub,
            _ => &[],
        };

        self.ownership.columns().iter().chain(scrub.iter()).copied()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateEntity(&'static str),
    UnknownEntity(String),
    InvalidIdentifier(&'static str),
    MissingOwnership(&'static str),
    MissingRoot(&'static str),
    RootNotHardDeleted(&'static str),
    AnonymizeWithoutScrub(&'static str),
    OwnershipNotScrubbed {
        entity: &'static str,
        column: &'static str,
    },
    AuditTableNotPreserved(&'static str),
    SchemaDrift {
        entity: &'static str,
        column: Option<&'static str>,
    },
    UnclassifiedEntity {
        entity: String,
        column: String,
    },
}

impl std::error::Error for RegistryError {}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateEntity(entity) => {
                write!(f, "RegistryError: Entity '{entity}' is classified more than once")
            }
            RegistryError::UnknownEntity(entity) => {
                write!(f, "RegistryError: Entity '{entity}' is not classified")
            }
            RegistryError::InvalidIdentifier(ident) => {
                write!(f, "RegistryError: '{ident}' is not a valid SQL identifier")
            }
            RegistryError::MissingOwnership(entity) => {
                write!(f, "RegistryError: Entity '{entity}' has no ownership columns")
            }
            RegistryError::MissingRoot(entity) => {
                write!(f, "RegistryError: Root entity '{entity}' is not classified")
            }
            RegistryError::RootNotHardDeleted(entity) => {
                write!(f, "RegistryError: Root entity '{entity}' must be HARD_DELETE")
            }
            RegistryError::AnonymizeWithoutScrub(entity) => {
                write!(
                    f,
                    "RegistryError: ANONYMIZE entity '{entity}' has no columns to scrub"
                )
            }
            RegistryError::OwnershipNotScrubbed { entity, column } => {
                write!(
                    f,
                    "RegistryError: ANONYMIZE entity '{entity}' would leave ownership column \
                     '{column}' intact"
                )
            }
            RegistryError::AuditTableNotPreserved(entity) => {
                write!(f, "RegistryError: Audit entity '{entity}' must be PRESERVE")
            }
            RegistryError::SchemaDrift { entity, column } => match column {
                Some(column) => write!(
                    f,
                    "RegistryError: Column '{entity}.{column}' does not exist in the database"
                ),
                None => write!(
                    f,
                    "RegistryError: Table '{entity}' does not exist in the database"
                ),
            },
            RegistryError::UnclassifiedEntity { entity, column } => {
                write!(
                    f,
                    "RegistryError: Table '{entity}' has identifying column '{column}' but is \
                     not classified"
                )
            }
        }
    }
}

/// A column as reported by `information_schema.columns`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaColumn {
    pub table_name: String,
    pub column_name: String,
}

#[derive(Debug)]
pub struct ClassificationRegistry {
    root_entity: &'static str,
    entries: &'static [ClassificationEntry],
    index: HashMap<&'static str, usize>,
}

impl ClassificationRegistry {
    /// Builds a registry, rejecting any configuration that could lead to an
    /// incomplete or unsafe erasure.
    pub fn new(
        root_entity: &'static str,
        entries: &'static [ClassificationEntry],
    ) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(entries.len());

        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.entity, i).is_some() {
                return Err(RegistryError::DuplicateEntity(entry.entity));
            }

            validate_identifier(entry.entity)?;

            if entry.ownership.columns().is_empty() {
                return Err(RegistryError::MissingOwnership(entry.entity));
            }

            for column in entry.columns() {
                validate_identifier(column)?;
            }

            if let Treatment::Anonymize { scrub } = entry.treatment {
                if scrub.is_empty() {
                    return Err(RegistryError::AnonymizeWithoutScrub(entry.entity));
                }

                if let Some(column) = entry
                    .ownership
                    .columns()
                    .iter()
                    .copied()
                    .find(|column| !scrub.contains(column))
                {
                    return Err(RegistryError::OwnershipNotScrubbed {
                        entity: entry.entity,
                        column,
                    });
                }
            }
        }

        let root = index
            .get(root_entity)
            .map(|&i| &entries[i])
            .ok_or(RegistryError::MissingRoot(root_entity))?;

        if root.treatment != Treatment::HardDelete {
            return Err(RegistryError::RootNotHardDeleted(root_entity));
        }

        for audit_entity in [DELETION_REQUESTS_ENTITY, CONSENT_LOG_ENTITY] {
            if let Some(&i) = index.get(audit_entity) {
                if entries[i].treatment != Treatment::Preserve {
                    return Err(RegistryError::AuditTableNotPreserved(entries[i].entity));
                }
            }
        }

        Ok(Self {
            root_entity,
            entries,
            index,
        })
    }

    /// The registry for the application's own schema.
    pub fn standard() -> Result<Self, RegistryError> {
        Self::new(ROOT_ENTITY, entries::ENTRIES)
    }

    pub fn root_entity(&self) -> &'static str {
        self.root_entity
    }

    pub fn entries(&self) -> &'static [ClassificationEntry] {
        self.entries
    }

    pub fn entry(&self, entity: &str) -> Result<&ClassificationEntry, RegistryError> {
        self.index
            .get(entity)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RegistryError::UnknownEntity(String::from(entity)))
    }

    pub fn treatment_for(&self, entity: &str) -> Result<Treatment, RegistryError> {
        Ok(self.entry(entity)?.treatment)
    }

    pub fn ownership_predicate(
        &self,
        entity: &str,
    ) -> Result<&'static [&'static str], RegistryError> {
        Ok(self.entry(entity)?.ownership.columns())
    }

    /// Checks the registry against the live schema. Every registered table and
    /// column must exist, and every table carrying an identifying column must be
    /// registered.
    pub fn validate_against_schema(&self, columns: &[SchemaColumn]) -> Result<(), RegistryError> {
        let mut tables: HashMap<&str, HashSet<&str>> = HashMap::new();
        for column in columns {
            tables
                .entry(column.table_name.as_str())
                .or_default()
                .insert(column.column_name.as_str());
        }

        for entry in self.entries {
            let Some(table_columns) = tables.get(entry.entity) else {
                return Err(RegistryError::SchemaDrift {
                    entity: entry.entity,
                    column: None,
                });
            };

            if let Some(missing) = entry.columns().find(|c| !table_columns.contains(c)) {
                return Err(RegistryError::SchemaDrift {
                    entity: entry.entity,
                    column: Some(missing),
                });
            }
        }

        let mut unclassified = columns
            .iter()
            .filter(|c| is_identifying_column(&c.column_name))
            .filter(|c| !self.index.contains_key(c.table_name.as_str()))
            .collect::<Vec<_>>();
        unclassified.sort_by(|a, b| a.table_name.cmp(&b.table_name));

        if let Some(column) = unclassified.first() {
            return Err(RegistryError::UnclassifiedEntity {
                entity: column.table_name.clone(),
                column: column.column_name.clone(),
            });
        }

        Ok(())
    }
}

pub fn is_identifying_column(column: &str) -> bool {
    IDENTIFYING_COLUMNS.contains(&column) || column.ends_with(IDENTIFYING_COLUMN_SUFFIX)
}

fn validate_identifier(ident: &'static str) -> Result<(), RegistryError> {
    let mut chars = ident.chars();
    let starts_well = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');

    if starts_well && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(RegistryError::InvalidIdentifier(ident))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_from(registry: &ClassificationRegistry) -> Vec<SchemaColumn> {
        registry
            .entries()
            .iter()
            .flat_map(|entry| {
                let mut columns = vec![SchemaColumn {
                    table_name: String::from(entry.entity),
                    column_name: String::from("id"),
                }];

                columns.extend(entry.columns().map(|c| SchemaColumn {
                    table_name: String::from(entry.entity),
                    column_name: String::from(c),
                }));

                columns
            })
            .collect()
    }

    #[test]
    fn standard_registry_is_valid() {
        let registry = ClassificationRegistry::standard().unwrap();

        assert_eq!(registry.root_entity(), ROOT_ENTITY);
        assert_eq!(
            registry.treatment_for(ROOT_ENTITY).unwrap(),
            Treatment::HardDelete
        );
        assert_eq!(
            registry.treatment_for(DELETION_REQUESTS_ENTITY).unwrap(),
            Treatment::Preserve
        );
        assert_eq!(
            registry.treatment_for(CONSENT_LOG_ENTITY).unwrap(),
            Treatment::Preserve
        );
    }

    #[test]
    fn lookups_fail_closed_for_unknown_entities() {
        let registry = ClassificationRegistry::standard().unwrap();

        assert_eq!(
            registry.treatment_for("horoscope_cache"),
            Err(RegistryError::UnknownEntity(String::from("horoscope_cache")))
        );
        assert!(registry.ownership_predicate("horoscope_cache").is_err());
    }

    #[test]
    fn ownership_predicate_lists_both_sides_of_bidirectional_relations() {
        let registry = ClassificationRegistry::standard().unwrap();

        assert_eq!(
            registry.ownership_predicate("friend_connections").unwrap(),
            &["user_id", "friend_id"]
        );
        assert_eq!(
            registry.ownership_predicate("referrals").unwrap(),
            &["referrer_user_id", "referred_user_id"]
        );
    }

    #[test]
    fn ownership_predicate_is_an_or() {
        let ownership = Ownership(&["sender_id", "receiver_id"]);
        let row = |column: &str| match column {
            "sender_id" => Some("someone-else"),
            "receiver_id" => Some("user-1"),
            _ => None,
        };

        assert!(ownership.is_bidirectional());
        assert!(ownership.is_owned_by(row, "user-1"));
        assert!(ownership.is_owned_by(row, "someone-else"));
        assert!(!ownership.is_owned_by(row, "user-2"));
        assert!(!ownership.is_owned_by(|_| None, "user-1"));
    }

    #[test]
    fn rejects_duplicate_entities() {
        static ENTRIES: &[ClassificationEntry] = &[
            ClassificationEntry::hard_delete("user", &["id"]),
            ClassificationEntry::hard_delete("notes", &["user_id"]),
            ClassificationEntry::anonymize("notes", &["user_id"], &["user_id"]),
        ];

        assert_eq!(
            ClassificationRegistry::new("user", ENTRIES).unwrap_err(),
            RegistryError::DuplicateEntity("notes")
        );
    }

    #[test]
    fn rejects_missing_or_preserved_root() {
        static NO_ROOT: &[ClassificationEntry] =
            &[ClassificationEntry::hard_delete("notes", &["user_id"])];
        static PRESERVED_ROOT: &[ClassificationEntry] =
            &[ClassificationEntry::preserve("user", &["id"])];

        assert_eq!(
            ClassificationRegistry::new("user", NO_ROOT).unwrap_err(),
            RegistryError::MissingRoot("user")
        );
        assert_eq!(
            ClassificationRegistry::new("user", PRESERVED_ROOT).unwrap_err(),
            RegistryError::RootNotHardDeleted("user")
        );
    }

    #[test]
    fn rejects_anonymization_that_keeps_the_link() {
        static ENTRIES: &[ClassificationEntry] = &[
            ClassificationEntry::hard_delete("user", &["id"]),
            ClassificationEntry::anonymize("events", &["user_id"], &["user_email"]),
        ];

        assert_eq!(
            ClassificationRegistry::new("user", ENTRIES).unwrap_err(),
            RegistryError::OwnershipNotScrubbed {
                entity: "events",
                column: "user_id",
            }
        );
    }

    #[test]
    fn rejects_audit_tables_that_are_not_preserved() {
        static ENTRIES: &[ClassificationEntry] = &[
            ClassificationEntry::hard_delete("user", &["id"]),
            ClassificationEntry::hard_delete("consent_log", &["user_id"]),
        ];

        assert_eq!(
            ClassificationRegistry::new("user", ENTRIES).unwrap_err(),
            RegistryError::AuditTableNotPreserved("consent_log")
        );
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        static ENTRIES: &[ClassificationEntry] = &[
            ClassificationEntry::hard_delete("user", &["id"]),
            ClassificationEntry::hard_delete("notes\"; DROP TABLE user; --", &["user_id"]),
        ];

        assert!(matches!(
            ClassificationRegistry::new("user", ENTRIES).unwrap_err(),
            RegistryError::InvalidIdentifier(_)
        ));
    }

    #[test]
    fn schema_validation_accepts_matching_schema() {
        let registry = ClassificationRegistry::standard().unwrap();
        let mut schema = schema_from(&registry);
        schema.push(SchemaColumn {
            table_name: String::from("grimoire_embeddings"),
            column_name: String::from("content"),
        });

        registry.validate_against_schema(&schema).unwrap();
    }

    #[test]
    fn schema_validation_detects_unclassified_identifying_tables() {
        let registry = ClassificationRegistry::standard().unwrap();
        let mut schema = schema_from(&registry);
        schema.push(SchemaColumn {
            table_name: String::from("moon_circle_rsvps"),
            column_name: String::from("host_user_id"),
        });

        assert_eq!(
            registry.validate_against_schema(&schema).unwrap_err(),
            RegistryError::UnclassifiedEntity {
                entity: String::from("moon_circle_rsvps"),
                column: String::from("host_user_id"),
            }
        );
    }

    #[test]
    fn schema_validation_detects_drift() {
        let registry = ClassificationRegistry::standard().unwrap();

        let without_table = schema_from(&registry)
            .into_iter()
            .filter(|c| c.table_name != "tarot_readings")
            .collect::<Vec<_>>();
        assert_eq!(
            registry.validate_against_schema(&without_table).unwrap_err(),
            RegistryError::SchemaDrift {
                entity: "tarot_readings",
                column: None,
            }
        );

        let without_column = schema_from(&registry)
            .into_iter()
            .filter(|c| !(c.table_name == "referrals" && c.column_name == "referred_user_id"))
            .collect::<Vec<_>>();
        assert_eq!(
            registry.validate_against_schema(&without_column).unwrap_err(),
            RegistryError::SchemaDrift {
                entity: "referrals",
                column: Some("referred_user_id"),
            }
        );
    }

    #[test]
    fn identifying_column_patterns() {
        assert!(is_identifying_column("user_id"));
        assert!(is_identifying_column("userId"));
        assert!(is_identifying_column("user_email"));
        assert!(is_identifying_column("referrer_user_id"));
        assert!(!is_identifying_column("theme_id"));
        assert!(!is_identifying_column("id"));
    }
}
