pub mod consent_log_entry;
pub mod deletion_request;
pub mod subscription;
