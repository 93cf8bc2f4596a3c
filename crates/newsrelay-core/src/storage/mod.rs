mod database;
mod dedup;
mod retry;

pub use database::Database;
pub use dedup::{DedupStore, PostedRecord};
pub use retry::{is_transient_error, storage_policy};
