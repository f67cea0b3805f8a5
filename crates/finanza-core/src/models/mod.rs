//! Data models for Finanza

mod month;
mod record;
mod sync_conflict;
mod sync_failure;
mod table;

pub use month::{is_month_ref, month_ref_for, month_ref_from_date, normalize_month_ref, MONTH_FIELD};
pub use record::{is_reserved, sanitize_fields, Fields, Record, RecordId, RESERVED_FIELDS};
pub use sync_conflict::{ConflictWinner, NewSyncConflict, SyncConflict};
pub use sync_failure::SyncFailure;
pub use table::TableName;
