//! Diesel row models for key-value records.

use super::schema::kv_records;
use diesel::prelude::*;

/// Query result row for a single record field.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = kv_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct KvFieldRow {
    /// Field name.
    pub field: String,
    /// Field value.
    pub value: String,
}

/// Insert model for a single record field.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = kv_records)]
pub struct NewKvFieldRow<'a> {
    /// Record key.
    pub record_key: &'a str,
    /// Field name.
    pub field: &'a str,
    /// Field value.
    pub value: &'a str,
}
