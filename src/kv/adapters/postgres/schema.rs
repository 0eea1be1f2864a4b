//! Diesel schema for key-value records.

diesel::table! {
    /// One row per field of a stored record.
    kv_records (record_key, field) {
        /// Full record key.
        record_key -> Text,
        /// Field name within the record.
        field -> Text,
        /// Field value.
        value -> Text,
    }
}
