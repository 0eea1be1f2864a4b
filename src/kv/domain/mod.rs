//! Value types shared by the key-value port and its adapters.

mod pattern;

use std::collections::BTreeMap;

pub use pattern::{KEY_SEPARATOR, KeyPattern, PatternSegment};

/// Field name to value mapping of a single record.
pub type FieldMap = BTreeMap<String, String>;

/// Expected field values for a conditional write.
///
/// `None` requires the field to be absent from the record.
pub type FieldExpectations = BTreeMap<String, Option<String>>;
