//! The mapping table: normalized field name to the header text it came from.

use crate::record::ExtractionResult;
use crate::record::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

static NON_WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s]").expect("Hardcode regex pattern"));
static WHITESPACE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Hardcode regex pattern"));

/// Drops every character that is neither an ASCII word character nor
/// whitespace, then joins the remaining words with `_`.
///
/// `"Power (W)"` becomes `"Power_W"`, `"Voltage [V] max"` becomes `"Voltage_V_max"`.
pub fn normalize(header: &str) -> String {
    let kept = NON_WORD_PATTERN.replace_all(header, "");
    WHITESPACE_PATTERN.replace_all(&kept, "_").into_owned()
}

/// Normalized name to original header text, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MappingTable {
    entries: Map<String, Value>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `normalize(header) -> header`, replacing an earlier entry with the same name.
    pub fn insert(&mut self, header: &str) {
        self.entries.insert(normalize(header), Value::String(header.to_owned()));
    }

    /// Merges `other` into this table; entries of `other` win.
    pub fn merge(&mut self, other: MappingTable) {
        for (name, header) in other.entries {
            self.entries.insert(name, header);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn insert_keys(&mut self, record: Option<&Record>) {
        for header in record.into_iter().flat_map(Record::keys) {
            self.insert(header);
        }
    }
}

/// Builds the mapping fragment of one worksheet.
///
/// Every record of a worksheet is expected to share the field names of its
/// first record, so only that record is consulted. For odd layouts the header
/// record comes first and the first body record second.
pub fn build_mapping(result: &ExtractionResult) -> MappingTable {
    let mut mapping = MappingTable::new();
    match result {
        ExtractionResult::Table(records) => mapping.insert_keys(records.first()),
        ExtractionResult::Layout { column_data, row_data } => {
            mapping.insert_keys(column_data.first());
            mapping.insert_keys(row_data.first());
        }
    }
    mapping
}
