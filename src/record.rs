use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// One row: field name to cell value, in column order.
pub type Record = Map<String, Value>;

/// What a worksheet extracts to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractionResult {
    /// Generic worksheet: one record per row below the header
    Table(Vec<Record>),
    /// Odd-layout worksheet: the key/value block folded into one record, then the body
    Layout {
        #[serde(rename = "columnData")]
        column_data: Vec<Record>,
        #[serde(rename = "rowData")]
        row_data: Vec<Record>,
    },
}

impl ExtractionResult {
    /// Applies `f` to every record, whatever the shape.
    pub(crate) fn map_records<F: FnMut(Record) -> Record>(self, mut f: F) -> Self {
        match self {
            ExtractionResult::Table(records) => ExtractionResult::Table(records.into_iter().map(f).collect()),
            ExtractionResult::Layout { column_data, row_data } => ExtractionResult::Layout {
                column_data: column_data.into_iter().map(&mut f).collect(),
                row_data: row_data.into_iter().map(f).collect(),
            },
        }
    }
}
