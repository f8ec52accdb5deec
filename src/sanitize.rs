use crate::record::ExtractionResult;
use crate::record::Record;

/// Trims the field names of every record. Values are left alone and `None`
/// passes through.
pub fn sanitize(result: Option<ExtractionResult>) -> Option<ExtractionResult> {
    result.map(|result| result.map_records(trim_keys))
}

/// Trims the field names of one record. When two names trim to the same
/// field, the later value wins and the field stays where it first appeared.
pub(crate) fn trim_keys(record: Record) -> Record {
    let mut trimmed = Record::with_capacity(record.len());
    for (key, value) in record {
        trimmed.insert(key.trim().to_owned(), value);
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serde_json::Value;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn trims_keys_and_keeps_values() {
        let result = ExtractionResult::Table(vec![record(json!({" Name ": " padded ", "Value\t": 1, "Ok": true}))]);
        let sanitized = sanitize(Some(result)).unwrap();
        assert_eq!(
            serde_json::to_string(&sanitized).unwrap(),
            r#"[{"Name":" padded ","Value":1,"Ok":true}]"#
        );
    }

    #[test]
    fn trims_both_layout_sections() {
        let result = ExtractionResult::Layout {
            column_data: vec![record(json!({" Model": "X1"}))],
            row_data: vec![record(json!({"Phase ": "L1"}))],
        };
        assert_eq!(
            serde_json::to_value(sanitize(Some(result))).unwrap(),
            json!({"columnData": [{"Model": "X1"}], "rowData": [{"Phase": "L1"}]})
        );
    }

    #[test]
    fn none_passes_through() {
        assert_eq!(sanitize(None), None);
    }

    #[test]
    fn colliding_keys_keep_first_position() {
        let trimmed = trim_keys(record(json!({"a ": 1, "b": 2, " a": 3})));
        assert_eq!(serde_json::to_string(&trimmed).unwrap(), r#"{"a":3,"b":2}"#);
    }
}
