use crate::error::SheetMapperError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;

const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
/// Cell hidden under a merged cell
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
/// Run of spaces, `text:c` long
const SPACES: QName = QName(b"text:s");

#[derive(Error, Debug)]
pub enum OdsError {
    #[error("Invalid ODS MIME type")]
    MimeTypeError,
}

pub(crate) struct OdsSpreadsheet {
    name: String,
    zip: ZipArchive<BufReader<File>>,
}

impl OdsSpreadsheet {
    pub(crate) fn open(path: &Path) -> Result<Self, SheetMapperError> {
        let name = path.display().to_string();
        let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;
        check_mime(&mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError(name.to_owned()))?;
        }
        Ok(OdsSpreadsheet { name, zip })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    /// Reads every `table:table` of `content.xml` in a single pass.
    fn read_sheets(&mut self) -> Result<Vec<Sheet>, SheetMapperError> {
        let mut reader = self
            .zip
            .xml_reader("content.xml")?
            .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))?;

        let mut sheets = Vec::<Sheet>::new();
        let mut sheet = None::<Sheet>;

        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 1usize;
        let mut col_count = 1usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        // Inside a string cell whose paragraphs hold the value
        let mut in_text = false;
        let mut in_annotation = false;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TABLE => {
                let table_name = event
                    .get_attribute_value("table:name")?
                    .ok_or_else(|| SpreadsheetError::MissingSheetName(self.name.to_owned()))?;
                sheet = Some(Sheet::new(&table_name));
                row = 0;
            }
            Event::End(event) if event.name() == TABLE => {
                if let Some(sheet) = sheet.take() {
                    sheets.push(sheet);
                }
            }
            Event::Start(event) if event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if event.name() == TABLE_ROW => {
                row = row.saturating_add(row_count);
            }
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                value.clear();
                in_text = false;
                col_count = event.parse_attribute_value("table:number-columns-repeated")?.unwrap_or(1);
                let value_type = event.get_attribute_value("office:value-type")?;
                kind = match value_type.as_deref() {
                    None => CellType::Empty,
                    Some("boolean") => CellType::Boolean,
                    Some("date") => CellType::IsoDateTime,
                    Some("time") => CellType::IsoDuration,
                    Some("string") => {
                        let is_error = event
                            .get_attribute_value("calcext:value-type")?
                            .map(|value_type| value_type == "error")
                            .unwrap_or(false);
                        if is_error { CellType::Error } else { CellType::Text }
                    }
                    Some(_) => CellType::Number,
                };
                let attribute = match kind {
                    CellType::Boolean => "office:boolean-value",
                    CellType::IsoDateTime => "office:date-value",
                    CellType::IsoDuration => "office:time-value",
                    CellType::Number => "office:value",
                    _ => "office:string-value",
                };
                match (kind, event.get_attribute_value(attribute)?) {
                    (CellType::Empty, _) => (),
                    (CellType::Boolean, Some(data)) => value.push_str(if data == "true" || data == "1" { "1" } else { "0" }),
                    (_, Some(data)) => value.push_str(&data),
                    (CellType::Text | CellType::Error, None) => in_text = true,
                    (_, None) => (),
                }
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                if let Some(sheet) = sheet.as_mut() {
                    if kind != CellType::Empty && !value.is_empty() {
                        for row_number in row..row.saturating_add(row_count) {
                            for col_number in col..col.saturating_add(col_count) {
                                sheet.push(Cell {
                                    row: row_number,
                                    col: col_number,
                                    kind,
                                    value: value.to_owned(),
                                });
                            }
                        }
                    }
                }
                col = col.saturating_add(col_count);
                kind = CellType::Empty;
                in_text = false;
                in_annotation = false;
            }
            Event::Start(event) if in_text && event.name() == ANNOTATION => in_annotation = true,
            Event::End(event) if in_text && event.name() == ANNOTATION => in_annotation = false,
            Event::Start(event) if in_text && !in_annotation && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if in_text && !in_annotation && event.name() == SPACES => {
                let count = event.parse_attribute_value::<usize>("text:c")?.unwrap_or(1);
                value.extend(std::iter::repeat(' ').take(count));
            }
            Event::Text(event) if in_text && !in_annotation => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) if in_text && !in_annotation => value.push_bytes_ref(&event)?,
        });

        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(self.name.to_owned()))?;
        }
        Ok(sheets)
    }
}

/// Rejects archives whose `mimetype` entry names another OpenDocument kind.
fn check_mime(zip: &mut ZipArchive<BufReader<File>>) -> Result<(), SheetMapperError> {
    if let Some(mut file) = zip.file("mimetype")? {
        let mut buffer = Vec::with_capacity(MIME_TYPE.len());
        file.read_to_end(&mut buffer)?;
        if buffer.trim_ascii() != MIME_TYPE {
            Err(OdsError::MimeTypeError)?;
        }
    }
    Ok(())
}

/// Looks for encryption data in the manifest; a missing manifest means no encryption.
fn is_password_protected(zip: &mut ZipArchive<BufReader<File>>) -> Result<bool, SheetMapperError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::End(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultMessage;
    use crate::testing::write_ods;
    use crate::testing::write_zip;

    fn read(path: &Path) -> Result<Vec<Sheet>, SheetMapperError> {
        OdsSpreadsheet::open(path)?
            .read_sheets()
            .with_prefix(&path.display().to_string())
    }

    fn content(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:calcext="urn:org:documentfoundation:names:experimental:calc:xmlns:calcext:1.0">
<office:body><office:spreadsheet>{body}</office:spreadsheet></office:body>
</office:document-content>"#
        )
    }

    #[test]
    fn read_typed_cells_and_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typed.ods");
        let body = r#"<table:table table:name="Readings">
  <table:table-row>
    <table:table-cell office:value-type="string"><text:p>Name</text:p></table:table-cell>
    <table:table-cell office:value-type="string"><text:p>Two<text:s text:c="2"/>words</text:p><text:p>second</text:p></table:table-cell>
    <table:table-cell table:number-columns-repeated="2"/>
    <table:table-cell office:value-type="string"><office:annotation><text:p>comment</text:p></office:annotation><text:p>A &amp; B</text:p></table:table-cell>
  </table:table-row>
  <table:table-row table:number-rows-repeated="2">
    <table:table-cell office:value-type="float" office:value="40"/>
    <table:table-cell office:value-type="boolean" office:boolean-value="true"/>
    <table:table-cell office:value-type="date" office:date-value="2021-03-04"/>
    <table:table-cell office:value-type="time" office:time-value="PT01H02M03S"/>
    <table:table-cell office:value-type="string" calcext:value-type="error"><text:p>#DIV/0!</text:p></table:table-cell>
  </table:table-row>
  <table:table-row table:number-rows-repeated="1048570"><table:table-cell table:number-columns-repeated="1024"/></table:table-row>
</table:table>"#;
        write_zip(
            &path,
            &[("mimetype", "application/vnd.oasis.opendocument.spreadsheet"), ("content.xml", &content(body))],
        );

        let sheets = read(&path).unwrap();
        assert_eq!(sheets.len(), 1);
        let sheet = &sheets[0];
        assert_eq!(sheet.name, "Readings");

        let text = |row, col| sheet.get(row, col).map(|cell| cell.to_text().unwrap());
        assert_eq!(text(0, 0).as_deref(), Some("Name"));
        assert_eq!(text(0, 1).as_deref(), Some("Two  words\nsecond"));
        assert_eq!(text(0, 2), None);
        assert_eq!(text(0, 4).as_deref(), Some("A & B"));
        for row in 1..=2 {
            assert_eq!(text(row, 0).as_deref(), Some("40"));
            assert_eq!(text(row, 1).as_deref(), Some("TRUE"));
            assert_eq!(text(row, 2).as_deref(), Some("2021-03-04"));
            assert_eq!(text(row, 3).as_deref(), Some("01:02:03"));
            assert_eq!(sheet.get(row, 4).map(|cell| cell.kind), Some(CellType::Error));
        }
        assert_eq!(sheet.used_range().map(|bounds| bounds.to_string()).as_deref(), Some("A1:E3"));
    }

    #[test]
    fn huge_repeat_counts_saturate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.ods");
        let max = usize::MAX;
        let body = format!(
            r#"<table:table table:name="Padded">
  <table:table-row>
    <table:table-cell office:value-type="string"><text:p>Name</text:p></table:table-cell>
    <table:table-cell table:number-columns-repeated="{max}"/>
    <table:table-cell table:number-columns-repeated="{max}"/>
  </table:table-row>
  <table:table-row table:number-rows-repeated="{max}"><table:table-cell/></table:table-row>
  <table:table-row table:number-rows-repeated="{max}"><table:table-cell/></table:table-row>
</table:table>"#
        );
        write_zip(&path, &[("content.xml", &content(&body))]);

        let sheets = read(&path).unwrap();
        let sheet = &sheets[0];
        assert_eq!(sheet.get(0, 0).map(|cell| cell.to_text().unwrap()).as_deref(), Some("Name"));
        assert_eq!(sheet.used_range().map(|bounds| bounds.to_string()).as_deref(), Some("A1:A1"));
    }

    #[test]
    fn read_several_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("many.ods");
        write_ods(
            &path,
            &[
                ("First", vec![vec!["Name", "Value"], vec!["a", "1"]]),
                ("Charge_Controller", vec![vec!["key", "value"]]),
            ],
        );

        let sheets = read(&path).unwrap();
        let names: Vec<&str> = sheets.iter().map(|sheet| sheet.name.as_str()).collect();
        assert_eq!(names, ["First", "Charge_Controller"]);
        assert_eq!(sheets[0].get(1, 1).map(|cell| cell.kind), Some(CellType::Number));
    }

    #[test]
    fn wrong_mime_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("text.ods");
        write_zip(
            &path,
            &[("mimetype", "application/vnd.oasis.opendocument.text"), ("content.xml", &content(""))],
        );

        assert!(matches!(
            OdsSpreadsheet::open(&path),
            Err(SheetMapperError::OdsError(OdsError::MimeTypeError))
        ));
    }

    #[test]
    fn encrypted_workbook_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.ods");
        let manifest = r#"<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0">
  <manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml">
    <manifest:encryption-data manifest:checksum-type="SHA1/1K"/>
  </manifest:file-entry>
</manifest:manifest>"#;
        write_zip(&path, &[("META-INF/manifest.xml", manifest), ("content.xml", &content(""))]);

        assert!(matches!(
            OdsSpreadsheet::open(&path),
            Err(SheetMapperError::SpreadsheetError(SpreadsheetError::SpreadsheetPasswordProtectedError(_)))
        ));
    }

    #[test]
    fn workbook_without_tables_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.ods");
        write_zip(&path, &[("content.xml", &content(""))]);

        let error = read(&path).unwrap_err();
        assert!(error.to_string().contains("has no worksheets"), "{error}");
    }
}
