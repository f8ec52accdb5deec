use crate::error::ResultMessage;
use crate::error::SheetMapperError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::DateEpoch;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use zip::ZipArchive;

// Local element names in SpreadsheetML parts
const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_WORKBOOK_PROPERTIES: &[u8] = b"workbookPr";
const TAG_SHEET: &[u8] = b"sheet";
const TAG_CUSTOM_FORMATS: &[u8] = b"numFmts";
const TAG_CUSTOM_FORMAT: &[u8] = b"numFmt";
const TAG_FORMAT_INDEXES: &[u8] = b"cellXfs";
const TAG_FORMAT_INDEX: &[u8] = b"xf";
const TAG_SHARED_STRING_ITEM: &[u8] = b"si";
const TAG_PHONETIC_TEXT: &[u8] = b"rPh";
const TAG_TEXT: &[u8] = b"t";
const TAG_ROW: &[u8] = b"row";
const TAG_CELL: &[u8] = b"c";
const TAG_INLINE_STRING: &[u8] = b"is";
const TAG_VALUE: &[u8] = b"v";

pub(crate) struct XlsxSpreadsheet {
    name: String,
    zip: ZipArchive<BufReader<File>>,
    /// Cell type implied by each cell style, indexed by the `s` attribute
    number_formats: Vec<CellType>,
    shared_strings: Vec<String>,
    /// Worksheets as `(name, part path)`, in workbook order
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    pub(crate) fn open(path: &Path) -> Result<XlsxSpreadsheet, SheetMapperError> {
        let name = path.display().to_string();
        let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;
        let (sheets, epoch) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?;
        }
        let number_formats = load_number_formats(&mut zip, epoch)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        Ok(XlsxSpreadsheet {
            name,
            zip,
            number_formats,
            shared_strings,
            sheets,
        })
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn read_sheets(&mut self) -> Result<Vec<Sheet>, SheetMapperError> {
        let mut sheets = Vec::with_capacity(self.sheets.len());
        for (sheet_name, zip_path) in &self.sheets {
            let mut reader = self
                .zip
                .xml_reader(zip_path)?
                .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
            let sheet = read_sheet(&mut reader, sheet_name, &self.number_formats, &self.shared_strings)
                .with_prefix(&format!("Read sheet '{}' of '{}'", sheet_name, self.name))?;
            sheets.push(sheet);
        }
        Ok(sheets)
    }
}

/// Parses one worksheet part into a [`Sheet`].
fn read_sheet<R: BufRead>(
    reader: &mut XmlReader<R>,
    sheet_name: &str,
    number_formats: &[CellType],
    shared_strings: &[String],
) -> Result<Sheet, SheetMapperError> {
    let mut sheet = Sheet::new(sheet_name);
    // Fallback position for rows and cells written without an `r` attribute
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut row = 0usize;
    let mut col = 0usize;
    let mut kind = CellType::default();
    let mut value = String::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_ROW => {
            if let Some(number) = event.parse_attribute_value::<usize>("r")? {
                next_row = number.saturating_sub(1);
            }
            next_col = 0;
        }
        Event::End(event) if event.local_name().as_ref() == TAG_ROW => {
            next_row += 1;
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_CELL => {
            (row, col) = event
                .get_attribute_value("r")?
                .and_then(|reference| reference_to_index(&reference))
                .unwrap_or((next_row, next_col));
            next_col = col + 1;
            value.clear();
            kind = match event.get_attribute_value("t")?.as_deref() {
                Some("inlineStr") | Some("str") => CellType::Text,
                Some("s") => CellType::SharedString,
                Some("d") => CellType::IsoDateTime,
                Some("b") => CellType::Boolean,
                Some("e") => CellType::Error,
                _ => CellType::Number,
            };
            if kind == CellType::Number {
                if let Some(style) = event.parse_attribute_value::<usize>("s")? {
                    kind = number_formats.get(style).copied().unwrap_or(CellType::Number);
                }
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_INLINE_STRING => {
            value = read_string_value(reader, TAG_INLINE_STRING, false)?;
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_VALUE => {
            value = read_string_value(reader, TAG_VALUE, true)?;
        }
        Event::End(event) if event.local_name().as_ref() == TAG_CELL => {
            if kind == CellType::SharedString && !value.is_empty() {
                let index = value.trim().parse::<usize>()?;
                value = shared_strings.get(index).cloned().ok_or_else(|| SpreadsheetError::InvalidCellValue {
                    position: crate::spreadsheet::reference::index_to_reference(row, col),
                    message: format!("shared string {index} does not exist"),
                })?;
                kind = CellType::Text;
            }
            if kind != CellType::Empty && !value.is_empty() {
                sheet.push(Cell {
                    row,
                    col,
                    kind,
                    value: std::mem::take(&mut value),
                });
            }
            kind = CellType::Empty;
        }
    });
    Ok(sheet)
}

/// Reads `xl/workbook.xml`: worksheet names with their part paths, and the date system.
fn load_workbook(zip: &mut ZipArchive<BufReader<File>>) -> Result<(Vec<(String, String)>, DateEpoch), SheetMapperError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_owned()))?;
    let mut sheets = Vec::<(String, String)>::new();
    let mut epoch = DateEpoch::Epoch1900;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for attribute in event.attributes() {
                let attribute = attribute?;
                match attribute.key.local_name().as_ref() {
                    b"name" => name = Some(attribute.get_value()?),
                    b"id" => id = Some(attribute.get_value()?),
                    _ => (),
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.into_owned(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_WORKBOOK_PROPERTIES => {
            let is_1904 = event
                .get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
            if is_1904 {
                epoch = DateEpoch::Epoch1904;
            }
        }
    });
    Ok((sheets, epoch))
}

/// Maps relationship ids to worksheet part paths.
fn load_relationships(zip: &mut ZipArchive<BufReader<File>>, path: &str) -> Result<HashMap<String, String>, SheetMapperError> {
    let mut reader = zip
        .xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_owned()))?;
    let mut relationships = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|kind| kind.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.into_owned(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves a relationship target, relative to `xl/` unless absolute.
fn to_zip_path(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_owned()
    } else if target.starts_with("xl/") {
        target.to_owned()
    } else {
        format!("xl/{target}")
    }
}

/// Reads `xl/styles.xml` and returns the cell type each cell style implies.
fn load_number_formats(zip: &mut ZipArchive<BufReader<File>>, epoch: DateEpoch) -> Result<Vec<CellType>, SheetMapperError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_ids = Vec::<String>::new();
    let mut in_custom_formats = false;
    let mut in_format_indexes = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => in_custom_formats = true,
        Event::End(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => in_custom_formats = false,
        Event::Start(event) if in_custom_formats && event.local_name().as_ref() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.into_owned(), CellType::from_custom_format(&format, epoch));
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => in_format_indexes = true,
        Event::End(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => in_format_indexes = false,
        Event::Start(event) if in_format_indexes && event.local_name().as_ref() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?.unwrap_or(Cow::Borrowed("0"));
            format_ids.push(id.into_owned());
        }
    });

    Ok(format_ids
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::from_builtin_format(id, epoch))
                .unwrap_or(CellType::Number)
        })
        .collect())
}

/// Reads the shared string table; a workbook without one has no shared strings.
fn load_shared_strings(zip: &mut ZipArchive<BufReader<File>>) -> Result<Vec<String>, SheetMapperError> {
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };
    let mut shared_strings = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Collects the text up to the end of `end_tag`, skipping phonetic runs.
/// With `is_text_content` the element's own character data counts as text;
/// otherwise only `<t>` children do.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: &[u8],
    is_text_content: bool,
) -> Result<String, SheetMapperError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.local_name().as_ref() == TAG_TEXT => is_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_TEXT => is_text = is_text_content,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_xlsx;
    use crate::testing::write_zip;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#;
    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    fn workbook(date1904: bool) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <workbookPr date1904="{}"/>
  <sheets><sheet name="Readings" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
            if date1904 { "1" } else { "0" }
        )
    }

    #[test]
    fn read_shared_strings_styles_and_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styled.xlsx");
        let styles = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy\-mm\-dd"/></numFmts>
  <cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="164"/><xf numFmtId="20"/></cellXfs>
</styleSheet>"#;
        let shared = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3">
  <si><t>Date</t></si>
  <si><r><t>Out</t></r><r><t>put &amp; Load</t></r></si>
  <si><t>Site</t><rPh><t>ignored</t></rPh></si>
</sst>"#;
        let sheet = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
  <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c><c r="D1" t="inlineStr"><is><t>Ok</t></is></c></row>
  <row r="2"><c r="A2" s="1"><v>44197</v></c><c r="B2"><v>12.5</v></c><c r="C2" t="str"><f>"N"&amp;1</f><v>N1</v></c><c r="D2" t="b"><v>1</v></c></row>
  <row r="3"><c r="A3" s="2"><v>0.5</v></c><c r="B3" t="e"><v>#DIV/0!</v></c><c r="C3" s="1"/></row>
</sheetData></worksheet>"#;
        write_zip(
            &path,
            &[
                ("[Content_Types].xml", CONTENT_TYPES),
                ("xl/_rels/workbook.xml.rels", RELS),
                ("xl/workbook.xml", &workbook(false)),
                ("xl/styles.xml", styles),
                ("xl/sharedStrings.xml", shared),
                ("xl/worksheets/sheet1.xml", sheet),
            ],
        );

        let mut spreadsheet = XlsxSpreadsheet::open(&path).unwrap();
        let sheets = spreadsheet.read_sheets().unwrap();
        assert_eq!(sheets.len(), 1);
        let sheet = &sheets[0];
        assert_eq!(sheet.name, "Readings");

        let text = |row, col| sheet.get(row, col).map(|cell| cell.to_text().unwrap());
        assert_eq!(text(0, 0).as_deref(), Some("Date"));
        assert_eq!(text(0, 1).as_deref(), Some("Output & Load"));
        assert_eq!(text(0, 2).as_deref(), Some("Site"));
        assert_eq!(text(0, 3).as_deref(), Some("Ok"));
        assert_eq!(text(1, 0).as_deref(), Some("2021-01-01"));
        assert_eq!(text(1, 1).as_deref(), Some("12.5"));
        assert_eq!(text(1, 2).as_deref(), Some("N1"));
        assert_eq!(text(1, 3).as_deref(), Some("TRUE"));
        assert_eq!(text(2, 0).as_deref(), Some("12:00:00"));
        assert_eq!(sheet.get(2, 1).map(|cell| cell.kind), Some(CellType::Error));
        assert_eq!(sheet.get(2, 2), None);
    }

    #[test]
    fn read_1904_date_system() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mac.xlsx");
        let styles = r#"<styleSheet><cellXfs><xf numFmtId="0"/><xf numFmtId="14"/></cellXfs></styleSheet>"#;
        let sheet = r#"<worksheet><sheetData><row><c s="1"><v>0</v></c><c><v>7</v></c></row></sheetData></worksheet>"#;
        write_zip(
            &path,
            &[
                ("xl/_rels/workbook.xml.rels", RELS),
                ("xl/workbook.xml", &workbook(true)),
                ("xl/styles.xml", styles),
                ("xl/worksheets/sheet1.xml", sheet),
            ],
        );

        let sheets = XlsxSpreadsheet::open(&path).unwrap().read_sheets().unwrap();
        let sheet = &sheets[0];
        // cells without `r` attributes fall back to their position in the row
        assert_eq!(sheet.get(0, 0).map(|cell| cell.to_text().unwrap()).as_deref(), Some("1904-01-01"));
        assert_eq!(sheet.get(0, 1).map(|cell| cell.to_text().unwrap()).as_deref(), Some("7"));
    }

    #[test]
    fn read_several_sheets_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("many.xlsx");
        write_xlsx(
            &path,
            &[
                ("First", vec![vec!["Name", "Value"], vec!["a", "1"]]),
                ("Second", vec![vec!["Other"], vec!["b"]]),
            ],
        );

        let sheets = XlsxSpreadsheet::open(&path).unwrap().read_sheets().unwrap();
        let names: Vec<&str> = sheets.iter().map(|sheet| sheet.name.as_str()).collect();
        assert_eq!(names, ["First", "Second"]);
        assert_eq!(sheets[0].get(1, 1).map(|cell| cell.kind), Some(CellType::Number));
    }

    #[test]
    fn missing_workbook_part_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        write_zip(&path, &[("xl/_rels/workbook.xml.rels", RELS)]);

        assert!(matches!(
            XlsxSpreadsheet::open(&path),
            Err(SheetMapperError::SpreadsheetError(SpreadsheetError::FileError(part))) if part == "xl/workbook.xml"
        ));
    }

    #[test]
    fn not_a_zip_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.xlsx");
        std::fs::write(&path, "Name,Value\n").unwrap();

        assert!(matches!(XlsxSpreadsheet::open(&path), Err(SheetMapperError::ZipError(_))));
    }

    #[test]
    fn zip_paths() {
        assert_eq!(to_zip_path("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("/xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
    }
}
