//! Workbook fixtures written on the fly for unit tests.
//!
//! In the row grids, a numeric string becomes a number cell and an empty
//! string leaves the cell out; everything else is written as text.

use crate::spreadsheet::reference::index_to_reference;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub(crate) type Rows<'a> = Vec<Vec<&'a str>>;

/// Writes a ZIP archive with the given `(part name, content)` entries.
pub(crate) fn write_zip(path: &Path, parts: &[(&str, &str)]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, content) in parts {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Writes a minimal `.xlsx` workbook with inline strings.
pub(crate) fn write_xlsx(path: &Path, sheets: &[(&str, Rows)]) {
    let mut relationships = String::new();
    let mut entries = String::new();
    let mut parts = Vec::<(String, String)>::new();
    for (index, (name, rows)) in sheets.iter().enumerate() {
        let number = index + 1;
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#
        ));
        entries.push_str(&format!(r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#, escape(name)));

        let mut data = String::new();
        for (row, cells) in rows.iter().enumerate() {
            data.push_str(&format!(r#"<row r="{}">"#, row + 1));
            for (col, text) in cells.iter().enumerate() {
                let reference = index_to_reference(row, col);
                if text.is_empty() {
                    continue;
                } else if is_number(text) {
                    data.push_str(&format!(r#"<c r="{reference}"><v>{text}</v></c>"#));
                } else {
                    data.push_str(&format!(r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#, escape(text)));
                }
            }
            data.push_str("</row>");
        }
        parts.push((
            format!("xl/worksheets/sheet{number}.xml"),
            format!(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{data}</sheetData></worksheet>"#),
        ));
    }
    parts.push((
        "xl/_rels/workbook.xml.rels".to_owned(),
        format!(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#),
    ));
    parts.push((
        "xl/workbook.xml".to_owned(),
        format!(
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{entries}</sheets></workbook>"#
        ),
    ));

    let parts: Vec<(&str, &str)> = parts.iter().map(|(name, content)| (name.as_str(), content.as_str())).collect();
    write_zip(path, &parts);
}

/// Writes a minimal `.ods` workbook.
pub(crate) fn write_ods(path: &Path, sheets: &[(&str, Rows)]) {
    let mut tables = String::new();
    for (name, rows) in sheets {
        tables.push_str(&format!(r#"<table:table table:name="{}">"#, escape(name)));
        for cells in rows {
            tables.push_str("<table:table-row>");
            for text in cells {
                if text.is_empty() {
                    tables.push_str("<table:table-cell/>");
                } else if is_number(text) {
                    tables.push_str(&format!(r#"<table:table-cell office:value-type="float" office:value="{text}"/>"#));
                } else {
                    tables.push_str(&format!(
                        r#"<table:table-cell office:value-type="string"><text:p>{}</text:p></table:table-cell>"#,
                        escape(text)
                    ));
                }
            }
            tables.push_str("</table:table-row>");
        }
        tables.push_str("</table:table>");
    }
    let content = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0"><office:body><office:spreadsheet>{tables}</office:spreadsheet></office:body></office:document-content>"#
    );
    write_zip(
        path,
        &[("mimetype", "application/vnd.oasis.opendocument.spreadsheet"), ("content.xml", &content)],
    );
}

fn escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}

fn is_number(text: &str) -> bool {
    text.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}
