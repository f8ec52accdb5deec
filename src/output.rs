use crate::error::SheetMapperError;
use log::info;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use std::path::Path;
use std::path::PathBuf;

/// `{json_dir}/{country}_{year}_{sheet}.json`
pub fn worksheet_path(json_dir: &Path, country: &str, year: &str, sheet: &str) -> PathBuf {
    json_dir.join(format!("{country}_{year}_{sheet}.json"))
}

/// `{mapping_dir}/{name}.json`
pub fn mapping_path(mapping_dir: &Path, name: &str) -> PathBuf {
    mapping_dir.join(format!("{name}.json"))
}

/// Serializes `value` as JSON indented with four spaces.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SheetMapperError> {
    let mut buffer = Vec::with_capacity(1024);
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Writes `value` to `path`, replacing an existing file. The parent directory must exist.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SheetMapperError> {
    std::fs::write(path, to_pretty_json(value)?)?;
    info!("Wrote {}", path.display());
    Ok(())
}
