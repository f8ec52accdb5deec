//! Converts one uploaded workbook: every worksheet to its own JSON file, the
//! merged header mapping to one more file, then removes the upload.

use crate::config::Config;
use crate::error::ResultMessage;
use crate::error::SheetMapperError;
use crate::extract::extract_sheet;
use crate::layout::LayoutTable;
use crate::mapping::build_mapping;
use crate::mapping::MappingTable;
use crate::output::mapping_path;
use crate::output::to_pretty_json;
use crate::output::worksheet_path;
use crate::spreadsheet::open_spreadsheet;
use crate::spreadsheet::Sheet;
use log::error;
use log::info;
use log::warn;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Cannot derive a mapping name from '{0}': expected a path like 'uploads/US_2020.xlsx'")]
    MappingNameError(String),
}

/// One workbook to convert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub country: String,
    pub year: String,
    /// Workbook path, `/`-separated, e.g. `uploads/US_2020.xlsx`
    pub path: String,
}

/// What a [`process_file`] call produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessReport {
    /// Worksheet JSON files, in worksheet order
    pub worksheets: Vec<PathBuf>,
    /// Mapping file, `None` when no worksheet had any field
    pub mapping: Option<PathBuf>,
    /// Whether the source workbook was removed
    pub deleted: bool,
}

/// Takes the second `/`-separated segment of `path` up to its first `_`:
/// `uploads/US_2020.xlsx` gives `US`.
pub fn derive_mapping_name(path: &str) -> Result<String, ProcessError> {
    path.split('/')
        .nth(1)
        .and_then(|segment| segment.split('_').next())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ProcessError::MappingNameError(path.to_owned()))
}

/// Converts the workbook of `job`.
///
/// Worksheets are extracted in parallel on the blocking pool and joined in
/// worksheet order; the first failure is returned. Files already written are
/// left in place. Failing to remove the source only clears
/// [`ProcessReport::deleted`].
pub async fn process_file(job: &Job, config: &Config) -> Result<ProcessReport, SheetMapperError> {
    let mapping_name = derive_mapping_name(&job.path)?;
    let source = config.resolve(Path::new(&job.path));

    let sheets = load_sheets(source.clone()).await?;
    info!("Loaded {} worksheets from {}", sheets.len(), source.display());

    let json_dir = config.resolve(&config.json_dir);
    let layouts = Arc::new(config.layouts.clone());
    let mut handles = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        let target = worksheet_path(&json_dir, &job.country, &job.year, &sheet.name);
        let layouts = Arc::clone(&layouts);
        handles.push(tokio::task::spawn_blocking(move || convert_sheet(sheet, &layouts, target)));
    }

    let mut worksheets = Vec::with_capacity(handles.len());
    let mut mapping = MappingTable::new();
    for handle in handles {
        let (target, fragment) = handle.await??;
        mapping.merge(fragment);
        worksheets.push(target);
    }

    let mapping = if mapping.is_empty() {
        warn!("No field names found in {}, mapping not written", source.display());
        None
    } else {
        let target = mapping_path(&config.resolve(&config.mapping_dir), &mapping_name);
        tokio::fs::write(&target, to_pretty_json(&mapping)?)
            .await
            .map_err(SheetMapperError::from)
            .with_prefix(&format!("Write mapping '{}'", target.display()))?;
        info!("Wrote {} ({} fields)", target.display(), mapping.len());
        Some(target)
    };

    let deleted = match tokio::fs::remove_file(&source).await {
        Ok(()) => {
            info!("File deleted successfully: {}", source.display());
            true
        }
        Err(e) => {
            error!("Failed to delete {}: {}", source.display(), e);
            false
        }
    };

    Ok(ProcessReport {
        worksheets,
        mapping,
        deleted,
    })
}

async fn load_sheets(source: PathBuf) -> Result<Vec<Sheet>, SheetMapperError> {
    tokio::task::spawn_blocking(move || {
        open_spreadsheet(&source)
            .and_then(|mut spreadsheet| spreadsheet.read_sheets())
            .with_prefix(&format!("Load workbook '{}'", source.display()))
    })
    .await?
}

/// Extracts one worksheet, writes its JSON file and returns the mapping fragment.
fn convert_sheet(sheet: Sheet, layouts: &LayoutTable, target: PathBuf) -> Result<(PathBuf, MappingTable), SheetMapperError> {
    let result = extract_sheet(&sheet, layouts, &target)?;
    Ok((target, build_mapping(&result)))
}
