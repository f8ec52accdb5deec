use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use log::info;
use sheet_mapper::process_file;
use sheet_mapper::Config;
use sheet_mapper::Job;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sheet-mapper", version, about = "Convert a workbook to JSON records and a field-name mapping")]
struct Cli {
    /// Country code used in output file names.
    #[arg(long)]
    country: String,

    /// Year used in output file names.
    #[arg(long)]
    year: String,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory relative paths are resolved against (overrides the config file).
    #[arg(long = "base-dir")]
    base_dir: Option<PathBuf>,

    /// Directory for worksheet JSON files (overrides the config file).
    #[arg(long = "json-dir")]
    json_dir: Option<PathBuf>,

    /// Directory for the mapping file (overrides the config file).
    #[arg(long = "mapping-dir")]
    mapping_dir: Option<PathBuf>,

    /// Workbook to convert, e.g. `uploads/US_2020.xlsx`. Removed once converted.
    path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(base_dir) = cli.base_dir {
        config.base_dir = base_dir;
    }
    if let Some(json_dir) = cli.json_dir {
        config.json_dir = json_dir;
    }
    if let Some(mapping_dir) = cli.mapping_dir {
        config.mapping_dir = mapping_dir;
    }

    let job = Job {
        country: cli.country,
        year: cli.year,
        path: cli.path,
    };
    let report = process_file(&job, &config)
        .await
        .with_context(|| format!("Failed to process {}", job.path))?;

    info!(
        "Converted {} worksheets of {}{}",
        report.worksheets.len(),
        job.path,
        if report.deleted { "" } else { " (source kept)" }
    );
    Ok(())
}
