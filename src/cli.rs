use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Default registry root, relative to the working directory.
pub const DEFAULT_REGISTRY_DIR: &str = ".datasmith";

#[derive(Debug, Parser)]
#[command(author, version, about = "Version and profile machine-learning datasets", long_about = None)]
pub struct Cli {
    /// Registry directory holding dataset records
    #[arg(long, global = true, default_value = DEFAULT_REGISTRY_DIR)]
    pub registry: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a CSV/JSON file or image directory and record version 1
    Import(ImportArgs),
    /// Re-profile a dataset's source and append the next version
    Refresh(RefreshArgs),
    /// List registered datasets
    List,
    /// Show one dataset's record and latest schema
    Show(ShowArgs),
    /// Show the full version history of a dataset
    History(ShowArgs),
    /// Print the statistics snapshot of a recorded version
    Stats(StatsArgs),
    /// Delete a dataset together with its version history
    Delete(ShowArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Source file or image directory
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Dataset name (defaults to the file name)
    #[arg(short, long)]
    pub name: Option<String>,
    /// Rows sampled when inferring column types (0 means full scan)
    #[arg(long, default_value_t = crate::schema::DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// Delimiter character for delimited sources (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Frequency-table entries kept per categorical column (0 keeps all)
    #[arg(long, default_value_t = crate::stats::DEFAULT_TOP_VALUES)]
    pub top: usize,
}

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Dataset id or unique name
    pub dataset: String,
    /// Record a version even when schema and item count are unchanged
    #[arg(long)]
    pub force: bool,
    /// Rows sampled when inferring column types (0 means full scan)
    #[arg(long, default_value_t = crate::schema::DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// Delimiter character for delimited sources
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Frequency-table entries kept per categorical column (0 keeps all)
    #[arg(long, default_value_t = crate::stats::DEFAULT_TOP_VALUES)]
    pub top: usize,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Dataset id or unique name
    pub dataset: String,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Dataset id or unique name
    pub dataset: String,
    /// Version sequence number (defaults to the latest)
    #[arg(long)]
    pub version: Option<u32>,
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value.to_ascii_lowercase().as_str() {
        "tab" | "\\t" => return Ok(b'\t'),
        "comma" => return Ok(b','),
        _ => {}
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => Err(format!(
            "Delimiter must be a single ASCII character, 'tab', or 'comma'; got '{value}'"
        )),
    }
}
