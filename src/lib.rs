pub mod cli;
pub mod data;
pub mod dataset;
pub mod error;
pub mod image;
pub mod io_utils;
pub mod registry;
pub mod schema;
pub mod service;
pub mod stats;
pub mod table;
pub mod version;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    data::format_number,
    dataset::Dataset,
    registry::FileRegistry,
    schema::{InferenceOptions, SchemaSnapshot},
    service::DatasetService,
    stats::{ColumnStatistics, StatsOptions},
    version::{RefreshOutcome, Version},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("datasmith", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let registry = FileRegistry::open(&cli.registry)
        .with_context(|| format!("Opening registry at {:?}", cli.registry))?;
    match cli.command {
        Commands::Import(args) => handle_import(registry, &args),
        Commands::Refresh(args) => handle_refresh(registry, &args),
        Commands::List => handle_list(registry),
        Commands::Show(args) => handle_show(registry, &args),
        Commands::History(args) => handle_history(registry, &args),
        Commands::Stats(args) => handle_stats(registry, &args),
        Commands::Delete(args) => handle_delete(registry, &args),
    }
}

fn profiling_options(
    sample_rows: usize,
    delimiter: Option<u8>,
    encoding_label: Option<&str>,
    top: usize,
) -> Result<(InferenceOptions, StatsOptions)> {
    let encoding = io_utils::resolve_encoding(encoding_label)?;
    let inference = InferenceOptions {
        sample_rows,
        delimiter,
        encoding,
    };
    let stats = StatsOptions {
        top_values: top,
        delimiter,
        encoding,
    };
    Ok((inference, stats))
}

fn handle_import(registry: FileRegistry, args: &cli::ImportArgs) -> Result<()> {
    let (inference, stats) = profiling_options(
        args.sample_rows,
        args.delimiter,
        args.input_encoding.as_deref(),
        args.top,
    )?;
    let mut service = DatasetService::with_options(registry, inference, stats);
    let (dataset, version) = service
        .import(&args.input, args.name.clone())
        .with_context(|| format!("Importing {:?}", args.input))?;
    println!("Imported '{}' as dataset {}", dataset.name, dataset.id);
    print_schema(&version.schema);
    Ok(())
}

fn handle_refresh(registry: FileRegistry, args: &cli::RefreshArgs) -> Result<()> {
    let (inference, stats) = profiling_options(
        args.sample_rows,
        args.delimiter,
        args.input_encoding.as_deref(),
        args.top,
    )?;
    let mut service = DatasetService::with_options(registry, inference, stats);
    let dataset = service.resolve(&args.dataset)?;
    let (dataset, outcome) = service
        .refresh(dataset.id, args.force)
        .with_context(|| format!("Refreshing dataset '{}'", dataset.name))?;
    match outcome {
        RefreshOutcome::Recorded(version) => {
            println!(
                "Recorded version {} of '{}' ({} item(s))",
                version.sequence, dataset.name, version.item_count
            );
        }
        RefreshOutcome::Unchanged { sequence } => {
            println!(
                "No change since version {} of '{}'; nothing recorded (use --force to record anyway)",
                sequence, dataset.name
            );
        }
    }
    Ok(())
}

fn handle_list(registry: FileRegistry) -> Result<()> {
    let service = DatasetService::new(registry);
    let datasets = service.datasets()?;
    let mut rows = Vec::new();
    for dataset in &datasets {
        let versions = service.versions(dataset.id)?;
        let latest = versions.last();
        rows.push(vec![
            dataset.id.to_string(),
            dataset.name.clone(),
            dataset.format.to_string(),
            latest.map_or_else(String::new, |v| v.item_count.to_string()),
            versions.len().to_string(),
        ]);
    }
    let headers = ["id", "name", "format", "items", "versions"]
        .map(String::from)
        .to_vec();
    table::print_table(&headers, &rows);
    info!("Listed {} dataset(s)", datasets.len());
    Ok(())
}

fn handle_show(registry: FileRegistry, args: &cli::ShowArgs) -> Result<()> {
    let service = DatasetService::new(registry);
    let dataset = service.resolve(&args.dataset)?;
    let version = service.latest_version(dataset.id)?;
    print_dataset(&dataset, &version);
    print_schema(&version.schema);
    if let Some(target) = service.detect_target_column(&version) {
        println!("detected target column: {target}");
    }
    Ok(())
}

fn handle_history(registry: FileRegistry, args: &cli::ShowArgs) -> Result<()> {
    let service = DatasetService::new(registry);
    let dataset = service.resolve(&args.dataset)?;
    let versions = service.versions(dataset.id)?;
    let rows = versions
        .iter()
        .map(|version| {
            vec![
                version.sequence.to_string(),
                version.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                version.item_count.to_string(),
                short_digest(&version.source_digest),
            ]
        })
        .collect::<Vec<_>>();
    let headers = ["version", "created", "items", "digest"]
        .map(String::from)
        .to_vec();
    table::print_table(&headers, &rows);
    Ok(())
}

fn handle_stats(registry: FileRegistry, args: &cli::StatsArgs) -> Result<()> {
    let service = DatasetService::new(registry);
    let dataset = service.resolve(&args.dataset)?;
    let version = match args.version {
        Some(sequence) => service
            .versions(dataset.id)?
            .into_iter()
            .find(|v| v.sequence == sequence)
            .with_context(|| {
                format!("Dataset '{}' has no version {sequence}", dataset.name)
            })?,
        None => service.latest_version(dataset.id)?,
    };

    let mut rows = Vec::new();
    for (name, statistics) in &version.statistics {
        rows.push(match statistics {
            ColumnStatistics::Numeric(numeric) => vec![
                name.clone(),
                "numeric".to_string(),
                numeric.null_count.to_string(),
                numeric.min.map(format_number).unwrap_or_default(),
                numeric.max.map(format_number).unwrap_or_default(),
                numeric.mean.map(format_number).unwrap_or_default(),
                numeric.std_dev.map(format_number).unwrap_or_default(),
                String::new(),
            ],
            ColumnStatistics::Categorical(categorical) => vec![
                name.clone(),
                "categorical".to_string(),
                categorical.null_count.to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                format!(
                    "{} distinct: {}",
                    categorical.distinct,
                    categorical
                        .top
                        .iter()
                        .take(3)
                        .map(|v| format!("{} ({})", v.value, v.count))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ],
        });
    }
    let headers = [
        "column", "kind", "nulls", "min", "max", "mean", "std_dev", "values",
    ]
    .map(String::from)
    .to_vec();
    println!(
        "Statistics for '{}' version {} ({} item(s))",
        dataset.name, version.sequence, version.item_count
    );
    table::print_table(&headers, &rows);
    Ok(())
}

fn handle_delete(registry: FileRegistry, args: &cli::ShowArgs) -> Result<()> {
    let mut service = DatasetService::new(registry);
    let dataset = service.resolve(&args.dataset)?;
    service.delete(dataset.id)?;
    println!("Deleted dataset '{}' ({})", dataset.name, dataset.id);
    Ok(())
}

fn print_dataset(dataset: &Dataset, latest: &Version) {
    println!("dataset:  {} ({})", dataset.name, dataset.id);
    println!("source:   {}", dataset.source.display());
    println!(
        "format:   {} ({} bytes)",
        dataset.format, dataset.source_bytes
    );
    println!(
        "created:  {}",
        dataset.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "latest:   version {} with {} item(s)",
        latest.sequence, latest.item_count
    );
}

fn print_schema(snapshot: &SchemaSnapshot) {
    match snapshot {
        SchemaSnapshot::Tabular { columns, row_count } => {
            let rows = columns
                .iter()
                .map(|column| vec![column.name.clone(), column.datatype.to_string()])
                .collect::<Vec<_>>();
            let headers = ["column", "type"].map(String::from).to_vec();
            table::print_table(&headers, &rows);
            println!("{row_count} row(s)");
        }
        SchemaSnapshot::Image { image, item_count } => {
            println!(
                "{item_count} image(s), common header {}x{} {} ({} channel(s)), {} class(es)",
                image.width,
                image.height,
                image.format,
                image.channels,
                image.classes.len()
            );
        }
    }
}

fn short_digest(digest: &str) -> String {
    digest.chars().take(12).collect()
}
