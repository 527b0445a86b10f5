//! Dataverse attribute exporter CLI.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::info;

use dataverse_attribute_exporter::config::{locate_config, Overrides, Settings};
use dataverse_attribute_exporter::export::{CsvReportWriter, ExportPipeline};
use dataverse_attribute_exporter::logging::{init_logging, LogConfig, LogFormat};
use dataverse_attribute_exporter::source::open_source;

#[derive(Parser)]
#[command(
    name = "dataverse-attribute-exporter",
    version,
    about = "Export publisher-owned tables and columns to a CSV report"
)]
struct Cli {
    /// Settings file (default: ./appsettings.json, then next to the executable).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Connection string, e.g. "AuthType=File;Path=metadata.json".
    #[arg(long, value_name = "CONNECTION")]
    connection: Option<String>,

    /// Publisher prefix to select; repeat for several, "" for out-of-the-box.
    #[arg(long = "prefix", value_name = "PREFIX")]
    prefixes: Vec<String>,

    /// Report file path.
    #[arg(long, short, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Keep non-custom entities matched by a publisher prefix.
    #[arg(long)]
    include_system_entities: bool,

    /// Only emit attributes owned by the prefix that matched their entity.
    #[arg(long)]
    exclude_non_owned_attributes: bool,

    /// Skip standard audit columns (createdon, ownerid, ...).
    #[arg(long)]
    skip_system_attributes: bool,

    /// Adjust log verbosity (-v debug, -vv trace, -q warnings, -qq errors).
    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,

    /// Log output format.
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Compact,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig::default()
        .with_level_filter(cli.verbosity.tracing_level_filter())
        .with_format(match cli.log_format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
        })
        .with_ansi(io::stderr().is_terminal());
    if let Err(e) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut settings = match locate_config(cli.config.as_deref()) {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            Settings::load(&path)?
        }
        None => {
            info!("No configuration file found, using command-line values");
            Settings::default()
        }
    };

    settings.apply(Overrides {
        connection: cli.connection,
        prefixes: cli.prefixes,
        output: cli.output,
        include_system_entities: cli.include_system_entities,
        exclude_non_owned_attributes: cli.exclude_non_owned_attributes,
        skip_system_attributes: cli.skip_system_attributes,
    });
    settings.validate()?;

    let criteria = settings.criteria();
    info!(prefixes = ?criteria.prefixes(), "Starting attribute export");

    let source = open_source(&settings.dataverse_settings.connection_string)?;
    let pipeline = ExportPipeline::new(source, CsvReportWriter::new(settings.output_path()));
    let result = pipeline.execute(&criteria).await?;

    match result.output {
        Some(output) => info!(
            records = result.stats.records_written,
            entities = result.stats.entities_selected,
            output = %output,
            "Export completed successfully"
        ),
        None => info!("Nothing to export"),
    }
    Ok(())
}
