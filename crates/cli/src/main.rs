//! KreditaX operator command line
//!
//! Thin wrapper over the scoring core: score an application from JSON,
//! query or export the audit trail, and inspect the loaded artifacts.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kreditax_core::{AuditQuery, CreditApplication, CreditScoringPipeline, ScoringConfig};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "kreditax")]
#[command(about = "Credit default risk scoring with explanations and audit trail", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file (KREDITAX_* environment variables override it)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one application
    Score {
        /// Application JSON file, or "-" for stdin
        #[arg(long, value_name = "PATH")]
        application: PathBuf,
        /// Caller-supplied request identifier (generated when absent)
        #[arg(long)]
        request_id: Option<String>,
        /// Operator recorded on the audit entry
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Audit trail operations
    Audit {
        #[command(subcommand)]
        action: AuditCommands,
    },
    /// Show loaded model and preprocessor details
    Inspect,
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Print matching records as JSON
    Query(AuditFilter),
    /// Write matching records as CSV
    Export {
        #[command(flatten)]
        filter: AuditFilter,
        /// Destination file (stdout when absent)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct AuditFilter {
    /// Inclusive lower bound (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,
    /// Inclusive upper bound (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,
    /// Maximum number of records, most recent kept
    #[arg(long, default_value_t = 100)]
    limit: usize,
}

impl AuditFilter {
    fn to_query(&self) -> Result<AuditQuery> {
        Ok(AuditQuery::parse(
            self.start.as_deref(),
            self.end.as_deref(),
            self.limit,
        )?)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ScoringConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config)?;

    let pipeline = CreditScoringPipeline::from_config(config).context("Failed to start scoring pipeline")?;

    match cli.command {
        Commands::Score {
            application,
            request_id,
            user_id,
        } => {
            let app = read_application(&application)?;
            let response = pipeline.score(&app, request_id.as_deref(), user_id.as_deref())?;
            print_json(&response)?;
        }
        Commands::Audit { action } => match action {
            AuditCommands::Query(filter) => {
                let records = pipeline.query_audit(&filter.to_query()?)?;
                print_json(&records)?;
            }
            AuditCommands::Export { filter, output } => {
                let bytes = pipeline.export_audit(&filter.to_query()?)?;
                match output {
                    Some(path) => {
                        fs::write(&path, &bytes)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        info!("Audit trail exported to {}", path.display());
                    }
                    None => io::stdout().write_all(&bytes)?,
                }
            }
        },
        Commands::Inspect => print_json(&pipeline.describe())?,
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` overrides the configured level.
/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(config: &ScoringConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .context("Failed to install log subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(io::stderr))
            .try_init()
            .context("Failed to install log subscriber")?;
    }

    Ok(())
}

fn read_application(path: &Path) -> Result<CreditApplication> {
    let json = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    };
    parse_application(&json)
}

fn parse_application(json: &str) -> Result<CreditApplication> {
    serde_json::from_str(json).context("Application is not valid JSON for the expected schema")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
