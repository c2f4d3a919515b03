//! qp-ex (Export) - Production store exporter
//!
//! Projects every approved question of the working store into a fresh
//! production database and swaps it into place. The working store is opened
//! read-only.

use anyhow::Result;
use clap::Parser;
use qp_common::config::{self, RootFolderInitializer, RootFolderResolver};
use qp_ex::{ExportOptions, Exporter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Command-line arguments for qp-ex
#[derive(Parser, Debug)]
#[command(name = "qp-ex")]
#[command(about = "Export approved quiz questions to the production store")]
#[command(version)]
struct Cli {
    /// Root folder holding the pipeline data
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Production store path (overrides the configured location)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Restrict a dry run or listing to one category
    #[arg(long)]
    category: Option<String>,

    /// Read, project and validate without writing the production store
    #[arg(long)]
    dry_run: bool,

    /// Show question counts per category and review status, then exit
    #[arg(long)]
    list: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let toml = config::load_or_default();
    qp_common::logging::init_logging(&toml.logging, cli.verbose)?;
    info!("Starting QuizPipe Export (qp-ex) v{}", env!("CARGO_PKG_VERSION"));

    if cli.category.is_some() && !(cli.dry_run || cli.list) {
        eprintln!("error: --category is only accepted with --dry-run or --list; a production export covers every category");
        return Ok(ExitCode::FAILURE);
    }

    let production_override = cli.output.clone().or_else(|| toml.production_path.clone());
    let root_folder = RootFolderResolver::new("export")
        .with_cli_arg(cli.root_folder.clone())
        .with_toml(toml)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder).with_production_path(production_override);

    let db_path = initializer.database_path();
    let output = initializer.production_path();
    info!("Working store: {} (read-only)", db_path.display());
    info!("Production store: {}", output.display());

    match run(&cli, &db_path, output).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("Export failed: {:#}", e);
            eprintln!("error: {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: &Cli, db_path: &std::path::Path, output: PathBuf) -> Result<()> {
    let exporter = Exporter::open(db_path, output).await?;

    if cli.list {
        let listing = exporter.list(cli.category.as_deref()).await?;
        println!(
            "{:<20} {:>8} {:>8} {:>8}",
            "category", "approved", "pending", "rejected"
        );
        for (category, counts) in listing {
            println!(
                "{:<20} {:>8} {:>8} {:>8}",
                category, counts.approved, counts.pending, counts.rejected
            );
        }
        return Ok(());
    }

    let options = ExportOptions {
        dry_run: cli.dry_run,
        category: cli.category.clone(),
    };
    let report = exporter.run(&options).await?;
    println!("{}", report);
    Ok(())
}
