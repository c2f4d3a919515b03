//! qp-lc (Lifecycle) - Question generation, review and repair
//!
//! Reads a batch from stdin (or `--input`), applies it to the working
//! question store in one transaction and prints a per-item report. Exits
//! non-zero when any item fails a validation or precondition check.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qp_common::config::{self, RootFolderInitializer, RootFolderResolver};
use qp_common::db::Question;
use qp_lc::input::{parse_batch, parse_batch_items};
use qp_lc::{
    BatchItem, BatchReport, Candidate, LifecycleEngine, LifecycleError, RepairSubmission,
    ReviewDecision, RunOptions, Scope, Stage,
};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Command-line arguments for qp-lc
#[derive(Parser, Debug)]
#[command(name = "qp-lc")]
#[command(about = "Question lifecycle engine: generate, review and repair quiz questions")]
#[command(version)]
struct Cli {
    /// Root folder holding the pipeline data
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct StageArgs {
    #[arg(long)]
    category: String,

    #[arg(long)]
    topic: Option<String>,

    #[arg(long)]
    part: Option<i64>,

    #[arg(long)]
    chapter: Option<i64>,

    /// Append to an occupied coordinate (generate) or re-review decided rows (review)
    #[arg(long)]
    force: bool,

    /// Validate and report without persisting anything
    #[arg(long)]
    dry_run: bool,

    /// Show the rows this stage would act on, then exit
    #[arg(long)]
    list: bool,

    /// Process at most this many items
    #[arg(long)]
    limit: Option<usize>,

    /// Read the batch from a file instead of stdin
    #[arg(long)]
    input: Option<PathBuf>,
}

impl StageArgs {
    fn scope(&self) -> Scope {
        Scope {
            category: self.category.clone(),
            topic: self.topic.clone(),
            part: self.part,
            chapter: self.chapter,
        }
    }

    fn options(&self) -> RunOptions {
        RunOptions {
            force: self.force,
            dry_run: self.dry_run,
            limit: self.limit,
        }
    }

    /// Whether this invocation may leave anything on disk
    fn persists(&self) -> bool {
        !(self.dry_run || self.list)
    }

    fn read_input(&self) -> Result<String> {
        let raw = match &self.input {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .context("reading batch from stdin")?;
                buffer
            }
        };
        Ok(raw)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert candidate questions as pending rows (requires --topic)
    Generate(StageArgs),
    /// Apply approve/reject decisions (all or nothing)
    Review(StageArgs),
    /// Insert corrected rows for rejected questions
    Repair(StageArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let toml = config::load_or_default();
    qp_common::logging::init_logging(&toml.logging, cli.verbose)?;
    info!("Starting QuizPipe Lifecycle (qp-lc) v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new("lifecycle")
        .with_cli_arg(cli.root_folder.clone())
        .with_toml(toml)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    let persists = cli.command.args().persists();
    if persists {
        initializer.ensure_directory_exists()?;
    }

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let engine = LifecycleEngine::open(&db_path, persists).await?;

    let result = run(&engine, cli.command).await;
    match result {
        Ok(code) => Ok(code),
        Err(e) => {
            if let Some(LifecycleError::BatchRejected(report)) = e.downcast_ref::<LifecycleError>() {
                println!("{}", report);
            }
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

impl Command {
    fn stage(&self) -> Stage {
        match self {
            Command::Generate(_) => Stage::Generate,
            Command::Review(_) => Stage::Review,
            Command::Repair(_) => Stage::Repair,
        }
    }

    fn args(&self) -> &StageArgs {
        match self {
            Command::Generate(args) | Command::Review(args) | Command::Repair(args) => args,
        }
    }
}

async fn run(engine: &LifecycleEngine, command: Command) -> Result<ExitCode> {
    let (stage, args) = (command.stage(), command.args());
    let scope = args.scope();

    if args.list {
        let rows = engine.list(&scope, stage, args.limit).await?;
        print_listing(stage, &rows);
        return Ok(ExitCode::SUCCESS);
    }

    let report = match stage {
        Stage::Generate => {
            let candidates: Vec<BatchItem<Candidate>> = parse_batch_items(&args.read_input()?)?;
            engine.generate_batch(&scope, &candidates, args.options()).await?
        }
        Stage::Review => {
            let decisions: Vec<ReviewDecision> = parse_batch(&args.read_input()?)?;
            engine.review(&scope, &decisions, args.options()).await?
        }
        Stage::Repair => {
            let submissions: Vec<BatchItem<RepairSubmission>> =
                parse_batch_items(&args.read_input()?)?;
            engine.repair_batch(&scope, &submissions, args.options()).await?
        }
    };

    Ok(exit_code(&report))
}

fn exit_code(report: &BatchReport) -> ExitCode {
    println!("{}", report);
    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_listing(stage: Stage, rows: &[Question]) {
    for q in rows {
        let lineage = q.repair_of.map(|id| format!(" repairs {}", id)).unwrap_or_default();
        println!(
            "{:>6}  {:<8} {:<6} {}{}  {}",
            q.id,
            q.review_status,
            q.difficulty,
            q.coordinate(),
            lineage,
            q.question
        );
        if let Some(notes) = &q.review_notes {
            println!("        notes: {}", notes);
        }
    }
    println!("{}: {} row(s)", stage, rows.len());
}
