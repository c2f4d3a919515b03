//! qp-mf (Manifest) - Scrape and generation progress tracking
//!
//! Inspects and updates the manifest tree. Leaf commands (`start`, `record`,
//! `fail`, `generated`) re-aggregate every ancestor after saving.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qp_common::config::{self, RootFolderInitializer, RootFolderResolver};
use qp_mf::{Coordinate, ManifestError, ManifestNode, ManifestStore};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Command-line arguments for qp-mf
#[derive(Parser, Debug)]
#[command(name = "qp-mf")]
#[command(about = "Manifest store for QuizPipe scraping and generation progress")]
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

/// Coordinate of a manifest node; omit everything for the global node
#[derive(Args, Debug)]
struct CoordinateArgs {
    #[arg(long)]
    category: Option<String>,

    /// Series / topic
    #[arg(long, alias = "series")]
    topic: Option<String>,

    /// Season / part
    #[arg(long, alias = "season")]
    part: Option<u32>,

    /// Episode / chapter
    #[arg(long, alias = "episode")]
    chapter: Option<u32>,
}

impl CoordinateArgs {
    fn coordinate(&self) -> Result<Coordinate> {
        Ok(Coordinate::from_parts(
            self.category.as_deref(),
            self.topic.as_deref(),
            self.part,
            self.chapter,
        )?)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one node
    Show {
        #[command(flatten)]
        at: CoordinateArgs,
    },
    /// Create a node (fails if it exists)
    Init {
        #[command(flatten)]
        at: CoordinateArgs,
        /// Number of children this node should end up with
        #[arg(long)]
        expected: Option<u32>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Mark a leaf as being scraped
    Start {
        #[command(flatten)]
        at: CoordinateArgs,
        #[arg(long)]
        dry_run: bool,
    },
    /// Record obtained content for a leaf
    Record {
        #[command(flatten)]
        at: CoordinateArgs,
        #[arg(long)]
        source_url: Option<String>,
        #[arg(long, default_value = "0")]
        word_count: u64,
        #[arg(long)]
        quality: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Record unobtainable content for a leaf
    Fail {
        #[command(flatten)]
        at: CoordinateArgs,
        #[arg(long)]
        error: String,
        #[arg(long)]
        source_url: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Record generated question count for a leaf
    Generated {
        #[command(flatten)]
        at: CoordinateArgs,
        #[arg(long)]
        count: u32,
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-derive a node and its ancestors from their children
    Aggregate {
        #[command(flatten)]
        at: CoordinateArgs,
    },
    /// List a node and its descendants
    Tree {
        #[command(flatten)]
        at: CoordinateArgs,
        /// Maximum number of nodes to print
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let toml = config::load_or_default();
    qp_common::logging::init_logging(&toml.logging, cli.verbose)?;
    info!("Starting QuizPipe Manifest (qp-mf) v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new("manifest")
        .with_cli_arg(cli.root_folder.clone())
        .with_toml(toml)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;
    let store = ManifestStore::new(initializer.manifest_root());
    info!("Manifest root: {}", store.root().display());

    match run(&store, cli.command) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run(store: &ManifestStore, command: Command) -> Result<()> {
    match command {
        Command::Show { at } => {
            let coordinate = at.coordinate()?;
            match store.get(&coordinate)? {
                Some(node) => print_node_json(&node)?,
                None => return Err(ManifestError::NotFound(coordinate.to_string()).into()),
            }
        }
        Command::Init {
            at,
            expected,
            dry_run,
        } => {
            let coordinate = at.coordinate()?;
            if dry_run {
                if store.get(&coordinate)?.is_some() {
                    anyhow::bail!("manifest node already exists: {}", coordinate);
                }
                println!("[dry-run] would create {}", coordinate);
                print_node_json(&ManifestNode::new(coordinate, expected))?;
            } else {
                let node = store.init(&coordinate, expected)?;
                println!("created {}", coordinate);
                print_node_json(&node)?;
            }
        }
        Command::Start { at, dry_run } => {
            update_leaf(store, &at, dry_run, |node| node.mark_in_progress())?;
        }
        Command::Record {
            at,
            source_url,
            word_count,
            quality,
            dry_run,
        } => {
            update_leaf(store, &at, dry_run, |node| {
                node.record_content(source_url, word_count, quality)
            })?;
        }
        Command::Fail {
            at,
            error,
            source_url,
            dry_run,
        } => {
            update_leaf(store, &at, dry_run, |node| node.record_failure(&error, source_url))?;
        }
        Command::Generated { at, count, dry_run } => {
            update_leaf(store, &at, dry_run, |node| node.record_generation(count))?;
        }
        Command::Aggregate { at } => {
            let coordinate = at.coordinate()?;
            let node = store.recompute_aggregate(&coordinate)?;
            println!("{} -> {}", node.coordinate, node.status);
        }
        Command::Tree { at, limit } => {
            let coordinate = at.coordinate()?;
            let nodes = store.walk(&coordinate)?;
            let shown = limit.unwrap_or(nodes.len()).min(nodes.len());
            for node in &nodes[..shown] {
                print_tree_line(node);
            }
            if shown < nodes.len() {
                println!("... {} more", nodes.len() - shown);
            }
        }
    }
    Ok(())
}

fn update_leaf<F>(store: &ManifestStore, at: &CoordinateArgs, dry_run: bool, mutate: F) -> Result<()>
where
    F: FnOnce(&mut ManifestNode) -> qp_mf::Result<()>,
{
    let coordinate = at.coordinate()?;
    if dry_run {
        let mut node = store
            .get(&coordinate)?
            .unwrap_or_else(|| ManifestNode::new(coordinate.clone(), None));
        mutate(&mut node)?;
        println!("[dry-run] would save {} as {}", coordinate, node.status);
        print_node_json(&node)?;
        return Ok(());
    }

    let node = store
        .update_leaf(&coordinate, mutate)
        .with_context(|| format!("updating {}", coordinate))?;
    println!("{} -> {}", coordinate, node.status);

    let mut ancestor = coordinate.parent();
    while let Some(coord) = ancestor {
        if let Some(parent) = store.get(&coord)? {
            println!("  {} -> {}", coord, parent.status);
        }
        ancestor = coord.parent();
    }
    Ok(())
}

fn print_node_json(node: &ManifestNode) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(node)?);
    Ok(())
}

fn print_tree_line(node: &ManifestNode) {
    let indent = match node.coordinate.level() {
        qp_mf::Level::Global => 0,
        qp_mf::Level::Series => 1,
        qp_mf::Level::Season => 2,
        qp_mf::Level::Episode => 3,
    };
    let detail = if node.coordinate.is_leaf() {
        match &node.content {
            Some(content) if content.present => format!("{} words", content.word_count),
            Some(content) => content.error.clone().unwrap_or_default(),
            None => String::new(),
        }
    } else {
        let c = &node.children;
        format!(
            "{} complete, {} failed, {} partial, {} in-progress, {} not-started",
            c.complete, c.failed, c.partial, c.in_progress, c.not_started
        )
    };
    println!(
        "{}{} [{}] {}",
        "  ".repeat(indent),
        node.coordinate,
        node.status,
        detail
    );
}
