//! Kneemark command-line entry point.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use kneemark::cli::{self, Command, Reply};
use kneemark::constants::STATUS_COMPLETE;
use kneemark::{
    AppConfig, FsWalker, HeadlessSurface, PersistenceAdapter, SequenceLocator, SessionController,
    StatusIndex,
};

#[derive(Parser, Debug)]
#[command(name = "kneemark")]
#[command(about = "Landmark annotation for knee MRI sequences", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset root holding the DATASET_<TYPE> directories
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Global status index file
    #[arg(long, global = true)]
    status_file: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add every sequence under the dataset root to the status index
    Init {
        /// Also overwrite every sequence record with an empty one and mark it incomplete
        #[arg(long)]
        reset_records: bool,
    },

    /// Show annotation progress per dataset type and individual
    Status,

    /// Annotate sequences interactively
    Annotate {
        /// Sequence directory to open (defaults to the next incomplete one)
        path: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();
    log::debug!("Using configuration {:?}", config);

    match cli.command {
        Commands::Init { reset_records } => init(&config, reset_records),
        Commands::Status => status(&config),
        Commands::Annotate { path } => annotate(&config, path),
    }
}

/// Config file, then environment, then command-line flags.
fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config =
        AppConfig::resolve(cli.config.as_deref()).context("Failed to load configuration")?;
    config
        .apply_env(|key| std::env::var(key).ok())
        .context("Invalid environment override")?;

    if let Some(base_dir) = &cli.base_dir {
        config.rebase(base_dir.clone());
    }
    if let Some(status_file) = &cli.status_file {
        config.status_file = status_file.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.parse()?;
    }
    Ok(config)
}

fn init(config: &AppConfig, reset_records: bool) -> anyhow::Result<()> {
    let locator = SequenceLocator::new(FsWalker::new(config.base_dir.clone()));
    let mut status = StatusIndex::load(config.status_file.clone())
        .with_context(|| format!("Failed to read {}", config.status_file.display()))?;

    if reset_records {
        let adapter = PersistenceAdapter::new(config.tables.clone());
        let reset = locator.reset_records(&adapter, &mut status)?;
        println!("Reset {} sequence records", reset);
    }

    let added = locator.populate_status(&mut status)?;
    println!(
        "{} sequences indexed in {} ({} new)",
        status.len(),
        config.status_file.display(),
        added
    );
    Ok(())
}

fn status(config: &AppConfig) -> anyhow::Result<()> {
    let status = StatusIndex::load(config.status_file.clone())
        .with_context(|| format!("Failed to read {}", config.status_file.display()))?;
    if status.is_empty() {
        println!(
            "No sequences indexed in {}, run `kneemark init` first",
            config.status_file.display()
        );
        return Ok(());
    }

    let locator = SequenceLocator::new(FsWalker::new(config.base_dir.clone()));
    let complete = |path: &Path| matches!(status.get(path), Ok(STATUS_COMPLETE));

    for dataset in locator.hierarchy()? {
        let marker = format!("/{}/", dataset.dataset_type.dir_name());
        let counts = status.counts_where(|key| key.contains(&marker));
        println!(
            "{:<18} {:>5} / {:<5} complete",
            dataset.dataset_type.dir_name(),
            counts.complete,
            counts.total()
        );
        for individual in &dataset.individuals {
            let sequences: Vec<&PathBuf> = individual
                .knees
                .iter()
                .flat_map(|knee| &knee.sequences)
                .collect();
            let done = sequences.iter().filter(|path| complete(path)).count();
            println!(
                "  {:<16} {:>5} / {:<5} complete",
                individual.id,
                done,
                sequences.len()
            );
        }
    }

    let counts = status.counts();
    println!(
        "{:<18} {:>5} / {:<5} complete",
        "total",
        counts.complete,
        counts.total()
    );
    Ok(())
}

fn annotate(config: &AppConfig, path: Option<PathBuf>) -> anyhow::Result<()> {
    let adapter = PersistenceAdapter::new(config.tables.clone());
    let status = StatusIndex::load(config.status_file.clone())
        .with_context(|| format!("Failed to read {}", config.status_file.display()))?;
    let mut controller = SessionController::new(adapter, status, HeadlessSurface::new());

    let first = match path {
        Some(path) => Command::Open(path),
        None => Command::OpenNext,
    };
    report(cli::execute(&mut controller, &first));
    println!("Type 'help' for commands");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut line = String::new();
    loop {
        print!("> ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if report(cli::execute(&mut controller, &command)) {
            break;
        }
    }

    if let Some(session) = controller.session() {
        if !session.store.is_empty() && !session.completion_flag() {
            log::warn!(
                "Leaving {} with {} unsaved landmarks",
                session.identity(),
                session.total_count()
            );
        }
    }
    Ok(())
}

/// Print a command outcome. Returns whether to stop.
fn report(result: Result<Reply, kneemark::SessionError>) -> bool {
    match result {
        Ok(Reply::Continue(text)) => {
            println!("{}", text);
            false
        }
        Ok(Reply::Quit) => true,
        Err(e) => {
            println!("Error: {}", e);
            false
        }
    }
}
