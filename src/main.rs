//! Reply-Sweeper main entry point
//!
//! This is the command-line interface for the Reply-Sweeper moderation crawler.

use clap::Parser;
use reply_sweeper::config::{load_config_with_hash, Config};
use reply_sweeper::crawler::{Coordinator, RunOutcome};
use reply_sweeper::output::{print_run_summary, JsonLinesReport};
use reply_sweeper::predicate::{save_predicate, validate, FileStore, Predicate, PredicateStore};
use reply_sweeper::{parse_thread_id, RunController};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Reply-Sweeper: blocks repliers in a conversation that match a predicate
///
/// Reply-Sweeper walks every page of replies under one thread, evaluates a
/// user-written predicate for each distinct replier, and blocks the
/// accounts it matches.
#[derive(Parser, Debug)]
#[command(name = "reply-sweeper")]
#[command(version = "1.0.0")]
#[command(about = "Blocks repliers in a conversation that match a predicate", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Status URL or numeric id of the thread to sweep
    #[arg(value_name = "THREAD")]
    thread: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Evaluate the predicate without sending block requests
    #[arg(long)]
    dry_run: bool,

    /// Validate a predicate file and exit
    #[arg(long, value_name = "FILE", conflicts_with_all = ["set_predicate", "show_predicate"])]
    check_predicate: Option<PathBuf>,

    /// Validate a predicate file and save it as the active predicate
    #[arg(long, value_name = "FILE", conflicts_with_all = ["check_predicate", "show_predicate"])]
    set_predicate: Option<PathBuf>,

    /// Print the saved predicate and exit
    #[arg(long, conflicts_with_all = ["check_predicate", "set_predicate"])]
    show_predicate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Predicate checks need no session
    if let Some(path) = &cli.check_predicate {
        return handle_check_predicate(path);
    }

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let mut store = FileStore::new(&config.predicate.store_path);

    if let Some(path) = &cli.set_predicate {
        handle_set_predicate(&mut store, path)
    } else if cli.show_predicate {
        handle_show_predicate(&store)
    } else {
        let thread = cli
            .thread
            .as_deref()
            .ok_or("a THREAD (status URL or id) is required to start a sweep")?;
        handle_sweep(config, &store, thread, cli.dry_run).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("reply_sweeper=info,warn"),
            1 => EnvFilter::new("reply_sweeper=debug,info"),
            2 => EnvFilter::new("reply_sweeper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --check-predicate: validates a predicate file
fn handle_check_predicate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let report = validate(&source);

    match report.error {
        None => {
            println!("✓ Predicate is valid");
            Ok(())
        }
        Some(error) => {
            println!("✗ {}", error);
            Err(error.into())
        }
    }
}

/// Handles --set-predicate: validates and persists a predicate file
fn handle_set_predicate(
    store: &mut FileStore,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let predicate = save_predicate(store, &source)?;

    println!(
        "✓ Predicate {} saved to: {}",
        predicate.fingerprint(),
        store.path().display()
    );
    Ok(())
}

/// Handles --show-predicate: prints the stored predicate
fn handle_show_predicate(store: &FileStore) -> Result<(), Box<dyn std::error::Error>> {
    match store.get()? {
        Some(source) => print!("{}", source),
        None => println!("No predicate saved at: {}", store.path().display()),
    }
    Ok(())
}

/// Handles the main sweep operation
async fn handle_sweep(
    config: Config,
    store: &FileStore,
    thread: &str,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let root_id = parse_thread_id(thread)?;

    let source = store.get()?.ok_or_else(|| {
        format!(
            "no predicate saved at {}; use --set-predicate first",
            store.path().display()
        )
    })?;
    let predicate = Predicate::compile(&source)?;

    let mut coordinator = Coordinator::new(&config)?.with_dry_run(dry_run);
    if let Some(report_path) = &config.output.report_path {
        tracing::info!("Writing run report to: {}", report_path);
        coordinator = coordinator.with_observer(Box::new(JsonLinesReport::open(report_path)?));
    }

    let controller = Arc::new(RunController::new());
    let token = controller.begin()?;

    // Ctrl-C requests cancellation; the sweep stops at its next checkpoint
    let interrupt = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                controller.cancel();
            }
        })
    };

    let watcher = {
        let mut states = controller.subscribe();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                tracing::debug!("Run state: {}", state);
                if state.is_terminal() {
                    break;
                }
            }
        })
    };

    let outcome = coordinator.run(&root_id, &predicate, &token).await;
    controller.finish(&outcome);
    interrupt.abort();
    watcher.abort();

    println!();
    print_run_summary(&outcome);

    match outcome {
        RunOutcome::Completed(_) | RunOutcome::Cancelled(_) => Ok(()),
        RunOutcome::Failed { cause, .. } => Err(cause.into()),
    }
}
