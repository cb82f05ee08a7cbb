//! dropsort CLI - watch a folder and sort new files into subfolders
//!
//! Usage:
//!   dropsort start <watch-path> [--config <file>] [--dest <dir>] [--no-content] [--route PATTERN=FOLDER]...
//!   dropsort scan <watch-path> [--config <file>] [--dest <dir>] [--no-content] [--route PATTERN=FOLDER]...
//!   dropsort classify <file> [--config <file>]
//!   dropsort rules [--config <file>]
//!   dropsort init-config <output> [--force]

mod watch;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dropsort_core::{Classification, Outcome, Pipeline, Rule, SorterConfig, Stats};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dropsort")]
#[command(about = "dropsort - sort new downloads into folders by rule", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct SortArgs {
    /// Folder to watch
    watch_path: PathBuf,

    /// JSON config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Destination root (overrides the config file)
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Disable content inspection
    #[arg(long)]
    no_content: bool,

    /// Extra route tried before the configured rules (globs match the
    /// file name, anything else is a filename keyword). Repeatable.
    #[arg(long = "route", value_name = "PATTERN=FOLDER")]
    routes: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a folder and sort new files until interrupted
    Start(SortArgs),

    /// Sort the files currently in a folder once, then exit
    Scan(SortArgs),

    /// Show where a file would go, without moving it
    Classify {
        /// File to classify
        file: PathBuf,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List the rules in evaluation order
    Rules {
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the default configuration as JSON
    InitConfig {
        /// Output path
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Start(args) => start(&args),
        Commands::Scan(args) => scan(&args),
        Commands::Classify { file, config } => classify(&file, config.as_deref()),
        Commands::Rules { config } => list_rules(config.as_deref()),
        Commands::InitConfig { output, force } => init_config(&output, force),
    }
}

fn load_config(path: Option<&Path>) -> Result<SorterConfig> {
    match path {
        Some(path) => SorterConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SorterConfig::default()),
    }
}

fn sort_config(args: &SortArgs) -> Result<SorterConfig> {
    let mut config = load_config(args.config.as_deref())?.with_watch_path(&args.watch_path);
    if let Some(dest) = &args.dest {
        config = config.with_dest_root(dest);
    }
    if args.no_content {
        config = config.with_content_inspection(false);
    }
    if !args.routes.is_empty() {
        let mut rules = args
            .routes
            .iter()
            .map(|route| parse_route(route))
            .collect::<Result<Vec<_>>>()?;
        rules.extend(config.rules);
        config.rules = rules;
    }

    config.validate().context("Invalid configuration")?;
    if config.rules.is_empty() {
        tracing::warn!("No rules configured, nothing will be moved");
    }
    Ok(config)
}

fn parse_route(route: &str) -> Result<Rule> {
    let (pattern, folder) = route
        .split_once('=')
        .with_context(|| format!("Route '{}' must look like PATTERN=FOLDER", route))?;
    Ok(Rule::infer(pattern.trim(), folder.trim()))
}

fn start(args: &SortArgs) -> Result<()> {
    let config = sort_config(args)?;
    let pipeline = config.build_pipeline().context("Failed to build rules")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start event loop")?;

    runtime.block_on(watch_loop(config, pipeline))
}

/// Single-threaded loop: one file at a time, in arrival order.
async fn watch_loop(config: SorterConfig, mut pipeline: Pipeline) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<PathBuf>(config.queue_capacity);
    let handle = watch::start_watcher(&config.watch_path, tx)?;

    tracing::info!(
        watch = %handle.path().display(),
        dest = %config.dest_root.display(),
        rules = pipeline.classifier().rules().len(),
        "Watching for new files"
    );

    let mut backlog: VecDeque<PathBuf> = if config.scan_existing_on_start {
        Pipeline::existing_files(&config.watch_path)
            .context("Failed to list existing files")?
            .into()
    } else {
        VecDeque::new()
    };

    let mut retry = tokio::time::interval(config.retry_interval());
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            signal = &mut shutdown => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Interrupted, shutting down");
                break;
            }

            _ = std::future::ready(()), if !backlog.is_empty() => {
                if let Some(path) = backlog.pop_front() {
                    pipeline.process(&path);
                }
            }

            Some(path) = rx.recv() => {
                pipeline.process(&path);
            }

            _ = retry.tick(), if pipeline.has_pending() => {
                pipeline.retry_pending();
            }
        }
    }

    handle.stop(rx);
    log_summary(&mut pipeline);
    Ok(())
}

fn log_summary(pipeline: &mut Pipeline) {
    pipeline.forget_missing();
    let Stats {
        moved,
        renamed,
        left_in_place,
        unresolved,
        failed,
        ..
    } = pipeline.stats();
    tracing::info!(moved, renamed, left_in_place, unresolved, failed, "Session summary");

    for path in pipeline.unresolved_paths() {
        tracing::warn!(path = %path.display(), "Never became ready, left in place");
    }
    for path in pipeline.pending_paths() {
        tracing::info!(path = %path.display(), "Still waiting, left in place");
    }
}

fn scan(args: &SortArgs) -> Result<()> {
    let config = sort_config(args)?;
    let mut pipeline = config.build_pipeline().context("Failed to build rules")?;

    println!("Sorting {}", config.watch_path.display());
    println!("  Destination: {}", config.dest_root.display());
    println!();

    let start = Instant::now();

    let mut outcomes = pipeline
        .scan_existing(&config.watch_path)
        .context("Failed to scan watch folder")?;

    while pipeline.has_pending() {
        std::thread::sleep(config.retry_interval());
        outcomes.extend(pipeline.retry_pending());
    }

    for outcome in &outcomes {
        print_outcome(outcome);
    }

    let stats = pipeline.stats();
    println!();
    println!("Done in {:.2}s", start.elapsed().as_secs_f64());
    println!("  Moved:      {} ({} renamed)", stats.moved, stats.renamed);
    println!("  Unmatched:  {}", stats.left_in_place);
    println!("  Unresolved: {}", stats.unresolved);
    println!("  Failed:     {}", stats.failed);

    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Moved { from, to, renamed } => {
            let note = if *renamed { " (renamed)" } else { "" };
            println!("  moved      {} -> {}{}", file_label(from), to.display(), note);
        }
        Outcome::LeftInPlace { path } => println!("  unmatched  {}", file_label(path)),
        Outcome::Unresolved { path, attempts } => {
            println!("  not ready  {} (after {} checks)", file_label(path), attempts)
        }
        Outcome::Failed { path, error } => println!("  failed     {}: {}", file_label(path), error),
        Outcome::Deferred { .. } | Outcome::Skipped { .. } => {}
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn classify(file: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let classifier = config.build_classifier().context("Failed to build rules")?;

    match classifier.classify_file(file) {
        Classification::Destination(folder) => {
            println!("{} -> {}", file_label(file), config.dest_root.join(folder).display());
        }
        Classification::Unmatched => println!("{}: no rule matches, would stay in place", file_label(file)),
        Classification::Deferred => {
            println!("{}: not ready (partial download or still being written)", file_label(file))
        }
        Classification::Missing => {
            anyhow::bail!("{} does not exist or is not a regular file", file.display())
        }
    }

    Ok(())
}

fn list_rules(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let rules = config.build_rule_set().context("Failed to build rules")?;

    if rules.is_empty() {
        println!("No rules configured.");
        return Ok(());
    }

    println!("{:<4} {:<10} {:<30} {}", "#", "KIND", "PATTERN", "DESTINATION");
    println!("{}", "-".repeat(70));

    for (i, rule) in rules.iter().enumerate() {
        println!(
            "{:<4} {:<10} {:<30} {}",
            i + 1,
            rule.kind.name(),
            rule.pattern,
            rule.destination
        );
    }

    if !config.content_inspection && rules.has_content_rules() {
        println!();
        println!("Content inspection is disabled; content rules will not fire.");
    }

    Ok(())
}

fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    SorterConfig::default()
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote default configuration to {}", output.display());

    Ok(())
}
