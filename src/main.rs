//! Binary entry point for sortbox.
//!
//! This binary provides the CLI interface for the capture pipeline and the
//! review queue.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr and print_stdout in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use sortbox::config::SortboxConfig;
use sortbox::llm::{classification_deadline, provider_from_config};
use sortbox::models::{ReviewActionRequest, ReviewValues};
use sortbox::observability::{self, LoggingConfig};
use sortbox::storage::{FileTrackerStore, ReviewSnapshotStore};
use sortbox::{
    CaptureEngine, CaptureOptions, CaptureResult, FormattingEngine, InferenceEngine, ItemType,
    Priority, ReviewAction, ReviewId, ReviewQueue, ReviewableItem, TrackerId,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

/// Sortbox - capture anything, file it in the right tracker.
#[derive(Parser)]
#[command(name = "sortbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "SORTBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Override the tracker directory.
    #[arg(long, global = true)]
    tracker_dir: Option<PathBuf>,

    /// Override the data directory (review queue snapshot).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Classify a capture and file its items.
    Capture {
        /// The capture text.
        #[arg(required = true)]
        text: Vec<String>,

        /// Mark the capture as dictated.
        #[arg(long)]
        voice: bool,

        /// Route every item to this tracker.
        #[arg(long)]
        context: Option<String>,

        /// Prior context passed to the classifier.
        #[arg(long)]
        prior: Option<String>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Work through the review queue.
    Review {
        #[command(subcommand)]
        action: ReviewCommand,
    },

    /// Check that an entry matches its type's template.
    Validate {
        /// Item type: action, review, reference, someday, activity.
        item_type: String,

        /// The entry line.
        entry: String,
    },

    /// Manage configuration.
    Config {
        /// Show current configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Review queue commands.
#[derive(Subcommand)]
enum ReviewCommand {
    /// List items awaiting review.
    List {
        /// Only items for this tracker.
        #[arg(short, long)]
        tracker: Option<String>,

        /// Maximum items to show (defaults to the configured batch size).
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show queue counts.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Apply one action to an item.
    Act {
        /// Review item id.
        id: String,

        /// accept, reject, edit-priority, edit-tags, edit-type or move.
        action: String,

        /// New priority for edit-priority.
        #[arg(long)]
        priority: Option<String>,

        /// New tags for edit-tags (comma-separated).
        #[arg(long)]
        tags: Option<String>,

        /// New type for edit-type.
        #[arg(long = "type")]
        item_type: Option<String>,

        /// New tracker for move.
        #[arg(long)]
        tracker: Option<String>,

        /// New section for edit-type or move.
        #[arg(long)]
        section: Option<String>,
    },

    /// Apply a JSON list of actions from a file.
    Batch {
        /// File holding `[{"itemId": ..., "action": ..., "newValues": {...}}]`.
        file: PathBuf,
    },
}

/// Everything a command needs.
struct App {
    config: SortboxConfig,
    queue: Arc<ReviewQueue>,
    snapshots: ReviewSnapshotStore,
    formatter: FormattingEngine,
    trackers: Arc<FileTrackerStore>,
}

impl App {
    async fn open(config: SortboxConfig) -> anyhow::Result<Self> {
        let formatter =
            FormattingEngine::new().with_confidence_scores(config.review.show_confidence_scores);
        let trackers = Arc::new(FileTrackerStore::from_config(&config.trackers));
        let queue = Arc::new(ReviewQueue::new(
            config.review,
            formatter.clone(),
            trackers.clone(),
        ));
        let snapshots = ReviewSnapshotStore::in_data_dir(&config.data_dir);
        if let Some(snapshot) = snapshots.load().await? {
            let restored = queue.restore(snapshot)?;
            queue.clear_confirmed_items()?;
            tracing::debug!(items = restored, "Restored review queue");
        }
        Ok(Self {
            config,
            queue,
            snapshots,
            formatter,
            trackers,
        })
    }

    async fn persist(&self) -> anyhow::Result<()> {
        let snapshot = self.queue.snapshot()?;
        self.snapshots
            .save(&snapshot)
            .await
            .context("saving review queue")
    }

    fn capture_engine(&self) -> CaptureEngine {
        let provider = provider_from_config(&self.config.llm);
        let mut inference = InferenceEngine::new(provider, self.config.review);
        if let Some(deadline) = classification_deadline(&self.config.llm) {
            inference = inference.with_timeout(deadline);
        }
        CaptureEngine::new(
            inference,
            self.queue.clone(),
            self.trackers.clone(),
            self.trackers.clone(),
            self.formatter.clone(),
        )
    }

    fn paint(&self) -> Paint {
        Paint {
            color: self.config.review.color_output,
        }
    }
}

#[derive(Clone, Copy)]
struct Paint {
    color: bool,
}

impl Paint {
    fn ok(self, s: &str) -> String {
        if self.color { s.green().to_string() } else { s.to_string() }
    }

    fn warn(self, s: &str) -> String {
        if self.color { s.yellow().to_string() } else { s.to_string() }
    }

    fn err(self, s: &str) -> String {
        if self.color { s.red().to_string() } else { s.to_string() }
    }

    fn dim(self, s: &str) -> String {
        if self.color { s.dimmed().to_string() } else { s.to_string() }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(&config.logging, cli.verbose);
    if let Err(e) = observability::init(logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SortboxConfig> {
    let mut config = match &cli.config {
        Some(path) => SortboxConfig::load_from_file(path)?,
        None => SortboxConfig::load_default(),
    }
    .with_env_overrides();
    if let Some(dir) = &cli.tracker_dir {
        config = config.with_tracker_dir(dir);
    }
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    Ok(config)
}

async fn run(cli: Cli, config: SortboxConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Capture {
            text,
            voice,
            context,
            prior,
            json,
        } => {
            let app = App::open(config).await?;
            let mut options = CaptureOptions::default();
            if voice {
                options = options.voice();
            }
            if let Some(context) = context {
                options = options.with_force_context(context);
            }
            if let Some(prior) = prior {
                options = options.with_prior_context(prior);
            }
            let result = app.capture_engine().capture(&text.join(" "), options).await;
            app.persist().await?;
            print_capture(&result, app.paint(), json)?;
            if !result.success {
                bail!("capture failed");
            }
            Ok(())
        },
        Commands::Review { action } => run_review(App::open(config).await?, action).await,
        Commands::Validate { item_type, entry } => cmd_validate(&item_type, &entry, config),
        Commands::Config { show } => {
            if show {
                print_config(&config);
            } else {
                println!("Use --show to display configuration");
            }
            Ok(())
        },
    }
}

async fn run_review(app: App, command: ReviewCommand) -> anyhow::Result<()> {
    let paint = app.paint();
    match command {
        ReviewCommand::List {
            tracker,
            limit,
            json,
        } => {
            let tracker = tracker.map(TrackerId::new);
            let items = app.queue.next_batch(tracker.as_ref(), limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("{}", paint.ok("Nothing to review."));
            } else {
                for item in &items {
                    print_review_item(item, paint);
                }
            }
            Ok(())
        },
        ReviewCommand::Status { json } => {
            let status = app.queue.get_review_status()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Review queue");
                println!("  Pending:         {}", status.pending);
                println!("  Flagged:         {}", status.flagged);
                println!("  Confirmed:       {}", status.confirmed);
                println!("  Total:           {}", status.total);
                println!("  Confirmed (all): {}", status.confirmed_total);
            }
            Ok(())
        },
        ReviewCommand::Act {
            id,
            action,
            priority,
            tags,
            item_type,
            tracker,
            section,
        } => {
            let action = ReviewAction::from_str(&action)?;
            let values = ReviewValues {
                priority: priority.as_deref().map(parse_priority).transpose()?,
                tags: tags.map(|t| t.split(',').map(|s| s.trim().to_string()).collect()),
                item_type: item_type.as_deref().map(parse_item_type).transpose()?,
                tracker: tracker.map(TrackerId::new),
                section,
            };
            let id = ReviewId::new(id);
            let applied = app.queue.process_review_action(&id, action, values).await?;
            app.persist().await?;
            if applied {
                println!("{} {action} {id}", paint.ok("✓"));
                Ok(())
            } else {
                bail!("{action} {id}: tracker write failed, item kept in queue");
            }
        },
        ReviewCommand::Batch { file } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let requests: Vec<ReviewActionRequest> =
                serde_json::from_str(&contents).context("parsing review batch")?;
            let result = app.queue.batch_process_review(requests).await;
            app.persist().await?;
            for outcome in &result.results {
                match &outcome.error {
                    None => println!("{} {} {}", paint.ok("✓"), outcome.action, outcome.item_id),
                    Some(error) => println!(
                        "{} {} {}: {error}",
                        paint.err("✗"),
                        outcome.action,
                        outcome.item_id
                    ),
                }
            }
            println!("{} succeeded, {} failed", result.success, result.failed);
            Ok(())
        },
    }
}

fn cmd_validate(item_type: &str, entry: &str, config: SortboxConfig) -> anyhow::Result<()> {
    let item_type = parse_item_type(item_type)?;
    let paint = Paint {
        color: config.review.color_output,
    };
    let validation = FormattingEngine::new().validate(entry, item_type);
    if validation.is_valid {
        println!("{}", paint.ok("valid"));
        return Ok(());
    }
    for issue in &validation.issues {
        println!("{} {issue}", paint.err("✗"));
    }
    bail!("entry is not a valid {item_type} entry")
}

fn parse_priority(s: &str) -> anyhow::Result<Priority> {
    Priority::parse(s).with_context(|| format!("unknown priority '{s}'"))
}

fn parse_item_type(s: &str) -> anyhow::Result<ItemType> {
    ItemType::parse(s).with_context(|| format!("unknown item type '{s}'"))
}

fn print_capture(result: &CaptureResult, paint: Paint, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    if let Some(error) = &result.error {
        println!("{} {error}", paint.err("✗"));
        return Ok(());
    }
    for item in &result.item_results {
        let marker = if !item.success {
            paint.err("✗")
        } else if item.requires_review {
            paint.warn("?")
        } else {
            paint.ok("✓")
        };
        let destination = if item.requires_review {
            format!("review (suggested: {})", item.inferred_tracker)
        } else {
            item.tracker.to_string()
        };
        println!(
            "{marker} [{}] {} {}",
            item.item_type,
            item.content,
            paint.dim(&format!("-> {destination} ({:.0}%)", item.confidence * 100.0))
        );
        if let Some(id) = &item.review_id {
            println!("    {}", paint.dim(&format!("review id: {id}")));
        }
        if let Some(error) = &item.error {
            println!("    {}", paint.err(error));
        }
    }
    for task in &result.completed_tasks {
        let marker = if task.success { paint.ok("✓") } else { paint.warn("-") };
        println!("{marker} completed: {} ({})", task.description, task.tracker);
    }
    for warning in &result.warnings {
        println!("{} {warning}", paint.warn("!"));
    }
    Ok(())
}

fn print_review_item(item: &ReviewableItem, paint: Paint) {
    println!(
        "{} {} {}",
        paint.warn(item.review_status.as_str()),
        item.id,
        paint.dim(&format!(
            "{} / {} ({:.0}%)",
            item.current_tracker,
            item.current_section,
            item.confidence * 100.0
        ))
    );
    println!("    {}", item.rendered_entry);
}

fn print_config(config: &SortboxConfig) {
    println!("Sortbox Configuration");
    println!();
    println!("Data dir:      {}", config.data_dir.display());
    println!("Tracker dir:   {}", config.trackers.directory.display());
    println!("Tracker ext:   {}", config.trackers.extension);
    println!();
    println!("LLM provider:  {}", config.llm.provider.as_str());
    println!(
        "LLM model:     {}",
        config.llm.model.as_deref().unwrap_or("(provider default)")
    );
    println!(
        "LLM API key:   {}",
        if config.llm.api_key.is_some() { "(set)" } else { "(from environment)" }
    );
    println!();
    println!("Auto review threshold:    {}", config.review.auto_review_threshold);
    println!("Require review threshold: {}", config.review.require_review_threshold);
    println!("Default batch size:       {}", config.review.default_batch_size);
    println!("Max queue size:           {}", config.review.max_queue_size);
    println!("Color output:             {}", config.review.color_output);
    println!("Show confidence scores:   {}", config.review.show_confidence_scores);
}
