//! Command-line interface for media-digest.
//!
//! One subcommand per batch stage, plus manual retry/skip, rating sync and
//! inspection commands. Stage commands print their report and exit non-zero
//! when an item needs human attention.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapters::{Collaborators, Discoverer, ExternalCommand, Processor, Summarizer};
use crate::config::{self, ResolvedConfig};
use crate::core::{ExportScope, Orchestrator, StageReport, StageSettings};
use crate::digest::HighlightMap;
use crate::domain::{ItemStatus, ItemType};
use crate::store::SqliteStore;

/// media-digest - podcast and newsletter digests for an Obsidian vault
#[derive(Parser, Debug)]
#[command(name = "media-digest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover new episodes and newsletters
    Discover {
        /// Ignore entries published before this date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        since: Option<String>,
    },

    /// Download/transcribe episodes and parse newsletters
    Process {
        /// Only process this item type
        #[arg(long = "type", value_enum)]
        item_type: Option<TypeArg>,

        /// Maximum number of items per type
        #[arg(short, long)]
        limit: Option<usize>,

        /// Do not requeue failed items below their retry ceiling
        #[arg(long)]
        no_retries: bool,
    },

    /// Summarize processed items
    Summarize {
        /// Maximum number of items
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Export summarized items as Markdown notes
    Export {
        /// Re-export items published on this date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "all")]
        date: Option<NaiveDate>,

        /// Re-export every summarized and exported item
        #[arg(long)]
        all: bool,

        /// Report what would be written without touching files or the store
        #[arg(long)]
        dry_run: bool,
    },

    /// Build the daily digest
    BuildDaily {
        /// Digest date (YYYY-MM-DD or 'today')
        #[arg(long, default_value = "today")]
        date: String,

        /// JSON file with per-item highlight overrides
        #[arg(long)]
        highlights: Option<PathBuf>,
    },

    /// Build the weekly digest
    BuildWeekly {
        /// Last day of the week (YYYY-MM-DD); defaults to the configured week-end day
        #[arg(long)]
        ending: Option<String>,

        /// JSON file with per-item highlight overrides
        #[arg(long)]
        highlights: Option<PathBuf>,
    },

    /// Reset failed items to pending with a fresh retry budget
    Retry {
        /// External ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Mark items as skipped
    Skip {
        /// External ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Record manual ratings typed into exported notes
    SyncRatings,

    /// Show item counts per status and outstanding failures
    Status,

    /// Show resolved configuration (debug)
    Config,
}

/// Item type for CLI (maps to ItemType)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TypeArg {
    Episode,
    Newsletter,
}

impl From<TypeArg> for ItemType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Episode => ItemType::Episode,
            TypeArg::Newsletter => ItemType::Newsletter,
        }
    }
}

impl Cli {
    /// Execute the CLI command; returns the process exit code
    pub async fn execute(self) -> Result<u8> {
        match self.command {
            Commands::Config => {
                show_config()?;
                Ok(0)
            }
            Commands::Status => {
                let orchestrator = build_orchestrator(config::config()?)?;
                show_status(&orchestrator)?;
                Ok(0)
            }
            command => {
                let orchestrator = build_orchestrator(config::config()?)?;
                let report = run_stage(&orchestrator, command).await?;
                println!("{}", report);
                Ok(report.exit_code())
            }
        }
    }
}

async fn run_stage(orchestrator: &Orchestrator, command: Commands) -> Result<StageReport> {
    match command {
        Commands::Discover { since } => {
            let since = since.as_deref().map(parse_since).transpose()?;
            orchestrator.discover(since).await
        }
        Commands::Process {
            item_type,
            limit,
            no_retries,
        } => {
            orchestrator
                .process(item_type.map(ItemType::from), limit, !no_retries)
                .await
        }
        Commands::Summarize { limit } => orchestrator.summarize(limit).await,
        Commands::Export { date, all, dry_run } => {
            let scope = match (date, all) {
                (Some(date), _) => ExportScope::Date(date),
                (None, true) => ExportScope::All,
                (None, false) => ExportScope::New,
            };
            orchestrator.export(scope, dry_run).await
        }
        Commands::BuildDaily { date, highlights } => {
            let date = parse_day(&date)?;
            let overrides = highlights.as_deref().map(HighlightMap::load).transpose()?;
            orchestrator.build_daily(date, overrides).await
        }
        Commands::BuildWeekly { ending, highlights } => {
            let ending = match ending.as_deref() {
                Some(value) => parse_day(value)?,
                None => None,
            };
            let overrides = highlights.as_deref().map(HighlightMap::load).transpose()?;
            orchestrator.build_weekly(ending, overrides).await
        }
        Commands::Retry { ids } => orchestrator.retry(&ids).await,
        Commands::Skip { ids } => orchestrator.skip(&ids).await,
        Commands::SyncRatings => orchestrator.sync_ratings().await,
        Commands::Status | Commands::Config => {
            anyhow::bail!("Not a stage command")
        }
    }
}

/// Wire the SQLite store and configured collaborator commands together
pub fn build_orchestrator(cfg: &ResolvedConfig) -> Result<Orchestrator> {
    let db_path = cfg.database_path();
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open item store: {}", db_path.display()))?;

    let commands = &cfg.collaborators;
    let collaborators = Collaborators {
        discoverer: ExternalCommand::from_argv(&commands.discover)
            .map(|c| Arc::new(c) as Arc<dyn Discoverer>),
        episode_processor: ExternalCommand::from_argv(&commands.process_episode)
            .map(|c| Arc::new(c) as Arc<dyn Processor>),
        newsletter_processor: ExternalCommand::from_argv(&commands.process_newsletter)
            .map(|c| Arc::new(c) as Arc<dyn Processor>),
        summarizer: ExternalCommand::from_argv(&commands.summarize)
            .map(|c| Arc::new(c) as Arc<dyn Summarizer>),
    };

    Ok(Orchestrator::new(
        Arc::new(store),
        collaborators,
        cfg.retry.clone(),
        StageSettings::from_config(cfg),
    ))
}

/// `today` maps to `None` so the stage reads the injected clock
fn parse_day(value: &str) -> Result<Option<NaiveDate>> {
    if value.eq_ignore_ascii_case("today") {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD or 'today'", value))
}

fn parse_since(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid --since '{}': expected YYYY-MM-DD or RFC 3339", value))?;
    Ok(day.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn show_status(orchestrator: &Orchestrator) -> Result<()> {
    let counts = orchestrator.status()?;
    if counts.is_empty() {
        println!("No items yet. Run 'media-digest discover' first.");
        return Ok(());
    }

    println!("{:<12} {:<12} {:>6}", "TYPE", "STATUS", "COUNT");
    println!("{}", "-".repeat(32));
    for count in &counts {
        println!(
            "{:<12} {:<12} {:>6}",
            count.item_type.as_str(),
            count.status.as_str(),
            count.count
        );
    }

    let failed = orchestrator
        .store()
        .list_by_status(ItemStatus::Failed, None, None)?;
    if !failed.items.is_empty() {
        println!("\nFailed items:");
        for item in &failed.items {
            println!(
                "  {} [{} attempt(s)] {}: {}",
                item.external_id,
                item.attempt_count,
                item.title,
                item.error_reason.as_deref().unwrap_or("")
            );
        }
    }
    if !failed.corrupt.is_empty() {
        println!("\nUnreadable failed rows:");
        for row in &failed.corrupt {
            println!("  {}: {}", row.external_id, row.reason);
        }
    }

    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("media-digest configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home (engine state): {}", cfg.home.display());
    println!("  Database:            {}", cfg.database_path().display());
    println!("  Locks:               {}", cfg.lock_dir().display());
    println!("  Vault:               {}", cfg.vault.display());
    println!("  Export root:         {}", cfg.export_root().display());
    println!();
    println!("Retry:");
    println!("  Episode ceiling:     {}", cfg.retry.episode_ceiling);
    println!("  Newsletter ceiling:  {}", cfg.retry.newsletter_ceiling);
    println!("  Backoff base:        {}s", cfg.retry.backoff_base_secs);
    println!("  Max backoff:         {}s", cfg.retry.max_backoff_secs);
    println!();
    println!("Export:");
    println!("  Max tags per note:   {}", cfg.max_tags_per_doc);
    println!();
    println!("Digest:");
    println!("  Week ends on:        {}", cfg.weekly_day);
    println!("  Takeaways per item:  {}", cfg.digest.takeaways_per_item);
    println!("  Highlight limit:     {}", cfg.digest.highlight_limit);
    println!();
    println!("Collaborators (timeout {}s):", cfg.collaborator_timeout.as_secs());
    let commands = &cfg.collaborators;
    for (name, argv) in [
        ("discover", &commands.discover),
        ("process_episode", &commands.process_episode),
        ("process_newsletter", &commands.process_newsletter),
        ("summarize", &commands.summarize),
    ] {
        let shown = if argv.is_empty() {
            "(not configured)".to_string()
        } else {
            argv.join(" ")
        };
        println!("  {:<19} {}", format!("{}:", name), shown);
    }

    Ok(())
}
