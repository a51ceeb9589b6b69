#![forbid(unsafe_code)]

mod cmd;
mod editor;
mod output;

use std::env;
use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use pebble_core::{backend::Registry, store::Store, sync};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Database file created in the working directory, one per project.
const DB_FILE: &str = "pm.db";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "pebble: a tiny issue tracker with remote sync",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List entries, or show one in full",
        long_about = "List entries grouped by feature, or show a single entry in full.",
        after_help = "EXAMPLES:\n    # Open entries, grouped by feature\n    pb show\n\n    # Include finished entries\n    pb show --all\n\n    # Entries carrying any of the given tags\n    pb show bug,api\n\n    # One entry in full\n    pb show 12"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Add a new entry",
        long_about = "Add a new entry with tags, a message, and an optional point estimate.",
        after_help = "EXAMPLES:\n    # A one-point task\n    pb add bug \"Fix login timeout\"\n\n    # Three points, two tags\n    pb add api,auth \"Rework token refresh\" 3\n\n    # Draft the message in $EDITOR\n    pb add docs \"Release notes\" --edit"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Edit an entry's message in $EDITOR",
        after_help = "EXAMPLES:\n    pb edit 12"
    )]
    Edit(cmd::edit::EditArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Start working on an entry",
        long_about = "Move an entry to doing, optionally with a deadline.",
        after_help = "EXAMPLES:\n    pb start 12\n\n    # Due in three days\n    pb start 12 3d\n\n    # Due on a date\n    pb start 12 2026-09-01"
    )]
    Start(cmd::state::StartArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Finish an entry",
        after_help = "EXAMPLES:\n    pb end 12"
    )]
    End(cmd::state::IdArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Send an entry back to the backlog",
        after_help = "EXAMPLES:\n    pb backlog 12"
    )]
    Backlog(cmd::state::IdArgs),

    #[command(
        next_help_heading = "Metadata",
        about = "Tag an entry",
        after_help = "EXAMPLES:\n    pb tag bug 12"
    )]
    Tag(cmd::tag::TagArgs),

    #[command(
        next_help_heading = "Metadata",
        about = "Remove a tag from an entry",
        after_help = "EXAMPLES:\n    pb untag bug 12"
    )]
    Untag(cmd::tag::UntagArgs),

    #[command(next_help_heading = "Read", about = "Show all tags and their usage counts")]
    Tags,

    #[command(
        next_help_heading = "Metadata",
        about = "Manage feature buckets for the listing"
    )]
    Feature {
        #[command(subcommand)]
        command: cmd::feature::FeatureCommand,
    },

    #[command(
        next_help_heading = "Lifecycle",
        about = "Delete an entry",
        after_help = "EXAMPLES:\n    pb rm 12"
    )]
    Rm(cmd::rm::RmArgs),

    #[command(
        next_help_heading = "Read",
        about = "Burndown chart and completion forecast",
        after_help = "EXAMPLES:\n    # Everything\n    pb burn\n\n    # One tag\n    pb burn api"
    )]
    Burn(cmd::burn::BurnArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Bulk-add entries from an $EDITOR buffer",
        long_about = "Open $EDITOR and add one entry per line: `message [tags] points`,\nwith both suffixes optional. Lines starting with # are skipped.",
        after_help = "EXAMPLES:\n    pb plan\n\n    # Tag every planned entry with sprint9\n    pb plan sprint9"
    )]
    Plan(cmd::plan::PlanArgs),

    #[command(
        next_help_heading = "Sync",
        about = "Attach or detach a remote backend",
        after_help = "EXAMPLES:\n    pb remote add github\n    pb remote rm github"
    )]
    Remote(cmd::remote::RemoteArgs),

    #[command(
        next_help_heading = "Sync",
        about = "Reconcile with the remote backend now",
        long_about = "Reconcile with the remote backend, bypassing the hourly rate limit\nthat applies to the automatic sync."
    )]
    Sync,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PEBBLE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "pebble=debug,info"
        } else {
            "pebble=info,warn"
        })
    });

    let format = env::var("PEBBLE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

/// Open (creating if needed) the project database in the working directory.
fn open_store() -> anyhow::Result<Store> {
    let path = Path::new(DB_FILE);
    let existed = path.exists();
    let store = Store::open(path).context("open local store")?;
    if !existed {
        println!("No pm database found ... created {DB_FILE}");
    }
    Ok(store)
}

/// Open the store and build the backend registry from its config.
fn open_registry(auto_sync: bool) -> anyhow::Result<Registry> {
    let store = open_store()?;
    let mut registry = Registry::from_config(store)?;
    if auto_sync {
        auto_sync_pass(&mut registry);
    }
    Ok(registry)
}

/// Rate-limited reconciliation on startup; failures never block the command.
fn auto_sync_pass(registry: &mut Registry) {
    if !registry.has_remote() {
        return;
    }
    match sync::run(registry, Utc::now(), false) {
        Ok(report) if report.pushed > 0 || report.pulled > 0 => {
            let name = registry.remote_name().unwrap_or("remote");
            println!(
                "Synced with {name}: {} pushed, {} pulled",
                report.pushed, report.pulled
            );
        }
        Ok(_) => {}
        Err(error) => warn!(%error, "background sync failed"),
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("verbose mode enabled");
    }

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Show(cmd::show::ShowArgs::default()));

    match command {
        // Remote management must not build the registry: detaching a broken
        // remote has to work, and attaching happens before credentials exist.
        Commands::Remote(args) => {
            let mut store = open_store()?;
            cmd::remote::run_remote(&args, &mut store)
        }
        Commands::Sync => {
            let mut registry = open_registry(false)?;
            cmd::sync::run_sync(&mut registry)
        }
        Commands::Show(args) => {
            let registry = open_registry(true)?;
            cmd::show::run_show(&args, &registry)
        }
        Commands::Add(args) => {
            let mut registry = open_registry(true)?;
            cmd::add::run_add(&args, &mut registry)
        }
        Commands::Edit(args) => {
            let mut registry = open_registry(true)?;
            cmd::edit::run_edit(&args, &mut registry)
        }
        Commands::Start(args) => {
            let mut registry = open_registry(true)?;
            cmd::state::run_start(&args, &mut registry)
        }
        Commands::End(args) => {
            let mut registry = open_registry(true)?;
            cmd::state::run_end(&args, &mut registry)
        }
        Commands::Backlog(args) => {
            let mut registry = open_registry(true)?;
            cmd::state::run_backlog(&args, &mut registry)
        }
        Commands::Tag(args) => {
            let mut registry = open_registry(true)?;
            cmd::tag::run_tag(&args, &mut registry)
        }
        Commands::Untag(args) => {
            let mut registry = open_registry(true)?;
            cmd::tag::run_untag(&args, &mut registry)
        }
        Commands::Tags => {
            let registry = open_registry(true)?;
            cmd::tag::run_tags(&registry)
        }
        Commands::Feature { command } => {
            let mut registry = open_registry(true)?;
            cmd::feature::run_feature(&command, &mut registry)
        }
        Commands::Rm(args) => {
            let mut registry = open_registry(true)?;
            cmd::rm::run_rm(&args, &mut registry)
        }
        Commands::Burn(args) => {
            let registry = open_registry(true)?;
            cmd::burn::run_burn(&args, &registry)
        }
        Commands::Plan(args) => {
            let mut registry = open_registry(true)?;
            cmd::plan::run_plan(&args, &mut registry)
        }
    }
}
