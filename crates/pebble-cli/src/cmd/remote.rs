//! `pb remote` — attach or detach the remote storage backend.

use std::io::{self, BufRead, Write};

use clap::{Args, Subcommand};
use pebble_core::{backend::BackendKind, config, github, store::Store};

#[derive(Args, Debug)]
pub struct RemoteArgs {
    #[command(subcommand)]
    pub command: RemoteCommand,
}

#[derive(Subcommand, Debug)]
pub enum RemoteCommand {
    /// Attach a remote backend, prompting for credentials.
    Add {
        /// Backend name, e.g. github.
        backend: String,
    },
    /// Detach a remote backend and forget its credentials.
    Rm {
        /// Backend name, e.g. github.
        backend: String,
    },
}

pub fn run_remote(args: &RemoteArgs, store: &mut Store) -> anyhow::Result<()> {
    match &args.command {
        RemoteCommand::Add { backend } => add_remote(backend, store),
        RemoteCommand::Rm { backend } => rm_remote(backend, store),
    }
}

fn add_remote(backend: &str, store: &mut Store) -> anyhow::Result<()> {
    let Some(kind) = BackendKind::from_name(backend) else {
        println!("Unknown remote '{backend}'; available: {}", known_backends());
        return Ok(());
    };

    for active in config::active_plugins(store)? {
        if active != kind.name() {
            println!("Remote '{active}' is already attached; run `pb remote rm {active}` first");
            return Ok(());
        }
    }

    match kind {
        BackendKind::Github => add_github(store),
    }
}

fn add_github(store: &mut Store) -> anyhow::Result<()> {
    let (default_user, default_repo) = github::git_remote_defaults().unwrap_or_default();

    let Some(user) = prompt("Enter the GitHub user for API access", &default_user)? else {
        println!("Cancelled remote setup");
        return Ok(());
    };
    let Some(token) = prompt("Enter your GitHub access token", "")? else {
        println!("Cancelled remote setup");
        return Ok(());
    };
    let Some(repo) = prompt("Enter the GitHub repo", &default_repo)? else {
        println!("Cancelled remote setup");
        return Ok(());
    };

    github::setup(store, &github::Setup { user, repo, token })?;
    config::activate_plugin(store, BackendKind::Github)?;
    println!("Attached github remote");
    Ok(())
}

fn rm_remote(backend: &str, store: &mut Store) -> anyhow::Result<()> {
    let Some(kind) = BackendKind::from_name(backend) else {
        println!("Unknown remote '{backend}'; available: {}", known_backends());
        return Ok(());
    };

    if !config::is_plugin_active(store, kind)? {
        println!("Remote '{}' is not attached", kind.name());
        return Ok(());
    }

    match kind {
        BackendKind::Github => github::deactivate(store)?,
    }
    config::deactivate_plugin(store, kind)?;
    println!("Detached {} remote", kind.name());
    Ok(())
}

fn known_backends() -> String {
    BackendKind::ALL
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read one line from stdin, offering a default when there is one. `None`
/// means the user gave up: blank input with nothing to fall back on.
fn prompt(message: &str, default: &str) -> anyhow::Result<Option<String>> {
    if default.is_empty() {
        print!("{message}: ");
    } else {
        print!("{message} [{default}]: ");
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim();

    if line.is_empty() {
        if default.is_empty() {
            return Ok(None);
        }
        return Ok(Some(default.to_string()));
    }
    Ok(Some(line.to_string()))
}
