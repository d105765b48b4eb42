//! Declarative workspace-messaging reconciler.
//!
//! Loads a layered YAML config describing channels, user groups, user
//! mappings, and an optional channel template; diffs it against the remote
//! workspace; prints the plan; and applies it unless in dry-run mode.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser as ClapParser};

use steward::cancel::CancelToken;
use steward::config::Parser;
use steward::reconcile::Reconciler;
use steward::remote::auth;
use steward::remote::http::HttpRemoteClient;

#[derive(Debug, ClapParser)]
#[command(
    name = "steward",
    version,
    about = "Reconcile workspace channels and user groups against declarative config"
)]
struct Cli {
    /// Print the plan without applying it. Pass --dry-run=false to execute.
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    dry_run: bool,

    /// Path to a configuration file, or a directory of files.
    #[arg(long)]
    config: PathBuf,

    /// Path to a configuration file containing restrictions, loaded before
    /// any config file.
    #[arg(long)]
    restrictions: Option<PathBuf>,

    /// Path to the remote API auth file.
    #[arg(long)]
    auth: PathBuf,
}

fn main() -> Result<()> {
    steward::logging::init();
    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    let auth = auth::load(&cli.auth)?;

    let mut parser = Parser::new();
    if let Some(restrictions) = &cli.restrictions {
        parser
            .parse_file(restrictions, parent_dir(restrictions))
            .context("failed to parse restrictions file")?;
    }

    let meta = fs::metadata(&cli.config)
        .with_context(|| format!("failed to stat {}", cli.config.display()))?;
    let loaded = if meta.is_dir() {
        parser.parse_dir(&cli.config)
    } else {
        parser.parse_file(&cli.config, parent_dir(&cli.config))
    };
    loaded.context("failed to load config")?;

    let client = HttpRemoteClient::new(&auth)?;
    let mut reconciler = Reconciler::new(&client, parser.config, CancelToken::new());
    reconciler.reconcile(cli.dry_run)
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_defaults_on() {
        let cli = Cli::parse_from(["steward", "--config", "cfg", "--auth", "auth.json"]);
        assert!(cli.dry_run);
        assert!(cli.restrictions.is_none());
    }

    #[test]
    fn dry_run_can_be_disabled_explicitly() {
        let cli = Cli::parse_from([
            "steward",
            "--dry-run=false",
            "--config",
            "cfg",
            "--auth",
            "auth.json",
        ]);
        assert!(!cli.dry_run);
    }
}
