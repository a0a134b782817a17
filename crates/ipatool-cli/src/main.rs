//! ipatool orchestrator - command-line front end for the ipatool core.
//!
//! Runs one operation against the external `ipatool` executable and prints
//! the decoded result as JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ipatool_core::{
    AdmissionGate, AppTarget, ArtworkLookupService, CatalogEntry, Credentials, DownloadRequest,
    IpatoolApi, OwnershipResolver, Preferences, SearchSession,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "ipatool-orchestrator")]
#[command(about = "Search, verify ownership of, and download App Store apps via ipatool")]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// JSON preferences file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the ipatool executable (overrides the preferences file)
    #[arg(long)]
    ipatool_path: Option<PathBuf>,

    /// Pass --verbose to ipatool
    #[arg(long)]
    verbose_tool: bool,

    /// Per-invocation timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Maximum concurrent ownership checks
    #[arg(long, default_value = "4")]
    concurrency: usize,

    /// Print the invocation log to stderr when done
    #[arg(long)]
    show_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug, Clone)]
struct TargetArgs {
    /// Numeric App Store identifier
    #[arg(long)]
    app_id: Option<i64>,

    /// Bundle identifier (preferred when both are given)
    #[arg(long)]
    bundle_id: Option<String>,
}

impl From<TargetArgs> for AppTarget {
    fn from(args: TargetArgs) -> Self {
        AppTarget {
            track_id: args.app_id,
            bundle_id: args.bundle_id,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the store and report ownership and artwork for each result
    Search {
        term: String,

        #[arg(short, long, default_value = "25")]
        limit: u32,

        /// Skip ownership and artwork resolution
        #[arg(long)]
        no_status: bool,
    },
    /// Check whether the signed-in account owns an app
    Owned {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Acquire a license for an app
    Purchase { bundle_id: String },
    /// List available external version identifiers
    ListVersions {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show metadata for one external version
    Metadata {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(long)]
        external_version_id: String,
    },
    /// Download an app package
    Download {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(long)]
        external_version_id: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Purchase a license first if needed
        #[arg(long)]
        purchase: bool,
    },
    /// Account management
    #[command(subcommand)]
    Auth(AuthCommand),
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// Two-factor code
        #[arg(long)]
        auth_code: Option<String>,
    },
    Info,
    Revoke,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries results, so logs go to stderr
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let preferences = load_preferences(&args)?;
    info!("Using ipatool at {}", preferences.ipatool_path.display());

    let api = IpatoolApi::builder().preferences(preferences).build()?;
    let resolver = OwnershipResolver::new(Arc::new(AdmissionGate::new(args.concurrency)));
    let session = SearchSession::with_resolver(
        api,
        ArtworkLookupService::public()?,
        Arc::new(resolver),
    );

    let outcome = run(args.command, &session).await;

    if args.show_log {
        let records = session.api().invocation_log().snapshot();
        eprintln!("{}", serde_json::to_string_pretty(&records)?);
    }
    outcome
}

fn load_preferences(args: &Args) -> Result<Preferences> {
    let mut preferences = match &args.config {
        Some(path) => Preferences::load(path)
            .with_context(|| format!("Failed to load preferences from {}", path.display()))?,
        None => Preferences::default(),
    };

    if let Some(path) = &args.ipatool_path {
        preferences.ipatool_path = path.clone();
    }
    if args.verbose_tool {
        preferences.verbose_logs = true;
    }
    if args.timeout.is_some() {
        preferences.command_timeout_secs = args.timeout;
    }
    debug!(
        "Preferences: format={}, non_interactive={}, verbose={}, timeout={:?}",
        preferences.output_format,
        preferences.non_interactive,
        preferences.verbose_logs,
        preferences.command_timeout()
    );
    Ok(preferences)
}

async fn run(command: Command, session: &SearchSession) -> Result<()> {
    let api = session.api();
    match command {
        Command::Search {
            term,
            limit,
            no_status,
        } => {
            let results = session.search(&term, limit).await?;
            if no_status {
                return print_json(&results);
            }
            session.wait_idle().await;
            print_json(&session.view())
        }
        Command::Owned { target } => {
            let target = AppTarget::from(target);
            // Fails early on a target with no identifiers.
            target.identifier_arguments()?;
            let entry = CatalogEntry {
                track_id: target.track_id,
                bundle_id: target.bundle_id,
                ..Default::default()
            };
            print_json(&session.ensure_status(&entry).await)
        }
        Command::Purchase { bundle_id } => print_json(&session.purchase(&bundle_id).await?),
        Command::ListVersions { target } => {
            print_json(&api.list_versions(&AppTarget::from(target)).await?)
        }
        Command::Metadata {
            target,
            external_version_id,
        } => print_json(
            &api.version_metadata(&AppTarget::from(target), &external_version_id)
                .await?,
        ),
        Command::Download {
            target,
            external_version_id,
            output,
            purchase,
        } => {
            let request = DownloadRequest {
                target: target.into(),
                external_version_id,
                output,
                auto_purchase: purchase,
            };
            print_json(&api.download(&request).await?)
        }
        Command::Auth(AuthCommand::Login {
            email,
            password,
            auth_code,
        }) => {
            let credentials = Credentials {
                email,
                password,
                auth_code,
            };
            print_json(&api.login(&credentials).await?)
        }
        Command::Auth(AuthCommand::Info) => print_json(&api.account_info().await?),
        Command::Auth(AuthCommand::Revoke) => print_json(&api.revoke().await?),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_preferences_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, r#"{"ipatoolPath": "/from/file", "commandTimeoutSecs": 9}"#)
            .unwrap();

        let args = Args::parse_from([
            "ipatool-orchestrator",
            "--config",
            path.to_str().unwrap(),
            "--ipatool-path",
            "/from/flag",
            "--verbose-tool",
            "auth",
            "info",
        ]);
        let prefs = load_preferences(&args).unwrap();
        assert_eq!(prefs.ipatool_path, PathBuf::from("/from/flag"));
        assert!(prefs.verbose_logs);
        assert_eq!(prefs.command_timeout_secs, Some(9));
    }

    #[test]
    fn test_target_args_parse() {
        let args = Args::parse_from([
            "ipatool-orchestrator",
            "list-versions",
            "--bundle-id",
            "com.example",
        ]);
        match args.command {
            Command::ListVersions { target } => {
                let target = AppTarget::from(target);
                assert_eq!(target.bundle_id.as_deref(), Some("com.example"));
                assert_eq!(target.track_id, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
