//! CLI for the Cirrus request-execution core.

mod commands;

use anyhow::{Context, Result};
use cirrus_core::config::{self, CirrusConfig};
use cirrus_core::transport::{CurlOptions, CurlTransport};
use cirrus_core::{Engine, LocationMode, OperationControl, StorageLocation};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use commands::{run_get, run_job, run_list, run_put, ListOptions, PutSource};

/// Top-level CLI for Cirrus.
#[derive(Debug, Parser)]
#[command(name = "cirrus")]
#[command(about = "Cirrus: resilient requests against storage endpoints", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Overrides for values from config.toml.
#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    /// Read configuration from this file instead of ~/.config/cirrus/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Primary endpoint base URI.
    #[arg(long, global = true, value_name = "URL")]
    pub primary: Option<String>,

    /// Secondary (read-only) endpoint base URI.
    #[arg(long, global = true, value_name = "URL")]
    pub secondary: Option<String>,

    /// primary-only, primary-then-secondary, secondary-then-primary or secondary-only.
    #[arg(long, global = true, value_name = "MODE")]
    pub location_mode: Option<LocationMode>,

    /// Give up on the whole operation after this many seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Read a resource and write its body to stdout.
    Get {
        /// Path relative to the endpoint base URI.
        path: String,
        /// Print attempts, failovers and the serving location to stderr.
        #[arg(long)]
        summary: bool,
    },

    /// Upload a file or stdin to a resource.
    Put {
        /// Path relative to the endpoint base URI.
        path: String,
        /// File to upload (can be re-sent on retry).
        #[arg(long, value_name = "FILE", conflicts_with = "stdin", required_unless_present = "stdin")]
        file: Option<PathBuf>,
        /// Upload stdin (sent once; never retried after a partial send).
        #[arg(long)]
        stdin: bool,
    },

    /// List a paged JSON collection ({"value": [...], "nextMarker": ...}).
    List {
        /// Path relative to the endpoint base URI.
        path: String,
        /// Maximum items per page, passed as `maxresults`.
        #[arg(long, value_name = "N")]
        page_size: Option<u32>,
        /// Print a header line before each page.
        #[arg(long)]
        pages: bool,
        /// Stop after this many pages and print the continuation marker.
        #[arg(long, value_name = "N")]
        max_pages: Option<u64>,
        /// Resume from a marker printed by an earlier `--max-pages` run.
        #[arg(long, value_name = "MARKER")]
        marker: Option<String>,
        /// Endpoint that issued `--marker` (primary or secondary).
        #[arg(long, value_name = "LOCATION", requires = "marker")]
        marker_location: Option<StorageLocation>,
    },

    /// Start a long-running job and wait for it to finish.
    Job {
        /// Path that starts the job (POST, response `{"id": ...}`).
        start_path: String,
        /// Path of the status resource; the job id is appended.
        #[arg(long, value_name = "STATUS_PATH")]
        status: String,
    },
}

/// Everything a command needs to talk to the endpoints.
pub struct Session {
    pub engine: Engine,
    pub config: CirrusConfig,
    pub control: OperationControl,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.global.config {
            Some(path) => config::load_from(path)?,
            None => config::load_or_init()?,
        };
        let cfg = apply_overrides(cfg, &cli.global);
        tracing::debug!("loaded config: {:?}", cfg);
        let session = open_session(cfg)?;

        match cli.command {
            CliCommand::Get { path, summary } => run_get(&session, &path, summary).await?,
            CliCommand::Put { path, file, stdin } => {
                let source = match (file, stdin) {
                    (Some(file), _) => PutSource::File(file),
                    (None, _) => PutSource::Stdin,
                };
                run_put(&session, &path, source).await?;
            }
            CliCommand::List {
                path,
                page_size,
                pages,
                max_pages,
                marker,
                marker_location,
            } => {
                let opts = ListOptions {
                    page_size,
                    print_pages: pages,
                    max_pages,
                    marker,
                    marker_location,
                };
                run_list(&session, &path, opts).await?;
            }
            CliCommand::Job { start_path, status } => {
                run_job(&session, &start_path, &status).await?
            }
        }

        Ok(())
    }
}

/// Command-line flags win over config.toml.
pub fn apply_overrides(mut cfg: CirrusConfig, global: &GlobalArgs) -> CirrusConfig {
    if let Some(primary) = &global.primary {
        cfg.primary_endpoint = primary.clone();
    }
    if let Some(secondary) = &global.secondary {
        cfg.secondary_endpoint = Some(secondary.clone());
    }
    if let Some(mode) = global.location_mode {
        cfg.location_mode = mode;
    }
    if let Some(secs) = global.timeout {
        cfg.operation_timeout_secs = Some(secs);
    }
    cfg
}

fn open_session(cfg: CirrusConfig) -> Result<Session> {
    let transport = CurlTransport::new(CurlOptions {
        default_timeout: cfg.attempt_timeout(),
        ..CurlOptions::default()
    });
    let engine = Engine::from_config(&cfg, Arc::new(transport)).context("configuring engine")?;

    let mut control = OperationControl::new();
    if let Some(timeout) = cfg.operation_timeout() {
        control = control.with_timeout(timeout);
    }
    cancel_on_ctrl_c(&control);

    Ok(Session {
        engine,
        config: cfg,
        control,
    })
}

/// Cancel the running operation on the first Ctrl-C.
fn cancel_on_ctrl_c(control: &OperationControl) {
    let control = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; cancelling");
            control.cancel();
        }
    });
}

impl Session {
    pub fn attempt_timeout(&self) -> Duration {
        self.config.attempt_timeout()
    }
}

#[cfg(test)]
mod tests;
