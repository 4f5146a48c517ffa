//! CLI for the mediadl orchestration engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mediadl_core::config;
use mediadl_core::job_db::JobDb;
use std::path::PathBuf;

use commands::{
    run_add, run_cancel, run_health, run_provider, run_retry, run_scheduler, run_search,
    run_status, run_worker, AddArgs,
};

/// Top-level CLI for mediadl.
#[derive(Debug, Parser)]
#[command(name = "mediadl")]
#[command(about = "mediadl: queue provider downloads into aria2 and file them into a media library", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/mediadl/config.toml, created if missing).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Job database (default: ~/.local/state/mediadl/jobs.db).
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// aria2 RPC secret; overrides the config file and MEDIADL_ARIA2_SECRET.
    #[arg(long, global = true, value_name = "SECRET")]
    pub aria2_secret: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the scheduler loop: admit, claim, resolve, enqueue.
    Scheduler,

    /// Run the worker loop: poll aria2, record progress, complete or recover.
    Worker,

    /// Queue a job for a provider item.
    Add {
        /// Provider key (e.g. `direct`, `json_api`).
        provider: String,
        /// Provider-native identifier of the item.
        external_id: String,
        /// Title used for the output file name.
        #[arg(long)]
        title: String,
        /// Library sub-directory (e.g. `Movies`).
        #[arg(long)]
        category: Option<String>,
        /// Lower runs first.
        #[arg(long, default_value = "100")]
        priority: i64,
        #[arg(long, default_value = "0")]
        user: i64,
    },

    /// Show all jobs, or one job with its audit trail.
    Status {
        /// Job identifier.
        id: Option<i64>,
    },

    /// Put a failed job back in the queue.
    Retry {
        /// Job identifier.
        id: i64,
    },

    /// Cancel a job, removing its aria2 transfer if there is one.
    Cancel {
        /// Job identifier.
        id: i64,
    },

    /// Manage provider rows and pauses.
    Provider {
        #[command(subcommand)]
        action: ProviderCommand,
    },

    /// Search a provider.
    Search {
        /// Provider key.
        provider: String,
        query: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Check that aria2 answers.
    Health,
}

#[derive(Debug, Subcommand)]
pub enum ProviderCommand {
    /// Register a provider.
    Add {
        /// Implementation key (`direct` or `json_api`).
        key: String,
        /// Display name.
        #[arg(long)]
        name: Option<String>,
        /// Plaintext JSON configuration.
        #[arg(long, default_value = "{}")]
        config: String,
    },

    /// List providers and their pause state.
    List,

    /// Stop claims for a provider until unpaused.
    Pause {
        /// Provider id.
        id: i64,
        #[arg(long, default_value = "paused by operator")]
        reason: String,
    },

    /// Clear a provider pause.
    Unpause {
        /// Provider id.
        id: i64,
    },
}

impl CliCommand {
    /// Log file name for this command; the two loops get their own files.
    pub fn log_name(&self) -> &'static str {
        match self {
            CliCommand::Scheduler => "scheduler",
            CliCommand::Worker => "worker",
            _ => "mediadl",
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let (cfg, config_path) = match &self.config {
            Some(path) => (config::load_from_path(path)?, path.clone()),
            None => (config::load_or_init()?, config::config_path()?),
        };
        tracing::debug!("loaded config: {:?}", cfg);
        let db = match &self.db {
            Some(path) => JobDb::open_at(path).await?,
            None => JobDb::open_default().await?,
        };
        let secret = self.aria2_secret;

        match self.command {
            CliCommand::Scheduler => run_scheduler(db, cfg, config_path, secret).await?,
            CliCommand::Worker => run_worker(db, cfg, config_path, secret).await?,
            CliCommand::Add {
                provider,
                external_id,
                title,
                category,
                priority,
                user,
            } => {
                run_add(
                    &db,
                    AddArgs {
                        provider,
                        external_id,
                        title,
                        category,
                        priority,
                        user,
                    },
                )
                .await?
            }
            CliCommand::Status { id } => run_status(&db, id).await?,
            CliCommand::Retry { id } => run_retry(&db, id).await?,
            CliCommand::Cancel { id } => run_cancel(&db, &cfg, secret.as_deref(), id).await?,
            CliCommand::Provider { action } => run_provider(&db, action).await?,
            CliCommand::Search {
                provider,
                query,
                limit,
            } => run_search(&db, &provider, &query, limit).await?,
            CliCommand::Health => run_health(&cfg, secret.as_deref()).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
