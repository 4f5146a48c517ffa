//! `mediadl provider add|list|pause|unpause`.

use anyhow::{Context, Result};
use mediadl_core::job_db::JobDb;
use mediadl_core::provider::ProviderKind;

use crate::cli::ProviderCommand;

pub async fn run_provider(db: &JobDb, action: ProviderCommand) -> Result<()> {
    match action {
        ProviderCommand::Add { key, name, config } => {
            // Build once so a bad key or config is rejected here, not at claim time.
            ProviderKind::from_key(&key)?.build(&config)?;
            let display = name.unwrap_or_else(|| key.clone());
            let id = db.add_provider(&key, &display, &config).await?;
            println!("Added provider {id} ({key})");
        }
        ProviderCommand::List => {
            let providers = db.list_providers().await?;
            if providers.is_empty() {
                println!("No providers configured.");
                return Ok(());
            }
            let pauses = db.list_provider_pauses().await?;
            println!("{:<4} {:<10} {:<8} {:<20} {}", "ID", "KEY", "ENABLED", "NAME", "PAUSED");
            for p in providers {
                let paused = pauses
                    .iter()
                    .find(|x| x.provider_id == p.id)
                    .map(|x| x.reason.as_str())
                    .unwrap_or("-");
                println!(
                    "{:<4} {:<10} {:<8} {:<20} {}",
                    p.id,
                    p.key,
                    if p.enabled { "yes" } else { "no" },
                    p.display_name,
                    paused
                );
            }
        }
        ProviderCommand::Pause { id, reason } => {
            db.get_provider(id)
                .await?
                .with_context(|| format!("provider {id} not found"))?;
            db.pause_provider(id, &reason).await?;
            println!("Paused provider {id}");
        }
        ProviderCommand::Unpause { id } => {
            if db.clear_provider_pause(id).await? {
                println!("Unpaused provider {id}");
            } else {
                println!("Provider {id} was not paused");
            }
        }
    }
    Ok(())
}
