//! `mediadl add <provider> <external-id> --title <title>` – queue a job.

use anyhow::{Context, Result};
use mediadl_core::job_db::{JobDb, NewJob};

#[derive(Debug)]
pub struct AddArgs {
    pub provider: String,
    pub external_id: String,
    pub title: String,
    pub category: Option<String>,
    pub priority: i64,
    pub user: i64,
}

pub async fn run_add(db: &JobDb, args: AddArgs) -> Result<()> {
    let provider = db
        .get_provider_by_key(&args.provider)
        .await?
        .with_context(|| format!("no enabled provider with key {:?}", args.provider))?;
    if args.external_id.trim().is_empty() {
        anyhow::bail!("external id must not be empty");
    }
    let id = db
        .add_job(&NewJob {
            user_id: args.user,
            provider_id: provider.id,
            external_id: args.external_id.trim().to_string(),
            title: args.title.clone(),
            category: args.category,
            priority: args.priority,
            position: None,
        })
        .await?;
    println!("Added job {id}: {} (provider {})", args.title, provider.key);
    Ok(())
}
