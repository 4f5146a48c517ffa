//! `mediadl search <provider> <query>` – query a provider without queueing.

use anyhow::{Context, Result};
use mediadl_core::job_db::JobDb;
use mediadl_core::provider::ProviderKind;

pub async fn run_search(db: &JobDb, key: &str, query: &str, limit: usize) -> Result<()> {
    let record = db
        .get_provider_by_key(key)
        .await?
        .with_context(|| format!("no enabled provider with key {key:?}"))?;
    let provider = ProviderKind::from_key(&record.key)?.build(&record.config_json)?;
    let query = query.to_string();
    let results = tokio::task::spawn_blocking(move || provider.search(&query, limit)).await??;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    println!("{:<30} {:>12} {}", "ID", "SIZE", "TITLE");
    for r in results {
        println!(
            "{:<30} {:>12} {}",
            r.external_id,
            r.size_bytes
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            r.title
        );
    }
    Ok(())
}
