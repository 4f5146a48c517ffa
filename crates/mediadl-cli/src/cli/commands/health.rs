//! `mediadl health` – aria2 version probe with the short health timeout.

use anyhow::Result;
use mediadl_core::aria2::Aria2Client;
use mediadl_core::config::MediadlConfig;

pub async fn run_health(cfg: &MediadlConfig, secret: Option<&str>) -> Result<()> {
    let client = Aria2Client::from_config(&cfg.aria2, secret);
    let url = client.rpc_url().to_string();
    let version = tokio::task::spawn_blocking(move || client.version()).await??;
    println!("aria2 {version} at {url}");
    Ok(())
}
