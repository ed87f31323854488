use anyhow::{bail, Context};
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;

fn health_url() -> anyhow::Result<String> {
    let port = match std::env::var("PORT") {
        Ok(value) => value
            .trim()
            .parse::<u16>()
            .with_context(|| format!("PORT is not a valid port: {}", value))?,
        Err(_) => DEFAULT_PORT,
    };
    Ok(format!("http://127.0.0.1:{}/health", port))
}

async fn check() -> anyhow::Result<()> {
    let url = health_url()?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?;

    if !response.status().is_success() {
        bail!("{} returned HTTP {}", url, response.status());
    }
    Ok(())
}

/// 容器 HEALTHCHECK 使用；成功 exit 0，否則 exit 1
#[tokio::main]
async fn main() {
    if let Err(e) = check().await {
        eprintln!("unhealthy: {:#}", e);
        std::process::exit(1);
    }
}
