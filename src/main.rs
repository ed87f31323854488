use clap::Parser;
use etf_monitor::app::LiveScraper;
use etf_monitor::server::{self, state::AppState};
use etf_monitor::utils::{logger, validation::Validate};
use etf_monitor::{Settings, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::parse();

    // 初始化日誌
    logger::init_server_logger(settings.debug, settings.log_format);

    tracing::info!(
        "Starting etf-monitor v{} ({})",
        env!("CARGO_PKG_VERSION"),
        settings.environment
    );

    // 驗證配置
    if let Err(e) = settings.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    for field in settings.insecure_defaults() {
        tracing::warn!("⚠️ {} is still using its default value", field);
    }

    let sources = match settings.sources() {
        Ok(sources) => sources,
        Err(e) => {
            tracing::error!("❌ Failed to load sources config: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    tracing::info!("📋 Tracking {} ETFs", sources.etfs.len());

    let location = settings.database();
    tracing::info!("🗄️ Database: {}", location.describe());
    let store = Store::connect(&location).await?.with_etf_names(&sources);

    let scraper = LiveScraper::from_config(store.clone(), sources)?;
    let addr = settings.bind_addr()?;
    let schedule = settings
        .schedule_enabled
        .then(|| settings.schedule_time())
        .transpose()?;

    let state = AppState::new(settings, store, scraper);

    server::serve(state, addr, schedule).await?;
    Ok(())
}
