use crate::adapters::Store;
use crate::app::LiveScraper;
use crate::config::Settings;
use crate::server::rate_limit::RateLimiter;
use crate::server::session::SessionManager;
use crate::utils::monitor::SystemMonitor;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Store,
    pub scraper: Arc<LiveScraper>,
    pub sessions: Arc<SessionManager>,
    pub rate_limiter: Arc<RateLimiter>,
    pub monitor: Arc<SystemMonitor>,
}

impl AppState {
    pub fn new(settings: Settings, store: Store, scraper: LiveScraper) -> Self {
        let sessions = SessionManager::new(Duration::from_secs(settings.session_timeout));
        let rate_limiter = RateLimiter::new(settings.rate_limit_requests, settings.api_daily_limit);

        Self {
            settings: Arc::new(settings),
            store,
            scraper: Arc::new(scraper),
            sessions: Arc::new(sessions),
            rate_limiter: Arc::new(rate_limiter),
            monitor: Arc::new(SystemMonitor::new(true)),
        }
    }
}
