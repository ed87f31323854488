pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod views;

use crate::utils::error::Result;
use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use handlers::{api, auth, pages, scrape, system};
use state::AppState;
use chrono::NaiveTime;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        // 公開端點
        .route("/health", get(system::health))
        .route("/favicon.ico", get(system::favicon))
        .route("/login", get(auth::login_page).post(auth::login_submit))
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/debug/session", get(system::debug_session))
        .route("/debug/db-status", get(system::debug_db_status))
        .route("/trigger-scrape", post(scrape::trigger_scrape))
        .route("/trigger-scrape-warrants", post(scrape::trigger_scrape_warrants))
        // 頁面
        .route("/", get(pages::index))
        .route("/diagnostic", get(system::diagnostic))
        .route("/holdings", get(pages::holdings))
        .route("/holdings/:etf_code", get(pages::etf_holdings))
        .route("/changes", get(pages::changes))
        .route("/new-holdings", get(pages::new_holdings))
        .route("/decreased-holdings", get(pages::decreased_holdings))
        .route("/cross-holdings", get(pages::cross_holdings))
        .route("/warrant-ranking", get(pages::warrant_ranking))
        .route("/warrant-volume", get(pages::warrant_volume))
        // JSON API
        .route("/api/holdings/:date", get(api::holdings))
        .route("/api/new-holdings/:date", get(api::new_holdings))
        .route("/api/cross-holdings/:date", get(api::cross_holdings))
        .route("/api/decreased-holdings/:date", get(api::decreased_holdings))
        .route("/api/warrants", get(api::warrants))
        .route("/api/warrants/search", get(api::search_warrants))
        .route("/api/warrants/underlying/:name", get(api::warrants_by_underlying))
        .route("/api/warrant-summary", get(api::warrant_summary))
        .route("/api/warrant-volume", get(api::warrant_volume))
        // 手動爬取
        .route("/manual-scrape", post(scrape::manual_scrape))
        .route("/manual-scrape-warrants", post(scrape::manual_scrape_warrants))
        .route("/test-scrape", post(scrape::test_scrape))
        .layer(from_fn_with_state(state.clone(), middleware::security))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// 定期清除過期的 session 與限流紀錄
fn spawn_sweeper(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let sessions = state.sessions.sweep().await;
            let clients = state.rate_limiter.sweep().await;
            if sessions > 0 || clients > 0 {
                tracing::info!(
                    "🧹 Swept {} expired sessions, {} idle rate-limit entries",
                    sessions,
                    clients
                );
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("🛑 Shutdown signal received");
}

/// 伺服器背景工作；關閉時先中止並等待結束，再關閉資料庫
#[derive(Default)]
pub struct BackgroundTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    pub fn push(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.handles.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub async fn shutdown(self) {
        for (name, handle) in self.handles {
            handle.abort();
            match handle.await {
                Err(e) if e.is_cancelled() => tracing::debug!("Stopped background task {}", name),
                Err(e) => tracing::warn!("⚠️ Background task {} ended with error: {}", name, e),
                Ok(()) => tracing::debug!("Background task {} already finished", name),
            }
        }
    }
}

pub async fn serve(state: AppState, addr: SocketAddr, schedule: Option<NaiveTime>) -> Result<()> {
    let mut tasks = BackgroundTasks::default();
    tasks.push("sweeper", spawn_sweeper(state.clone()));
    if let Some(at) = schedule {
        tasks.push("scheduler", scheduler::spawn_daily_scrape(state.scraper.clone(), at));
    }

    let store = state.store.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🚀 Listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tasks.shutdown().await;
    store.close().await;
    tracing::info!("👋 Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_background_tasks_stop_before_return() {
        let held = Arc::new(());
        let mut tasks = BackgroundTasks::default();
        for name in ["sweeper", "scheduler"] {
            let held = held.clone();
            tasks.push(
                name,
                tokio::spawn(async move {
                    let _held = held;
                    std::future::pending::<()>().await;
                }),
            );
        }
        assert_eq!(tasks.len(), 2);
        assert_eq!(Arc::strong_count(&held), 3);

        tasks.shutdown().await;
        // 工作已被丟棄，不會在資料庫關閉後繼續執行
        assert_eq!(Arc::strong_count(&held), 1);
    }

    #[tokio::test]
    async fn test_finished_task_shutdown_is_quiet() {
        let mut tasks = BackgroundTasks::default();
        let handle = tokio::spawn(async {});
        tokio::task::yield_now().await;
        tasks.push("done", handle);
        tasks.shutdown().await;
    }
}
