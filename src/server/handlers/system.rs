use crate::config::{database_kind, DatabaseKind};
use crate::server::middleware::session_id;
use crate::server::state::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};

const WATCHED_ENV: [&str; 5] = [
    "DATABASE_URL",
    "WEB_PASSWORD",
    "SCHEDULER_TOKEN",
    "ENVIRONMENT",
    "PORT",
];

fn timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}

fn kind_label(url: &str) -> &'static str {
    match database_kind(url) {
        DatabaseKind::Sqlite => "sqlite",
        DatabaseKind::Postgres => "postgresql",
        DatabaseKind::Unsupported => "unsupported",
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": timestamp(),
        "sessions": state.sessions.count().await,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn debug_session(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let id = session_id(&headers);
    let (valid, info) = match &id {
        Some(id) => (state.sessions.validate(id).await, state.sessions.info(id).await),
        None => (false, None),
    };

    Json(json!({
        "has_session_cookie": id.is_some(),
        "session_valid": valid,
        "session_info": info,
        "active_sessions": state.sessions.count().await,
        "session_timeout": state.settings.session_timeout,
        "timestamp": timestamp(),
    }))
}

/// 只回報是否設定與種類，不洩漏連線字串
pub async fn debug_db_status(State(state): State<AppState>) -> Json<Value> {
    let from_env = std::env::var("DATABASE_URL").is_ok();
    Json(json!({
        "database_url_exists": from_env,
        "db_type": kind_label(&state.settings.database_url),
        "database_location": state.settings.database().describe(),
        "timestamp": timestamp(),
    }))
}

pub async fn diagnostic(State(state): State<AppState>) -> Json<Value> {
    let store = &state.store;

    let connection_test = match store.ping().await {
        Ok(()) => json!({
            "status": "connected",
            "sqlite_version": store.sqlite_version().await.ok(),
        }),
        Err(e) => {
            tracing::error!("❌ Diagnostic ping failed: {}", e);
            json!({ "status": "failed", "error": e.to_string() })
        }
    };

    let tables = store.existing_tables().await.unwrap_or_default();
    let counts: serde_json::Map<String, Value> = store
        .table_counts()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|(table, count)| (table, json!(count)))
        .collect();

    let environment: serde_json::Map<String, Value> = WATCHED_ENV
        .iter()
        .map(|name| (format!("{}_exists", name), json!(std::env::var(name).is_ok())))
        .collect();

    let new_holdings = store.diagnose_new_holdings(None).await;

    Json(json!({
        "timestamp": timestamp(),
        "environment": state.settings.environment,
        "database_status": {
            "detected_type": kind_label(&state.settings.database_url),
            "location": state.settings.database().describe(),
        },
        "connection_test": connection_test,
        "existing_tables": tables,
        "table_counts": counts,
        "new_holdings": new_holdings,
        "environment_variables": environment,
        "scraper_running": state.scraper.is_running(),
        "uptime_secs": state.monitor.uptime_secs(),
        "system": state.monitor.stats(),
    }))
}
