use crate::server::state::AppState;
use crate::utils::error::{MonitorError, Result};
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};

const WARRANT_PAGES: u32 = 5;
const WARRANT_SORT_TYPE: u32 = 3;

#[derive(Debug, Deserialize)]
pub struct TestScrapeForm {
    #[serde(default)]
    pub etf_code: String,
}

fn timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}

/// 排程器以 `Authorization: Bearer <SCHEDULER_TOKEN>` 呼叫
fn check_scheduler_token(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match token {
        Some(token) if token == state.settings.scheduler_token => Ok(()),
        _ => {
            tracing::warn!("🚫 Invalid scheduler token");
            Err(MonitorError::Unauthorized)
        }
    }
}

async fn scrape_etfs(state: &AppState) -> Result<Json<Value>> {
    let report = state.scraper.scrape_all_etfs().await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("成功爬取 {}/{} 個ETF的數據", report.succeeded, report.total),
        "timestamp": timestamp(),
        "report": report,
    })))
}

async fn scrape_warrants(state: &AppState) -> Result<Json<Value>> {
    let summary = state
        .scraper
        .scrape_warrants(WARRANT_PAGES, WARRANT_SORT_TYPE)
        .await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("權證爬取成功，共 {} 筆", summary.records),
        "timestamp": timestamp(),
        "summary": summary,
    })))
}

pub async fn manual_scrape(State(state): State<AppState>) -> Result<Json<Value>> {
    tracing::info!("🖐️ Manual ETF scrape requested");
    scrape_etfs(&state).await
}

pub async fn manual_scrape_warrants(State(state): State<AppState>) -> Result<Json<Value>> {
    tracing::info!("🖐️ Manual warrant scrape requested");
    scrape_warrants(&state).await
}

pub async fn trigger_scrape(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>> {
    check_scheduler_token(&state, &headers)?;
    tracing::info!("⏰ Scheduler triggered ETF scrape");
    scrape_etfs(&state).await
}

pub async fn trigger_scrape_warrants(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    check_scheduler_token(&state, &headers)?;
    tracing::info!("⏰ Scheduler triggered warrant scrape");
    scrape_warrants(&state).await
}

pub async fn test_scrape(
    State(state): State<AppState>,
    Form(form): Form<TestScrapeForm>,
) -> Result<Json<Value>> {
    let etf_code = form.etf_code.trim();
    if !state.scraper.sources().is_tracked(etf_code) {
        return Err(MonitorError::UnknownEtfError {
            code: etf_code.to_string(),
        });
    }

    let summary = state.scraper.scrape_single_etf(etf_code).await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("ETF {} 爬蟲成功", etf_code),
        "timestamp": timestamp(),
        "summary": summary,
    })))
}
