pub mod api;
pub mod auth;
pub mod pages;
pub mod scrape;
pub mod system;

use crate::domain::model::WarrantType;
use crate::server::views;
use crate::utils::error::{MonitorError, Result};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;

/// 頁面處理器的錯誤以 HTML 呈現
#[derive(Debug)]
pub struct PageError(pub MonitorError);

impl From<MonitorError> for PageError {
    fn from(err: MonitorError) -> Self {
        PageError(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            tracing::error!("❌ Page error: {} (category: {:?})", self.0, self.0.category());
        }
        let body = views::error_page(
            status.as_u16(),
            &self.0.user_friendly_message(),
            self.0.recovery_suggestion(),
        );
        (status, Html(body)).into_response()
    }
}

pub type PageResult = std::result::Result<Html<String>, PageError>;

#[derive(Debug, Default, Deserialize)]
pub struct DateEtfQuery {
    pub date: Option<String>,
    pub etf_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HoldingsQuery {
    pub date: Option<String>,
    pub etf_code: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WarrantQuery {
    pub date: Option<String>,
    pub warrant_type: Option<String>,
    pub sort_by: Option<String>,
    pub summary_sort: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VolumeQuery {
    pub date: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub date: Option<String>,
    pub search_type: Option<String>,
}

/// 表單送出的空字串視為未提供
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_warrant_type(value: Option<&str>) -> Result<Option<WarrantType>> {
    match value {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|message| MonitorError::ValidationError { message }),
    }
}
