use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamStatusError { status: u16, url: String },

    #[error("Failed to parse upstream data: {message}")]
    ParseError { message: String },

    #[error("No data returned for {source_name}")]
    NoDataError { source_name: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Not found: {resource}")]
    NotFoundError { resource: String },

    #[error("Unknown ETF code: {code}")]
    UnknownEtfError { code: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("A scrape is already running")]
    ScrapeInProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Database,
    Configuration,
    Data,
    Client,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MonitorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MonitorError::HttpError(_) | MonitorError::UpstreamStatusError { .. } => {
                ErrorCategory::Network
            }
            MonitorError::DatabaseError(_) => ErrorCategory::Database,
            MonitorError::ConfigError { .. }
            | MonitorError::ConfigValidationError { .. }
            | MonitorError::InvalidConfigValueError { .. }
            | MonitorError::MissingConfigError { .. } => ErrorCategory::Configuration,
            MonitorError::SerializationError(_)
            | MonitorError::CsvError(_)
            | MonitorError::ParseError { .. }
            | MonitorError::NoDataError { .. } => ErrorCategory::Data,
            MonitorError::ValidationError { .. }
            | MonitorError::NotFoundError { .. }
            | MonitorError::UnknownEtfError { .. }
            | MonitorError::Unauthorized
            | MonitorError::ScrapeInProgress => ErrorCategory::Client,
            MonitorError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Client => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Data => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Database | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MonitorError::HttpError(_) => "檢查網路連線或上游服務狀態後重試",
            MonitorError::UpstreamStatusError { .. } => "上游服務暫時不可用，請稍後重試",
            MonitorError::DatabaseError(_) => "確認 DATABASE_URL 設定正確且資料庫檔案可寫入",
            MonitorError::IoError(_) => "確認檔案路徑存在且具有讀寫權限",
            MonitorError::SerializationError(_) | MonitorError::ParseError { .. } => {
                "上游資料格式可能已變更，請檢查解析規則"
            }
            MonitorError::CsvError(_) => "確認輸出路徑可寫入",
            MonitorError::NoDataError { .. } => "非交易日或上游尚未更新，請稍後再試",
            MonitorError::ConfigError { .. }
            | MonitorError::ConfigValidationError { .. }
            | MonitorError::InvalidConfigValueError { .. } => "請檢查環境變數與設定檔內容",
            MonitorError::MissingConfigError { .. } => "請補上缺少的設定值",
            MonitorError::ValidationError { .. } => "請確認請求參數格式 (日期為 YYYY-MM-DD)",
            MonitorError::NotFoundError { .. } | MonitorError::UnknownEtfError { .. } => {
                "請確認代碼或路徑是否正確"
            }
            MonitorError::Unauthorized => "請重新登入或確認排程令牌",
            MonitorError::ScrapeInProgress => "等待目前的爬取作業完成後再試",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MonitorError::HttpError(_) | MonitorError::UpstreamStatusError { .. } => {
                format!("無法取得上游資料: {}", self)
            }
            MonitorError::DatabaseError(_) => "資料庫操作失敗".to_string(),
            MonitorError::NoDataError { source_name } => format!("{} 無資料", source_name),
            MonitorError::UnknownEtfError { code } => format!("不支援的ETF代碼: {}", code),
            MonitorError::Unauthorized => "未授權".to_string(),
            MonitorError::ScrapeInProgress => "爬蟲正在執行中".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            MonitorError::ValidationError { .. } | MonitorError::UnknownEtfError { .. } => {
                StatusCode::BAD_REQUEST
            }
            MonitorError::NotFoundError { .. } => StatusCode::NOT_FOUND,
            MonitorError::Unauthorized => StatusCode::UNAUTHORIZED,
            MonitorError::ScrapeInProgress => StatusCode::CONFLICT,
            MonitorError::HttpError(_)
            | MonitorError::UpstreamStatusError { .. }
            | MonitorError::NoDataError { .. } => StatusCode::BAD_GATEWAY,
            MonitorError::DatabaseError(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
    category: ErrorCategory,
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("❌ {} (category: {:?})", self, self.category());
        }
        let body = ErrorBody {
            status: "error",
            message: self.user_friendly_message(),
            category: self.category(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
