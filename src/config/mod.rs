pub mod sources;

use crate::utils::error::{MonitorError, Result};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{self, Validate};
use chrono::NaiveTime;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;

pub use sources::{EtfSource, PocketConfig, SourcesConfig, WarrantBoardConfig};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://etf_holdings.db";
pub const DEFAULT_SCHEDULER_TOKEN: &str = "default-secret-token";
pub const DEFAULT_WEB_PASSWORD: &str = "etf2024";

/// 服務設定：命令列參數優先，其次環境變數，最後是預設值
#[derive(Debug, Clone, Parser)]
#[command(name = "etf-monitor")]
#[command(about = "ETF holdings and warrant ranking monitor")]
pub struct Settings {
    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    #[arg(
        long,
        env = "DEBUG",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub debug: bool,

    #[arg(long, env = "ALLOWED_HOSTS", default_value = "*", value_delimiter = ',')]
    pub allowed_hosts: Vec<String>,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    #[arg(long, env = "SCHEDULER_TOKEN", default_value = DEFAULT_SCHEDULER_TOKEN, hide_env_values = true)]
    pub scheduler_token: String,

    #[arg(long, env = "WEB_PASSWORD", default_value = DEFAULT_WEB_PASSWORD, hide_env_values = true)]
    pub web_password: String,

    /// Session lifetime in seconds
    #[arg(long, env = "SESSION_TIMEOUT", default_value_t = 28800)]
    pub session_timeout: u64,

    /// Web requests per IP per hour
    #[arg(long, env = "RATE_LIMIT_REQUESTS", default_value_t = 100)]
    pub rate_limit_requests: u32,

    /// API requests per IP per day
    #[arg(long, env = "API_DAILY_LIMIT", default_value_t = 1000)]
    pub api_daily_limit: u32,

    /// TOML file describing upstream sources and tracked ETFs
    #[arg(long, env = "SOURCES_CONFIG")]
    pub sources_config: Option<PathBuf>,

    #[arg(
        long,
        env = "SCHEDULE_ENABLED",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub schedule_enabled: bool,

    /// Local time (HH:MM) of the weekday holdings scrape
    #[arg(long, env = "SCHEDULE_TIME", default_value = "21:30")]
    pub schedule_time: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "compact")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

impl DatabaseLocation {
    pub fn describe(&self) -> String {
        match self {
            DatabaseLocation::File(path) => path.display().to_string(),
            DatabaseLocation::Memory => ":memory:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Sqlite,
    Postgres,
    Unsupported,
}

pub fn database_kind(url: &str) -> DatabaseKind {
    let url = url.trim();
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        DatabaseKind::Postgres
    } else if url.starts_with("sqlite:") || !url.contains("://") {
        DatabaseKind::Sqlite
    } else {
        DatabaseKind::Unsupported
    }
}

fn sqlite_location(url: &str) -> DatabaseLocation {
    let url = url.trim();
    if url == "sqlite::memory:" || url == ":memory:" {
        return DatabaseLocation::Memory;
    }

    // sqlite:///relative.db 與 sqlite:////abs/path.db 沿用 SQLAlchemy 的寫法
    let path = url
        .strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);

    DatabaseLocation::File(PathBuf::from(path))
}

/// 解析資料庫位置；PostgreSQL 不支援，退回預設 SQLite 檔案
pub fn resolve_database(url: &str) -> DatabaseLocation {
    match database_kind(url) {
        DatabaseKind::Sqlite => sqlite_location(url),
        DatabaseKind::Postgres => {
            tracing::warn!(
                "⚠️ PostgreSQL is not supported, falling back to {}",
                DEFAULT_DATABASE_URL
            );
            sqlite_location(DEFAULT_DATABASE_URL)
        }
        DatabaseKind::Unsupported => {
            tracing::warn!(
                "⚠️ Unrecognised DATABASE_URL, falling back to {}",
                DEFAULT_DATABASE_URL
            );
            sqlite_location(DEFAULT_DATABASE_URL)
        }
    }
}

impl Settings {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| MonitorError::InvalidConfigValueError {
            field: "host".to_string(),
            value: addr.clone(),
            reason: "Expected an IP address".to_string(),
        })
    }

    pub fn schedule_time(&self) -> Result<NaiveTime> {
        validation::parse_time_of_day("schedule_time", &self.schedule_time)
    }

    pub fn database(&self) -> DatabaseLocation {
        resolve_database(&self.database_url)
    }

    pub fn host_allowed(&self, host: &str) -> bool {
        let host = host.split(':').next().unwrap_or(host).trim();
        self.allowed_hosts
            .iter()
            .map(|h| h.trim())
            .any(|allowed| allowed == "*" || allowed.eq_ignore_ascii_case(host))
    }

    /// 仍使用預設值的安全相關設定
    pub fn insecure_defaults(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.web_password == DEFAULT_WEB_PASSWORD {
            fields.push("WEB_PASSWORD");
        }
        if self.scheduler_token == DEFAULT_SCHEDULER_TOKEN {
            fields.push("SCHEDULER_TOKEN");
        }
        if self.is_production() && self.allowed_hosts.iter().any(|h| h.trim() == "*") {
            fields.push("ALLOWED_HOSTS");
        }
        fields
    }

    pub fn sources(&self) -> Result<SourcesConfig> {
        let sources = match &self.sources_config {
            Some(path) => SourcesConfig::from_file(path)?,
            None => SourcesConfig::default(),
        };
        sources.validate()?;
        Ok(sources)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_positive_number("port", u64::from(self.port), 1)?;
        validation::validate_positive_number("session_timeout", self.session_timeout, 1)?;
        validation::validate_positive_number(
            "rate_limit_requests",
            u64::from(self.rate_limit_requests),
            1,
        )?;
        validation::validate_positive_number("api_daily_limit", u64::from(self.api_daily_limit), 1)?;
        validation::validate_non_empty_string("web_password", &self.web_password)?;
        validation::validate_non_empty_string("scheduler_token", &self.scheduler_token)?;
        self.schedule_time()?;
        self.bind_addr()?;

        if database_kind(&self.database_url) == DatabaseKind::Unsupported {
            return Err(MonitorError::InvalidConfigValueError {
                field: "database_url".to_string(),
                value: self.database_url.clone(),
                reason: "Expected a sqlite:// or postgres:// URL".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(args: &[&str]) -> Settings {
        let mut argv = vec!["etf-monitor"];
        argv.extend_from_slice(args);
        Settings::parse_from(argv)
    }

    #[test]
    fn test_database_locations() {
        let file = |url: &str| settings(&["--database-url", url]).database();

        assert_eq!(
            file("sqlite://etf_holdings.db"),
            DatabaseLocation::File(PathBuf::from("etf_holdings.db"))
        );
        assert_eq!(
            file("sqlite:///data/etf.db"),
            DatabaseLocation::File(PathBuf::from("data/etf.db"))
        );
        assert_eq!(
            file("sqlite:////var/lib/etf.db"),
            DatabaseLocation::File(PathBuf::from("/var/lib/etf.db"))
        );
        assert_eq!(file("sqlite::memory:"), DatabaseLocation::Memory);
        assert_eq!(
            file("postgres://user:pw@db/etf"),
            DatabaseLocation::File(PathBuf::from("etf_holdings.db"))
        );
    }

    #[test]
    fn test_validation() {
        assert!(settings(&[]).validate().is_ok());
        assert!(settings(&["--port", "0"]).validate().is_err());
        assert!(settings(&["--schedule-time", "9pm"]).validate().is_err());
        assert!(settings(&["--rate-limit-requests", "0"]).validate().is_err());
        assert!(settings(&["--database-url", "mysql://db/etf"]).validate().is_err());
    }

    #[test]
    fn test_insecure_defaults_and_hosts() {
        let s = settings(&["--environment", "production", "--allowed-hosts", "etf.example.com,localhost"]);
        assert_eq!(s.insecure_defaults(), vec!["WEB_PASSWORD", "SCHEDULER_TOKEN"]);
        assert!(s.is_production());
        assert!(s.host_allowed("etf.example.com:443"));
        assert!(!s.host_allowed("evil.example.com"));

        let s = settings(&["--web-password", "hunter2", "--scheduler-token", "tok"]);
        assert!(s.insecure_defaults().is_empty());
        assert!(s.host_allowed("anything"));
    }

    #[test]
    fn test_boolish_flags() {
        let s = settings(&["--debug", "false", "--schedule-enabled", "yes"]);
        assert!(!s.debug);
        assert!(s.schedule_enabled);
    }
}
