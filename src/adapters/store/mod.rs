pub mod holdings;
pub mod warrants;

use crate::config::{DatabaseLocation, SourcesConfig};
use crate::utils::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const MIGRATION_001_HOLDINGS: &str = include_str!("migrations/001_holdings.sql");
const MIGRATION_002_WARRANTS: &str = include_str!("migrations/002_warrants.sql");

pub const TABLES: [&str; 4] = [
    "etf_holdings",
    "holdings_changes",
    "warrant_data",
    "warrant_underlying_summary",
];

/// SQLite 存取層；查詢分別實作於 holdings.rs 與 warrants.rs
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    etf_names: Arc<HashMap<String, String>>,
}

impl Store {
    pub async fn connect(location: &DatabaseLocation) -> Result<Self> {
        let pool = match location {
            DatabaseLocation::Memory => return Self::connect_in_memory().await,
            DatabaseLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .busy_timeout(Duration::from_secs(5));
                SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await?
            }
        };

        tracing::info!("🗄️ Database connected: {}", location.describe());
        Self::from_pool(pool).await
    }

    /// 記憶體資料庫只能有一條連線，否則每條連線各自是一個空資料庫
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self {
            pool,
            etf_names: Arc::new(HashMap::new()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn with_etf_names(mut self, sources: &SourcesConfig) -> Self {
        self.etf_names = Arc::new(
            sources
                .etfs
                .iter()
                .map(|e| (e.code.clone(), e.name.clone()))
                .collect(),
        );
        self
    }

    pub fn etf_name(&self, etf_code: &str) -> String {
        self.etf_names
            .get(etf_code)
            .cloned()
            .unwrap_or_else(|| etf_code.to_string())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<()> {
        tracing::debug!("Running migration 001: holdings");
        sqlx::query(MIGRATION_001_HOLDINGS).execute(&self.pool).await?;

        tracing::debug!("Running migration 002: warrants");
        sqlx::query(MIGRATION_002_WARRANTS).execute(&self.pool).await?;

        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn sqlite_version(&self) -> Result<String> {
        let row = sqlx::query("SELECT sqlite_version() AS version")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("version")?)
    }

    pub async fn existing_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    /// 各資料表筆數
    pub async fn table_counts(&self) -> Result<Vec<(String, i64)>> {
        let mut counts = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            // 表名來自固定清單
            let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {}", table))
                .fetch_one(&self.pool)
                .await?;
            counts.push((table.to_string(), row.try_get("count")?));
        }
        Ok(counts)
    }

    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("🗄️ Database pool closed");
    }
}
