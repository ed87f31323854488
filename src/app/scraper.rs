use crate::adapters::pocket::{summarize_response, ResponseSummary};
use crate::adapters::{PocketClient, Store, WarrantBoardClient};
use crate::app::pipelines::{HoldingsPipeline, WarrantPipeline};
use crate::config::SourcesConfig;
use crate::core::EtlEngine;
use crate::domain::model::LoadSummary;
use crate::domain::ports::{HoldingsSource, WarrantSource};
use crate::utils::error::{MonitorError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// 正式環境使用的爬蟲組合
pub type LiveScraper = Scraper<PocketClient, WarrantBoardClient>;

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeFailure {
    pub etf_code: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeReport {
    pub trade_date: String,
    pub succeeded: usize,
    pub total: usize,
    pub loads: Vec<LoadSummary>,
    pub failures: Vec<ScrapeFailure>,
}

/// 所有爬蟲作業的入口；同一時間只允許一個作業執行。
pub struct Scraper<H: HoldingsSource, W: WarrantSource> {
    holdings_source: Arc<H>,
    warrant_source: Arc<W>,
    store: Store,
    sources: Arc<SourcesConfig>,
    running: Mutex<()>,
    monitoring: bool,
    trade_date: Option<String>,
}

impl LiveScraper {
    pub fn from_config(store: Store, sources: SourcesConfig) -> Result<Self> {
        let holdings = PocketClient::new(sources.pocket.clone())?;
        let warrants = WarrantBoardClient::new(sources.warrants.clone())?;
        Ok(Self::new(holdings, warrants, store, sources))
    }
}

impl<H: HoldingsSource, W: WarrantSource> Scraper<H, W> {
    pub fn new(holdings_source: H, warrant_source: W, store: Store, sources: SourcesConfig) -> Self {
        Self {
            holdings_source: Arc::new(holdings_source),
            warrant_source: Arc::new(warrant_source),
            store,
            sources: Arc::new(sources),
            running: Mutex::new(()),
            monitoring: false,
            trade_date: None,
        }
    }

    pub fn with_monitoring(mut self, monitoring: bool) -> Self {
        self.monitoring = monitoring;
        self
    }

    /// 固定寫入的交易日；未設定時使用本地日期
    pub fn with_trade_date(mut self, date: Option<String>) -> Self {
        self.trade_date = date;
        self
    }

    pub fn sources(&self) -> &SourcesConfig {
        &self.sources
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    fn trade_date(&self) -> String {
        self.trade_date
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string())
    }

    async fn run_holdings(&self, etf_code: &str, trade_date: &str) -> Result<LoadSummary> {
        let pipeline = HoldingsPipeline::new(
            self.holdings_source.clone(),
            self.store.clone(),
            etf_code,
            trade_date,
        );
        EtlEngine::new_with_monitoring(pipeline, self.monitoring)
            .run()
            .await
    }

    /// 依序爬取所有設定的 ETF；單檔失敗只記錄，不中斷整批
    pub async fn scrape_all_etfs(&self) -> Result<ScrapeReport> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| MonitorError::ScrapeInProgress)?;

        let trade_date = self.trade_date();
        let codes = self.sources.etf_codes();
        let delay = Duration::from_secs(self.sources.pocket.delay_secs);
        tracing::info!("🕷️ Scraping {} ETFs for {}", codes.len(), trade_date);

        let mut report = ScrapeReport {
            trade_date: trade_date.clone(),
            total: codes.len(),
            ..Default::default()
        };

        for (i, code) in codes.iter().enumerate() {
            match self.run_holdings(code, &trade_date).await {
                Ok(summary) => {
                    report.succeeded += 1;
                    report.loads.push(summary);
                }
                Err(e) => {
                    tracing::error!("❌ {} failed: {}", code, e);
                    report.failures.push(ScrapeFailure {
                        etf_code: code.clone(),
                        error: e.user_friendly_message(),
                    });
                }
            }

            if i + 1 < codes.len() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        tracing::info!(
            "🏁 Scrape finished: {}/{} succeeded",
            report.succeeded,
            report.total
        );
        Ok(report)
    }

    pub async fn scrape_single_etf(&self, etf_code: &str) -> Result<LoadSummary> {
        if !self.sources.is_tracked(etf_code) {
            return Err(MonitorError::UnknownEtfError {
                code: etf_code.to_string(),
            });
        }
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| MonitorError::ScrapeInProgress)?;

        let trade_date = self.trade_date();
        self.run_holdings(etf_code, &trade_date).await
    }

    pub async fn scrape_warrants(&self, pages: u32, sort_type: u32) -> Result<LoadSummary> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| MonitorError::ScrapeInProgress)?;

        let trade_date = self.trade_date();
        tracing::info!("🕷️ Scraping {} warrant pages (sort {}) for {}", pages, sort_type, trade_date);

        let pipeline = WarrantPipeline::new(
            self.warrant_source.clone(),
            self.store.clone(),
            pages,
            sort_type,
            &trade_date,
        );
        EtlEngine::new_with_monitoring(pipeline, self.monitoring)
            .run()
            .await
    }

    /// 只抓取並摘要上游原始回應，不寫入資料庫
    pub async fn probe(&self, etf_code: &str) -> Result<ResponseSummary> {
        let body = self.holdings_source.fetch_holdings(etf_code).await?;
        let summary = summarize_response(&body, etf_code, &self.trade_date());
        tracing::info!(
            "🔎 {}: keys {:?}, {} rows, {} parsed",
            etf_code,
            summary.top_level_keys,
            summary.row_count,
            summary.parsed_holdings
        );
        Ok(summary)
    }
}
