use crate::adapters::pocket::parse_holdings;
use crate::adapters::Store;
use crate::core::changes;
use crate::domain::model::{Holding, HoldingChange, LoadSummary};
use crate::domain::ports::{HoldingsSource, Pipeline};
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// 單一 ETF 單日的持股與變化
#[derive(Debug, Clone, Default)]
pub struct HoldingsBatch {
    pub holdings: Vec<Holding>,
    pub changes: Vec<HoldingChange>,
}

/// Pocket JSON → 持股 + 與前一交易日比較 → SQLite
pub struct HoldingsPipeline<S: HoldingsSource> {
    source: Arc<S>,
    store: Store,
    etf_code: String,
    trade_date: String,
}

impl<S: HoldingsSource> HoldingsPipeline<S> {
    pub fn new(source: Arc<S>, store: Store, etf_code: &str, trade_date: &str) -> Self {
        Self {
            source,
            store,
            etf_code: etf_code.to_string(),
            trade_date: trade_date.to_string(),
        }
    }

    pub fn etf_code(&self) -> &str {
        &self.etf_code
    }
}

#[async_trait]
impl<S: HoldingsSource> Pipeline for HoldingsPipeline<S> {
    type Extracted = Value;
    type Transformed = HoldingsBatch;

    fn name(&self) -> String {
        format!("holdings:{}", self.etf_code)
    }

    async fn extract(&self) -> Result<Value> {
        self.source.fetch_holdings(&self.etf_code).await
    }

    async fn transform(&self, data: Value) -> Result<HoldingsBatch> {
        let holdings = parse_holdings(&data, &self.etf_code, &self.trade_date);
        if holdings.is_empty() {
            return Err(MonitorError::NoDataError {
                source_name: format!("Pocket {}", self.etf_code),
            });
        }
        tracing::info!("📋 {} parsed {} holdings", self.etf_code, holdings.len());

        let previous = self
            .store
            .previous_snapshot(&self.etf_code, &self.trade_date)
            .await?;
        if previous.is_empty() {
            tracing::info!("🆕 {} has no earlier snapshot, all holdings are new", self.etf_code);
        }

        let changes = changes::analyze(&self.etf_code, &holdings, &previous, &self.trade_date);
        tracing::debug!("🔍 {} changes against {} previous rows", changes.len(), previous.len());

        Ok(HoldingsBatch { holdings, changes })
    }

    async fn load(&self, data: HoldingsBatch) -> Result<LoadSummary> {
        self.store
            .replace_snapshot(&self.etf_code, &self.trade_date, &data.holdings, &data.changes)
            .await?;

        Ok(LoadSummary {
            source: self.name(),
            date: self.trade_date.clone(),
            records: data.holdings.len(),
            changes: data.changes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EtlEngine;
    use crate::domain::model::ChangeType;
    use serde_json::json;

    struct FixedSource(Value);

    impl HoldingsSource for FixedSource {
        async fn fetch_holdings(&self, _etf_code: &str) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    fn body(rows: Value) -> Value {
        json!({ "Title": ["日期", "代號", "名稱", "權重", "持有數", "單位"], "Data": rows })
    }

    #[tokio::test]
    async fn test_two_days_produce_changes() {
        let store = Store::connect_in_memory().await.unwrap();

        let day1 = FixedSource(body(json!([
            ["20250306", "2330", "台積電", "9.5", "1,000", "股"],
            ["20250306", "2317", "鴻海", "4.0", "500", "股"],
        ])));
        let summary = EtlEngine::new(HoldingsPipeline::new(
            Arc::new(day1),
            store.clone(),
            "00981A",
            "2025-03-06",
        ))
        .run()
        .await
        .unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.changes, 2);

        let day2 = FixedSource(body(json!([
            ["20250307", "2330", "台積電", "9.8", "1,200", "股"],
            ["20250307", "2454", "聯發科", "3.1", "300", "股"],
        ])));
        let pipeline = HoldingsPipeline::new(Arc::new(day2), store.clone(), "00981A", "2025-03-07");
        let summary = EtlEngine::new(pipeline).run().await.unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.changes, 3);

        let changes = store.holdings_changes(Some("00981A"), Some("2025-03-07")).await.unwrap();
        let kinds: Vec<ChangeType> = changes.iter().map(|c| c.change.change_type).collect();
        assert!(kinds.contains(&ChangeType::Increased));
        assert!(kinds.contains(&ChangeType::New));
        assert!(kinds.contains(&ChangeType::Removed));
    }

    #[tokio::test]
    async fn test_empty_response_is_no_data() {
        let store = Store::connect_in_memory().await.unwrap();
        let pipeline = HoldingsPipeline::new(
            Arc::new(FixedSource(json!({ "Data": [] }))),
            store,
            "00981A",
            "2025-03-07",
        );
        let err = EtlEngine::new(pipeline).run().await.unwrap_err();
        assert!(matches!(err, MonitorError::NoDataError { .. }));
    }
}
