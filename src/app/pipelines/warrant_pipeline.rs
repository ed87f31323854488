use crate::adapters::Store;
use crate::domain::model::{LoadSummary, Warrant};
use crate::domain::ports::{Pipeline, WarrantSource};
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

pub struct WarrantPipeline<W: WarrantSource> {
    source: Arc<W>,
    store: Store,
    pages: u32,
    sort_type: u32,
    trade_date: String,
}

impl<W: WarrantSource> WarrantPipeline<W> {
    pub fn new(source: Arc<W>, store: Store, pages: u32, sort_type: u32, trade_date: &str) -> Self {
        Self {
            source,
            store,
            pages,
            sort_type,
            trade_date: trade_date.to_string(),
        }
    }
}

/// 同一權證代碼出現在多頁時保留第一筆
pub fn dedupe_warrants(warrants: Vec<Warrant>) -> Vec<Warrant> {
    let mut seen = HashSet::new();
    warrants
        .into_iter()
        .filter(|w| seen.insert(w.warrant_code.clone()))
        .collect()
}

#[async_trait]
impl<W: WarrantSource> Pipeline for WarrantPipeline<W> {
    type Extracted = Vec<Warrant>;
    type Transformed = Vec<Warrant>;

    fn name(&self) -> String {
        format!("warrants:sort{}", self.sort_type)
    }

    async fn extract(&self) -> Result<Vec<Warrant>> {
        self.source
            .fetch_warrants(self.pages, self.sort_type, &self.trade_date)
            .await
    }

    async fn transform(&self, data: Vec<Warrant>) -> Result<Vec<Warrant>> {
        let fetched = data.len();
        let warrants = dedupe_warrants(data);
        if warrants.len() < fetched {
            tracing::debug!("Dropped {} duplicate warrants", fetched - warrants.len());
        }
        if warrants.is_empty() {
            return Err(MonitorError::NoDataError {
                source_name: "warrant board".to_string(),
            });
        }
        Ok(warrants)
    }

    async fn load(&self, data: Vec<Warrant>) -> Result<LoadSummary> {
        let records = self.store.replace_warrants(&self.trade_date, &data).await?;
        Ok(LoadSummary {
            source: self.name(),
            date: self.trade_date.clone(),
            records,
            changes: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EtlEngine;
    use crate::domain::model::WarrantType;

    struct FixedBoard(Vec<Warrant>);

    impl WarrantSource for FixedBoard {
        async fn fetch_warrants(&self, _pages: u32, _sort: u32, _date: &str) -> Result<Vec<Warrant>> {
            Ok(self.0.clone())
        }
    }

    fn warrant(code: &str, ranking: i64) -> Warrant {
        Warrant {
            ranking,
            warrant_code: code.to_string(),
            warrant_name: "台積電元大5A購01".to_string(),
            underlying_name: "台積電".to_string(),
            warrant_type: WarrantType::Call,
            close_price: 1.25,
            change_amount: 0.1,
            change_percent: 8.7,
            volume: 1200,
            implied_volatility: 35.2,
            page_number: 1,
            update_date: "2025-03-07".to_string(),
        }
    }

    #[test]
    fn test_first_duplicate_wins() {
        let rows = dedupe_warrants(vec![warrant("03001P", 1), warrant("03002P", 2), warrant("03001P", 9)]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ranking, 1);
    }

    #[tokio::test]
    async fn test_load_stores_warrants_and_summary() {
        let store = Store::connect_in_memory().await.unwrap();
        let board = FixedBoard(vec![warrant("03001P", 1), warrant("03002P", 2)]);
        let pipeline = WarrantPipeline::new(Arc::new(board), store.clone(), 1, 3, "2025-03-07");

        let summary = EtlEngine::new(pipeline).run().await.unwrap();
        assert_eq!(summary.records, 2);

        let rows = store
            .underlying_summary(Some("2025-03-07"), Default::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].warrant_count, 2);
    }

    #[tokio::test]
    async fn test_empty_board_is_no_data() {
        let store = Store::connect_in_memory().await.unwrap();
        let pipeline = WarrantPipeline::new(Arc::new(FixedBoard(Vec::new())), store, 1, 3, "2025-03-07");
        assert!(matches!(
            EtlEngine::new(pipeline).run().await,
            Err(MonitorError::NoDataError { .. })
        ));
    }
}
