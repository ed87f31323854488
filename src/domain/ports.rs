use crate::domain::model::{LoadSummary, Warrant};
use crate::utils::error::Result;
use async_trait::async_trait;

/// ETF 持股來源 (回傳上游原始 JSON)
pub trait HoldingsSource: Send + Sync {
    fn fetch_holdings(
        &self,
        etf_code: &str,
    ) -> impl std::future::Future<Output = Result<serde_json::Value>> + Send;
}

/// 權證排行來源，逐頁抓取並解析
pub trait WarrantSource: Send + Sync {
    fn fetch_warrants(
        &self,
        pages: u32,
        sort_type: u32,
        date: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Warrant>>> + Send;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: Send;
    type Transformed: Send;

    fn name(&self) -> String;
    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Transformed>;
    async fn load(&self, data: Self::Transformed) -> Result<LoadSummary>;
}
