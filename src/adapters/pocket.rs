use crate::config::PocketConfig;
use crate::domain::model::{Holding, DEFAULT_UNIT};
use crate::domain::ports::HoldingsSource;
use crate::utils::error::{MonitorError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Pocket 證券的 DtNo 資料端點
#[derive(Debug, Clone)]
pub struct PocketClient {
    client: Client,
    config: PocketConfig,
}

impl PocketClient {
    pub fn new(config: PocketConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-TW,zh;q=0.9,en;q=0.8"));
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        if let Ok(referer) = HeaderValue::from_str(&config.referer) {
            headers.insert(REFERER, referer);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &PocketConfig {
        &self.config
    }

    fn query_params(&self, etf_code: &str) -> [(&'static str, String); 4] {
        [
            ("action", "getdtnodata".to_string()),
            ("DtNo", self.config.dtno.clone()),
            (
                "ParamStr",
                format!(
                    "AssignID={};MTPeriod=0;DTMode=0;DTRange=1;DTOrder=1;MajorTable=M722;",
                    etf_code
                ),
            ),
            ("FilterNo", "0".to_string()),
        ]
    }
}

impl HoldingsSource for PocketClient {
    async fn fetch_holdings(&self, etf_code: &str) -> Result<Value> {
        tracing::debug!("📡 Requesting holdings for {} from {}", etf_code, self.config.endpoint);

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&self.query_params(etf_code))
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("📡 {} response status: {}", etf_code, status);

        if !status.is_success() {
            return Err(MonitorError::UpstreamStatusError {
                status: status.as_u16(),
                url: self.config.endpoint.clone(),
            });
        }

        let body: Value = response.json().await?;
        Ok(body)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn parse_weight(text: &str) -> Option<f64> {
    let cleaned = text.replace('%', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Some(0.0);
    }
    cleaned.parse::<f64>().ok()
}

fn parse_shares(text: &str) -> Option<i64> {
    let cleaned = text.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Some(0);
    }
    cleaned
        .parse::<i64>()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().map(|f| f as i64))
}

/// 解析 `Data` 欄位：每列為 [日期, 代號, 名稱, 權重(%), 持有數, 單位]
pub fn parse_holdings(body: &Value, etf_code: &str, update_date: &str) -> Vec<Holding> {
    let Some(rows) = body.get("Data").and_then(Value::as_array) else {
        tracing::warn!("⚠️ {} response has no Data field", etf_code);
        return Vec::new();
    };

    if let Some(title) = body.get("Title") {
        tracing::debug!("{} columns: {}", etf_code, title);
    }

    let mut seen = HashSet::new();
    let mut holdings = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(cells) = row.as_array() else {
            tracing::warn!("⚠️ {} skipping non-array row: {}", etf_code, row);
            continue;
        };
        if cells.len() < 6 {
            tracing::warn!("⚠️ {} skipping short row: {}", etf_code, row);
            continue;
        }

        let stock_code = cell_text(&cells[1]);
        let stock_name = cell_text(&cells[2]);
        if stock_code.is_empty() || stock_name.is_empty() {
            continue;
        }

        let (Some(weight), Some(shares)) = (
            parse_weight(&cell_text(&cells[3])),
            parse_shares(&cell_text(&cells[4])),
        ) else {
            tracing::warn!("⚠️ {} skipping unparsable row: {}", etf_code, row);
            continue;
        };

        if !seen.insert(stock_code.clone()) {
            tracing::debug!("{} duplicate stock {} ignored", etf_code, stock_code);
            continue;
        }

        let unit = cell_text(&cells[5]);
        holdings.push(Holding {
            etf_code: etf_code.to_string(),
            stock_code,
            stock_name,
            weight,
            shares,
            unit: if unit.is_empty() {
                DEFAULT_UNIT.to_string()
            } else {
                unit
            },
            update_date: update_date.to_string(),
        });
    }

    tracing::info!("📋 Parsed {} holdings for {}", holdings.len(), etf_code);
    holdings
}

/// 原始回應結構摘要，用於檢查上游格式是否改變
#[derive(Debug, Clone, Serialize)]
pub struct ResponseSummary {
    pub etf_code: String,
    pub top_level_keys: Vec<String>,
    pub title: Option<Value>,
    pub row_count: usize,
    pub sample_rows: Vec<Value>,
    pub parsed_holdings: usize,
}

pub fn summarize_response(body: &Value, etf_code: &str, update_date: &str) -> ResponseSummary {
    let rows = body.get("Data").and_then(Value::as_array);

    ResponseSummary {
        etf_code: etf_code.to_string(),
        top_level_keys: body
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default(),
        title: body.get("Title").cloned(),
        row_count: rows.map(Vec::len).unwrap_or(0),
        sample_rows: rows
            .map(|r| r.iter().take(3).cloned().collect())
            .unwrap_or_default(),
        parsed_holdings: parse_holdings(body, etf_code, update_date).len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mixed_cells() {
        let body = json!({
            "Title": ["日期", "標的代號", "標的名稱", "權重(%)", "持有數", "單位"],
            "Data": [
                ["20250307", "2330", "台積電", "9.52", "1,234,000", "股"],
                ["20250307", 2317, "鴻海", 4.1, 500000, "股"],
                ["20250307", "2454", "聯發科", "", "", ""],
                ["20250307", "", "無代號", "1.0", "10", "股"],
                ["20250307", "3008", "大立光"],
                ["20250307", "2412", "中華電", "abc", "10", "股"],
                ["20250307", "2330", "台積電重複", "1.0", "1", "股"]
            ]
        });

        let holdings = parse_holdings(&body, "00981A", "2025-03-07");
        let codes: Vec<&str> = holdings.iter().map(|h| h.stock_code.as_str()).collect();
        assert_eq!(codes, vec!["2330", "2317", "2454"]);

        assert_eq!(holdings[0].shares, 1_234_000);
        assert_eq!(holdings[0].weight, 9.52);
        assert_eq!(holdings[0].stock_name, "台積電");
        assert_eq!(holdings[1].shares, 500_000);
        assert_eq!(holdings[1].weight, 4.1);
        assert_eq!(holdings[2].weight, 0.0);
        assert_eq!(holdings[2].shares, 0);
        assert_eq!(holdings[2].unit, DEFAULT_UNIT);
        assert!(holdings.iter().all(|h| h.update_date == "2025-03-07"));
    }

    #[test]
    fn test_missing_data_is_empty() {
        assert!(parse_holdings(&json!({"Title": []}), "00981A", "2025-03-07").is_empty());
        assert!(parse_holdings(&json!({"Data": []}), "00981A", "2025-03-07").is_empty());
    }

    #[test]
    fn test_summary() {
        let body = json!({
            "Title": ["日期"],
            "Data": [["20250307", "2330", "台積電", "9.5", "100", "股"]]
        });
        let summary = summarize_response(&body, "00981A", "2025-03-07");
        assert_eq!(summary.row_count, 1);
        assert_eq!(summary.parsed_holdings, 1);
        assert!(summary.top_level_keys.contains(&"Data".to_string()));
    }

    #[test]
    fn test_query_params() {
        let client = PocketClient::new(PocketConfig::default()).unwrap();
        let params = client.query_params("00981A");
        assert_eq!(params[1].1, "59449513");
        assert!(params[2].1.starts_with("AssignID=00981A;"));
    }
}
