use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_UNIT: &str = "股";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    New,
    Increased,
    Decreased,
    Removed,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::New => "NEW",
            ChangeType::Increased => "INCREASED",
            ChangeType::Decreased => "DECREASED",
            ChangeType::Removed => "REMOVED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeType::New => "新增",
            ChangeType::Increased => "增持",
            ChangeType::Decreased => "減持",
            ChangeType::Removed => "完全移除",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(ChangeType::New),
            "INCREASED" => Ok(ChangeType::Increased),
            "DECREASED" => Ok(ChangeType::Decreased),
            "REMOVED" => Ok(ChangeType::Removed),
            other => Err(format!("unknown change type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub etf_code: String,
    pub stock_code: String,
    pub stock_name: String,
    pub weight: f64,
    pub shares: i64,
    pub unit: String,
    pub update_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingChange {
    pub etf_code: String,
    pub stock_code: String,
    pub stock_name: String,
    pub change_type: ChangeType,
    pub old_shares: i64,
    pub new_shares: i64,
    pub old_weight: f64,
    pub new_weight: f64,
    pub change_date: String,
}

impl HoldingChange {
    pub fn shares_increase(&self) -> i64 {
        match self.change_type {
            ChangeType::New => self.new_shares,
            ChangeType::Increased => (self.new_shares - self.old_shares).max(0),
            ChangeType::Decreased | ChangeType::Removed => 0,
        }
    }

    pub fn shares_decrease(&self) -> i64 {
        match self.change_type {
            ChangeType::New | ChangeType::Increased => 0,
            ChangeType::Decreased => (self.old_shares - self.new_shares).max(0),
            ChangeType::Removed => self.old_shares,
        }
    }
}

/// 當日持股加上同日的變化紀錄 (若有)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingWithChange {
    #[serde(flatten)]
    pub holding: Holding,
    pub change_type: Option<ChangeType>,
    pub old_shares: i64,
    pub new_shares: i64,
    pub old_weight: Option<f64>,
    pub new_weight: Option<f64>,
    pub shares_increase: i64,
    pub shares_decrease: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewHolding {
    pub etf_code: String,
    pub etf_name: String,
    pub stock_code: String,
    pub stock_name: String,
    pub weight: f64,
    pub shares: i64,
    pub unit: String,
    pub change_type: ChangeType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecreasedHolding {
    #[serde(flatten)]
    pub change: HoldingChange,
    pub etf_name: String,
    pub change_label: &'static str,
    pub change_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedChange {
    #[serde(flatten)]
    pub change: HoldingChange,
    pub etf_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossHoldingDetail {
    pub etf_code: String,
    pub etf_name: String,
    pub shares: i64,
    pub previous_shares: i64,
    pub change: i64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossHolding {
    pub stock_code: String,
    pub stock_name: String,
    pub etf_count: i64,
    pub total_shares: i64,
    pub total_increase: i64,
    pub total_decrease: i64,
    pub etf_details: Vec<CrossHoldingDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeStats {
    pub total: usize,
    pub new_count: usize,
    pub increased_count: usize,
    pub decreased_count: usize,
    pub removed_count: usize,
    pub no_change_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtfInfo {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewHoldingsDiagnosis {
    pub status: &'static str,
    pub used_date: Option<String>,
    pub total_changes: i64,
    pub new_changes: i64,
    pub total_holdings: i64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarrantType {
    #[serde(rename = "認購")]
    Call,
    #[serde(rename = "認售")]
    Put,
}

impl WarrantType {
    pub const ALL: [WarrantType; 2] = [WarrantType::Call, WarrantType::Put];

    pub fn as_str(&self) -> &'static str {
        match self {
            WarrantType::Call => "認購",
            WarrantType::Put => "認售",
        }
    }
}

impl fmt::Display for WarrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarrantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "認購" | "call" => Ok(WarrantType::Call),
            "認售" | "put" => Ok(WarrantType::Put),
            other => Err(format!("unknown warrant type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warrant {
    pub ranking: i64,
    pub warrant_code: String,
    pub warrant_name: String,
    pub underlying_name: String,
    pub warrant_type: WarrantType,
    pub close_price: f64,
    pub change_amount: f64,
    pub change_percent: f64,
    pub volume: i64,
    pub implied_volatility: f64,
    pub page_number: i64,
    pub update_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderlyingSummary {
    pub underlying_name: String,
    pub warrant_type: WarrantType,
    pub warrant_count: i64,
    pub total_volume: i64,
    pub avg_implied_volatility: f64,
    pub total_change_amount: f64,
    pub update_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WarrantStatistics {
    pub total_warrants: i64,
    pub call_warrants: i64,
    pub put_warrants: i64,
    pub total_volume: i64,
    pub avg_implied_volatility: f64,
    pub avg_change_percent: f64,
    pub unique_underlyings: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeComparison {
    pub underlying_name: String,
    pub current_volume: i64,
    pub five_day_avg: i64,
    pub volume_diff: i64,
    pub change_percent: f64,
    pub is_high_change: bool,
    pub warrant_type: WarrantType,
    pub analysis_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisInfo {
    pub analysis_date: Option<String>,
    pub previous_dates_count: usize,
    pub previous_dates: Vec<String>,
    pub call_underlyings_count: usize,
    pub put_underlyings_count: usize,
    pub call_high_change_count: usize,
    pub put_high_change_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolumeAnalysis {
    pub call_data: Vec<VolumeComparison>,
    pub put_data: Vec<VolumeComparison>,
    pub analysis_info: AnalysisInfo,
}

/// 一次載入作業的結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub source: String,
    pub date: String,
    pub records: usize,
    pub changes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(change_type: ChangeType, old_shares: i64, new_shares: i64) -> HoldingChange {
        HoldingChange {
            etf_code: "00981A".to_string(),
            stock_code: "2330".to_string(),
            stock_name: "台積電".to_string(),
            change_type,
            old_shares,
            new_shares,
            old_weight: 0.0,
            new_weight: 0.0,
            change_date: "2025-03-07".to_string(),
        }
    }

    #[test]
    fn test_share_deltas() {
        assert_eq!(change(ChangeType::New, 0, 500).shares_increase(), 500);
        assert_eq!(change(ChangeType::Increased, 100, 250).shares_increase(), 150);
        assert_eq!(change(ChangeType::Increased, 100, 250).shares_decrease(), 0);
        assert_eq!(change(ChangeType::Decreased, 300, 120).shares_decrease(), 180);
        assert_eq!(change(ChangeType::Removed, 300, 0).shares_decrease(), 300);
        assert_eq!(change(ChangeType::Removed, 300, 0).shares_increase(), 0);
    }

    #[test]
    fn test_type_round_trip_through_strings() {
        for t in [
            ChangeType::New,
            ChangeType::Increased,
            ChangeType::Decreased,
            ChangeType::Removed,
        ] {
            assert_eq!(t.as_str().parse::<ChangeType>().unwrap(), t);
        }
        assert_eq!("認售".parse::<WarrantType>().unwrap(), WarrantType::Put);
        assert!("牛證".parse::<WarrantType>().is_err());
    }

    #[test]
    fn test_warrant_type_serializes_as_chinese() {
        let json = serde_json::to_string(&WarrantType::Call).unwrap();
        assert_eq!(json, "\"認購\"");
    }
}
