use crate::domain::model::HoldingWithChange;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoldingSort {
    #[default]
    WeightDesc,
    WeightAsc,
    SharesDesc,
    SharesAsc,
    StockCodeAsc,
    StockNameAsc,
}

impl HoldingSort {
    pub const ALL: [HoldingSort; 6] = [
        HoldingSort::WeightDesc,
        HoldingSort::WeightAsc,
        HoldingSort::SharesDesc,
        HoldingSort::SharesAsc,
        HoldingSort::StockCodeAsc,
        HoldingSort::StockNameAsc,
    ];

    /// 無法辨識的排序鍵使用預設 (權重降序)
    pub fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or_default() {
            "weight_asc" => HoldingSort::WeightAsc,
            "shares_desc" => HoldingSort::SharesDesc,
            "shares_asc" => HoldingSort::SharesAsc,
            "stock_code_asc" => HoldingSort::StockCodeAsc,
            "stock_name_asc" => HoldingSort::StockNameAsc,
            _ => HoldingSort::WeightDesc,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            HoldingSort::WeightDesc => "weight_desc",
            HoldingSort::WeightAsc => "weight_asc",
            HoldingSort::SharesDesc => "shares_desc",
            HoldingSort::SharesAsc => "shares_asc",
            HoldingSort::StockCodeAsc => "stock_code_asc",
            HoldingSort::StockNameAsc => "stock_name_asc",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            HoldingSort::WeightDesc => "權重降序",
            HoldingSort::WeightAsc => "權重升序",
            HoldingSort::SharesDesc => "股數降序",
            HoldingSort::SharesAsc => "股數升序",
            HoldingSort::StockCodeAsc => "股票代碼升序",
            HoldingSort::StockNameAsc => "股票名稱升序",
        }
    }

    pub fn apply(&self, holdings: &mut [HoldingWithChange]) {
        let by_weight = |a: &HoldingWithChange, b: &HoldingWithChange| {
            a.holding
                .weight
                .partial_cmp(&b.holding.weight)
                .unwrap_or(Ordering::Equal)
        };

        match self {
            HoldingSort::WeightDesc => holdings.sort_by(|a, b| by_weight(b, a)),
            HoldingSort::WeightAsc => holdings.sort_by(by_weight),
            HoldingSort::SharesDesc => holdings.sort_by(|a, b| b.holding.shares.cmp(&a.holding.shares)),
            HoldingSort::SharesAsc => holdings.sort_by_key(|h| h.holding.shares),
            HoldingSort::StockCodeAsc => {
                holdings.sort_by(|a, b| a.holding.stock_code.cmp(&b.holding.stock_code))
            }
            HoldingSort::StockNameAsc => {
                holdings.sort_by(|a, b| a.holding.stock_name.cmp(&b.holding.stock_name))
            }
        }
    }
}

/// 權證排行排序；對應固定的 ORDER BY 子句
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarrantSort {
    #[default]
    Ranking,
    ChangePercentDesc,
    ChangePercentAsc,
    VolumeDesc,
    VolumeAsc,
    ImpliedVolatilityDesc,
    ImpliedVolatilityAsc,
}

impl WarrantSort {
    pub fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or_default() {
            "change_percent_desc" => WarrantSort::ChangePercentDesc,
            "change_percent_asc" => WarrantSort::ChangePercentAsc,
            "volume_desc" => WarrantSort::VolumeDesc,
            "volume_asc" => WarrantSort::VolumeAsc,
            "implied_volatility_desc" => WarrantSort::ImpliedVolatilityDesc,
            "implied_volatility_asc" => WarrantSort::ImpliedVolatilityAsc,
            _ => WarrantSort::Ranking,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            WarrantSort::Ranking => "ranking",
            WarrantSort::ChangePercentDesc => "change_percent_desc",
            WarrantSort::ChangePercentAsc => "change_percent_asc",
            WarrantSort::VolumeDesc => "volume_desc",
            WarrantSort::VolumeAsc => "volume_asc",
            WarrantSort::ImpliedVolatilityDesc => "implied_volatility_desc",
            WarrantSort::ImpliedVolatilityAsc => "implied_volatility_asc",
        }
    }

    pub fn order_by(&self) -> &'static str {
        match self {
            WarrantSort::Ranking => "page_number ASC, ranking ASC",
            WarrantSort::ChangePercentDesc => "change_percent DESC",
            WarrantSort::ChangePercentAsc => "change_percent ASC",
            WarrantSort::VolumeDesc => "volume DESC",
            WarrantSort::VolumeAsc => "volume ASC",
            WarrantSort::ImpliedVolatilityDesc => "implied_volatility DESC",
            WarrantSort::ImpliedVolatilityAsc => "implied_volatility ASC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummarySort {
    #[default]
    WarrantCount,
    TotalVolume,
    AvgImpliedVolatility,
    UnderlyingName,
}

impl SummarySort {
    pub fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or_default() {
            "total_volume" => SummarySort::TotalVolume,
            "avg_implied_volatility" => SummarySort::AvgImpliedVolatility,
            "underlying_name" => SummarySort::UnderlyingName,
            _ => SummarySort::WarrantCount,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            SummarySort::WarrantCount => "warrant_count",
            SummarySort::TotalVolume => "total_volume",
            SummarySort::AvgImpliedVolatility => "avg_implied_volatility",
            SummarySort::UnderlyingName => "underlying_name",
        }
    }

    pub fn order_by(&self) -> &'static str {
        match self {
            SummarySort::WarrantCount => "warrant_count DESC, total_volume DESC",
            SummarySort::TotalVolume => "total_volume DESC, warrant_count DESC",
            SummarySort::AvgImpliedVolatility => "avg_implied_volatility DESC",
            SummarySort::UnderlyingName => "underlying_name ASC, warrant_type ASC",
        }
    }
}

/// 權證搜尋範圍
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    #[default]
    All,
    Warrant,
    Underlying,
}

impl SearchScope {
    pub fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or_default() {
            "warrant" => SearchScope::Warrant,
            "underlying" => SearchScope::Underlying,
            _ => SearchScope::All,
        }
    }

    pub fn includes_warrant(&self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Warrant)
    }

    pub fn includes_underlying(&self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Underlying)
    }
}

/// 欄位排序圖示：目前依該欄降序為 ↓，升序為 ↑
pub fn sort_icon(current: HoldingSort, field: &str) -> &'static str {
    let key = current.key();
    match key.strip_prefix(field) {
        Some("_desc") => "↓",
        Some("_asc") => "↑",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::changes::attach_change;
    use crate::domain::model::Holding;

    fn row(code: &str, name: &str, shares: i64, weight: f64) -> HoldingWithChange {
        attach_change(
            Holding {
                etf_code: "00981A".to_string(),
                stock_code: code.to_string(),
                stock_name: name.to_string(),
                weight,
                shares,
                unit: "股".to_string(),
                update_date: "2025-03-07".to_string(),
            },
            None,
        )
    }

    #[test]
    fn test_parse_falls_back_to_weight_desc() {
        assert_eq!(HoldingSort::parse(None), HoldingSort::WeightDesc);
        assert_eq!(HoldingSort::parse(Some("bogus")), HoldingSort::WeightDesc);
        assert_eq!(HoldingSort::parse(Some("shares_asc")), HoldingSort::SharesAsc);
        for sort in HoldingSort::ALL {
            assert_eq!(HoldingSort::parse(Some(sort.key())), sort);
        }
    }

    #[test]
    fn test_apply_orders_rows() {
        let mut rows = vec![
            row("2454", "聯發科", 300, 3.0),
            row("2330", "台積電", 1000, 9.5),
            row("2317", "鴻海", 500, 4.0),
        ];

        HoldingSort::WeightDesc.apply(&mut rows);
        assert_eq!(rows[0].holding.stock_code, "2330");

        HoldingSort::SharesAsc.apply(&mut rows);
        assert_eq!(rows[0].holding.stock_code, "2454");

        HoldingSort::StockCodeAsc.apply(&mut rows);
        let codes: Vec<&str> = rows.iter().map(|r| r.holding.stock_code.as_str()).collect();
        assert_eq!(codes, vec!["2317", "2330", "2454"]);
    }

    #[test]
    fn test_sort_icon() {
        assert_eq!(sort_icon(HoldingSort::WeightDesc, "weight"), "↓");
        assert_eq!(sort_icon(HoldingSort::SharesAsc, "shares"), "↑");
        assert_eq!(sort_icon(HoldingSort::SharesAsc, "weight"), "");
        assert_eq!(sort_icon(HoldingSort::StockCodeAsc, "stock_code"), "↑");
    }

    #[test]
    fn test_unknown_sql_sort_keys_use_defaults() {
        assert_eq!(WarrantSort::parse(Some("1; DROP TABLE")), WarrantSort::Ranking);
        assert_eq!(WarrantSort::parse(Some("volume_desc")).order_by(), "volume DESC");
        assert_eq!(SummarySort::parse(None).order_by(), "warrant_count DESC, total_volume DESC");
        assert_eq!(SummarySort::parse(Some("total_volume")).key(), "total_volume");
        assert!(SearchScope::parse(Some("warrant")).includes_warrant());
        assert!(!SearchScope::parse(Some("warrant")).includes_underlying());
        assert_eq!(SearchScope::parse(Some("x")), SearchScope::All);
    }
}
