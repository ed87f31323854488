use crate::domain::model::{ChangeStats, ChangeType, Holding, HoldingChange, HoldingWithChange};
use std::collections::HashMap;

/// 比對當日與前一交易日的持股，產生變化紀錄。
///
/// 順序：先依當日持股順序輸出新增/增減，再依前一日順序輸出移除。
/// 股數相同的持股不產生紀錄。
pub fn analyze(
    etf_code: &str,
    current: &[Holding],
    previous: &[Holding],
    change_date: &str,
) -> Vec<HoldingChange> {
    let previous_by_code: HashMap<&str, &Holding> = previous
        .iter()
        .map(|h| (h.stock_code.as_str(), h))
        .collect();
    let current_by_code: HashMap<&str, &Holding> = current
        .iter()
        .map(|h| (h.stock_code.as_str(), h))
        .collect();

    let mut changes = Vec::new();

    for holding in current {
        let change = match previous_by_code.get(holding.stock_code.as_str()) {
            None => Some((ChangeType::New, 0, 0.0)),
            Some(old) if holding.shares > old.shares => {
                Some((ChangeType::Increased, old.shares, old.weight))
            }
            Some(old) if holding.shares < old.shares => {
                Some((ChangeType::Decreased, old.shares, old.weight))
            }
            Some(_) => None,
        };

        if let Some((change_type, old_shares, old_weight)) = change {
            changes.push(HoldingChange {
                etf_code: etf_code.to_string(),
                stock_code: holding.stock_code.clone(),
                stock_name: holding.stock_name.clone(),
                change_type,
                old_shares,
                new_shares: holding.shares,
                old_weight,
                new_weight: holding.weight,
                change_date: change_date.to_string(),
            });
        }
    }

    for old in previous {
        if !current_by_code.contains_key(old.stock_code.as_str()) {
            changes.push(HoldingChange {
                etf_code: etf_code.to_string(),
                stock_code: old.stock_code.clone(),
                stock_name: old.stock_name.clone(),
                change_type: ChangeType::Removed,
                old_shares: old.shares,
                new_shares: 0,
                old_weight: old.weight,
                new_weight: 0.0,
                change_date: change_date.to_string(),
            });
        }
    }

    changes
}

pub fn stats(holdings: &[HoldingWithChange]) -> ChangeStats {
    let mut stats = ChangeStats {
        total: holdings.len(),
        ..ChangeStats::default()
    };

    for holding in holdings {
        match holding.change_type {
            Some(ChangeType::New) => stats.new_count += 1,
            Some(ChangeType::Increased) => stats.increased_count += 1,
            Some(ChangeType::Decreased) => stats.decreased_count += 1,
            Some(ChangeType::Removed) => stats.removed_count += 1,
            None => stats.no_change_count += 1,
        }
    }

    stats
}

/// 將持股與同日變化合併；沒有變化時新舊股數皆為目前股數
pub fn attach_change(holding: Holding, change: Option<HoldingChange>) -> HoldingWithChange {
    match change {
        Some(change) => HoldingWithChange {
            change_type: Some(change.change_type),
            old_shares: change.old_shares,
            new_shares: change.new_shares,
            old_weight: Some(change.old_weight),
            new_weight: Some(change.new_weight),
            shares_increase: change.shares_increase(),
            shares_decrease: change.shares_decrease(),
            holding,
        },
        None => HoldingWithChange {
            change_type: None,
            old_shares: holding.shares,
            new_shares: holding.shares,
            old_weight: None,
            new_weight: None,
            shares_increase: 0,
            shares_decrease: 0,
            holding,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(code: &str, shares: i64, weight: f64) -> Holding {
        Holding {
            etf_code: "00981A".to_string(),
            stock_code: code.to_string(),
            stock_name: format!("Stock {}", code),
            weight,
            shares,
            unit: "股".to_string(),
            update_date: "2025-03-07".to_string(),
        }
    }

    #[test]
    fn test_classifies_every_change_kind() {
        let previous = vec![
            holding("2330", 1000, 9.5),
            holding("2317", 500, 4.0),
            holding("2454", 300, 3.0),
            holding("3008", 200, 1.5),
        ];
        let current = vec![
            holding("2330", 1200, 10.1),
            holding("2317", 400, 3.6),
            holding("2454", 300, 3.1),
            holding("6669", 150, 2.2),
        ];

        let changes = analyze("00981A", &current, &previous, "2025-03-07");
        let kinds: Vec<(&str, ChangeType)> = changes
            .iter()
            .map(|c| (c.stock_code.as_str(), c.change_type))
            .collect();

        assert_eq!(
            kinds,
            vec![
                ("2330", ChangeType::Increased),
                ("2317", ChangeType::Decreased),
                ("6669", ChangeType::New),
                ("3008", ChangeType::Removed),
            ]
        );

        let removed = changes.last().unwrap();
        assert_eq!(removed.old_shares, 200);
        assert_eq!(removed.new_shares, 0);
        assert_eq!(removed.new_weight, 0.0);

        let increased = &changes[0];
        assert_eq!(increased.old_shares, 1000);
        assert_eq!(increased.new_shares, 1200);
        assert_eq!(increased.old_weight, 9.5);
        assert_eq!(increased.change_date, "2025-03-07");
    }

    #[test]
    fn test_first_snapshot_is_all_new() {
        let current = vec![holding("2330", 1000, 9.5), holding("2317", 500, 4.0)];
        let changes = analyze("00981A", &current, &[], "2025-03-07");
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.change_type == ChangeType::New));
        assert!(changes.iter().all(|c| c.old_shares == 0));
    }

    #[test]
    fn test_empty_current_removes_everything() {
        let previous = vec![holding("2330", 1000, 9.5)];
        let changes = analyze("00981A", &[], &previous, "2025-03-07");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Removed);
    }

    #[test]
    fn test_stats_counts_unchanged_rows() {
        let rows = vec![
            attach_change(holding("2330", 1000, 9.5), None),
            attach_change(
                holding("6669", 150, 2.2),
                analyze("00981A", &[holding("6669", 150, 2.2)], &[], "2025-03-07")
                    .into_iter()
                    .next(),
            ),
        ];
        let stats = stats(&rows);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.new_count, 1);
        assert_eq!(stats.no_change_count, 1);
        assert_eq!(rows[0].old_shares, 1000);
        assert_eq!(rows[1].shares_increase, 150);
    }
}
