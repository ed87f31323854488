use crate::domain::model::{VolumeComparison, WarrantType};
use std::cmp::Ordering;
use std::collections::HashMap;

pub const HIGH_CHANGE_PERCENT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeSort {
    UnderlyingName,
    CurrentVolume,
    FiveDayAvg,
    #[default]
    VolumeDiff,
    ChangePercent,
}

impl VolumeSort {
    pub const ALL: [VolumeSort; 5] = [
        VolumeSort::VolumeDiff,
        VolumeSort::ChangePercent,
        VolumeSort::CurrentVolume,
        VolumeSort::FiveDayAvg,
        VolumeSort::UnderlyingName,
    ];

    pub fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or_default() {
            "underlying_name" => VolumeSort::UnderlyingName,
            "current_volume" => VolumeSort::CurrentVolume,
            "five_day_avg" => VolumeSort::FiveDayAvg,
            "change_percent" => VolumeSort::ChangePercent,
            _ => VolumeSort::VolumeDiff,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            VolumeSort::UnderlyingName => "underlying_name",
            VolumeSort::CurrentVolume => "current_volume",
            VolumeSort::FiveDayAvg => "five_day_avg",
            VolumeSort::VolumeDiff => "volume_diff",
            VolumeSort::ChangePercent => "change_percent",
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 當日各標的成交量對前幾個交易日平均的比較。
///
/// `history_totals` 為各標的在前 `previous_days` 個交易日的成交量總和；
/// 平均一律除以交易日數 (該標的沒有成交的日子也算在內)。
pub fn compare(
    current: &[(String, i64)],
    history_totals: &HashMap<String, i64>,
    previous_days: usize,
    warrant_type: WarrantType,
    analysis_date: &str,
) -> Vec<VolumeComparison> {
    let mut results: Vec<VolumeComparison> = current
        .iter()
        .map(|(underlying_name, current_volume)| {
            let five_day_avg = if previous_days == 0 {
                0
            } else {
                history_totals.get(underlying_name).copied().unwrap_or(0) / previous_days as i64
            };
            let volume_diff = current_volume - five_day_avg;
            let change_percent = if five_day_avg > 0 {
                volume_diff as f64 / five_day_avg as f64 * 100.0
            } else {
                0.0
            };

            VolumeComparison {
                underlying_name: underlying_name.clone(),
                current_volume: *current_volume,
                five_day_avg,
                volume_diff,
                change_percent: round2(change_percent),
                is_high_change: change_percent.abs() >= HIGH_CHANGE_PERCENT,
                warrant_type,
                analysis_date: analysis_date.to_string(),
            }
        })
        .collect();

    results.sort_by(|a, b| b.volume_diff.abs().cmp(&a.volume_diff.abs()));
    results
}

/// 變動量與變動率依絕對值排序，其餘欄位依實際值
pub fn sort(rows: &mut [VolumeComparison], by: VolumeSort, ascending: bool) {
    let cmp_f64 = |a: f64, b: f64| a.partial_cmp(&b).unwrap_or(Ordering::Equal);

    rows.sort_by(|a, b| {
        let ordering = match by {
            VolumeSort::UnderlyingName => a.underlying_name.cmp(&b.underlying_name),
            VolumeSort::CurrentVolume => a.current_volume.cmp(&b.current_volume),
            VolumeSort::FiveDayAvg => a.five_day_avg.cmp(&b.five_day_avg),
            VolumeSort::VolumeDiff => a.volume_diff.abs().cmp(&b.volume_diff.abs()),
            VolumeSort::ChangePercent => cmp_f64(a.change_percent.abs(), b.change_percent.abs()),
        };
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

pub fn high_change_count(rows: &[VolumeComparison]) -> usize {
    rows.iter().filter(|r| r.is_high_change).count()
}
