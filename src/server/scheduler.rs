use crate::app::LiveScraper;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDateTime, NaiveTime, Weekday};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// 下一個排程時間：嚴格晚於 `now` 的平日 `at`
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let mut candidate = now.date().and_time(at);
    if candidate <= now {
        candidate += ChronoDuration::days(1);
    }
    while matches!(candidate.weekday(), Weekday::Sat | Weekday::Sun) {
        candidate += ChronoDuration::days(1);
    }
    candidate
}

/// 每個平日於指定時間執行一次全部 ETF 爬取
pub fn spawn_daily_scrape(scraper: Arc<LiveScraper>, at: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("⏰ Daily scrape scheduled at {} (weekdays)", at.format("%H:%M"));

        loop {
            let now = chrono::Local::now().naive_local();
            let next = next_run_after(now, at);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::debug!("Next scheduled scrape at {}", next);
            tokio::time::sleep(wait).await;

            match scraper.scrape_all_etfs().await {
                Ok(report) => tracing::info!(
                    "✅ Scheduled scrape done: {}/{} ETFs",
                    report.succeeded,
                    report.total
                ),
                Err(e) => tracing::error!("❌ Scheduled scrape failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(date: (i32, u32, u32), h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_next_run_same_day_and_next_day() {
        let time = NaiveTime::from_hms_opt(21, 30, 0).unwrap();

        // 2025-03-05 週三
        assert_eq!(next_run_after(at((2025, 3, 5), 9, 0), time), at((2025, 3, 5), 21, 30));
        assert_eq!(next_run_after(at((2025, 3, 5), 21, 30), time), at((2025, 3, 6), 21, 30));
    }

    #[test]
    fn test_next_run_skips_weekend() {
        let time = NaiveTime::from_hms_opt(21, 30, 0).unwrap();

        // 週五晚上之後 → 下週一
        assert_eq!(next_run_after(at((2025, 3, 7), 22, 0), time), at((2025, 3, 10), 21, 30));
        // 週六早上 → 下週一
        assert_eq!(next_run_after(at((2025, 3, 8), 8, 0), time), at((2025, 3, 10), 21, 30));
    }
}
