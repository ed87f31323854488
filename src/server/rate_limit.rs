use chrono::{Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// 網頁：每 IP 每小時滑動視窗
    Web,
    /// `/api/*`：每 IP 每日額度，本地午夜歸零
    Api,
}

impl LimitKind {
    pub fn for_path(path: &str) -> Self {
        if path.starts_with("/api/") {
            LimitKind::Api
        } else {
            LimitKind::Web
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct DailyCounter {
    day: NaiveDate,
    used: u32,
}

pub struct RateLimiter {
    web_limit: u32,
    api_limit: u32,
    hourly: Mutex<HashMap<String, VecDeque<Instant>>>,
    daily: Mutex<HashMap<String, DailyCounter>>,
}

fn until_midnight(now: NaiveDateTime) -> Duration {
    let next_day = now.date() + ChronoDuration::days(1);
    let midnight = next_day.and_hms_opt(0, 0, 0).unwrap_or(now);
    (midnight - now).to_std().unwrap_or(Duration::ZERO)
}

impl RateLimiter {
    pub fn new(web_limit: u32, api_limit: u32) -> Self {
        Self {
            web_limit,
            api_limit,
            hourly: Mutex::new(HashMap::new()),
            daily: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, client_ip: &str, kind: LimitKind) -> RateDecision {
        match kind {
            LimitKind::Web => self.check_web_at(client_ip, Instant::now()).await,
            LimitKind::Api => self.check_api_at(client_ip, Local::now().naive_local()).await,
        }
    }

    pub async fn check_web_at(&self, client_ip: &str, now: Instant) -> RateDecision {
        let mut hourly = self.hourly.lock().await;
        let window = hourly.entry(client_ip.to_string()).or_default();

        while let Some(oldest) = window.front() {
            if now.saturating_duration_since(*oldest) >= WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() as u32 >= self.web_limit {
            let retry_after = window
                .front()
                .map(|oldest| WINDOW.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(WINDOW);
            return RateDecision::Limited { retry_after };
        }

        window.push_back(now);
        RateDecision::Allowed {
            remaining: self.web_limit - window.len() as u32,
        }
    }

    pub async fn check_api_at(&self, client_ip: &str, now: NaiveDateTime) -> RateDecision {
        let mut daily = self.daily.lock().await;
        let counter = daily.entry(client_ip.to_string()).or_insert(DailyCounter {
            day: now.date(),
            used: 0,
        });

        if now.date() > counter.day {
            counter.day = now.date();
            counter.used = 0;
        }

        if counter.used >= self.api_limit {
            return RateDecision::Limited {
                retry_after: until_midnight(now),
            };
        }

        counter.used += 1;
        RateDecision::Allowed {
            remaining: self.api_limit - counter.used,
        }
    }

    /// 清除已無紀錄的 IP
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let today = Local::now().date_naive();

        let mut removed = 0;
        {
            let mut hourly = self.hourly.lock().await;
            let before = hourly.len();
            hourly.retain(|_, window| {
                window
                    .back()
                    .is_some_and(|last| now.saturating_duration_since(*last) < WINDOW)
            });
            removed += before - hourly.len();
        }
        {
            let mut daily = self.daily.lock().await;
            let before = daily.len();
            daily.retain(|_, counter| counter.day >= today);
            removed += before - daily.len();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_hourly_window_slides() {
        tokio_test::block_on(async {
            let limiter = RateLimiter::new(3, 10);
            let start = Instant::now();

            for i in 0..3 {
                let decision = limiter.check_web_at("1.2.3.4", start + Duration::from_secs(i)).await;
                assert_eq!(decision, RateDecision::Allowed { remaining: 2 - i as u32 });
            }

            match limiter.check_web_at("1.2.3.4", start + Duration::from_secs(10)).await {
                RateDecision::Limited { retry_after } => {
                    assert_eq!(retry_after, Duration::from_secs(3590));
                }
                other => panic!("expected limit, got {:?}", other),
            }

            // 其他 IP 不受影響
            assert!(matches!(
                limiter.check_web_at("5.6.7.8", start).await,
                RateDecision::Allowed { .. }
            ));

            // 第一筆滑出視窗後再次允許
            let later = start + Duration::from_secs(3600);
            assert!(matches!(
                limiter.check_web_at("1.2.3.4", later).await,
                RateDecision::Allowed { .. }
            ));
        });
    }

    #[test]
    fn test_daily_quota_resets_at_midnight() {
        tokio_test::block_on(async {
            let limiter = RateLimiter::new(100, 2);

            assert!(matches!(
                limiter.check_api_at("ip", at("2025-03-07", "09:00:00")).await,
                RateDecision::Allowed { remaining: 1 }
            ));
            assert!(matches!(
                limiter.check_api_at("ip", at("2025-03-07", "10:00:00")).await,
                RateDecision::Allowed { remaining: 0 }
            ));
            assert_eq!(
                limiter.check_api_at("ip", at("2025-03-07", "23:00:00")).await,
                RateDecision::Limited {
                    retry_after: Duration::from_secs(3600)
                }
            );
            assert!(matches!(
                limiter.check_api_at("ip", at("2025-03-08", "00:00:01")).await,
                RateDecision::Allowed { remaining: 1 }
            ));
        });
    }

    #[test]
    fn test_api_paths_use_daily_quota() {
        assert_eq!(LimitKind::for_path("/api/warrants"), LimitKind::Api);
        assert_eq!(LimitKind::for_path("/holdings"), LimitKind::Web);
        assert_eq!(LimitKind::for_path("/apis"), LimitKind::Web);
    }
}
