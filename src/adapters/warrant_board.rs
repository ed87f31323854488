use crate::config::WarrantBoardConfig;
use crate::domain::model::{Warrant, WarrantType};
use crate::domain::ports::WarrantSource;
use crate::utils::error::{MonitorError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

const BLOCKED_MARKERS: [&str; 6] = [
    "access denied",
    "訪問被拒絕",
    "captcha",
    "too many requests",
    "請求過於頻繁",
    "blocked",
];

/// 權證頁面必須包含的字樣
const PAGE_MARKER: &str = "權證";

const UA_ROTATION_PROBABILITY: f64 = 0.3;

fn ranking_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s*\|").expect("static regex"))
}

fn bracketed_code_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([A-Z0-9]+)\s+([^\]]+)\]").expect("static regex"))
}

fn stock_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Link2Stk\('AQ([A-Z0-9]+)'\)").expect("static regex"))
}

fn html_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// 權證成交排行看板 (Big5 編碼)
#[derive(Debug, Clone)]
pub struct WarrantBoardClient {
    client: Client,
    config: WarrantBoardConfig,
}

impl WarrantBoardClient {
    pub fn new(config: WarrantBoardConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert("DNT", HeaderValue::from_static("1"));
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &WarrantBoardConfig {
        &self.config
    }

    fn homepage_url(&self) -> String {
        format!("{}/", self.config.base_url.trim_end_matches('/'))
    }

    pub fn page_url(&self, sort_type: u32, page: u32) -> String {
        format!(
            "{}{}?A={}&B=&Page={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.path,
            sort_type,
            page
        )
    }

    /// 下一頁前的暫停時間：被攔截或失敗時改用較長的退避區間
    pub fn pause_after(&self, outcome: PageOutcome) -> Duration {
        let c = &self.config;
        match outcome {
            PageOutcome::Blocked => random_between(c.blocked_backoff_min_secs, c.blocked_backoff_max_secs),
            PageOutcome::Failed => random_between(c.error_backoff_min_secs, c.error_backoff_max_secs),
            PageOutcome::Parsed | PageOutcome::NoContent => {
                random_between(c.min_delay_secs, c.max_delay_secs)
            }
        }
    }

    /// 先造訪首頁；失敗只記錄警告
    async fn visit_homepage(&self, user_agent: &str) {
        let url = self.homepage_url();
        tracing::info!("🌐 Visiting {} before scraping", url);
        match self.client.get(&url).header(USER_AGENT, user_agent).send().await {
            Ok(response) => tracing::debug!("Homepage status: {}", response.status()),
            Err(e) => tracing::warn!("⚠️ Homepage visit failed: {}", e),
        }
    }

    async fn fetch_page(&self, url: &str, user_agent: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(REFERER, self.homepage_url())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::UpstreamStatusError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text_with_charset("big5").await?)
    }

    /// 逐頁抓取；單頁失敗或被攔截時略過該頁
    pub async fn fetch_pages(&self, pages: u32, sort_type: u32, date: &str) -> Vec<Warrant> {
        let mut user_agent = random_user_agent();
        self.visit_homepage(user_agent).await;

        let mut warrants = Vec::new();

        for page in 1..=pages {
            if page > 1 && rand::thread_rng().gen_bool(UA_ROTATION_PROBABILITY) {
                user_agent = random_user_agent();
                tracing::debug!("Rotated User-Agent: {}", user_agent);
            }

            let url = self.page_url(sort_type, page);
            tracing::info!("📄 Fetching warrant page {} ({})", page, url);

            let outcome = match self.fetch_page(&url, user_agent).await {
                Ok(content) => match classify_page(&content) {
                    PageOutcome::Blocked => {
                        tracing::warn!("🚫 Page {} looks blocked by the upstream, skipped", page);
                        PageOutcome::Blocked
                    }
                    PageOutcome::NoContent => {
                        tracing::warn!("⚠️ Page {} has no warrant content, skipped", page);
                        PageOutcome::NoContent
                    }
                    _ => {
                        let parsed = if is_text_format(&content) {
                            parse_text_board(&content, page, date, self.config.rows_per_page)
                        } else {
                            tracing::info!("Page {} is HTML, using link fallback", page);
                            parse_html_board(&content, page, date, self.config.rows_per_page)
                        };
                        if parsed.is_empty() {
                            tracing::warn!("⚠️ Page {} produced no warrants", page);
                        } else {
                            tracing::info!("✅ Page {}: {} warrants", page, parsed.len());
                        }
                        warrants.extend(parsed);
                        PageOutcome::Parsed
                    }
                },
                Err(e) => {
                    tracing::error!("❌ Page {} failed: {}", page, e);
                    PageOutcome::Failed
                }
            };

            if page < pages {
                let delay = self.pause_after(outcome);
                if !delay.is_zero() {
                    tracing::debug!("Sleeping {:.2}s before next page", delay.as_secs_f64());
                    tokio::time::sleep(delay).await;
                }
            }
        }

        tracing::info!("📊 Collected {} warrants from {} pages", warrants.len(), pages);
        warrants
    }
}

impl WarrantSource for WarrantBoardClient {
    async fn fetch_warrants(&self, pages: u32, sort_type: u32, date: &str) -> Result<Vec<Warrant>> {
        Ok(self.fetch_pages(pages, sort_type, date).await)
    }
}

/// 單頁抓取結果，決定下一頁前要暫停多久
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Parsed,
    NoContent,
    Blocked,
    Failed,
}

/// 攔截頁通常不含權證字樣，所以先判斷攔截
pub fn classify_page(content: &str) -> PageOutcome {
    if is_blocked(content) {
        PageOutcome::Blocked
    } else if !content.contains(PAGE_MARKER) {
        PageOutcome::NoContent
    } else {
        PageOutcome::Parsed
    }
}

fn random_between(min: f64, max: f64) -> Duration {
    if max <= 0.0 {
        return Duration::ZERO;
    }
    let secs = if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    };
    Duration::from_secs_f64(secs.max(0.0))
}

pub fn is_blocked(content: &str) -> bool {
    let lower = content.to_lowercase();
    BLOCKED_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// 純文字格式：'|' 數量多於標籤 '<' 的兩倍且超過 50 個
pub fn is_text_format(content: &str) -> bool {
    let pipes = content.matches('|').count();
    let tags = content.matches('<').count();
    pipes > tags * 2 && pipes > 50
}

pub fn safe_float(text: &str) -> f64 {
    let cleaned = text.replace(['|', ',', '%'], "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "-" {
        return 0.0;
    }
    cleaned.parse().unwrap_or(0.0)
}

pub fn safe_int(text: &str) -> i64 {
    let cleaned = text.replace(['|', ','], "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "-" {
        return 0;
    }
    cleaned
        .parse::<i64>()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().map(|f| f as i64))
        .unwrap_or(0)
}

fn cell(line: &str) -> &str {
    line.trim().trim_end_matches('|').trim()
}

/// 單筆權證佔 9 行：排行、[代碼 名稱]、標的、類型、收盤、漲跌、漲跌幅、成交量、隱含波動率
fn parse_text_record(lines: &[&str], page: u32, date: &str) -> Option<Warrant> {
    let [rank, warrant, underlying, kind, close, change, percent, volume, iv] = lines else {
        return None;
    };

    let ranking = ranking_line().captures(rank)?.get(1)?.as_str().parse().ok()?;

    let caps = bracketed_code_name().captures(warrant)?;
    let warrant_code = caps.get(1)?.as_str().to_string();
    let warrant_name = caps.get(2)?.as_str().trim().to_string();

    let underlying_name = if underlying.trim() == "|" {
        String::new()
    } else {
        bracketed_code_name()
            .captures(underlying)
            .and_then(|c| c.get(2))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    };

    let warrant_type: WarrantType = cell(kind).parse().ok()?;

    Some(Warrant {
        ranking,
        warrant_code,
        warrant_name,
        underlying_name,
        warrant_type,
        close_price: safe_float(close),
        change_amount: safe_float(change),
        change_percent: safe_float(percent).abs(),
        volume: safe_int(volume),
        implied_volatility: safe_float(iv),
        page_number: i64::from(page),
        update_date: date.to_string(),
    })
}

pub fn parse_text_board(content: &str, page: u32, date: &str, max_rows: usize) -> Vec<Warrant> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let Some(start) = lines.iter().position(|l| ranking_line().is_match(l)) else {
        tracing::warn!("⚠️ Page {}: no ranking rows found", page);
        return Vec::new();
    };

    let mut warrants = Vec::new();
    let mut i = start;
    while i + 9 <= lines.len() && warrants.len() < max_rows {
        match parse_text_record(&lines[i..i + 9], page, date) {
            Some(warrant) => {
                warrants.push(warrant);
                i += 9;
            }
            None => i += 1,
        }
    }

    warrants
}

/// HTML 後備解析：只取得代碼、名稱與類型，數值欄位為 0。
/// 類型由連結後方的文字判斷，無法判斷的列捨棄。
pub fn parse_html_board(content: &str, page: u32, date: &str, max_rows: usize) -> Vec<Warrant> {
    let links: Vec<(usize, usize, &str)> = stock_link()
        .captures_iter(content)
        .filter_map(|c| {
            let whole = c.get(0)?;
            Some((whole.start(), whole.end(), c.get(1)?.as_str()))
        })
        .collect();

    let mut warrants = Vec::new();

    for (idx, (_, end, code)) in links.iter().enumerate() {
        if warrants.len() >= max_rows {
            break;
        }

        let segment_end = links.get(idx + 1).map(|(s, _, _)| *s).unwrap_or(content.len());
        let rest = &content[*end..segment_end];
        // 跳過連結標籤本身的剩餘部分
        let rest = rest.find('>').map(|p| &rest[p + 1..]).unwrap_or(rest);
        let segment = html_tag().replace_all(rest, "|");
        let cells: Vec<&str> = segment
            .split('|')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();

        let Some(warrant_type) = cells.iter().find_map(|c| c.parse::<WarrantType>().ok()) else {
            tracing::debug!("Page {}: type of {} not found, dropped", page, code);
            continue;
        };

        let warrant_name = cells
            .first()
            .and_then(|c| c.strip_prefix(code))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("權證{}", code));

        warrants.push(Warrant {
            ranking: (warrants.len() + 1) as i64,
            warrant_code: code.to_string(),
            warrant_name,
            underlying_name: String::new(),
            warrant_type,
            close_price: 0.0,
            change_amount: 0.0,
            change_percent: 0.0,
            volume: 0,
            implied_volatility: 0.0,
            page_number: i64::from(page),
            update_date: date.to_string(),
        });
    }

    warrants
}
