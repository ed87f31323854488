//! 每個請求都經過的安全檢查：主機、流量限制、登入狀態、回應標頭與存取日誌。

use crate::server::rate_limit::{LimitKind, RateDecision};
use crate::server::session::SESSION_COOKIE;
use crate::server::state::AppState;
use crate::server::views;
use crate::utils::error::MonitorError;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{HOST, LOCATION, RETRY_AFTER};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const RATE_LIMIT_EXEMPT: [&str; 5] = ["/health", "/login", "/logout", "/favicon.ico", "/debug/session"];
const PUBLIC_PATHS: [&str; 6] = [
    "/health",
    "/login",
    "/logout",
    "/favicon.ico",
    "/debug/session",
    "/debug/db-status",
];

pub fn is_rate_limit_exempt(path: &str) -> bool {
    RATE_LIMIT_EXEMPT.contains(&path)
        || path.starts_with("/trigger-scrape")
        || path == "/static"
        || path.starts_with("/static/")
}

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || path.starts_with("/trigger-scrape")
}

/// X-Forwarded-For 第一個位址，其次 X-Real-IP，再其次連線位址
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn session_id(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

/// 302 轉址
pub fn found(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

fn rate_limited(retry_after: Duration) -> Response {
    // 至少 1 秒，避免客戶端立即重試
    let secs = retry_after.as_secs().max(1);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Html(views::rate_limited_page(secs)),
    )
        .into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(secs));
    response
}

/// 請求中安全檢查需要的欄位，先複製出來再進入 await
struct RequestFacts {
    method: Method,
    path: String,
    host: String,
    session_id: Option<String>,
}

impl RequestFacts {
    fn from_request(request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            host: request
                .headers()
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            session_id: session_id(request.headers()),
        }
    }
}

/// `/health` 供容器探測使用，不檢查 Host
fn host_check_applies(path: &str) -> bool {
    path != "/health"
}

async fn guard(state: &AppState, facts: &RequestFacts, ip: &str) -> Result<Option<u32>, Response> {
    let path = facts.path.as_str();

    if state.settings.is_production()
        && host_check_applies(path)
        && !state.settings.host_allowed(&facts.host)
    {
        tracing::warn!("🚫 Rejected host '{}' from {}", facts.host, ip);
        return Err((StatusCode::BAD_REQUEST, "Invalid host header").into_response());
    }

    let mut remaining = None;
    if !is_rate_limit_exempt(path) {
        match state.rate_limiter.check(ip, LimitKind::for_path(path)).await {
            RateDecision::Allowed { remaining: left } => remaining = Some(left),
            RateDecision::Limited { retry_after } => {
                tracing::warn!("🚦 Rate limit exceeded: {} {}", ip, path);
                return Err(rate_limited(retry_after));
            }
        }
    }

    if !is_public(path) {
        let valid = match &facts.session_id {
            Some(id) => state.sessions.validate(id).await,
            None => false,
        };
        if !valid {
            tracing::debug!("❌ Not authenticated: {} from {}", path, ip);
            return Err(if path.starts_with("/api/") || facts.method == Method::POST {
                MonitorError::Unauthorized.into_response()
            } else {
                found("/login")
            });
        }
    }

    Ok(remaining)
}

fn apply_security_headers(response: &mut Response, remaining: Option<u32>) {
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("x-xss-protection"),
        HeaderValue::from_static("1; mode=block"),
    );
    if let Some(remaining) = remaining {
        headers.insert(
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(remaining),
        );
    }
}

pub async fn security(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let facts = RequestFacts::from_request(&request);
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);

    let checked = guard(&state, &facts, &ip).await;
    let (mut response, remaining) = match checked {
        Ok(remaining) => (next.run(request).await, remaining),
        Err(response) => (response, None),
    };
    apply_security_headers(&mut response, remaining);

    tracing::info!(
        "{} {} {} {:.1}ms {}",
        facts.method,
        facts.path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64() * 1000.0,
        ip
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_classes() {
        assert!(is_rate_limit_exempt("/health"));
        assert!(is_rate_limit_exempt("/trigger-scrape-warrants"));
        assert!(is_rate_limit_exempt("/static/app.css"));
        assert!(!is_rate_limit_exempt("/debug/db-status"));
        assert!(!is_rate_limit_exempt("/api/warrants"));

        assert!(is_public("/debug/db-status"));
        assert!(is_public("/trigger-scrape"));
        assert!(!is_public("/"));
        assert!(!is_public("/api/holdings/2025-03-07"));
        assert!(!is_public("/static/app.css"));

        assert!(!host_check_applies("/health"));
        assert!(host_check_applies("/login"));
        assert!(host_check_applies("/api/warrants"));
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "192.168.1.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), "192.168.1.9");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.5 , 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.5");
    }

    #[test]
    fn test_session_cookie_is_read() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; session_id=abc123"),
        );
        assert_eq!(session_id(&headers).as_deref(), Some("abc123"));
        assert_eq!(session_id(&HeaderMap::new()), None);
    }
}
