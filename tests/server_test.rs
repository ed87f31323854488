use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use clap::Parser;
use etf_monitor::app::LiveScraper;
use etf_monitor::server::{build_router, state::AppState};
use etf_monitor::{Settings, SourcesConfig, Store};
use tower::ServiceExt;

const PASSWORD: &str = "test-password";
const TOKEN: &str = "test-token";

async fn app_with(extra: &[&str]) -> Router {
    let mut argv = vec![
        "etf-monitor",
        "--database-url",
        "sqlite::memory:",
        "--web-password",
        PASSWORD,
        "--scheduler-token",
        TOKEN,
    ];
    argv.extend_from_slice(extra);
    let settings = Settings::parse_from(argv);

    let sources = SourcesConfig::default();
    let store = Store::connect_in_memory().await.unwrap().with_etf_names(&sources);
    let scraper = LiveScraper::from_config(store.clone(), sources).unwrap();
    build_router(AppState::new(settings, store, scraper))
}

async fn app() -> Router {
    app_with(&[]).await
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, password: &str) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("password={}", password)))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// 登入並取回 `session_id=...` cookie
async fn session_cookie(app: &Router) -> String {
    let response = login(app, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let response = app().await.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-frame-options").unwrap(),
        "DENY"
    );

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sessions"], 0);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_unauthenticated_page_redirects_to_login() {
    let response = app().await.oneshot(get("/holdings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
}

#[tokio::test]
async fn test_unauthenticated_api_is_401() {
    let response = app().await.oneshot(get("/api/warrants")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_wrong_password_redirects_with_error() {
    let app = app().await;
    let response = login(&app, "nope").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("/login?error="));
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_login_grants_access() {
    let app = app().await;
    let cookie = session_cookie(&app).await;
    assert!(cookie.starts_with("session_id="));

    let response = app.clone().oneshot(get_with_cookie("/", &cookie)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-ratelimit-remaining").is_some());

    let response = app
        .clone()
        .oneshot(get_with_cookie("/api/warrants?sort_by=volume_desc", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["count"], 0);

    // 登出後 session 失效
    let response = app
        .clone()
        .oneshot(get_with_cookie("/logout", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let response = app.oneshot(get_with_cookie("/", &cookie)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_bad_dates_and_params_are_400() {
    let app = app().await;
    let cookie = session_cookie(&app).await;

    let response = app
        .clone()
        .oneshot(get_with_cookie("/api/holdings/2025-13-45", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get_with_cookie("/api/warrants?warrant_type=%E7%89%9B%E8%AD%89", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get_with_cookie("/api/warrants/search", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_etf_page_is_404() {
    let app = app().await;
    let cookie = session_cookie(&app).await;
    let response = app
        .oneshot(get_with_cookie("/holdings/0050", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_web_rate_limit_returns_429() {
    let app = app_with(&["--rate-limit-requests", "2"]).await;

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(header::RETRY_AFTER).is_some());

    // /health 不受限
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_trigger_scrape_requires_token() {
    let app = app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/trigger-scrape")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/trigger-scrape-warrants")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_test_scrape_rejects_unknown_etf() {
    let app = app().await;
    let cookie = session_cookie(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/test-scrape")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("etf_code=0050"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_production_rejects_unknown_host() {
    let app = app_with(&["--environment", "production", "--allowed-hosts", "etf.example.com"]).await;

    let request = Request::builder()
        .uri("/login")
        .header(header::HOST, "evil.example.org")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/login")
        .header(header::HOST, "etf.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_answers_loopback_host_in_production() {
    let app = app_with(&["--environment", "production", "--allowed-hosts", "etf.example.com"]).await;

    // 容器內的 etf-healthcheck 以 127.0.0.1 連線
    let request = Request::builder()
        .uri("/health")
        .header(header::HOST, "127.0.0.1:8080")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");

    let request = Request::builder()
        .uri("/api/warrants")
        .header(header::HOST, "127.0.0.1:8080")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
