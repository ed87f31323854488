use etf_monitor::app::LiveScraper;
use etf_monitor::config::{EtfSource, PocketConfig, SourcesConfig, WarrantBoardConfig};
use etf_monitor::core::sorting::SummarySort;
use etf_monitor::domain::model::{ChangeType, WarrantType};
use etf_monitor::{MonitorError, Store};
use httpmock::prelude::*;
use serde_json::json;

const PARAM_00981A: &str = "AssignID=00981A;MTPeriod=0;DTMode=0;DTRange=1;DTOrder=1;MajorTable=M722;";

fn sources(server: &MockServer, codes: &[&str]) -> SourcesConfig {
    SourcesConfig {
        pocket: PocketConfig {
            endpoint: server.url("/GetDtnoData.ashx"),
            delay_secs: 0,
            timeout_seconds: 5,
            ..PocketConfig::default()
        },
        etfs: codes
            .iter()
            .map(|code| EtfSource {
                code: code.to_string(),
                name: format!("測試ETF {}", code),
            })
            .collect(),
        warrants: WarrantBoardConfig {
            base_url: server.base_url(),
            path: "/zxd.djhtm".to_string(),
            min_delay_secs: 0.0,
            max_delay_secs: 0.0,
            blocked_backoff_min_secs: 0.0,
            blocked_backoff_max_secs: 0.0,
            error_backoff_min_secs: 0.0,
            error_backoff_max_secs: 0.0,
            timeout_seconds: 5,
            ..WarrantBoardConfig::default()
        },
    }
}

async fn scraper(server: &MockServer, codes: &[&str], store: &Store, date: &str) -> LiveScraper {
    let sources = sources(server, codes);
    LiveScraper::from_config(store.clone().with_etf_names(&sources), sources)
        .unwrap()
        .with_trade_date(Some(date.to_string()))
}

#[tokio::test]
async fn test_two_days_of_holdings_produce_changes() {
    let server = MockServer::start();
    let store = Store::connect_in_memory().await.unwrap();

    let mut day1 = server.mock(|when, then| {
        when.method(GET)
            .path("/GetDtnoData.ashx")
            .query_param("action", "getdtnodata")
            .query_param("DtNo", "59449513")
            .query_param("ParamStr", PARAM_00981A);
        then.status(200).json_body(json!({
            "Title": ["日期", "代號", "名稱", "權重", "持有數", "單位"],
            "Data": [
                ["20250306", "2330", "台積電", "9.50", "1,000,000", "股"],
                ["20250306", "2317", "鴻海", "4.00", "500,000", "股"],
                ["20250306", "2412", "中華電", "1.00", "80,000", "股"]
            ]
        }));
    });

    let report = scraper(&server, &["00981A"], &store, "2025-03-06")
        .await
        .scrape_all_etfs()
        .await
        .unwrap();
    assert_eq!(report.succeeded, 1);
    day1.assert();
    day1.delete();

    let day2 = server.mock(|when, then| {
        when.method(GET).path("/GetDtnoData.ashx");
        then.status(200).json_body(json!({
            "Data": [
                ["20250307", "2330", "台積電", "9.80", "1,200,000", "股"],
                ["20250307", "2317", "鴻海", "3.50", "400,000", "股"],
                ["20250307", "2454", "聯發科", "2.10", "60,000", "股"]
            ]
        }));
    });

    let summary = scraper(&server, &["00981A"], &store, "2025-03-07")
        .await
        .scrape_single_etf("00981A")
        .await
        .unwrap();
    day2.assert();
    assert_eq!(summary.records, 3);
    assert_eq!(summary.changes, 4);

    let changes = store.holdings_changes(Some("00981A"), Some("2025-03-07")).await.unwrap();
    let kind = |code: &str| {
        changes
            .iter()
            .find(|c| c.change.stock_code == code)
            .map(|c| c.change.change_type)
    };
    assert_eq!(kind("2330"), Some(ChangeType::Increased));
    assert_eq!(kind("2317"), Some(ChangeType::Decreased));
    assert_eq!(kind("2454"), Some(ChangeType::New));
    assert_eq!(kind("2412"), Some(ChangeType::Removed));

    let new = store.new_holdings("2025-03-07", None).await.unwrap();
    assert_eq!(new.len(), 1);
    assert_eq!(new[0].etf_name, "測試ETF 00981A");

    assert_eq!(
        store.available_dates().await.unwrap(),
        vec!["2025-03-07".to_string(), "2025-03-06".to_string()]
    );
}

#[tokio::test]
async fn test_upstream_failure_is_counted_not_fatal() {
    let server = MockServer::start();
    let store = Store::connect_in_memory().await.unwrap();

    server.mock(|when, then| {
        when.method(GET).path("/GetDtnoData.ashx").query_param("ParamStr", PARAM_00981A);
        then.status(200).json_body(json!({
            "Data": [["20250307", "2330", "台積電", "9.50", "1,000", "股"]]
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/GetDtnoData.ashx")
            .query_param("ParamStr", PARAM_00981A.replace("00981A", "00982A"));
        then.status(503);
    });

    let report = scraper(&server, &["00981A", "00982A"], &store, "2025-03-07")
        .await
        .scrape_all_etfs()
        .await
        .unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].etf_code, "00982A");
}

#[tokio::test]
async fn test_warrant_board_text_pages() {
    let server = MockServer::start();
    let store = Store::connect_in_memory().await.unwrap();

    let home = server.mock(|when, then| {
        when.method(GET).path("/");
        then.status(200).body("<html>home</html>");
    });

    let mut page = String::from("權證成交排行\n");
    page.push_str(
        "1 |\n[03045P 台積電元大5C購01] |\n[2330 台積電] |\n認購 |\n1.25 |\n0.15 |\n13.64% |\n12,345 |\n35.20 |\n",
    );
    page.push_str(
        "2 |\n[04512X 台積電凱基58售02] |\n[2330 台積電] |\n認售 |\n0.80 |\n-0.05 |\n-5.88% |\n980 |\n41.1 |\n",
    );
    page.push_str(&"|".repeat(60));

    let page1 = server.mock(|when, then| {
        when.method(GET)
            .path("/zxd.djhtm")
            .query_param("A", "3")
            .query_param("Page", "1");
        then.status(200)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(page.clone());
    });
    // 第二頁重複第一頁內容，應被去重
    let page2 = server.mock(|when, then| {
        when.method(GET)
            .path("/zxd.djhtm")
            .query_param("Page", "2");
        then.status(200)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(page.clone());
    });

    let summary = scraper(&server, &["00981A"], &store, "2025-03-07")
        .await
        .scrape_warrants(2, 3)
        .await
        .unwrap();

    home.assert();
    page1.assert();
    page2.assert();
    assert_eq!(summary.records, 2);

    let stats = store.warrant_statistics(Some("2025-03-07")).await.unwrap();
    assert_eq!(stats.total_warrants, 2);

    let summary = store
        .underlying_summary(Some("2025-03-07"), SummarySort::parse(None))
        .await
        .unwrap();
    assert_eq!(summary.len(), 2);
    assert!(summary.iter().all(|s| s.underlying_name == "台積電"));

    let puts = store
        .warrants_by_underlying("台積電", None, Some(WarrantType::Put))
        .await
        .unwrap();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].change_percent, 5.88);
}

#[tokio::test]
async fn test_blocked_board_yields_no_data() {
    let server = MockServer::start();
    let store = Store::connect_in_memory().await.unwrap();

    server.mock(|when, then| {
        when.method(GET).path("/zxd.djhtm");
        then.status(200)
            .header("Content-Type", "text/html; charset=utf-8")
            .body("<html><h1>Access Denied</h1></html>");
    });

    let err = scraper(&server, &["00981A"], &store, "2025-03-07")
        .await
        .scrape_warrants(1, 3)
        .await
        .unwrap_err();

    assert!(matches!(err, MonitorError::NoDataError { .. }));
}

#[tokio::test]
async fn test_board_recovers_after_blocked_and_failed_pages() {
    let server = MockServer::start();
    let store = Store::connect_in_memory().await.unwrap();

    let blocked = server.mock(|when, then| {
        when.method(GET).path("/zxd.djhtm").query_param("Page", "1");
        then.status(200)
            .header("Content-Type", "text/html; charset=utf-8")
            .body("<html>429 Too Many Requests</html>");
    });
    let failed = server.mock(|when, then| {
        when.method(GET).path("/zxd.djhtm").query_param("Page", "2");
        then.status(503);
    });

    let mut page = String::from("權證成交排行\n");
    page.push_str(
        "1 |\n[03045P 台積電元大5C購01] |\n[2330 台積電] |\n認購 |\n1.25 |\n0.15 |\n13.64% |\n12,345 |\n35.20 |\n",
    );
    page.push_str(&"|".repeat(60));
    let good = server.mock(|when, then| {
        when.method(GET).path("/zxd.djhtm").query_param("Page", "3");
        then.status(200)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(page.clone());
    });

    let summary = scraper(&server, &["00981A"], &store, "2025-03-07")
        .await
        .scrape_warrants(3, 3)
        .await
        .unwrap();

    blocked.assert();
    failed.assert();
    good.assert();
    assert_eq!(summary.records, 1);
}
