use etf_monitor::adapters::export::write_holdings_csv;
use etf_monitor::config::DatabaseLocation;
use etf_monitor::core::changes;
use etf_monitor::domain::model::{ChangeType, Holding};
use etf_monitor::{SourcesConfig, Store};
use tempfile::TempDir;

fn holding(etf: &str, code: &str, name: &str, shares: i64, date: &str) -> Holding {
    Holding {
        etf_code: etf.to_string(),
        stock_code: code.to_string(),
        stock_name: name.to_string(),
        weight: shares as f64 / 100_000.0,
        shares,
        unit: "股".to_string(),
        update_date: date.to_string(),
    }
}

async fn snapshot(store: &Store, etf: &str, date: &str, current: Vec<Holding>) {
    let previous = store.previous_snapshot(etf, date).await.unwrap();
    let changes = changes::analyze(etf, &current, &previous, date);
    store.replace_snapshot(etf, date, &current, &changes).await.unwrap();
}

#[tokio::test]
async fn test_file_database_survives_reconnect() {
    let dir = TempDir::new().unwrap();
    let location = DatabaseLocation::File(dir.path().join("nested").join("etf.db"));

    {
        let store = Store::connect(&location).await.unwrap();
        snapshot(
            &store,
            "00981A",
            "2025-03-06",
            vec![holding("00981A", "2330", "台積電", 1_000, "2025-03-06")],
        )
        .await;
        store.close().await;
    }

    let store = Store::connect(&location).await.unwrap();
    assert_eq!(store.available_dates().await.unwrap(), vec!["2025-03-06".to_string()]);
    assert_eq!(store.latest_holdings(Some("00981A")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rescrape_same_day_replaces_snapshot() {
    let store = Store::connect_in_memory().await.unwrap();
    let day = "2025-03-07";

    snapshot(
        &store,
        "00981A",
        day,
        vec![
            holding("00981A", "2330", "台積電", 1_000, day),
            holding("00981A", "2317", "鴻海", 500, day),
        ],
    )
    .await;
    snapshot(
        &store,
        "00981A",
        day,
        vec![holding("00981A", "2330", "台積電", 1_000, day)],
    )
    .await;

    let rows = store.holdings_by_etf("00981A", Some(day)).await.unwrap();
    assert_eq!(rows.len(), 1);

    // 首次快照全部視為新增；重跑後只剩一筆
    let changes = store.holdings_changes(Some("00981A"), Some(day)).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change.change_type, ChangeType::New);
}

#[tokio::test]
async fn test_decreased_holdings_order_and_labels() {
    let sources = SourcesConfig::default();
    let store = Store::connect_in_memory().await.unwrap().with_etf_names(&sources);

    for etf in ["00981A", "00980A"] {
        snapshot(
            &store,
            etf,
            "2025-03-06",
            vec![
                holding(etf, "2330", "台積電", 10_000, "2025-03-06"),
                holding(etf, "2317", "鴻海", 5_000, "2025-03-06"),
                holding(etf, "2412", "中華電", 800, "2025-03-06"),
            ],
        )
        .await;
        snapshot(
            &store,
            etf,
            "2025-03-07",
            vec![
                holding(etf, "2330", "台積電", 9_000, "2025-03-07"),
                holding(etf, "2317", "鴻海", 1_000, "2025-03-07"),
            ],
        )
        .await;
    }

    let rows = store.decreased_holdings(Some("2025-03-07"), None).await.unwrap();
    let keys: Vec<(&str, &str, i64)> = rows
        .iter()
        .map(|r| (r.change.etf_code.as_str(), r.change.stock_code.as_str(), r.change_amount))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("00980A", "2317", 4_000),
            ("00980A", "2330", 1_000),
            ("00980A", "2412", 800),
            ("00981A", "2317", 4_000),
            ("00981A", "2330", 1_000),
            ("00981A", "2412", 800),
        ]
    );
    assert_eq!(rows[2].change_label, "完全移除");
    assert_eq!(rows[0].etf_name, "主動野村臺灣優選ETF");

    let only = store
        .decreased_holdings(Some("2025-03-07"), Some("00981A"))
        .await
        .unwrap();
    assert_eq!(only.len(), 3);
}

#[tokio::test]
async fn test_export_latest_holdings() {
    let store = Store::connect_in_memory().await.unwrap();
    snapshot(
        &store,
        "00981A",
        "2025-03-06",
        vec![holding("00981A", "2330", "台積電", 1_000, "2025-03-06")],
    )
    .await;
    snapshot(
        &store,
        "00982A",
        "2025-03-07",
        vec![
            holding("00982A", "2330", "台積電", 2_000, "2025-03-07"),
            holding("00982A", "2454", "聯發科", 3_000, "2025-03-07"),
        ],
    )
    .await;

    let latest = store.holdings_on(None, None).await.unwrap();
    assert_eq!(latest.len(), 2);
    assert!(latest.iter().all(|h| h.update_date == "2025-03-07"));
    // 權重降序
    assert_eq!(latest[0].stock_code, "2454");

    let mut buf = Vec::new();
    assert_eq!(write_holdings_csv(&mut buf, &latest).unwrap(), 2);
    assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 3);

    assert!(store
        .holdings_on(Some("2025-01-01"), None)
        .await
        .unwrap()
        .is_empty());
}
