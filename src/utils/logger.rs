use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

/// RUST_LOG 優先；否則 debug 模式多開 tower_http 的請求紀錄
fn default_filter(debug: bool) -> EnvFilter {
    let fallback = if debug {
        "etf_monitor=debug,tower_http=debug,info"
    } else {
        "etf_monitor=info,tower_http=info,warn"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// 伺服器日誌寫到 stdout；容器平台用 json 格式較易解析
pub fn init_server_logger(debug: bool, format: LogFormat) {
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let layer = match format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(default_filter(debug))
        .init();
}

pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().compact())
        .with(default_filter(verbose))
        .init();
}
