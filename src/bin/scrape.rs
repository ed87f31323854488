use clap::{Parser, Subcommand};
use etf_monitor::adapters::export;
use etf_monitor::app::LiveScraper;
use etf_monitor::config::{resolve_database, DEFAULT_DATABASE_URL};
use etf_monitor::utils::error::ErrorSeverity;
use etf_monitor::utils::logger;
use etf_monitor::utils::validation::{optional_date, Validate};
use etf_monitor::{MonitorError, Result, SourcesConfig, Store};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "etf-scrape")]
#[command(about = "One-shot ETF holdings and warrant scraper")]
struct Args {
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,

    /// TOML file describing upstream sources and tracked ETFs
    #[arg(long, env = "SOURCES_CONFIG")]
    sources_config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log CPU / memory usage around each pipeline phase
    #[arg(long)]
    monitor: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape holdings for every tracked ETF, or a single one
    Etf {
        #[arg(long)]
        code: Option<String>,
        /// Trade date to store (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Scrape the warrant ranking board
    Warrants {
        #[arg(long)]
        pages: Option<u32>,
        #[arg(long)]
        sort: Option<u32>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Fetch one ETF and print the raw response structure without storing it
    Probe {
        #[arg(long)]
        code: String,
    },
    /// Export stored holdings to CSV
    Export {
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        code: Option<String>,
        #[arg(short, long, default_value = "holdings.csv")]
        output: PathBuf,
    },
}

fn load_sources(path: Option<&PathBuf>) -> Result<SourcesConfig> {
    let sources = match path {
        Some(path) => SourcesConfig::from_file(path)?,
        None => SourcesConfig::default(),
    };
    sources.validate()?;
    Ok(sources)
}

async fn run(args: Args) -> Result<()> {
    let sources = load_sources(args.sources_config.as_ref())?;
    let location = resolve_database(&args.database_url);
    tracing::info!("🗄️ Database: {}", location.describe());
    let store = Store::connect(&location).await?.with_etf_names(&sources);

    match args.command {
        Command::Etf { code, date } => {
            let date = optional_date(date.as_deref())?;
            let scraper = LiveScraper::from_config(store.clone(), sources)?
                .with_monitoring(args.monitor)
                .with_trade_date(date);

            match code {
                Some(code) => {
                    if !scraper.sources().is_tracked(&code) {
                        return Err(MonitorError::UnknownEtfError { code });
                    }
                    let summary = scraper.scrape_single_etf(&code).await?;
                    println!(
                        "✅ {} {}: {} holdings, {} changes",
                        summary.source, summary.date, summary.records, summary.changes
                    );
                }
                None => {
                    let report = scraper.scrape_all_etfs().await?;
                    println!(
                        "✅ {}: {}/{} ETFs scraped",
                        report.trade_date, report.succeeded, report.total
                    );
                    for failure in &report.failures {
                        println!("   ❌ {}: {}", failure.etf_code, failure.error);
                    }
                    if report.succeeded == 0 && report.total > 0 {
                        return Err(MonitorError::NoDataError {
                            source_name: "all ETFs".to_string(),
                        });
                    }
                }
            }
        }
        Command::Warrants { pages, sort, date } => {
            let date = optional_date(date.as_deref())?;
            let pages = pages.unwrap_or(sources.warrants.pages);
            let sort = sort.unwrap_or(sources.warrants.sort_type);
            let scraper = LiveScraper::from_config(store.clone(), sources)?
                .with_monitoring(args.monitor)
                .with_trade_date(date);

            let summary = scraper.scrape_warrants(pages, sort).await?;
            println!("✅ {}: {} warrants stored", summary.date, summary.records);
        }
        Command::Probe { code } => {
            let scraper = LiveScraper::from_config(store.clone(), sources)?;
            let summary = scraper.probe(&code).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Export { date, code, output } => {
            let date = optional_date(date.as_deref())?;
            let holdings = store.holdings_on(date.as_deref(), code.as_deref()).await?;
            let written = export::export_holdings_file(&output, &holdings)?;
            println!("📁 {} rows written to {}", written, output.display());
        }
    }

    store.close().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if let Err(e) = run(args).await {
        tracing::error!(
            "❌ etf-scrape failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }
}
