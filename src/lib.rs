pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

pub use adapters::{PocketClient, Store, WarrantBoardClient};
pub use app::scraper::Scraper;
pub use config::{Settings, SourcesConfig};
pub use core::etl::EtlEngine;
pub use utils::error::{MonitorError, Result};
