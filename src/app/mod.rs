// Application layer: pipelines that wire sources to the store, and the scrape orchestrator.

pub mod pipelines;
pub mod scraper;

pub use scraper::{LiveScraper, ScrapeReport, Scraper};
