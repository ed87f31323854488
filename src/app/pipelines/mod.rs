pub mod holdings_pipeline;
pub mod warrant_pipeline;

pub use holdings_pipeline::{HoldingsBatch, HoldingsPipeline};
pub use warrant_pipeline::{dedupe_warrants, WarrantPipeline};
