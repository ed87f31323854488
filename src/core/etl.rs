use crate::domain::model::LoadSummary;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn new_with_monitoring(pipeline: P, monitoring: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitoring),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    #[tracing::instrument(skip(self), fields(pipeline = %self.pipeline.name()))]
    pub async fn run(&self) -> Result<LoadSummary> {
        let started = Instant::now();
        tracing::info!("🚀 Starting ETL run");

        // Extract
        tracing::debug!("📥 Extracting...");
        let extracted = self.pipeline.extract().await?;
        self.monitor.log_phase("extract");

        // Transform
        tracing::debug!("🔄 Transforming...");
        let transformed = self.pipeline.transform(extracted).await?;
        self.monitor.log_phase("transform");

        // Load
        tracing::debug!("💾 Loading...");
        let summary = self.pipeline.load(transformed).await?;
        self.monitor.log_phase("load");

        tracing::info!(
            "✅ {} finished: {} records, {} changes for {} ({} ms)",
            summary.source,
            summary.records,
            summary.changes,
            summary.date,
            started.elapsed().as_millis()
        );

        Ok(summary)
    }
}
