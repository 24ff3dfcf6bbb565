use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        let start = Instant::now();
        tracing::info!("🚀 Starting concentration pipeline");
        self.monitor.log_stats("Start");

        tracing::info!("📥 Extracting records...");
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} records", raw_data.len());
        self.monitor.log_stats("Extract");

        tracing::info!("🔄 Transforming records...");
        let result = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "🔄 {} businesses -> {} analysis rows -> {} index rows",
            result.businesses,
            result.analysis_rows.len(),
            result.index_rows.len()
        );
        self.monitor.log_stats("Transform");

        tracing::info!("💾 Loading tables...");
        let output_path = self.pipeline.load(result).await?;
        self.monitor.log_stats("Load");

        tracing::info!("✅ Finished in {:?}; output in {}", start.elapsed(), output_path);
        self.monitor.log_final_stats();
        Ok(output_path)
    }
}
