use crate::domain::ports::ReportPipeline;
use crate::utils::error::Result;
use crate::utils::monitor::ReportMonitor;

pub struct ReportEngine<P: ReportPipeline> {
    pipeline: P,
    monitor: ReportMonitor,
}

impl<P: ReportPipeline> ReportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: ReportMonitor::new(monitor_enabled),
        }
    }

    /// 執行 fetch → aggregate → render，回傳輸出檔路徑
    pub async fn run(&self) -> Result<Vec<String>> {
        tracing::info!("Starting report generation");

        tracing::info!("Fetching records...");
        let documents = self.pipeline.extract().await?;
        tracing::info!("Fetched {} records", documents.len());
        self.monitor.log_stage("Fetch");

        tracing::info!("Aggregating...");
        let output = self.pipeline.transform(documents).await?;
        self.monitor.log_stage("Aggregate");

        tracing::info!("Rendering...");
        let paths = self.pipeline.load(output).await?;
        self.monitor.log_stage("Render");

        for path in &paths {
            tracing::info!("📁 Report saved to: {}", path);
        }
        self.monitor.log_final_stats();

        Ok(paths)
    }
}
