use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// 依序執行 Pipeline 的三個階段
pub struct FlowEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> FlowEngine<P> {
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
        tracing::info!("Starting baseline flow");

        // start: 載入並切分
        tracing::info!("Loading and splitting reviews...");
        let prepared = self.pipeline.extract().await?;
        tracing::info!(
            "Prepared {} rows ({} train / {} validation, {} features)",
            prepared.total_rows,
            prepared.train.len(),
            prepared.validation.len(),
            prepared.features.feature_cols.len()
        );
        self.monitor.log_stats("Load & split");

        // baseline: 訓練並評分
        tracing::info!("Fitting baseline model...");
        let evaluation = self.pipeline.transform(prepared).await?;
        tracing::info!(
            "Scored {} validation rows: accuracy {:.3}, AUC {:.3}",
            evaluation.scores.validation_rows,
            evaluation.scores.accuracy,
            evaluation.scores.roc_auc
        );
        self.monitor.log_stats("Fit & score");

        // end: 產出報告
        tracing::info!("Rendering report card...");
        let output_path = self.pipeline.load(evaluation).await?;
        tracing::info!("Report saved to: {}", output_path);
        self.monitor.log_stats("Report");

        if self.monitor.is_enabled() {
            self.monitor.log_final_stats();
        }

        Ok(output_path)
    }
}
