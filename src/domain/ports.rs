use crate::domain::model::{
    DataSource, Evaluation, FeatureSettings, ModelSettings, PreparedData, ReportSettings,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn data_source(&self) -> DataSource;
    fn index_column(&self) -> bool;
    fn split_size(&self) -> f64;
    fn seed(&self) -> u64;
    fn output_path(&self) -> &str;
    fn feature_settings(&self) -> FeatureSettings;
    fn model_settings(&self) -> ModelSettings;
    fn report_settings(&self) -> ReportSettings;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<PreparedData>;
    async fn transform(&self, data: PreparedData) -> Result<Evaluation>;
    async fn load(&self, evaluation: Evaluation) -> Result<String>;
}
