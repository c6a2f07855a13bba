pub mod classifier;
pub mod flow;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod report;

pub use crate::domain::model::{
    ClassWeight, DataSource, Dataset, Evaluation, FeatureSettings, FeatureSpec, FittedModel,
    ModelSettings, PreparedData, Record, ReportSettings, ScoreSummary,
};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
