use crate::core::{ConfigProvider, DataSource, FeatureSettings, ModelSettings, ReportSettings};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_open_fraction, validate_path, validate_positive_number, validate_range, Validate,
};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "review-baseline")]
#[command(about = "Baseline classifier and report card for e-commerce reviews")]
pub struct CliConfig {
    /// Path to the reviews CSV
    #[arg(long, default_value = "../data/Womens Clothing E-Commerce Reviews.csv")]
    pub data: String,

    /// Fraction of rows held out for validation
    #[arg(long = "split-sz", default_value_t = 0.2)]
    pub split_sz: f64,

    /// Seed for the train/validation shuffle
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    /// Ratings strictly above this are labelled positive
    #[arg(long, default_value_t = 4.0)]
    pub threshold: f64,

    /// Rows shown per table in the report card
    #[arg(long, default_value_t = 25)]
    pub max_table_rows: usize,

    /// Write loose report files instead of a ZIP bundle
    #[arg(long)]
    pub no_bundle: bool,

    /// The CSV has no leading index column
    #[arg(long)]
    pub no_index_column: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU and memory after each stage")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,
}

impl ConfigProvider for CliConfig {
    fn data_source(&self) -> DataSource {
        DataSource::Path(self.data.clone())
    }

    fn index_column(&self) -> bool {
        !self.no_index_column
    }

    fn split_size(&self) -> f64 {
        self.split_sz
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn feature_settings(&self) -> FeatureSettings {
        FeatureSettings {
            label_threshold: self.threshold,
            ..FeatureSettings::default()
        }
    }

    fn model_settings(&self) -> ModelSettings {
        ModelSettings::default()
    }

    fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            max_table_rows: self.max_table_rows,
            bundle: !self.no_bundle,
            ..ReportSettings::default()
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("data", &self.data)?;
        validate_path("output_path", &self.output_path)?;
        validate_open_fraction("split-sz", self.split_sz)?;
        validate_positive_number("max_table_rows", self.max_table_rows, 1)?;
        // 評分為 1-5 星，與 TOML 設定相同的範圍
        validate_range("threshold", self.threshold, 0.0, 5.0)?;
        Ok(())
    }
}
