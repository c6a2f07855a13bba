use crate::core::{
    ClassWeight, ConfigProvider, DataSource, FeatureSettings, ModelSettings, ReportSettings,
};
use crate::utils::error::{FlowError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_open_fraction, validate_path, validate_positive_number,
    validate_range, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_SPLIT_SIZE: f64 = 0.2;
const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub flow: FlowConfig,
    pub source: SourceConfig,
    pub split: Option<SplitConfig>,
    pub features: Option<FeaturesConfig>,
    pub model: Option<ModelConfig>,
    pub report: ReportConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: Option<String>,
    /// 內嵌的 CSV 文字，取代 `path`
    pub content: Option<String>,
    pub index_column: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub test_size: Option<f64>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    pub text_column: Option<String>,
    pub rating_column: Option<String>,
    pub label_threshold: Option<f64>,
    pub one_hot_columns: Option<Vec<String>>,
    pub numeric_columns: Option<Vec<String>>,
    pub drop_first: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub c: Option<f64>,
    pub max_iter: Option<usize>,
    pub tolerance: Option<f64>,
    pub class_weight: Option<ClassWeight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output_path: String,
    pub title: Option<String>,
    pub max_table_rows: Option<usize>,
    pub bundle: Option<bool>,
    pub bundle_filename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(FlowError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| FlowError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| FlowError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("flow.name", &self.flow.name)?;

        match (&self.source.path, &self.source.content) {
            (Some(path), None) => validate_path("source.path", path)?,
            (None, Some(content)) => validate_non_empty_string("source.content", content)?,
            (Some(_), Some(_)) => {
                return Err(FlowError::ConfigValidationError {
                    field: "source".to_string(),
                    message: "set either 'path' or 'content', not both".to_string(),
                })
            }
            (None, None) => {
                return Err(FlowError::MissingConfigError {
                    field: "source.path".to_string(),
                })
            }
        }

        validate_open_fraction("split.test_size", self.split_size())?;
        validate_path("report.output_path", &self.report.output_path)?;

        let report = self.report_settings();
        validate_positive_number("report.max_table_rows", report.max_table_rows, 1)?;
        validate_non_empty_string("report.bundle_filename", &report.bundle_filename)?;

        let model = self.model_settings();
        validate_positive_number("model.max_iter", model.max_iter, 1)?;
        if !(model.c > 0.0) {
            return Err(FlowError::InvalidConfigValueError {
                field: "model.c".to_string(),
                value: model.c.to_string(),
                reason: "Value must be positive".to_string(),
            });
        }
        if !(model.tolerance > 0.0) {
            return Err(FlowError::InvalidConfigValueError {
                field: "model.tolerance".to_string(),
                value: model.tolerance.to_string(),
                reason: "Value must be positive".to_string(),
            });
        }

        let features = self.feature_settings();
        if features.one_hot_columns.is_empty() && features.numeric_columns.is_empty() {
            return Err(FlowError::ConfigValidationError {
                field: "features".to_string(),
                message: "at least one feature column is required".to_string(),
            });
        }
        // 評分為 1-5 星
        validate_range("features.label_threshold", features.label_threshold, 0.0, 5.0)?;

        Ok(())
    }

    /// 以命令列參數覆蓋驗證集比例，保留原本的種子
    pub fn override_split_size(&mut self, test_size: f64) {
        let split = self.split.get_or_insert(SplitConfig {
            test_size: None,
            seed: None,
        });
        split.test_size = Some(test_size);
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn data_source(&self) -> DataSource {
        match (&self.source.content, &self.source.path) {
            (Some(content), _) => DataSource::Inline(content.clone()),
            (None, path) => DataSource::Path(path.clone().unwrap_or_default()),
        }
    }

    fn index_column(&self) -> bool {
        self.source.index_column.unwrap_or(true)
    }

    fn split_size(&self) -> f64 {
        self.split
            .as_ref()
            .and_then(|s| s.test_size)
            .unwrap_or(DEFAULT_SPLIT_SIZE)
    }

    fn seed(&self) -> u64 {
        self.split
            .as_ref()
            .and_then(|s| s.seed)
            .unwrap_or(DEFAULT_SEED)
    }

    fn output_path(&self) -> &str {
        &self.report.output_path
    }

    fn feature_settings(&self) -> FeatureSettings {
        let defaults = FeatureSettings::default();
        let Some(f) = &self.features else {
            return defaults;
        };
        FeatureSettings {
            text_column: f.text_column.clone().unwrap_or(defaults.text_column),
            rating_column: f.rating_column.clone().unwrap_or(defaults.rating_column),
            label_threshold: f.label_threshold.unwrap_or(defaults.label_threshold),
            outcome_column: defaults.outcome_column,
            one_hot_columns: f.one_hot_columns.clone().unwrap_or(defaults.one_hot_columns),
            numeric_columns: f.numeric_columns.clone().unwrap_or(defaults.numeric_columns),
            drop_first: f.drop_first.unwrap_or(defaults.drop_first),
        }
    }

    fn model_settings(&self) -> ModelSettings {
        let defaults = ModelSettings::default();
        let Some(m) = &self.model else {
            return defaults;
        };
        ModelSettings {
            c: m.c.unwrap_or(defaults.c),
            max_iter: m.max_iter.unwrap_or(defaults.max_iter),
            tolerance: m.tolerance.unwrap_or(defaults.tolerance),
            class_weight: m.class_weight.unwrap_or(defaults.class_weight),
        }
    }

    fn report_settings(&self) -> ReportSettings {
        let defaults = ReportSettings::default();
        let r = &self.report;
        ReportSettings {
            title: r.title.clone().unwrap_or(defaults.title),
            max_table_rows: r.max_table_rows.unwrap_or(defaults.max_table_rows),
            bundle: r.bundle.unwrap_or(defaults.bundle),
            bundle_filename: r.bundle_filename.clone().unwrap_or(defaults.bundle_filename),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_toml_config() {
        let toml_content = r#"
[flow]
name = "baseline-nlp"
version = "1.0.0"

[source]
path = "data/reviews.csv"

[split]
test_size = 0.25
seed = 7

[features]
label_threshold = 3.0
one_hot_columns = ["division_name"]

[model]
class_weight = "none"
max_iter = 50

[report]
output_path = "./test-output"
title = "Test Card"
bundle = false
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.flow.name, "baseline-nlp");
        assert_eq!(
            config.data_source(),
            DataSource::Path("data/reviews.csv".to_string())
        );
        assert_eq!(config.split_size(), 0.25);
        assert_eq!(config.seed(), 7);

        let features = config.feature_settings();
        assert_eq!(features.label_threshold, 3.0);
        assert_eq!(features.one_hot_columns, vec!["division_name".to_string()]);
        assert_eq!(features.numeric_columns, vec!["age".to_string()]);

        let model = config.model_settings();
        assert_eq!(model.class_weight, ClassWeight::None);
        assert_eq!(model.max_iter, 50);
        assert_eq!(model.c, 1.0);

        let report = config.report_settings();
        assert_eq!(report.title, "Test Card");
        assert!(!report.bundle);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_when_sections_omitted() {
        let toml_content = r#"
[flow]
name = "defaults"
version = "1.0"

[source]
content = "a,b\n1,2\n"

[report]
output_path = "./output"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(matches!(config.data_source(), DataSource::Inline(_)));
        assert_eq!(config.split_size(), DEFAULT_SPLIT_SIZE);
        assert_eq!(config.seed(), DEFAULT_SEED);
        assert!(config.index_column());
        assert_eq!(config.model_settings(), ModelSettings::default());
        assert_eq!(config.feature_settings(), FeatureSettings::default());
        assert!(!config.monitoring_enabled());
    }

    #[test]
    fn test_split_size_override() {
        let with_split = r#"
[flow]
name = "override"
version = "1.0"

[source]
path = "reviews.csv"

[split]
test_size = 0.25
seed = 7

[report]
output_path = "./output"
"#;
        let mut config = TomlConfig::from_toml_str(with_split).unwrap();
        config.override_split_size(0.4);
        assert_eq!(config.split_size(), 0.4);
        assert_eq!(config.seed(), 7);

        // 沒有 [split] 區塊時建立一個，種子維持預設
        let without_split = with_split.replace("[split]\ntest_size = 0.25\nseed = 7\n", "");
        let mut config = TomlConfig::from_toml_str(&without_split).unwrap();
        assert!(config.split.is_none());
        config.override_split_size(0.3);
        assert_eq!(config.split_size(), 0.3);
        assert_eq!(config.seed(), DEFAULT_SEED);

        config.override_split_size(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("REVIEW_BASELINE_TEST_DATA", "/srv/data/reviews.csv");

        let toml_content = r#"
[flow]
name = "test"
version = "1.0"

[source]
path = "${REVIEW_BASELINE_TEST_DATA}"

[report]
output_path = "./output"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.source.path.as_deref(),
            Some("/srv/data/reviews.csv")
        );

        std::env::remove_var("REVIEW_BASELINE_TEST_DATA");
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[flow]
name = "test"
version = "1.0"

[source]
path = "reviews.csv"

[split]
test_size = 1.5

[report]
output_path = "./output"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_requires_exactly_one_input() {
        let both = r#"
[flow]
name = "test"
version = "1.0"

[source]
path = "reviews.csv"
content = "a,b"

[report]
output_path = "./output"
"#;
        let config = TomlConfig::from_toml_str(both).unwrap();
        assert!(matches!(
            config.validate(),
            Err(FlowError::ConfigValidationError { .. })
        ));

        let neither = r#"
[flow]
name = "test"
version = "1.0"

[source]

[report]
output_path = "./output"
"#;
        let config = TomlConfig::from_toml_str(neither).unwrap();
        assert!(matches!(
            config.validate(),
            Err(FlowError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[flow]
name = "file-test"
version = "1.0"

[source]
path = "reviews.csv"

[report]
output_path = "./output"

[monitoring]
enabled = true
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.flow.name, "file-test");
        assert!(config.monitoring_enabled());
    }
}
