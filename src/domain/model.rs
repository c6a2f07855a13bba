use crate::utils::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 一筆評論；CSV 有未命名的索引欄時放在 `index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub index: Option<String>,
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.data.get(column)
    }

    pub fn is_missing(&self, column: &str) -> bool {
        matches!(self.data.get(column), None | Some(serde_json::Value::Null))
    }

    /// 以數值讀取欄位，布林值視為 0/1
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        match self.data.get(column)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn require_column(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(FlowError::MissingColumnError {
                column: column.to_string(),
            })
        }
    }

    /// 依給定位置與順序取出資料列
    pub fn take(&self, positions: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            records: positions
                .iter()
                .filter_map(|&i| self.records.get(i).cloned())
                .collect(),
        }
    }

    pub fn filter<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&Record) -> bool,
    {
        Dataset {
            columns: self.columns.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

/// 評論 CSV 的來源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Path(String),
    Inline(String),
}

impl DataSource {
    pub fn describe(&self) -> String {
        match self {
            DataSource::Path(path) => path.clone(),
            DataSource::Inline(content) => format!("<inline CSV, {} bytes>", content.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    None,
    #[default]
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSettings {
    pub text_column: String,
    pub rating_column: String,
    pub label_threshold: f64,
    pub outcome_column: String,
    pub one_hot_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub drop_first: bool,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            text_column: "review_text".to_string(),
            rating_column: "rating".to_string(),
            label_threshold: 4.0,
            outcome_column: "label".to_string(),
            one_hot_columns: vec!["division_name".to_string(), "department_name".to_string()],
            numeric_columns: vec!["age".to_string()],
            drop_first: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub c: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    pub class_weight: ClassWeight,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tolerance: 1e-6,
            class_weight: ClassWeight::Balanced,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub title: String,
    pub max_table_rows: usize,
    pub bundle: bool,
    pub bundle_filename: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: "Womens Clothing Review Results".to_string(),
            max_table_rows: 25,
            bundle: true,
            bundle_filename: "baseline_report.zip".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub feature_cols: Vec<String>,
    pub outcome_col: String,
}

/// 載入與切分階段的輸出
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train: Dataset,
    pub validation: Dataset,
    pub features: FeatureSpec,
    pub total_rows: usize,
}

/// 訓練後的係數，依特徵名稱對應
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// 求解器未回報時為 `None`
    pub iterations: Option<u64>,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub accuracy: f64,
    pub roc_auc: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
    pub train_rows: usize,
    pub validation_rows: usize,
}

/// 訓練與評分階段的輸出
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub scores: ScoreSummary,
    pub model: FittedModel,
    pub predictions: Vec<u8>,
    pub probabilities: Vec<f64>,
    pub false_positives: Dataset,
    pub false_negatives: Dataset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, serde_json::Value)]) -> Record {
        Record {
            index: None,
            data: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_record_missing_and_numeric() {
        let r = record(&[("age", json!(33)), ("title", serde_json::Value::Null)]);
        assert!(!r.is_missing("age"));
        assert!(r.is_missing("title"));
        assert!(r.is_missing("absent"));
        assert_eq!(r.get_f64("age"), Some(33.0));
        assert_eq!(r.get_f64("title"), None);
    }

    #[test]
    fn test_dataset_take_preserves_order() {
        let records = (0..4).map(|i| record(&[("id", json!(i))])).collect();
        let ds = Dataset::new(vec!["id".to_string()], records);
        let taken = ds.take(&[3, 1]);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken.records[0].get_f64("id"), Some(3.0));
        assert_eq!(taken.records[1].get_f64("id"), Some(1.0));
        assert!(ds.require_column("id").is_ok());
        assert!(ds.require_column("age").is_err());
    }
}
