use crate::core::classifier::{feature_matrix, labels_from_dataset, LogisticRegression};
use crate::core::ingest::prepare_dataset;
use crate::core::metrics::{
    accuracy_score, misclassified, roc_auc_score, ConfusionCounts, MisclassificationKind,
};
use crate::core::report::{build_baseline_card, console_summary, dataset_to_csv};
use crate::core::{
    ConfigProvider, DataSource, Evaluation, Pipeline, PreparedData, ScoreSummary, Storage,
};
use crate::utils::error::{FlowError, Result};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const CARD_FILE: &str = "card.md";
pub const METRICS_FILE: &str = "metrics.json";
pub const MODEL_FILE: &str = "model.json";
pub const FALSE_POSITIVES_FILE: &str = "false_positives.csv";
pub const FALSE_NEGATIVES_FILE: &str = "false_negatives.csv";

/// 評論基準流程：載入切分 -> 訓練評分 -> 報告
pub struct BaselinePipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
}

impl<S: Storage, C: ConfigProvider> BaselinePipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    async fn read_source(&self) -> Result<String> {
        match self.config.data_source() {
            DataSource::Inline(content) => Ok(content),
            DataSource::Path(path) => {
                tracing::debug!("Reading review data from: {}", path);
                let bytes = self.storage.read_file(&path).await?;
                String::from_utf8(bytes).map_err(|e| {
                    FlowError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                })
            }
        }
    }

    fn report_files(&self, evaluation: &Evaluation) -> Result<Vec<(&'static str, Vec<u8>)>> {
        let card = build_baseline_card(evaluation, &self.config.report_settings());

        let metrics = serde_json::json!({
            "scores": evaluation.scores,
            "split_size": self.config.split_size(),
            "seed": self.config.seed(),
            "generated_at": chrono::Utc::now().to_rfc3339(),
        });

        Ok(vec![
            (CARD_FILE, card.to_markdown().into_bytes()),
            (METRICS_FILE, serde_json::to_vec_pretty(&metrics)?),
            (MODEL_FILE, serde_json::to_vec_pretty(&evaluation.model)?),
            (
                FALSE_POSITIVES_FILE,
                dataset_to_csv(&evaluation.false_positives)?.into_bytes(),
            ),
            (
                FALSE_NEGATIVES_FILE,
                dataset_to_csv(&evaluation.false_negatives)?.into_bytes(),
            ),
        ])
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for BaselinePipeline<S, C> {
    async fn extract(&self) -> Result<PreparedData> {
        let text = self.read_source().await?;
        let prepared = prepare_dataset(
            &text,
            self.config.index_column(),
            &self.config.feature_settings(),
            self.config.split_size(),
            self.config.seed(),
        )?;

        println!("num of rows in train set: {}", prepared.train.len());
        println!("num of rows in validation set: {}", prepared.validation.len());
        tracing::debug!(
            "Split {} rows with test size {} and seed {}",
            prepared.total_rows,
            self.config.split_size(),
            self.config.seed()
        );

        Ok(prepared)
    }

    async fn transform(&self, data: PreparedData) -> Result<Evaluation> {
        let features = &data.features;

        let x_train = feature_matrix(&data.train, &features.feature_cols)?;
        let y_train = labels_from_dataset(&data.train, &features.outcome_col)?;
        let mut model = LogisticRegression::from_settings(&self.config.model_settings());
        model.fit(&x_train, &y_train)?;

        let x_val = feature_matrix(&data.validation, &features.feature_cols)?;
        let y_val = labels_from_dataset(&data.validation, &features.outcome_col)?;
        let predictions = model.predict(&x_val)?;
        let probabilities = model.predict_proba(&x_val)?;

        let accuracy = accuracy_score(&y_val, &predictions)?;
        let roc_auc = roc_auc_score(&y_val, &probabilities)?;
        let counts = ConfusionCounts::from_labels(&y_val, &predictions)?;

        let false_positives = misclassified(
            &data.validation,
            &y_val,
            &predictions,
            MisclassificationKind::FalsePositive,
        )?;
        let false_negatives = misclassified(
            &data.validation,
            &y_val,
            &predictions,
            MisclassificationKind::FalseNegative,
        )?;

        let scores = ScoreSummary {
            accuracy,
            roc_auc,
            precision: counts.precision(),
            recall: counts.recall(),
            f1: counts.f1(),
            true_positives: counts.true_positives,
            false_positives: counts.false_positives,
            true_negatives: counts.true_negatives,
            false_negatives: counts.false_negatives,
            train_rows: data.train.len(),
            validation_rows: data.validation.len(),
        };
        tracing::debug!("Validation scores: {:?}", scores);

        Ok(Evaluation {
            scores,
            model: model.to_fitted_model(&features.feature_cols)?,
            predictions,
            probabilities,
            false_positives,
            false_negatives,
        })
    }

    async fn load(&self, evaluation: Evaluation) -> Result<String> {
        println!("{}", console_summary(&evaluation.scores));

        let settings = self.config.report_settings();
        let files = self.report_files(&evaluation)?;

        if !settings.bundle {
            for (name, data) in &files {
                self.storage.write_file(name, data).await?;
            }
            tracing::debug!("Wrote {} report files", files.len());
            return Ok(self.config.output_path().to_string());
        }

        tracing::debug!("Creating report bundle with {} files", files.len());

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            for (name, data) in &files {
                zip.start_file::<_, ()>(*name, FileOptions::default())?;
                zip.write_all(data)?;
            }
            let cursor = zip.finish()?;
            cursor.into_inner()
        };

        tracing::debug!("Writing report bundle ({} bytes) to storage", zip_data.len());
        self.storage
            .write_file(&settings.bundle_filename, &zip_data)
            .await?;

        Ok(format!(
            "{}/{}",
            self.config.output_path(),
            settings.bundle_filename
        ))
    }
}
