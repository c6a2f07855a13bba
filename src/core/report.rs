use crate::core::ingest::cell_to_string;
use crate::core::{Dataset, Evaluation, ReportSettings, ScoreSummary};
use crate::utils::error::{FlowError, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 截斷前的筆數
    pub total_rows: usize,
}

impl Table {
    /// 從資料集建立表格，最多保留 `max_rows` 筆；有索引時放在第一欄
    pub fn from_dataset(dataset: &Dataset, max_rows: usize) -> Self {
        let with_index = dataset.records.iter().any(|r| r.index.is_some());

        let mut headers = Vec::with_capacity(dataset.columns.len() + 1);
        if with_index {
            headers.push("index".to_string());
        }
        headers.extend(dataset.columns.iter().cloned());

        let rows = dataset
            .records
            .iter()
            .take(max_rows)
            .map(|record| {
                let mut row = Vec::with_capacity(headers.len());
                if with_index {
                    row.push(record.index.clone().unwrap_or_default());
                }
                row.extend(
                    dataset
                        .columns
                        .iter()
                        .map(|c| record.get(c).map(cell_to_string).unwrap_or_default()),
                );
                row
            })
            .collect();

        Self {
            headers,
            rows,
            total_rows: dataset.len(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.rows.len() < self.total_rows
    }

    fn to_markdown(&self) -> String {
        if self.headers.is_empty() || self.total_rows == 0 {
            return "_No rows._\n".to_string();
        }

        let mut out = String::new();
        out.push_str(&markdown_row(&self.headers));
        out.push_str(&markdown_row(&vec!["---".to_string(); self.headers.len()]));
        for row in &self.rows {
            out.push_str(&markdown_row(row));
        }
        if self.is_truncated() {
            out.push_str(&format!(
                "\n_Showing {} of {} rows._\n",
                self.rows.len(),
                self.total_rows
            ));
        }
        out
    }
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn markdown_row(cells: &[String]) -> String {
    let escaped: Vec<String> = cells.iter().map(|c| escape_cell(c)).collect();
    format!("| {} |\n", escaped.join(" | "))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CardComponent {
    Markdown(String),
    Artifact(serde_json::Value),
    Table(Table),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportCard {
    components: Vec<CardComponent>,
}

impl ReportCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, component: CardComponent) {
        self.components.push(component);
    }

    pub fn components(&self) -> &[CardComponent] {
        &self.components
    }

    pub fn to_markdown(&self) -> String {
        let mut sections = Vec::with_capacity(self.components.len());
        for component in &self.components {
            let rendered = match component {
                CardComponent::Markdown(text) => format!("{}\n", text.trim_end()),
                CardComponent::Artifact(value) => format!("```\n{}\n```\n", value),
                CardComponent::Table(table) => table.to_markdown(),
            };
            sections.push(rendered);
        }
        sections.join("\n")
    }
}

/// 報告卡：整體指標加上偽陽性、偽陰性表格
pub fn build_baseline_card(evaluation: &Evaluation, settings: &ReportSettings) -> ReportCard {
    let scores = &evaluation.scores;
    let mut card = ReportCard::new();

    card.append(CardComponent::Markdown(format!("# {}", settings.title)));
    card.append(CardComponent::Markdown("## Overall Accuracy".to_string()));
    card.append(CardComponent::Artifact(serde_json::json!(scores.accuracy)));
    card.append(CardComponent::Markdown("## ROC AUC".to_string()));
    card.append(CardComponent::Artifact(serde_json::json!(scores.roc_auc)));

    card.append(CardComponent::Markdown("## Examples of False Positives".to_string()));
    card.append(CardComponent::Table(Table::from_dataset(
        &evaluation.false_positives,
        settings.max_table_rows,
    )));

    card.append(CardComponent::Markdown("## Examples of False Negatives".to_string()));
    card.append(CardComponent::Table(Table::from_dataset(
        &evaluation.false_negatives,
        settings.max_table_rows,
    )));

    card
}

pub fn console_summary(scores: &ScoreSummary) -> String {
    format!(
        "Baseline Accuracy: {:.3}\nBaseline AUC: {:.3}",
        scores.accuracy, scores.roc_auc
    )
}

/// 整個資料集轉成 CSV 文字，索引欄在最前面
pub fn dataset_to_csv(dataset: &Dataset) -> Result<String> {
    let table = Table::from_dataset(dataset, dataset.len());
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| FlowError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| FlowError::InvalidValueError {
        column: "<csv output>".to_string(),
        row: 0,
        value: e.to_string(),
    })
}
