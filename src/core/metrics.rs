use crate::core::Dataset;
use crate::utils::error::{FlowError, Result};
use std::cmp::Ordering;

fn check_lengths(expected: usize, actual: usize) -> Result<()> {
    if expected == 0 {
        return Err(FlowError::MetricError {
            message: "no samples to score".to_string(),
        });
    }
    if expected != actual {
        return Err(FlowError::MetricError {
            message: format!("y_true has {} entries but got {}", expected, actual),
        });
    }
    Ok(())
}

/// 預測正確的比例
pub fn accuracy_score(y_true: &[u8], y_pred: &[u8]) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// 以排名統計量計算 ROC 曲線下面積，同分者取平均排名
pub fn roc_auc_score(y_true: &[u8], y_score: &[f64]) -> Result<f64> {
    check_lengths(y_true.len(), y_score.len())?;
    if y_score.iter().any(|s| s.is_nan()) {
        return Err(FlowError::MetricError {
            message: "scores contain NaN".to_string(),
        });
    }

    let positives = y_true.iter().filter(|&&y| y == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(FlowError::MetricError {
            message: "ROC AUC is undefined when only one class is present in y_true".to_string(),
        });
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[a].partial_cmp(&y_score[b]).unwrap_or(Ordering::Equal));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && y_score[order[end]] == y_score[order[start]] {
            end += 1;
        }
        // 排名從 1 開始；同分區間 [start, end) 共用平均排名
        let average_rank = (start + end + 1) as f64 / 2.0;
        let tied_positives = order[start..end].iter().filter(|&&i| y_true[i] == 1).count();
        positive_rank_sum += average_rank * tied_positives as f64;
        start = end;
    }

    let n_pos = positives as f64;
    let u = positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * negatives as f64))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionCounts {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Result<Self> {
        check_lengths(y_true.len(), y_pred.len())?;
        let mut counts = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (1, 1) => counts.true_positives += 1,
                (0, 1) => counts.false_positives += 1,
                (1, 0) => counts.false_negatives += 1,
                _ => counts.true_negatives += 1,
            }
        }
        Ok(counts)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisclassificationKind {
    /// 實際 0，預測 1
    FalsePositive,
    /// 實際 1，預測 0
    FalseNegative,
}

impl MisclassificationKind {
    fn matches(self, truth: u8, predicted: u8) -> bool {
        match self {
            MisclassificationKind::FalsePositive => truth == 0 && predicted == 1,
            MisclassificationKind::FalseNegative => truth == 1 && predicted == 0,
        }
    }
}

/// 取出指定方向分類錯誤的資料列
pub fn misclassified(
    dataset: &Dataset,
    y_true: &[u8],
    y_pred: &[u8],
    kind: MisclassificationKind,
) -> Result<Dataset> {
    check_lengths(y_true.len(), y_pred.len())?;
    if dataset.len() != y_true.len() {
        return Err(FlowError::MetricError {
            message: format!(
                "dataset has {} rows but {} labels",
                dataset.len(),
                y_true.len()
            ),
        });
    }

    let positions: Vec<usize> = y_true
        .iter()
        .zip(y_pred)
        .enumerate()
        .filter(|(_, (t, p))| kind.matches(**t, **p))
        .map(|(i, _)| i)
        .collect();
    Ok(dataset.take(&positions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Record;
    use serde_json::json;

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy_score(&[1, 0, 1, 1], &[1, 1, 1, 0]).unwrap(), 0.5);
        assert!(accuracy_score(&[], &[]).is_err());
        assert!(accuracy_score(&[1], &[1, 0]).is_err());
    }

    #[test]
    fn test_roc_auc_known_value() {
        // 經典四點範例：0.75
        let auc = roc_auc_score(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        assert_eq!(roc_auc_score(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(roc_auc_score(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]).unwrap(), 0.0);
    }

    #[test]
    fn test_roc_auc_ties_count_half() {
        assert_eq!(roc_auc_score(&[0, 1], &[0.5, 0.5]).unwrap(), 0.5);
        // 正 {0.5, 0.9}，負 {0.5, 0.1}：1 + 1 + 0.5 + 1 = 3.5 / 4
        let auc = roc_auc_score(&[1, 0, 1, 0], &[0.5, 0.5, 0.9, 0.1]).unwrap();
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class_fails() {
        let err = roc_auc_score(&[1, 1, 1], &[0.2, 0.4, 0.9]).unwrap_err();
        assert!(matches!(err, FlowError::MetricError { .. }));
    }

    #[test]
    fn test_confusion_counts() {
        let counts = ConfusionCounts::from_labels(&[1, 0, 1, 0, 1], &[1, 1, 0, 0, 1]).unwrap();
        assert_eq!(counts.true_positives, 2);
        assert_eq!(counts.false_positives, 1);
        assert_eq!(counts.false_negatives, 1);
        assert_eq!(counts.true_negatives, 1);
        assert!((counts.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((counts.recall() - 2.0 / 3.0).abs() < 1e-12);
        assert!((counts.f1() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(ConfusionCounts::default().f1(), 0.0);
    }

    #[test]
    fn test_misclassified_rows() {
        let records = (0..4)
            .map(|i| Record {
                index: Some(i.to_string()),
                data: [("id".to_string(), json!(i))].into_iter().collect(),
            })
            .collect();
        let ds = Dataset::new(vec!["id".to_string()], records);
        let y_true = [0, 1, 0, 1];
        let y_pred = [1, 0, 0, 1];

        let fp = misclassified(&ds, &y_true, &y_pred, MisclassificationKind::FalsePositive).unwrap();
        assert_eq!(fp.len(), 1);
        assert_eq!(fp.records[0].index.as_deref(), Some("0"));

        let fn_rows =
            misclassified(&ds, &y_true, &y_pred, MisclassificationKind::FalseNegative).unwrap();
        assert_eq!(fn_rows.len(), 1);
        assert_eq!(fn_rows.records[0].index.as_deref(), Some("1"));

        assert!(misclassified(&ds, &[0], &[1], MisclassificationKind::FalsePositive).is_err());
    }
}
