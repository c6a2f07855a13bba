use crate::core::{Dataset, FeatureSettings, FeatureSpec, PreparedData, Record};
use crate::utils::error::{FlowError, Result};
use crate::utils::validation::validate_open_fraction;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

// pandas 預設視為缺值的字串（常見子集）
const MISSING_MARKERS: [&str; 5] = ["nan", "NaN", "NA", "N/A", "null"];

/// "Review Text " -> "review_text"
pub fn normalize_column_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed) {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

/// 欄位的文字形式，用於類別名稱與報告表格
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 解析 CSV 文字並正規化欄位名稱
///
/// `index_column` 為真時第一欄當作列索引，不算資料欄
pub fn parse_csv(text: &str, index_column: bool) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let skip = usize::from(index_column);
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .skip(skip)
        .map(normalize_column_name)
        .collect();

    // 正規化後同名的欄位會互相覆蓋
    let mut seen = std::collections::HashSet::with_capacity(columns.len());
    if let Some(duplicate) = columns.iter().find(|c| !seen.insert(c.as_str())) {
        return Err(FlowError::DuplicateColumnError {
            column: duplicate.clone(),
        });
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let index = if index_column {
            row.get(0).map(str::to_string)
        } else {
            None
        };
        let data: HashMap<String, Value> = columns
            .iter()
            .cloned()
            .zip(row.iter().skip(skip).map(parse_cell))
            .collect();
        records.push(Record { index, data });
    }

    tracing::debug!("Parsed {} rows with columns {:?}", records.len(), columns);
    Ok(Dataset::new(columns, records))
}

/// 移除沒有內文的評論
pub fn drop_missing_text(dataset: &Dataset, text_column: &str) -> Result<Dataset> {
    dataset.require_column(text_column)?;
    Ok(dataset.filter(|r| !r.is_missing(text_column)))
}

/// 加上二元結果欄：評分嚴格大於 `threshold` 為 1
///
/// 結果欄放在第一欄。缺評分標為 0，非數值評分回傳錯誤
pub fn label_rows(
    dataset: &Dataset,
    rating_column: &str,
    threshold: f64,
    outcome_column: &str,
) -> Result<Dataset> {
    dataset.require_column(rating_column)?;

    let mut records = Vec::with_capacity(dataset.len());
    for (row, record) in dataset.records.iter().enumerate() {
        let label = match record.get(rating_column) {
            None | Some(Value::Null) => 0,
            Some(_) => match record.get_f64(rating_column) {
                Some(rating) => u8::from(rating > threshold),
                None => {
                    return Err(FlowError::InvalidValueError {
                        column: rating_column.to_string(),
                        row,
                        value: record.get(rating_column).map(cell_to_string).unwrap_or_default(),
                    })
                }
            },
        };
        let mut labelled = record.clone();
        labelled
            .data
            .insert(outcome_column.to_string(), Value::from(label));
        records.push(labelled);
    }

    let mut columns = vec![outcome_column.to_string()];
    columns.extend(dataset.columns.iter().filter(|c| *c != outcome_column).cloned());
    Ok(Dataset::new(columns, records))
}

/// 移除 `required` 任一欄缺值的資料列
pub fn drop_missing(dataset: &Dataset, required: &[String]) -> Result<Dataset> {
    for column in required {
        dataset.require_column(column)?;
    }
    Ok(dataset.filter(|r| required.iter().all(|c| !r.is_missing(c))))
}

/// 對 `columns` 做 one-hot 編碼，新增 `<column>_<value>` 指標欄
///
/// 類別依字典序排序，`drop_first` 時略過第一個。回傳編碼後資料集與新欄位名稱
pub fn one_hot_encode(
    dataset: &Dataset,
    columns: &[String],
    drop_first: bool,
) -> Result<(Dataset, Vec<String>)> {
    let mut encoded = dataset.clone();
    let mut generated = Vec::new();

    for column in columns {
        dataset.require_column(column)?;

        let categories: BTreeSet<String> = dataset
            .records
            .iter()
            .filter(|r| !r.is_missing(column))
            .filter_map(|r| r.get(column).map(cell_to_string))
            .collect();

        let skip = usize::from(drop_first);
        for category in categories.into_iter().skip(skip) {
            let name = format!("{}_{}", column, category);
            for record in encoded.records.iter_mut() {
                let hit = record
                    .get(column)
                    .map(|v| !v.is_null() && cell_to_string(v) == category)
                    .unwrap_or(false);
                record.data.insert(name.clone(), Value::from(u8::from(hit)));
            }
            if !encoded.has_column(&name) {
                encoded.columns.push(name.clone());
            }
            generated.push(name);
        }
    }

    Ok((encoded, generated))
}

/// 數值欄在前，之後依序接上各組 one-hot 欄位
pub fn feature_columns(
    numeric_columns: &[String],
    one_hot_columns: &[String],
    encoded_columns: &[String],
) -> Vec<String> {
    let mut features = numeric_columns.to_vec();
    for column in one_hot_columns {
        let prefix = format!("{}_", column);
        features.extend(
            encoded_columns
                .iter()
                .filter(|c| c.starts_with(&prefix))
                .cloned(),
        );
    }
    features
}

/// 固定種子打亂後切分，`n_test = ceil(test_size * n)`，其餘為訓練集
pub fn train_test_split(dataset: &Dataset, test_size: f64, seed: u64) -> Result<(Dataset, Dataset)> {
    validate_open_fraction("split_size", test_size)?;

    let n = dataset.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(FlowError::InsufficientDataError {
            message: format!(
                "{} rows cannot be split with test size {} (train {}, validation {})",
                n, test_size, n_train, n_test
            ),
        });
    }

    let mut positions: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    positions.shuffle(&mut rng);

    let (test_positions, train_positions) = positions.split_at(n_test);
    Ok((dataset.take(train_positions), dataset.take(test_positions)))
}

/// 完整的載入階段：清理、標記、編碼、切分
pub fn prepare_dataset(
    text: &str,
    index_column: bool,
    settings: &FeatureSettings,
    test_size: f64,
    seed: u64,
) -> Result<PreparedData> {
    let raw = parse_csv(text, index_column)?;
    let raw_rows = raw.len();

    let with_text = drop_missing_text(&raw, &settings.text_column)?;
    let labelled = label_rows(
        &with_text,
        &settings.rating_column,
        settings.label_threshold,
        &settings.outcome_column,
    )?;

    let mut required = settings.one_hot_columns.clone();
    required.push(settings.outcome_column.clone());
    required.extend(settings.numeric_columns.iter().cloned());
    let complete = drop_missing(&labelled, &required)?;

    let (encoded, generated) =
        one_hot_encode(&complete, &settings.one_hot_columns, settings.drop_first)?;
    let features = FeatureSpec {
        feature_cols: feature_columns(
            &settings.numeric_columns,
            &settings.one_hot_columns,
            &generated,
        ),
        outcome_col: settings.outcome_column.clone(),
    };

    tracing::debug!(
        "Cleaning kept {} of {} rows; features: {:?}",
        encoded.len(),
        raw_rows,
        features.feature_cols
    );

    let total_rows = encoded.len();
    let (train, validation) = train_test_split(&encoded, test_size, seed)?;

    Ok(PreparedData {
        train,
        validation,
        features,
        total_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = ",Clothing ID,Age,Title,Review Text,Rating,Division Name,Department Name
0,767,33,,Absolutely wonderful,4,Initmates,Intimate
1,1080,34,,Love this dress,5,General,Dresses
2,1077,60,Some major design flaws,Had such high hopes,3,General,Dresses
3,1049,50,My favorite buy!,,5,General Petite,Bottoms
4,847,47,Flattering shirt,This shirt is very flattering,5,General,Tops
5,1080,,Not for me,Runs small,2,General Petite,Dresses
";

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("Review Text"), "review_text");
        assert_eq!(normalize_column_name("  Division   Name "), "division_name");
        assert_eq!(normalize_column_name("Age"), "age");
    }

    #[test]
    fn test_parse_csv_with_index_column() {
        let ds = parse_csv(SAMPLE, true).unwrap();
        assert_eq!(ds.len(), 6);
        assert_eq!(
            ds.columns,
            strings(&[
                "clothing_id",
                "age",
                "title",
                "review_text",
                "rating",
                "division_name",
                "department_name"
            ])
        );
        assert_eq!(ds.records[0].index.as_deref(), Some("0"));
        assert_eq!(ds.records[0].get("age"), Some(&json!(33)));
        assert!(ds.records[0].is_missing("title"));
        assert!(ds.records[3].is_missing("review_text"));
        assert!(ds.records[5].is_missing("age"));
    }

    #[test]
    fn test_parse_csv_rejects_colliding_headers() {
        let err = parse_csv("Age,age\n1,2\n", false).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateColumnError { column } if column == "age"));

        let err = parse_csv(",Review Text,review  text\n0,a,b\n", true).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateColumnError { column } if column == "review_text"));
    }

    #[test]
    fn test_parse_csv_rejects_ragged_rows() {
        let text = "a,b\n1,2\n3\n";
        assert!(matches!(parse_csv(text, false), Err(FlowError::CsvError(_))));
    }

    #[test]
    fn test_label_threshold_is_strict() {
        let ds = parse_csv(SAMPLE, true).unwrap();
        let labelled = label_rows(&ds, "rating", 4.0, "label").unwrap();
        assert_eq!(labelled.columns[0], "label");
        let labels: Vec<f64> = labelled
            .records
            .iter()
            .map(|r| r.get_f64("label").unwrap())
            .collect();
        assert_eq!(labels, vec![0.0, 1.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_label_rejects_non_numeric_rating() {
        let ds = parse_csv("review_text,rating\ngreat,five\n", false).unwrap();
        let err = label_rows(&ds, "rating", 4.0, "label").unwrap_err();
        assert!(matches!(err, FlowError::InvalidValueError { row: 0, .. }));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let ds = parse_csv(SAMPLE, true).unwrap();
        let err = drop_missing_text(&ds, "review").unwrap_err();
        assert!(matches!(err, FlowError::MissingColumnError { column } if column == "review"));
    }

    #[test]
    fn test_one_hot_drop_first_sorted() {
        let ds = parse_csv(SAMPLE, true).unwrap();
        let (encoded, generated) =
            one_hot_encode(&ds, &strings(&["division_name"]), true).unwrap();
        // 類別：General, General Petite, Initmates -> 去掉 "General"
        assert_eq!(
            generated,
            strings(&["division_name_General Petite", "division_name_Initmates"])
        );
        assert!(encoded.has_column("division_name_Initmates"));
        assert_eq!(
            encoded.records[0].get_f64("division_name_Initmates"),
            Some(1.0)
        );
        assert_eq!(
            encoded.records[1].get_f64("division_name_General Petite"),
            Some(0.0)
        );

        let (_, all) = one_hot_encode(&ds, &strings(&["division_name"]), false).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_feature_columns_order() {
        let encoded = strings(&[
            "division_name_B",
            "department_name_X",
            "division_name_C",
        ]);
        let features = feature_columns(
            &strings(&["age"]),
            &strings(&["division_name", "department_name"]),
            &encoded,
        );
        assert_eq!(
            features,
            strings(&[
                "age",
                "division_name_B",
                "division_name_C",
                "department_name_X"
            ])
        );
    }

    #[test]
    fn test_split_sizes_follow_ceil_rule() {
        let records = (0..10)
            .map(|i| Record {
                index: None,
                data: [("id".to_string(), json!(i))].into_iter().collect(),
            })
            .collect();
        let ds = Dataset::new(strings(&["id"]), records);

        let (train, val) = train_test_split(&ds, 0.25, 7).unwrap();
        assert_eq!(val.len(), 3);
        assert_eq!(train.len(), 7);

        let mut ids: Vec<f64> = train
            .records
            .iter()
            .chain(val.records.iter())
            .map(|r| r.get_f64("id").unwrap())
            .collect();
        ids.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ids, (0..10).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic_per_seed() {
        let ds = parse_csv(SAMPLE, true).unwrap();
        let (train_a, val_a) = train_test_split(&ds, 0.5, 42).unwrap();
        let (train_b, val_b) = train_test_split(&ds, 0.5, 42).unwrap();
        assert_eq!(train_a, train_b);
        assert_eq!(val_a, val_b);
    }

    #[test]
    fn test_split_rejects_degenerate_sizes() {
        let ds = parse_csv(SAMPLE, true).unwrap();
        assert!(train_test_split(&ds, 0.0, 1).is_err());
        assert!(train_test_split(&ds, 1.0, 1).is_err());
        let one = ds.take(&[0]);
        assert!(matches!(
            train_test_split(&one, 0.2, 1),
            Err(FlowError::InsufficientDataError { .. })
        ));
    }

    #[test]
    fn test_prepare_dataset_drops_incomplete_rows() {
        let settings = FeatureSettings::default();
        let prepared = prepare_dataset(SAMPLE, true, &settings, 0.25, 3).unwrap();
        // 第 3 列沒有內文，第 5 列沒有年齡
        assert_eq!(prepared.total_rows, 4);
        assert_eq!(prepared.train.len() + prepared.validation.len(), 4);
        assert_eq!(prepared.validation.len(), 1);
        assert_eq!(prepared.features.outcome_col, "label");
        assert_eq!(prepared.features.feature_cols[0], "age");
        // 剩下的 division: General, Initmates；department: Dresses, Intimate, Tops
        assert_eq!(
            prepared.features.feature_cols,
            strings(&[
                "age",
                "division_name_Initmates",
                "department_name_Intimate",
                "department_name_Tops"
            ])
        );
    }
}
