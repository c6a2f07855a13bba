use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Column '{column}' not found in dataset")]
    MissingColumnError { column: String },

    #[error("Column '{column}' appears more than once after normalisation")]
    DuplicateColumnError { column: String },

    #[error("Invalid value '{value}' in column '{column}' (row {row})")]
    InvalidValueError {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Insufficient data: {message}")]
    InsufficientDataError { message: String },

    #[error("Model error: {message}")]
    ModelError { message: String },

    #[error("Metric error: {message}")]
    MetricError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Data,
    Model,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FlowError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FlowError::CsvError(_) => ErrorCategory::Input,
            FlowError::ConfigValidationError { .. }
            | FlowError::InvalidConfigValueError { .. }
            | FlowError::MissingConfigError { .. } => ErrorCategory::Configuration,
            FlowError::MissingColumnError { .. }
            | FlowError::DuplicateColumnError { .. }
            | FlowError::InvalidValueError { .. }
            | FlowError::InsufficientDataError { .. } => ErrorCategory::Data,
            FlowError::ModelError { .. } | FlowError::MetricError { .. } => ErrorCategory::Model,
            FlowError::ZipError(_) | FlowError::IoError(_) | FlowError::SerializationError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Configuration | ErrorCategory::Data => {
                ErrorSeverity::High
            }
            // 模型不收斂或指標無法計算，通常換個切分或種子即可
            ErrorCategory::Model => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            FlowError::CsvError(e) => format!("Could not read the review CSV: {}", e),
            FlowError::IoError(e) => format!("File system error: {}", e),
            FlowError::ZipError(e) => format!("Could not write the report bundle: {}", e),
            FlowError::SerializationError(e) => format!("Could not serialize report data: {}", e),
            FlowError::MissingColumnError { column } => {
                format!("The dataset has no '{}' column", column)
            }
            FlowError::InvalidValueError { column, row, value } => format!(
                "Row {} has an unusable value '{}' in column '{}'",
                row, value, column
            ),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            FlowError::CsvError(_) => "Check that the data file is a well-formed CSV with a header row",
            FlowError::IoError(_) => "Check that the data path exists and the output path is writable",
            FlowError::ZipError(_) | FlowError::SerializationError(_) => {
                "Check free disk space and permissions on the output path"
            }
            FlowError::ConfigValidationError { .. }
            | FlowError::InvalidConfigValueError { .. }
            | FlowError::MissingConfigError { .. } => {
                "Fix the reported setting in the command line or TOML file"
            }
            FlowError::MissingColumnError { .. } => {
                "Column names are lowercased and joined with '_'; check the configured column names"
            }
            FlowError::DuplicateColumnError { .. } => {
                "Rename CSV headers so they stay distinct once lowercased and joined with '_'"
            }
            FlowError::InvalidValueError { .. } => "Clean the offending rows or drop the column from the features",
            FlowError::InsufficientDataError { .. } => {
                "Use a larger dataset or adjust --split-sz so both partitions are non-empty"
            }
            FlowError::ModelError { .. } | FlowError::MetricError { .. } => {
                "Try a different --seed or --split-sz so both classes appear in each partition"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_severity() {
        let err = FlowError::MissingColumnError {
            column: "age".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.severity(), ErrorSeverity::High);

        let err = FlowError::DuplicateColumnError {
            column: "age".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.severity(), ErrorSeverity::High);

        let err = FlowError::MetricError {
            message: "only one class".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Model);
        assert_eq!(err.severity(), ErrorSeverity::Medium);

        let err = FlowError::IoError(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_user_friendly_message() {
        let err = FlowError::InvalidValueError {
            column: "rating".to_string(),
            row: 3,
            value: "five".to_string(),
        };
        assert_eq!(
            err.user_friendly_message(),
            "Row 3 has an unusable value 'five' in column 'rating'"
        );
    }
}
