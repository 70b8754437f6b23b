use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Workbook has no sheets")]
    EmptyWorkbook,

    #[error("No {role} sheet matched the candidates; using '{fallback}'")]
    SheetNotResolved { role: String, fallback: String },

    #[error("Missing required column {field}: it cannot be derived without {requires}")]
    MissingRequiredColumn { field: String, requires: String },

    #[error("Salesperson reference table unavailable: {0}")]
    ReferenceTableUnavailable(String),

    #[error("Delinquency table has no rows")]
    EmptyInput,

    #[error("Invalid value '{value}' in column {column} at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    /// Soft errors degrade the build instead of aborting it.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            ReportError::SheetNotResolved { .. } | ReportError::ReferenceTableUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
