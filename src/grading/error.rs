use thiserror::Error;

pub type GradingResult<T> = std::result::Result<T, GradingError>;

#[derive(Debug, Error)]
pub enum GradingError {
    /// A standard or a stored label references something outside the catalog.
    /// Never mapped to a default grade.
    #[error("unknown label: {label}")]
    UnknownLabel { label: String },

    #[error("unknown sample: {sample_id}")]
    UnknownSample { sample_id: i64 },

    #[error("unknown lot: {lot_id}")]
    UnknownLot { lot_id: i64 },

    #[error("sample {sample_id} already belongs to lot {lot_id}")]
    SampleConflict { sample_id: i64, lot_id: i64 },

    #[error("submission for sample {sample_id} carries no measurements")]
    EmptySubmission { sample_id: i64 },

    #[error("storage failure")]
    Storage(#[from] rusqlite::Error),

    #[error("invalid measurement pattern")]
    Pattern(#[from] regex::Error),
}

impl GradingError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownLabel { .. } => "unknown_label",
            Self::UnknownSample { .. } => "unknown_sample",
            Self::UnknownLot { .. } => "unknown_lot",
            Self::SampleConflict { .. } => "sample_conflict",
            Self::EmptySubmission { .. } => "empty_submission",
            Self::Storage(_) => "storage",
            Self::Pattern(_) => "pattern",
        }
    }
}
