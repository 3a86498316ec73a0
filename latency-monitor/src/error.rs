use crate::trade::Column;
use thiserror::Error;

/// All errors generated in `latency-monitor`.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("data provider failed: {0}")]
    Provider(String),

    #[error("no filtered rows to export")]
    NothingToExport,

    #[error("invalid display window: start {start} is not before end {end}")]
    InvalidWindow {
        start: chrono::NaiveTime,
        end: chrono::NaiveTime,
    },

    #[error("column {0} holds numeric values and cannot be used as a group key")]
    NotGroupable(Column),

    #[error("column {0} holds text values and has no numeric range")]
    NotNumeric(Column),
}

impl MonitorError {
    /// Determine if an error was raised by an explicit user action (load, save, export)
    /// and should therefore be surfaced instead of only logged.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_user_facing(&self) -> bool {
        match self {
            MonitorError::Io(_)
            | MonitorError::Json(_)
            | MonitorError::Csv(_)
            | MonitorError::InvalidSettings(_)
            | MonitorError::NothingToExport => true,
            _ => false,
        }
    }
}
