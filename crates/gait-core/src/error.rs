//! Error types for the gait-cycle engine.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Schema error: missing required column(s) {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Column '{column}' has the wrong type: expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },

    #[error("Column '{column}' length mismatch: expected {expected} rows, got {actual}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Dimension error for ({subject}, {task}): {rows} rows is not a multiple of {points_per_cycle} points per cycle"
    )]
    Dimension {
        subject: String,
        task: String,
        rows: usize,
        points_per_cycle: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Table source error: {0}")]
    Source(String),
}

impl Error {
    pub fn schema<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Error::Schema {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// True for construction-time schema failures.
    pub fn is_schema(&self) -> bool {
        matches!(
            self,
            Error::Schema { .. } | Error::ColumnType { .. } | Error::ColumnLength { .. }
        )
    }

    /// True when a (subject, task) row count does not split into whole cycles.
    pub fn is_dimension(&self) -> bool {
        matches!(self, Error::Dimension { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
