use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read relation '{relation}': {message}")]
    SourceRead { relation: String, message: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid rule table: {0}")]
    InvalidRuleTable(String),

    #[error("Balance mismatch for {account} on {date}: derived beginning ({derived}) != historical balance ({independent})")]
    BalanceMismatch {
        account: String,
        date: String,
        derived: f64,
        independent: f64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub fn source_read(relation: impl Into<String>, message: impl ToString) -> Self {
        Self::SourceRead {
            relation: relation.into(),
            message: message.to_string(),
        }
    }

    /// HTTP-equivalent status a consuming layer should attach to the failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidParameter(_) => 400,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
