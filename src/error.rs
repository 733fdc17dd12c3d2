use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// A record already exists under this dealer id.
    AlreadyExists(String),
    /// No record is stored under this dealer id.
    NotFound(String),
    /// A numeric field could not be parsed as a finite decimal.
    InvalidNumber { field: &'static str, input: String },
    /// Stored bytes do not decode to the expected shape.
    Corrupt(String),
    Storage(String),
}

impl LedgerError {
    /// HTTP status an API facade should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AlreadyExists(_) => 409,
            Self::NotFound(_) => 404,
            Self::InvalidNumber { .. } => 400,
            Self::Corrupt(_) | Self::Storage(_) => 500,
        }
    }
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists(id) => write!(f, "Asset {} already exists", id),
            Self::NotFound(id) => write!(f, "Asset {} does not exist", id),
            Self::InvalidNumber { field, input } => {
                write!(f, "Invalid {}: {:?} is not a decimal number", field, input)
            }
            Self::Corrupt(msg) => write!(f, "Corrupt record: {}", msg),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}
