use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Storage,
    Import,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported schema version {0}")]
    UnsupportedSchemaVersion(String),

    #[error("corrupt export document: {0}")]
    CorruptExport(String),
}

impl StateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StateError::Validation(_) => ErrorKind::Validation,
            StateError::UnsupportedSchemaVersion(_) | StateError::CorruptExport(_) => ErrorKind::Import,
            StateError::Sqlite(_) | StateError::Io(_) => ErrorKind::Storage,
        }
    }
}
