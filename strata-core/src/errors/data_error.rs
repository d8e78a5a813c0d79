use super::{DocumentDaoError, DomainRepoError, ErrorKind, FileDaoError};

/// Data repository errors.
#[derive(Debug, thiserror::Error)]
pub enum DataRepoError {
    #[error("no record for {identity}")]
    NotFound { identity: String },

    #[error("a live record already exists for {identity}")]
    AlreadyExists { identity: String },

    /// Record validation failure. `detail` carries the JSON-Schema path, the
    /// offending property and the instance snippet.
    #[error("record {identity} failed validation: {detail}")]
    Validation { identity: String, detail: String },

    #[error("argument '{argument}' must be {expected}, got {actual}")]
    ArgumentType {
        argument: String,
        expected: String,
        actual: String,
    },

    #[error("argument '{argument}' is invalid: {message}")]
    ArgumentValue { argument: String, message: String },

    #[error(transparent)]
    Document(#[from] DocumentDaoError),

    #[error(transparent)]
    File(#[from] FileDaoError),

    #[error(transparent)]
    Domain(#[from] DomainRepoError),
}

impl DataRepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataRepoError::NotFound { .. } => ErrorKind::NotFound,
            DataRepoError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            DataRepoError::Validation { .. } => ErrorKind::Validation,
            DataRepoError::ArgumentType { .. } => ErrorKind::ArgumentType,
            DataRepoError::ArgumentValue { .. } => ErrorKind::ArgumentValue,
            DataRepoError::Document(inner) => inner.kind(),
            DataRepoError::File(inner) => inner.kind(),
            DataRepoError::Domain(inner) => inner.kind(),
        }
    }
}
