use super::{DocumentDaoError, ErrorKind};

/// Domain-model repository errors.
#[derive(Debug, thiserror::Error)]
pub enum DomainRepoError {
    #[error("no domain model named '{schema_name}'")]
    NotFound { schema_name: String },

    #[error("a domain model named '{schema_name}' already exists")]
    AlreadyExists { schema_name: String },

    /// Schema validation failure. `detail` carries the JSON-Schema path, the
    /// offending instance snippet and the relevant schema fragment.
    #[error("domain model '{schema_name}' failed validation: {detail}")]
    Validation { schema_name: String, detail: String },

    #[error("argument '{argument}' must be {expected}, got {actual}")]
    ArgumentType {
        argument: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Dao(#[from] DocumentDaoError),
}

impl DomainRepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainRepoError::NotFound { .. } => ErrorKind::NotFound,
            DomainRepoError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            DomainRepoError::Validation { .. } => ErrorKind::Validation,
            DomainRepoError::ArgumentType { .. } => ErrorKind::ArgumentType,
            DomainRepoError::Dao(inner) => inner.kind(),
        }
    }
}
