use super::ErrorKind;

/// In-memory object DAO errors.
#[derive(Debug, thiserror::Error)]
pub enum MemoryDaoError {
    #[error("no object registered under tag '{tag}'")]
    NotFound { tag: String },

    #[error("an object is already registered under tag '{tag}'")]
    TagAlreadyExists { tag: String },

    #[error("object {object_id} is already registered under tag '{tag}'")]
    ObjectAlreadyExists { object_id: String, tag: String },

    #[error("argument '{argument}' is invalid: {message}")]
    ArgumentValue { argument: String, message: String },
}

impl MemoryDaoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemoryDaoError::NotFound { .. } => ErrorKind::NotFound,
            MemoryDaoError::TagAlreadyExists { .. }
            | MemoryDaoError::ObjectAlreadyExists { .. } => ErrorKind::AlreadyExists,
            MemoryDaoError::ArgumentValue { .. } => ErrorKind::ArgumentValue,
        }
    }
}

/// In-memory repository errors.
#[derive(Debug, thiserror::Error)]
pub enum MemoryRepoError {
    #[error(transparent)]
    Dao(#[from] MemoryDaoError),
}

impl MemoryRepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemoryRepoError::Dao(inner) => inner.kind(),
        }
    }
}
