use super::{BackendError, ErrorKind};

/// Document-store DAO errors.
#[derive(Debug, thiserror::Error)]
pub enum DocumentDaoError {
    #[error("no live document in '{collection}' for identity {identity}")]
    NotFound { collection: String, identity: String },

    #[error("a live document already exists in '{collection}' for identity {identity}")]
    AlreadyExists { collection: String, identity: String },

    #[error("nth_most_recent {requested} is out of range: {available} tombstones for identity {identity}")]
    Range {
        requested: i64,
        available: usize,
        identity: String,
    },

    #[error("argument '{argument}' must be {expected}, got {actual}")]
    ArgumentType {
        argument: String,
        expected: String,
        actual: String,
    },

    #[error("unknown index field '{argument}'; this collection is indexed by {allowed}")]
    ArgumentName { argument: String, allowed: String },

    #[error("argument '{argument}' is invalid: {message}")]
    ArgumentValue { argument: String, message: String },

    #[error("document-store backend failure during {operation}: {source}")]
    Backend {
        operation: String,
        #[source]
        source: BackendError,
    },
}

impl DocumentDaoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocumentDaoError::NotFound { .. } => ErrorKind::NotFound,
            DocumentDaoError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            DocumentDaoError::Range { .. } => ErrorKind::Range,
            DocumentDaoError::ArgumentType { .. } => ErrorKind::ArgumentType,
            DocumentDaoError::ArgumentName { .. } => ErrorKind::ArgumentName,
            DocumentDaoError::ArgumentValue { .. } => ErrorKind::ArgumentValue,
            DocumentDaoError::Backend { .. } => ErrorKind::Uncaught,
        }
    }
}
