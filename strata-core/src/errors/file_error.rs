use super::ErrorKind;

/// Filesystem DAO and data-file adapter errors.
#[derive(Debug, thiserror::Error)]
pub enum FileDaoError {
    #[error("no live data file for {identity}")]
    NotFound { identity: String },

    #[error("data file already exists at '{path}'")]
    AlreadyExists { path: String },

    #[error("nth_most_recent {requested} is out of range: {available} candidates for {identity}")]
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

    #[error("argument '{argument}' is invalid: {message}")]
    ArgumentValue { argument: String, message: String },

    #[error("no adapter registered for file format '{format}'")]
    UnknownFormat { format: String },

    #[error("corrupt data file at '{path}': {detail}")]
    Corrupt { path: String, detail: String },

    #[error("filesystem failure during {operation} on '{path}': {source}")]
    Io {
        operation: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FileDaoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FileDaoError::NotFound { .. } => ErrorKind::NotFound,
            FileDaoError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            FileDaoError::Range { .. } => ErrorKind::Range,
            FileDaoError::ArgumentType { .. } => ErrorKind::ArgumentType,
            FileDaoError::ArgumentValue { .. } => ErrorKind::ArgumentValue,
            FileDaoError::UnknownFormat { .. } => ErrorKind::Config,
            FileDaoError::Corrupt { .. } | FileDaoError::Io { .. } => ErrorKind::Uncaught,
        }
    }

    /// Wrap an I/O failure with operation context.
    pub fn io(operation: &str, path: &str, source: std::io::Error) -> Self {
        FileDaoError::Io {
            operation: operation.to_string(),
            path: path.to_string(),
            source,
        }
    }
}
