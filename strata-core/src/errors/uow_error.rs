use super::{DataRepoError, DomainRepoError, ErrorKind, MemoryRepoError};

/// Unit-of-work and provider errors.
#[derive(Debug, thiserror::Error)]
pub enum UnitOfWorkError {
    /// A repository accessor was used outside an active scope.
    #[error("the unit of work is not in scope; wrap calls in UnitOfWork::run")]
    Context,

    #[error("argument '{argument}' is invalid: {message}")]
    ArgumentValue { argument: String, message: String },

    #[error(transparent)]
    Domain(#[from] DomainRepoError),

    #[error(transparent)]
    Data(#[from] DataRepoError),

    #[error(transparent)]
    Memory(#[from] MemoryRepoError),
}

impl UnitOfWorkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UnitOfWorkError::Context => ErrorKind::Config,
            UnitOfWorkError::ArgumentValue { .. } => ErrorKind::ArgumentValue,
            UnitOfWorkError::Domain(inner) => inner.kind(),
            UnitOfWorkError::Data(inner) => inner.kind(),
            UnitOfWorkError::Memory(inner) => inner.kind(),
        }
    }
}
