use super::{
    DataRepoError, DocumentDaoError, DomainRepoError, ErrorKind, FileDaoError, MemoryDaoError,
    MemoryRepoError, UnitOfWorkError,
};

/// Top-level error type for the strata store.
/// All layer errors convert into this via `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum StrataError {
    #[error("document store: {0}")]
    DocumentDao(#[from] DocumentDaoError),

    #[error("filesystem: {0}")]
    FileDao(#[from] FileDaoError),

    #[error("in-memory store: {0}")]
    MemoryDao(#[from] MemoryDaoError),

    #[error("domain-model repository: {0}")]
    DomainRepo(#[from] DomainRepoError),

    #[error("data repository: {0}")]
    DataRepo(#[from] DataRepoError),

    #[error("in-memory repository: {0}")]
    MemoryRepo(#[from] MemoryRepoError),

    #[error("unit of work: {0}")]
    UnitOfWork(#[from] UnitOfWorkError),

    #[error("config: {0}")]
    Config(String),
}

impl StrataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::DocumentDao(inner) => inner.kind(),
            StrataError::FileDao(inner) => inner.kind(),
            StrataError::MemoryDao(inner) => inner.kind(),
            StrataError::DomainRepo(inner) => inner.kind(),
            StrataError::DataRepo(inner) => inner.kind(),
            StrataError::MemoryRepo(inner) => inner.kind(),
            StrataError::UnitOfWork(inner) => inner.kind(),
            StrataError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Convenience type alias.
pub type StrataResult<T> = Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_preserved_through_the_top_level_wrapper() {
        let err: StrataError = DocumentDaoError::NotFound {
            collection: "records".into(),
            identity: "schema_ref=animal".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: StrataError = UnitOfWorkError::Context.into();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn nested_layer_errors_keep_their_kind() {
        let dao = DocumentDaoError::AlreadyExists {
            collection: "domain_models".into(),
            identity: "schema_name=animal".into(),
        };
        let repo: DomainRepoError = dao.into();
        assert_eq!(repo.kind(), ErrorKind::AlreadyExists);
        let top: StrataError = repo.into();
        assert_eq!(top.kind(), ErrorKind::AlreadyExists);
    }
}
