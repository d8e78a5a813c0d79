mod backend_error;
mod data_error;
mod document_error;
mod domain_error;
mod file_error;
mod kind;
mod memory_error;
mod strata_error;
mod uow_error;

pub use backend_error::BackendError;
pub use data_error::DataRepoError;
pub use document_error::DocumentDaoError;
pub use domain_error::DomainRepoError;
pub use file_error::FileDaoError;
pub use kind::ErrorKind;
pub use memory_error::{MemoryDaoError, MemoryRepoError};
pub use strata_error::{StrataError, StrataResult};
pub use uow_error::UnitOfWorkError;
