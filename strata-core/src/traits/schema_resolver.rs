//! Open-world schema lookup used during record validation.

use crate::errors::DomainRepoError;
use crate::models::DomainModel;

/// Resolves schema names to live, valid domain models.
///
/// Implemented by the domain-model repository; the data repository depends on
/// this interface only. Resolution is lazy and by name, so domain models may
/// reference each other without cyclic ownership.
pub trait SchemaResolver: Send + Sync {
    /// The live domain model for `schema_name`, or `None` if absent.
    /// A stored-but-invalid model is an error, not `None`.
    fn resolve(&self, schema_name: &str) -> Result<Option<DomainModel>, DomainRepoError>;
}
