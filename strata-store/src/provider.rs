//! Unit-of-work provider: the long-lived factory binding projects to their
//! databases, filesystem prefixes and in-memory partitions.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use strata_core::config::StoreConfig;
use strata_core::constants::{
    DATA_NAME, DOMAIN_MODELS_COLLECTION, RECORDS_COLLECTION, SCHEMA_NAME, SCHEMA_REF,
};
use strata_core::errors::{DataRepoError, DomainRepoError, UnitOfWorkError};
use strata_core::time::MonotonicClock;
use strata_core::traits::{DataFileAdapter, DocumentStore, FileSystem, SchemaResolver};

use crate::adapters::AdapterRegistry;
use crate::backends::ScopedFileSystem;
use crate::dao::{DocumentDao, FileSystemDao, InMemoryObjectDao};
use crate::repo::{DataRepository, DomainModelRepository, InMemoryObjectRepository};
use crate::uow::UnitOfWork;

/// Process-wide in-memory object store, partitioned by project.
#[derive(Default)]
pub struct MemoryObjectStore {
    projects: DashMap<String, Arc<Mutex<InMemoryObjectDao>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The partition for one project, created on first access.
    pub fn project(&self, name: &str) -> Arc<Mutex<InMemoryObjectDao>> {
        self.projects
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(InMemoryObjectDao::new())))
            .clone()
    }
}

/// Factory producing a fresh [`UnitOfWork`] bound to a project. Holds the
/// long-lived client handles; everything else is created per unit of work.
pub struct UnitOfWorkProvider {
    documents: Arc<dyn DocumentStore>,
    filesystem: Arc<dyn FileSystem>,
    memory: Arc<MemoryObjectStore>,
    registry: Arc<AdapterRegistry>,
    config: StoreConfig,
}

impl UnitOfWorkProvider {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        filesystem: Arc<dyn FileSystem>,
        memory: Arc<MemoryObjectStore>,
        config: StoreConfig,
    ) -> Self {
        UnitOfWorkProvider {
            documents,
            filesystem,
            memory,
            registry: Arc::new(AdapterRegistry::with_builtins()),
            config,
        }
    }

    /// Register an additional file-format adapter for all future units of
    /// work.
    pub fn register_adapter(&self, adapter: Arc<dyn DataFileAdapter>) {
        self.registry.register(adapter);
    }

    pub fn adapter_registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// A fresh unit of work for `project_name`: its own document-store
    /// database, filesystem subdirectory and in-memory partition.
    pub fn unit_of_work(&self, project_name: &str) -> Result<UnitOfWork, UnitOfWorkError> {
        validate_project_name(project_name)?;

        let clock = Arc::new(MonotonicClock::system());
        let database = self.documents.database(project_name);

        let model_dao = DocumentDao::new(
            database.collection(DOMAIN_MODELS_COLLECTION),
            vec![SCHEMA_NAME.to_string()],
        )
        .map_err(DomainRepoError::from)?;
        let record_dao = DocumentDao::new(
            database.collection(RECORDS_COLLECTION),
            vec![SCHEMA_REF.to_string(), DATA_NAME.to_string()],
        )
        .map_err(DataRepoError::from)?;

        let prefix = match &self.config.root_prefix {
            Some(root) => format!("{root}/{project_name}"),
            None => project_name.to_string(),
        };
        let scoped: Arc<dyn FileSystem> =
            Arc::new(ScopedFileSystem::new(self.filesystem.clone(), prefix));
        let file_dao = FileSystemDao::new(
            scoped,
            self.registry.clone(),
            self.config.default_file_type.clone(),
        )
        .with_millisecond_fallback(self.config.millisecond_fallback);

        let domain_models = Arc::new(DomainModelRepository::new(model_dao, clock.clone()));
        let data = DataRepository::new(
            record_dao,
            file_dao,
            domain_models.clone() as Arc<dyn SchemaResolver>,
            self.registry.clone(),
            self.config.default_file_type.clone(),
            clock.clone(),
        );
        let memory =
            InMemoryObjectRepository::new(self.memory.project(project_name), clock);

        tracing::debug!(project = %project_name, "created unit of work");
        Ok(UnitOfWork::new(domain_models, data, memory))
    }
}

fn validate_project_name(project_name: &str) -> Result<(), UnitOfWorkError> {
    let valid = !project_name.is_empty()
        && project_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(UnitOfWorkError::ArgumentValue {
            argument: "project_name".to_string(),
            message: format!(
                "'{project_name}' must be a non-empty string of alphanumerics, underscores or dashes"
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_names_are_validated() {
        assert!(validate_project_name("demo").is_ok());
        assert!(validate_project_name("demo_2-a").is_ok());
        assert!(validate_project_name("").is_err());
        assert!(validate_project_name("../escape").is_err());
        assert!(validate_project_name("has space").is_err());
    }
}
