//! Unit of work: the transaction boundary over the three repositories.
//!
//! A scope is entered with [`UnitOfWork::run`]; repository accessors refuse
//! to hand out handles outside one. Unless `commit` is called, leaving the
//! scope rolls back every pending mutation — on success, error and panic
//! paths alike.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use strata_core::errors::UnitOfWorkError;
use strata_core::models::OperationEntry;

use crate::repo::{DataRepository, DomainModelRepository, InMemoryObjectRepository};

/// Snapshot of the three operation histories, as returned by `commit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationLedger {
    pub domain_models: Vec<OperationEntry>,
    pub data: Vec<OperationEntry>,
    pub memory: Vec<OperationEntry>,
}

impl OperationLedger {
    pub fn is_empty(&self) -> bool {
        self.domain_models.is_empty() && self.data.is_empty() && self.memory.is_empty()
    }

    pub fn len(&self) -> usize {
        self.domain_models.len() + self.data.len() + self.memory.len()
    }
}

/// Single-threaded cooperative transaction scope. Not safe for concurrent
/// use; parallelism belongs across projects, not within one unit of work.
pub struct UnitOfWork {
    domain_models: Arc<DomainModelRepository>,
    data: DataRepository,
    memory: InMemoryObjectRepository,
    in_context: bool,
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork").finish_non_exhaustive()
    }
}

impl UnitOfWork {
    pub fn new(
        domain_models: Arc<DomainModelRepository>,
        data: DataRepository,
        memory: InMemoryObjectRepository,
    ) -> Self {
        UnitOfWork {
            domain_models,
            data,
            memory,
            in_context: false,
        }
    }

    pub fn in_context(&self) -> bool {
        self.in_context
    }

    pub fn domain_models(&self) -> Result<&DomainModelRepository, UnitOfWorkError> {
        self.guard()?;
        Ok(&self.domain_models)
    }

    pub fn data(&self) -> Result<&DataRepository, UnitOfWorkError> {
        self.guard()?;
        Ok(&self.data)
    }

    pub fn memory(&self) -> Result<&InMemoryObjectRepository, UnitOfWorkError> {
        self.guard()?;
        Ok(&self.memory)
    }

    /// Execute `f` inside a fresh scope.
    ///
    /// Histories are cleared on entry. On exit, every mutation still pending
    /// in the histories is rolled back — also when `f` returned an error or
    /// panicked. `commit` clears the histories, so committed work survives
    /// and only post-commit mutations unwind. A rollback failure after a
    /// successful `f` is returned; after a failed `f` it is logged and the
    /// original error wins.
    pub fn run<T, E>(&mut self, f: impl FnOnce(&mut UnitOfWork) -> Result<T, E>) -> Result<T, E>
    where
        E: From<UnitOfWorkError>,
    {
        self.enter();
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        let cleanup = self.leave();
        match outcome {
            Err(payload) => {
                if let Err(e) = cleanup {
                    tracing::warn!(error = %e, "rollback failed while unwinding a panic");
                }
                std::panic::resume_unwind(payload)
            }
            Ok(Ok(value)) => {
                cleanup?;
                Ok(value)
            }
            Ok(Err(error)) => {
                if let Err(e) = cleanup {
                    tracing::warn!(error = %e, "rollback failed on the error path");
                }
                Err(error)
            }
        }
    }

    /// Snapshot and clear the operation histories; the pending mutations
    /// become permanent and the snapshot is handed to the caller.
    pub fn commit(&mut self) -> Result<OperationLedger, UnitOfWorkError> {
        self.guard()?;
        let ledger = OperationLedger {
            domain_models: self.domain_models.operation_history(),
            data: self.data.operation_history(),
            memory: self.memory.operation_history(),
        };
        self.clear_histories();
        tracing::debug!(operations = ledger.len(), "committed unit of work");
        Ok(ledger)
    }

    /// Invert every pending mutation. Repositories are unwound in-memory
    /// first, then data, then domain models, so dangling references between
    /// them resolve safely.
    pub fn rollback(&self) -> Result<(), UnitOfWorkError> {
        self.guard()?;
        self.rollback_unchecked()
    }

    /// Fan a purge out to all three repositories.
    pub fn purge(&self, time_threshold: Option<DateTime<Utc>>) -> Result<(), UnitOfWorkError> {
        self.guard()?;
        self.memory.purge(time_threshold);
        self.data.purge(time_threshold)?;
        self.domain_models.purge(time_threshold)?;
        Ok(())
    }

    fn enter(&mut self) {
        self.in_context = true;
        self.clear_histories();
    }

    /// The release path: rolls back whatever is still pending, then closes
    /// the scope.
    fn leave(&mut self) -> Result<(), UnitOfWorkError> {
        let result = self.rollback_unchecked();
        self.in_context = false;
        result
    }

    fn rollback_unchecked(&self) -> Result<(), UnitOfWorkError> {
        self.memory.undo_all()?;
        self.data.undo_all()?;
        self.domain_models.undo_all()?;
        self.clear_histories();
        Ok(())
    }

    fn clear_histories(&self) {
        self.domain_models.clear_operation_history();
        self.data.clear_operation_history();
        self.memory.clear_operation_history();
    }

    fn guard(&self) -> Result<(), UnitOfWorkError> {
        if self.in_context {
            Ok(())
        } else {
            Err(UnitOfWorkError::Context)
        }
    }
}
