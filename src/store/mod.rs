//! Task storage.
//!
//! [`TaskStore`] is the single source of truth for task records. Readers get
//! value snapshots; the only write path after creation is
//! [`compare_and_transition`](TaskStore::compare_and_transition), which
//! checks the expected state, applies a mutation to a working copy,
//! validates it and commits atomically per record.
//!
//! [`InMemoryTaskStore`] is the provided implementation.

pub mod memory;

pub use memory::InMemoryTaskStore;

use chrono::{DateTime, Utc};

use crate::domain::TaskRecord;
use crate::error::{TaskError, TransitionError};
use crate::types::{StateCounts, TaskId, TaskInput, TaskState};

/// A mutation applied to a working copy of a record.
pub type Mutation<'a> = Box<dyn FnOnce(&mut TaskRecord) + Send + 'a>;

/// Concurrency-safe keyed container of task records.
///
/// Implementations must make [`compare_and_transition`](Self::compare_and_transition)
/// linearizable per record: two concurrent calls for the same id never both
/// succeed from the same observed state.
pub trait TaskStore: Send + Sync {
    /// Allocates a fresh id and inserts a queued record for `input`.
    ///
    /// # Errors
    ///
    /// [`TaskError::IdSpaceExhausted`] if identifier generation keeps colliding.
    fn create(&self, input: TaskInput) -> Result<TaskRecord, TaskError>;

    /// Returns a snapshot of the record.
    fn get(&self, id: &TaskId) -> Result<TaskRecord, TaskError>;

    /// Atomically applies `mutation` if the record is currently in `expected`.
    ///
    /// The mutated copy is validated against the state machine and the
    /// record invariants before it replaces the stored record, and its
    /// `version` is bumped. On any error the stored record is untouched.
    fn compare_and_transition(
        &self,
        id: &TaskId,
        expected: TaskState,
        mutation: Mutation<'_>,
    ) -> Result<TaskRecord, TransitionError>;

    /// Snapshots of all records (optionally in one state), oldest first.
    fn list(&self, filter: Option<TaskState>) -> Vec<TaskRecord>;

    /// Removes a record regardless of state.
    fn delete(&self, id: &TaskId) -> Result<(), TaskError>;

    /// Removes terminal records that finished before `cutoff`.
    ///
    /// Returns the number of records removed. Live records are never purged.
    fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> usize;

    /// Number of records per state.
    fn count_by_state(&self) -> StateCounts;

    /// Total number of records.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
