//! In-memory task store.
//!
//! [`InMemoryTaskStore`] keeps records in a [`DashMap`]. A
//! compare-and-transition holds the record's shard write lock for the whole
//! check-mutate-validate-commit sequence, so commits to one record are
//! linearizable while unrelated records proceed in parallel.
//!
//! # Examples
//!
//! ```
//! use research_tasks::store::{InMemoryTaskStore, TaskStore};
//! use research_tasks::{TaskInput, TaskState};
//!
//! let store = InMemoryTaskStore::new();
//! let record = store.create(TaskInput::new("borrow checker")).unwrap();
//!
//! let running = store
//!     .compare_and_transition(
//!         &record.id,
//!         TaskState::Queued,
//!         Box::new(|r| r.start(chrono::Utc::now())),
//!     )
//!     .unwrap();
//! assert_eq!(running.state, TaskState::Running);
//! assert_eq!(running.version, 2);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::constants::MAX_ID_ATTEMPTS;
use crate::domain::TaskRecord;
use crate::error::{TaskError, TransitionError};
use crate::types::{StateCounts, TaskId, TaskInput, TaskState};

use super::{Mutation, TaskStore};

type IdGenerator = Arc<dyn Fn() -> TaskId + Send + Sync>;

/// Thread-safe in-memory [`TaskStore`].
pub struct InMemoryTaskStore {
    records: DashMap<TaskId, TaskRecord>,
    sequence: AtomicU64,
    id_generator: IdGenerator,
}

impl InMemoryTaskStore {
    /// Creates an empty store generating random v4 identifiers.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            sequence: AtomicU64::new(0),
            id_generator: Arc::new(TaskId::new),
        }
    }

    /// Replaces the identifier source.
    pub fn with_id_generator(
        mut self,
        generator: impl Fn() -> TaskId + Send + Sync + 'static,
    ) -> Self {
        self.id_generator = Arc::new(generator);
        self
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryTaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTaskStore")
            .field("records", &self.records.len())
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn create(&self, input: TaskInput) -> Result<TaskRecord, TaskError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = (self.id_generator)();
            match self.records.entry(id) {
                Entry::Occupied(_) => {
                    tracing::warn!(task_id = %id, "generated task id collided, retrying");
                },
                Entry::Vacant(slot) => {
                    let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
                    let record = TaskRecord::new(id, input, sequence);
                    slot.insert(record.clone());
                    return Ok(record);
                },
            }
        }
        tracing::error!(attempts = MAX_ID_ATTEMPTS, "could not allocate a unique task id");
        Err(TaskError::IdSpaceExhausted)
    }

    fn get(&self, id: &TaskId) -> Result<TaskRecord, TaskError> {
        self.records
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(TaskError::NotFound { task_id: *id })
    }

    fn compare_and_transition(
        &self,
        id: &TaskId,
        expected: TaskState,
        mutation: Mutation<'_>,
    ) -> Result<TaskRecord, TransitionError> {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or(TransitionError::NotFound { task_id: *id })?;

        let current = entry.value();
        if current.state != expected {
            return Err(TransitionError::StaleState {
                task_id: *id,
                expected,
                actual: current.state,
            });
        }

        let mut working = current.clone();
        mutation(&mut working);
        working.check_commit(current)?;
        working.version = current.version + 1;

        *entry.value_mut() = working.clone();
        Ok(working)
    }

    fn list(&self, filter: Option<TaskState>) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self
            .records
            .iter()
            .filter(|entry| filter.is_none_or(|state| entry.state == state))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|r| (r.created_at, r.sequence));
        records
    }

    fn delete(&self, id: &TaskId) -> Result<(), TaskError> {
        self.records
            .remove(id)
            .map(|_| ())
            .ok_or(TaskError::NotFound { task_id: *id })
    }

    fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let expired = record.is_terminal()
                && record.finished_at.is_some_and(|finished| finished < cutoff);
            if expired {
                removed += 1;
            }
            !expired
        });
        removed
    }

    fn count_by_state(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for entry in self.records.iter() {
            counts.record(entry.state);
        }
        counts
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
