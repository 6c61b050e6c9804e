//! Bounded FIFO queue and fixed pool of execution slots.
//!
//! Submission reserves room in the queue before a record is created, so a
//! full queue rejects the request instead of leaving an orphaned `queued`
//! record. Room is counted in live queued tasks: it is handed back with
//! [`TaskQueue::release`] when a task leaves the `queued` state, either by
//! being dispatched or by being cancelled, even though a cancelled task's
//! id still sits in the channel until a slot skips it.
//!
//! `slots` loops share the receiving end and each executes one task at a
//! time, which bounds the number of concurrently running tasks. The loops
//! are spawned on a [`TaskTracker`] and exit when the stop token fires or
//! the dispatcher has been dropped; a slot that is mid-task finishes (or is
//! aborted) first.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, Semaphore, SemaphorePermit, TryAcquireError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::TaskError;
use crate::types::TaskId;

/// Executes one dequeued task on a slot.
#[async_trait]
pub trait Dispatch: Send + Sync + 'static {
    /// Runs `task_id` to completion on `slot`.
    async fn dispatch(self: Arc<Self>, slot: usize, task_id: TaskId);
}

/// Sending side of the task queue.
#[derive(Debug)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<TaskId>,
    /// One permit per task that may still wait in the `queued` state.
    room: Semaphore,
    capacity: usize,
}

impl TaskQueue {
    /// Creates a queue holding at most `capacity` waiting tasks.
    pub fn bounded(capacity: usize) -> (Self, mpsc::UnboundedReceiver<TaskId>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                room: Semaphore::new(capacity),
                capacity,
            },
            receiver,
        )
    }

    /// Reserves room for one task without blocking.
    ///
    /// # Errors
    ///
    /// - [`TaskError::CapacityExhausted`] when the queue is full
    /// - [`TaskError::ShuttingDown`] when the slots are gone
    pub fn reserve(&self) -> Result<Reservation<'_>, TaskError> {
        if self.sender.is_closed() {
            return Err(TaskError::ShuttingDown);
        }
        let permit = self.room.try_acquire().map_err(|err| match err {
            TryAcquireError::NoPermits => TaskError::CapacityExhausted {
                capacity: self.capacity,
            },
            TryAcquireError::Closed => TaskError::ShuttingDown,
        })?;
        Ok(Reservation {
            sender: &self.sender,
            permit,
        })
    }

    /// Hands back the room of a task that left the `queued` state.
    ///
    /// Must be called exactly once per sent task; the manager does so on
    /// the committed `queued -> running` or `queued -> cancelled` transition.
    pub fn release(&self) {
        self.room.add_permits(1);
    }

    /// Maximum number of waiting tasks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live waiting tasks (including reserved room).
    pub fn depth(&self) -> usize {
        self.capacity.saturating_sub(self.room.available_permits())
    }
}

/// Room taken in a [`TaskQueue`] for one task that is not sent yet.
///
/// Dropping it unsent gives the room back.
#[derive(Debug)]
pub struct Reservation<'a> {
    sender: &'a mpsc::UnboundedSender<TaskId>,
    permit: SemaphorePermit<'a>,
}

impl Reservation<'_> {
    /// Enqueues `task_id`. Its room stays taken until
    /// [`TaskQueue::release`].
    ///
    /// # Errors
    ///
    /// [`TaskError::ShuttingDown`] when the slots are gone; the room is
    /// given back.
    pub fn send(self, task_id: TaskId) -> Result<(), TaskError> {
        self.sender
            .send(task_id)
            .map_err(|_| TaskError::ShuttingDown)?;
        self.permit.forget();
        Ok(())
    }
}

/// Spawns `slots` execution loops draining `receiver` in FIFO order.
///
/// The loops only hold a weak reference to `dispatcher`; once it is gone
/// they stop taking work.
pub fn spawn_slots<D: Dispatch>(
    tracker: &TaskTracker,
    slots: usize,
    receiver: mpsc::UnboundedReceiver<TaskId>,
    dispatcher: Weak<D>,
    stop: CancellationToken,
) {
    let receiver = Arc::new(Mutex::new(receiver));
    for slot in 0..slots.max(1) {
        tracker.spawn(slot_loop(
            slot,
            Arc::clone(&receiver),
            Weak::clone(&dispatcher),
            stop.clone(),
        ));
    }
}

async fn slot_loop<D: Dispatch>(
    slot: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<TaskId>>>,
    dispatcher: Weak<D>,
    stop: CancellationToken,
) {
    tracing::debug!(slot, "execution slot started");
    loop {
        let next = tokio::select! {
            biased;
            () = stop.cancelled() => None,
            task_id = async { receiver.lock().await.recv().await } => task_id,
        };
        let Some(task_id) = next else {
            break;
        };
        let Some(dispatcher) = dispatcher.upgrade() else {
            break;
        };
        dispatcher.dispatch(slot, task_id).await;
    }
    tracing::debug!(slot, "execution slot stopped");
}
