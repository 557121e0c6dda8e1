//! Node state, read handles, and settable input cells.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::error::{GraphError, GraphResult};

/// Lifecycle of a derived value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Complete,
    Error,
}

#[derive(Debug)]
pub(crate) enum Slot<T> {
    Pending,
    Ready(Arc<T>),
    Failed(GraphError),
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        match self {
            Slot::Pending => Slot::Pending,
            Slot::Ready(value) => Slot::Ready(Arc::clone(value)),
            Slot::Failed(error) => Slot::Failed(error.clone()),
        }
    }
}

/// Snapshot of a node's published state.
///
/// `revision` advances on every published transition; `generation` advances
/// only when a new value is successfully published. Dependents decide whether
/// to recompute by comparing generations, never timestamps.
#[derive(Debug)]
pub struct NodeState<T> {
    pub(crate) revision: u64,
    pub(crate) generation: u64,
    pub(crate) slot: Slot<T>,
}

impl<T> Clone for NodeState<T> {
    fn clone(&self) -> Self {
        Self {
            revision: self.revision,
            generation: self.generation,
            slot: self.slot.clone(),
        }
    }
}

impl<T> NodeState<T> {
    pub(crate) fn initial() -> Self {
        Self {
            revision: 0,
            generation: 0,
            slot: Slot::Pending,
        }
    }

    pub fn status(&self) -> NodeStatus {
        match self.slot {
            Slot::Pending => NodeStatus::Pending,
            Slot::Ready(_) => NodeStatus::Complete,
            Slot::Failed(_) => NodeStatus::Error,
        }
    }

    pub fn value(&self) -> Option<Arc<T>> {
        match &self.slot {
            Slot::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&GraphError> {
        match &self.slot {
            Slot::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Read handle to a node. Cheap to clone; shared by dependents and consumers.
#[derive(Debug)]
pub struct NodeHandle<T> {
    pub(crate) name: Arc<str>,
    pub(crate) rx: watch::Receiver<NodeState<T>>,
}

impl<T> Clone for NodeHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            rx: self.rx.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> NodeHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current snapshot of status, value/error, and counters.
    pub fn state(&self) -> NodeState<T> {
        self.rx.borrow().clone()
    }

    pub fn status(&self) -> NodeStatus {
        self.rx.borrow().status()
    }

    pub fn is_complete(&self) -> bool {
        self.status() == NodeStatus::Complete
    }

    pub fn generation(&self) -> u64 {
        self.rx.borrow().generation
    }

    pub fn revision(&self) -> u64 {
        self.rx.borrow().revision
    }

    /// Current value. `NotReady` while Pending; a failed node re-raises its
    /// stored error without recomputation.
    pub fn get(&self) -> GraphResult<Arc<T>> {
        let state = self.rx.borrow();
        match &state.slot {
            Slot::Pending => Err(GraphError::NotReady(self.name.to_string())),
            Slot::Ready(value) => Ok(Arc::clone(value)),
            Slot::Failed(error) => Err(error.clone()),
        }
    }

    /// Waits until the node settles (Complete or Error), then reads it.
    pub async fn resolved(&self) -> GraphResult<Arc<T>> {
        let mut rx = self.rx.clone();
        loop {
            {
                let state = rx.borrow_and_update();
                match &state.slot {
                    Slot::Pending => {}
                    Slot::Ready(value) => return Ok(Arc::clone(value)),
                    Slot::Failed(error) => return Err(error.clone()),
                }
            }
            if rx.changed().await.is_err() {
                // graph torn down while still pending
                return Err(GraphError::NotReady(self.name.to_string()));
            }
        }
    }

    /// Waits for a settled publication newer than `revision`, then reads it.
    /// Lets callers observe the effect of an input change: capture
    /// [`NodeHandle::revision`] first, change the input, then await this.
    pub async fn refreshed(&self, revision: u64) -> GraphResult<Arc<T>> {
        let mut rx = self.rx.clone();
        loop {
            {
                let state = rx.borrow_and_update();
                if state.revision > revision {
                    match &state.slot {
                        Slot::Pending => {}
                        Slot::Ready(value) => return Ok(Arc::clone(value)),
                        Slot::Failed(error) => return Err(error.clone()),
                    }
                }
            }
            if rx.changed().await.is_err() {
                return Err(GraphError::NotReady(self.name.to_string()));
            }
        }
    }

    /// Stream of state snapshots, starting with the current one.
    pub fn updates(&self) -> WatchStream<NodeState<T>> {
        WatchStream::new(self.rx.clone())
    }
}

/// A settable source cell. Always Complete; setting a new value advances the
/// generation, which triggers downstream recomputation exactly like a node
/// completing with a new value.
#[derive(Debug)]
pub struct Input<T> {
    pub(crate) tx: Arc<watch::Sender<NodeState<T>>>,
    pub(crate) handle: NodeHandle<T>,
}

impl<T> Clone for Input<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
            handle: self.handle.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Input<T> {
    pub(crate) fn create(name: Arc<str>, initial: T) -> Self {
        let (tx, rx) = watch::channel(NodeState {
            revision: 1,
            generation: 1,
            slot: Slot::Ready(Arc::new(initial)),
        });
        let handle = NodeHandle { name, rx };
        Self {
            tx: Arc::new(tx),
            handle,
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Publishes a new value; dependents recompute.
    pub fn set(&self, value: T) {
        self.tx.send_modify(|state| {
            state.revision += 1;
            state.generation += 1;
            state.slot = Slot::Ready(Arc::new(value));
        });
        tracing::trace!(input = %self.handle.name, "input updated");
    }

    /// Current value. Inputs are Complete from construction onward.
    pub fn get(&self) -> Arc<T> {
        match &self.tx.borrow().slot {
            Slot::Ready(value) => Arc::clone(value),
            // only set() writes this cell, and it always writes a value
            _ => unreachable!("input cell is always complete"),
        }
    }

    /// Read-modify-write helper.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.get());
        self.set(next);
    }

    /// Handle for declaring this input as a dependency or reading it like any
    /// other node.
    pub fn handle(&self) -> NodeHandle<T> {
        self.handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_set_advances_generation_and_revision() {
        let input = Input::create(Arc::from("strategy"), 1u32);
        assert_eq!(input.handle().generation(), 1);
        assert_eq!(*input.get(), 1);

        input.set(7);
        assert_eq!(*input.get(), 7);
        assert_eq!(input.handle().generation(), 2);
        assert_eq!(input.handle().revision(), 2);
        assert_eq!(input.handle().status(), NodeStatus::Complete);
    }

    #[test]
    fn input_update_reads_current_value() {
        let input = Input::create(Arc::from("counter"), 10u32);
        input.update(|v| v + 5);
        assert_eq!(*input.get(), 15);
    }

    #[test]
    fn state_snapshot_exposes_value_and_status() {
        let input = Input::create(Arc::from("cell"), "x".to_string());
        let state = input.handle().state();
        assert_eq!(state.status(), NodeStatus::Complete);
        assert_eq!(state.value().as_deref().map(String::as_str), Some("x"));
        assert!(state.error().is_none());
    }
}
