//! cohortyx-graph — Asynchronous memoized dependency-graph evaluator.
//!
//! Derived values are declared as nodes over zero or more upstream nodes plus
//! an async derivation (typically an external fetch). Each node exposes a
//! Pending/Complete/Error status and recomputes, push-based, whenever an
//! upstream publishes a new value:
//!
//! * Pending propagates eagerly and transitively downstream.
//! * Memoization is by upstream *generation* counters, never timestamps.
//! * An in-flight derivation whose upstream changes is discarded silently, so
//!   a stale value is never published.
//! * Errors propagate to dependents by default; a node declared with
//!   [`Graph::node_or_default`] resolves to its default value instead.
//!
//! ```
//! use cohortyx_graph::Graph;
//!
//! tokio_test::block_on(async {
//!     let graph = Graph::new();
//!     let base = graph.input("base", 2u32);
//!     let doubled = graph.node("doubled", base.clone(), |v| async move { Ok(*v * 2) });
//!
//!     assert_eq!(*doubled.resolved().await.unwrap(), 4);
//!
//!     let seen = doubled.revision();
//!     base.set(21);
//!     assert_eq!(*doubled.refreshed(seen).await.unwrap(), 42);
//! });
//! ```

pub mod deps;
pub mod error;
pub mod graph;
pub mod node;

pub use deps::{DepProbe, DepView, Dependencies, UpstreamHandle};
pub use error::{GraphError, GraphResult};
pub use graph::Graph;
pub use node::{Input, NodeHandle, NodeState, NodeStatus};
