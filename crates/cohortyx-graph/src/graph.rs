//! Node declaration and the per-node driver task.
//!
//! Every node gets its own tokio task running [`drive`]. The driver probes its
//! upstream declaration, publishes Pending as soon as any upstream is
//! unsettled, memoizes by upstream generations, and races each in-flight
//! derivation against further upstream changes so a stale result is never
//! published.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::deps::{Dependencies, DepView};
use crate::error::GraphResult;
use crate::node::{Input, NodeHandle, NodeState, Slot};

/// Spawns and owns the driver tasks of a dependency graph.
///
/// Nodes are declared bottom-up: a handle must exist before it can be named as
/// an upstream, so the graph is acyclic by construction. Dropping the graph
/// aborts every driver; handles keep serving the last published state.
pub struct Graph {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// A settable source cell, Complete from construction.
    pub fn input<T>(&self, name: &str, initial: T) -> Input<T>
    where
        T: Send + Sync + 'static,
    {
        trace!(input = name, "input registered");
        Input::create(Arc::from(name), initial)
    }

    /// Declares a derived node. `derive` runs whenever the upstream
    /// generations it last used have advanced; a failed upstream or a failed
    /// derivation puts the node in Error.
    pub fn node<T, D, F, Fut>(&self, name: &str, deps: D, derive: F) -> NodeHandle<T>
    where
        T: Send + Sync + 'static,
        D: Dependencies,
        F: FnMut(D::Values) -> Fut + Send + 'static,
        Fut: Future<Output = GraphResult<T>> + Send + 'static,
    {
        self.spawn(name, deps, derive, None)
    }

    /// Like [`Graph::node`], but with the error-suppression policy: a failed
    /// upstream or derivation resolves this node to `T::default()` instead of
    /// propagating the error.
    pub fn node_or_default<T, D, F, Fut>(&self, name: &str, deps: D, derive: F) -> NodeHandle<T>
    where
        T: Default + Send + Sync + 'static,
        D: Dependencies,
        F: FnMut(D::Values) -> Fut + Send + 'static,
        Fut: Future<Output = GraphResult<T>> + Send + 'static,
    {
        self.spawn(name, deps, derive, Some(Box::new(T::default)))
    }

    fn spawn<T, D, F, Fut>(
        &self,
        name: &str,
        deps: D,
        derive: F,
        fallback: Option<Box<dyn Fn() -> T + Send>>,
    ) -> NodeHandle<T>
    where
        T: Send + Sync + 'static,
        D: Dependencies,
        F: FnMut(D::Values) -> Fut + Send + 'static,
        Fut: Future<Output = GraphResult<T>> + Send + 'static,
    {
        let name: Arc<str> = Arc::from(name);
        let (tx, rx) = watch::channel(NodeState::initial());
        let handle = NodeHandle {
            name: Arc::clone(&name),
            rx,
        };
        trace!(node = %name, suppressed = fallback.is_some(), "node registered");
        let task = tokio::spawn(drive(name, deps, derive, tx, fallback));
        self.tasks.lock().expect("graph task registry poisoned").push(task);
        handle
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for task in tasks.iter() {
                task.abort();
            }
            debug!(nodes = tasks.len(), "graph torn down");
        }
    }
}

/// What the driver last wrote to its channel. Used to suppress duplicate
/// publications, which would otherwise wake dependents in a loop.
enum Published {
    Nothing,
    Pending,
    /// Complete, derived from these upstream generations.
    Value { generations: Vec<u64> },
    /// Complete with the fallback default, standing in for a failed upstream
    /// observed at these revisions.
    Fallback { revisions: Vec<u64> },
    /// Error observed at these upstream revisions.
    Errored { revisions: Vec<u64> },
}

fn publish<T>(tx: &watch::Sender<NodeState<T>>, slot: Slot<T>, new_value: bool) {
    tx.send_modify(|state| {
        state.revision += 1;
        if new_value {
            state.generation += 1;
        }
        state.slot = slot;
    });
}

async fn drive<T, D, F, Fut>(
    name: Arc<str>,
    deps: D,
    mut derive: F,
    tx: watch::Sender<NodeState<T>>,
    fallback: Option<Box<dyn Fn() -> T + Send>>,
) where
    T: Send + Sync + 'static,
    D: Dependencies,
    F: FnMut(D::Values) -> Fut + Send + 'static,
    Fut: Future<Output = GraphResult<T>> + Send + 'static,
{
    let mut published = Published::Nothing;
    loop {
        let probe = deps.probe();
        match probe.view {
            DepView::Blocked => {
                if !matches!(published, Published::Pending) {
                    trace!(node = %name, "upstream pending, node pending");
                    publish(&tx, Slot::Pending, false);
                    published = Published::Pending;
                }
                deps.changed(&probe.revisions).await;
            }
            DepView::Failed(error) => {
                match &fallback {
                    None => {
                        let already =
                            matches!(&published, Published::Errored { revisions } if *revisions == probe.revisions);
                        if !already {
                            warn!(node = %name, error = %error, "upstream failed");
                            publish(&tx, Slot::Failed(error), false);
                            published = Published::Errored {
                                revisions: probe.revisions.clone(),
                            };
                        }
                    }
                    Some(default) => {
                        let already =
                            matches!(&published, Published::Fallback { revisions } if *revisions == probe.revisions);
                        if !already {
                            debug!(node = %name, error = %error, "upstream failed, resolving to default");
                            publish(&tx, Slot::Ready(Arc::new(default())), true);
                            published = Published::Fallback {
                                revisions: probe.revisions.clone(),
                            };
                        }
                    }
                }
                deps.changed(&probe.revisions).await;
            }
            DepView::Ready {
                values,
                generations,
            } => {
                let memoized =
                    matches!(&published, Published::Value { generations: used } if *used == generations);
                if memoized {
                    deps.changed(&probe.revisions).await;
                    continue;
                }
                if !matches!(published, Published::Pending) {
                    publish(&tx, Slot::Pending, false);
                    published = Published::Pending;
                }
                let derivation = derive(values);
                tokio::select! {
                    () = deps.changed(&probe.revisions) => {
                        trace!(node = %name, "upstream changed mid-derivation, in-flight result discarded");
                    }
                    result = derivation => match result {
                        Ok(value) => {
                            trace!(node = %name, "derivation complete");
                            publish(&tx, Slot::Ready(Arc::new(value)), true);
                            published = Published::Value { generations };
                        }
                        Err(error) => match &fallback {
                            None => {
                                warn!(node = %name, error = %error, "derivation failed");
                                publish(&tx, Slot::Failed(error), false);
                                published = Published::Errored {
                                    revisions: probe.revisions.clone(),
                                };
                            }
                            Some(default) => {
                                debug!(node = %name, error = %error, "derivation failed, resolving to default");
                                publish(&tx, Slot::Ready(Arc::new(default())), true);
                                published = Published::Value { generations };
                            }
                        },
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::GraphError;
    use crate::node::NodeStatus;

    #[tokio::test]
    async fn derives_from_input_and_recomputes_on_set() {
        let graph = Graph::new();
        let base = graph.input("base", 2u32);
        let doubled = graph.node("doubled", base.clone(), |v| async move { Ok(*v * 2) });

        assert_eq!(*doubled.resolved().await.unwrap(), 4);

        let seen = doubled.revision();
        base.set(5);
        assert_eq!(*doubled.refreshed(seen).await.unwrap(), 10);
        assert_eq!(doubled.status(), NodeStatus::Complete);
    }

    #[tokio::test]
    async fn read_before_complete_is_not_ready() {
        let graph = Graph::new();
        let slow = graph.node("slow", (), |()| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(1u32)
        });

        assert_eq!(slow.status(), NodeStatus::Pending);
        assert!(matches!(slow.get(), Err(GraphError::NotReady(name)) if name == "slow"));
    }

    #[tokio::test]
    async fn chained_nodes_propagate_pending_then_new_value() {
        let graph = Graph::new();
        let a = graph.input("a", 1u32);
        let b = graph.node("b", a.clone(), |v| async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(*v + 1)
        });
        let c = graph.node("c", b.clone(), |v| async move { Ok(*v * 10) });

        assert_eq!(*c.resolved().await.unwrap(), 20);

        let seen = c.revision();
        a.set(4);
        // b is mid-derivation, so the pending state has reached c eagerly
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(c.status(), NodeStatus::Pending);
        assert_eq!(*c.refreshed(seen).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn in_flight_derivation_is_discarded_on_upstream_change() {
        let graph = Graph::new();
        let invocations = Arc::new(AtomicUsize::new(0));

        let base = graph.input("base", 1u32);
        let derived = {
            let invocations = Arc::clone(&invocations);
            graph.node("derived", base.clone(), move |v| {
                invocations.fetch_add(1, Ordering::SeqCst);
                async move {
                    tokio::time::sleep(Duration::from_millis(40)).await;
                    Ok(*v * 10)
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        base.set(2);

        // The first in-flight result (10) is discarded; the first value ever
        // published comes from the latest input.
        assert_eq!(*derived.resolved().await.unwrap(), 20);
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
        assert_eq!(derived.generation(), 1);
    }

    #[tokio::test]
    async fn settled_node_does_not_rederive_without_upstream_change() {
        let graph = Graph::new();
        let invocations = Arc::new(AtomicUsize::new(0));

        let base = graph.input("base", 7u32);
        let derived = {
            let invocations = Arc::clone(&invocations);
            graph.node("derived", base.clone(), move |v| {
                invocations.fetch_add(1, Ordering::SeqCst);
                async move { Ok(*v) }
            })
        };

        assert_eq!(*derived.resolved().await.unwrap(), 7);
        for _ in 0..5 {
            let _ = derived.get();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_node_keeps_dependents_in_error() {
        let graph = Graph::new();
        let failing = graph.node("failing", (), |()| async {
            Err::<u32, _>(GraphError::fetch(anyhow::anyhow!("service down")))
        });
        let dependent = graph.node("dependent", failing.clone(), |v| async move { Ok(*v + 1) });

        let err = dependent.resolved().await.unwrap_err();
        match err {
            GraphError::UpstreamFailed { node, source } => {
                assert_eq!(node, "failing");
                assert!(matches!(*source, GraphError::FetchFailed(_)));
            }
            other => panic!("expected upstream failure, got {other}"),
        }
        // re-read raises the stored error without recomputation
        assert!(dependent.get().is_err());
        assert_eq!(dependent.status(), NodeStatus::Error);
    }

    #[tokio::test]
    async fn suppressed_node_resolves_to_default_on_upstream_failure() {
        let graph = Graph::new();
        let failing = graph.node("failing", (), |()| async {
            Err::<u32, _>(GraphError::fetch(anyhow::anyhow!("service down")))
        });
        let suppressed =
            graph.node_or_default("suppressed", failing.clone(), |v| async move { Ok(vec![*v]) });

        assert_eq!(*suppressed.resolved().await.unwrap(), Vec::<u32>::new());
        assert_eq!(suppressed.status(), NodeStatus::Complete);
    }

    #[tokio::test]
    async fn suppressed_node_resolves_to_default_on_own_failure() {
        let graph = Graph::new();
        let base = graph.input("base", 1u32);
        let suppressed = graph.node_or_default("suppressed", base.clone(), |_| async {
            Err::<Vec<u32>, _>(GraphError::fetch(anyhow::anyhow!("enrichment service 500")))
        });

        assert_eq!(*suppressed.resolved().await.unwrap(), Vec::<u32>::new());
    }

    #[tokio::test]
    async fn error_clears_once_upstream_recovers() {
        let graph = Graph::new();
        let toggle = graph.input("toggle", false);
        let checked = graph.node("checked", toggle.clone(), |v| async move {
            if *v {
                Ok("ok")
            } else {
                Err(GraphError::invariant("toggle is off"))
            }
        });
        let downstream = graph.node("downstream", checked.clone(), |v| async move { Ok(*v) });

        assert!(downstream.resolved().await.is_err());

        let seen = downstream.revision();
        toggle.set(true);
        assert_eq!(*downstream.refreshed(seen).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn two_upstreams_feed_one_derivation() {
        let graph = Graph::new();
        let left = graph.input("left", 3u32);
        let right = graph.input("right", 4u32);
        let sum = graph.node("sum", (left.clone(), right.clone()), |(l, r)| async move {
            Ok(*l + *r)
        });

        assert_eq!(*sum.resolved().await.unwrap(), 7);

        let seen = sum.revision();
        right.set(10);
        assert_eq!(*sum.refreshed(seen).await.unwrap(), 13);
    }
}
