//! Upstream declarations: a node depends on a handle, a tuple of handles, or
//! nothing at all. The driver schedules on revisions and snapshots typed
//! values plus generations in one pass.

use std::sync::Arc;

use futures_util::future::{select_all, BoxFuture};

use crate::error::GraphError;
use crate::node::{Input, NodeHandle, NodeState, Slot};

/// Erased upstream view used by the driver for scheduling.
pub trait UpstreamHandle: Clone + Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn peek(&self) -> NodeState<Self::Output>;

    fn upstream_name(&self) -> &str;

    /// Resolves once the upstream publishes a revision different from `seen`.
    /// Parks forever after the graph is torn down.
    fn changed_from(&self, seen: u64) -> BoxFuture<'static, ()>;
}

impl<T: Send + Sync + 'static> UpstreamHandle for NodeHandle<T> {
    type Output = T;

    fn peek(&self) -> NodeState<T> {
        self.rx.borrow().clone()
    }

    fn upstream_name(&self) -> &str {
        self.name()
    }

    fn changed_from(&self, seen: u64) -> BoxFuture<'static, ()> {
        let mut rx = self.rx.clone();
        Box::pin(async move {
            loop {
                if rx.borrow_and_update().revision != seen {
                    return;
                }
                if rx.changed().await.is_err() {
                    // sender gone: nothing will ever change again
                    std::future::pending::<()>().await;
                }
            }
        })
    }
}

impl<T: Send + Sync + 'static> UpstreamHandle for Input<T> {
    type Output = T;

    fn peek(&self) -> NodeState<T> {
        self.handle.rx.borrow().clone()
    }

    fn upstream_name(&self) -> &str {
        self.handle.name()
    }

    fn changed_from(&self, seen: u64) -> BoxFuture<'static, ()> {
        self.handle.changed_from(seen)
    }
}

/// What the driver saw across all upstreams at one instant.
pub struct DepProbe<V> {
    /// Revision per upstream, in declaration order.
    pub revisions: Vec<u64>,
    pub view: DepView<V>,
}

pub enum DepView<V> {
    /// Every upstream Complete: typed values plus their generations.
    Ready { values: V, generations: Vec<u64> },
    /// At least one upstream still Pending.
    Blocked,
    /// At least one upstream failed; first in declaration order wins.
    Failed(GraphError),
}

/// Upstream declaration for a node.
///
/// Implemented for `()` (derive once, never retrigger), for a single
/// `NodeHandle<T>`/`Input<T>` (values arrive as `Arc<T>`), and for tuples of
/// handles up to six (values arrive as a tuple of `Arc`s).
pub trait Dependencies: Send + Sync + 'static {
    type Values: Send + 'static;

    fn probe(&self) -> DepProbe<Self::Values>;

    /// Current generation per upstream, for staleness checks after a
    /// derivation completes.
    fn generations(&self) -> Vec<u64>;

    /// Resolves once any upstream's revision differs from `seen`.
    fn changed<'a>(&'a self, seen: &'a [u64]) -> BoxFuture<'a, ()>;
}

impl Dependencies for () {
    type Values = ();

    fn probe(&self) -> DepProbe<()> {
        DepProbe {
            revisions: Vec::new(),
            view: DepView::Ready {
                values: (),
                generations: Vec::new(),
            },
        }
    }

    fn generations(&self) -> Vec<u64> {
        Vec::new()
    }

    fn changed<'a>(&'a self, _seen: &'a [u64]) -> BoxFuture<'a, ()> {
        Box::pin(std::future::pending())
    }
}

fn probe_single<H: UpstreamHandle>(upstream: &H) -> DepProbe<Arc<H::Output>> {
    let state = upstream.peek();
    let revisions = vec![state.revision];
    let view = match state.slot {
        Slot::Pending => DepView::Blocked,
        Slot::Ready(value) => DepView::Ready {
            values: value,
            generations: vec![state.generation],
        },
        Slot::Failed(error) => {
            DepView::Failed(GraphError::upstream(upstream.upstream_name(), error))
        }
    };
    DepProbe { revisions, view }
}

impl<T: Send + Sync + 'static> Dependencies for NodeHandle<T> {
    type Values = Arc<T>;

    fn probe(&self) -> DepProbe<Arc<T>> {
        probe_single(self)
    }

    fn generations(&self) -> Vec<u64> {
        vec![self.peek().generation]
    }

    fn changed<'a>(&'a self, seen: &'a [u64]) -> BoxFuture<'a, ()> {
        self.changed_from(seen[0])
    }
}

impl<T: Send + Sync + 'static> Dependencies for Input<T> {
    type Values = Arc<T>;

    fn probe(&self) -> DepProbe<Arc<T>> {
        probe_single(self)
    }

    fn generations(&self) -> Vec<u64> {
        vec![UpstreamHandle::peek(self).generation]
    }

    fn changed<'a>(&'a self, seen: &'a [u64]) -> BoxFuture<'a, ()> {
        self.changed_from(seen[0])
    }
}

macro_rules! impl_dependencies_for_tuple {
    ( $( $ty:ident $idx:tt ),+ ) => {
        impl<$( $ty: UpstreamHandle ),+> Dependencies for ( $( $ty, )+ ) {
            type Values = ( $( Arc<$ty::Output>, )+ );

            fn probe(&self) -> DepProbe<Self::Values> {
                let states = ( $( self.$idx.peek(), )+ );
                let revisions = vec![ $( states.$idx.revision ),+ ];
                $(
                    if let Slot::Failed(error) = &states.$idx.slot {
                        return DepProbe {
                            revisions,
                            view: DepView::Failed(GraphError::upstream(
                                self.$idx.upstream_name(),
                                error.clone(),
                            )),
                        };
                    }
                )+
                $(
                    if matches!(states.$idx.slot, Slot::Pending) {
                        return DepProbe {
                            revisions,
                            view: DepView::Blocked,
                        };
                    }
                )+
                let generations = vec![ $( states.$idx.generation ),+ ];
                let values = ( $(
                    match states.$idx.slot {
                        Slot::Ready(value) => value,
                        // settled checks above guarantee Ready here
                        _ => unreachable!(),
                    },
                )+ );
                DepProbe {
                    revisions,
                    view: DepView::Ready { values, generations },
                }
            }

            fn generations(&self) -> Vec<u64> {
                vec![ $( self.$idx.peek().generation ),+ ]
            }

            fn changed<'a>(&'a self, seen: &'a [u64]) -> BoxFuture<'a, ()> {
                let waiters = vec![ $( self.$idx.changed_from(seen[$idx]) ),+ ];
                Box::pin(async move {
                    select_all(waiters).await;
                })
            }
        }
    };
}

impl_dependencies_for_tuple!(D0 0, D1 1);
impl_dependencies_for_tuple!(D0 0, D1 1, D2 2);
impl_dependencies_for_tuple!(D0 0, D1 1, D2 2, D3 3);
impl_dependencies_for_tuple!(D0 0, D1 1, D2 2, D3 3, D4 4);
impl_dependencies_for_tuple!(D0 0, D1 1, D2 2, D3 3, D4 4, D5 5);

#[cfg(test)]
mod tests {
    use super::*;

    fn input<T: Send + Sync + 'static>(name: &str, value: T) -> Input<T> {
        Input::create(Arc::from(name), value)
    }

    #[test]
    fn unit_dependencies_are_always_ready() {
        let probe = ().probe();
        assert!(probe.revisions.is_empty());
        assert!(matches!(probe.view, DepView::Ready { .. }));
    }

    #[test]
    fn single_input_probe_carries_value_and_generation() {
        let strategy = input("strategy", 3u32);
        let probe = strategy.probe();
        assert_eq!(probe.revisions, vec![1]);
        match probe.view {
            DepView::Ready { values, generations } => {
                assert_eq!(*values, 3);
                assert_eq!(generations, vec![1]);
            }
            _ => panic!("expected ready view"),
        }
    }

    #[test]
    fn tuple_probe_snapshots_all_upstreams() {
        let a = input("a", 1u32);
        let b = input("b", "two".to_string());
        b.set("three".to_string());

        let deps = (a.clone(), b.clone());
        let probe = deps.probe();
        assert_eq!(probe.revisions, vec![1, 2]);
        match probe.view {
            DepView::Ready { values, generations } => {
                let (left, right) = values;
                assert_eq!(*left, 1);
                assert_eq!(*right, "three");
                assert_eq!(generations, vec![1, 2]);
            }
            _ => panic!("expected ready view"),
        }
        assert_eq!(deps.generations(), vec![1, 2]);
    }

    #[test]
    fn failed_upstream_wraps_error_with_node_name() {
        use tokio::sync::watch;

        let (tx, rx) = watch::channel(NodeState::<u32> {
            revision: 4,
            generation: 2,
            slot: Slot::Failed(GraphError::invariant("bad data")),
        });
        let failed = NodeHandle {
            name: Arc::from("profiles"),
            rx,
        };
        let ok = input("groups", 5u32);

        let probe = (ok.clone(), failed.clone()).probe();
        match probe.view {
            DepView::Failed(GraphError::UpstreamFailed { node, source }) => {
                assert_eq!(node, "profiles");
                assert!(matches!(
                    *source,
                    GraphError::InvariantViolation(_)
                ));
            }
            _ => panic!("expected failed view"),
        }
        drop(tx);
    }

    #[test]
    fn pending_upstream_blocks_the_tuple() {
        use tokio::sync::watch;

        let (_tx, rx) = watch::channel(NodeState::<u32>::initial());
        let pending = NodeHandle {
            name: Arc::from("samples"),
            rx,
        };
        let ok = input("groups", 5u32);

        let probe = (ok, pending).probe();
        assert!(matches!(probe.view, DepView::Blocked));
        assert_eq!(probe.revisions, vec![1, 0]);
    }
}
