//! Graph evaluation errors.
//!
//! Errors are cheap to clone (payloads behind `Arc`) because a failed node
//! re-raises its stored error on every read and hands it to every dependent.

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// Read attempted while the node is still Pending. A programming error at
    /// the call site; consumers should await or subscribe instead.
    #[error("node `{0}` is not ready")]
    NotReady(String),

    /// An upstream dependency is in the Error state.
    #[error("upstream node `{node}` failed")]
    UpstreamFailed {
        node: String,
        #[source]
        source: Arc<GraphError>,
    },

    /// An external collaborator call failed during a derivation.
    #[error("external fetch failed: {0}")]
    FetchFailed(Arc<anyhow::Error>),

    /// Inconsistent input data, e.g. a group referencing an unknown case id.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl GraphError {
    pub fn fetch(error: anyhow::Error) -> Self {
        GraphError::FetchFailed(Arc::new(error))
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        GraphError::InvariantViolation(message.into())
    }

    pub(crate) fn upstream(node: &str, source: GraphError) -> Self {
        GraphError::UpstreamFailed {
            node: node.to_string(),
            source: Arc::new(source),
        }
    }

    /// Innermost failure that started a propagation chain.
    pub fn root_cause(&self) -> &GraphError {
        match self {
            GraphError::UpstreamFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<anyhow::Error> for GraphError {
    fn from(error: anyhow::Error) -> Self {
        GraphError::fetch(error)
    }
}

pub type GraphResult<T> = Result<T, GraphError>;
