//! cohortyx-comparison — Cohort comparison sessions over a dependency graph.
//!
//! A [`ComparisonSession`] loads a saved group set, resolves it against portal
//! metadata, applies the overlap strategy, and derives enrichment and survival
//! results as graph nodes. Consumers await the node handles they need;
//! selection, strategy, and profile changes flow in through setters and
//! recompute exactly the affected subgraph.

pub mod config;
pub mod finalize;
pub mod profiles;
pub mod remote;
pub mod requests;
pub mod session;
pub mod tabs;

pub use config::ComparisonConfig;
pub use remote::{EnrichmentApi, PortalApi, SessionApi};
pub use session::{Collaborators, ComparisonSession, EnrichmentAnalysisGroup};
pub use tabs::AnalysisCategory;
