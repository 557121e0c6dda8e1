//! cohortyx-common — Shared domain types used across all Cohortyx crates.

pub mod cases;
pub mod clinical;
pub mod enrichments;
pub mod groups;
pub mod profiles;

// Re-export the types most crates touch
pub use cases::{PatientIdentifier, Sample, SampleIdentifier, Study};
pub use groups::{ComparisonGroup, GroupData, GroupSelection, OverlapStrategy};
