//! cohortyx-stats — Overlap handling, Venn partitioning, Benjamini–Hochberg
//! FDR correction, and survival cohort extraction.
//!
//! Pure functions over the `cohortyx-common` domain model; the session graph
//! in `cohortyx-comparison` calls these inside node derivations.

pub mod fdr;
pub mod overlap;
pub mod survival;

pub use fdr::{attach_qvalues, calculate_qvalues, WithQValue};
pub use overlap::{
    compute_overlap, partition_by_membership, MembershipVector, OverlapResult, VennBucket,
};
pub use survival::{is_deceased, is_recurred, patient_survivals};
