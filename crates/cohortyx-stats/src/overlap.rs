//! Group overlap handling and Venn partitioning.
//!
//! Membership is always computed against the full group list, not just the
//! selected groups, so deselecting a group does not change which cases count
//! as contested.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use cohortyx_common::cases::{PatientIdentifier, SampleIdentifier};
use cohortyx_common::groups::{ComparisonGroup, OverlapStrategy};

/// Ordered membership flags, one per group in declared order.
pub type MembershipVector = Vec<bool>;

/// Outcome of overlap handling over one group list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapResult {
    /// Input groups with contested cases removed from every group they
    /// belong to (the `EXCLUDE`-strategy view of the group list).
    pub groups: Vec<ComparisonGroup>,
    /// Uids of groups unselectable under `EXCLUDE`: empty at input, or
    /// emptied by contested-case removal.
    pub excluded_from_analysis: BTreeSet<String>,
    /// Uids of groups that had no cases at input; unselectable under either
    /// strategy.
    pub empty_input_groups: BTreeSet<String>,
    /// Samples belonging to more than one group, in identifier order.
    pub overlapping_samples: Vec<SampleIdentifier>,
    /// Patients belonging to more than one group, in identifier order.
    pub overlapping_patients: Vec<PatientIdentifier>,
    /// Uids that were selected when this computation ran. Downstream
    /// active-group filtering uses this snapshot, never a fresher predicate.
    pub selected_uids: BTreeSet<String>,
}

impl OverlapResult {
    /// Groups unselectable under the given strategy.
    pub fn excluded_for(&self, strategy: OverlapStrategy) -> &BTreeSet<String> {
        match strategy {
            OverlapStrategy::Exclude => &self.excluded_from_analysis,
            OverlapStrategy::Include => &self.empty_input_groups,
        }
    }
}

/// Computes overlap membership for every case across `groups` and derives the
/// contested-case-removed group list.
///
/// The selector predicate is evaluated once per group and recorded in the
/// result; it does not affect membership or exclusion.
pub fn compute_overlap<F>(groups: &[ComparisonGroup], is_selected: F) -> OverlapResult
where
    F: Fn(&str) -> bool,
{
    let selected_uids: BTreeSet<String> = groups
        .iter()
        .filter(|group| is_selected(&group.uid))
        .map(|group| group.uid.clone())
        .collect();

    let empty_input_groups: BTreeSet<String> = groups
        .iter()
        .filter(|group| group.is_empty())
        .map(|group| group.uid.clone())
        .collect();

    // how many groups each case belongs to, across the full list
    let mut sample_counts: HashMap<SampleIdentifier, usize> = HashMap::new();
    let mut patient_counts: HashMap<PatientIdentifier, usize> = HashMap::new();
    for group in groups {
        for sample in group.sample_identifiers() {
            *sample_counts.entry(sample).or_insert(0) += 1;
        }
        for patient in group.patient_identifiers() {
            *patient_counts.entry(patient).or_insert(0) += 1;
        }
    }

    let mut overlapping_samples: Vec<SampleIdentifier> = sample_counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect();
    overlapping_samples.sort();
    let mut overlapping_patients: Vec<PatientIdentifier> = patient_counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect();
    overlapping_patients.sort();

    let contested_samples: HashSet<(&str, &str)> = overlapping_samples
        .iter()
        .map(|id| (id.study_id.as_str(), id.sample_id.as_str()))
        .collect();
    let contested_patients: HashSet<(&str, &str)> = overlapping_patients
        .iter()
        .map(|id| (id.study_id.as_str(), id.patient_id.as_str()))
        .collect();

    let removed_groups: Vec<ComparisonGroup> = groups
        .iter()
        .map(|group| {
            let mut group = group.clone();
            for entry in &mut group.studies {
                let study_id = entry.study_id.clone();
                entry.samples.retain(|sample_id| {
                    !contested_samples.contains(&(study_id.as_str(), sample_id.as_str()))
                });
                entry.patients.retain(|patient_id| {
                    !contested_patients.contains(&(study_id.as_str(), patient_id.as_str()))
                });
            }
            group
        })
        .collect();

    let mut excluded_from_analysis = empty_input_groups.clone();
    for group in &removed_groups {
        if group.is_empty() {
            excluded_from_analysis.insert(group.uid.clone());
        }
    }

    debug!(
        groups = groups.len(),
        overlapping_samples = overlapping_samples.len(),
        overlapping_patients = overlapping_patients.len(),
        excluded = excluded_from_analysis.len(),
        "overlap computed"
    );

    OverlapResult {
        groups: removed_groups,
        excluded_from_analysis,
        empty_input_groups,
        overlapping_samples,
        overlapping_patients,
        selected_uids,
    }
}

/// One cell of the Venn partition: the cases whose membership across the
/// group list is exactly `membership`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VennBucket {
    /// Membership flags aligned to the input group order.
    pub membership: MembershipVector,
    /// Uids of the member groups, in input group order.
    pub member_uids: Vec<String>,
    /// Case keys with this membership, in universe order.
    pub cases: Vec<String>,
}

/// Buckets every case key in `universe` by its exact combination of group
/// memberships.
///
/// Buckets are ordered by member count, then by member positions in the
/// declared group order, so repeated runs on the same input are identical.
/// Duplicate universe keys are partitioned once; every key lands in exactly
/// one bucket.
pub fn partition_by_membership<G, U, C>(
    groups: &[G],
    uid_of: U,
    case_keys_of: C,
    universe: &[String],
) -> Vec<VennBucket>
where
    U: Fn(&G) -> &str,
    C: Fn(&G) -> Vec<String>,
{
    let group_cases: Vec<HashSet<String>> = groups
        .iter()
        .map(|group| case_keys_of(group).into_iter().collect())
        .collect();

    let mut order: Vec<MembershipVector> = Vec::new();
    let mut buckets: HashMap<MembershipVector, Vec<String>> = HashMap::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for case in universe {
        if !seen.insert(case) {
            continue;
        }
        let membership: MembershipVector =
            group_cases.iter().map(|cases| cases.contains(case)).collect();
        buckets
            .entry(membership.clone())
            .or_insert_with(|| {
                order.push(membership.clone());
                Vec::new()
            })
            .push(case.clone());
    }

    // member count first, then earliest member positions
    order.sort_by_key(|membership| {
        let positions: Vec<usize> = membership
            .iter()
            .enumerate()
            .filter(|(_, member)| **member)
            .map(|(position, _)| position)
            .collect();
        (positions.len(), positions)
    });

    order
        .into_iter()
        .map(|membership| {
            let cases = buckets.remove(&membership).unwrap_or_default();
            let member_uids = membership
                .iter()
                .zip(groups)
                .filter(|(member, _)| **member)
                .map(|(_, group)| uid_of(group).to_string())
                .collect();
            VennBucket {
                membership,
                member_uids,
                cases,
            }
        })
        .collect()
}
