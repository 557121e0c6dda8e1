//! Cohort groups: raw session data, finalized comparison groups, selection state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::cases::{PatientIdentifier, SampleIdentifier};

/// Policy for cases that belong to more than one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlapStrategy {
    /// Keep overlapping cases in every group they belong to.
    Include,
    /// Remove overlapping cases from every group they belong to.
    #[default]
    Exclude,
}

// ---------------------------------------------------------------------------
// Raw session groups
// ---------------------------------------------------------------------------

/// Per-study sample ids as stored in a saved comparison session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGroupStudy {
    pub study_id: String,
    pub samples: Vec<String>,
}

/// A group as returned by the session lookup, before finalization.
/// Patients are derived from the known sample set during finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupData {
    pub name: String,
    /// Explicit color (e.g. carried over from a clinical attribute);
    /// palette-assigned by declared order when absent.
    pub color: Option<String>,
    pub studies: Vec<RawGroupStudy>,
}

// ---------------------------------------------------------------------------
// Finalized groups
// ---------------------------------------------------------------------------

/// Per-study membership of a finalized group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStudyEntry {
    pub study_id: String,
    pub samples: Vec<String>,
    pub patients: Vec<String>,
}

/// A finalized comparison group with ordinal, color, and derived patients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonGroup {
    /// Unique within a session; derived from the group name.
    pub uid: String,
    pub name: String,
    /// `A`, `B`, … `Z`, `AA`, `AB`, … assigned by declared order.
    pub ordinal: String,
    pub color: String,
    pub studies: Vec<GroupStudyEntry>,
}

impl ComparisonGroup {
    /// Display name prefixed with the ordinal, e.g. `(A) Altered`.
    pub fn name_with_ordinal(&self) -> String {
        format!("({}) {}", self.ordinal, self.name)
    }

    pub fn num_samples(&self) -> usize {
        self.studies.iter().map(|s| s.samples.len()).sum()
    }

    /// A group is empty when it has no samples left.
    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    pub fn sample_identifiers(&self) -> Vec<SampleIdentifier> {
        self.studies
            .iter()
            .flat_map(|entry| {
                entry.samples.iter().map(|sample_id| SampleIdentifier {
                    study_id: entry.study_id.clone(),
                    sample_id: sample_id.clone(),
                })
            })
            .collect()
    }

    pub fn patient_identifiers(&self) -> Vec<PatientIdentifier> {
        self.studies
            .iter()
            .flat_map(|entry| {
                entry.patients.iter().map(|patient_id| PatientIdentifier {
                    study_id: entry.study_id.clone(),
                    patient_id: patient_id.clone(),
                })
            })
            .collect()
    }

    pub fn study_ids(&self) -> impl Iterator<Item = &str> {
        self.studies.iter().map(|s| s.study_id.as_str())
    }
}

// ---------------------------------------------------------------------------
// Selection state
// ---------------------------------------------------------------------------

/// Which groups the user has deselected; every group is selected by default,
/// so a fresh selection needs no knowledge of the group list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSelection {
    deselected: BTreeSet<String>,
}

impl GroupSelection {
    pub fn all_selected() -> Self {
        Self::default()
    }

    pub fn is_selected(&self, uid: &str) -> bool {
        !self.deselected.contains(uid)
    }

    pub fn set_selected(&mut self, uid: &str, selected: bool) {
        if selected {
            self.deselected.remove(uid);
        } else {
            self.deselected.insert(uid.to_string());
        }
    }

    /// Selection with exactly the given uids deselected.
    pub fn with_deselected<I, S>(uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deselected: uids.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn group(uid: &str) -> ComparisonGroup {
        ComparisonGroup {
            uid: uid.into(),
            name: "Altered".into(),
            ordinal: "A".into(),
            color: "#DC3912".into(),
            studies: vec![GroupStudyEntry {
                study_id: "brca_tcga".into(),
                samples: vec!["S1".into(), "S2".into()],
                patients: vec!["P1".into()],
            }],
        }
    }

    #[test]
    fn name_with_ordinal_formats() {
        assert_eq!(group("g1").name_with_ordinal(), "(A) Altered");
    }

    #[test]
    fn sample_and_patient_identifiers_expand_per_study() {
        let g = group("g1");
        assert_eq!(g.num_samples(), 2);
        assert!(!g.is_empty());
        assert_eq!(g.sample_identifiers().len(), 2);
        assert_eq!(g.patient_identifiers().len(), 1);
        assert_eq!(g.sample_identifiers()[0].study_id, "brca_tcga");
    }

    #[test]
    fn selection_defaults_to_all_selected() {
        let mut selection = GroupSelection::all_selected();
        assert!(selection.is_selected("anything"));
        selection.set_selected("g1", false);
        assert!(!selection.is_selected("g1"));
        assert!(selection.is_selected("g2"));
        selection.set_selected("g1", true);
        assert!(selection.is_selected("g1"));
    }
}
