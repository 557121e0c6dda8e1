//! Turning raw session groups into finalized comparison groups.

use std::collections::{HashMap, HashSet};

use cohortyx_common::cases::{Sample, SampleIdentifier};
use cohortyx_common::groups::{ComparisonGroup, GroupData, GroupStudyEntry};
use cohortyx_graph::{GraphError, GraphResult};

/// Colors assigned to groups without an explicit one, cycled by declared
/// order.
pub const GROUP_COLOR_PALETTE: [&str; 20] = [
    "#2986E2", "#DC3912", "#F88508", "#109618", "#990099", "#0099C6", "#DD4477", "#66AA00",
    "#B82E2E", "#316395", "#994499", "#22AA99", "#AAAA11", "#6633CC", "#E67300", "#8B0707",
    "#651067", "#329262", "#5574A6", "#3B3EAC",
];

/// Spreadsheet-style ordinal for a zero-based group index:
/// `A`, `B`, … `Z`, `AA`, `AB`, …
pub fn ordinal(index: usize) -> String {
    let mut remaining = index + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        remaining -= 1;
        letters.push((b'A' + (remaining % 26) as u8) as char);
        remaining /= 26;
    }
    letters.into_iter().rev().collect()
}

/// Finalize raw session groups against the known sample set: assign ordinals
/// and colors, dedup sample ids, and derive each group's patients from its
/// samples.
///
/// Groups must have unique names (the uid is derived from the name) and may
/// only reference samples present in `sample_set`; anything else is a broken
/// session.
pub fn finalize_groups(
    raw_groups: &[GroupData],
    sample_set: &HashMap<SampleIdentifier, Sample>,
) -> GraphResult<Vec<ComparisonGroup>> {
    let mut seen_uids = HashSet::new();
    let mut finalized = Vec::with_capacity(raw_groups.len());

    for (index, raw) in raw_groups.iter().enumerate() {
        let uid = raw.name.clone();
        if !seen_uids.insert(uid.clone()) {
            return Err(GraphError::invariant(format!(
                "duplicate group name `{}`",
                raw.name
            )));
        }

        let color = raw
            .color
            .clone()
            .unwrap_or_else(|| GROUP_COLOR_PALETTE[index % GROUP_COLOR_PALETTE.len()].to_string());

        let mut studies = Vec::with_capacity(raw.studies.len());
        for raw_study in &raw.studies {
            let mut samples = Vec::new();
            let mut seen_samples = HashSet::new();
            let mut patients = Vec::new();
            let mut seen_patients = HashSet::new();

            for sample_id in &raw_study.samples {
                if !seen_samples.insert(sample_id.as_str()) {
                    continue;
                }
                let identifier = SampleIdentifier {
                    study_id: raw_study.study_id.clone(),
                    sample_id: sample_id.clone(),
                };
                let sample = sample_set.get(&identifier).ok_or_else(|| {
                    GraphError::invariant(format!(
                        "group `{}` references unknown sample {}:{}",
                        raw.name, raw_study.study_id, sample_id
                    ))
                })?;
                samples.push(sample_id.clone());
                if seen_patients.insert(sample.patient_id.as_str()) {
                    patients.push(sample.patient_id.clone());
                }
            }

            studies.push(GroupStudyEntry {
                study_id: raw_study.study_id.clone(),
                samples,
                patients,
            });
        }

        finalized.push(ComparisonGroup {
            uid,
            name: raw.name.clone(),
            ordinal: ordinal(index),
            color,
            studies,
        });
    }

    Ok(finalized)
}

#[cfg(test)]
mod tests {
    use cohortyx_common::groups::RawGroupStudy;
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample_set(entries: &[(&str, &str, &str)]) -> HashMap<SampleIdentifier, Sample> {
        entries
            .iter()
            .map(|(study_id, sample_id, patient_id)| {
                let sample = Sample {
                    study_id: study_id.to_string(),
                    sample_id: sample_id.to_string(),
                    patient_id: patient_id.to_string(),
                };
                (sample.sample_identifier(), sample)
            })
            .collect()
    }

    fn raw(name: &str, samples: &[&str]) -> GroupData {
        GroupData {
            name: name.to_string(),
            color: None,
            studies: vec![RawGroupStudy {
                study_id: "brca_tcga".to_string(),
                samples: samples.iter().map(|s| s.to_string()).collect(),
            }],
        }
    }

    #[test]
    fn ordinals_run_a_to_z_then_double_letters() {
        assert_eq!(ordinal(0), "A");
        assert_eq!(ordinal(1), "B");
        assert_eq!(ordinal(25), "Z");
        assert_eq!(ordinal(26), "AA");
        assert_eq!(ordinal(27), "AB");
        assert_eq!(ordinal(51), "AZ");
        assert_eq!(ordinal(52), "BA");
        assert_eq!(ordinal(701), "ZZ");
        assert_eq!(ordinal(702), "AAA");
    }

    #[test]
    fn assigns_ordinals_colors_and_derived_patients() {
        let set = sample_set(&[
            ("brca_tcga", "S1", "P1"),
            ("brca_tcga", "S2", "P1"),
            ("brca_tcga", "S3", "P2"),
        ]);
        let groups =
            finalize_groups(&[raw("Altered", &["S1", "S2"]), raw("Unaltered", &["S3"])], &set)
                .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].uid, "Altered");
        assert_eq!(groups[0].ordinal, "A");
        assert_eq!(groups[0].color, GROUP_COLOR_PALETTE[0]);
        assert_eq!(groups[0].studies[0].samples, vec!["S1", "S2"]);
        assert_eq!(groups[0].studies[0].patients, vec!["P1"]);
        assert_eq!(groups[1].ordinal, "B");
        assert_eq!(groups[1].color, GROUP_COLOR_PALETTE[1]);
        assert_eq!(groups[1].studies[0].patients, vec!["P2"]);
    }

    #[test]
    fn explicit_color_wins_over_palette() {
        let set = sample_set(&[("brca_tcga", "S1", "P1")]);
        let mut data = raw("Altered", &["S1"]);
        data.color = Some("#123456".to_string());
        let groups = finalize_groups(&[data], &set).unwrap();
        assert_eq!(groups[0].color, "#123456");
    }

    #[test]
    fn repeated_sample_ids_are_deduped() {
        let set = sample_set(&[("brca_tcga", "S1", "P1")]);
        let groups = finalize_groups(&[raw("Altered", &["S1", "S1", "S1"])], &set).unwrap();
        assert_eq!(groups[0].studies[0].samples, vec!["S1"]);
        assert_eq!(groups[0].num_samples(), 1);
    }

    #[test]
    fn duplicate_group_names_are_rejected() {
        let set = sample_set(&[("brca_tcga", "S1", "P1")]);
        let err = finalize_groups(&[raw("Altered", &["S1"]), raw("Altered", &["S1"])], &set)
            .unwrap_err();
        assert!(matches!(err, GraphError::InvariantViolation(_)));
    }

    #[test]
    fn unknown_sample_reference_is_rejected() {
        let set = sample_set(&[("brca_tcga", "S1", "P1")]);
        let err = finalize_groups(&[raw("Altered", &["S1", "S9"])], &set).unwrap_err();
        assert!(matches!(err, GraphError::InvariantViolation(_)));
        assert!(err.to_string().contains("S9"));
    }

    #[test]
    fn palette_wraps_after_twenty_groups() {
        let set = sample_set(&[("brca_tcga", "S1", "P1")]);
        let raw_groups: Vec<GroupData> =
            (0..21).map(|i| raw(&format!("G{i}"), &["S1"])).collect();
        let groups = finalize_groups(&raw_groups, &set).unwrap();
        assert_eq!(groups[20].color, GROUP_COLOR_PALETTE[0]);
        assert_eq!(groups[20].ordinal, "U");
    }
}
