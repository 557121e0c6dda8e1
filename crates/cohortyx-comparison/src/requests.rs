//! Enrichment request builders.

use std::collections::HashMap;

use tracing::debug;

use cohortyx_common::enrichments::{CaseGroupFilter, CaseProfileIdentifier, ClinicalGroupFilter};
use cohortyx_common::groups::ComparisonGroup;
use cohortyx_common::profiles::MolecularProfile;

/// One request group per comparison group, pairing each case with its study's
/// selected profile. Patient ids are used in patient-level mode, sample ids
/// otherwise. Cases from studies without a selected profile are skipped.
pub fn alteration_request_groups(
    groups: &[ComparisonGroup],
    profile_by_study: &HashMap<String, MolecularProfile>,
    patient_level: bool,
) -> Vec<CaseGroupFilter> {
    groups
        .iter()
        .map(|group| {
            let mut identifiers = Vec::new();
            for entry in &group.studies {
                let profile = match profile_by_study.get(&entry.study_id) {
                    Some(profile) => profile,
                    None => {
                        debug!(
                            group = %group.name,
                            study = %entry.study_id,
                            "study has no selected profile, skipping its cases"
                        );
                        continue;
                    }
                };
                let case_ids = if patient_level {
                    &entry.patients
                } else {
                    &entry.samples
                };
                identifiers.extend(case_ids.iter().map(|case_id| CaseProfileIdentifier {
                    case_id: case_id.clone(),
                    molecular_profile_id: profile.molecular_profile_id.clone(),
                }));
            }
            CaseGroupFilter {
                name: group.name_with_ordinal(),
                identifiers,
            }
        })
        .collect()
}

/// Expression-family requests run against a single profile and are always
/// sample level, whatever the session-wide enrichment granularity.
pub fn expression_request_groups(
    groups: &[ComparisonGroup],
    profile: &MolecularProfile,
) -> Vec<CaseGroupFilter> {
    groups
        .iter()
        .map(|group| CaseGroupFilter {
            name: group.name_with_ordinal(),
            identifiers: group
                .studies
                .iter()
                .flat_map(|entry| {
                    entry.samples.iter().map(|sample_id| CaseProfileIdentifier {
                        case_id: sample_id.clone(),
                        molecular_profile_id: profile.molecular_profile_id.clone(),
                    })
                })
                .collect(),
        })
        .collect()
}

/// Clinical enrichment requests carry plain sample identifiers; no profile is
/// involved.
pub fn clinical_request_groups(groups: &[ComparisonGroup]) -> Vec<ClinicalGroupFilter> {
    groups
        .iter()
        .map(|group| ClinicalGroupFilter {
            name: group.name_with_ordinal(),
            sample_identifiers: group.sample_identifiers(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use cohortyx_common::groups::GroupStudyEntry;
    use cohortyx_common::profiles::MolecularAlterationType;
    use pretty_assertions::assert_eq;

    use super::*;

    fn group(uid: &str, ordinal: &str, study_id: &str) -> ComparisonGroup {
        ComparisonGroup {
            uid: uid.to_string(),
            name: uid.to_string(),
            ordinal: ordinal.to_string(),
            color: "#2986E2".to_string(),
            studies: vec![GroupStudyEntry {
                study_id: study_id.to_string(),
                samples: vec!["S1".to_string(), "S2".to_string()],
                patients: vec!["P1".to_string()],
            }],
        }
    }

    fn profile(id: &str, study_id: &str) -> MolecularProfile {
        MolecularProfile {
            molecular_profile_id: id.to_string(),
            study_id: study_id.to_string(),
            name: id.to_string(),
            molecular_alteration_type: MolecularAlterationType::MutationExtended,
            datatype: "MAF".to_string(),
        }
    }

    #[test]
    fn sample_level_requests_pair_samples_with_study_profile() {
        let groups = vec![group("Altered", "A", "brca_tcga")];
        let mut profiles = HashMap::new();
        profiles.insert("brca_tcga".to_string(), profile("brca_mut", "brca_tcga"));

        let request = alteration_request_groups(&groups, &profiles, false);
        assert_eq!(request.len(), 1);
        assert_eq!(request[0].name, "(A) Altered");
        assert_eq!(request[0].identifiers.len(), 2);
        assert_eq!(request[0].identifiers[0].case_id, "S1");
        assert_eq!(request[0].identifiers[0].molecular_profile_id, "brca_mut");
    }

    #[test]
    fn patient_level_requests_use_patient_ids() {
        let groups = vec![group("Altered", "A", "brca_tcga")];
        let mut profiles = HashMap::new();
        profiles.insert("brca_tcga".to_string(), profile("brca_mut", "brca_tcga"));

        let request = alteration_request_groups(&groups, &profiles, true);
        assert_eq!(request[0].identifiers.len(), 1);
        assert_eq!(request[0].identifiers[0].case_id, "P1");
    }

    #[test]
    fn studies_without_a_selected_profile_contribute_no_cases() {
        let groups = vec![group("Altered", "A", "luad_tcga")];
        let request = alteration_request_groups(&groups, &HashMap::new(), false);
        assert_eq!(request.len(), 1);
        assert!(request[0].identifiers.is_empty());
    }

    #[test]
    fn expression_requests_stay_sample_level() {
        let groups = vec![group("High", "A", "brca_tcga"), group("Low", "B", "brca_tcga")];
        let request = expression_request_groups(&groups, &profile("brca_rna", "brca_tcga"));
        assert_eq!(request.len(), 2);
        assert_eq!(request[1].name, "(B) Low");
        assert_eq!(request[0].identifiers[0].case_id, "S1");
        assert_eq!(request[0].identifiers[0].molecular_profile_id, "brca_rna");
    }

    #[test]
    fn clinical_requests_carry_sample_identifiers() {
        let groups = vec![group("Altered", "A", "brca_tcga")];
        let request = clinical_request_groups(&groups);
        assert_eq!(request[0].name, "(A) Altered");
        assert_eq!(request[0].sample_identifiers.len(), 2);
        assert_eq!(request[0].sample_identifiers[0].study_id, "brca_tcga");
        assert_eq!(request[0].sample_identifiers[0].sample_id, "S1");
    }
}
