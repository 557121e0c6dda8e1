//! Per-modality molecular profile selection.

use std::collections::HashMap;

use cohortyx_common::profiles::{MolecularAlterationType, MolecularProfile};

/// The profile each study contributes cases through, keyed by study id.
pub type ProfileByStudy = HashMap<String, MolecularProfile>;

/// Profiles usable for mutation enrichment.
pub fn pick_mutation_profiles(profiles: &[MolecularProfile]) -> Vec<MolecularProfile> {
    profiles
        .iter()
        .filter(|p| p.molecular_alteration_type == MolecularAlterationType::MutationExtended)
        .cloned()
        .collect()
}

/// Profiles usable for copy-number enrichment. Only discrete calls qualify;
/// log-ratio profiles cannot answer HOMDEL/AMP queries.
pub fn pick_copy_number_profiles(profiles: &[MolecularProfile]) -> Vec<MolecularProfile> {
    profiles
        .iter()
        .filter(|p| {
            p.molecular_alteration_type == MolecularAlterationType::CopyNumberAlteration
                && p.datatype == "DISCRETE"
        })
        .cloned()
        .collect()
}

/// Profiles usable for mRNA expression enrichment.
pub fn pick_mrna_profiles(profiles: &[MolecularProfile]) -> Vec<MolecularProfile> {
    profiles
        .iter()
        .filter(|p| {
            p.molecular_alteration_type == MolecularAlterationType::MrnaExpression
                && p.datatype == "CONTINUOUS"
        })
        .cloned()
        .collect()
}

/// Profiles usable for protein-level enrichment.
pub fn pick_protein_profiles(profiles: &[MolecularProfile]) -> Vec<MolecularProfile> {
    profiles
        .iter()
        .filter(|p| {
            p.molecular_alteration_type == MolecularAlterationType::ProteinLevel
                && p.datatype == "LOG2-VALUE"
        })
        .cloned()
        .collect()
}

/// The profile used per study: the first candidate of each study in fetch
/// order, unless the caller supplied an explicit override map, which then
/// replaces the defaults wholesale.
pub fn selected_profile_per_study(
    candidates: &[MolecularProfile],
    overrides: &ProfileByStudy,
) -> ProfileByStudy {
    if !overrides.is_empty() {
        return overrides.clone();
    }
    let mut selected = ProfileByStudy::new();
    for profile in candidates {
        selected
            .entry(profile.study_id.clone())
            .or_insert_with(|| profile.clone());
    }
    selected
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn profile(
        id: &str,
        study_id: &str,
        alteration_type: MolecularAlterationType,
        datatype: &str,
    ) -> MolecularProfile {
        MolecularProfile {
            molecular_profile_id: id.to_string(),
            study_id: study_id.to_string(),
            name: id.to_string(),
            molecular_alteration_type: alteration_type,
            datatype: datatype.to_string(),
        }
    }

    fn fixture() -> Vec<MolecularProfile> {
        vec![
            profile(
                "brca_mutations",
                "brca_tcga",
                MolecularAlterationType::MutationExtended,
                "MAF",
            ),
            profile(
                "brca_gistic",
                "brca_tcga",
                MolecularAlterationType::CopyNumberAlteration,
                "DISCRETE",
            ),
            profile(
                "brca_log2_cna",
                "brca_tcga",
                MolecularAlterationType::CopyNumberAlteration,
                "LOG2-VALUE",
            ),
            profile(
                "brca_rna_seq",
                "brca_tcga",
                MolecularAlterationType::MrnaExpression,
                "CONTINUOUS",
            ),
            profile(
                "brca_rna_seq_zscores",
                "brca_tcga",
                MolecularAlterationType::MrnaExpression,
                "Z-SCORE",
            ),
            profile(
                "brca_rppa",
                "brca_tcga",
                MolecularAlterationType::ProteinLevel,
                "LOG2-VALUE",
            ),
        ]
    }

    #[test]
    fn pickers_filter_by_modality_and_datatype() {
        let profiles = fixture();
        assert_eq!(
            pick_mutation_profiles(&profiles)[0].molecular_profile_id,
            "brca_mutations"
        );
        let cna = pick_copy_number_profiles(&profiles);
        assert_eq!(cna.len(), 1);
        assert_eq!(cna[0].molecular_profile_id, "brca_gistic");
        let mrna = pick_mrna_profiles(&profiles);
        assert_eq!(mrna.len(), 1);
        assert_eq!(mrna[0].molecular_profile_id, "brca_rna_seq");
        assert_eq!(
            pick_protein_profiles(&profiles)[0].molecular_profile_id,
            "brca_rppa"
        );
    }

    #[test]
    fn first_profile_per_study_is_selected() {
        let candidates = vec![
            profile(
                "brca_a",
                "brca_tcga",
                MolecularAlterationType::MutationExtended,
                "MAF",
            ),
            profile(
                "brca_b",
                "brca_tcga",
                MolecularAlterationType::MutationExtended,
                "MAF",
            ),
            profile(
                "luad_a",
                "luad_tcga",
                MolecularAlterationType::MutationExtended,
                "MAF",
            ),
        ];
        let selected = selected_profile_per_study(&candidates, &HashMap::new());
        assert_eq!(selected.len(), 2);
        assert_eq!(selected["brca_tcga"].molecular_profile_id, "brca_a");
        assert_eq!(selected["luad_tcga"].molecular_profile_id, "luad_a");
    }

    #[test]
    fn override_map_replaces_defaults_wholesale() {
        let candidates = vec![
            profile(
                "brca_a",
                "brca_tcga",
                MolecularAlterationType::MutationExtended,
                "MAF",
            ),
            profile(
                "luad_a",
                "luad_tcga",
                MolecularAlterationType::MutationExtended,
                "MAF",
            ),
        ];
        let mut overrides = HashMap::new();
        overrides.insert(
            "brca_tcga".to_string(),
            profile(
                "brca_b",
                "brca_tcga",
                MolecularAlterationType::MutationExtended,
                "MAF",
            ),
        );
        let selected = selected_profile_per_study(&candidates, &overrides);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected["brca_tcga"].molecular_profile_id, "brca_b");
        assert!(!selected.contains_key("luad_tcga"));
    }
}
