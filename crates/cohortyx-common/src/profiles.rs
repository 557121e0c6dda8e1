//! Molecular profile metadata and reference-genome genes.

use serde::{Deserialize, Serialize};

/// Kind of molecular data a profile carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MolecularAlterationType {
    MutationExtended,
    CopyNumberAlteration,
    MrnaExpression,
    ProteinLevel,
    /// Anything the comparison engine does not consume.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MolecularProfile {
    pub molecular_profile_id: String,
    pub study_id: String,
    pub name: String,
    pub molecular_alteration_type: MolecularAlterationType,
    /// e.g. `MAF`, `DISCRETE`, `CONTINUOUS`, `LOG2-VALUE`.
    pub datatype: String,
}

/// A gene known to the reference genome; enrichment results are filtered to
/// genes present here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceGenomeGene {
    pub entrez_gene_id: i64,
    pub hugo_gene_symbol: String,
    pub cytoband: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alteration_type_uses_portal_wire_names() {
        let json = serde_json::to_string(&MolecularAlterationType::MutationExtended).unwrap();
        assert_eq!(json, "\"MUTATION_EXTENDED\"");
        let parsed: MolecularAlterationType =
            serde_json::from_str("\"STRUCTURAL_VARIANT\"").unwrap();
        assert_eq!(parsed, MolecularAlterationType::Other);
    }
}
