//! Enrichment request and result records.

use serde::{Deserialize, Serialize};

use crate::cases::SampleIdentifier;

// ---------------------------------------------------------------------------
// Request side
// ---------------------------------------------------------------------------

/// Case aggregation level for enrichment requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrichmentType {
    Sample,
    Patient,
}

/// Discrete copy-number event requested from the enrichment service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyNumberEventType {
    #[serde(rename = "HOMDEL")]
    HomDel,
    #[serde(rename = "AMP")]
    Amp,
}

impl CopyNumberEventType {
    /// Numeric alteration direction tagged onto merged copy-number records.
    pub fn alteration(&self) -> i8 {
        match self {
            CopyNumberEventType::HomDel => -2,
            CopyNumberEventType::Amp => 2,
        }
    }
}

/// What the enrichment service should compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrichmentKind {
    Mutation,
    CopyNumber { event_type: CopyNumberEventType },
    /// mRNA and protein share the expression-family endpoint; the profile ids
    /// in the request select the modality.
    Expression,
}

/// (case id, profile id) pair inside a request group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseProfileIdentifier {
    pub case_id: String,
    pub molecular_profile_id: String,
}

/// One group's worth of cases for an alteration enrichment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseGroupFilter {
    pub name: String,
    pub identifiers: Vec<CaseProfileIdentifier>,
}

/// One group's samples for a clinical enrichment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalGroupFilter {
    pub name: String,
    pub sample_identifiers: Vec<SampleIdentifier>,
}

// ---------------------------------------------------------------------------
// Result side
// ---------------------------------------------------------------------------

/// Altered/profiled counts for one group in one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAlterationCount {
    pub group_name: String,
    pub altered_count: u64,
    pub profiled_count: u64,
}

/// One gene's enrichment result across the compared groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterationEnrichment {
    pub entrez_gene_id: i64,
    pub hugo_gene_symbol: String,
    pub cytoband: Option<String>,
    pub counts: Vec<GroupAlterationCount>,
    pub p_value: f64,
}

/// Copy-number enrichment with its alteration direction (−2 HOMDEL, +2 AMP).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyNumberEnrichment {
    #[serde(flatten)]
    pub enrichment: AlterationEnrichment,
    pub alteration: i8,
}

impl CopyNumberEnrichment {
    pub fn tagged(enrichment: AlterationEnrichment, event_type: CopyNumberEventType) -> Self {
        Self {
            enrichment,
            alteration: event_type.alteration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_number_events_map_to_directions() {
        assert_eq!(CopyNumberEventType::HomDel.alteration(), -2);
        assert_eq!(CopyNumberEventType::Amp.alteration(), 2);
        let json = serde_json::to_string(&CopyNumberEventType::HomDel).unwrap();
        assert_eq!(json, "\"HOMDEL\"");
    }

    #[test]
    fn enrichment_kind_serializes_tagged() {
        let kind = EnrichmentKind::CopyNumber {
            event_type: CopyNumberEventType::Amp,
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "{\"kind\":\"copy_number\",\"event_type\":\"AMP\"}");
    }
}
