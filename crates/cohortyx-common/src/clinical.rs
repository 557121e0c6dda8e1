//! Clinical attributes, per-patient values, and survival constants.

use serde::{Deserialize, Serialize};

pub const OS_STATUS: &str = "OS_STATUS";
pub const OS_MONTHS: &str = "OS_MONTHS";
pub const DFS_STATUS: &str = "DFS_STATUS";
pub const DFS_MONTHS: &str = "DFS_MONTHS";

/// Attributes fetched for survival analysis.
pub const SURVIVAL_CHART_ATTRIBUTES: [&str; 4] = [OS_STATUS, OS_MONTHS, DFS_STATUS, DFS_MONTHS];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalAttribute {
    pub clinical_attribute_id: String,
    pub study_id: String,
    pub display_name: String,
    pub description: String,
    /// Patient-level attribute (as opposed to sample-level).
    pub patient_attribute: bool,
}

/// One attribute value for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalDatum {
    pub study_id: String,
    pub patient_id: String,
    pub clinical_attribute_id: String,
    pub value: String,
}

impl ClinicalDatum {
    pub fn unique_patient_key(&self) -> String {
        format!("{}:{}", self.study_id, self.patient_id)
    }
}

/// A clinical attribute's distribution difference across groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalEnrichment {
    pub attribute: ClinicalAttribute,
    /// Test statistic produced by the enrichment service.
    pub score: f64,
    /// Name of the statistical test applied, e.g. `Kruskal Wallis Test`.
    pub method: String,
    pub p_value: f64,
}

/// One patient's survival observation. `event` is true when the terminal
/// event (death, recurrence) occurred; false means censored at `months`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSurvival {
    pub unique_patient_key: String,
    pub patient_id: String,
    pub study_id: String,
    pub months: f64,
    pub event: bool,
}

/// Study-scoped description of a survival attribute, for chart captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalDescription {
    pub study_name: String,
    pub description: String,
}
