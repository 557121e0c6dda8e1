//! Case identifiers and sample/study metadata.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Atomic case units
// ---------------------------------------------------------------------------

/// (study, sample) pair — the sample-level case unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleIdentifier {
    pub study_id: String,
    pub sample_id: String,
}

impl SampleIdentifier {
    /// Session-wide unique sample key, e.g. `brca_tcga:TCGA-AR-A1AR-01`.
    pub fn unique_sample_key(&self) -> String {
        format!("{}:{}", self.study_id, self.sample_id)
    }
}

/// (study, patient) pair — the patient-level case unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatientIdentifier {
    pub study_id: String,
    pub patient_id: String,
}

impl PatientIdentifier {
    /// Session-wide unique patient key, e.g. `brca_tcga:TCGA-AR-A1AR`.
    pub fn unique_patient_key(&self) -> String {
        format!("{}:{}", self.study_id, self.patient_id)
    }
}

// ---------------------------------------------------------------------------
// Sample / Study
// ---------------------------------------------------------------------------

/// A profiled sample together with its owning patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub study_id: String,
    pub sample_id: String,
    pub patient_id: String,
}

impl Sample {
    pub fn sample_identifier(&self) -> SampleIdentifier {
        SampleIdentifier {
            study_id: self.study_id.clone(),
            sample_id: self.sample_id.clone(),
        }
    }

    pub fn patient_identifier(&self) -> PatientIdentifier {
        PatientIdentifier {
            study_id: self.study_id.clone(),
            patient_id: self.patient_id.clone(),
        }
    }

    /// Session-wide unique sample key, e.g. `brca_tcga:TCGA-AR-A1AR-01`.
    pub fn unique_sample_key(&self) -> String {
        format!("{}:{}", self.study_id, self.sample_id)
    }

    pub fn unique_patient_key(&self) -> String {
        format!("{}:{}", self.study_id, self.patient_id)
    }
}

/// Study metadata needed by the comparison engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub study_id: String,
    pub name: String,
    /// Reference genome build, e.g. `hg38`; drives reference-gene lookup.
    pub reference_genome: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_keys_are_study_scoped() {
        let sample = Sample {
            study_id: "brca_tcga".into(),
            sample_id: "TCGA-AR-A1AR-01".into(),
            patient_id: "TCGA-AR-A1AR".into(),
        };
        assert_eq!(sample.unique_sample_key(), "brca_tcga:TCGA-AR-A1AR-01");
        assert_eq!(sample.unique_patient_key(), "brca_tcga:TCGA-AR-A1AR");
        assert_eq!(
            sample.patient_identifier().unique_patient_key(),
            sample.unique_patient_key()
        );
    }
}
