//! Survival cohort extraction from per-patient clinical data.

use std::collections::HashMap;

use tracing::debug;

use cohortyx_common::clinical::{ClinicalDatum, PatientSurvival};

/// `OS_STATUS` value marking a death event.
pub fn is_deceased(value: &str) -> bool {
    value == "DECEASED"
}

/// `DFS_STATUS` values marking a recurrence event.
pub fn is_recurred(value: &str) -> bool {
    value == "Recurred/Progressed" || value == "Recurred"
}

/// Extracts one survival observation per patient key from clinical data
/// grouped by unique patient key.
///
/// A patient needs a status value and a parseable months value to be
/// included; everyone else is omitted. A status value the `is_event`
/// predicate rejects still yields an observation, censored at `months`.
pub fn patient_survivals<F>(
    clinical_by_patient_key: &HashMap<String, Vec<ClinicalDatum>>,
    patient_keys: &[String],
    status_attribute_id: &str,
    months_attribute_id: &str,
    is_event: F,
) -> Vec<PatientSurvival>
where
    F: Fn(&str) -> bool,
{
    let mut survivals = Vec::new();
    let mut omitted = 0usize;
    for key in patient_keys {
        let data = match clinical_by_patient_key.get(key) {
            Some(data) => data,
            None => {
                omitted += 1;
                continue;
            }
        };
        let status = data
            .iter()
            .find(|datum| datum.clinical_attribute_id == status_attribute_id);
        let months = data
            .iter()
            .find(|datum| datum.clinical_attribute_id == months_attribute_id)
            .and_then(|datum| datum.value.parse::<f64>().ok());
        match (status, months) {
            (Some(status), Some(months)) => survivals.push(PatientSurvival {
                unique_patient_key: key.clone(),
                patient_id: status.patient_id.clone(),
                study_id: status.study_id.clone(),
                months,
                event: is_event(&status.value),
            }),
            _ => omitted += 1,
        }
    }
    if omitted > 0 {
        debug!(
            attribute = status_attribute_id,
            omitted,
            kept = survivals.len(),
            "patients without usable survival data omitted"
        );
    }
    survivals
}
