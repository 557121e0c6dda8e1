//! External collaborators: saved-session lookup, portal metadata, enrichments.
//!
//! The comparison engine never talks to a wire format directly; everything it
//! needs from the outside world comes through these three traits. The mock
//! implementations back the integration tests and the demo binary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use cohortyx_common::cases::{PatientIdentifier, Sample, Study};
use cohortyx_common::clinical::{ClinicalAttribute, ClinicalDatum, ClinicalEnrichment};
use cohortyx_common::enrichments::{
    AlterationEnrichment, CaseGroupFilter, ClinicalGroupFilter, CopyNumberEventType,
    EnrichmentKind, EnrichmentType,
};
use cohortyx_common::groups::GroupData;
use cohortyx_common::profiles::{MolecularProfile, ReferenceGenomeGene};

/// Read access to saved comparison sessions.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// The raw groups stored under a session id.
    async fn session_groups(&self, session_id: &str) -> anyhow::Result<Vec<GroupData>>;
}

/// Sample, study, profile, and clinical metadata lookups.
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// All profiled samples of the given studies.
    async fn samples(&self, study_ids: &[String]) -> anyhow::Result<Vec<Sample>>;

    /// Study metadata for the given study ids.
    async fn studies(&self, study_ids: &[String]) -> anyhow::Result<Vec<Study>>;

    /// Molecular profiles available in the given studies.
    async fn molecular_profiles(
        &self,
        study_ids: &[String],
    ) -> anyhow::Result<Vec<MolecularProfile>>;

    /// Clinical attribute metadata for the given studies.
    async fn clinical_attributes(
        &self,
        study_ids: &[String],
    ) -> anyhow::Result<Vec<ClinicalAttribute>>;

    /// Patient-level clinical values for the given patients and attribute ids.
    async fn patient_clinical_data(
        &self,
        patients: &[PatientIdentifier],
        attribute_ids: &[String],
    ) -> anyhow::Result<Vec<ClinicalDatum>>;

    /// Every gene known to a reference genome build, e.g. `hg38`.
    async fn reference_genome_genes(
        &self,
        genome_build: &str,
    ) -> anyhow::Result<Vec<ReferenceGenomeGene>>;
}

/// Enrichment computation service. P-values come back uncorrected; FDR
/// correction happens on this side of the boundary.
#[async_trait]
pub trait EnrichmentApi: Send + Sync {
    /// Compare alteration frequencies between the given case groups.
    async fn alteration_enrichments(
        &self,
        kind: EnrichmentKind,
        enrichment_type: EnrichmentType,
        groups: &[CaseGroupFilter],
    ) -> anyhow::Result<Vec<AlterationEnrichment>>;

    /// Compare clinical attribute distributions between the given groups.
    async fn clinical_enrichments(
        &self,
        groups: &[ClinicalGroupFilter],
    ) -> anyhow::Result<Vec<ClinicalEnrichment>>;
}

// ── Mock Implementations for Testing ───────────────────────────────────────

/// In-memory session storage.
#[derive(Default)]
pub struct MockSessionApi {
    sessions: HashMap<String, Vec<GroupData>>,
}

impl MockSessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session_id: &str, groups: Vec<GroupData>) -> Self {
        self.sessions.insert(session_id.to_string(), groups);
        self
    }
}

#[async_trait]
impl SessionApi for MockSessionApi {
    async fn session_groups(&self, session_id: &str) -> anyhow::Result<Vec<GroupData>> {
        match self.sessions.get(session_id) {
            Some(groups) => Ok(groups.clone()),
            None => anyhow::bail!("unknown session: {}", session_id),
        }
    }
}

/// In-memory portal fixture. Lookups filter the stored records by study,
/// mirroring what the portal endpoints would return.
#[derive(Default)]
pub struct MockPortalApi {
    samples: Vec<Sample>,
    studies: Vec<Study>,
    profiles: Vec<MolecularProfile>,
    attributes: Vec<ClinicalAttribute>,
    clinical_data: Vec<ClinicalDatum>,
    genes: Vec<ReferenceGenomeGene>,
    clinical_data_calls: AtomicUsize,
}

impl MockPortalApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(mut self, samples: Vec<Sample>) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_studies(mut self, studies: Vec<Study>) -> Self {
        self.studies = studies;
        self
    }

    pub fn with_profiles(mut self, profiles: Vec<MolecularProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_attributes(mut self, attributes: Vec<ClinicalAttribute>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_clinical_data(mut self, data: Vec<ClinicalDatum>) -> Self {
        self.clinical_data = data;
        self
    }

    pub fn with_genes(mut self, genes: Vec<ReferenceGenomeGene>) -> Self {
        self.genes = genes;
        self
    }

    /// How many times `patient_clinical_data` has been called.
    pub fn clinical_data_call_count(&self) -> usize {
        self.clinical_data_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortalApi for MockPortalApi {
    async fn samples(&self, study_ids: &[String]) -> anyhow::Result<Vec<Sample>> {
        Ok(self
            .samples
            .iter()
            .filter(|s| study_ids.contains(&s.study_id))
            .cloned()
            .collect())
    }

    async fn studies(&self, study_ids: &[String]) -> anyhow::Result<Vec<Study>> {
        Ok(self
            .studies
            .iter()
            .filter(|s| study_ids.contains(&s.study_id))
            .cloned()
            .collect())
    }

    async fn molecular_profiles(
        &self,
        study_ids: &[String],
    ) -> anyhow::Result<Vec<MolecularProfile>> {
        Ok(self
            .profiles
            .iter()
            .filter(|p| study_ids.contains(&p.study_id))
            .cloned()
            .collect())
    }

    async fn clinical_attributes(
        &self,
        study_ids: &[String],
    ) -> anyhow::Result<Vec<ClinicalAttribute>> {
        Ok(self
            .attributes
            .iter()
            .filter(|a| study_ids.contains(&a.study_id))
            .cloned()
            .collect())
    }

    async fn patient_clinical_data(
        &self,
        patients: &[PatientIdentifier],
        attribute_ids: &[String],
    ) -> anyhow::Result<Vec<ClinicalDatum>> {
        self.clinical_data_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .clinical_data
            .iter()
            .filter(|d| {
                attribute_ids.contains(&d.clinical_attribute_id)
                    && patients
                        .iter()
                        .any(|p| p.study_id == d.study_id && p.patient_id == d.patient_id)
            })
            .cloned()
            .collect())
    }

    async fn reference_genome_genes(
        &self,
        _genome_build: &str,
    ) -> anyhow::Result<Vec<ReferenceGenomeGene>> {
        Ok(self.genes.clone())
    }
}

/// One recorded `alteration_enrichments` call, for request assertions.
#[derive(Debug, Clone)]
pub struct RecordedAlterationCall {
    pub kind: EnrichmentKind,
    pub enrichment_type: EnrichmentType,
    pub groups: Vec<CaseGroupFilter>,
}

/// Canned enrichment service. Expression results are keyed by the molecular
/// profile id found in the request, so mRNA and protein fixtures can differ.
#[derive(Default)]
pub struct MockEnrichmentApi {
    mutation: Vec<AlterationEnrichment>,
    homdel: Vec<AlterationEnrichment>,
    amp: Vec<AlterationEnrichment>,
    expression: HashMap<String, Vec<AlterationEnrichment>>,
    clinical: Vec<ClinicalEnrichment>,
    fail_alterations: bool,
    fail_clinical: bool,
    alteration_calls: Mutex<Vec<RecordedAlterationCall>>,
    clinical_calls: AtomicUsize,
}

impl MockEnrichmentApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mutation(mut self, records: Vec<AlterationEnrichment>) -> Self {
        self.mutation = records;
        self
    }

    pub fn with_copy_number(
        mut self,
        event_type: CopyNumberEventType,
        records: Vec<AlterationEnrichment>,
    ) -> Self {
        match event_type {
            CopyNumberEventType::HomDel => self.homdel = records,
            CopyNumberEventType::Amp => self.amp = records,
        }
        self
    }

    pub fn with_expression(mut self, profile_id: &str, records: Vec<AlterationEnrichment>) -> Self {
        self.expression.insert(profile_id.to_string(), records);
        self
    }

    pub fn with_clinical(mut self, records: Vec<ClinicalEnrichment>) -> Self {
        self.clinical = records;
        self
    }

    /// Make every alteration request fail.
    pub fn failing_alterations(mut self) -> Self {
        self.fail_alterations = true;
        self
    }

    /// Make every clinical request fail.
    pub fn failing_clinical(mut self) -> Self {
        self.fail_clinical = true;
        self
    }

    /// How many alteration requests were issued.
    pub fn alteration_call_count(&self) -> usize {
        self.alteration_calls.lock().unwrap().len()
    }

    /// Every alteration request issued so far, in call order.
    pub fn recorded_alteration_calls(&self) -> Vec<RecordedAlterationCall> {
        self.alteration_calls.lock().unwrap().clone()
    }

    /// How many clinical requests were issued.
    pub fn clinical_call_count(&self) -> usize {
        self.clinical_calls.load(Ordering::SeqCst)
    }

    fn expression_fixture(&self, groups: &[CaseGroupFilter]) -> Vec<AlterationEnrichment> {
        groups
            .iter()
            .flat_map(|g| g.identifiers.first())
            .map(|id| id.molecular_profile_id.as_str())
            .next()
            .and_then(|profile_id| self.expression.get(profile_id))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EnrichmentApi for MockEnrichmentApi {
    async fn alteration_enrichments(
        &self,
        kind: EnrichmentKind,
        enrichment_type: EnrichmentType,
        groups: &[CaseGroupFilter],
    ) -> anyhow::Result<Vec<AlterationEnrichment>> {
        self.alteration_calls
            .lock()
            .unwrap()
            .push(RecordedAlterationCall {
                kind,
                enrichment_type,
                groups: groups.to_vec(),
            });
        if self.fail_alterations {
            anyhow::bail!("enrichment service unavailable");
        }
        Ok(match kind {
            EnrichmentKind::Mutation => self.mutation.clone(),
            EnrichmentKind::CopyNumber {
                event_type: CopyNumberEventType::HomDel,
            } => self.homdel.clone(),
            EnrichmentKind::CopyNumber {
                event_type: CopyNumberEventType::Amp,
            } => self.amp.clone(),
            EnrichmentKind::Expression => self.expression_fixture(groups),
        })
    }

    async fn clinical_enrichments(
        &self,
        _groups: &[ClinicalGroupFilter],
    ) -> anyhow::Result<Vec<ClinicalEnrichment>> {
        self.clinical_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_clinical {
            anyhow::bail!("clinical enrichment service unavailable");
        }
        Ok(self.clinical.clone())
    }
}
