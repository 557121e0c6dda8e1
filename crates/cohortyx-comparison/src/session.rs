//! The comparison session: one dependency graph wiring saved groups, portal
//! metadata, overlap handling, enrichments, and survival extraction together.
//!
//! Node handles are public; consumers read or subscribe to whichever results
//! they render. All mutation goes through the setter methods, which feed the
//! session's input cells.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use cohortyx_common::cases::{PatientIdentifier, Sample, SampleIdentifier, Study};
use cohortyx_common::clinical::{
    ClinicalAttribute, ClinicalDatum, ClinicalEnrichment, PatientSurvival, SurvivalDescription,
    DFS_MONTHS, DFS_STATUS, OS_MONTHS, OS_STATUS, SURVIVAL_CHART_ATTRIBUTES,
};
use cohortyx_common::enrichments::{
    AlterationEnrichment, CaseGroupFilter, CopyNumberEnrichment, CopyNumberEventType,
    EnrichmentKind, EnrichmentType,
};
use cohortyx_common::groups::{ComparisonGroup, GroupData, GroupSelection, OverlapStrategy};
use cohortyx_common::profiles::{MolecularProfile, ReferenceGenomeGene};
use cohortyx_graph::{Graph, Input, NodeHandle};
use cohortyx_stats::{
    attach_qvalues, compute_overlap, is_deceased, is_recurred, partition_by_membership,
    patient_survivals, OverlapResult, VennBucket, WithQValue,
};

use crate::config::ComparisonConfig;
use crate::finalize::finalize_groups;
use crate::profiles::{
    pick_copy_number_profiles, pick_mrna_profiles, pick_mutation_profiles, pick_protein_profiles,
    selected_profile_per_study, ProfileByStudy,
};
use crate::remote::{EnrichmentApi, PortalApi, SessionApi};
use crate::requests::{
    alteration_request_groups, clinical_request_groups, expression_request_groups,
};
use crate::tabs::{AnalysisCategory, ShownOnce};

/// The external services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionApi>,
    pub portal: Arc<dyn PortalApi>,
    pub enrichments: Arc<dyn EnrichmentApi>,
}

/// Per-group legend entry handed to enrichment views: display name, color,
/// and the resolved samples behind the counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentAnalysisGroup {
    pub name: String,
    pub color: String,
    pub count: usize,
    pub samples: Vec<Sample>,
}

/// One comparison session over a saved group set.
///
/// Construction wires the whole graph and kicks off the initial fetches; it
/// must run inside a tokio runtime. Dropping the session aborts every driver
/// task.
pub struct ComparisonSession {
    session_id: String,
    instance: Uuid,
    config: ComparisonConfig,
    shown: ShownOnce,
    _graph: Graph,

    // input cells
    selection: Input<GroupSelection>,
    strategy: Input<OverlapStrategy>,
    patient_level: Input<bool>,
    mutation_profile_override: Input<ProfileByStudy>,
    copy_number_profile_override: Input<ProfileByStudy>,
    mrna_profile_override: Input<ProfileByStudy>,
    protein_profile_override: Input<ProfileByStudy>,

    // case and study metadata
    pub raw_groups: NodeHandle<Vec<GroupData>>,
    pub samples: NodeHandle<Vec<Sample>>,
    pub studies: NodeHandle<Vec<Study>>,
    pub sample_set: NodeHandle<HashMap<SampleIdentifier, Sample>>,
    pub patient_to_samples: NodeHandle<HashMap<String, Vec<Sample>>>,
    pub study_by_id: NodeHandle<HashMap<String, Study>>,
    pub groups: NodeHandle<Vec<ComparisonGroup>>,
    pub uid_to_group: NodeHandle<HashMap<String, ComparisonGroup>>,

    // overlap and selection
    pub overlap: NodeHandle<OverlapResult>,
    pub available_groups: NodeHandle<Vec<ComparisonGroup>>,
    pub active_groups: NodeHandle<Vec<ComparisonGroup>>,
    pub active_groups_with_overlap: NodeHandle<Vec<ComparisonGroup>>,
    pub active_samples: NodeHandle<Vec<Sample>>,
    pub active_patient_keys: NodeHandle<Vec<String>>,
    pub active_study_ids: NodeHandle<Vec<String>>,
    pub enrichment_analysis_groups: NodeHandle<Vec<EnrichmentAnalysisGroup>>,

    // venn partitions
    pub sample_venn: NodeHandle<Vec<VennBucket>>,
    pub patient_venn: NodeHandle<Vec<VennBucket>>,

    // molecular profiles
    pub molecular_profiles: NodeHandle<Vec<MolecularProfile>>,
    pub mutation_profiles: NodeHandle<Vec<MolecularProfile>>,
    pub copy_number_profiles: NodeHandle<Vec<MolecularProfile>>,
    pub mrna_profiles: NodeHandle<Vec<MolecularProfile>>,
    pub protein_profiles: NodeHandle<Vec<MolecularProfile>>,
    pub selected_mutation_profiles: NodeHandle<ProfileByStudy>,
    pub selected_copy_number_profiles: NodeHandle<ProfileByStudy>,
    pub selected_mrna_profiles: NodeHandle<ProfileByStudy>,
    pub selected_protein_profiles: NodeHandle<ProfileByStudy>,

    // reference genome
    pub reference_genes: NodeHandle<Vec<ReferenceGenomeGene>>,
    pub gene_by_symbol: NodeHandle<HashMap<String, ReferenceGenomeGene>>,

    // enrichments
    pub mutation_enrichments: NodeHandle<Vec<WithQValue<AlterationEnrichment>>>,
    pub copy_number_request_groups: NodeHandle<Vec<CaseGroupFilter>>,
    pub homdel_enrichments: NodeHandle<Vec<AlterationEnrichment>>,
    pub amp_enrichments: NodeHandle<Vec<AlterationEnrichment>>,
    pub copy_number_enrichments: NodeHandle<Vec<WithQValue<CopyNumberEnrichment>>>,
    pub mrna_enrichments: NodeHandle<Vec<WithQValue<AlterationEnrichment>>>,
    pub protein_enrichments: NodeHandle<Vec<WithQValue<AlterationEnrichment>>>,
    pub clinical_enrichments_raw: NodeHandle<Vec<ClinicalEnrichment>>,
    pub clinical_enrichments: NodeHandle<Vec<WithQValue<ClinicalEnrichment>>>,

    // survival
    pub survival_clinical_data: NodeHandle<Vec<ClinicalDatum>>,
    pub survival_data_exists: NodeHandle<bool>,
    pub survival_by_patient: NodeHandle<HashMap<String, Vec<ClinicalDatum>>>,
    pub overall_survivals: NodeHandle<Vec<PatientSurvival>>,
    pub disease_free_survivals: NodeHandle<Vec<PatientSurvival>>,
    pub clinical_attributes: NodeHandle<Vec<ClinicalAttribute>>,
    pub overall_survival_descriptions: NodeHandle<Vec<SurvivalDescription>>,
    pub disease_free_survival_descriptions: NodeHandle<Vec<SurvivalDescription>>,
}

impl ComparisonSession {
    pub fn new(
        session_id: impl Into<String>,
        collaborators: Collaborators,
        config: ComparisonConfig,
    ) -> Self {
        let session_id = session_id.into();
        let instance = Uuid::new_v4();
        info!(session = %session_id, instance = %instance, "comparison session starting");

        let graph = Graph::new();

        // ── Input cells ────────────────────────────────────────────────────

        let selection = graph.input("group-selection", GroupSelection::all_selected());
        let strategy = graph.input("overlap-strategy", config.default_overlap_strategy);
        let patient_level = graph.input(
            "patient-level-enrichments",
            config.patient_level_enrichments,
        );
        let mutation_profile_override =
            graph.input("mutation-profile-override", ProfileByStudy::new());
        let copy_number_profile_override =
            graph.input("copy-number-profile-override", ProfileByStudy::new());
        let mrna_profile_override = graph.input("mrna-profile-override", ProfileByStudy::new());
        let protein_profile_override =
            graph.input("protein-profile-override", ProfileByStudy::new());

        // ── Case and study metadata ────────────────────────────────────────

        let raw_groups = graph.node("raw-groups", (), {
            let sessions = Arc::clone(&collaborators.sessions);
            let session_id = session_id.clone();
            move |()| {
                let sessions = Arc::clone(&sessions);
                let session_id = session_id.clone();
                async move { Ok(sessions.session_groups(&session_id).await?) }
            }
        });

        let session_study_ids = graph.node("session-study-ids", raw_groups.clone(), |groups| {
            async move {
                Ok(unique_in_order(
                    groups
                        .iter()
                        .flat_map(|g| g.studies.iter().map(|s| s.study_id.clone())),
                ))
            }
        });

        let samples = graph.node("samples", session_study_ids.clone(), {
            let portal = Arc::clone(&collaborators.portal);
            move |study_ids| {
                let portal = Arc::clone(&portal);
                async move { Ok(portal.samples(&study_ids).await?) }
            }
        });

        let studies = graph.node("studies", session_study_ids.clone(), {
            let portal = Arc::clone(&collaborators.portal);
            move |study_ids| {
                let portal = Arc::clone(&portal);
                async move { Ok(portal.studies(&study_ids).await?) }
            }
        });

        let sample_set = graph.node("sample-set", samples.clone(), |samples| async move {
            Ok(samples
                .iter()
                .map(|s| (s.sample_identifier(), s.clone()))
                .collect::<HashMap<_, _>>())
        });

        let patient_to_samples =
            graph.node("patient-to-samples", samples.clone(), |samples| async move {
                let mut map: HashMap<String, Vec<Sample>> = HashMap::new();
                for sample in samples.iter() {
                    map.entry(sample.unique_patient_key())
                        .or_default()
                        .push(sample.clone());
                }
                Ok(map)
            });

        let study_by_id = graph.node("study-by-id", studies.clone(), |studies| async move {
            Ok(studies
                .iter()
                .map(|s| (s.study_id.clone(), s.clone()))
                .collect::<HashMap<_, _>>())
        });

        let groups = graph.node(
            "groups",
            (raw_groups.clone(), sample_set.clone()),
            |(raw, sample_set)| async move {
                let finalized = finalize_groups(&raw, &sample_set)?;
                debug!(groups = finalized.len(), "groups finalized");
                Ok(finalized)
            },
        );

        let uid_to_group = graph.node("uid-to-group", groups.clone(), |groups| async move {
            Ok(groups
                .iter()
                .map(|g| (g.uid.clone(), g.clone()))
                .collect::<HashMap<_, _>>())
        });

        // ── Overlap and selection ──────────────────────────────────────────

        let overlap = graph.node(
            "overlap",
            (groups.clone(), selection.clone()),
            |(groups, selection)| async move {
                Ok(compute_overlap(&groups, |uid| selection.is_selected(uid)))
            },
        );

        let available_groups = graph.node(
            "available-groups",
            (groups.clone(), overlap.clone(), strategy.clone()),
            |(groups, overlap, strategy)| async move {
                Ok(strategy_adjusted_groups(&groups, &overlap, *strategy))
            },
        );

        let active_groups = graph.node(
            "active-groups",
            (groups.clone(), overlap.clone(), strategy.clone()),
            |(groups, overlap, strategy)| async move {
                Ok(strategy_adjusted_groups(&groups, &overlap, *strategy)
                    .into_iter()
                    .filter(|g| overlap.selected_uids.contains(&g.uid) && !g.is_empty())
                    .collect::<Vec<_>>())
            },
        );

        // active groups with their overlapping cases still in place, for the
        // venn partitions and the case universe
        let active_groups_with_overlap = graph.node(
            "active-groups-with-overlap",
            (groups.clone(), overlap.clone(), strategy.clone()),
            |(groups, overlap, strategy)| async move {
                let excluded = overlap.excluded_for(*strategy);
                Ok(groups
                    .iter()
                    .filter(|g| {
                        overlap.selected_uids.contains(&g.uid) && !excluded.contains(&g.uid)
                    })
                    .cloned()
                    .collect::<Vec<_>>())
            },
        );

        let active_samples = graph.node(
            "active-samples",
            (active_groups_with_overlap.clone(), sample_set.clone()),
            |(groups, sample_set)| async move {
                let mut seen = HashSet::new();
                let mut samples = Vec::new();
                for group in groups.iter() {
                    for identifier in group.sample_identifiers() {
                        if let Some(sample) = sample_set.get(&identifier) {
                            if seen.insert(sample.unique_sample_key()) {
                                samples.push(sample.clone());
                            }
                        }
                    }
                }
                Ok(samples)
            },
        );

        let active_patient_keys = graph.node(
            "active-patient-keys",
            active_samples.clone(),
            |samples| async move {
                Ok(unique_in_order(
                    samples.iter().map(|s| s.unique_patient_key()),
                ))
            },
        );

        let active_study_ids = graph.node(
            "active-study-ids",
            active_groups.clone(),
            |groups| async move {
                Ok(unique_in_order(
                    groups
                        .iter()
                        .flat_map(|g| g.study_ids().map(str::to_string)),
                ))
            },
        );

        let enrichment_analysis_groups = graph.node(
            "enrichment-analysis-groups",
            (active_groups.clone(), sample_set.clone()),
            |(groups, sample_set)| async move {
                Ok(groups
                    .iter()
                    .map(|group| {
                        let samples: Vec<Sample> = group
                            .sample_identifiers()
                            .iter()
                            .filter_map(|id| sample_set.get(id).cloned())
                            .collect();
                        EnrichmentAnalysisGroup {
                            name: group.name_with_ordinal(),
                            color: group.color.clone(),
                            count: samples.len(),
                            samples,
                        }
                    })
                    .collect::<Vec<_>>())
            },
        );

        // ── Venn partitions ────────────────────────────────────────────────

        let sample_venn = graph.node(
            "sample-venn",
            (active_groups_with_overlap.clone(), active_samples.clone()),
            |(groups, samples)| async move {
                let universe: Vec<String> =
                    samples.iter().map(Sample::unique_sample_key).collect();
                Ok(partition_by_membership(
                    &groups,
                    |g| g.uid.as_str(),
                    |g| {
                        g.sample_identifiers()
                            .iter()
                            .map(SampleIdentifier::unique_sample_key)
                            .collect()
                    },
                    &universe,
                ))
            },
        );

        let patient_venn = graph.node(
            "patient-venn",
            (
                active_groups_with_overlap.clone(),
                active_patient_keys.clone(),
            ),
            |(groups, universe)| async move {
                Ok(partition_by_membership(
                    &groups,
                    |g| g.uid.as_str(),
                    |g| {
                        g.patient_identifiers()
                            .iter()
                            .map(PatientIdentifier::unique_patient_key)
                            .collect()
                    },
                    &universe,
                ))
            },
        );

        // ── Molecular profiles ─────────────────────────────────────────────

        let molecular_profiles = graph.node("molecular-profiles", active_study_ids.clone(), {
            let portal = Arc::clone(&collaborators.portal);
            move |study_ids| {
                let portal = Arc::clone(&portal);
                async move {
                    if study_ids.is_empty() {
                        return Ok(Vec::new());
                    }
                    Ok(portal.molecular_profiles(&study_ids).await?)
                }
            }
        });

        let mutation_profiles = graph.node(
            "mutation-profiles",
            molecular_profiles.clone(),
            |profiles| async move { Ok(pick_mutation_profiles(&profiles)) },
        );
        let copy_number_profiles = graph.node(
            "copy-number-profiles",
            molecular_profiles.clone(),
            |profiles| async move { Ok(pick_copy_number_profiles(&profiles)) },
        );
        let mrna_profiles = graph.node(
            "mrna-profiles",
            molecular_profiles.clone(),
            |profiles| async move { Ok(pick_mrna_profiles(&profiles)) },
        );
        let protein_profiles = graph.node(
            "protein-profiles",
            molecular_profiles.clone(),
            |profiles| async move { Ok(pick_protein_profiles(&profiles)) },
        );

        let selected_mutation_profiles = graph.node(
            "selected-mutation-profiles",
            (mutation_profiles.clone(), mutation_profile_override.clone()),
            |(candidates, overrides)| async move {
                Ok(selected_profile_per_study(&candidates, &overrides))
            },
        );
        let selected_copy_number_profiles = graph.node(
            "selected-copy-number-profiles",
            (
                copy_number_profiles.clone(),
                copy_number_profile_override.clone(),
            ),
            |(candidates, overrides)| async move {
                Ok(selected_profile_per_study(&candidates, &overrides))
            },
        );
        let selected_mrna_profiles = graph.node(
            "selected-mrna-profiles",
            (mrna_profiles.clone(), mrna_profile_override.clone()),
            |(candidates, overrides)| async move {
                Ok(selected_profile_per_study(&candidates, &overrides))
            },
        );
        let selected_protein_profiles = graph.node(
            "selected-protein-profiles",
            (protein_profiles.clone(), protein_profile_override.clone()),
            |(candidates, overrides)| async move {
                Ok(selected_profile_per_study(&candidates, &overrides))
            },
        );

        // ── Reference genome ───────────────────────────────────────────────

        let reference_genes = graph.node("reference-genes", studies.clone(), {
            let portal = Arc::clone(&collaborators.portal);
            move |studies| {
                let portal = Arc::clone(&portal);
                async move {
                    let build = match studies.first() {
                        Some(study) => study.reference_genome.clone(),
                        None => return Ok(Vec::new()),
                    };
                    Ok(portal.reference_genome_genes(&build).await?)
                }
            }
        });

        let gene_by_symbol =
            graph.node("gene-by-symbol", reference_genes.clone(), |genes| async move {
                Ok(genes
                    .iter()
                    .map(|g| (g.hugo_gene_symbol.clone(), g.clone()))
                    .collect::<HashMap<_, _>>())
            });

        // ── Enrichments ────────────────────────────────────────────────────

        let mutation_enrichments = graph.node(
            "mutation-enrichments",
            (
                selected_mutation_profiles.clone(),
                active_groups.clone(),
                patient_level.clone(),
                gene_by_symbol.clone(),
            ),
            {
                let service = Arc::clone(&collaborators.enrichments);
                let min_groups = config.min_comparison_groups;
                move |(profile_by_study, groups, patient_level, genes)| {
                    let service = Arc::clone(&service);
                    async move {
                        if groups.len() < min_groups || profile_by_study.is_empty() {
                            return Ok(Vec::new());
                        }
                        let request =
                            alteration_request_groups(&groups, &profile_by_study, *patient_level);
                        let records = service
                            .alteration_enrichments(
                                EnrichmentKind::Mutation,
                                enrichment_level(*patient_level),
                                &request,
                            )
                            .await?;
                        debug!(records = records.len(), "mutation enrichments fetched");
                        Ok(reference_filtered_qvalues(records, &genes))
                    }
                }
            },
        );

        let copy_number_request_groups = graph.node(
            "copy-number-request-groups",
            (
                selected_copy_number_profiles.clone(),
                active_groups.clone(),
                patient_level.clone(),
            ),
            |(profile_by_study, groups, patient_level)| async move {
                Ok(alteration_request_groups(
                    &groups,
                    &profile_by_study,
                    *patient_level,
                ))
            },
        );

        let homdel_enrichments = graph.node(
            "homdel-enrichments",
            (copy_number_request_groups.clone(), patient_level.clone()),
            {
                let service = Arc::clone(&collaborators.enrichments);
                let min_groups = config.min_comparison_groups;
                move |(request, patient_level)| {
                    let service = Arc::clone(&service);
                    async move {
                        if request.len() < min_groups
                            || request.iter().all(|g| g.identifiers.is_empty())
                        {
                            return Ok(Vec::new());
                        }
                        Ok(service
                            .alteration_enrichments(
                                EnrichmentKind::CopyNumber {
                                    event_type: CopyNumberEventType::HomDel,
                                },
                                enrichment_level(*patient_level),
                                &request,
                            )
                            .await?)
                    }
                }
            },
        );

        let amp_enrichments = graph.node(
            "amp-enrichments",
            (copy_number_request_groups.clone(), patient_level.clone()),
            {
                let service = Arc::clone(&collaborators.enrichments);
                let min_groups = config.min_comparison_groups;
                move |(request, patient_level)| {
                    let service = Arc::clone(&service);
                    async move {
                        if request.len() < min_groups
                            || request.iter().all(|g| g.identifiers.is_empty())
                        {
                            return Ok(Vec::new());
                        }
                        Ok(service
                            .alteration_enrichments(
                                EnrichmentKind::CopyNumber {
                                    event_type: CopyNumberEventType::Amp,
                                },
                                enrichment_level(*patient_level),
                                &request,
                            )
                            .await?)
                    }
                }
            },
        );

        // amplifications first, then deletions, each tagged with its direction
        let copy_number_enrichments = graph.node(
            "copy-number-enrichments",
            (
                amp_enrichments.clone(),
                homdel_enrichments.clone(),
                gene_by_symbol.clone(),
            ),
            |(amp, homdel, genes)| async move {
                let mut merged: Vec<CopyNumberEnrichment> =
                    Vec::with_capacity(amp.len() + homdel.len());
                merged.extend(
                    amp.iter()
                        .cloned()
                        .map(|r| CopyNumberEnrichment::tagged(r, CopyNumberEventType::Amp)),
                );
                merged.extend(
                    homdel
                        .iter()
                        .cloned()
                        .map(|r| CopyNumberEnrichment::tagged(r, CopyNumberEventType::HomDel)),
                );
                Ok(copy_number_filtered_qvalues(merged, &genes))
            },
        );

        let mrna_enrichments = graph.node(
            "mrna-enrichments",
            (
                selected_mrna_profiles.clone(),
                active_groups.clone(),
                gene_by_symbol.clone(),
            ),
            {
                let service = Arc::clone(&collaborators.enrichments);
                let min_groups = config.min_comparison_groups;
                move |(profile_by_study, groups, genes)| {
                    let service = Arc::clone(&service);
                    async move {
                        if groups.len() < min_groups {
                            return Ok(Vec::new());
                        }
                        // expression enrichment only works within one study
                        let profile = match single_study_profile(&profile_by_study) {
                            Some(profile) => profile,
                            None => return Ok(Vec::new()),
                        };
                        let request = expression_request_groups(&groups, &profile);
                        let records = service
                            .alteration_enrichments(
                                EnrichmentKind::Expression,
                                EnrichmentType::Sample,
                                &request,
                            )
                            .await?;
                        Ok(reference_filtered_qvalues(records, &genes))
                    }
                }
            },
        );

        let protein_enrichments = graph.node(
            "protein-enrichments",
            (
                selected_protein_profiles.clone(),
                active_groups.clone(),
                gene_by_symbol.clone(),
            ),
            {
                let service = Arc::clone(&collaborators.enrichments);
                let min_groups = config.min_comparison_groups;
                move |(profile_by_study, groups, genes)| {
                    let service = Arc::clone(&service);
                    async move {
                        if groups.len() < min_groups {
                            return Ok(Vec::new());
                        }
                        let profile = match single_study_profile(&profile_by_study) {
                            Some(profile) => profile,
                            None => return Ok(Vec::new()),
                        };
                        let request = expression_request_groups(&groups, &profile);
                        let records = service
                            .alteration_enrichments(
                                EnrichmentKind::Expression,
                                EnrichmentType::Sample,
                                &request,
                            )
                            .await?;
                        Ok(reference_filtered_qvalues(records, &genes))
                    }
                }
            },
        );

        // A clinical service outage degrades to "no clinical enrichments"
        // instead of erroring the page; alteration enrichments stay loud.
        let clinical_enrichments_raw = graph.node_or_default(
            "clinical-enrichments-raw",
            active_groups.clone(),
            {
                let service = Arc::clone(&collaborators.enrichments);
                let min_groups = config.min_comparison_groups;
                move |groups| {
                    let service = Arc::clone(&service);
                    async move {
                        if groups.len() < min_groups {
                            return Ok(Vec::new());
                        }
                        let request = clinical_request_groups(&groups);
                        Ok(service.clinical_enrichments(&request).await?)
                    }
                }
            },
        );

        let clinical_enrichments = graph.node_or_default(
            "clinical-enrichments",
            clinical_enrichments_raw.clone(),
            |records| async move { Ok(attach_qvalues((*records).clone(), |r| r.p_value)) },
        );

        // ── Survival ───────────────────────────────────────────────────────

        let survival_clinical_data = graph.node(
            "survival-clinical-data",
            active_samples.clone(),
            {
                let portal = Arc::clone(&collaborators.portal);
                move |samples| {
                    let portal = Arc::clone(&portal);
                    async move {
                        if samples.is_empty() {
                            return Ok(Vec::new());
                        }
                        let mut seen = HashSet::new();
                        let patients: Vec<PatientIdentifier> = samples
                            .iter()
                            .filter(|s| seen.insert(s.unique_patient_key()))
                            .map(Sample::patient_identifier)
                            .collect();
                        let attributes: Vec<String> = SURVIVAL_CHART_ATTRIBUTES
                            .iter()
                            .map(|a| a.to_string())
                            .collect();
                        Ok(portal.patient_clinical_data(&patients, &attributes).await?)
                    }
                }
            },
        );

        let survival_data_exists = graph.node(
            "survival-data-exists",
            survival_clinical_data.clone(),
            |data| async move { Ok(!data.is_empty()) },
        );

        let survival_by_patient = graph.node(
            "survival-by-patient",
            survival_clinical_data.clone(),
            |data| async move {
                let mut map: HashMap<String, Vec<ClinicalDatum>> = HashMap::new();
                for datum in data.iter() {
                    map.entry(datum.unique_patient_key())
                        .or_default()
                        .push(datum.clone());
                }
                Ok(map)
            },
        );

        let overall_survivals = graph.node(
            "overall-survivals",
            (survival_by_patient.clone(), active_patient_keys.clone()),
            |(by_patient, keys)| async move {
                Ok(patient_survivals(
                    &by_patient,
                    &keys,
                    OS_STATUS,
                    OS_MONTHS,
                    is_deceased,
                ))
            },
        );

        let disease_free_survivals = graph.node(
            "disease-free-survivals",
            (survival_by_patient.clone(), active_patient_keys.clone()),
            |(by_patient, keys)| async move {
                Ok(patient_survivals(
                    &by_patient,
                    &keys,
                    DFS_STATUS,
                    DFS_MONTHS,
                    is_recurred,
                ))
            },
        );

        let clinical_attributes = graph.node("clinical-attributes", active_study_ids.clone(), {
            let portal = Arc::clone(&collaborators.portal);
            move |study_ids| {
                let portal = Arc::clone(&portal);
                async move {
                    if study_ids.is_empty() {
                        return Ok(Vec::new());
                    }
                    Ok(portal.clinical_attributes(&study_ids).await?)
                }
            }
        });

        let overall_survival_descriptions = graph.node(
            "os-descriptions",
            (clinical_attributes.clone(), study_by_id.clone()),
            |(attributes, studies)| async move {
                Ok(survival_descriptions(&attributes, &studies, OS_STATUS))
            },
        );

        let disease_free_survival_descriptions = graph.node(
            "dfs-descriptions",
            (clinical_attributes.clone(), study_by_id.clone()),
            |(attributes, studies)| async move {
                Ok(survival_descriptions(&attributes, &studies, DFS_STATUS))
            },
        );

        Self {
            session_id,
            instance,
            config,
            shown: ShownOnce::new(),
            _graph: graph,
            selection,
            strategy,
            patient_level,
            mutation_profile_override,
            copy_number_profile_override,
            mrna_profile_override,
            protein_profile_override,
            raw_groups,
            samples,
            studies,
            sample_set,
            patient_to_samples,
            study_by_id,
            groups,
            uid_to_group,
            overlap,
            available_groups,
            active_groups,
            active_groups_with_overlap,
            active_samples,
            active_patient_keys,
            active_study_ids,
            enrichment_analysis_groups,
            sample_venn,
            patient_venn,
            molecular_profiles,
            mutation_profiles,
            copy_number_profiles,
            mrna_profiles,
            protein_profiles,
            selected_mutation_profiles,
            selected_copy_number_profiles,
            selected_mrna_profiles,
            selected_protein_profiles,
            reference_genes,
            gene_by_symbol,
            mutation_enrichments,
            copy_number_request_groups,
            homdel_enrichments,
            amp_enrichments,
            copy_number_enrichments,
            mrna_enrichments,
            protein_enrichments,
            clinical_enrichments_raw,
            clinical_enrichments,
            survival_clinical_data,
            survival_data_exists,
            survival_by_patient,
            overall_survivals,
            disease_free_survivals,
            clinical_attributes,
            overall_survival_descriptions,
            disease_free_survival_descriptions,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Instance id used for log correlation; a new one per construction.
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    pub fn overlap_strategy(&self) -> OverlapStrategy {
        *self.strategy.get()
    }

    pub fn patient_level_enrichments(&self) -> bool {
        *self.patient_level.get()
    }

    // ── Setters ────────────────────────────────────────────────────────────

    pub fn set_group_selected(&self, uid: &str, selected: bool) {
        info!(instance = %self.instance, uid, selected, "group selection changed");
        self.selection.update(|current| {
            let mut next = current.clone();
            next.set_selected(uid, selected);
            next
        });
    }

    pub fn set_overlap_strategy(&self, strategy: OverlapStrategy) {
        info!(instance = %self.instance, ?strategy, "overlap strategy changed");
        self.strategy.set(strategy);
    }

    pub fn set_patient_level_enrichments(&self, enabled: bool) {
        info!(instance = %self.instance, enabled, "enrichment granularity changed");
        self.patient_level.set(enabled);
    }

    /// Replace the per-study mutation profile defaults. An empty map restores
    /// first-per-study selection.
    pub fn set_mutation_profile_override(&self, overrides: ProfileByStudy) {
        info!(instance = %self.instance, studies = overrides.len(), "mutation profile override");
        self.mutation_profile_override.set(overrides);
    }

    pub fn set_copy_number_profile_override(&self, overrides: ProfileByStudy) {
        info!(instance = %self.instance, studies = overrides.len(), "copy-number profile override");
        self.copy_number_profile_override.set(overrides);
    }

    pub fn set_mrna_profile_override(&self, overrides: ProfileByStudy) {
        info!(instance = %self.instance, studies = overrides.len(), "mRNA profile override");
        self.mrna_profile_override.set(overrides);
    }

    pub fn set_protein_profile_override(&self, overrides: ProfileByStudy) {
        info!(instance = %self.instance, studies = overrides.len(), "protein profile override");
        self.protein_profile_override.set(overrides);
    }

    // ── Analysis category availability ─────────────────────────────────────

    fn active_group_count(&self) -> Option<usize> {
        self.active_groups.get().ok().map(|groups| groups.len())
    }

    fn active_study_count(&self) -> Option<usize> {
        self.active_study_ids.get().ok().map(|ids| ids.len())
    }

    fn too_few_groups(&self) -> bool {
        matches!(
            self.active_group_count(),
            Some(count) if count < self.config.min_comparison_groups
        )
    }

    /// A category shows while it is showable; once shown it keeps showing
    /// after every group is deselected, until the session ends.
    fn show_category(&self, category: AnalysisCategory, showable: bool) -> bool {
        if showable {
            self.shown.latch(category);
            return true;
        }
        self.active_group_count() == Some(0) && self.shown.was_shown(category)
    }

    pub fn survival_showable(&self) -> bool {
        self.survival_data_exists
            .get()
            .map(|exists| *exists)
            .unwrap_or(false)
    }

    pub fn show_survival(&self) -> bool {
        self.show_category(AnalysisCategory::Survival, self.survival_showable())
    }

    pub fn survival_unavailable(&self) -> bool {
        matches!(self.active_group_count(), Some(count) if count > self.config.max_survival_groups)
            || !self.survival_showable()
    }

    pub fn mutations_showable(&self) -> bool {
        self.mutation_profiles
            .get()
            .map(|profiles| !profiles.is_empty())
            .unwrap_or(false)
    }

    pub fn show_mutations(&self) -> bool {
        self.show_category(AnalysisCategory::Mutations, self.mutations_showable())
    }

    pub fn mutations_unavailable(&self) -> bool {
        self.too_few_groups() || !self.mutations_showable()
    }

    pub fn copy_number_showable(&self) -> bool {
        self.copy_number_profiles
            .get()
            .map(|profiles| !profiles.is_empty())
            .unwrap_or(false)
    }

    pub fn show_copy_number(&self) -> bool {
        self.show_category(AnalysisCategory::CopyNumber, self.copy_number_showable())
    }

    pub fn copy_number_unavailable(&self) -> bool {
        self.too_few_groups() || !self.copy_number_showable()
    }

    pub fn mrna_showable(&self) -> bool {
        self.mrna_profiles
            .get()
            .map(|profiles| !profiles.is_empty())
            .unwrap_or(false)
    }

    pub fn show_mrna(&self) -> bool {
        self.show_category(AnalysisCategory::MrnaExpression, self.mrna_showable())
    }

    pub fn mrna_unavailable(&self) -> bool {
        self.too_few_groups()
            || matches!(self.active_study_count(), Some(count) if count > 1)
            || !self.mrna_showable()
    }

    pub fn protein_showable(&self) -> bool {
        self.protein_profiles
            .get()
            .map(|profiles| !profiles.is_empty())
            .unwrap_or(false)
    }

    pub fn show_protein(&self) -> bool {
        self.show_category(AnalysisCategory::Protein, self.protein_showable())
    }

    pub fn protein_unavailable(&self) -> bool {
        self.too_few_groups()
            || matches!(self.active_study_count(), Some(count) if count > 1)
            || !self.protein_showable()
    }

    /// Clinical comparison is always rendered; it only grays out below the
    /// group minimum.
    pub fn clinical_unavailable(&self) -> bool {
        self.too_few_groups()
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn unique_in_order<I>(items: I) -> Vec<String>
where
    I: Iterator<Item = String>,
{
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}

/// The group list as the overlap strategy presents it: untouched under
/// INCLUDE, contested cases removed under EXCLUDE.
fn strategy_adjusted_groups(
    groups: &[ComparisonGroup],
    overlap: &OverlapResult,
    strategy: OverlapStrategy,
) -> Vec<ComparisonGroup> {
    match strategy {
        OverlapStrategy::Include => groups.to_vec(),
        OverlapStrategy::Exclude => overlap.groups.clone(),
    }
}

fn enrichment_level(patient_level: bool) -> EnrichmentType {
    if patient_level {
        EnrichmentType::Patient
    } else {
        EnrichmentType::Sample
    }
}

/// The single selected profile, or None when zero or several studies carry
/// one.
fn single_study_profile(profile_by_study: &ProfileByStudy) -> Option<MolecularProfile> {
    if profile_by_study.len() == 1 {
        profile_by_study.values().next().cloned()
    } else {
        None
    }
}

/// Drops records for genes the reference genome does not know, then attaches
/// q-values sorted by p-value.
fn reference_filtered_qvalues(
    records: Vec<AlterationEnrichment>,
    genes: &HashMap<String, ReferenceGenomeGene>,
) -> Vec<WithQValue<AlterationEnrichment>> {
    let known: Vec<AlterationEnrichment> = records
        .into_iter()
        .filter(|r| genes.contains_key(&r.hugo_gene_symbol))
        .collect();
    attach_qvalues(known, |r| r.p_value)
}

fn copy_number_filtered_qvalues(
    records: Vec<CopyNumberEnrichment>,
    genes: &HashMap<String, ReferenceGenomeGene>,
) -> Vec<WithQValue<CopyNumberEnrichment>> {
    let known: Vec<CopyNumberEnrichment> = records
        .into_iter()
        .filter(|r| genes.contains_key(&r.enrichment.hugo_gene_symbol))
        .collect();
    attach_qvalues(known, |r| r.enrichment.p_value)
}

fn survival_descriptions(
    attributes: &[ClinicalAttribute],
    study_by_id: &HashMap<String, Study>,
    status_attribute_id: &str,
) -> Vec<SurvivalDescription> {
    attributes
        .iter()
        .filter(|a| a.clinical_attribute_id == status_attribute_id)
        .filter_map(|a| {
            study_by_id.get(&a.study_id).map(|study| SurvivalDescription {
                study_name: study.name.clone(),
                description: a.description.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn unique_in_order_keeps_first_occurrence() {
        let ids = unique_in_order(
            ["b", "a", "b", "c", "a"]
                .iter()
                .map(|s| s.to_string()),
        );
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn enrichment_level_follows_granularity_flag() {
        assert_eq!(enrichment_level(true), EnrichmentType::Patient);
        assert_eq!(enrichment_level(false), EnrichmentType::Sample);
    }

    #[test]
    fn single_study_profile_requires_exactly_one_entry() {
        use cohortyx_common::profiles::MolecularAlterationType;

        let profile = MolecularProfile {
            molecular_profile_id: "brca_rna".into(),
            study_id: "brca_tcga".into(),
            name: "mRNA".into(),
            molecular_alteration_type: MolecularAlterationType::MrnaExpression,
            datatype: "CONTINUOUS".into(),
        };
        assert!(single_study_profile(&ProfileByStudy::new()).is_none());

        let mut one = ProfileByStudy::new();
        one.insert("brca_tcga".into(), profile.clone());
        assert_eq!(
            single_study_profile(&one).map(|p| p.molecular_profile_id),
            Some("brca_rna".to_string())
        );

        let mut two = one.clone();
        two.insert("luad_tcga".into(), profile);
        assert!(single_study_profile(&two).is_none());
    }

    #[test]
    fn unknown_genes_are_dropped_before_correction() {
        let records = vec![
            AlterationEnrichment {
                entrez_gene_id: 7157,
                hugo_gene_symbol: "TP53".into(),
                cytoband: Some("17p13.1".into()),
                counts: vec![],
                p_value: 0.04,
            },
            AlterationEnrichment {
                entrez_gene_id: 999_999,
                hugo_gene_symbol: "NOT_A_GENE".into(),
                cytoband: None,
                counts: vec![],
                p_value: 0.01,
            },
        ];
        let mut genes = HashMap::new();
        genes.insert(
            "TP53".to_string(),
            ReferenceGenomeGene {
                entrez_gene_id: 7157,
                hugo_gene_symbol: "TP53".into(),
                cytoband: Some("17p13.1".into()),
            },
        );

        let corrected = reference_filtered_qvalues(records, &genes);
        assert_eq!(corrected.len(), 1);
        assert_eq!(corrected[0].record.hugo_gene_symbol, "TP53");
        assert_eq!(corrected[0].q_value, 0.04);
    }

    #[test]
    fn survival_descriptions_pair_attribute_with_study_name() {
        let attributes = vec![
            ClinicalAttribute {
                clinical_attribute_id: OS_STATUS.into(),
                study_id: "brca_tcga".into(),
                display_name: "Overall Survival Status".into(),
                description: "Death from any cause".into(),
                patient_attribute: true,
            },
            ClinicalAttribute {
                clinical_attribute_id: "TUMOR_STAGE".into(),
                study_id: "brca_tcga".into(),
                display_name: "Stage".into(),
                description: "AJCC stage".into(),
                patient_attribute: true,
            },
        ];
        let mut studies = HashMap::new();
        studies.insert(
            "brca_tcga".to_string(),
            Study {
                study_id: "brca_tcga".into(),
                name: "Breast Invasive Carcinoma".into(),
                reference_genome: "hg38".into(),
            },
        );

        let descriptions = survival_descriptions(&attributes, &studies, OS_STATUS);
        assert_eq!(descriptions.len(), 1);
        assert_eq!(descriptions[0].study_name, "Breast Invasive Carcinoma");
        assert_eq!(descriptions[0].description, "Death from any cause");
    }
}
