//! Walk a comparison session end to end against in-memory mock services.

use std::collections::HashMap;
use std::sync::Arc;

use cohortyx_common::cases::{Sample, Study};
use cohortyx_common::clinical::{
    ClinicalAttribute, ClinicalDatum, OS_MONTHS, OS_STATUS,
};
use cohortyx_common::enrichments::{
    AlterationEnrichment, CopyNumberEventType, GroupAlterationCount,
};
use cohortyx_common::groups::{GroupData, OverlapStrategy, RawGroupStudy};
use cohortyx_common::profiles::{MolecularAlterationType, MolecularProfile, ReferenceGenomeGene};
use cohortyx_comparison::remote::{MockEnrichmentApi, MockPortalApi, MockSessionApi};
use cohortyx_comparison::{Collaborators, ComparisonConfig, ComparisonSession};

const STUDY: &str = "brca_tcga";

fn sample(id: &str, patient: &str) -> Sample {
    Sample {
        study_id: STUDY.into(),
        sample_id: id.into(),
        patient_id: patient.into(),
    }
}

fn profile(id: &str, kind: MolecularAlterationType, datatype: &str) -> MolecularProfile {
    MolecularProfile {
        molecular_profile_id: id.into(),
        study_id: STUDY.into(),
        name: id.into(),
        molecular_alteration_type: kind,
        datatype: datatype.into(),
    }
}

fn gene(entrez: i64, symbol: &str, cytoband: &str) -> ReferenceGenomeGene {
    ReferenceGenomeGene {
        entrez_gene_id: entrez,
        hugo_gene_symbol: symbol.into(),
        cytoband: Some(cytoband.into()),
    }
}

fn enrichment(
    entrez: i64,
    symbol: &str,
    p: f64,
    altered_a: u64,
    altered_b: u64,
) -> AlterationEnrichment {
    AlterationEnrichment {
        entrez_gene_id: entrez,
        hugo_gene_symbol: symbol.into(),
        cytoband: None,
        counts: vec![
            GroupAlterationCount {
                group_name: "(A) Altered".into(),
                altered_count: altered_a,
                profiled_count: 3,
            },
            GroupAlterationCount {
                group_name: "(B) Unaltered".into(),
                altered_count: altered_b,
                profiled_count: 4,
            },
        ],
        p_value: p,
    }
}

fn os_datum(patient: &str, attribute: &str, value: &str) -> ClinicalDatum {
    ClinicalDatum {
        study_id: STUDY.into(),
        patient_id: patient.into(),
        clinical_attribute_id: attribute.into(),
        value: value.into(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Two groups sharing sample S4; P7 carries two samples.
    let groups = vec![
        GroupData {
            name: "Altered".into(),
            color: None,
            studies: vec![RawGroupStudy {
                study_id: STUDY.into(),
                samples: vec!["S1".into(), "S2".into(), "S3".into(), "S4".into()],
            }],
        },
        GroupData {
            name: "Unaltered".into(),
            color: None,
            studies: vec![RawGroupStudy {
                study_id: STUDY.into(),
                samples: vec!["S4".into(), "S5".into(), "S6".into(), "S7".into(), "S8".into()],
            }],
        },
    ];

    let sessions = MockSessionApi::new().with_session("demo-session", groups);

    let portal = MockPortalApi::new()
        .with_samples(vec![
            sample("S1", "P1"),
            sample("S2", "P2"),
            sample("S3", "P3"),
            sample("S4", "P4"),
            sample("S5", "P5"),
            sample("S6", "P6"),
            sample("S7", "P7"),
            sample("S8", "P7"),
        ])
        .with_studies(vec![Study {
            study_id: STUDY.into(),
            name: "Breast Invasive Carcinoma (TCGA)".into(),
            reference_genome: "hg38".into(),
        }])
        .with_profiles(vec![
            profile("brca_tcga_mutations", MolecularAlterationType::MutationExtended, "MAF"),
            profile("brca_tcga_gistic", MolecularAlterationType::CopyNumberAlteration, "DISCRETE"),
            profile("brca_tcga_rna_seq", MolecularAlterationType::MrnaExpression, "CONTINUOUS"),
        ])
        .with_attributes(vec![ClinicalAttribute {
            clinical_attribute_id: OS_STATUS.into(),
            study_id: STUDY.into(),
            display_name: "Overall Survival Status".into(),
            description: "Death from any cause".into(),
            patient_attribute: true,
        }])
        .with_clinical_data(vec![
            os_datum("P1", OS_STATUS, "DECEASED"),
            os_datum("P1", OS_MONTHS, "23.5"),
            os_datum("P2", OS_STATUS, "LIVING"),
            os_datum("P2", OS_MONTHS, "61.2"),
            os_datum("P5", OS_STATUS, "DECEASED"),
            os_datum("P5", OS_MONTHS, "9.8"),
            os_datum("P7", OS_STATUS, "LIVING"),
            os_datum("P7", OS_MONTHS, "44.0"),
        ])
        .with_genes(vec![
            gene(7157, "TP53", "17p13.1"),
            gene(5290, "PIK3CA", "3q26.32"),
            gene(2064, "ERBB2", "17q12"),
            gene(5728, "PTEN", "10q23.31"),
        ]);

    let enrichments = MockEnrichmentApi::new()
        .with_mutation(vec![
            enrichment(5290, "PIK3CA", 0.021, 2, 1),
            enrichment(7157, "TP53", 0.0008, 3, 0),
            // not in the reference genome, dropped before correction
            enrichment(100_130_426, "LOC100130426", 0.0001, 1, 0),
        ])
        .with_copy_number(CopyNumberEventType::Amp, vec![enrichment(2064, "ERBB2", 0.003, 2, 0)])
        .with_copy_number(CopyNumberEventType::HomDel, vec![enrichment(5728, "PTEN", 0.04, 1, 2)]);

    let collaborators = Collaborators {
        sessions: Arc::new(sessions),
        portal: Arc::new(portal),
        enrichments: Arc::new(enrichments),
    };

    let session =
        ComparisonSession::new("demo-session", collaborators, ComparisonConfig::default());

    println!("=== Groups ===\n");
    let groups = session.groups.resolved().await?;
    for group in groups.iter() {
        println!(
            "{} color={} samples={}",
            group.name_with_ordinal(),
            group.color,
            group.num_samples()
        );
    }

    println!("\n=== Overlap (strategy: {:?}) ===\n", session.overlap_strategy());
    let overlap = session.overlap.resolved().await?;
    println!(
        "overlapping samples: {:?}",
        overlap
            .overlapping_samples
            .iter()
            .map(|id| id.sample_id.as_str())
            .collect::<Vec<_>>()
    );
    let active = session.active_groups.resolved().await?;
    for group in active.iter() {
        println!("active: {} samples={}", group.name_with_ordinal(), group.num_samples());
    }

    println!("\n=== Sample Venn ===\n");
    let venn = session.sample_venn.resolved().await?;
    for bucket in venn.iter() {
        println!("{:?}: {} cases", bucket.member_uids, bucket.cases.len());
    }

    println!("\n=== Mutation enrichments (q-values attached) ===\n");
    let mutations = session.mutation_enrichments.resolved().await?;
    for row in mutations.iter() {
        println!(
            "{:<8} p={:<8.4} q={:.4}",
            row.record.hugo_gene_symbol, row.record.p_value, row.q_value
        );
    }

    println!("\n=== Copy-number enrichments ===\n");
    let copy_number = session.copy_number_enrichments.resolved().await?;
    for row in copy_number.iter() {
        println!(
            "{:<8} alteration={:+} q={:.4}",
            row.record.enrichment.hugo_gene_symbol,
            row.record.alteration,
            row.q_value
        );
    }

    println!("\n=== Overall survival ===\n");
    let survivals = session.overall_survivals.resolved().await?;
    for s in survivals.iter() {
        println!(
            "{} months={:<6} event={}",
            s.unique_patient_key, s.months, s.event
        );
    }
    println!(
        "\nsurvival shown: {}  mutations shown: {}  mRNA unavailable: {}",
        session.show_survival(),
        session.show_mutations(),
        session.mrna_unavailable()
    );

    println!("\n=== Switch to INCLUDE overlap strategy ===\n");
    let seen = session.active_groups.revision();
    session.set_overlap_strategy(OverlapStrategy::Include);
    let active = session.active_groups.refreshed(seen).await?;
    for group in active.iter() {
        println!("active: {} samples={}", group.name_with_ordinal(), group.num_samples());
    }

    println!("\n=== Deselect group 'Unaltered' ===\n");
    let seen = session.mutation_enrichments.revision();
    let seen_overlap = session.overlap.revision();
    session.set_group_selected("Unaltered", false);
    let mutations = session.mutation_enrichments.refreshed(seen).await?;
    println!("active below minimum, enrichment rows: {}", mutations.len());
    println!("mutation tab shown: {}", session.show_mutations());

    println!("\n=== Session as JSON ===\n");
    let overlap = session.overlap.refreshed(seen_overlap).await?;
    let summary = HashMap::from([
        ("groups", serde_json::to_value(&*session.groups.resolved().await?)?),
        ("overlap", serde_json::to_value(&*overlap)?),
    ]);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
