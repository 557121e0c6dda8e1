//! Configuration for comparison sessions.
//! Reads cohortyx.toml from the current directory or path in COHORTYX_CONFIG env var.

use std::path::Path;

use serde::{Deserialize, Serialize};

use cohortyx_common::groups::OverlapStrategy;

/// Tuning knobs for a comparison session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Enrichment requests are only issued at or above this many active groups
    /// (default: 2)
    #[serde(default = "default_min_comparison_groups")]
    pub min_comparison_groups: usize,

    /// Survival analysis is disabled above this many active groups (default: 10)
    #[serde(default = "default_max_survival_groups")]
    pub max_survival_groups: usize,

    /// Issue enrichment requests at patient level rather than sample level
    /// (default: false)
    #[serde(default)]
    pub patient_level_enrichments: bool,

    /// How overlapping cases are treated at session start (default: EXCLUDE)
    #[serde(default)]
    pub default_overlap_strategy: OverlapStrategy,
}

fn default_min_comparison_groups() -> usize { 2 }
fn default_max_survival_groups() -> usize { 10 }

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            min_comparison_groups: default_min_comparison_groups(),
            max_survival_groups: default_max_survival_groups(),
            patient_level_enrichments: false,
            default_overlap_strategy: OverlapStrategy::default(),
        }
    }
}

impl ComparisonConfig {
    /// Load configuration from cohortyx.toml.
    /// Checks COHORTYX_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path =
            std::env::var("COHORTYX_CONFIG").unwrap_or_else(|_| "cohortyx.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!("Config file not found: {}", path);
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML document. Missing keys take defaults.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Start sessions at patient-level enrichment granularity.
    pub fn with_patient_level_enrichments(mut self) -> Self {
        self.patient_level_enrichments = true;
        self
    }
}
