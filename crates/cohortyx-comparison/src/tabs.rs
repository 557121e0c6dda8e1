//! Analysis category availability.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Analysis categories a session can offer to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisCategory {
    Survival,
    Mutations,
    CopyNumber,
    MrnaExpression,
    Protein,
    Clinical,
}

/// Which categories have been shown at least once this session.
///
/// Flags only latch on, never off. A category that was visible stays visible
/// after the user deselects every group, instead of the page collapsing
/// underneath them; it only disappears with the session.
#[derive(Debug, Default)]
pub struct ShownOnce {
    shown: Mutex<HashSet<AnalysisCategory>>,
}

impl ShownOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the category is showable right now.
    pub fn latch(&self, category: AnalysisCategory) {
        self.lock().insert(category);
    }

    pub fn was_shown(&self, category: AnalysisCategory) -> bool {
        self.lock().contains(&category)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<AnalysisCategory>> {
        self.shown.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_is_monotonic_and_per_category() {
        let shown = ShownOnce::new();
        assert!(!shown.was_shown(AnalysisCategory::Survival));

        shown.latch(AnalysisCategory::Survival);
        assert!(shown.was_shown(AnalysisCategory::Survival));
        assert!(!shown.was_shown(AnalysisCategory::Mutations));

        shown.latch(AnalysisCategory::Survival);
        assert!(shown.was_shown(AnalysisCategory::Survival));
    }
}
