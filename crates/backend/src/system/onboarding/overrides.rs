use std::collections::HashSet;

use crate::shared::config::OnboardingConfig;

/// Accounts whose stored onboarding state is known to be wrong and which
/// always resolve to `complete`. Every hit is audited by the caller.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    identifiers: HashSet<String>,
}

impl OverrideTable {
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let identifiers = identifiers
            .into_iter()
            .map(|id| id.as_ref().trim().to_lowercase())
            .filter(|id| !id.is_empty())
            .collect();
        Self { identifiers }
    }

    pub fn from_config(config: &OnboardingConfig) -> Self {
        Self::new(&config.complete_overrides)
    }

    /// First candidate on the list, compared case-insensitively
    pub fn matches(&self, candidates: &[&str]) -> Option<String> {
        candidates
            .iter()
            .map(|c| c.trim().to_lowercase())
            .find(|c| !c.is_empty() && self.identifiers.contains(c))
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}
