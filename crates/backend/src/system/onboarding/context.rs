use std::sync::Arc;

use contracts::system::onboarding::PlanTier;

use super::attributes::{COOKIE_PLAN, LOCAL_PLAN};
use super::events::OnboardingEvents;
use super::local_cache::LocalCache;
use super::ports::{AttributeFallback, EdgeCache, IdentityStore};

/// Everything one request needs to read and synchronise onboarding state
pub struct OnboardingContext<E: EdgeCache> {
    pub identity: Arc<dyn IdentityStore>,
    pub fallback: Option<Arc<dyn AttributeFallback>>,
    pub edge: E,
    pub local: LocalCache,
    pub events: OnboardingEvents,
}

impl<E: EdgeCache> OnboardingContext<E> {
    pub fn new(
        identity: Arc<dyn IdentityStore>,
        edge: E,
        local: LocalCache,
        events: OnboardingEvents,
    ) -> Self {
        Self {
            identity,
            fallback: None,
            edge,
            local,
            events,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn AttributeFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Selected plan, local cache first
    pub fn known_plan(&self) -> Option<PlanTier> {
        self.local
            .get(LOCAL_PLAN)
            .and_then(|p| PlanTier::from_code(&p))
            .or_else(|| {
                self.edge
                    .get(COOKIE_PLAN)
                    .and_then(|p| PlanTier::from_code(&p))
            })
    }

    /// Split into the parts handed back to the request
    pub fn into_caches(self) -> (E, LocalCache) {
        (self.edge, self.local)
    }
}
