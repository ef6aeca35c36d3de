use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::shared::config::OnboardingConfig;
use crate::shared::data::db::get_connection;

use super::consistency::SettlePolicy;
use super::context::OnboardingContext;
use super::edge_cache::CookieJar;
use super::events::{spawn_audit_listener, OnboardingEvents};
use super::fallback::HttpAttributeFallback;
use super::identity_store::SqliteIdentityStore;
use super::local_cache::SessionCaches;
use super::overrides::OverrideTable;

static RUNTIME: OnceCell<OnboardingRuntime> = OnceCell::new();

/// Process-wide onboarding state: session caches, event bus and settings
pub struct OnboardingRuntime {
    pub caches: SessionCaches,
    pub events: OnboardingEvents,
    pub overrides: OverrideTable,
    pub settle: SettlePolicy,
    pub sign_in_timeout: Duration,
    fallback_api_base: Option<String>,
    http: reqwest::Client,
}

impl OnboardingRuntime {
    pub fn from_config(config: &OnboardingConfig) -> Self {
        let base = config.fallback_api_base.trim();
        Self {
            caches: SessionCaches::new(),
            events: OnboardingEvents::new(),
            overrides: OverrideTable::from_config(config),
            settle: SettlePolicy::from_config(config),
            sign_in_timeout: Duration::from_secs(config.sign_in_timeout_secs),
            fallback_api_base: (!base.is_empty()).then(|| base.to_string()),
            http: reqwest::Client::new(),
        }
    }

    /// Build the context for one request. `bearer` is forwarded to the
    /// remote fallback when one is configured.
    pub fn context_for(
        &self,
        user_id: &str,
        edge: CookieJar,
        bearer: Option<&str>,
    ) -> OnboardingContext<CookieJar> {
        let identity = Arc::new(SqliteIdentityStore::for_user(
            get_connection().clone(),
            user_id,
        ));
        let ctx = OnboardingContext::new(
            identity,
            edge,
            self.caches.checkout(user_id),
            self.events.clone(),
        );
        match (&self.fallback_api_base, bearer) {
            (Some(base), Some(bearer)) => ctx.with_fallback(Arc::new(
                HttpAttributeFallback::new(self.http.clone(), base, bearer),
            )),
            _ => ctx,
        }
    }

    /// Store the local cache back and hand out the cookies to send
    pub fn finish(&self, user_id: &str, ctx: OnboardingContext<CookieJar>) -> CookieJar {
        let (edge, local) = ctx.into_caches();
        self.caches.store(user_id, local);
        edge
    }
}

/// Инициализация рантайма онбординга (один раз при старте)
pub fn initialize(config: &OnboardingConfig) -> anyhow::Result<()> {
    let runtime = OnboardingRuntime::from_config(config);
    if !runtime.overrides.is_empty() {
        tracing::warn!(
            "Onboarding override list is active ({} entries)",
            config.complete_overrides.len()
        );
    }
    spawn_audit_listener(&runtime.events);

    RUNTIME
        .set(runtime)
        .map_err(|_| anyhow::anyhow!("Onboarding runtime already initialized"))?;
    Ok(())
}

pub fn get() -> &'static OnboardingRuntime {
    RUNTIME
        .get()
        .expect("Onboarding runtime has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fallback_base_disables_fallback() {
        let config = OnboardingConfig {
            fallback_api_base: "   ".to_string(),
            ..OnboardingConfig::default()
        };
        let runtime = OnboardingRuntime::from_config(&config);
        assert!(runtime.fallback_api_base.is_none());
        assert_eq!(runtime.sign_in_timeout, Duration::from_secs(45));
        assert_eq!(runtime.settle.attempts, 3);
    }
}
