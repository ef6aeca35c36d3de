use contracts::system::onboarding::{OnboardingRedirect, OnboardingStatus};

use super::attributes::{
    record_from_attributes, COOKIE_MAX_AGE_SECS, COOKIE_PLAN, COOKIE_TENANT_ID, LOCAL_PLAN,
    LOCAL_TENANT_ID, SESSION_COOKIE_MAX_AGE_SECS,
};
use super::consistency::{fetch_with_retry, SettlePolicy};
use super::context::OnboardingContext;
use super::merge::{reading_from_edge, reading_from_local};
use super::overrides::OverrideTable;
use super::ports::EdgeCache;
use super::step_mapper::redirect_path;
use super::synchronizer::{refresh_caches, synchronize};

/// Account that just passed the credential check
#[derive(Debug, Clone)]
pub struct SignedInUser {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
}

/// Decide where a freshly signed-in user lands and prime every store.
///
/// An unreadable identity store does not fail the sign-in; the caches that
/// came with the request are used instead, then `not_started`. In that case
/// only the caches are rewritten and nothing is written to the identity store.
pub async fn resolve_after_sign_in<E: EdgeCache>(
    ctx: &mut OnboardingContext<E>,
    user: &SignedInUser,
    overrides: &OverrideTable,
    policy: SettlePolicy,
) -> OnboardingRedirect {
    let identity_read = fetch_with_retry(ctx.identity.as_ref(), policy).await;
    let identity_answered = identity_read.is_ok();
    let (mut status, mut setup_done) = match identity_read {
        Ok(attributes) => {
            let record = record_from_attributes(&attributes);
            if let Some(plan) = record.plan {
                ctx.local.set(LOCAL_PLAN, plan.code());
                ctx.edge.set(COOKIE_PLAN, plan.code(), COOKIE_MAX_AGE_SECS);
            }
            if let Some(tenant_id) = record.tenant_id.as_deref() {
                ctx.local.set(LOCAL_TENANT_ID, tenant_id);
                ctx.edge
                    .set(COOKIE_TENANT_ID, tenant_id, SESSION_COOKIE_MAX_AGE_SECS);
            }
            (record.status, record.setup_done)
        }
        Err(e) => {
            tracing::warn!(
                "Identity attributes unavailable at sign-in for {}: {}",
                user.username,
                e
            );
            reading_from_edge(&ctx.edge)
                .or_else(|| reading_from_local(&ctx.local))
                .map(|r| (r.status, r.setup_done.unwrap_or(false)))
                .unwrap_or_default()
        }
    };

    let mut candidates = vec![user.username.as_str(), user.id.as_str()];
    if let Some(email) = user.email.as_deref() {
        candidates.push(email);
    }
    let overridden = match overrides.matches(&candidates) {
        Some(identifier) => {
            tracing::warn!(
                "Onboarding override applied for '{}' (stored status {})",
                identifier,
                status
            );
            status = OnboardingStatus::Complete;
            setup_done = true;
            true
        }
        None => false,
    };

    let event = if identity_answered {
        synchronize(ctx, status.code(), setup_done).event
    } else {
        refresh_caches(ctx, status, setup_done)
    };
    OnboardingRedirect {
        status: event.status,
        step: event.step,
        setup_done: event.setup_done,
        redirect_path: redirect_path(event.step).to_string(),
        overridden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::onboarding::attributes::{
        ATTR_ONBOARDING, ATTR_PLAN, ATTR_SETUP_DONE, COOKIE_STATUS, TENANT_ID_ATTRS,
    };
    use crate::system::onboarding::edge_cache::CookieJar;
    use crate::system::onboarding::test_support::{context_with, MemoryIdentityStore};
    use contracts::system::onboarding::OnboardingStep;
    use maplit::hashmap;
    use std::time::Duration;

    fn user() -> SignedInUser {
        SignedInUser {
            id: "6f1c".to_string(),
            username: "jane".to_string(),
            email: Some("Jane@Example.com".to_string()),
        }
    }

    fn policy() -> SettlePolicy {
        SettlePolicy {
            attempts: 2,
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_new_account_lands_on_business_info() {
        let store = MemoryIdentityStore::empty();
        let mut ctx = context_with(store, CookieJar::empty());

        let redirect =
            resolve_after_sign_in(&mut ctx, &user(), &OverrideTable::default(), policy()).await;
        assert_eq!(redirect.status, OnboardingStatus::NotStarted);
        assert_eq!(redirect.redirect_path, "/onboarding/business-info");
        assert!(!redirect.overridden);
        assert_eq!(ctx.edge.get(COOKIE_STATUS).as_deref(), Some("not_started"));
    }

    #[tokio::test]
    async fn test_stored_plan_and_tenant_are_cached() {
        let mut attributes = hashmap! {
            ATTR_ONBOARDING.to_string() => "subscription".to_string(),
            ATTR_PLAN.to_string() => "professional".to_string(),
        };
        attributes.insert(TENANT_ID_ATTRS[0].to_string(), "acme".to_string());
        let store = MemoryIdentityStore::with(attributes);
        let mut ctx = context_with(store, CookieJar::empty());

        let redirect =
            resolve_after_sign_in(&mut ctx, &user(), &OverrideTable::default(), policy()).await;
        assert_eq!(redirect.step, OnboardingStep::Payment);
        assert_eq!(ctx.edge.get(COOKIE_TENANT_ID).as_deref(), Some("acme"));
        assert_eq!(ctx.local.get(LOCAL_PLAN).as_deref(), Some("professional"));
    }

    #[tokio::test]
    async fn test_override_by_email_forces_dashboard() {
        let store = MemoryIdentityStore::with(hashmap! {
            ATTR_ONBOARDING.to_string() => "business_info".to_string(),
        });
        let mut ctx = context_with(store, CookieJar::empty());
        let overrides = OverrideTable::new(["jane@example.com"]);

        let redirect = resolve_after_sign_in(&mut ctx, &user(), &overrides, policy()).await;
        assert!(redirect.overridden);
        assert_eq!(redirect.status, OnboardingStatus::Complete);
        assert!(redirect.setup_done);
        assert_eq!(redirect.redirect_path, "/dashboard");
    }

    #[tokio::test]
    async fn test_unreadable_identity_uses_request_cookies() {
        let store = MemoryIdentityStore::empty();
        store.set_fail_reads(true);
        let mut edge = CookieJar::empty();
        edge.set(COOKIE_STATUS, "payment", COOKIE_MAX_AGE_SECS);
        let mut ctx = context_with(store, edge);

        let redirect =
            resolve_after_sign_in(&mut ctx, &user(), &OverrideTable::default(), policy()).await;
        assert_eq!(redirect.status, OnboardingStatus::Payment);
        assert_eq!(redirect.redirect_path, "/onboarding/setup");
    }

    #[tokio::test]
    async fn test_unreadable_identity_is_never_overwritten() {
        let store = MemoryIdentityStore::with(hashmap! {
            ATTR_ONBOARDING.to_string() => "complete".to_string(),
            ATTR_SETUP_DONE.to_string() => "TRUE".to_string(),
        });
        store.set_fail_reads(true);
        let mut ctx = context_with(store.clone(), CookieJar::empty());

        let redirect =
            resolve_after_sign_in(&mut ctx, &user(), &OverrideTable::default(), policy()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(redirect.redirect_path, "/onboarding/business-info");
        assert_eq!(ctx.edge.get(COOKIE_STATUS).as_deref(), Some("not_started"));
        assert_eq!(store.writes(), 0);
        assert_eq!(store.get(ATTR_ONBOARDING).as_deref(), Some("complete"));
        assert_eq!(store.get(ATTR_SETUP_DONE).as_deref(), Some("TRUE"));
    }

    #[tokio::test]
    async fn test_client_cookie_is_not_saved_as_identity_status() {
        let store = MemoryIdentityStore::with(hashmap! {
            ATTR_ONBOARDING.to_string() => "business_info".to_string(),
        });
        store.set_fail_reads(true);
        let mut edge = CookieJar::empty();
        edge.set(COOKIE_STATUS, "complete", COOKIE_MAX_AGE_SECS);
        let mut ctx = context_with(store.clone(), edge);

        resolve_after_sign_in(&mut ctx, &user(), &OverrideTable::default(), policy()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.get(ATTR_ONBOARDING).as_deref(), Some("business_info"));
        assert_eq!(store.writes(), 0);
    }
}
