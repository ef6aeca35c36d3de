use contracts::system::onboarding::{OnboardingStatusView, StatusSource};

use super::attributes::{COOKIE_MAX_AGE_SECS, COOKIE_PLAN, LOCAL_PLAN};
use super::context::OnboardingContext;
use super::merge::{merge, reading_from_attributes, reading_from_edge, reading_from_local};
use super::merge::{MergeOutcome, Readings, SourceReading};
use super::ports::EdgeCache;
use super::step_mapper::step_for;
use super::synchronizer::{repair_setup_flag, synchronize};

/// Consult all three stores and resolve the user's onboarding position.
///
/// Not a pure read: when the identity store supplied the winning value and a
/// cache disagrees or is empty, the caches are rewritten (and the identity
/// store re-stamped) through the synchronizer.
pub async fn read_status<E: EdgeCache>(ctx: &mut OnboardingContext<E>) -> OnboardingStatusView {
    // Cache reads cannot fail, so only the identity store may drop out of the list
    let mut sources_queried = StatusSource::all().to_vec();
    let identity = match ctx.identity.fetch_attributes().await {
        Ok(attributes) => reading_from_attributes(&attributes),
        Err(e) => {
            tracing::warn!("Identity store read failed, using caches: {}", e);
            sources_queried.retain(|s| *s != StatusSource::Identity);
            None
        }
    };
    let readings = Readings {
        identity,
        edge: reading_from_edge(&ctx.edge),
        local: reading_from_local(&ctx.local),
    };

    match merge(&readings) {
        MergeOutcome::Unresolvable => OnboardingStatusView {
            status: Default::default(),
            step: step_for(Default::default(), None),
            setup_done: false,
            sources_queried,
            conflicted: false,
        },
        MergeOutcome::Agree { source, reading } => {
            let caches_complete = readings.edge.is_some() && readings.local.is_some();
            if source == StatusSource::Identity && !caches_complete {
                tracing::debug!("Warming onboarding caches from identity store");
                resync(ctx, reading, sources_queried, false)
            } else {
                view(ctx, reading, sources_queried, false)
            }
        }
        MergeOutcome::Resolved {
            winner,
            reading,
            losers,
        } => {
            tracing::info!(
                "Onboarding sources disagree, {:?} wins over {:?} with status {}",
                winner,
                losers,
                reading.status
            );
            if winner == StatusSource::Identity {
                resync(ctx, reading, sources_queried, true)
            } else {
                view(ctx, reading, sources_queried, true)
            }
        }
    }
}

fn view<E: EdgeCache>(
    ctx: &OnboardingContext<E>,
    reading: SourceReading,
    sources_queried: Vec<StatusSource>,
    conflicted: bool,
) -> OnboardingStatusView {
    let plan = reading.plan.or_else(|| ctx.known_plan());
    OnboardingStatusView {
        status: reading.status,
        step: step_for(reading.status, plan),
        setup_done: repair_setup_flag(reading.status, reading.setup_done.unwrap_or(false)),
        sources_queried,
        conflicted,
    }
}

fn resync<E: EdgeCache>(
    ctx: &mut OnboardingContext<E>,
    reading: SourceReading,
    sources_queried: Vec<StatusSource>,
    conflicted: bool,
) -> OnboardingStatusView {
    // Plan from the identity store feeds the step of the rewritten caches
    if let Some(plan) = reading.plan {
        ctx.local.set(LOCAL_PLAN, plan.code());
        ctx.edge.set(COOKIE_PLAN, plan.code(), COOKIE_MAX_AGE_SECS);
    }
    let synced = synchronize(
        ctx,
        reading.status.code(),
        reading.setup_done.unwrap_or(false),
    );
    OnboardingStatusView {
        status: synced.event.status,
        step: synced.event.step,
        setup_done: synced.event.setup_done,
        sources_queried,
        conflicted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::onboarding::attributes::{
        ATTR_ONBOARDING, ATTR_PLAN, ATTR_SETUP_DONE, COOKIE_SETUP_DONE, COOKIE_STATUS,
        COOKIE_STEP, LOCAL_STATUS,
    };
    use crate::system::onboarding::edge_cache::CookieJar;
    use crate::system::onboarding::synchronizer::WriteBackOutcome;
    use crate::system::onboarding::test_support::{context_with, MemoryIdentityStore};
    use contracts::system::onboarding::{OnboardingStatus, OnboardingStep};
    use maplit::hashmap;

    #[tokio::test]
    async fn test_fresh_user_resolves_to_business_info() {
        let store = MemoryIdentityStore::empty();
        let mut ctx = context_with(store.clone(), CookieJar::empty());

        let view = read_status(&mut ctx).await;
        assert_eq!(view.status, OnboardingStatus::NotStarted);
        assert_eq!(view.step, OnboardingStep::BusinessInfo);
        assert!(!view.setup_done);
        assert_eq!(view.sources_queried, StatusSource::all().to_vec());
        assert!(!view.conflicted);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_upper_case_setup_maps_to_dashboard() {
        let store = MemoryIdentityStore::with(hashmap! {
            ATTR_ONBOARDING.to_string() => "SETUP".to_string(),
            ATTR_SETUP_DONE.to_string() => "false".to_string(),
        });
        let mut ctx = context_with(store, CookieJar::empty());

        let view = read_status(&mut ctx).await;
        assert_eq!(view.status, OnboardingStatus::Setup);
        assert_eq!(view.step, OnboardingStep::Dashboard);
        assert!(!view.setup_done);
        assert_eq!(view.sources_queried, StatusSource::all().to_vec());
    }

    #[tokio::test]
    async fn test_unreachable_identity_falls_back_to_edge_cache() {
        let store = MemoryIdentityStore::empty();
        store.set_fail_reads(true);
        let mut edge = CookieJar::empty();
        edge.set(COOKIE_STATUS, "complete", COOKIE_MAX_AGE_SECS);
        let mut ctx = context_with(store.clone(), edge);

        let view = read_status(&mut ctx).await;
        assert_eq!(view.status, OnboardingStatus::Complete);
        assert_eq!(view.step, OnboardingStep::Dashboard);
        assert!(view.setup_done);
        assert_eq!(
            view.sources_queried,
            vec![StatusSource::EdgeCache, StatusSource::LocalCache]
        );
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_identity_overwrites_disagreeing_caches() {
        let store = MemoryIdentityStore::with(hashmap! {
            ATTR_ONBOARDING.to_string() => "payment".to_string(),
            ATTR_SETUP_DONE.to_string() => "FALSE".to_string(),
        });
        let mut edge = CookieJar::empty();
        edge.set(COOKIE_STATUS, "complete", COOKIE_MAX_AGE_SECS);
        edge.set(COOKIE_SETUP_DONE, "true", COOKIE_MAX_AGE_SECS);
        let mut ctx = context_with(store.clone(), edge);
        ctx.local.set(LOCAL_STATUS, "business_info");

        let view = read_status(&mut ctx).await;
        assert_eq!(view.status, OnboardingStatus::Payment);
        assert_eq!(view.step, OnboardingStep::Setup);
        assert!(view.conflicted);
        assert_eq!(view.sources_queried, StatusSource::all().to_vec());

        assert_eq!(ctx.edge.get(COOKIE_STATUS).as_deref(), Some("payment"));
        assert_eq!(ctx.edge.get(COOKIE_STEP).as_deref(), Some("setup"));
        assert_eq!(ctx.edge.get(COOKIE_SETUP_DONE).as_deref(), Some("false"));
        assert_eq!(ctx.local.get(LOCAL_STATUS).as_deref(), Some("payment"));

        // a second read sees agreement and writes nothing further
        let writes = store.writes();
        let again = read_status(&mut ctx).await;
        assert!(!again.conflicted);
        assert_eq!(again.status, OnboardingStatus::Payment);
        assert!(store.writes() <= writes + 1);
    }

    #[tokio::test]
    async fn test_agreeing_identity_warms_empty_caches() {
        let store = MemoryIdentityStore::with(hashmap! {
            ATTR_ONBOARDING.to_string() => "subscription".to_string(),
            ATTR_PLAN.to_string() => "free".to_string(),
        });
        let mut ctx = context_with(store, CookieJar::empty());

        let view = read_status(&mut ctx).await;
        assert_eq!(view.step, OnboardingStep::Setup);
        assert!(!view.conflicted);
        assert_eq!(ctx.edge.get(COOKIE_STATUS).as_deref(), Some("subscription"));
        assert_eq!(ctx.local.get(LOCAL_PLAN).as_deref(), Some("free"));
    }

    #[tokio::test]
    async fn test_edge_winner_does_not_touch_identity() {
        let store = MemoryIdentityStore::empty();
        let mut edge = CookieJar::empty();
        edge.set(COOKIE_STATUS, "payment", COOKIE_MAX_AGE_SECS);
        let mut ctx = context_with(store.clone(), edge);
        ctx.local.set(LOCAL_STATUS, "subscription");

        let view = read_status(&mut ctx).await;
        assert_eq!(view.status, OnboardingStatus::Payment);
        assert!(view.conflicted);
        assert_eq!(store.writes(), 0);
        assert_eq!(ctx.local.get(LOCAL_STATUS).as_deref(), Some("subscription"));
    }

    #[tokio::test]
    async fn test_complete_in_identity_repairs_setup_flag() {
        let store = MemoryIdentityStore::with(hashmap! {
            ATTR_ONBOARDING.to_string() => "complete".to_string(),
            ATTR_SETUP_DONE.to_string() => "FALSE".to_string(),
        });
        let mut ctx = context_with(store.clone(), CookieJar::empty());

        let view = read_status(&mut ctx).await;
        assert!(view.setup_done);

        let synced = synchronize(&mut ctx, "complete", false);
        assert_eq!(synced.write_back.await.unwrap(), WriteBackOutcome::Direct);
        assert_eq!(store.get(ATTR_SETUP_DONE).as_deref(), Some("TRUE"));
    }
}
