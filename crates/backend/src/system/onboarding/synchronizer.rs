use std::collections::HashMap;
use std::sync::Arc;

use contracts::system::onboarding::{OnboardingStatus, OnboardingStatusEvent};
use tokio::task::JoinHandle;

use super::attributes::{
    cache_flag, non_empty, status_attributes, ATTR_ONBOARDING, COOKIE_MAX_AGE_SECS,
    COOKIE_SETUP_DONE, COOKIE_STATUS, COOKIE_STEP, LOCAL_SETUP_DONE, LOCAL_STATUS, LOCAL_STEP,
};
use super::context::OnboardingContext;
use super::ports::{AttributeFallback, EdgeCache, IdentityStore};
use super::step_mapper::{normalize_status, step_for};

/// How the background identity write ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBackOutcome {
    Direct,
    Fallback,
    LastResortCompletion,
    /// The identity store already holds a later status
    Superseded,
    Failed,
}

pub struct Synchronized {
    pub event: OnboardingStatusEvent,
    /// Background identity write; dropping the handle does not cancel it
    pub write_back: JoinHandle<WriteBackOutcome>,
}

/// `complete` always carries `setup_done = true`
pub fn repair_setup_flag(status: OnboardingStatus, setup_done: bool) -> bool {
    if status.is_terminal() && !setup_done {
        tracing::debug!("Patching setup_done=true for completed onboarding");
        return true;
    }
    setup_done
}

/// Write status, step and setup flag into both caches. Returns the event
/// payload without emitting it.
pub fn write_caches<E: EdgeCache>(
    ctx: &mut OnboardingContext<E>,
    status: OnboardingStatus,
    setup_done: bool,
) -> OnboardingStatusEvent {
    let step = step_for(status, ctx.known_plan());
    let flag = cache_flag(setup_done);

    ctx.edge.set(COOKIE_STATUS, status.code(), COOKIE_MAX_AGE_SECS);
    ctx.edge.set(COOKIE_STEP, step.code(), COOKIE_MAX_AGE_SECS);
    ctx.edge.set(COOKIE_SETUP_DONE, flag, COOKIE_MAX_AGE_SECS);

    ctx.local.set(LOCAL_STATUS, status.code());
    ctx.local.set(LOCAL_STEP, step.code());
    ctx.local.set(LOCAL_SETUP_DONE, flag);
    ctx.local.stamp();

    OnboardingStatusEvent {
        status,
        step,
        setup_done,
    }
}

/// Bring both caches to `status` and emit the event. The identity store is
/// left alone; use this when its value could not be read.
pub fn refresh_caches<E: EdgeCache>(
    ctx: &mut OnboardingContext<E>,
    status: OnboardingStatus,
    setup_done: bool,
) -> OnboardingStatusEvent {
    let setup_done = repair_setup_flag(status, setup_done);
    let event = write_caches(ctx, status, setup_done);
    ctx.events.emit_status_updated(event.clone());
    event
}

/// Make every store agree on `status`.
///
/// Caches are written synchronously. The identity write runs on a spawned
/// task and never blocks the caller; the event is emitted before that task
/// finishes.
pub fn synchronize<E: EdgeCache>(
    ctx: &mut OnboardingContext<E>,
    status: &str,
    setup_done: bool,
) -> Synchronized {
    let status = normalize_status(status);
    let event = refresh_caches(ctx, status, setup_done);

    let write_back = tokio::spawn(write_back(
        ctx.identity.clone(),
        ctx.fallback.clone(),
        status_attributes(status, event.setup_done),
        status,
    ));

    tracing::debug!(
        "Onboarding synchronized: status={} step={} setup_done={}",
        event.status,
        event.step,
        event.setup_done
    );

    Synchronized { event, write_back }
}

/// Direct identity write, then the update-attributes fallback, then for
/// `complete` the completion endpoint. Each stage is tried once.
///
/// A status behind the one already stored is not written, so a late
/// write-back cannot undo a step completed in the meantime.
pub async fn write_back(
    identity: Arc<dyn IdentityStore>,
    fallback: Option<Arc<dyn AttributeFallback>>,
    attributes: HashMap<String, String>,
    status: OnboardingStatus,
) -> WriteBackOutcome {
    match identity.fetch_attributes().await {
        Ok(current) => {
            let stored =
                non_empty(current.get(ATTR_ONBOARDING)).and_then(OnboardingStatus::from_code);
            if let Some(stored) = stored.filter(|s| s.rank() > status.rank()) {
                tracing::info!(
                    "Write-back of {} skipped, identity store is already at {}",
                    status,
                    stored
                );
                return WriteBackOutcome::Superseded;
            }
        }
        Err(e) => tracing::debug!("Status check before write-back failed: {}", e),
    }

    let direct_err = match identity.update_attributes(attributes.clone()).await {
        Ok(()) => return WriteBackOutcome::Direct,
        Err(e) => e,
    };
    tracing::warn!("Identity write failed: {}", direct_err);

    let Some(fallback) = fallback else {
        return WriteBackOutcome::Failed;
    };

    match fallback.update_attributes(attributes, true).await {
        Ok(()) => return WriteBackOutcome::Fallback,
        Err(e) => tracing::warn!("update-attributes fallback failed: {}", e),
    }

    if !status.is_terminal() {
        return WriteBackOutcome::Failed;
    }

    match fallback.complete_onboarding().await {
        Ok(()) => WriteBackOutcome::LastResortCompletion,
        Err(e) => {
            tracing::warn!("Onboarding completion fallback failed: {}", e);
            WriteBackOutcome::Failed
        }
    }
}
