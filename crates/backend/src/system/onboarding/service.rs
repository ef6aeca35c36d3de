use std::collections::HashMap;

use contracts::system::onboarding::{
    CompleteStepRequest, OnboardingStatus, OnboardingStatusEvent, OnboardingStep,
    UpdateAttributesRequest, UpdateAttributesResponse,
};
use thiserror::Error;

use super::attributes::{
    identity_flag, is_tenant_attr, non_empty, record_from_attributes, status_attributes,
    tenant_attributes, tenant_id_from, ATTR_BUSINESS_INFO_DONE, ATTR_ONBOARDING,
    ATTR_PAYMENT_DONE, ATTR_PLAN, ATTR_SETUP_DONE, ATTR_SUBSCRIPTION_DONE, COOKIE_MAX_AGE_SECS,
    COOKIE_PLAN, COOKIE_TENANT_ID, LOCAL_PLAN, LOCAL_TENANT_ID, SESSION_COOKIE_MAX_AGE_SECS,
};
use super::consistency::{fetch_with_retry, read_after_write, SettlePolicy};
use super::context::OnboardingContext;
use super::ports::{EdgeCache, IdentityStore, StoreError};
use super::synchronizer::{repair_setup_flag, write_caches};

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("step '{0}' cannot be completed")]
    InvalidStep(OnboardingStep),

    #[error("a plan must be selected to complete the subscription step")]
    MissingPlan,
}

#[derive(Debug, Clone)]
pub struct StepCompletion {
    pub event: OnboardingStatusEvent,
    /// The identity store reflected the write before we returned
    pub consistent: bool,
}

/// Flag attribute set by a step and the status it moves the user to
fn step_target(step: OnboardingStep) -> Result<(&'static str, OnboardingStatus), OnboardingError> {
    match step {
        OnboardingStep::BusinessInfo => Ok((ATTR_BUSINESS_INFO_DONE, OnboardingStatus::BusinessInfo)),
        OnboardingStep::Subscription => Ok((ATTR_SUBSCRIPTION_DONE, OnboardingStatus::Subscription)),
        OnboardingStep::Payment => Ok((ATTR_PAYMENT_DONE, OnboardingStatus::Payment)),
        OnboardingStep::Setup => Ok((ATTR_SETUP_DONE, OnboardingStatus::Complete)),
        OnboardingStep::Dashboard => Err(OnboardingError::InvalidStep(step)),
    }
}

/// Record a finished onboarding step.
///
/// Caches are written first, then the identity store. The status only moves
/// forward and a tenant id, once stored, is never replaced.
pub async fn complete_step<E: EdgeCache>(
    ctx: &mut OnboardingContext<E>,
    request: &CompleteStepRequest,
    policy: SettlePolicy,
) -> Result<StepCompletion, OnboardingError> {
    let (flag_attr, target) = step_target(request.step)?;
    if request.step == OnboardingStep::Subscription && request.plan.is_none() {
        return Err(OnboardingError::MissingPlan);
    }

    let current = record_from_attributes(&fetch_with_retry(ctx.identity.as_ref(), policy).await?);

    let status = if target.rank() > current.status.rank() {
        target
    } else {
        if target != current.status {
            tracing::info!(
                "Step {} ignored for status, user is already at {}",
                request.step,
                current.status
            );
        }
        current.status
    };
    let setup_done = repair_setup_flag(
        status,
        current.setup_done || request.step == OnboardingStep::Setup,
    );

    let mut attributes = status_attributes(status, setup_done);
    attributes.insert(flag_attr.to_string(), identity_flag(true).to_string());

    if let Some(plan) = request.plan {
        attributes.insert(ATTR_PLAN.to_string(), plan.code().to_string());
        ctx.local.set(LOCAL_PLAN, plan.code());
        ctx.edge.set(COOKIE_PLAN, plan.code(), COOKIE_MAX_AGE_SECS);
    }

    let requested_tenant = request
        .tenant_id
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    match (requested_tenant, current.tenant_id.as_deref()) {
        (Some(tenant_id), None) => {
            attributes.extend(tenant_attributes(tenant_id));
            ctx.local.set(LOCAL_TENANT_ID, tenant_id);
            ctx.edge
                .set(COOKIE_TENANT_ID, tenant_id, SESSION_COOKIE_MAX_AGE_SECS);
        }
        (Some(tenant_id), Some(existing)) if tenant_id != existing => {
            tracing::warn!("Tenant id already set to {}, ignoring {}", existing, tenant_id);
        }
        _ => {}
    }

    let event = write_caches(ctx, status, setup_done);

    if let Err(e) = ctx.identity.update_attributes(attributes.clone()).await {
        tracing::warn!("Identity write for step {} failed: {}", request.step, e);
        let Some(fallback) = ctx.fallback.clone() else {
            return Err(e.into());
        };
        fallback.update_attributes(attributes.clone(), true).await?;
    }

    let consistent = match read_after_write(ctx.identity.as_ref(), &attributes, policy).await {
        Ok(check) => check.consistent,
        Err(e) => {
            tracing::warn!("Read-after-write check failed: {}", e);
            false
        }
    };

    ctx.events.emit_status_updated(event.clone());
    Ok(StepCompletion { event, consistent })
}

/// Write attributes for a user.
///
/// With `force_update` the map is written as given. Otherwise an existing
/// tenant id is kept, a status that would move backwards is dropped, and
/// `complete` carries `setupdone=TRUE`.
pub async fn update_attributes(
    identity: &dyn IdentityStore,
    request: UpdateAttributesRequest,
) -> Result<UpdateAttributesResponse, OnboardingError> {
    let mut written: HashMap<String, String> = HashMap::new();
    let mut skipped = Vec::new();

    if request.force_update {
        written = request.attributes;
    } else {
        let current = identity.fetch_attributes().await?;
        let current_status = non_empty(current.get(ATTR_ONBOARDING))
            .and_then(OnboardingStatus::from_code);
        let has_tenant = tenant_id_from(&current).is_some();

        for (name, value) in request.attributes {
            if has_tenant && is_tenant_attr(&name) {
                skipped.push(name);
                continue;
            }
            if name == ATTR_ONBOARDING {
                let Some(next) = OnboardingStatus::from_code(&value) else {
                    tracing::warn!("Unrecognised onboarding status '{}' dropped", value);
                    skipped.push(name);
                    continue;
                };
                if current_status.is_some_and(|c| next.rank() < c.rank()) {
                    skipped.push(name);
                    continue;
                }
                written.insert(name, next.code().to_string());
                continue;
            }
            written.insert(name, value);
        }

        // Status the record ends up with after this write
        let effective = written
            .get(ATTR_ONBOARDING)
            .and_then(|s| OnboardingStatus::from_code(s))
            .or(current_status);
        let touches_setup =
            written.contains_key(ATTR_ONBOARDING) || written.contains_key(ATTR_SETUP_DONE);
        if touches_setup && effective.is_some_and(|s| s.is_terminal()) {
            written.insert(ATTR_SETUP_DONE.to_string(), identity_flag(true).to_string());
        }
    }

    let mut written_names: Vec<String> = written.keys().cloned().collect();
    identity.update_attributes(written).await?;

    written_names.sort();
    skipped.sort();
    Ok(UpdateAttributesResponse {
        written: written_names,
        skipped,
    })
}

/// Mark onboarding finished and bring the caches along
pub async fn mark_complete<E: EdgeCache>(
    ctx: &mut OnboardingContext<E>,
) -> Result<OnboardingStatusEvent, OnboardingError> {
    let status = OnboardingStatus::Complete;
    ctx.identity
        .update_attributes(status_attributes(status, true))
        .await?;

    let event = write_caches(ctx, status, true);
    ctx.events.emit_status_updated(event.clone());
    Ok(event)
}
