//! Key names and value encodings shared by the three stores.
//!
//! The identity store writes flags as `TRUE`/`FALSE`, cookies and the local
//! cache as `true`/`false`. Reads accept either.

use std::collections::HashMap;

use chrono::Utc;
use contracts::system::onboarding::{OnboardingRecord, OnboardingStatus, PlanTier};
use maplit::hashmap;

// Identity store attributes
pub const ATTR_ONBOARDING: &str = "custom:onboarding";
pub const ATTR_SETUP_DONE: &str = "custom:setupdone";
pub const ATTR_BUSINESS_INFO_DONE: &str = "custom:businessinfodone";
pub const ATTR_SUBSCRIPTION_DONE: &str = "custom:subscriptiondone";
pub const ATTR_PAYMENT_DONE: &str = "custom:paymentdone";
pub const ATTR_PLAN: &str = "custom:subplan";
pub const ATTR_UPDATED_AT: &str = "custom:updated_at";

/// Tenant id is duplicated under every name older clients read
pub const TENANT_ID_ATTRS: [&str; 3] = ["custom:tenant_ID", "custom:tenantId", "custom:tenant_id"];

// Edge cache (cookies)
pub const COOKIE_STATUS: &str = "onboardingStatus";
pub const COOKIE_STEP: &str = "onboardingStep";
pub const COOKIE_SETUP_DONE: &str = "setupCompleted";
pub const COOKIE_PLAN: &str = "selectedPlan";
pub const COOKIE_TENANT_ID: &str = "tenantId";

pub const COOKIE_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;
pub const SESSION_COOKIE_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

// Local cache
pub const LOCAL_STATUS: &str = "status";
pub const LOCAL_STEP: &str = "step";
pub const LOCAL_SETUP_DONE: &str = "setupDone";
pub const LOCAL_PLAN: &str = "plan";
pub const LOCAL_TENANT_ID: &str = "tenantId";

/// Parse a stored boolean in any of the casings found in stored data
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

pub fn identity_flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

pub fn cache_flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// `Some` only for a present, non-blank value
pub fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// First tenant id found under any of the legacy names
pub fn tenant_id_from(attributes: &HashMap<String, String>) -> Option<String> {
    TENANT_ID_ATTRS
        .iter()
        .find_map(|name| non_empty(attributes.get(*name)))
        .map(str::to_string)
}

fn flag_attr(attributes: &HashMap<String, String>, name: &str) -> bool {
    attributes
        .get(name)
        .and_then(|v| parse_flag(v))
        .unwrap_or(false)
}

/// Build a record from identity attributes. A missing or unrecognised status
/// reads as `not_started`.
pub fn record_from_attributes(attributes: &HashMap<String, String>) -> OnboardingRecord {
    let status = non_empty(attributes.get(ATTR_ONBOARDING))
        .and_then(OnboardingStatus::from_code)
        .unwrap_or_default();

    OnboardingRecord {
        status,
        business_info_done: flag_attr(attributes, ATTR_BUSINESS_INFO_DONE),
        subscription_done: flag_attr(attributes, ATTR_SUBSCRIPTION_DONE),
        payment_done: flag_attr(attributes, ATTR_PAYMENT_DONE),
        setup_done: flag_attr(attributes, ATTR_SETUP_DONE),
        tenant_id: tenant_id_from(attributes),
        plan: non_empty(attributes.get(ATTR_PLAN)).and_then(PlanTier::from_code),
        updated_at: non_empty(attributes.get(ATTR_UPDATED_AT)).map(str::to_string),
    }
}

/// Attributes written back by the synchronizer
pub fn status_attributes(status: OnboardingStatus, setup_done: bool) -> HashMap<String, String> {
    hashmap! {
        ATTR_ONBOARDING.to_string() => status.code().to_string(),
        ATTR_SETUP_DONE.to_string() => identity_flag(setup_done).to_string(),
        ATTR_UPDATED_AT.to_string() => Utc::now().to_rfc3339(),
    }
}

/// Attributes for a fresh account
pub fn initial_attributes() -> HashMap<String, String> {
    let mut attributes = status_attributes(OnboardingStatus::NotStarted, false);
    for name in [
        ATTR_BUSINESS_INFO_DONE,
        ATTR_SUBSCRIPTION_DONE,
        ATTR_PAYMENT_DONE,
    ] {
        attributes.insert(name.to_string(), identity_flag(false).to_string());
    }
    attributes
}

pub fn tenant_attributes(tenant_id: &str) -> HashMap<String, String> {
    TENANT_ID_ATTRS
        .iter()
        .map(|name| (name.to_string(), tenant_id.to_string()))
        .collect()
}

pub fn is_tenant_attr(name: &str) -> bool {
    TENANT_ID_ATTRS.iter().any(|n| *n == name)
}
