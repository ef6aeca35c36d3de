pub mod status;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use status::{OnboardingStatus, OnboardingStep, PlanTier, StatusSource};

/// Name of the event emitted after every synchronisation
pub const ONBOARDING_STATUS_UPDATED: &str = "onboardingStatusUpdated";

/// Полная запись онбординга одного пользователя
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingRecord {
    pub status: OnboardingStatus,
    pub business_info_done: bool,
    pub subscription_done: bool,
    pub payment_done: bool,
    pub setup_done: bool,
    pub tenant_id: Option<String>,
    pub plan: Option<PlanTier>,
    /// Advisory only, never used to pick a winner
    pub updated_at: Option<String>,
}

/// Result of reading the three stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingStatusView {
    pub status: OnboardingStatus,
    pub step: OnboardingStep,
    pub setup_done: bool,
    /// Stores that answered the read, with or without a value
    pub sources_queried: Vec<StatusSource>,
    pub conflicted: bool,
}

/// Payload of `onboardingStatusUpdated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingStatusEvent {
    pub status: OnboardingStatus,
    pub step: OnboardingStep,
    pub setup_done: bool,
}

/// Returned with a successful sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingRedirect {
    pub status: OnboardingStatus,
    pub step: OnboardingStep,
    pub setup_done: bool,
    pub redirect_path: String,
    /// Set when the account is on the override list
    pub overridden: bool,
}

/// Body of `POST /api/user/update-attributes`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAttributesRequest {
    pub attributes: HashMap<String, String>,
    #[serde(rename = "forceUpdate", default)]
    pub force_update: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAttributesResponse {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

/// Body of `POST /api/onboarding/step`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteStepRequest {
    pub step: OnboardingStep,
    pub plan: Option<PlanTier>,
    pub tenant_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_attributes_request_wire_names() {
        let body = r#"{"attributes":{"custom:onboarding":"payment"},"forceUpdate":true}"#;
        let request: UpdateAttributesRequest = serde_json::from_str(body).unwrap();
        assert!(request.force_update);
        assert_eq!(
            request.attributes.get("custom:onboarding").map(String::as_str),
            Some("payment")
        );

        let request: UpdateAttributesRequest =
            serde_json::from_str(r#"{"attributes":{}}"#).unwrap();
        assert!(!request.force_update);
    }

    #[test]
    fn test_complete_step_request_accepts_plan() {
        let body = r#"{"step":"subscription","plan":"professional","tenant_id":null}"#;
        let request: CompleteStepRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.step, OnboardingStep::Subscription);
        assert_eq!(request.plan, Some(PlanTier::Professional));
    }
}
