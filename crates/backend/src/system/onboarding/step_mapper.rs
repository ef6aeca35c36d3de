//! Status → next step mapping. Pure, total, no I/O.
//!
//! | status                              | plan                     | step          |
//! |-------------------------------------|--------------------------|---------------|
//! | not_started / not-started / "" / ?? | any                      | business-info |
//! | business_info / business-info       | any                      | subscription  |
//! | subscription                        | free                     | setup         |
//! | subscription                        | paid or unknown          | payment       |
//! | payment                             | any                      | setup         |
//! | setup                               | any                      | dashboard     |
//! | complete                            | any                      | dashboard     |
//!
//! Anything unrecognised starts the funnel over; it never lands on the
//! dashboard.

use contracts::system::onboarding::{OnboardingStatus, OnboardingStep, PlanTier};

/// Lower-case and resolve aliases; unrecognised input is `not_started`
pub fn normalize_status(raw: &str) -> OnboardingStatus {
    OnboardingStatus::from_code(raw).unwrap_or_default()
}

pub fn step_for(status: OnboardingStatus, plan: Option<PlanTier>) -> OnboardingStep {
    match status {
        OnboardingStatus::NotStarted => OnboardingStep::BusinessInfo,
        OnboardingStatus::BusinessInfo => OnboardingStep::Subscription,
        OnboardingStatus::Subscription => match plan {
            Some(PlanTier::Free) => OnboardingStep::Setup,
            // unknown tier goes through payment so a paid plan cannot skip it
            Some(PlanTier::Professional) | Some(PlanTier::Enterprise) | None => {
                OnboardingStep::Payment
            }
        },
        OnboardingStatus::Payment => OnboardingStep::Setup,
        OnboardingStatus::Setup => OnboardingStep::Dashboard,
        OnboardingStatus::Complete => OnboardingStep::Dashboard,
    }
}

/// String-level entry point used with raw stored values
pub fn next_step(raw_status: &str, raw_plan: Option<&str>) -> OnboardingStep {
    step_for(
        normalize_status(raw_status),
        raw_plan.and_then(PlanTier::from_code),
    )
}

pub fn redirect_path(step: OnboardingStep) -> &'static str {
    step.route()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &[
        "not_started",
        "not-started",
        "business_info",
        "business-info",
        "subscription",
        "payment",
        "setup",
        "complete",
    ];

    #[test]
    fn test_table() {
        assert_eq!(next_step("not_started", None), OnboardingStep::BusinessInfo);
        assert_eq!(next_step("not-started", None), OnboardingStep::BusinessInfo);
        assert_eq!(next_step("", None), OnboardingStep::BusinessInfo);
        assert_eq!(next_step("business_info", None), OnboardingStep::Subscription);
        assert_eq!(next_step("business-info", None), OnboardingStep::Subscription);
        assert_eq!(next_step("payment", None), OnboardingStep::Setup);
        assert_eq!(next_step("setup", None), OnboardingStep::Dashboard);
        assert_eq!(next_step("complete", None), OnboardingStep::Dashboard);
    }

    #[test]
    fn test_mapping_is_stable_across_calls() {
        for status in KNOWN {
            for plan in [None, Some("free"), Some("professional"), Some("enterprise")] {
                assert_eq!(next_step(status, plan), next_step(status, plan));
            }
        }
    }

    #[test]
    fn test_unknown_status_never_reaches_dashboard() {
        for garbage in [
            "",
            " ",
            "dashboard",
            "completed",
            "COMPLETE!",
            "business info",
            "null",
            "undefined",
            "🚀",
            "setup; DROP TABLE",
        ] {
            assert_eq!(
                next_step(garbage, None),
                OnboardingStep::BusinessInfo,
                "status {garbage:?}"
            );
            assert_eq!(
                next_step(garbage, Some("enterprise")),
                OnboardingStep::BusinessInfo
            );
        }
    }

    #[test]
    fn test_subscription_branches_on_plan() {
        assert_eq!(next_step("subscription", Some("free")), OnboardingStep::Setup);
        assert_eq!(
            next_step("subscription", Some("professional")),
            OnboardingStep::Payment
        );
        assert_eq!(
            next_step("subscription", Some("enterprise")),
            OnboardingStep::Payment
        );
        assert_eq!(next_step("subscription", Some("FREE")), OnboardingStep::Setup);
        assert_eq!(next_step("subscription", None), OnboardingStep::Payment);
    }

    #[test]
    fn test_case_variants_map_together() {
        for raw in ["Business_Info", "BUSINESS-INFO", "business_info"] {
            assert_eq!(next_step(raw, None), OnboardingStep::Subscription);
        }
    }

    #[test]
    fn test_plan_only_matters_for_subscription() {
        for status in KNOWN.iter().filter(|s| **s != "subscription") {
            assert_eq!(next_step(status, Some("free")), next_step(status, Some("enterprise")));
        }
    }

    #[test]
    fn test_redirect_paths() {
        assert_eq!(redirect_path(OnboardingStep::Dashboard), "/dashboard");
        assert_eq!(
            redirect_path(OnboardingStep::BusinessInfo),
            "/onboarding/business-info"
        );
    }
}
