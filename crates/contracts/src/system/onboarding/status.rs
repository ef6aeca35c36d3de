use serde::{Deserialize, Serialize};

/// Статус онбординга (последний пройденный этап)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    NotStarted,
    BusinessInfo,
    Subscription,
    Payment,
    Setup,
    Complete,
}

impl OnboardingStatus {
    /// Canonical stored spelling
    pub fn code(&self) -> &'static str {
        match self {
            OnboardingStatus::NotStarted => "not_started",
            OnboardingStatus::BusinessInfo => "business_info",
            OnboardingStatus::Subscription => "subscription",
            OnboardingStatus::Payment => "payment",
            OnboardingStatus::Setup => "setup",
            OnboardingStatus::Complete => "complete",
        }
    }

    /// Parse a stored value. Both separator spellings seen in stored data are
    /// listed explicitly; anything else is `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "not_started" | "not-started" => Some(OnboardingStatus::NotStarted),
            "business_info" | "business-info" => Some(OnboardingStatus::BusinessInfo),
            "subscription" => Some(OnboardingStatus::Subscription),
            "payment" => Some(OnboardingStatus::Payment),
            "setup" => Some(OnboardingStatus::Setup),
            "complete" => Some(OnboardingStatus::Complete),
            _ => None,
        }
    }

    /// Position in the funnel, used to refuse backward transitions
    pub fn rank(&self) -> u8 {
        match self {
            OnboardingStatus::NotStarted => 0,
            OnboardingStatus::BusinessInfo => 1,
            OnboardingStatus::Subscription => 2,
            OnboardingStatus::Payment => 3,
            OnboardingStatus::Setup => 4,
            OnboardingStatus::Complete => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OnboardingStatus::Complete)
    }
}

impl Default for OnboardingStatus {
    fn default() -> Self {
        OnboardingStatus::NotStarted
    }
}

impl std::fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Следующий экран, на который попадает пользователь
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnboardingStep {
    BusinessInfo,
    Subscription,
    Payment,
    Setup,
    Dashboard,
}

impl OnboardingStep {
    pub fn code(&self) -> &'static str {
        match self {
            OnboardingStep::BusinessInfo => "business-info",
            OnboardingStep::Subscription => "subscription",
            OnboardingStep::Payment => "payment",
            OnboardingStep::Setup => "setup",
            OnboardingStep::Dashboard => "dashboard",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "business-info" | "business_info" => Some(OnboardingStep::BusinessInfo),
            "subscription" => Some(OnboardingStep::Subscription),
            "payment" => Some(OnboardingStep::Payment),
            "setup" => Some(OnboardingStep::Setup),
            "dashboard" => Some(OnboardingStep::Dashboard),
            _ => None,
        }
    }

    /// Client route for this step
    pub fn route(&self) -> &'static str {
        match self {
            OnboardingStep::BusinessInfo => "/onboarding/business-info",
            OnboardingStep::Subscription => "/onboarding/subscription",
            OnboardingStep::Payment => "/onboarding/payment",
            OnboardingStep::Setup => "/onboarding/setup",
            OnboardingStep::Dashboard => "/dashboard",
        }
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Тариф подписки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Professional,
    Enterprise,
}

impl PlanTier {
    pub fn code(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Professional => "professional",
            PlanTier::Enterprise => "enterprise",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "free" => Some(PlanTier::Free),
            "professional" => Some(PlanTier::Professional),
            "enterprise" => Some(PlanTier::Enterprise),
            _ => None,
        }
    }

    /// Paid tiers go through the payment step
    pub fn requires_payment(&self) -> bool {
        !matches!(self, PlanTier::Free)
    }
}

/// Where a piece of onboarding state was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Identity,
    EdgeCache,
    LocalCache,
}

impl StatusSource {
    /// Precedence order, highest authority first
    pub fn all() -> [StatusSource; 3] {
        [
            StatusSource::Identity,
            StatusSource::EdgeCache,
            StatusSource::LocalCache,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_aliases() {
        assert_eq!(
            OnboardingStatus::from_code("Business_Info"),
            Some(OnboardingStatus::BusinessInfo)
        );
        assert_eq!(
            OnboardingStatus::from_code("BUSINESS-INFO"),
            Some(OnboardingStatus::BusinessInfo)
        );
        assert_eq!(
            OnboardingStatus::from_code("not-started"),
            Some(OnboardingStatus::NotStarted)
        );
        assert_eq!(OnboardingStatus::from_code("business info"), None);
        assert_eq!(OnboardingStatus::from_code(""), None);
    }

    #[test]
    fn test_status_ranks_are_ordered() {
        let ordered = [
            OnboardingStatus::NotStarted,
            OnboardingStatus::BusinessInfo,
            OnboardingStatus::Subscription,
            OnboardingStatus::Payment,
            OnboardingStatus::Setup,
            OnboardingStatus::Complete,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_serde_uses_stored_spelling() {
        let json = serde_json::to_string(&OnboardingStatus::BusinessInfo).unwrap();
        assert_eq!(json, "\"business_info\"");
        let json = serde_json::to_string(&OnboardingStep::BusinessInfo).unwrap();
        assert_eq!(json, "\"business-info\"");
    }

    #[test]
    fn test_plan_tier_payment() {
        assert!(!PlanTier::Free.requires_payment());
        assert!(PlanTier::Professional.requires_payment());
        assert!(PlanTier::Enterprise.requires_payment());
        assert_eq!(PlanTier::from_code("Enterprise"), Some(PlanTier::Enterprise));
    }
}
