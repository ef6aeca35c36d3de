use std::collections::HashMap;
use std::time::Duration;

use crate::shared::config::OnboardingConfig;

use super::ports::{IdentityStore, StoreError};

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl SettlePolicy {
    pub fn from_config(config: &OnboardingConfig) -> Self {
        Self {
            attempts: config.settle_attempts.max(1),
            initial_backoff: Duration::from_millis(config.settle_initial_backoff_ms),
        }
    }

    /// Delay before attempt `attempt + 1` (zero-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self::from_config(&OnboardingConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct ReadAfterWrite {
    pub attributes: HashMap<String, String>,
    /// Every expected attribute was read back with the written value
    pub consistent: bool,
    pub attempts: u32,
}

fn matches_expected(
    attributes: &HashMap<String, String>,
    expected: &HashMap<String, String>,
) -> bool {
    expected
        .iter()
        .all(|(name, value)| attributes.get(name) == Some(value))
}

/// Read the identity store until it reflects `expected` or attempts run out.
/// Running out is not an error; the caller gets the last read with
/// `consistent == false`.
pub async fn read_after_write(
    store: &dyn IdentityStore,
    expected: &HashMap<String, String>,
    policy: SettlePolicy,
) -> Result<ReadAfterWrite, StoreError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        let attributes = store.fetch_attributes().await?;
        attempt += 1;
        if matches_expected(&attributes, expected) {
            return Ok(ReadAfterWrite {
                attributes,
                consistent: true,
                attempts: attempt,
            });
        }
        if attempt >= attempts {
            tracing::warn!(
                "Identity store did not reflect write after {} attempts",
                attempt
            );
            return Ok(ReadAfterWrite {
                attributes,
                consistent: false,
                attempts: attempt,
            });
        }
        tokio::time::sleep(policy.backoff(attempt - 1)).await;
    }
}

/// Fetch attributes, retrying only while the store reports itself unavailable
pub async fn fetch_with_retry(
    store: &dyn IdentityStore,
    policy: SettlePolicy,
) -> Result<HashMap<String, String>, StoreError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        match store.fetch_attributes().await {
            Ok(attributes) => return Ok(attributes),
            Err(StoreError::Unavailable(reason)) if attempt + 1 < attempts => {
                tracing::warn!(
                    "Identity store unavailable (attempt {}): {}",
                    attempt + 1,
                    reason
                );
                tokio::time::sleep(policy.backoff(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
