//! Reconciliation of the three stores.
//!
//! Precedence is fixed: identity store, then edge cache, then local cache.
//! Timestamps are never consulted.

use std::collections::HashMap;

use contracts::system::onboarding::{OnboardingStatus, PlanTier, StatusSource};

use super::attributes::{
    non_empty, parse_flag, ATTR_ONBOARDING, ATTR_PLAN, ATTR_SETUP_DONE, COOKIE_PLAN,
    COOKIE_SETUP_DONE, COOKIE_STATUS, LOCAL_PLAN, LOCAL_SETUP_DONE, LOCAL_STATUS,
};
use super::local_cache::LocalCache;
use super::ports::EdgeCache;
use super::step_mapper::normalize_status;

/// What one store says about the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceReading {
    pub status: OnboardingStatus,
    pub setup_done: Option<bool>,
    pub plan: Option<PlanTier>,
}

impl SourceReading {
    /// Same status, and same setup flag where both stores have one
    pub fn agrees_with(&self, other: &SourceReading) -> bool {
        if self.status != other.status {
            return false;
        }
        match (self.setup_done, other.setup_done) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readings {
    pub identity: Option<SourceReading>,
    pub edge: Option<SourceReading>,
    pub local: Option<SourceReading>,
}

impl Readings {
    /// Present readings in precedence order
    pub fn present(&self) -> Vec<(StatusSource, SourceReading)> {
        [
            (StatusSource::Identity, self.identity),
            (StatusSource::EdgeCache, self.edge),
            (StatusSource::LocalCache, self.local),
        ]
        .into_iter()
        .filter_map(|(source, reading)| reading.map(|r| (source, r)))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Every store that answered says the same thing
    Agree {
        source: StatusSource,
        reading: SourceReading,
    },
    /// Stores disagree; `winner` is the highest-precedence store that answered
    Resolved {
        winner: StatusSource,
        reading: SourceReading,
        losers: Vec<StatusSource>,
    },
    /// No store has a value
    Unresolvable,
}

pub fn merge(readings: &Readings) -> MergeOutcome {
    let present = readings.present();
    let Some((winner, reading)) = present.first().copied() else {
        return MergeOutcome::Unresolvable;
    };

    let losers: Vec<StatusSource> = present
        .iter()
        .skip(1)
        .filter(|(_, other)| !reading.agrees_with(other))
        .map(|(source, _)| *source)
        .collect();

    if losers.is_empty() {
        MergeOutcome::Agree {
            source: winner,
            reading,
        }
    } else {
        MergeOutcome::Resolved {
            winner,
            reading,
            losers,
        }
    }
}

fn reading_from(
    status: Option<String>,
    setup_done: Option<String>,
    plan: Option<String>,
) -> Option<SourceReading> {
    let status = status.filter(|s| !s.trim().is_empty())?;
    Some(SourceReading {
        status: normalize_status(&status),
        setup_done: setup_done.as_deref().and_then(parse_flag),
        plan: plan.as_deref().and_then(PlanTier::from_code),
    })
}

pub fn reading_from_attributes(attributes: &HashMap<String, String>) -> Option<SourceReading> {
    reading_from(
        non_empty(attributes.get(ATTR_ONBOARDING)).map(str::to_string),
        non_empty(attributes.get(ATTR_SETUP_DONE)).map(str::to_string),
        non_empty(attributes.get(ATTR_PLAN)).map(str::to_string),
    )
}

pub fn reading_from_edge<E: EdgeCache + ?Sized>(edge: &E) -> Option<SourceReading> {
    reading_from(
        edge.get(COOKIE_STATUS),
        edge.get(COOKIE_SETUP_DONE),
        edge.get(COOKIE_PLAN),
    )
}

pub fn reading_from_local(local: &LocalCache) -> Option<SourceReading> {
    reading_from(
        local.get(LOCAL_STATUS),
        local.get(LOCAL_SETUP_DONE),
        local.get(LOCAL_PLAN),
    )
}
