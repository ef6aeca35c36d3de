//! Onboarding status resolution.
//!
//! Onboarding progress is kept in three stores of the same key/value shape:
//! the identity store (user attributes, authoritative), the edge cache
//! (cookies) and the per-session local cache. The reader consults all three,
//! the identity store wins any disagreement, and the synchronizer rewrites
//! the losing stores so later reads agree.

pub mod attributes;
pub mod consistency;
pub mod context;
pub mod edge_cache;
pub mod events;
pub mod fallback;
pub mod identity_store;
pub mod local_cache;
pub mod merge;
pub mod overrides;
pub mod ports;
pub mod reader;
pub mod runtime;
pub mod service;
pub mod sign_in;
pub mod step_mapper;
pub mod synchronizer;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::OnboardingContext;
pub use ports::{AttributeFallback, EdgeCache, IdentityStore, StoreError};
