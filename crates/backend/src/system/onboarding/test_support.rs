use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::context::OnboardingContext;
use super::edge_cache::CookieJar;
use super::events::OnboardingEvents;
use super::local_cache::LocalCache;
use super::ports::{IdentityStore, StoreError};

/// Identity store kept in memory, with switchable failures
#[derive(Default)]
pub struct MemoryIdentityStore {
    attributes: Mutex<HashMap<String, String>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryIdentityStore {
    pub fn with(attributes: HashMap<String, String>) -> Arc<Self> {
        Arc::new(Self {
            attributes: Mutex::new(attributes),
            ..Self::default()
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::with(HashMap::new())
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.attributes.lock().unwrap().get(name).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.attributes.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn fetch_attributes(&self) -> Result<HashMap<String, String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("identity store offline".to_string()));
        }
        Ok(self.snapshot())
    }

    async fn update_attributes(
        &self,
        attributes: HashMap<String, String>,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("identity store offline".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.attributes.lock().unwrap().extend(attributes);
        Ok(())
    }
}

pub fn context_with(store: Arc<MemoryIdentityStore>, edge: CookieJar) -> OnboardingContext<CookieJar> {
    OnboardingContext::new(store, edge, LocalCache::new(), OnboardingEvents::new())
}
