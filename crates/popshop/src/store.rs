//! Shared rule storage with atomic hot-swap.
//!
//! Readers take a cheap pointer-clone snapshot and keep it for the whole
//! request; `replace` publishes a new list in one atomic store. A snapshot
//! taken before a swap stays alive (and consistent) until its last holder
//! drops it, so a reload never tears a request's view of the rules.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::RuleSet;

pub struct RuleStore {
    current: ArcSwap<RuleSet>,
}

impl RuleStore {
    pub fn new(rules: RuleSet) -> Self {
        RuleStore {
            current: ArcSwap::from_pointee(rules),
        }
    }

    /// The current rule list. Hold the returned `Arc` for the duration of
    /// one request and no longer.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    /// Atomically publish a new rule list.
    pub fn replace(&self, rules: RuleSet) {
        self.current.store(Arc::new(rules));
    }

    pub fn count(&self) -> usize {
        self.current.load().len()
    }
}
