//! Query identity and the concurrent plan cache.
//!
//! Two maps, both safe for concurrent readers and writers:
//!
//! ```text
//! QueryId                                   -> PreparedQuery (classified tree)
//! (QueryId, dialect, options, param shapes) -> CompiledPlan  (SQL + placeholder slots)
//! ```
//!
//! A hit on the second map skips classification and translation; only the
//! binder runs. Entries are immutable `Arc`s, so a reader never observes a
//! partially built plan.

mod hash;
pub use hash::compute_hash;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::bind::{ParamShape, QueryId};
use crate::compile::{CompiledPlan, PreparedQuery};
use crate::sql::dialect::{Dialect, ParamStyle};

/// Everything a compiled plan depends on besides the query itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanKey {
    pub query: QueryId,
    pub dialect: Dialect,
    pub style: ParamStyle,
    pub inline_constants: bool,
    pub pretty: bool,
    pub signature: Vec<ParamShape>,
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub plans: usize,
    pub prepared: usize,
}

#[derive(Debug)]
pub struct PlanCache {
    prepared: DashMap<QueryId, Arc<PreparedQuery>>,
    plans: DashMap<PlanKey, Arc<CompiledPlan>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PlanCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            prepared: DashMap::new(),
            plans: DashMap::new(),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn prepared(&self, id: &QueryId) -> Option<Arc<PreparedQuery>> {
        self.prepared.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Store a prepared query. When another thread got there first its
    /// entry wins, so every caller shares one instance.
    pub fn insert_prepared(&self, prepared: PreparedQuery) -> Arc<PreparedQuery> {
        if self.prepared.len() >= self.max_entries {
            debug!(entries = self.prepared.len(), "prepared-query cache full, clearing");
            self.prepared.clear();
        }
        let entry = self
            .prepared
            .entry(prepared.id.clone())
            .or_insert_with(|| Arc::new(prepared));
        Arc::clone(entry.value())
    }

    pub fn plan(&self, key: &PlanKey) -> Option<Arc<CompiledPlan>> {
        match self.plans.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(query = %key.query, dialect = %key.dialect, "plan cache hit");
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(query = %key.query, dialect = %key.dialect, "plan cache miss");
                None
            }
        }
    }

    pub fn insert_plan(&self, key: PlanKey, plan: CompiledPlan) -> Arc<CompiledPlan> {
        if self.plans.len() >= self.max_entries {
            debug!(entries = self.plans.len(), "plan cache full, clearing");
            self.plans.clear();
        }
        let entry = self.plans.entry(key).or_insert_with(|| Arc::new(plan));
        Arc::clone(entry.value())
    }

    pub fn clear(&self) {
        self.prepared.clear();
        self.plans.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            plans: self.plans.len(),
            prepared: self.prepared.len(),
        }
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(1024)
    }
}
