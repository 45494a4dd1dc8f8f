//! Process-wide string interning
//!
//! Text constants, function names and table names that end up in a program's
//! constant pool are interned here, so repeated compilations of similar
//! statements share one allocation per distinct string. The pool is populated
//! lazily and lives until process exit. Nothing depends on interning for
//! correctness: two equal strings compare equal whether or not they came from
//! the pool.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

static POOL: Lazy<DashMap<Arc<str>, ()>> = Lazy::new(DashMap::new);

/// Return the pooled copy of `s`, inserting it on first use.
pub fn intern(s: &str) -> Arc<str> {
    if let Some(entry) = POOL.get(s) {
        return entry.key().clone();
    }
    POOL.entry(Arc::from(s)).or_insert(()).key().clone()
}

/// Number of distinct strings currently pooled.
pub fn pool_size() -> usize {
    POOL.len()
}
