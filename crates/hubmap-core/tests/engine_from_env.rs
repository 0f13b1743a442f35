//! Environment-driven engine setup
//!
//! Kept in its own test binary: the process-wide cache is sized by whichever
//! call creates it first.

use hubmap_core::{EngineContext, TerminologyCache};
use std::sync::Arc;

#[test]
fn test_from_env_sizes_shared_cache() {
    std::env::set_var("HUBMAP_TERMINOLOGY_ENABLED", "false");
    std::env::set_var("HUBMAP_TERMINOLOGY_CACHE_CAPACITY", "2");

    let context = EngineContext::from_env().unwrap();
    let cache = context.terminology.cache();

    assert!(!context.terminology.is_enabled());
    assert_eq!(cache.capacity(), 2);
    assert!(Arc::ptr_eq(cache, &TerminologyCache::global()));

    // A later context shares the cache without resizing it
    std::env::set_var("HUBMAP_TERMINOLOGY_CACHE_CAPACITY", "50");
    let later = EngineContext::from_env().unwrap();
    assert!(Arc::ptr_eq(later.terminology.cache(), cache));
    assert_eq!(later.terminology.cache().capacity(), 2);
}
