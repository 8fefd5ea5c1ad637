//! Per-operation invocation counters.
//!
//! Every call-through bumps its counter before touching the engine, so
//! failed calls are counted as well as successful ones.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

pub const OP_RESIZE: &str = "resize";
pub const OP_THUMBNAIL: &str = "thumbnail";
pub const OP_MAPIM: &str = "mapim";
pub const OP_MAPLUT: &str = "maplut";
pub const OP_AFFINE: &str = "affine";

static GLOBAL: LazyLock<Arc<OpCounters>> = LazyLock::new(|| Arc::new(OpCounters::new()));

/// Process-wide counters shared by every resampler built with
/// [`Resampler::new`](crate::Resampler::new).
pub fn op_counters() -> Arc<OpCounters> {
    Arc::clone(&GLOBAL)
}

/// Concurrent map from operation name to invocation count.
#[derive(Debug, Default)]
pub struct OpCounters {
    counts: DashMap<String, u64>,
}

impl OpCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `operation` by one and return the new count.
    pub fn incr(&self, operation: &str) -> u64 {
        if let Some(mut count) = self.counts.get_mut(operation) {
            *count += 1;
            return *count;
        }
        let mut count = self.counts.entry(operation.to_owned()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn get(&self, operation: &str) -> u64 {
        self.counts.get(operation).map_or(0, |c| *c)
    }

    /// Copy of all counters, sorted by operation name.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn reset(&self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_incr_starts_at_one() {
        let counters = OpCounters::new();
        assert_eq!(counters.get(OP_RESIZE), 0);
        assert_eq!(counters.incr(OP_RESIZE), 1);
        assert_eq!(counters.incr(OP_RESIZE), 2);
        assert_eq!(counters.get(OP_RESIZE), 2);
        assert_eq!(counters.get(OP_AFFINE), 0);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let counters = OpCounters::new();
        counters.incr(OP_THUMBNAIL);
        counters.incr(OP_AFFINE);
        counters.incr(OP_THUMBNAIL);
        let names: Vec<_> = counters.snapshot().into_iter().collect();
        assert_eq!(
            names,
            vec![(OP_AFFINE.to_owned(), 1), (OP_THUMBNAIL.to_owned(), 2)]
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let counters = OpCounters::new();
        counters.incr(OP_MAPLUT);
        counters.reset();
        assert!(counters.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let counters = Arc::new(OpCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = Arc::clone(&counters);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.incr(OP_MAPIM);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counters.get(OP_MAPIM), 8000);
    }

    #[test]
    fn test_global_counters_are_shared() {
        assert!(Arc::ptr_eq(&op_counters(), &op_counters()));
    }
}
