//! In-process counters for the debugging endpoint.
//!
//! A deliberately small registry: named monotonic counters plus service
//! uptime. Counters are observational only; nothing reads them back for
//! control flow, and the durable store remains the single writer of record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Counter registry.
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Increment a named counter by 1.
    pub fn incr(&self, name: &str) {
        self.incr_by(name, 1);
    }

    /// Increment a named counter.
    pub fn incr_by(&self, name: &str, delta: u64) {
        if let Some(counter) = self
            .counters
            .read()
            .expect("metrics registry poisoned")
            .get(name)
        {
            counter.fetch_add(delta, Ordering::Relaxed);
            return;
        }

        let mut counters = self.counters.write().expect("metrics registry poisoned");
        counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Read one counter.
    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .read()
            .expect("metrics registry poisoned")
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Snapshot all counters.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counters
            .read()
            .expect("metrics registry poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect()
    }

    /// Seconds since service start.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
