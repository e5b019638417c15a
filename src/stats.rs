//! # Heap Statistics

use core::sync::atomic::{AtomicU64, Ordering};

pub static POOL_HITS: AtomicU64 = AtomicU64::new(0);
pub static POOL_MISSES: AtomicU64 = AtomicU64::new(0);
pub static PAGES_REFILLED: AtomicU64 = AtomicU64::new(0);
pub static PAGES_EVICTED: AtomicU64 = AtomicU64::new(0);
pub static WORKER_WAKES: AtomicU64 = AtomicU64::new(0);
pub static BUFFERS_ALLOCATED: AtomicU64 = AtomicU64::new(0);
pub static BUFFERS_RELEASED: AtomicU64 = AtomicU64::new(0);
pub static BYTES_ALLOCATED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy)]
pub struct HeapStats {
    pub pool_hits: u64,
    pub pool_misses: u64,
    pub pages_refilled: u64,
    pub pages_evicted: u64,
    pub worker_wakes: u64,
    pub buffers_allocated: u64,
    pub buffers_released: u64,
    pub bytes_allocated: u64,
}

impl HeapStats {
    /// Fração de páginas servidas pelo pool, em porcentagem.
    pub fn hit_percent(&self) -> u64 {
        let total = self.pool_hits + self.pool_misses;
        if total == 0 {
            return 0;
        }
        (self.pool_hits * 100) / total
    }
}

pub fn snapshot() -> HeapStats {
    HeapStats {
        pool_hits: POOL_HITS.load(Ordering::Relaxed),
        pool_misses: POOL_MISSES.load(Ordering::Relaxed),
        pages_refilled: PAGES_REFILLED.load(Ordering::Relaxed),
        pages_evicted: PAGES_EVICTED.load(Ordering::Relaxed),
        worker_wakes: WORKER_WAKES.load(Ordering::Relaxed),
        buffers_allocated: BUFFERS_ALLOCATED.load(Ordering::Relaxed),
        buffers_released: BUFFERS_RELEASED.load(Ordering::Relaxed),
        bytes_allocated: BYTES_ALLOCATED.load(Ordering::Relaxed),
    }
}
