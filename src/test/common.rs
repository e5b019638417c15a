//! Colaboradores falsos para os testes: fonte de páginas com capacidade
//! finita e contadores, e manutenção de cache que grava cada flush.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::{order_to_size, PAGE_SIZE};
use crate::page::{CacheSync, Page, PageSource};

/// Fonte de páginas com capacidade finita em páginas base.
///
/// Os blocos são memória real do processo, então zeragem e escrita via
/// scatter funcionam de verdade nos testes.
pub struct FakeSource {
    capacity: usize,
    nominal_total: usize,
    allocated: AtomicUsize,
    allocs: AtomicUsize,
    frees: AtomicUsize,
    fail_all: AtomicBool,
    freed_addrs: Mutex<Vec<usize>>,
}

impl FakeSource {
    pub fn new(capacity_pages: usize) -> Self {
        Self {
            capacity: capacity_pages,
            nominal_total: capacity_pages,
            allocated: AtomicUsize::new(0),
            allocs: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            fail_all: AtomicBool::new(false),
            freed_addrs: Mutex::new(Vec::new()),
        }
    }

    /// Capacidade dada, mas total nominal maior (para não tropeçar na
    /// guarda de metade-da-RAM em testes de exaustão).
    pub fn with_nominal_total(capacity_pages: usize, nominal_total: usize) -> Self {
        let mut s = Self::new(capacity_pages);
        s.nominal_total = nominal_total;
        s
    }

    /// Páginas base atualmente fora da fonte
    pub fn allocated_pages(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Chamadas de alocação atendidas
    pub fn alloc_calls(&self) -> usize {
        self.allocs.load(Ordering::Relaxed)
    }

    /// Chamadas de free recebidas
    pub fn free_calls(&self) -> usize {
        self.frees.load(Ordering::Relaxed)
    }

    /// Endereços devolvidos, na ordem de chegada
    pub fn freed_addrs(&self) -> Vec<usize> {
        self.freed_addrs.lock().unwrap().clone()
    }

    /// Liga/desliga falha forçada de toda alocação
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::Relaxed);
    }
}

impl PageSource for FakeSource {
    fn alloc_pages(
        &self,
        order: u32,
        cached: bool,
        zeroed: bool,
        _opportunistic: bool,
    ) -> Option<Page> {
        if self.fail_all.load(Ordering::Relaxed) {
            return None;
        }

        let need = 1usize << order;
        let mut current = self.allocated.load(Ordering::Relaxed);
        loop {
            if current + need > self.capacity {
                return None;
            }
            match self.allocated.compare_exchange(
                current,
                current + need,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        let layout =
            std::alloc::Layout::from_size_align(order_to_size(order), PAGE_SIZE).unwrap();
        let raw = unsafe {
            if zeroed {
                std::alloc::alloc_zeroed(layout)
            } else {
                std::alloc::alloc(layout)
            }
        };
        let ptr = match NonNull::new(raw) {
            Some(p) => p,
            None => {
                self.allocated.fetch_sub(need, Ordering::Relaxed);
                return None;
            }
        };

        self.allocs.fetch_add(1, Ordering::Relaxed);
        Some(unsafe { Page::from_raw(ptr, order, cached, zeroed) })
    }

    fn free_pages(&self, page: Page) {
        let pages = page.page_count();
        let size = page.size();
        self.freed_addrs.lock().unwrap().push(page.addr());
        let (ptr, _order) = page.into_raw();
        let layout = std::alloc::Layout::from_size_align(size, PAGE_SIZE).unwrap();
        unsafe {
            std::alloc::dealloc(ptr.as_ptr(), layout);
        }
        self.allocated.fetch_sub(pages, Ordering::Relaxed);
        self.frees.fetch_add(1, Ordering::Relaxed);
    }

    fn total_pages(&self) -> usize {
        self.nominal_total
    }
}

/// Manutenção de cache que grava cada flush pedido.
#[derive(Default)]
pub struct RecordingCacheSync {
    flushes: Mutex<Vec<(usize, usize)>>,
}

impl RecordingCacheSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.lock().unwrap().len()
    }

    pub fn flushes(&self) -> Vec<(usize, usize)> {
        self.flushes.lock().unwrap().clone()
    }
}

impl CacheSync for RecordingCacheSync {
    fn flush_range(&self, addr: usize, len: usize) {
        self.flushes.lock().unwrap().push((addr, len));
    }
}
