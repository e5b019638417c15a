//! # Page Pool
//!
//! Free list de páginas por (ordem, modo de cache), com duas sub-listas
//! (alta e baixa) e contabilidade lock-free dos totais.
//!
//! A sub-lista baixa recebe páginas recicladas de buffers; a alta recebe
//! páginas pré-alocadas pelo worker de recarga. Tanto o acquire quanto a
//! evicção preferem a lista baixa, então páginas recicladas saem primeiro.
//!
//! Nenhum lock é segurado durante chamadas à fonte do sistema: o shrink
//! retira um item por vez sob o lock e libera o bloco fora dele.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::collections::VecDeque;

use spin::Mutex;

use crate::page::{Page, PageSource};
use crate::stats;

/// Sub-listas protegidas pelo lock do pool
struct PoolLists {
    low: VecDeque<Page>,
    high: VecDeque<Page>,
}

/// Pool de páginas de uma (ordem, modo de cache)
pub struct PagePool {
    order: u32,
    cached: bool,
    low_watermark: usize,
    lists: Mutex<PoolLists>,
    low_count: AtomicUsize,
    high_count: AtomicUsize,
}

impl PagePool {
    pub fn new(order: u32, cached: bool, low_watermark: usize) -> Self {
        Self {
            order,
            cached,
            low_watermark,
            lists: Mutex::new(PoolLists {
                low: VecDeque::new(),
                high: VecDeque::new(),
            }),
            low_count: AtomicUsize::new(0),
            high_count: AtomicUsize::new(0),
        }
    }

    /// Ordem das páginas deste pool
    #[inline]
    pub const fn order(&self) -> u32 {
        self.order
    }

    /// Modo de cache deste pool
    #[inline]
    pub const fn is_cached(&self) -> bool {
        self.cached
    }

    /// Retira uma página do pool, lista baixa primeiro.
    ///
    /// Retorna `None` com o pool vazio — o chamador decide o fallback para
    /// a fonte do sistema. O pool nunca re-zera uma página que entrou limpa;
    /// uma página que entrou suja (release de buffer NOZEROED) é zerada
    /// aqui, preguiçosamente, quando `zero_requested` vale.
    pub fn acquire(&self, zero_requested: bool) -> Option<Page> {
        let mut page = {
            let mut lists = self.lists.lock();
            if let Some(p) = lists.low.pop_front() {
                self.low_count.fetch_sub(1, Ordering::Relaxed);
                Some(p)
            } else if let Some(p) = lists.high.pop_front() {
                self.high_count.fetch_sub(1, Ordering::Relaxed);
                Some(p)
            } else {
                None
            }
        }?;

        // Zeragem preguiçosa fora do lock
        if zero_requested && !page.clean {
            page.zero();
        }
        Some(page)
    }

    /// Devolve uma página reciclada ao pool (lista baixa).
    ///
    /// Nenhuma zeragem acontece aqui; o caminho de release do heap já
    /// zerou o buffer, ou o chamador pediu semântica no-zero.
    pub fn release(&self, page: Page) {
        debug_assert_eq!(page.order(), self.order);
        debug_assert_eq!(page.is_cached(), self.cached);

        let mut lists = self.lists.lock();
        lists.low.push_back(page);
        self.low_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Insere uma página recém-alocada pelo worker de recarga (lista alta).
    pub fn refill_insert(&self, page: Page) {
        debug_assert_eq!(page.order(), self.order);
        debug_assert_eq!(page.is_cached(), self.cached);
        debug_assert!(page.clean);

        let mut lists = self.lists.lock();
        lists.high.push_back(page);
        self.high_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Itens retidos no pool (lista baixa + alta)
    #[inline]
    pub fn total_count(&self) -> usize {
        self.low_count.load(Ordering::Relaxed) + self.high_count.load(Ordering::Relaxed)
    }

    /// Páginas base retidas no pool (itens escalados pela ordem)
    #[inline]
    pub fn total_pages(&self) -> usize {
        self.total_count() << self.order
    }

    /// O pool está abaixo da marca d'água baixa?
    ///
    /// Recarga só é definida para ordens altas; pools de ordem 0 nunca
    /// reportam falta — páginas simples saem barato direto do sistema.
    #[inline]
    pub fn below_low_watermark(&self) -> bool {
        self.order > 0 && self.total_count() < self.low_watermark
    }

    /// Evicta até `nr_pages` páginas base de volta à fonte do sistema.
    ///
    /// Com `only_scan`, apenas reporta o evictável sem mutar estado.
    /// A lista baixa esvazia antes da alta; cada bloco é liberado fora do
    /// lock. Retorna páginas base efetivamente liberadas.
    pub fn shrink(&self, nr_pages: usize, only_scan: bool, source: &dyn PageSource) -> usize {
        if only_scan {
            return self.total_pages();
        }

        let mut freed = 0usize;
        while freed < nr_pages {
            let page = {
                let mut lists = self.lists.lock();
                if let Some(p) = lists.low.pop_front() {
                    self.low_count.fetch_sub(1, Ordering::Relaxed);
                    Some(p)
                } else if let Some(p) = lists.high.pop_front() {
                    self.high_count.fetch_sub(1, Ordering::Relaxed);
                    Some(p)
                } else {
                    None
                }
            };

            match page {
                Some(p) => {
                    source.free_pages(p);
                    freed += 1 << self.order;
                }
                None => break,
            }
        }

        if freed > 0 {
            stats::PAGES_EVICTED.fetch_add(freed as u64, Ordering::Relaxed);
            crate::kdebug!(
                "(Pool) shrink ordem={} cached={}: {} páginas devolvidas",
                self.order,
                self.cached,
                freed
            );
        }
        freed
    }
}
