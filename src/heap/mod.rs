//! # Tiered Heap
//!
//! O `heap` é o motor de política de alocação: decide qual ordem de página
//! entregar, recicla páginas através dos pools e monta a descrição scatter
//! de cada buffer.
//!
//! ## 🎯 Propósito e Responsabilidade
//! - **Seleção de ordem:** satisfaz cada pedido com os maiores blocos que
//!   ainda cabem, da ordem mais alta para a mais baixa.
//! - **Pooling:** pool primeiro, fonte do sistema como fallback; no release,
//!   reciclagem limitada pelo teto global de páginas em pool.
//! - **Recarga:** acquire que deixa um pool de ordem alta abaixo da marca
//!   d'água acorda o worker daquele modo de cache.
//!
//! ## 🔍 Análise Crítica (Kernel Engineer's View)
//!
//! ### ✅ Pontos Fortes
//! - **Término garantido:** `max_order` nunca cresce dentro de uma alocação,
//!   então o loop converge mesmo com o pool oscilando.
//! - **Sem lock global:** só locks por pool, um de cada vez, nunca dois
//!   pools simultâneos — sem hierarquia de locks para errar.
//! - **Unwind completo:** falha parcial devolve cada página já adquirida;
//!   nenhum buffer parcial escapa.
//!
//! ### ⚠️ Pontos de Atenção
//! - **Teto é fronteira, não limite:** `max_pooled_pages` decide
//!   pool-vs-sistema no release; não é imposto no acquire. Rajadas de
//!   release podem passar do teto por um buffer.
//! - **Zeragem no release:** o custo de zerar fica no caminho de liberação,
//!   não no de alocação — bom para latência de alloc, ruim para release de
//!   buffers gigantes.

pub mod buffer;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::{align_up, order_to_size, HeapConfig, PAGE_SIZE};
use crate::error::{HeapError, HeapResult};
use crate::page::{CacheSync, NoopCacheSync, Page, PageSource, SystemSource};
use crate::pool::PagePool;
use crate::refill::RefillWorker;
use crate::stats;

pub use buffer::{Buffer, BufferFlags, ScatterEntry};

/// Índice do worker por modo de cache
#[inline]
const fn worker_index(cached: bool) -> usize {
    cached as usize
}

/// Heap de páginas em camadas com pooling de recarga preguiçosa.
///
/// Objeto único e de vida longa: é dono dos pools e dos workers de recarga,
/// e os finaliza no teardown. Sem estado global escondido.
pub struct TieredHeap {
    config: HeapConfig,
    source: Arc<dyn PageSource>,
    cache_sync: Arc<dyn CacheSync>,
    /// Pools paralelos a `config.page_orders`, por modo de cache
    pub(crate) uncached_pools: Vec<Arc<PagePool>>,
    pub(crate) cached_pools: Vec<Arc<PagePool>>,
    /// [uncached, cached]; presentes apenas com auto_refill ligado
    workers: [Option<RefillWorker>; 2],
}

impl TieredHeap {
    /// Constrói o heap: pools não-cacheados, pools cacheados e, com
    /// `auto_refill`, um worker de recarga por modo de cache.
    ///
    /// Tudo-ou-nada: falha ao criar um worker desfaz o que já existe e o
    /// heap inteiro não sobe.
    pub fn new(
        config: HeapConfig,
        source: Arc<dyn PageSource>,
        cache_sync: Arc<dyn CacheSync>,
    ) -> HeapResult<Self> {
        if !config.validate() {
            return Err(HeapError::InvalidConfig);
        }

        let make_pools = |cached: bool| -> Vec<Arc<PagePool>> {
            config
                .page_orders
                .iter()
                .map(|&order| Arc::new(PagePool::new(order, cached, config.low_watermark)))
                .collect()
        };

        let uncached_pools = make_pools(false);
        let cached_pools = make_pools(true);

        let mut workers = [None, None];
        if config.auto_refill {
            let uncached_worker =
                RefillWorker::spawn(false, uncached_pools.clone(), Arc::clone(&source))?;
            let cached_worker =
                match RefillWorker::spawn(true, cached_pools.clone(), Arc::clone(&source)) {
                    Ok(w) => w,
                    Err(e) => {
                        // Desfazer o worker já criado antes de falhar
                        uncached_worker.stop();
                        return Err(e);
                    }
                };
            workers[worker_index(false)] = Some(uncached_worker);
            workers[worker_index(true)] = Some(cached_worker);
        }

        crate::kinfo!(
            "(Heap) Inicializado: ordens={:?} teto={} auto_refill={}",
            config.page_orders,
            config.max_pooled_pages,
            config.auto_refill
        );

        Ok(Self {
            config,
            source,
            cache_sync,
            uncached_pools,
            cached_pools,
            workers,
        })
    }

    /// Heap com configuração default sobre o alocador do processo.
    pub fn with_defaults() -> HeapResult<Self> {
        Self::new(
            HeapConfig::default(),
            Arc::new(SystemSource::default()),
            Arc::new(NoopCacheSync),
        )
    }

    /// Configuração em vigor (imutável desde a construção)
    #[inline]
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Posição de uma ordem no conjunto configurado
    fn order_to_index(&self, order: u32) -> usize {
        match self.config.page_orders.iter().position(|&o| o == order) {
            Some(i) => i,
            // Páginas só nascem nos caminhos deste heap, sempre com ordem
            // do conjunto configurado.
            None => unreachable!("ordem {} fora do conjunto configurado", order),
        }
    }

    #[inline]
    pub(crate) fn source_ref(&self) -> &dyn PageSource {
        &*self.source
    }

    #[inline]
    pub(crate) fn pool_for(&self, index: usize, cached: bool) -> &Arc<PagePool> {
        if cached {
            &self.cached_pools[index]
        } else {
            &self.uncached_pools[index]
        }
    }

    /// Páginas base retidas em todos os pools somados
    pub fn pooled_pages(&self) -> usize {
        self.uncached_pools
            .iter()
            .chain(self.cached_pools.iter())
            .map(|p| p.total_pages())
            .sum()
    }

    /// Ocupação dos pools em KiB (relatório de diagnóstico)
    pub fn pooled_kb(&self) -> usize {
        self.pooled_pages() * (PAGE_SIZE / 1024)
    }

    /// Wakes já registrados pelo worker do modo dado (0 sem auto_refill)
    pub fn refill_wakes(&self, cached: bool) -> u64 {
        self.workers[worker_index(cached)]
            .as_ref()
            .map_or(0, |w| w.wakes())
    }

    // =========================================================================
    // ALOCAÇÃO
    // =========================================================================

    /// Aloca um buffer de `size` bytes no modo de cache dado.
    ///
    /// O backing é montado com os maiores blocos disponíveis que ainda
    /// cabem no restante do pedido; `max_order` só decresce, então nunca
    /// pedimos um bloco maior que o último obtido.
    pub fn allocate(
        &self,
        size: usize,
        align: usize,
        cached: bool,
        flags: BufferFlags,
    ) -> HeapResult<Buffer> {
        if align > PAGE_SIZE {
            return Err(HeapError::InvalidAlignment);
        }
        if size == 0 {
            return Err(HeapError::InvalidSize);
        }
        // Guarda anti-runaway, não contabilidade precisa
        if size / PAGE_SIZE > self.source.total_pages() / 2 {
            return Err(HeapError::OutOfMemory);
        }

        let mut buffer = Buffer::new(size, cached, flags);
        let mut size_remaining = align_up(size, PAGE_SIZE);
        let mut max_order = self.config.page_orders[0];

        while size_remaining > 0 {
            let page = match self.alloc_largest_available(&mut buffer, size_remaining, max_order) {
                Some(p) => p,
                None => {
                    crate::kwarn!(
                        "(Heap) OOM com {} bytes restantes de {}",
                        size_remaining,
                        size
                    );
                    self.unwind_buffer(&mut buffer);
                    return Err(HeapError::OutOfMemory);
                }
            };
            size_remaining -= page.size();
            max_order = page.order();
            buffer.pages.push(page);
        }

        self.assemble(&mut buffer);

        stats::BUFFERS_ALLOCATED.fetch_add(1, Ordering::Relaxed);
        stats::BYTES_ALLOCATED.fetch_add(buffer.backing_bytes() as u64, Ordering::Relaxed);
        crate::ktrace!(
            "(Heap) alocado {} bytes em {} segmentos (cached={})",
            buffer.size(),
            buffer.segment_count(),
            cached
        );
        Ok(buffer)
    }

    /// Obtém o maior bloco viável: pula ordens maiores que o restante do
    /// pedido ou que `max_order`, tenta as demais em ordem decrescente.
    fn alloc_largest_available(
        &self,
        buffer: &mut Buffer,
        size_remaining: usize,
        max_order: u32,
    ) -> Option<Page> {
        for &order in &self.config.page_orders {
            if order_to_size(order) > size_remaining {
                continue;
            }
            if order > max_order {
                continue;
            }
            if let Some(page) = self.alloc_buffer_page(buffer, order) {
                return Some(page);
            }
        }
        None
    }

    /// Uma página para o buffer: pool primeiro, fonte do sistema no miss.
    ///
    /// Páginas de pool já estão limpas; uma página vinda direto da fonte
    /// para um buffer cacheado entra na contagem de limpeza pendente e é
    /// flushada na montagem.
    fn alloc_buffer_page(&self, buffer: &mut Buffer, order: u32) -> Option<Page> {
        let cached = buffer.is_cached();
        let index = self.order_to_index(order);
        let pool = self.pool_for(index, cached);
        let zero_requested = !buffer.flags().contains(BufferFlags::NOZEROED);

        let acquired = pool.acquire(zero_requested);

        // Wake nivelado: qualquer acquire que observa o pool abaixo da
        // marca d'água posta um wake; duplicados são inofensivos.
        if self.config.auto_refill && pool.below_low_watermark() {
            self.wake_worker(cached);
        }

        let page = match acquired {
            Some(p) => {
                stats::POOL_HITS.fetch_add(1, Ordering::Relaxed);
                p
            }
            None => {
                stats::POOL_MISSES.fetch_add(1, Ordering::Relaxed);
                let mut p =
                    self.source
                        .alloc_pages(order, cached, zero_requested, order > 0)?;
                p.from_system = true;
                if cached {
                    buffer.pending_clean += 1 << order;
                }
                p
            }
        };
        Some(page)
    }

    /// Passe único de montagem: flush das páginas marcadas, limpeza dos
    /// marcadores de proveniência e emissão do scatter na ordem de
    /// aquisição.
    fn assemble(&self, buffer: &mut Buffer) {
        let pending = buffer.pending_clean;
        buffer.sg.reserve_exact(buffer.pages.len());
        for page in &mut buffer.pages {
            if pending > 0 && page.from_system {
                self.cache_sync.flush_range(page.addr(), page.size());
            }
            page.from_system = false;
            buffer.sg.push(ScatterEntry {
                addr: page.addr(),
                len: page.size(),
            });
        }
        buffer.pending_clean = 0;
    }

    /// Devolve todas as páginas já adquiridas de uma alocação que falhou.
    fn unwind_buffer(&self, buffer: &mut Buffer) {
        let pages = std::mem::take(&mut buffer.pages);
        for page in pages {
            self.free_buffer_page(buffer, false, page);
        }
        buffer.pending_clean = 0;
    }

    // =========================================================================
    // LIBERAÇÃO
    // =========================================================================

    /// Libera um buffer: recicla as páginas nos pools, ou devolve direto à
    /// fonte quando o total em pool já passou do teto global.
    pub fn release(&self, mut buffer: Buffer) {
        // Decisão pool-vs-sistema para o buffer inteiro: reciclar apenas se
        // o backing ainda couber no teto global.
        let incoming = buffer.backing_pages();
        let shrinker_free = self.pooled_pages() + incoming > self.config.max_pooled_pages;

        // Zerar antes de reciclar: o próximo dono não pode ver este conteúdo
        if !shrinker_free && !buffer.flags().contains(BufferFlags::NOZEROED) {
            for page in &mut buffer.pages {
                page.zero();
            }
        }

        let pages = std::mem::take(&mut buffer.pages);
        for page in pages {
            self.free_buffer_page(&buffer, shrinker_free, page);
        }

        stats::BUFFERS_RELEASED.fetch_add(1, Ordering::Relaxed);
        crate::ktrace!(
            "(Heap) release de {} bytes (direto ao sistema: {})",
            buffer.size(),
            shrinker_free
        );
    }

    /// Destino final de uma página de buffer.
    ///
    /// SYNC_FORCE em página cacheada flusha o range e retargeta o pool
    /// não-cacheado; `shrinker_free` pula os pools por completo.
    fn free_buffer_page(&self, buffer: &Buffer, shrinker_free: bool, mut page: Page) {
        if shrinker_free {
            self.source.free_pages(page);
            return;
        }

        if page.is_cached() && buffer.flags().contains(BufferFlags::SYNC_FORCE) {
            self.cache_sync.flush_range(page.addr(), page.size());
            page.set_cached(false);
        }

        let index = self.order_to_index(page.order());
        self.pool_for(index, page.is_cached()).release(page);
    }

    // =========================================================================
    // WORKERS E TEARDOWN
    // =========================================================================

    fn wake_worker(&self, cached: bool) {
        if let Some(worker) = &self.workers[worker_index(cached)] {
            worker.wake();
        }
    }

    /// Teardown explícito: para e junta os workers, depois drena todos os
    /// pools de volta à fonte. Idempotente; também chamado pelo `Drop`.
    pub fn shutdown(&mut self) {
        for slot in &mut self.workers {
            if let Some(worker) = slot.take() {
                worker.stop();
            }
        }
        for pool in self.uncached_pools.iter().chain(self.cached_pools.iter()) {
            pool.shrink(usize::MAX, false, &*self.source);
        }
    }
}

impl Drop for TieredHeap {
    fn drop(&mut self) {
        self.shutdown();
    }
}
