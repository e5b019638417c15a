//! # Refill Worker
//!
//! Thread de fundo, uma por modo de cache, que mantém os pools de ordem
//! alta abastecidos. Dorme num condvar; qualquer acquire que observa um
//! pool abaixo da marca d'água posta um wake (nivelado — wakes redundantes
//! são inofensivos). O stop é cooperativo: só é honrado no ponto de
//! suspensão, nunca no meio de uma recarga.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::error::{HeapError, HeapResult};
use crate::page::PageSource;
use crate::pool::PagePool;
use crate::stats;

/// Estado compartilhado entre o heap e a thread do worker
struct WorkerShared {
    /// Pedido de parada; honrado apenas no ponto de suspensão
    stop: AtomicBool,
    /// Wake pendente, protegido pelo mutex do condvar
    pending: Mutex<bool>,
    condvar: Condvar,
    /// Wakes postados (observável em teste de marca d'água)
    wakes: AtomicU64,
}

impl WorkerShared {
    fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            pending: Mutex::new(false),
            condvar: Condvar::new(),
            wakes: AtomicU64::new(0),
        }
    }

    /// Lock tolerante a poison: um worker que morreu em pânico não pode
    /// travar o teardown do heap.
    fn lock_pending(&self) -> MutexGuard<'_, bool> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Worker de recarga de um modo de cache.
///
/// Propriedade do heap: criado na construção (com auto_refill) e parado e
/// juntado no teardown.
pub struct RefillWorker {
    shared: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>,
}

impl RefillWorker {
    /// Cria a thread do worker para os pools de um modo de cache.
    ///
    /// Falha de spawn é fatal para a construção do heap
    /// (`WorkerSpawnFailed`).
    pub(crate) fn spawn(
        cached: bool,
        pools: Vec<Arc<PagePool>>,
        source: Arc<dyn PageSource>,
    ) -> HeapResult<Self> {
        let shared = Arc::new(WorkerShared::new());
        let thread_shared = Arc::clone(&shared);
        let name = if cached {
            "crucible-pool-cached"
        } else {
            "crucible-pool-uncached"
        };

        let handle = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || worker_loop(cached, pools, source, thread_shared))
            .map_err(|e| {
                crate::kerror!("(Refill) Falha ao criar worker {}: {}", name, e);
                HeapError::WorkerSpawnFailed
            })?;

        crate::kdebug!("(Refill) Worker {} criado", name);
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Posta um wake nivelado para o worker.
    pub(crate) fn wake(&self) {
        self.shared.wakes.fetch_add(1, Ordering::Relaxed);
        stats::WORKER_WAKES.fetch_add(1, Ordering::Relaxed);

        let mut pending = self.shared.lock_pending();
        *pending = true;
        self.shared.condvar.notify_one();
    }

    /// Wakes já postados para este worker
    pub(crate) fn wakes(&self) -> u64 {
        self.shared.wakes.load(Ordering::Relaxed)
    }

    /// Para o worker e junta a thread.
    ///
    /// Recarga em andamento termina antes da parada; depois do join não
    /// acontece mais nenhuma alocação por este worker.
    pub(crate) fn stop(mut self) {
        self.shared.stop.store(true, Ordering::Release);
        {
            // Notificar sob o lock evita wakeup perdido na corrida com wait
            let _pending = self.shared.lock_pending();
            self.shared.condvar.notify_one();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Loop do worker: varre os pools do seu modo, recarrega os que estão
/// abaixo da marca d'água e suspende até o próximo wake ou stop.
fn worker_loop(
    cached: bool,
    pools: Vec<Arc<PagePool>>,
    source: Arc<dyn PageSource>,
    shared: Arc<WorkerShared>,
) {
    loop {
        for pool in &pools {
            if pool.below_low_watermark() {
                refill_pool(pool, cached, &*source);
            }
        }

        // Ponto de suspensão: único lugar onde o stop é honrado
        let mut pending = shared.lock_pending();
        while !*pending && !shared.stop.load(Ordering::Acquire) {
            pending = shared
                .condvar
                .wait(pending)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        if shared.stop.load(Ordering::Acquire) {
            break;
        }
        *pending = false;
    }

    crate::kdebug!("(Refill) Worker cached={} encerrado", cached);
}

/// Recarrega um pool até a marca d'água limpar ou a fonte falhar.
///
/// Páginas novas entram zeradas direto na lista alta do pool, sem passar
/// pelo caminho de Buffer. Falha da fonte encerra a recarga sem retry.
fn refill_pool(pool: &Arc<PagePool>, cached: bool, source: &dyn PageSource) {
    let mut added = 0usize;
    while pool.below_low_watermark() {
        match source.alloc_pages(pool.order(), cached, true, true) {
            Some(page) => {
                pool.refill_insert(page);
                added += 1 << pool.order();
            }
            None => break,
        }
    }

    if added > 0 {
        stats::PAGES_REFILLED.fetch_add(added as u64, Ordering::Relaxed);
        crate::ktrace!(
            "(Refill) Pool ordem={} cached={}: +{} páginas",
            pool.order(),
            cached,
            added
        );
    }
}
