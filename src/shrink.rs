//! # Shrink — Pressão de Memória
//!
//! Entrada chamada pelo notificador de pressão do ambiente hospedeiro.
//! Um pedido com contagem zero é só uma varredura (quantas páginas são
//! evictáveis); contagem positiva drena os pools de volta à fonte.
//!
//! A drenagem começa pelos pools de ordem menor — os menos valiosos de
//! reter — alternando não-cacheado e cacheado dentro de cada ordem, e para
//! assim que a contagem pedida é coberta.

use crate::heap::TieredHeap;

/// Nível de pressão reportado pelo ambiente. Advisory: registrado no log,
/// não muda a política de drenagem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    None,
    Low,
    Medium,
    Critical,
}

impl TieredHeap {
    /// Responde a um pedido de pressão de memória.
    ///
    /// `nr_to_scan == 0`: varredura — soma o evictável de todos os pools,
    /// sem mutar estado. Senão: evicta até `nr_to_scan` páginas base,
    /// ordem menor primeiro, e retorna o total efetivamente liberado.
    pub fn shrink(&self, pressure: MemoryPressure, nr_to_scan: usize) -> usize {
        let only_scan = nr_to_scan == 0;
        let source = self.source_ref();
        let mut nr_total = 0usize;
        let mut nr_remaining = nr_to_scan;

        // Ordens configuradas são decrescentes; iterar de trás para frente
        // drena as ordens menores primeiro.
        for index in (0..self.config().page_orders.len()).rev() {
            let uncached = self.pool_for(index, false);
            let cached = self.pool_for(index, true);

            if only_scan {
                nr_total += uncached.shrink(0, true, source);
                nr_total += cached.shrink(0, true, source);
                continue;
            }

            let freed = uncached.shrink(nr_remaining, false, source);
            nr_remaining = nr_remaining.saturating_sub(freed);
            nr_total += freed;
            if nr_remaining == 0 {
                break;
            }

            let freed = cached.shrink(nr_remaining, false, source);
            nr_remaining = nr_remaining.saturating_sub(freed);
            nr_total += freed;
            if nr_remaining == 0 {
                break;
            }
        }

        if !only_scan {
            crate::kdebug!(
                "(Shrink) pressão={:?}: {} de {} páginas liberadas",
                pressure,
                nr_total,
                nr_to_scan
            );
        }
        nr_total
    }
}
