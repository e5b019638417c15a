//! Testes do TieredHeap: validação de pedido, divisão por ordens, unwind,
//! teto de reciclagem e limpeza de cache.

use std::sync::Arc;

use crate::config::{HeapConfig, PAGE_SIZE};
use crate::error::HeapError;
use crate::heap::{BufferFlags, TieredHeap};
use crate::page::NoopCacheSync;

use super::common::{FakeSource, RecordingCacheSync};

fn test_config(auto_refill: bool) -> HeapConfig {
    HeapConfig {
        auto_refill,
        ..HeapConfig::default()
    }
}

fn heap_over(source: &Arc<FakeSource>, config: HeapConfig) -> TieredHeap {
    TieredHeap::new(
        config,
        Arc::clone(source) as Arc<dyn crate::page::PageSource>,
        Arc::new(NoopCacheSync),
    )
    .unwrap()
}

#[test]
fn test_rejects_alignment_above_page() {
    let source = Arc::new(FakeSource::new(64));
    let heap = heap_over(&source, test_config(false));

    let err = heap
        .allocate(PAGE_SIZE, 2 * PAGE_SIZE, false, BufferFlags::empty())
        .unwrap_err();
    assert_eq!(err, HeapError::InvalidAlignment);
}

#[test]
fn test_rejects_zero_size() {
    let source = Arc::new(FakeSource::new(64));
    let heap = heap_over(&source, test_config(false));

    let err = heap
        .allocate(0, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap_err();
    assert_eq!(err, HeapError::InvalidSize);
}

#[test]
fn test_rejects_more_than_half_of_system() {
    let source = Arc::new(FakeSource::new(100));
    let heap = heap_over(&source, test_config(false));

    // 51 de 100 páginas: acima da metade, guarda anti-runaway
    let err = heap
        .allocate(51 * PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap_err();
    assert_eq!(err, HeapError::OutOfMemory);

    // Exatamente a metade passa
    let buffer = heap
        .allocate(50 * PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap();
    assert_eq!(buffer.backing_pages(), 50);
    heap.release(buffer);
}

#[test]
fn test_rejects_invalid_config() {
    let source = Arc::new(FakeSource::new(64));
    let config = HeapConfig {
        page_orders: vec![0, 4], // fora de ordem
        ..HeapConfig::default()
    };
    let err = TieredHeap::new(
        config,
        Arc::clone(&source) as Arc<dyn crate::page::PageSource>,
        Arc::new(NoopCacheSync),
    )
    .err()
    .unwrap();
    assert_eq!(err, HeapError::InvalidConfig);
}

#[test]
fn test_seventeen_pages_split_as_one_superpage_plus_one() {
    let source = Arc::new(FakeSource::new(64));
    let heap = heap_over(&source, test_config(false));

    let buffer = heap
        .allocate(17 * PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap();

    // Um bloco de ordem 4 seguido de um de ordem 0, nessa ordem
    let sg = buffer.scatter();
    assert_eq!(sg.len(), 2);
    assert_eq!(sg[0].len, 16 * PAGE_SIZE);
    assert_eq!(sg[1].len, PAGE_SIZE);
    assert_eq!(buffer.backing_pages(), 17);

    heap.release(buffer);
}

#[test]
fn test_backing_covers_aligned_size_exactly() {
    let source = Arc::new(FakeSource::new(64));
    let heap = heap_over(&source, test_config(false));

    let buffer = heap
        .allocate(PAGE_SIZE + 1000, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap();
    assert_eq!(buffer.backing_bytes(), 2 * PAGE_SIZE);
    assert_eq!(
        buffer.scatter().iter().map(|s| s.len).sum::<usize>(),
        2 * PAGE_SIZE
    );

    heap.release(buffer);
}

#[test]
fn test_release_then_allocate_is_pool_satisfied() {
    let source = Arc::new(FakeSource::new(64));
    let heap = heap_over(&source, test_config(false));

    let buffer = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap();
    let calls_after_first = source.alloc_calls();
    heap.release(buffer);
    assert_eq!(heap.pooled_pages(), 1);

    // A segunda alocação sai do pool, sem tocar a fonte
    let buffer = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap();
    assert_eq!(source.alloc_calls(), calls_after_first);
    assert_eq!(heap.pooled_pages(), 0);

    heap.release(buffer);
}

#[test]
fn test_pool_ceiling_routes_third_release_to_system() {
    let source = Arc::new(FakeSource::new(64));
    let config = HeapConfig {
        max_pooled_pages: 2,
        auto_refill: false,
        ..HeapConfig::default()
    };
    let heap = heap_over(&source, config);

    let b1 = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap();
    let b2 = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap();
    let b3 = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap();

    heap.release(b1);
    assert_eq!(heap.pooled_pages(), 1);
    heap.release(b2);
    assert_eq!(heap.pooled_pages(), 2);

    // Reciclar a terceira estouraria o teto: vai direto ao sistema
    heap.release(b3);
    assert_eq!(heap.pooled_pages(), 2);
    assert_eq!(source.free_calls(), 1);
}

#[test]
fn test_pool_satisfies_allocation_with_source_exhausted() {
    let source = Arc::new(FakeSource::with_nominal_total(4, 1024));
    let heap = heap_over(&source, test_config(false));

    let buffers: Vec<_> = (0..4)
        .map(|_| {
            heap.allocate(PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
                .unwrap()
        })
        .collect();

    // Fonte esgotada e pools vazios: falha
    let err = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap_err();
    assert_eq!(err, HeapError::OutOfMemory);

    // Com uma página reciclada, o mesmo pedido é atendido pelo pool
    let calls = source.alloc_calls();
    let mut buffers = buffers;
    heap.release(buffers.pop().unwrap());
    let again = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap();
    assert_eq!(source.alloc_calls(), calls);

    heap.release(again);
    for b in buffers {
        heap.release(b);
    }
}

#[test]
fn test_failed_allocation_unwinds_every_page() {
    let source = Arc::new(FakeSource::with_nominal_total(10, 1024));
    let mut heap = heap_over(&source, test_config(false));

    // 17 páginas com só 10 disponíveis: ordem 4 nunca cabe, as 10 de
    // ordem 0 saem e depois a alocação inteira falha
    let err = heap
        .allocate(17 * PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap_err();
    assert_eq!(err, HeapError::OutOfMemory);

    // Nenhum buffer parcial: tudo que saiu voltou pelos pools
    assert_eq!(heap.pooled_pages(), 10);
    assert_eq!(source.allocated_pages(), 10);

    // Teardown drena os pools de volta à fonte
    heap.shutdown();
    assert_eq!(source.allocated_pages(), 0);
}

#[test]
fn test_nozeroed_recycling_is_zeroed_before_reuse() {
    let source = Arc::new(FakeSource::new(64));
    let heap = heap_over(&source, test_config(false));

    let buffer = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, false, BufferFlags::NOZEROED)
        .unwrap();
    let addr = buffer.scatter()[0].addr;
    unsafe {
        core::ptr::write_bytes(addr as *mut u8, 0xCD, PAGE_SIZE);
    }
    // NOZEROED: o release recicla a página suja
    heap.release(buffer);

    // O próximo consumidor pediu zeragem: não pode ver o conteúdo anterior
    let buffer = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap();
    assert_eq!(buffer.scatter()[0].addr, addr);
    let contents = unsafe { core::slice::from_raw_parts(addr as *const u8, PAGE_SIZE) };
    assert!(contents.iter().all(|&b| b == 0));

    heap.release(buffer);
}

#[test]
fn test_cached_system_pages_get_one_flush_at_assembly() {
    let source = Arc::new(FakeSource::new(64));
    let cache_sync = Arc::new(RecordingCacheSync::new());
    let heap = TieredHeap::new(
        test_config(false),
        Arc::clone(&source) as Arc<dyn crate::page::PageSource>,
        Arc::clone(&cache_sync) as Arc<dyn crate::page::CacheSync>,
    )
    .unwrap();

    // Pool vazio: página cacheada vem da fonte e é flushada na montagem
    let buffer = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, true, BufferFlags::empty())
        .unwrap();
    assert_eq!(cache_sync.flush_count(), 1);
    heap.release(buffer);

    // Página de pool já está limpa: nenhum flush novo
    let buffer = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, true, BufferFlags::empty())
        .unwrap();
    assert_eq!(cache_sync.flush_count(), 1);
    heap.release(buffer);
}

#[test]
fn test_uncached_buffers_never_flush() {
    let source = Arc::new(FakeSource::new(64));
    let cache_sync = Arc::new(RecordingCacheSync::new());
    let heap = TieredHeap::new(
        test_config(false),
        Arc::clone(&source) as Arc<dyn crate::page::PageSource>,
        Arc::clone(&cache_sync) as Arc<dyn crate::page::CacheSync>,
    )
    .unwrap();

    let buffer = heap
        .allocate(17 * PAGE_SIZE, PAGE_SIZE, false, BufferFlags::empty())
        .unwrap();
    assert_eq!(cache_sync.flush_count(), 0);
    heap.release(buffer);
}

#[test]
fn test_sync_force_flushes_and_retargets_uncached_pool() {
    let source = Arc::new(FakeSource::new(64));
    let cache_sync = Arc::new(RecordingCacheSync::new());
    let heap = TieredHeap::new(
        test_config(false),
        Arc::clone(&source) as Arc<dyn crate::page::PageSource>,
        Arc::clone(&cache_sync) as Arc<dyn crate::page::CacheSync>,
    )
    .unwrap();

    let buffer = heap
        .allocate(PAGE_SIZE, PAGE_SIZE, true, BufferFlags::SYNC_FORCE)
        .unwrap();
    let flushes_after_alloc = cache_sync.flush_count();
    heap.release(buffer);

    // Flush no release e página devolvida como não-cacheada
    assert_eq!(cache_sync.flush_count(), flushes_after_alloc + 1);
    assert_eq!(heap.uncached_pools[1].total_count(), 1);
    assert_eq!(heap.cached_pools[1].total_count(), 0);
}
