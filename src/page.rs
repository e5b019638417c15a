//! # Página Física e Fonte do Sistema
//!
//! Define a unidade de memória que circula entre fonte, pools e buffers,
//! e as seams de integração com o ambiente hospedeiro (fonte de páginas
//! e manutenção de cache).

use core::fmt;
use core::ptr::NonNull;

use crate::config::{order_to_size, PAGE_SIZE};

// =============================================================================
// PÁGINA
// =============================================================================

/// Um bloco de memória de `PAGE_SIZE << order` bytes, dono exclusivo.
///
/// Uma página pertence a exatamente um dono por vez: a fonte do sistema,
/// um pool ou um buffer. O tipo não é `Clone` nem `Copy` — duplicar o
/// handle permitiria double-free, então a posse segue as regras de
/// ownership do Rust.
pub struct Page {
    ptr: NonNull<u8>,
    order: u32,
    cached: bool,
    /// Veio direto da fonte (não de um pool). Limpo na montagem do scatter.
    pub(crate) from_system: bool,
    /// Conteúdo atualmente zerado, até onde o heap sabe.
    pub(crate) clean: bool,
}

// SAFETY: a página é dona exclusiva do bloco; nenhuma mutação via &Page.
unsafe impl Send for Page {}
unsafe impl Sync for Page {}

impl Page {
    /// Constrói uma página a partir de um bloco bruto.
    ///
    /// # Safety
    ///
    /// - `ptr` deve apontar para um bloco válido de `PAGE_SIZE << order`
    ///   bytes, alinhado a página, com posse exclusiva transferida aqui.
    /// - `zeroed` deve refletir o conteúdo real do bloco.
    pub unsafe fn from_raw(ptr: NonNull<u8>, order: u32, cached: bool, zeroed: bool) -> Self {
        debug_assert!(crate::config::is_aligned(ptr.as_ptr() as usize, PAGE_SIZE));
        Self {
            ptr,
            order,
            cached,
            from_system: false,
            clean: zeroed,
        }
    }

    /// Desfaz a página de volta em ponteiro bruto (caminho de free da fonte).
    pub fn into_raw(self) -> (NonNull<u8>, u32) {
        (self.ptr, self.order)
    }

    /// Ordem da página (0 = 1 página, 4 = 16 páginas)
    #[inline]
    pub const fn order(&self) -> u32 {
        self.order
    }

    /// Tamanho do bloco em bytes
    #[inline]
    pub const fn size(&self) -> usize {
        order_to_size(self.order)
    }

    /// Quantidade de páginas base cobertas pelo bloco
    #[inline]
    pub const fn page_count(&self) -> usize {
        1 << self.order
    }

    /// Tag de modo de cache
    #[inline]
    pub const fn is_cached(&self) -> bool {
        self.cached
    }

    /// Endereço inicial do bloco
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Retargeting do modo de cache (caminho SYNC_FORCE do release)
    pub(crate) fn set_cached(&mut self, cached: bool) {
        self.cached = cached;
    }

    /// Zera o conteúdo do bloco e marca a página como limpa.
    pub fn zero(&mut self) {
        // SAFETY: posse exclusiva do bloco de self.size() bytes
        unsafe {
            core::ptr::write_bytes(self.ptr.as_ptr(), 0, self.size());
        }
        self.clean = true;
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Page({:#x}, order={}, cached={})",
            self.addr(),
            self.order,
            self.cached
        )
    }
}

// =============================================================================
// FONTE DE PÁGINAS DO SISTEMA
// =============================================================================

/// Fonte global de páginas — o colaborador externo de onde o heap obtém
/// blocos quando os pools não têm estoque, e para onde devolve blocos
/// evictados.
///
/// Falha transitória (OOM) é retornada como `None`; o núcleo nunca faz
/// retry internamente, a política fica com o chamador.
pub trait PageSource: Send + Sync {
    /// Aloca um bloco de `PAGE_SIZE << order` bytes.
    ///
    /// `opportunistic` sinaliza pedido de baixo esforço: ordens altas podem
    /// falhar rápido sem pressionar o sistema; ordem 0 pede esforço total.
    fn alloc_pages(&self, order: u32, cached: bool, zeroed: bool, opportunistic: bool)
        -> Option<Page>;

    /// Devolve um bloco à fonte.
    fn free_pages(&self, page: Page);

    /// Total nominal de páginas do sistema (guarda anti-runaway do allocate).
    fn total_pages(&self) -> usize;
}

/// Fonte padrão sobre o alocador do processo (`std::alloc`).
pub struct SystemSource {
    nominal_total: usize,
}

impl SystemSource {
    /// `nominal_total_pages` alimenta a guarda de tamanho do allocate
    /// (pedidos acima da metade disso são rejeitados).
    pub fn new(nominal_total_pages: usize) -> Self {
        Self {
            nominal_total: nominal_total_pages,
        }
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        // 4 GiB nominais
        Self::new(1 << 20)
    }
}

impl PageSource for SystemSource {
    fn alloc_pages(
        &self,
        order: u32,
        cached: bool,
        zeroed: bool,
        _opportunistic: bool,
    ) -> Option<Page> {
        let layout = core::alloc::Layout::from_size_align(order_to_size(order), PAGE_SIZE).ok()?;
        // SAFETY: layout tem tamanho não nulo
        let raw = unsafe {
            if zeroed {
                std::alloc::alloc_zeroed(layout)
            } else {
                std::alloc::alloc(layout)
            }
        };
        let ptr = NonNull::new(raw)?;
        // SAFETY: bloco recém-alocado com o layout exato, posse exclusiva
        Some(unsafe { Page::from_raw(ptr, order, cached, zeroed) })
    }

    fn free_pages(&self, page: Page) {
        let size = page.size();
        let (ptr, _order) = page.into_raw();
        let layout = match core::alloc::Layout::from_size_align(size, PAGE_SIZE) {
            Ok(l) => l,
            Err(_) => return,
        };
        // SAFETY: bloco veio de alloc_pages com o mesmo layout
        unsafe {
            std::alloc::dealloc(ptr.as_ptr(), layout);
        }
    }

    fn total_pages(&self) -> usize {
        self.nominal_total
    }
}

// =============================================================================
// MANUTENÇÃO DE CACHE
// =============================================================================

/// Primitiva de manutenção de cache da plataforma. Caixa-preta sem retorno.
pub trait CacheSync: Send + Sync {
    fn flush_range(&self, addr: usize, len: usize);
}

/// Implementação nula para plataformas coerentes (e testes).
pub struct NoopCacheSync;

impl CacheSync for NoopCacheSync {
    fn flush_range(&self, _addr: usize, _len: usize) {}
}
