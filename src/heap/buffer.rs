//! # Buffer
//!
//! Resultado de uma alocação: a posse de uma sequência de páginas e a
//! descrição scatter correspondente para a camada de mapeamento/DMA.

use bitflags::bitflags;

use crate::page::Page;

bitflags! {
    /// Flags de alocação pedidas pelo chamador
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferFlags: u32 {
        /// Não zerar páginas novas nem o conteúdo no release.
        /// O chamador assume a responsabilidade pelo conteúdo exposto.
        const NOZEROED = 1 << 0;
        /// Forçar flush de cache no release e devolver as páginas como
        /// não-cacheadas.
        const SYNC_FORCE = 1 << 1;
    }
}

/// Um segmento do backing de um buffer: (endereço, comprimento)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScatterEntry {
    pub addr: usize,
    pub len: usize,
}

/// Um buffer alocado pelo heap.
///
/// Dono exclusivo das suas páginas. Deve voltar ao heap via
/// `TieredHeap::release` — descartar o buffer sem release vaza as páginas,
/// porque só o heap sabe devolvê-las ao pool ou à fonte.
#[must_use = "buffers devem voltar ao heap via TieredHeap::release"]
#[derive(Debug)]
pub struct Buffer {
    size: usize,
    cached: bool,
    flags: BufferFlags,
    pub(crate) pages: Vec<Page>,
    pub(crate) sg: Vec<ScatterEntry>,
    /// Páginas base aguardando passe de limpeza de cache.
    /// Não-zero apenas entre a aquisição das páginas e a montagem do scatter.
    pub(crate) pending_clean: usize,
}

impl Buffer {
    pub(crate) fn new(size: usize, cached: bool, flags: BufferFlags) -> Self {
        Self {
            size,
            cached,
            flags,
            pages: Vec::new(),
            sg: Vec::new(),
            pending_clean: 0,
        }
    }

    /// Tamanho pedido pelo chamador, em bytes
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Modo de cache do buffer
    #[inline]
    pub const fn is_cached(&self) -> bool {
        self.cached
    }

    /// Flags de alocação
    #[inline]
    pub const fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Quantidade de segmentos (um por página adquirida)
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.pages.len()
    }

    /// Bytes efetivamente reservados (soma dos segmentos)
    pub fn backing_bytes(&self) -> usize {
        self.pages.iter().map(|p| p.size()).sum()
    }

    /// Páginas base do backing
    pub fn backing_pages(&self) -> usize {
        self.pages.iter().map(|p| p.page_count()).sum()
    }

    /// Descrição scatter do backing, na ordem de aquisição.
    ///
    /// É isto que a camada de mapeamento/DMA consome.
    #[inline]
    pub fn scatter(&self) -> &[ScatterEntry] {
        &self.sg
    }
}
