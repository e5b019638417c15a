//! # Crucible — Tiered Page Heap
//!
//! Heap de páginas em camadas com pooling de recarga preguiçosa, extraído
//! do subsistema de memória do Redstone OS como biblioteca hospedada.
//!
//! ## 🎯 Propósito e Responsabilidade
//! - **Política de alocação:** decide qual ordem de página entregar para
//!   cada pedido (maiores blocos primeiro), com fallback para a fonte do
//!   sistema quando o pool está vazio.
//! - **Reciclagem:** páginas liberadas voltam aos pools até o teto global;
//!   acima dele, direto ao sistema.
//! - **Recarga de fundo:** um worker por modo de cache repõe os pools de
//!   ordem alta quando a marca d'água baixa é rompida.
//! - **Pressão de memória:** o ambiente drena os pools via `shrink`.
//!
//! ## 🏗️ Arquitetura dos Módulos
//!
//! | Módulo | Responsabilidade |
//! |--------|------------------|
//! | `pool`   | Free list por (ordem, modo de cache), sub-listas alta/baixa, marca d'água. |
//! | `heap`   | Seleção de ordem, montagem de buffer/scatter, teto de reciclagem. |
//! | `refill` | Worker de recarga por modo de cache, parada cooperativa. |
//! | `shrink` | Resposta a pressão de memória, drenagem ordem-menor-primeiro. |
//! | `page`   | Unidade de página com posse exclusiva; seams `PageSource`/`CacheSync`. |
//! | `config` | Constantes, defaults e `HeapConfig` imutável. |
//! | `error`  | `HeapError` / `HeapResult`. |
//! | `stats`  | Contadores globais atômicos com snapshot. |
//!
//! ## Modelo de posse
//!
//! Cada página pertence a exatamente um dono por vez — fonte do sistema,
//! pool ou buffer — e os tipos não são `Clone`: double-free não compila.
//! O heap é um objeto único de vida longa, dono dos pools e dos workers,
//! que ele para e junta no teardown. Sem estado global escondido.
//!
//! ## Concorrência
//!
//! Locks só por pool, um de cada vez, nunca dois pools simultâneos.
//! Nenhum lock atravessa uma chamada à fonte do sistema. O wake do worker
//! é nivelado (wakes redundantes são inofensivos) e o stop é cooperativo,
//! honrado apenas no ponto de suspensão do worker.

pub mod config;
pub mod error;
pub mod heap;
pub mod page;
pub mod pool;
pub mod refill;
pub mod shrink;
pub mod stats;

mod logging;

#[cfg(test)]
mod test;

// Re-exports para conveniência
pub use config::HeapConfig;
pub use error::{HeapError, HeapResult};
pub use heap::{Buffer, BufferFlags, ScatterEntry, TieredHeap};
pub use page::{CacheSync, NoopCacheSync, Page, PageSource, SystemSource};
pub use pool::PagePool;
pub use shrink::MemoryPressure;
