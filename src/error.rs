//! Tipos de Erro do Heap
//!
//! Define erros estruturados para diagnóstico preciso de falhas de alocação.

/// Erros do heap de páginas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// Sem memória disponível na fonte do sistema (OOM)
    OutOfMemory,
    /// Alinhamento pedido excede uma página
    InvalidAlignment,
    /// Tamanho inválido (zero)
    InvalidSize,
    /// Configuração rejeitada na construção
    InvalidConfig,
    /// Falha ao criar worker de recarga
    WorkerSpawnFailed,
}

impl HeapError {
    /// Retorna descrição legível do erro
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "OOM: fonte do sistema esgotada",
            Self::InvalidAlignment => "Alinhamento maior que uma página",
            Self::InvalidSize => "Tamanho inválido",
            Self::InvalidConfig => "Configuração inválida",
            Self::WorkerSpawnFailed => "Falha ao criar worker de recarga",
        }
    }
}

impl core::fmt::Display for HeapError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::error::Error for HeapError {}

/// Tipo Result específico para operações do heap
pub type HeapResult<T> = Result<T, HeapError>;
