//! Testes do heap (in-tree, junto do subsistema que exercitam)

mod common;
mod heap_test;
