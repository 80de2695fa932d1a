//! Context engine — incremental repository indexing, token-overlap retrieval,
//! and a persisted query cache.
//!
//! The engine assembles a bounded slice of a repository for an LLM prompt
//! without re-scanning or re-ranking the whole tree on every query:
//!
//! 1. **Repository Indexer**: walks the workspace and keeps a persisted
//!    per-file snapshot (symbols, preview, `(mtime_ns, size)` fingerprint).
//!    Unchanged files are reused without reading them. Produces a
//!    deterministic whole-repository hash.
//!
//! 2. **Retriever**: tokenizes the query, scores files on path, symbol, and
//!    content overlap, and packs excerpts under a character budget.
//!
//! 3. **Query Cache**: persisted `key → pack` store with LRU eviction. Keys
//!    embed the repository hash, so any file change is a cold miss.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                 ContextEngine                  │
//! │                                                │
//! │  ┌────────────┐  ┌───────────┐  ┌────────────┐ │
//! │  │ Repository │  │ Retriever │  │ QueryCache │ │
//! │  │ Indexer    │  │           │  │            │ │
//! │  │ ·walk      │─▶│ ·tokenize │  │ ·get (LRU) │ │
//! │  │ ·symbols   │  │ ·score    │─▶│ ·put       │ │
//! │  │ ·repo_hash │  │ ·excerpt  │  │ ·evict     │ │
//! │  └─────┬──────┘  └───────────┘  └─────┬──────┘ │
//! └────────┼──────────────────────────────┼────────┘
//!          ▼                              ▼
//!   context_index.json             query_cache.json
//! ```
//!
//! Both stores are plain JSON files rewritten whole on every change, with no
//! cross-process locking.

pub mod cache;
pub mod engine;
pub mod indexer;
pub mod model;
pub mod retriever;
pub mod store;
pub mod symbols;

pub use cache::{CacheEntry, QueryCache};
pub use engine::{ContextEngine, EngineOptions, cache_key, render_pack};
pub use indexer::{IndexSnapshot, RepositoryIndexer};
pub use model::{ContextPack, ContextSnippet, IndexedFile};
pub use retriever::{query_fingerprint, retrieve, tokenize};
pub use symbols::{SymbolStrategies, SymbolStrategy};

/// Errors from the context engine.
///
/// Per-file read failures, missing or corrupt state files, and empty queries
/// are not errors; they are recovered where they occur.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}

/// The longest prefix of `text` holding at most `max` characters.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
