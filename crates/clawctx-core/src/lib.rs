#![deny(unsafe_code)]

//! clawctx core — repository context for LLM prompts.
//!
//! Keeps an incremental index of a workspace, ranks files against a
//! natural-language query by token overlap, and caches the resulting packs
//! on disk keyed by repository state. Everything here is synchronous and
//! local: the engine reads a file tree and writes two JSON state files.

/// Indexer, retriever, query cache, and the engine that ties them together.
pub mod context;

pub use context::{
    ContextEngine, ContextError, ContextPack, ContextSnippet, EngineOptions, IndexedFile,
    QueryCache, RepositoryIndexer,
};
