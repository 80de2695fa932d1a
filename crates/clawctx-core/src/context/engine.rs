//! Context engine — index refresh, cached retrieval, and prompt rendering.

use std::path::{Path, PathBuf};

use clawctx_config::ContextConfig;
use tracing::{debug, info};

use super::ContextError;
use super::cache::{DEFAULT_CAPACITY, QUERY_CACHE_FILE_NAME, QueryCache};
use super::indexer::{IndexSnapshot, RepositoryIndexer, short_hash};
use super::model::ContextPack;
use super::retriever::{self, query_fingerprint};
use super::symbols::SymbolStrategies;

/// Header line of a rendered context block.
pub const RENDER_HEADER: &str = "Repository Context (auto-selected):";

/// Default retrieval parameters and cache sizing for an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub max_files: usize,
    pub char_budget: usize,
    pub cache_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_files: 5,
            char_budget: 3500,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&ContextConfig> for EngineOptions {
    fn from(config: &ContextConfig) -> Self {
        Self {
            max_files: config.max_files,
            char_budget: config.char_budget,
            cache_capacity: config.cache_capacity,
        }
    }
}

/// Incremental repository index plus cached query retrieval.
///
/// Owns both persisted stores for one workspace. Every lookup refreshes the
/// index first, so a cached pack is only ever returned for the repository
/// state it was retrieved from.
#[derive(Debug)]
pub struct ContextEngine {
    indexer: RepositoryIndexer,
    cache: QueryCache,
    options: EngineOptions,
}

impl ContextEngine {
    /// Open an engine with default options.
    pub fn open(workspace: impl Into<PathBuf>, cache_dir: &Path) -> Result<Self, ContextError> {
        Self::with_options(workspace, cache_dir, EngineOptions::default())
    }

    /// Open an engine from the `[context]` config section.
    pub fn from_config(config: &ContextConfig) -> Result<Self, ContextError> {
        Self::with_options(
            config.workspace.clone(),
            &config.resolved_cache_dir(),
            EngineOptions::from(config),
        )
    }

    pub fn with_options(
        workspace: impl Into<PathBuf>,
        cache_dir: &Path,
        options: EngineOptions,
    ) -> Result<Self, ContextError> {
        retriever::validate_params(options.max_files, options.char_budget)?;
        let indexer = RepositoryIndexer::new(workspace, cache_dir)?;
        let cache = QueryCache::open(cache_dir.join(QUERY_CACHE_FILE_NAME), options.cache_capacity)?;

        info!(
            workspace = %indexer.workspace().display(),
            cache_dir = %cache_dir.display(),
            "Context engine opened"
        );
        Ok(Self {
            indexer,
            cache,
            options,
        })
    }

    /// Replace the indexer's symbol extraction table.
    ///
    /// Entries already in the snapshot keep their symbols until their file
    /// changes.
    pub fn with_strategies(mut self, strategies: SymbolStrategies) -> Self {
        self.indexer = self.indexer.with_strategies(strategies);
        self
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn indexer(&self) -> &RepositoryIndexer {
        &self.indexer
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Refresh the index and return the snapshot.
    pub fn index(&self) -> Result<IndexSnapshot, ContextError> {
        self.indexer.build_index()
    }

    /// The pack for `query`, from cache when the repository and parameters
    /// are unchanged, otherwise freshly retrieved and stored.
    pub fn get_pack(
        &mut self,
        query: &str,
        max_files: usize,
        char_budget: usize,
    ) -> Result<ContextPack, ContextError> {
        retriever::validate_params(max_files, char_budget)?;

        let snapshot = self.indexer.build_index()?;
        let fingerprint = query_fingerprint(query);
        let key = cache_key(&snapshot.repo_hash, &fingerprint, max_files, char_budget);

        if let Some(mut pack) = self.cache.get(&key)? {
            pack.cache_hit = true;
            debug!(snippets = pack.snippets.len(), "Serving cached context pack");
            return Ok(pack);
        }

        let pack = retriever::retrieve(
            &snapshot.repo_hash,
            query,
            &snapshot.files,
            max_files,
            char_budget,
        )?;
        self.cache.put(&key, &pack)?;
        Ok(pack)
    }

    /// [`get_pack`](Self::get_pack) with the engine's default parameters.
    pub fn get_default_pack(&mut self, query: &str) -> Result<ContextPack, ContextError> {
        let EngineOptions {
            max_files,
            char_budget,
            ..
        } = self.options;
        self.get_pack(query, max_files, char_budget)
    }

    /// Fetch the pack for `query` and render it as a prompt block.
    /// Returns an empty string when nothing relevant was found.
    pub fn render_for_prompt(
        &mut self,
        query: &str,
        max_files: usize,
        char_budget: usize,
    ) -> Result<String, ContextError> {
        let pack = self.get_pack(query, max_files, char_budget)?;
        Ok(render_pack(&pack))
    }

    /// [`render_for_prompt`](Self::render_for_prompt) with the engine's
    /// default parameters.
    pub fn render_default(&mut self, query: &str) -> Result<String, ContextError> {
        let pack = self.get_default_pack(query)?;
        Ok(render_pack(&pack))
    }

    /// Flush the query cache and release both stores.
    pub fn close(self) -> Result<(), ContextError> {
        self.cache.close()
    }
}

/// Cache key: any change to repository state, query identity, or parameters
/// produces a different key.
pub fn cache_key(repo_hash: &str, fingerprint: &str, max_files: usize, char_budget: usize) -> String {
    format!("{repo_hash}:{fingerprint}:{max_files}:{char_budget}")
}

/// Render a pack as a prompt-ready block, or `""` when it has no snippets.
pub fn render_pack(pack: &ContextPack) -> String {
    if pack.is_empty() {
        return String::new();
    }

    let mut lines = vec![
        RENDER_HEADER.to_string(),
        format!(
            "repo_hash={} cache_hit={}",
            short_hash(&pack.repo_hash),
            pack.cache_hit
        ),
    ];
    for snippet in &pack.snippets {
        lines.push(format!(
            "\n[file] {}  score={:.2}  reason={}",
            snippet.path, snippet.score, snippet.reason
        ));
        lines.push(snippet.excerpt.clone());
    }
    lines.join("\n")
}
