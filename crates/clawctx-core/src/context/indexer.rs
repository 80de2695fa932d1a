//! Repository indexer — incremental per-file index and whole-repo hash.
//!
//! Walks the workspace, keeps a persisted snapshot of every candidate file
//! (symbols, preview text, and an `(mtime_ns, size)` fingerprint), and
//! derives a deterministic repository hash from the fingerprints.
//!
//! ## Incrementality
//!
//! A file whose fingerprint matches the previous snapshot is carried over
//! verbatim without reading its content. Only new or changed files are
//! decoded and run through the [`SymbolStrategies`] table. The snapshot is
//! rewritten after every build.
//!
//! ## Filtering
//!
//! A file is a candidate when its extension is in [`SUPPORTED_EXTENSIONS`],
//! no directory between it and the workspace root is in
//! [`IGNORE_DIR_NAMES`], and it is at most [`MAX_FILE_SIZE`] bytes. None of
//! these are errors. A cache directory nested inside the workspace is also
//! skipped so the engine's own state files never affect the hash.

use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::model::IndexedFile;
use super::symbols::SymbolStrategies;
use super::{ContextError, store, truncate_chars};

/// File extensions (lowercase, without the dot) that are indexed.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "py", "md", "txt", "json", "yaml", "yml", "toml", "ini", "js", "ts", "tsx", "jsx", "go", "rs",
    "java", "c", "h", "cpp", "hpp", "sh",
];

/// Directory names whose subtrees are never indexed.
pub const IGNORE_DIR_NAMES: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
];

/// Files larger than this many bytes are skipped.
pub const MAX_FILE_SIZE: u64 = 300_000;

/// Preview length cap, in characters.
pub const MAX_PREVIEW_CHARS: usize = 4000;

/// Snapshot file name inside the cache directory.
pub const INDEX_FILE_NAME: &str = "context_index.json";

/// Persisted index: the repository hash plus every indexed file by path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    #[serde(default)]
    pub repo_hash: String,
    #[serde(default)]
    pub files: BTreeMap<String, IndexedFile>,
}

impl IndexSnapshot {
    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total number of extracted symbols across all files.
    pub fn symbol_count(&self) -> usize {
        self.files.values().map(|f| f.symbols.len()).sum()
    }
}

/// A file that passed filtering, with its fingerprint.
struct Candidate {
    rel: String,
    abs: PathBuf,
    mtime_ns: i64,
    size: u64,
}

/// Builds and persists the incremental file/symbol index for one workspace.
#[derive(Debug)]
pub struct RepositoryIndexer {
    workspace: PathBuf,
    index_path: PathBuf,
    /// Cache directory relative to the workspace, when nested inside it.
    excluded: Option<PathBuf>,
    strategies: SymbolStrategies,
}

impl RepositoryIndexer {
    /// Create an indexer for `workspace`, persisting its snapshot under
    /// `cache_dir` (created if missing).
    pub fn new(workspace: impl Into<PathBuf>, cache_dir: &Path) -> Result<Self, ContextError> {
        let workspace = workspace.into();
        std::fs::create_dir_all(cache_dir)?;

        let excluded = nested_dir(&workspace, cache_dir);
        if let Some(dir) = &excluded {
            debug!(dir = %dir.display(), "Cache directory is inside the workspace, excluding it");
        }

        Ok(Self {
            workspace,
            index_path: cache_dir.join(INDEX_FILE_NAME),
            excluded,
            strategies: SymbolStrategies::default(),
        })
    }

    /// Replace the symbol extraction table.
    pub fn with_strategies(mut self, strategies: SymbolStrategies) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Path of the persisted snapshot.
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// The last persisted snapshot, or an empty one if missing or corrupt.
    pub fn load_snapshot(&self) -> IndexSnapshot {
        store::load_or_default(&self.index_path)
    }

    /// Refresh the index against the current filesystem state and persist it.
    pub fn build_index(&self) -> Result<IndexSnapshot, ContextError> {
        let previous = self.load_snapshot();

        let mut files = BTreeMap::new();
        let mut fingerprints = Vec::new();
        let mut reused = 0usize;
        let mut reindexed = 0usize;

        for candidate in self.candidates() {
            fingerprints.push(format!(
                "{}:{}:{}",
                candidate.rel, candidate.mtime_ns, candidate.size
            ));

            let entry = match previous.files.get(&candidate.rel) {
                Some(prev) if prev.matches(candidate.mtime_ns, candidate.size) => {
                    reused += 1;
                    IndexedFile {
                        path: candidate.rel.clone(),
                        ..prev.clone()
                    }
                }
                _ => {
                    reindexed += 1;
                    self.extract(&candidate)
                }
            };
            files.insert(candidate.rel, entry);
        }

        let snapshot = IndexSnapshot {
            repo_hash: repo_hash(fingerprints),
            files,
        };
        store::write_json(&self.index_path, &snapshot)?;

        info!(
            repo_hash = %short_hash(&snapshot.repo_hash),
            files = snapshot.len(),
            reused,
            reindexed,
            "Index built"
        );
        Ok(snapshot)
    }

    /// Decode a new or changed file and extract its symbols and preview.
    fn extract(&self, candidate: &Candidate) -> IndexedFile {
        debug!(path = %candidate.rel, "Extracting file");
        let text = read_text(&candidate.abs);
        let ext = extension(&candidate.abs).unwrap_or_default();

        IndexedFile {
            path: candidate.rel.clone(),
            mtime_ns: candidate.mtime_ns,
            size: candidate.size,
            symbols: self.strategies.extract(&ext, &text),
            preview: truncate_chars(&text, MAX_PREVIEW_CHARS).to_string(),
        }
    }

    /// Every file that passes the filters, with its fingerprint.
    fn candidates(&self) -> Vec<Candidate> {
        let walker = WalkDir::new(&self.workspace)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.descend(entry));

        let mut out = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }

            let abs = entry.path();
            let Some(ext) = extension(abs) else { continue };
            if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }

            // Follows symlinks, so a linked file is indexed like a regular one.
            let meta = match std::fs::metadata(abs) {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    debug!(path = %abs.display(), error = %e, "Stat failed, skipping");
                    continue;
                }
            };
            if meta.len() > MAX_FILE_SIZE {
                debug!(path = %abs.display(), size = meta.len(), "Too large to preview, skipping");
                continue;
            }
            let Some(mtime_ns) = mtime_ns(&meta) else {
                debug!(path = %abs.display(), "No modification time, skipping");
                continue;
            };
            let Some(rel) = relative_key(&self.workspace, abs) else {
                debug!(path = %abs.display(), "Path is not valid UTF-8, skipping");
                continue;
            };

            out.push(Candidate {
                rel,
                abs: abs.to_path_buf(),
                mtime_ns,
                size: meta.len(),
            });
        }
        out
    }

    /// Whether the walk should enter (or yield) this entry.
    fn descend(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if IGNORE_DIR_NAMES.contains(&name.as_ref()) {
            return false;
        }
        match (&self.excluded, entry.path().strip_prefix(&self.workspace)) {
            (Some(excluded), Ok(rel)) => rel != excluded,
            _ => true,
        }
    }
}

/// SHA-256 over the sorted, newline-joined `path:mtime_ns:size` triples.
pub fn repo_hash(mut fingerprints: Vec<String>) -> String {
    fingerprints.sort();
    let digest = Sha256::digest(fingerprints.join("\n").as_bytes());
    hex::encode(digest)
}

/// The first 12 characters of a repository hash, for logs and headers.
pub fn short_hash(hash: &str) -> &str {
    truncate_chars(hash, 12)
}

/// `dir` relative to `workspace`, when it is a proper subdirectory.
fn nested_dir(workspace: &Path, dir: &Path) -> Option<PathBuf> {
    let workspace = std::fs::canonicalize(workspace).ok()?;
    let dir = std::fs::canonicalize(dir).ok()?;
    let rel = dir.strip_prefix(&workspace).ok()?;
    if rel.as_os_str().is_empty() {
        warn!("Cache directory is the workspace root; state files will be indexed");
        return None;
    }
    Some(rel.to_path_buf())
}

/// Workspace-relative, `/`-separated key for `path`. `None` when any
/// component is not valid UTF-8, so distinct files never share a key.
fn relative_key(workspace: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(workspace).ok()?;
    let parts = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_str()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn mtime_ns(meta: &Metadata) -> Option<i64> {
    let modified = meta.modified().ok()?;
    match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).ok(),
        Err(before) => i64::try_from(before.duration().as_nanos()).ok().map(|n| -n),
    }
}

/// Lossy UTF-8 decode with `\r\n` and `\r` folded to `\n`. Unreadable files
/// decode as empty text.
fn read_text(path: &Path) -> String {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Read failed, indexing as empty");
            return String::new();
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::symbols::SymbolStrategy;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// A workspace and a separate cache directory.
    fn setup() -> (TempDir, TempDir, RepositoryIndexer) {
        let ws = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let indexer = RepositoryIndexer::new(ws.path(), cache.path()).unwrap();
        (ws, cache, indexer)
    }

    #[test]
    fn test_indexes_supported_files_only() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "auth/login.py", "def authenticate(user):\n    return True\n");
        write(ws.path(), "README.md", "# Project\n");
        write(ws.path(), "logo.png", [0u8, 1, 2]);
        write(ws.path(), "Makefile", "all:\n");

        let snapshot = indexer.build_index().unwrap();
        let paths: Vec<_> = snapshot.files.keys().cloned().collect();
        assert_eq!(paths, vec!["README.md", "auth/login.py"]);
        assert_eq!(snapshot.files["auth/login.py"].symbols, vec!["authenticate"]);
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "NOTES.MD", "notes\n");
        let snapshot = indexer.build_index().unwrap();
        assert!(snapshot.files.contains_key("NOTES.MD"));
    }

    #[test]
    fn test_ignored_directories_are_skipped() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), ".git/config.toml", "x = 1\n");
        write(ws.path(), "node_modules/pkg/index.js", "function f() {}\n");
        write(ws.path(), "src/build/gen.py", "def gen():\n");
        write(ws.path(), "builder/keep.py", "def keep():\n");

        let snapshot = indexer.build_index().unwrap();
        let paths: Vec<_> = snapshot.files.keys().cloned().collect();
        assert_eq!(paths, vec!["builder/keep.py"]);
    }

    #[test]
    fn test_workspace_named_like_ignored_dir_is_indexed() {
        let parent = TempDir::new().unwrap();
        let ws = parent.path().join("build");
        write(&ws, "main.py", "def main():\n");
        let cache = TempDir::new().unwrap();

        let indexer = RepositoryIndexer::new(&ws, cache.path()).unwrap();
        let snapshot = indexer.build_index().unwrap();
        assert!(snapshot.files.contains_key("main.py"));
    }

    #[test]
    fn test_size_ceiling() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "at_limit.txt", "a".repeat(MAX_FILE_SIZE as usize));
        write(ws.path(), "over_limit.txt", "a".repeat(MAX_FILE_SIZE as usize + 1));

        let snapshot = indexer.build_index().unwrap();
        assert!(snapshot.files.contains_key("at_limit.txt"));
        assert!(!snapshot.files.contains_key("over_limit.txt"));
    }

    #[test]
    fn test_preview_is_capped_by_characters() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "long.md", "é".repeat(MAX_PREVIEW_CHARS + 100));

        let snapshot = indexer.build_index().unwrap();
        let preview = &snapshot.files["long.md"].preview;
        assert_eq!(preview.chars().count(), MAX_PREVIEW_CHARS);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "bin.txt", [b'o', b'k', 0xff, 0xfe, b'\n']);

        let snapshot = indexer.build_index().unwrap();
        let preview = &snapshot.files["bin.txt"].preview;
        assert!(preview.starts_with("ok"));
        assert!(preview.contains('\u{FFFD}'));
    }

    #[test]
    fn test_crlf_is_normalized() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "win.py", "def a():\r\n    pass\r\ndef b():\r\n");

        let snapshot = indexer.build_index().unwrap();
        let file = &snapshot.files["win.py"];
        assert!(!file.preview.contains('\r'));
        assert_eq!(file.symbols, vec!["a", "b"]);
    }

    #[test]
    fn test_build_is_idempotent() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "a.py", "def a():\n");
        write(ws.path(), "docs/b.md", "b\n");

        let first = indexer.build_index().unwrap();
        let second = indexer.build_index().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unchanged_files_are_reused_verbatim() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "a.py", "def original():\n");
        indexer.build_index().unwrap();

        // Tamper with the persisted entry; an unchanged fingerprint must
        // carry it over without re-reading the file.
        let mut snapshot = indexer.load_snapshot();
        let entry = snapshot.files.get_mut("a.py").unwrap();
        entry.preview = "persisted preview".to_string();
        entry.symbols = vec!["persisted".to_string()];
        store::write_json(indexer.index_path(), &snapshot).unwrap();

        let rebuilt = indexer.build_index().unwrap();
        assert_eq!(rebuilt.files["a.py"].preview, "persisted preview");
        assert_eq!(rebuilt.files["a.py"].symbols, vec!["persisted"]);
    }

    #[test]
    fn test_changed_file_is_reextracted_and_hash_changes() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "a.py", "def first():\n");
        write(ws.path(), "b.md", "unrelated\n");
        let before = indexer.build_index().unwrap();

        write(ws.path(), "a.py", "def first():\n\ndef second():\n");
        let after = indexer.build_index().unwrap();

        assert_ne!(before.repo_hash, after.repo_hash);
        assert_eq!(after.files["a.py"].symbols, vec!["first", "second"]);
        assert_eq!(after.files["b.md"], before.files["b.md"]);
    }

    #[test]
    fn test_removed_file_changes_hash() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "a.py", "def a():\n");
        write(ws.path(), "b.py", "def b():\n");
        let before = indexer.build_index().unwrap();

        std::fs::remove_file(ws.path().join("b.py")).unwrap();
        let after = indexer.build_index().unwrap();

        assert_ne!(before.repo_hash, after.repo_hash);
        assert!(!after.files.contains_key("b.py"));
    }

    #[test]
    fn test_repo_hash_is_sha256_of_sorted_triples() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "z.md", "z\n");
        write(ws.path(), "a/b.md", "ab\n");

        let snapshot = indexer.build_index().unwrap();
        let mut triples: Vec<_> = snapshot
            .files
            .values()
            .map(|f| format!("{}:{}:{}", f.path, f.mtime_ns, f.size))
            .collect();
        triples.reverse();
        assert_eq!(snapshot.repo_hash, repo_hash(triples.clone()));

        triples.sort();
        let expected = hex::encode(Sha256::digest(triples.join("\n").as_bytes()));
        assert_eq!(snapshot.repo_hash, expected);
    }

    #[test]
    fn test_empty_workspace_hash() {
        let (_ws, _cache, indexer) = setup();
        let snapshot = indexer.build_index().unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.repo_hash, hex::encode(Sha256::digest(b"")));
    }

    #[test]
    fn test_snapshot_is_persisted() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "a.py", "def a():\n");

        let snapshot = indexer.build_index().unwrap();
        assert!(indexer.index_path().exists());
        assert_eq!(indexer.load_snapshot(), snapshot);

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(indexer.index_path()).unwrap()).unwrap();
        assert_eq!(raw["repo_hash"], snapshot.repo_hash.as_str());
        assert_eq!(raw["files"]["a.py"]["symbols"][0], "a");
    }

    #[test_log::test]
    fn test_corrupt_snapshot_rebuilds() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "a.py", "def a():\n");
        std::fs::write(indexer.index_path(), b"{{{ definitely not json").unwrap();

        let snapshot = indexer.build_index().unwrap();
        assert_eq!(snapshot.files["a.py"].symbols, vec!["a"]);
    }

    #[test]
    fn test_nested_cache_dir_is_excluded() {
        let ws = TempDir::new().unwrap();
        write(ws.path(), "a.py", "def a():\n");
        let cache_dir = ws.path().join(".clawctx");
        let indexer = RepositoryIndexer::new(ws.path(), &cache_dir).unwrap();

        let first = indexer.build_index().unwrap();
        let second = indexer.build_index().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first.repo_hash, second.repo_hash);
    }

    #[test]
    fn test_symbol_count() {
        let (ws, _cache, indexer) = setup();
        write(ws.path(), "a.py", "def a():\nclass B:\n");
        write(ws.path(), "c.ts", "function c() {}\n");

        let snapshot = indexer.build_index().unwrap();
        assert_eq!(snapshot.symbol_count(), 3);
    }

    #[test]
    fn test_custom_strategy_table() {
        let (ws, cache, _) = setup();
        write(ws.path(), "src/lib.rs", "pub fn parse_config() {}
fn helper() {}
struct Ignored;
");
        write(ws.path(), "a.py", "def a():\n");

        let rust = regex::Regex::new(r"(?m)^\s*(?:pub\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap();
        let strategies = SymbolStrategies::default().with_strategy(SymbolStrategy::new(&["rs"], rust));
        let indexer = RepositoryIndexer::new(ws.path(), cache.path())
            .unwrap()
            .with_strategies(strategies);

        let snapshot = indexer.build_index().unwrap();
        assert_eq!(snapshot.files["src/lib.rs"].symbols, vec!["parse_config", "helper"]);
        assert_eq!(snapshot.files["a.py"].symbols, vec!["a"]);
    }

    #[cfg(target_os = "linux")]
    #[test_log::test]
    fn test_non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (ws, _cache, indexer) = setup();
        std::fs::write(ws.path().join(OsStr::from_bytes(b"\xffa.py")), "def a():\n").unwrap();
        std::fs::write(ws.path().join(OsStr::from_bytes(b"\xfea.py")), "def a():\n").unwrap();
        write(ws.path(), "ok.py", "def ok():\n");

        let first = indexer.build_index().unwrap();
        let paths: Vec<_> = first.files.keys().cloned().collect();
        assert_eq!(paths, vec!["ok.py"]);
        assert_eq!(first.repo_hash, repo_hash(vec![format!(
            "ok.py:{}:{}",
            first.files["ok.py"].mtime_ns, first.files["ok.py"].size
        )]));

        // Rebuilding reuses every entry without miscounting.
        let second = indexer.build_index().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_hash("abc"), "abc");
    }
}
