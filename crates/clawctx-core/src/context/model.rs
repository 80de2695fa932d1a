//! Entities shared by the indexer, retriever, cache, and engine.

use serde::{Deserialize, Serialize};

/// One workspace file's indexed state.
///
/// Replaced wholesale whenever the file's `(mtime_ns, size)` fingerprint
/// changes; never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFile {
    /// Workspace-relative path with `/` separators.
    pub path: String,
    /// Modification time in nanoseconds relative to the Unix epoch.
    pub mtime_ns: i64,
    /// File size in bytes.
    pub size: u64,
    /// Up to 80 distinct declaration names, in first-seen order.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// The first characters of the decoded file text.
    #[serde(default)]
    pub preview: String,
}

impl IndexedFile {
    /// Whether this entry was produced from a file with the given fingerprint.
    pub fn matches(&self, mtime_ns: i64, size: u64) -> bool {
        self.mtime_ns == mtime_ns && self.size == size
    }
}

/// One retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub path: String,
    pub excerpt: String,
    pub score: f64,
    /// Contributing signals, e.g. `symbols:1,content:1`.
    pub reason: String,
}

/// The response to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPack {
    /// Repository fingerprint at retrieval time.
    pub repo_hash: String,
    /// Identity of the normalized query.
    pub query_fingerprint: String,
    /// Descending by score.
    #[serde(default)]
    pub snippets: Vec<ContextSnippet>,
    /// Set by the engine after cache lookup; a fresh retrieval is always `false`.
    #[serde(default)]
    pub cache_hit: bool,
}

impl ContextPack {
    /// An empty pack for a query that matched nothing.
    pub fn empty(repo_hash: impl Into<String>, query_fingerprint: impl Into<String>) -> Self {
        Self {
            repo_hash: repo_hash.into(),
            query_fingerprint: query_fingerprint.into(),
            snippets: Vec::new(),
            cache_hit: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Total excerpt length in characters.
    pub fn excerpt_chars(&self) -> usize {
        self.snippets
            .iter()
            .map(|s| s.excerpt.chars().count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_indexed_file_matches_fingerprint() {
        let file = IndexedFile {
            path: "src/lib.rs".to_string(),
            mtime_ns: 1_700_000_000_000_000_000,
            size: 42,
            symbols: vec![],
            preview: String::new(),
        };
        assert!(file.matches(1_700_000_000_000_000_000, 42));
        assert!(!file.matches(1_700_000_000_000_000_000, 43));
        assert!(!file.matches(1_700_000_000_000_000_001, 42));
    }

    #[test]
    fn test_pack_json_shape() {
        let pack = ContextPack {
            repo_hash: "abc".to_string(),
            query_fingerprint: "def".to_string(),
            snippets: vec![ContextSnippet {
                path: "a.py".to_string(),
                excerpt: "def run():".to_string(),
                score: 4.5,
                reason: "symbols:1,content:1".to_string(),
            }],
            cache_hit: false,
        };
        let value = serde_json::to_value(&pack).unwrap();
        assert_eq!(value["repo_hash"], "abc");
        assert_eq!(value["snippets"][0]["score"], 4.5);
        assert_eq!(value["cache_hit"], false);
    }

    #[test]
    fn test_pack_tolerates_missing_optional_fields() {
        let pack: ContextPack =
            serde_json::from_str(r#"{"repo_hash":"h","query_fingerprint":"q"}"#).unwrap();
        assert!(pack.is_empty());
        assert!(!pack.cache_hit);
    }

    #[test]
    fn test_excerpt_chars_counts_characters() {
        let mut pack = ContextPack::empty("h", "q");
        pack.snippets.push(ContextSnippet {
            path: "a.md".to_string(),
            excerpt: "héllo".to_string(),
            score: 1.5,
            reason: "content:1".to_string(),
        });
        assert_eq!(pack.excerpt_chars(), 5);
    }
}
