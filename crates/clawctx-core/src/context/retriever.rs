//! Query-time retrieval — token-overlap scoring, ranking, and excerpt packing.
//!
//! Every file is scored by how many distinct query tokens appear in three
//! signal sources, each with a fixed weight:
//!
//! | Signal    | Source                              | Weight |
//! |-----------|-------------------------------------|--------|
//! | `path`    | tokens of the relative path         | 4.0    |
//! | `symbols` | tokens of the extracted symbol names | 3.0    |
//! | `content` | tokens of the first 1200 preview chars | 1.5  |
//!
//! Files scoring zero are dropped. The rest are ranked by descending score
//! (ties by path), and each gets an excerpt centred on its best-matching
//! preview line. Excerpts are packed greedily under the character budget;
//! one that would overflow is skipped, not truncated.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::model::{ContextPack, ContextSnippet, IndexedFile};
use super::{ContextError, truncate_chars};

pub const PATH_WEIGHT: f64 = 4.0;
pub const SYMBOL_WEIGHT: f64 = 3.0;
pub const CONTENT_WEIGHT: f64 = 1.5;

/// How much of the preview feeds the `content` signal.
pub const SCORED_PREVIEW_CHARS: usize = 1200;

/// Upper bound on a single excerpt, before the pack budget applies.
pub const MAX_EXCERPT_CHARS: usize = 1200;

/// Lines kept above the best-matching line.
pub const LINES_BEFORE: usize = 6;

/// Exclusive end of the window, counted from the best-matching line. The
/// excerpt holds the matching line plus `LINES_AFTER - 1` lines below it.
pub const LINES_AFTER: usize = 14;

/// Tokens shorter than this are ignored.
const MIN_TOKEN_CHARS: usize = 3;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z_][a-zA-Z0-9_\-]+").expect("token pattern is valid")
});

/// Lower-case identifier-like tokens of at least three characters,
/// de-duplicated in first-seen order.
pub fn tokenize(value: &str) -> Vec<String> {
    let lowered = value.to_lowercase();
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for m in TOKEN_RE.find_iter(&lowered) {
        let token = m.as_str();
        if token.chars().count() < MIN_TOKEN_CHARS || !seen.insert(token) {
            continue;
        }
        tokens.push(token.to_string());
    }
    tokens
}

/// Stable identity of a query: SHA-256 of its space-joined tokens.
///
/// Queries that differ only in case, punctuation, short words, or repeated
/// words share a fingerprint.
pub fn query_fingerprint(query: &str) -> String {
    let normalized = tokenize(query).join(" ");
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Score, rank, and pack the files most relevant to `query`.
///
/// A query with no usable tokens yields an empty pack without scoring.
/// The total excerpt length of the result never exceeds `char_budget`.
pub fn retrieve(
    repo_hash: &str,
    query: &str,
    files: &BTreeMap<String, IndexedFile>,
    max_files: usize,
    char_budget: usize,
) -> Result<ContextPack, ContextError> {
    validate_params(max_files, char_budget)?;

    let mut pack = ContextPack::empty(repo_hash, query_fingerprint(query));
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        debug!("Query has no usable tokens, returning empty pack");
        return Ok(pack);
    }

    let mut ranked: Vec<(&IndexedFile, Score)> = files
        .values()
        .map(|file| (file, score_file(&query_tokens, file)))
        .filter(|(_, score)| score.total > 0.0)
        .collect();
    ranked.sort_by(|(a, sa), (b, sb)| sb.total.total_cmp(&sa.total).then_with(|| a.path.cmp(&b.path)));

    let excerpt_cap = MAX_EXCERPT_CHARS.min(char_budget);
    let mut used = 0usize;
    for (file, score) in ranked.into_iter().take(max_files) {
        let excerpt = excerpt_for(&file.preview, &query_tokens, excerpt_cap);
        if excerpt.is_empty() {
            continue;
        }
        let len = excerpt.chars().count();
        if used + len > char_budget {
            debug!(path = %file.path, len, used, char_budget, "Excerpt over budget, skipping");
            continue;
        }
        used += len;
        pack.snippets.push(ContextSnippet {
            path: file.path.clone(),
            excerpt,
            score: score.total,
            reason: score.reason,
        });
    }

    debug!(
        snippets = pack.snippets.len(),
        chars = used,
        "Retrieved context"
    );
    Ok(pack)
}

/// Reject retrieval parameters that cannot produce a meaningful pack.
pub fn validate_params(max_files: usize, char_budget: usize) -> Result<(), ContextError> {
    if max_files == 0 {
        return Err(ContextError::InvalidParams(
            "max_files must be at least 1".to_string(),
        ));
    }
    if char_budget == 0 {
        return Err(ContextError::InvalidParams(
            "char_budget must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
struct Score {
    total: f64,
    reason: String,
}

fn score_file(query_tokens: &[String], file: &IndexedFile) -> Score {
    let signals = [
        ("path", PATH_WEIGHT, overlap(query_tokens, &file.path)),
        ("symbols", SYMBOL_WEIGHT, overlap(query_tokens, &file.symbols.join(" "))),
        (
            "content",
            CONTENT_WEIGHT,
            overlap(query_tokens, truncate_chars(&file.preview, SCORED_PREVIEW_CHARS)),
        ),
    ];

    let mut total = 0.0;
    let mut reasons = Vec::new();
    for (name, weight, count) in signals {
        if count > 0 {
            total += count as f64 * weight;
            reasons.push(format!("{name}:{count}"));
        }
    }
    Score {
        total,
        reason: reasons.join(","),
    }
}

/// Number of query tokens that also occur in `text`.
fn overlap(query_tokens: &[String], text: &str) -> usize {
    let tokens: HashSet<String> = tokenize(text).into_iter().collect();
    query_tokens.iter().filter(|t| tokens.contains(*t)).count()
}

/// A window of lines around the preview line with the most query tokens
/// (first such line on ties), truncated to `max_chars` characters.
fn excerpt_for(preview: &str, query_tokens: &[String], max_chars: usize) -> String {
    let lines: Vec<&str> = preview.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let mut best_line = 0;
    let mut best_score = None;
    for (i, line) in lines.iter().enumerate() {
        let score = overlap(query_tokens, line);
        if best_score.is_none_or(|best| score > best) {
            best_score = Some(score);
            best_line = i;
        }
    }

    let start = best_line.saturating_sub(LINES_BEFORE);
    let end = lines.len().min(best_line + LINES_AFTER);
    let excerpt = lines[start..end].join("\n");
    truncate_chars(&excerpt, max_chars).to_string()
}
