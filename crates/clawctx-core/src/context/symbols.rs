//! Declaration-name extraction keyed by file extension.
//!
//! This is a heuristic, not a parser. Each strategy pairs a set of file
//! extensions with a multi-line regex whose first capture group is the
//! declared name. Files whose extension no strategy claims use the fallback
//! pattern.
//!
//! The default table has two entries:
//!
//! | Extensions | Declarations |
//! |------------|--------------|
//! | `py`       | `def`, `class` |
//! | everything else | `function`, `class`, `interface`, `type`, `const`, `let`, `var` |

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Maximum number of distinct names kept per file.
pub const MAX_SYMBOLS: usize = 80;

static PYTHON_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:def|class)\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("python declaration pattern is valid")
});

static GENERIC_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:function|class|interface|type|const|let|var)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("generic declaration pattern is valid")
});

/// One row of the strategy table.
#[derive(Debug, Clone)]
pub struct SymbolStrategy {
    extensions: Vec<String>,
    pattern: Regex,
}

impl SymbolStrategy {
    /// Build a strategy for the given extensions (without the leading dot).
    pub fn new(extensions: &[&str], pattern: Regex) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            pattern,
        }
    }

    fn claims(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// Extension-indexed table of symbol extraction strategies.
#[derive(Debug, Clone)]
pub struct SymbolStrategies {
    strategies: Vec<SymbolStrategy>,
    fallback: Regex,
}

impl SymbolStrategies {
    /// An empty table that applies `fallback` to every file.
    pub fn with_fallback(fallback: Regex) -> Self {
        Self {
            strategies: Vec::new(),
            fallback,
        }
    }

    /// Add a strategy. Earlier strategies win when extensions overlap.
    pub fn with_strategy(mut self, strategy: SymbolStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// The pattern used for files with extension `ext`.
    pub fn pattern_for(&self, ext: &str) -> &Regex {
        self.strategies
            .iter()
            .find(|s| s.claims(ext))
            .map(|s| &s.pattern)
            .unwrap_or(&self.fallback)
    }

    /// Extract up to [`MAX_SYMBOLS`] distinct names in first-seen order.
    pub fn extract(&self, ext: &str, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for caps in self.pattern_for(ext).captures_iter(text) {
            let Some(name) = caps.get(1) else { continue };
            let name = name.as_str();
            if !seen.insert(name) {
                continue;
            }
            names.push(name.to_string());
            if names.len() >= MAX_SYMBOLS {
                break;
            }
        }
        names
    }
}

impl Default for SymbolStrategies {
    fn default() -> Self {
        Self::with_fallback(GENERIC_DECL.clone())
            .with_strategy(SymbolStrategy::new(&["py"], PYTHON_DECL.clone()))
    }
}
