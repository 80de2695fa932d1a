//! Temporary repositories for engine tests.

use std::path::{Path, PathBuf};

use clawctx_config::ContextConfig;
use clawctx_core::{ContextEngine, EngineOptions};
use tempfile::TempDir;

use crate::config::TestConfigBuilder;

/// A throwaway workspace with a separate cache directory.
///
/// Both directories are deleted when this value is dropped, even on panic.
pub struct TestWorkspace {
    root: TempDir,
    cache: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("failed to create workspace dir"),
            cache: TempDir::new().expect("failed to create cache dir"),
        }
    }

    /// A workspace holding a small auth module: `auth/login.py` declares
    /// `authenticate`, `auth/README.md` mentions it in prose, and
    /// `utils/strings.py` is unrelated.
    pub fn with_auth_fixture() -> Self {
        let ws = Self::new();
        ws.write(
            "auth/login.py",
            "import hashlib\n\n\
             def authenticate(username, password):\n    \
             digest = hashlib.sha256(password.encode()).hexdigest()\n    \
             return lookup(username) == digest\n",
        );
        ws.write(
            "auth/README.md",
            "# Auth\n\nUse the login module to authenticate user sessions.\n",
        );
        ws.write(
            "utils/strings.py",
            "def pad_left(value, width):\n    return value.rjust(width)\n",
        );
        ws
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn cache_dir(&self) -> &Path {
        self.cache.path()
    }

    /// Write `content` to the workspace-relative path, creating parents.
    pub fn write(&self, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&path, content).expect("failed to write workspace file");
        path
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.root().join(rel)).expect("failed to remove workspace file");
    }

    /// An engine over this workspace with default options.
    pub fn engine(&self) -> ContextEngine {
        ContextEngine::open(self.root(), self.cache_dir()).expect("failed to open engine")
    }

    pub fn engine_with(&self, options: EngineOptions) -> ContextEngine {
        ContextEngine::with_options(self.root(), self.cache_dir(), options)
            .expect("failed to open engine")
    }

    /// A `[context]` section pointing at this workspace and cache directory.
    pub fn config(&self) -> ContextConfig {
        TestConfigBuilder::new()
            .workspace(self.root())
            .cache_dir(self.cache_dir())
            .build()
            .context
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
