//! Configuration builders for tests.

use std::path::Path;

use clawctx_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .workspace(ws.root())
///     .cache_dir(ws.cache_dir())
///     .char_budget(800)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn workspace(mut self, path: &Path) -> Self {
        self.config.context.workspace = path.to_path_buf();
        self
    }

    pub fn cache_dir(mut self, path: &Path) -> Self {
        self.config.context.cache_dir = path.to_path_buf();
        self
    }

    pub fn max_files(mut self, n: usize) -> Self {
        self.config.context.max_files = n;
        self
    }

    pub fn char_budget(mut self, n: usize) -> Self {
        self.config.context.char_budget = n;
        self
    }

    pub fn cache_capacity(mut self, n: usize) -> Self {
        self.config.context.cache_capacity = n;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
