#![deny(unsafe_code)]

//! Shared test utilities for the clawctx workspace.
//!
//! Provides temporary workspaces, config builders, and tracing helpers so
//! that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! clawctx-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod tracing_setup;
pub mod workspace;

pub use workspace::TestWorkspace;
