//! Engine configuration.
//!
//! A plain struct the caller constructs directly, with no TOML/YAML
//! parsing dependency pulled in for it. [`EngineConfig::from_env`] is a
//! convenience for the common case of reading `DATABASE_URL` the way
//! `sqlx`-based services typically do, but nothing requires it.

use crate::error::{ConversantError, Result};

/// Global configuration for a running engine instance.
///
/// One `EngineConfig` is shared (via `Arc`) across all `Worker`s in a
/// process; it is immutable once constructed.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Postgres connection string for [`crate::store::postgres::PgStore`].
    /// Unused when the caller supplies an [`crate::store::memory::InMemoryStore`].
    pub database_url: Option<String>,
    /// TTL for thread/history cache entries, in milliseconds.
    pub ttl_short_ms: u64,
    /// TTL for catalog (agents/tools/apis/users) cache entries, in milliseconds.
    pub ttl_long_ms: u64,
    /// Default per-tool execution timeout, in milliseconds, when a tool
    /// does not specify its own.
    pub default_tool_timeout_ms: u64,
    /// Maximum number of LLM round-trips within a single agent turn before
    /// the tool loop is abandoned.
    pub max_tool_iterations: usize,
    /// Maximum number of events a single `Worker::drain` call will process
    /// before yielding, bounding each call's step budget.
    pub max_worker_steps_per_call: usize,
}

impl EngineConfig {
    /// Construct configuration with the given database URL and all other
    /// fields at their documented defaults.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: Some(database_url.into()),
            ..Self::default()
        }
    }

    /// Construct configuration for an [`crate::store::memory::InMemoryStore`]-backed
    /// engine (no database required).
    pub fn in_memory() -> Self {
        Self {
            database_url: None,
            ..Self::default()
        }
    }

    /// Read `DATABASE_URL` from the environment and otherwise use defaults.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            ConversantError::Configuration("DATABASE_URL environment variable not set".into())
        })?;
        Ok(Self::new(database_url))
    }

    /// Override the short-lived cache TTL.
    pub fn with_ttl_short_ms(mut self, ms: u64) -> Self {
        self.ttl_short_ms = ms;
        self
    }

    /// Override the long-lived catalog cache TTL.
    pub fn with_ttl_long_ms(mut self, ms: u64) -> Self {
        self.ttl_long_ms = ms;
        self
    }

    /// Override the default per-tool timeout.
    pub fn with_default_tool_timeout_ms(mut self, ms: u64) -> Self {
        self.default_tool_timeout_ms = ms;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            ttl_short_ms: 5_000,
            ttl_long_ms: 30_000,
            default_tool_timeout_ms: 10_000,
            max_tool_iterations: 5,
            max_worker_steps_per_call: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.ttl_short_ms, 5_000);
        assert_eq!(cfg.ttl_long_ms, 30_000);
        assert_eq!(cfg.max_tool_iterations, 5);
    }

    #[test]
    fn in_memory_has_no_database_url() {
        let cfg = EngineConfig::in_memory();
        assert!(cfg.database_url.is_none());
    }
}
