//! Client configuration.
//!
//! Defaults suit an in-process admission controller: five second query
//! budget, best-effort compilation, cascading template removal. Override via
//! environment variables or explicit construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_cache::OrphanPolicy;
use warden_compiler::CompilePolicy;
use warden_core::WardenError;
use warden_driver::DEFAULT_MAX_EVALUATIONS;

/// Default per-target query budget.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Evaluation budget per target and review, unless a review overrides it.
    #[serde(rename = "queryTimeoutMs", with = "millis")]
    pub query_timeout: Duration,
    /// How per-target compile failures affect a template.
    pub compile_policy: CompilePolicy,
    /// What removing a template does to its constraints.
    pub orphan_policy: OrphanPolicy,
    /// Evaluations allowed to occupy blocking threads at once, timed-out
    /// ones included.
    pub max_evaluations: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            compile_policy: CompilePolicy::default(),
            orphan_policy: OrphanPolicy::default(),
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
        }
    }
}

impl ClientConfig {
    /// Set the query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Set the compile policy.
    pub fn with_compile_policy(mut self, policy: CompilePolicy) -> Self {
        self.compile_policy = policy;
        self
    }

    /// Set the orphan policy.
    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    /// Set the cap on concurrent evaluations.
    pub fn with_max_evaluations(mut self, max: usize) -> Self {
        self.max_evaluations = max;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Variables (all optional):
    /// - `WARDEN_QUERY_TIMEOUT_MS` (default: 5000)
    /// - `WARDEN_COMPILE_POLICY`: `best-effort` (default) or `strict`
    /// - `WARDEN_ORPHAN_POLICY`: `cascade` (default) or `retain`
    /// - `WARDEN_MAX_EVALUATIONS` (default: 32)
    ///
    /// # Errors
    ///
    /// [`WardenError::Config`] naming the variable when a value is invalid.
    pub fn from_env() -> Result<Self, WardenError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`ClientConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WardenError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("WARDEN_QUERY_TIMEOUT_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| invalid("WARDEN_QUERY_TIMEOUT_MS", &raw))?;
            if ms == 0 {
                return Err(invalid("WARDEN_QUERY_TIMEOUT_MS", &raw));
            }
            config.query_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("WARDEN_COMPILE_POLICY") {
            config.compile_policy = raw
                .trim()
                .parse()
                .map_err(|e: String| WardenError::Config(format!("WARDEN_COMPILE_POLICY: {e}")))?;
        }
        if let Some(raw) = lookup("WARDEN_ORPHAN_POLICY") {
            config.orphan_policy = raw
                .trim()
                .parse()
                .map_err(|e: String| WardenError::Config(format!("WARDEN_ORPHAN_POLICY: {e}")))?;
        }
        if let Some(raw) = lookup("WARDEN_MAX_EVALUATIONS") {
            config.max_evaluations = match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(WardenError::Config(format!(
                        "WARDEN_MAX_EVALUATIONS: expected a positive count, got {raw:?}"
                    )))
                }
            };
        }
        Ok(config)
    }
}

fn invalid(var: &str, raw: &str) -> WardenError {
    WardenError::Config(format!("{var}: expected a positive number of milliseconds, got {raw:?}"))
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
