//! # Cache Configuration

use serde::{Deserialize, Serialize};

/// What happens to constraints when their template is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrphanPolicy {
    /// Dependent constraints are deleted with the template.
    #[default]
    Cascade,
    /// Dependent constraints are kept, excluded from review, and revived
    /// when a template of the same kind is added and they satisfy its
    /// schema.
    Retain,
}

impl std::str::FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cascade" => Ok(Self::Cascade),
            "retain" => Ok(Self::Retain),
            other => Err(format!("unknown orphan policy {other:?} (expected cascade or retain)")),
        }
    }
}

/// Cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Handling of constraints whose template is removed.
    pub orphan_policy: OrphanPolicy,
    /// Number of lock stripes per key space. Zero selects the default.
    pub lock_stripes: usize,
}

impl CacheConfig {
    /// Set the orphan policy.
    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_cascade() {
        assert_eq!(CacheConfig::default().orphan_policy, OrphanPolicy::Cascade);
    }

    #[test]
    fn parses_policies() {
        assert_eq!("retain".parse::<OrphanPolicy>().unwrap(), OrphanPolicy::Retain);
        assert!("keep".parse::<OrphanPolicy>().is_err());
        let config: CacheConfig = serde_json::from_str(r#"{"orphanPolicy": "retain"}"#).unwrap();
        assert_eq!(config.orphan_policy, OrphanPolicy::Retain);
        assert_eq!(config.lock_stripes, 0);
    }
}
