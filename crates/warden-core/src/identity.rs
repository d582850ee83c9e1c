//! # Identity Newtypes
//!
//! Validated identifiers for templates, constraints, and targets. Each is a
//! distinct type: you cannot pass a [`ConstraintName`] where a
//! [`TemplateKind`] is expected.
//!
//! ## Format rules
//!
//! - [`TemplateKind`]: `[A-Za-z][A-Za-z0-9]*`, at most 63 characters, not a
//!   Rego keyword. Kinds become a segment of the Rego package path of every
//!   compiled module.
//! - [`ConstraintName`]: DNS-1123 subdomain (lowercase alphanumerics, `-`,
//!   `.`; starts and ends alphanumeric; at most 253 characters).
//! - [`TargetName`]: lowercase alphanumerics, `.`, `-`, starting with a
//!   letter. Its identifier form ([`TargetName::ident`]) must not collide
//!   with a Rego keyword.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MAX_KIND_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

/// Words that cannot appear as a Rego package path segment.
const REGO_KEYWORDS: &[&str] = &[
    "as", "contains", "data", "default", "else", "every", "false", "if", "import", "in", "input",
    "not", "null", "package", "some", "true", "with",
];

// ---------------------------------------------------------------------------
// TemplateKind
// ---------------------------------------------------------------------------

/// The kind created by a template; globally unique within a cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TemplateKind(String);

impl TemplateKind {
    /// Validate and wrap a template kind.
    pub fn new(kind: impl Into<String>) -> Result<Self, ValidationError> {
        let kind = kind.into();
        let mut chars = kind.chars();
        let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric())
            && kind.len() <= MAX_KIND_LEN
            && !REGO_KEYWORDS.contains(&kind.as_str());
        if valid {
            Ok(Self(kind))
        } else {
            Err(ValidationError::InvalidTemplateKind(kind))
        }
    }

    /// Access the kind as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TemplateKind {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TemplateKind> for String {
    fn from(kind: TemplateKind) -> Self {
        kind.0
    }
}

impl AsRef<str> for TemplateKind {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ConstraintName
// ---------------------------------------------------------------------------

/// The name of a constraint, unique within its template kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConstraintName(String);

impl ConstraintName {
    /// Validate and wrap a constraint name.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.';
        let edge = |c: Option<char>| matches!(c, Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit());
        let valid = !name.is_empty()
            && name.len() <= MAX_NAME_LEN
            && name.chars().all(allowed)
            && edge(name.chars().next())
            && edge(name.chars().last());
        if valid {
            Ok(Self(name))
        } else {
            Err(ValidationError::InvalidConstraintName(name))
        }
    }

    /// Access the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ConstraintName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConstraintName> for String {
    fn from(name: ConstraintName) -> Self {
        name.0
    }
}

impl AsRef<str> for ConstraintName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConstraintName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TargetName
// ---------------------------------------------------------------------------

/// The name of a target domain (e.g. `admission.k8s.warden.dev`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetName(String);

impl TargetName {
    /// Validate and wrap a target name.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let mut chars = name.chars();
        let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
            && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
            && name.len() <= MAX_NAME_LEN
            && !REGO_KEYWORDS.contains(&ident_of(&name).as_str());
        if valid {
            Ok(Self(name))
        } else {
            Err(ValidationError::InvalidTargetName(name))
        }
    }

    /// Wrap a name known at compile time, for built-in targets.
    ///
    /// The name must satisfy the same rules as [`TargetName::new`]; debug
    /// builds assert it.
    pub fn from_static(name: &'static str) -> Self {
        debug_assert!(Self::new(name).is_ok(), "invalid built-in target name {name:?}");
        Self(name.to_string())
    }

    /// Access the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The Rego identifier form of this name: `.` and `-` become `_`.
    ///
    /// Used as the target segment of compiled module paths.
    pub fn ident(&self) -> String {
        ident_of(&self.0)
    }
}

fn ident_of(name: &str) -> String {
    name.chars()
        .map(|c| if c == '.' || c == '-' { '_' } else { c })
        .collect()
}

impl TryFrom<String> for TargetName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetName> for String {
    fn from(name: TargetName) -> Self {
        name.0
    }
}

impl AsRef<str> for TargetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ConstraintKey
// ---------------------------------------------------------------------------

/// Identity of a constraint: its template kind plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintKey {
    /// The template kind the constraint instantiates.
    pub kind: TemplateKind,
    /// The constraint's name within that kind.
    pub name: ConstraintName,
}

impl ConstraintKey {
    /// Build a key from its parts.
    pub fn new(kind: TemplateKind, name: ConstraintName) -> Self {
        Self { kind, name }
    }
}

impl std::fmt::Display for ConstraintKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Validate a short name (alias) for a constraint kind.
///
/// Short names follow the same lowercase alphanumeric rules as resource
/// names, without dots.
pub fn validate_short_name(short_name: &str) -> Result<(), ValidationError> {
    let mut chars = short_name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && short_name.len() <= MAX_KIND_LEN;
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidShortName(short_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn template_kind_accepts_camel_case() {
        let kind = TemplateKind::new("K8sRequiredLabels").unwrap();
        assert_eq!(kind.as_str(), "K8sRequiredLabels");
        assert_eq!(kind.to_string(), "K8sRequiredLabels");
    }

    #[test]
    fn template_kind_rejects_bad_input() {
        for bad in ["", "1Kind", "My-Kind", "my.kind", "Kind With Space"] {
            assert!(TemplateKind::new(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(TemplateKind::new("K".repeat(64)).is_err());
    }

    #[test]
    fn constraint_name_follows_dns_subdomain_rules() {
        assert!(ConstraintName::new("must-have-owner").is_ok());
        assert!(ConstraintName::new("c1.prod").is_ok());
        assert!(ConstraintName::new("-leading").is_err());
        assert!(ConstraintName::new("trailing-").is_err());
        assert!(ConstraintName::new("Upper").is_err());
        assert!(ConstraintName::new("").is_err());
    }

    #[test]
    fn target_name_ident_replaces_separators() {
        let target = TargetName::new("admission.k8s.warden-dev").unwrap();
        assert_eq!(target.ident(), "admission_k8s_warden_dev");
    }

    #[test]
    fn target_name_rejects_rego_keywords() {
        assert!(TargetName::new("input").is_err());
        assert!(TargetName::new("data").is_err());
        assert!(TargetName::new("inputs").is_ok());
    }

    #[test]
    fn target_name_must_start_with_letter() {
        assert!(TargetName::new("1target").is_err());
        assert!(TargetName::new(".target").is_err());
        assert!(TargetName::new("Target").is_err());
    }

    #[test]
    fn constraint_key_display() {
        let key = ConstraintKey::new(
            TemplateKind::new("RequiredLabels").unwrap(),
            ConstraintName::new("ns-must-have-gk").unwrap(),
        );
        assert_eq!(key.to_string(), "RequiredLabels/ns-must-have-gk");
    }

    #[test]
    fn identifiers_deserialize_with_validation() {
        let kind: TemplateKind = serde_json::from_str("\"Allowed\"").unwrap();
        assert_eq!(kind.as_str(), "Allowed");
        assert!(serde_json::from_str::<TemplateKind>("\"not-a-kind\"").is_err());
        assert!(serde_json::from_str::<ConstraintName>("\"Bad_Name\"").is_err());
    }

    #[test]
    fn template_kind_rejects_rego_keywords() {
        assert!(TemplateKind::new("if").is_err());
        assert!(TemplateKind::new("contains").is_err());
        assert!(TemplateKind::new("If").is_ok());
    }

    #[test]
    fn short_names() {
        assert!(validate_short_name("rl").is_ok());
        assert!(validate_short_name("req-labels").is_ok());
        assert!(validate_short_name("RL").is_err());
        assert!(validate_short_name("").is_err());
    }

    proptest! {
        #[test]
        fn valid_kinds_roundtrip_through_serde(kind in "[A-Z][A-Za-z0-9]{0,40}") {
            let parsed = TemplateKind::new(kind.clone()).unwrap();
            let json = serde_json::to_string(&parsed).unwrap();
            let back: TemplateKind = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back.as_str(), kind.as_str());
        }

        #[test]
        fn target_idents_never_contain_separators(name in "[a-z][a-z0-9.-]{0,30}") {
            if let Ok(target) = TargetName::new(name) {
                let ident = target.ident();
                prop_assert!(!ident.contains('.'));
                prop_assert!(!ident.contains('-'));
            }
        }
    }
}
