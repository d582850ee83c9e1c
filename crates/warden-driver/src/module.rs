//! # Module Identifiers and Changes
//!
//! A module id is the Rego package a module declares. Template modules live
//! at `templates.<target>.<Kind>`; their libraries beneath it at
//! `templates.<target>.<Kind>.lib.<name>`. Ids are stable across template
//! replacement, which is what lets a commit swap modules in place.

use serde::Serialize;
use warden_core::{TargetName, TemplateKind};

use crate::error::DriverError;
use crate::rego::is_dotted_path;

/// Root package segment of every template module.
pub const TEMPLATES_ROOT: &str = "templates";

/// Identifier of a registered module (its Rego package path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Validate an arbitrary dotted package path.
    pub fn new(path: impl Into<String>) -> Result<Self, DriverError> {
        let path = path.into();
        if is_dotted_path(&path) {
            Ok(Self(path))
        } else {
            Err(DriverError::Compile {
                reason: "module id must be a dotted path of identifiers".to_string(),
                module: path,
            })
        }
    }

    /// The module compiled from `kind`'s rule for `target`.
    pub fn for_template(target: &TargetName, kind: &TemplateKind) -> Self {
        Self(format!("{TEMPLATES_ROOT}.{}.{}", target.ident(), kind))
    }

    /// A library module beneath this one. `name` is the part of the library
    /// package after `lib.`.
    pub fn lib(&self, name: &str) -> Self {
        Self(format!("{}.lib.{name}", self.0))
    }

    /// Access the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `self` is strictly nested beneath `parent`.
    pub fn is_within(&self, parent: &ModuleId) -> bool {
        self.0.len() > parent.0.len()
            && self.0.starts_with(&parent.0)
            && self.0.as_bytes()[parent.0.len()] == b'.'
    }

    /// Whether `self` is `other` or nested beneath it.
    pub fn covers(&self, other: &ModuleId) -> bool {
        self == other || other.is_within(self)
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A batch of module insertions and removals, applied atomically.
///
/// Removals apply first and take nested modules with them; insertions then
/// apply in order. Replacing a template's modules is therefore "remove the
/// old ids, put the new sources" in one change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleChange {
    pub(crate) put: Vec<(ModuleId, String)>,
    pub(crate) remove: Vec<ModuleId>,
}

impl ModuleChange {
    /// An empty change.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a module.
    pub fn put(mut self, id: ModuleId, source: impl Into<String>) -> Self {
        self.put.push((id, source.into()));
        self
    }

    /// Remove a module and everything nested beneath it.
    pub fn remove(mut self, id: ModuleId) -> Self {
        self.remove.push(id);
        self
    }

    /// Whether the change does nothing.
    pub fn is_empty(&self) -> bool {
        self.put.is_empty() && self.remove.is_empty()
    }

    /// Modules this change registers.
    pub fn puts(&self) -> impl Iterator<Item = &ModuleId> {
        self.put.iter().map(|(id, _)| id)
    }

    /// Modules this change removes.
    pub fn removals(&self) -> &[ModuleId] {
        &self.remove
    }
}
