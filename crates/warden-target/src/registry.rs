//! # Target Registry
//!
//! Built once, then frozen. Lookups are by name; iteration is in
//! registration order.

use std::collections::BTreeMap;
use std::sync::Arc;

use warden_core::{TargetName, WardenError};

use crate::handler::TargetHandler;

/// Immutable set of target handlers.
pub struct TargetRegistry {
    handlers: Vec<Arc<dyn TargetHandler>>,
    index: BTreeMap<TargetName, usize>,
}

impl TargetRegistry {
    /// Start assembling a registry.
    pub fn builder() -> TargetRegistryBuilder {
        TargetRegistryBuilder::default()
    }

    /// Look up a handler by name.
    pub fn lookup(&self, name: &TargetName) -> Result<&Arc<dyn TargetHandler>, WardenError> {
        self.get(name)
            .ok_or_else(|| WardenError::UnknownTarget(name.to_string()))
    }

    /// Look up a handler by name, returning `None` if absent.
    pub fn get(&self, name: &TargetName) -> Option<&Arc<dyn TargetHandler>> {
        self.index.get(name).map(|&i| &self.handlers[i])
    }

    /// Whether a handler with this name is registered.
    pub fn contains(&self, name: &TargetName) -> bool {
        self.index.contains_key(name)
    }

    /// Handlers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn TargetHandler>> {
        self.handlers.iter()
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &TargetName> {
        self.handlers.iter().map(|h| h.name())
    }

    /// Position of a target in registration order.
    pub fn position(&self, name: &TargetName) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Number of registered targets.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no targets are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRegistry")
            .field("targets", &self.names().map(TargetName::as_str).collect::<Vec<_>>())
            .finish()
    }
}

/// Accumulates handlers before freezing them into a [`TargetRegistry`].
#[derive(Default)]
pub struct TargetRegistryBuilder {
    handlers: Vec<Arc<dyn TargetHandler>>,
    index: BTreeMap<TargetName, usize>,
}

impl TargetRegistryBuilder {
    /// Register a handler.
    ///
    /// # Errors
    ///
    /// [`WardenError::DuplicateTarget`] if a handler with the same name (or
    /// the same identifier form) is already registered.
    pub fn register<H>(self, handler: H) -> Result<Self, WardenError>
    where
        H: TargetHandler + 'static,
    {
        self.register_arc(Arc::new(handler))
    }

    /// Register a handler that is already shared.
    pub fn register_arc(mut self, handler: Arc<dyn TargetHandler>) -> Result<Self, WardenError> {
        let name = handler.name().clone();
        // Module paths use the identifier form, so `a.b` and `a-b` collide.
        if self.index.keys().any(|existing| existing.ident() == name.ident()) {
            return Err(WardenError::DuplicateTarget(name.to_string()));
        }
        tracing::debug!(target_name = %name, position = self.handlers.len(), "registered target handler");
        self.index.insert(name, self.handlers.len());
        self.handlers.push(handler);
        Ok(self)
    }

    /// Names registered so far, in order.
    pub fn names(&self) -> impl Iterator<Item = &TargetName> {
        self.handlers.iter().map(|h| h.name())
    }

    /// Freeze the registry.
    pub fn build(self) -> Arc<TargetRegistry> {
        Arc::new(TargetRegistry {
            handlers: self.handlers,
            index: self.index,
        })
    }
}

impl std::fmt::Debug for TargetRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRegistryBuilder")
            .field("targets", &self.names().map(TargetName::as_str).collect::<Vec<_>>())
            .finish()
    }
}
