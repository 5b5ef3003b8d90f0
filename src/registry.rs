//! Overlay registration.
//!
//! Host applications discover overlays by name: a plugin registers a
//! factory under a string identifier when it loads and unregisters it
//! when it unloads. The registry itself stays deliberately small; the
//! host's plugin lifecycle is not modeled here.

use std::collections::HashMap;

use tracing::debug;

/// Factory producing an overlay from the host's construction context.
pub type OverlayFactory<C, O> = Box<dyn Fn(&C) -> O + Send + Sync>;

/// Name-to-factory mapping for overlay construction.
///
/// `C` is the host context handed to factories; `O` is the overlay type
/// they produce.
pub struct OverlayRegistry<C, O> {
    factories: HashMap<String, OverlayFactory<C, O>>,
}

impl<C, O> OverlayRegistry<C, O> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, factory: OverlayFactory<C, O>) {
        let name = name.into();
        debug!(name = %name, "registering overlay");
        self.factories.insert(name, factory);
    }

    /// Remove the factory registered under `name`. Returns whether one
    /// was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        debug!(name = %name, "unregistering overlay");
        self.factories.remove(name).is_some()
    }

    /// Construct the overlay registered under `name`, or `None` if the
    /// name is unknown.
    pub fn create(&self, name: &str, context: &C) -> Option<O> {
        self.factories.get(name).map(|factory| factory(context))
    }

    /// Registered names, in arbitrary order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl<C, O> Default for OverlayRegistry<C, O> {
    fn default() -> Self {
        Self::new()
    }
}
