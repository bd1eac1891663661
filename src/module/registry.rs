//! Module registry
//!
//! Maps module ids to registered modules. One registry lives for the whole
//! process ([`Registry::global`], empty at startup, never torn down); tests
//! and embedders create their own with [`Registry::new`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::debug;

use super::adapter::Module;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Shared handle to a set of registered modules
#[derive(Debug, Clone, Default)]
pub struct Registry {
    modules: Arc<Mutex<BTreeMap<String, Arc<Module>>>>,
}

impl Registry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Arc<Module>>> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a module under its id. The last write for an id wins;
    /// the replaced module is returned.
    pub fn register(&self, module: Arc<Module>) -> Option<Arc<Module>> {
        debug!(module = %module.id(), "Registering module");
        self.lock().insert(module.id().to_string(), module)
    }

    /// Gets a module by id
    pub fn get(&self, id: &str) -> Option<Arc<Module>> {
        self.lock().get(id).cloned()
    }

    /// All registered modules, ordered by id
    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.lock().values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
