//! Named allocator registry.

use super::allocator::FileMemAllocator;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Name-indexed table of allocators.
///
/// Registration is insert-if-absent: the first allocator registered under a
/// name keeps it until it is unregistered.
#[derive(Default)]
pub struct AllocatorRegistry {
    allocators: RwLock<HashMap<String, Arc<FileMemAllocator>>>,
}

impl AllocatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static AllocatorRegistry {
        static GLOBAL: OnceLock<AllocatorRegistry> = OnceLock::new();
        GLOBAL.get_or_init(AllocatorRegistry::new)
    }

    /// Register `allocator` under `name`.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] if the name is taken; the registry is
    /// left as it was.
    pub fn register(&self, name: &str, allocator: Arc<FileMemAllocator>) -> Result<()> {
        match self.allocators.write().entry(name.to_string()) {
            Entry::Occupied(_) => {
                warn!(name, "allocator already registered, keeping the existing one");
                Err(Error::AlreadyRegistered(name.to_string()))
            }
            Entry::Vacant(slot) => {
                slot.insert(allocator);
                debug!(name, "allocator registered");
                Ok(())
            }
        }
    }

    /// Look up an allocator by name.
    pub fn find(&self, name: &str) -> Option<Arc<FileMemAllocator>> {
        self.allocators.read().get(name).cloned()
    }

    /// Remove and return the allocator registered under `name`.
    pub fn unregister(&self, name: &str) -> Option<Arc<FileMemAllocator>> {
        let removed = self.allocators.write().remove(name);
        if removed.is_some() {
            debug!(name, "allocator unregistered");
        }
        removed
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.allocators.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered allocators.
    pub fn len(&self) -> usize {
        self.allocators.read().len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.allocators.read().is_empty()
    }
}

impl std::fmt::Debug for AllocatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocatorRegistry")
            .field("names", &self.names())
            .finish()
    }
}
