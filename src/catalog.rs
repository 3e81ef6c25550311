//! Resource catalog: name to entry-store resolution with caching
//!
//! Resolves dialogue resource names through a [`ResourceProvider`] and caches
//! the resulting stores for the lifetime of the catalog, so the same name
//! always yields the same store instance. Names are interned to dense
//! [`ResourceId`]s in load order; the ids double as arena keys everywhere the
//! tree needs a cheap resource identity.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::record::ResourceId;
use crate::store::EntryStore;

/// Canonical form of a resource name. Source data is case-insensitive about
/// resource references, so every map in this crate keys on this.
#[must_use]
pub fn canonical(name: &str) -> String {
    name.to_ascii_uppercase()
}

/// Backend that loads dialogue resources by name and enumerates the corpus.
pub trait ResourceProvider: Send + Sync {
    /// Load the named resource.
    fn load(&self, name: &str) -> Result<Arc<dyn EntryStore>>;

    /// Names of every dialogue resource the corpus holds, whether loaded or
    /// not. Used by whole-corpus scans.
    fn enumerate(&self) -> Vec<String>;
}

/// Name to entry-store resolver spanning the whole corpus.
///
/// Once a name resolves, the mapping is immutable for the catalog's
/// lifetime: repeated resolution returns the identical store instance and
/// never hits the provider again.
pub struct ResourceCatalog {
    provider: Box<dyn ResourceProvider>,
    /// Loaded stores keyed by canonical name; insertion index is the
    /// [`ResourceId`].
    stores: IndexMap<String, Arc<dyn EntryStore>>,
}

impl ResourceCatalog {
    /// Create a catalog over the given provider.
    #[must_use]
    pub fn new(provider: Box<dyn ResourceProvider>) -> Self {
        Self {
            provider,
            stores: IndexMap::new(),
        }
    }

    /// Resolve a name, loading the resource on first use.
    pub fn resolve(&mut self, name: &str) -> Result<(ResourceId, Arc<dyn EntryStore>)> {
        let key = canonical(name);
        if let Some((index, _, store)) = self.stores.get_full(&key) {
            return Ok((ResourceId(index as u32), Arc::clone(store)));
        }

        tracing::debug!(resource = %key, "loading dialogue resource");
        let store = self.provider.load(&key)?;
        let (index, _) = self.stores.insert_full(key, Arc::clone(&store));
        Ok((ResourceId(index as u32), store))
    }

    /// Id of an already-loaded resource, without triggering a load.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<ResourceId> {
        self.stores
            .get_index_of(&canonical(name))
            .map(|index| ResourceId(index as u32))
    }

    /// Store of an already-loaded resource.
    #[must_use]
    pub fn get(&self, id: ResourceId) -> Option<Arc<dyn EntryStore>> {
        self.stores
            .get_index(id.index())
            .map(|(_, store)| Arc::clone(store))
    }

    /// Canonical name of an already-loaded resource.
    #[must_use]
    pub fn name_of(&self, id: ResourceId) -> Option<&str> {
        self.stores.get_index(id.index()).map(|(name, _)| name.as_str())
    }

    /// All loaded resources, in load order.
    pub fn loaded(&self) -> impl Iterator<Item = (ResourceId, &Arc<dyn EntryStore>)> {
        self.stores
            .iter()
            .enumerate()
            .map(|(index, (_, store))| (ResourceId(index as u32), store))
    }

    /// Number of loaded resources.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.stores.len()
    }

    /// Every dialogue resource name in the corpus, canonicalized.
    #[must_use]
    pub fn enumerate(&self) -> Vec<String> {
        self.provider
            .enumerate()
            .into_iter()
            .map(|name| canonical(&name))
            .collect()
    }
}

/// In-memory [`ResourceProvider`] over pre-built stores.
///
/// The reference provider for tests and for editors that decode resources
/// themselves before handing them to the tree.
#[derive(Default)]
pub struct MemoryProvider {
    stores: IndexMap<String, Arc<dyn EntryStore>>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a store under its own name. Replaces any previous store with the
    /// same canonical name.
    pub fn add(&mut self, store: Arc<dyn EntryStore>) {
        self.stores.insert(canonical(store.name()), store);
    }

    /// Builder-style [`add`](Self::add).
    #[must_use]
    pub fn with(mut self, store: Arc<dyn EntryStore>) -> Self {
        self.add(store);
        self
    }
}

impl ResourceProvider for MemoryProvider {
    fn load(&self, name: &str) -> Result<Arc<dyn EntryStore>> {
        self.stores
            .get(&canonical(name))
            .map(Arc::clone)
            .ok_or_else(|| Error::ResourceNotFound {
                name: name.to_string(),
            })
    }

    fn enumerate(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn catalog_with(names: &[&str]) -> ResourceCatalog {
        let mut provider = MemoryProvider::new();
        for name in names {
            provider.add(Arc::new(MemoryStore::new(*name)));
        }
        ResourceCatalog::new(Box::new(provider))
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut catalog = catalog_with(&["GREET.DLG"]);

        let (id_a, store_a) = catalog.resolve("GREET.DLG").unwrap();
        let (id_b, store_b) = catalog.resolve("greet.dlg").unwrap();

        assert_eq!(id_a, id_b);
        assert!(Arc::ptr_eq(&store_a, &store_b));
        assert_eq!(catalog.loaded_count(), 1);
    }

    #[test]
    fn test_ids_follow_load_order() {
        let mut catalog = catalog_with(&["A.DLG", "B.DLG"]);

        let (id_b, _) = catalog.resolve("B.DLG").unwrap();
        let (id_a, _) = catalog.resolve("A.DLG").unwrap();

        assert_eq!(id_b, ResourceId(0));
        assert_eq!(id_a, ResourceId(1));
        assert_eq!(catalog.name_of(id_b), Some("B.DLG"));
        assert_eq!(catalog.id_of("b.dlg"), Some(id_b));
    }

    #[test]
    fn test_unknown_resource_is_an_error() {
        let mut catalog = catalog_with(&[]);
        assert!(matches!(
            catalog.resolve("MISSING.DLG"),
            Err(Error::ResourceNotFound { .. })
        ));
        assert_eq!(catalog.loaded_count(), 0);
    }
}
