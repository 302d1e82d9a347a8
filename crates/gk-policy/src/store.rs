//! # Policy Store
//!
//! Holds the active policy and a catalog of every policy seen by this
//! process, addressable by content hash.
//!
//! The active policy is an `Arc<PolicyDefinition>` behind a
//! `parking_lot::RwLock`. Readers clone the `Arc` under a read lock and then
//! work lock-free on one consistent snapshot (rules and hash together). A
//! swap replaces the `Arc` in one write; in-flight runs keep the snapshot they
//! started with.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use gk_core::ContentDigest;
use parking_lot::RwLock;

use crate::definition::PolicyDefinition;
use crate::error::PolicyLoadError;
use crate::loader::PolicyLoader;

/// Active policy plus a hash-addressable catalog.
#[derive(Debug)]
pub struct PolicyStore {
    active: RwLock<Arc<PolicyDefinition>>,
    catalog: RwLock<BTreeMap<ContentDigest, Arc<PolicyDefinition>>>,
}

impl PolicyStore {
    /// A store with `initial` active.
    pub fn new(initial: PolicyDefinition) -> Self {
        let initial = Arc::new(initial);
        let mut catalog = BTreeMap::new();
        catalog.insert(initial.hash(), Arc::clone(&initial));
        tracing::info!(
            policy_version = initial.version(),
            policy_hash = %initial.hash(),
            "policy activated"
        );
        Self {
            active: RwLock::new(initial),
            catalog: RwLock::new(catalog),
        }
    }

    /// The active policy snapshot.
    pub fn current(&self) -> Arc<PolicyDefinition> {
        Arc::clone(&self.active.read())
    }

    /// Make `definition` the active policy and return it.
    ///
    /// If a policy with the same hash is already cataloged, that instance is
    /// reused so equal hashes always share one allocation.
    pub fn activate(&self, definition: PolicyDefinition) -> Arc<PolicyDefinition> {
        let definition = self.register(definition);
        let previous = {
            let mut active = self.active.write();
            std::mem::replace(&mut *active, Arc::clone(&definition))
        };
        tracing::info!(
            policy_version = definition.version(),
            policy_hash = %definition.hash(),
            previous_version = previous.version(),
            previous_hash = %previous.hash(),
            "policy activated"
        );
        definition
    }

    /// Load `path` and activate it.
    ///
    /// On any load or validation error the active policy is left untouched.
    pub fn activate_path(
        &self,
        loader: &PolicyLoader,
        path: &Path,
    ) -> Result<Arc<PolicyDefinition>, PolicyLoadError> {
        match loader.load_path(path) {
            Ok(definition) => Ok(self.activate(definition)),
            Err(err) => {
                let current = self.current();
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    policy_version = current.version(),
                    policy_hash = %current.hash(),
                    "policy activation refused; previous policy stays active"
                );
                Err(err)
            }
        }
    }

    /// Add `definition` to the catalog without activating it.
    pub fn register(&self, definition: PolicyDefinition) -> Arc<PolicyDefinition> {
        let mut catalog = self.catalog.write();
        Arc::clone(
            catalog
                .entry(definition.hash())
                .or_insert_with(|| Arc::new(definition)),
        )
    }

    /// Look up a cataloged policy by content hash.
    pub fn get(&self, hash: &ContentDigest) -> Option<Arc<PolicyDefinition>> {
        self.catalog.read().get(hash).cloned()
    }

    /// `(version, hash)` of every cataloged policy, in hash order.
    pub fn catalog(&self) -> Vec<(String, ContentDigest)> {
        self.catalog
            .read()
            .values()
            .map(|d| (d.version().to_string(), d.hash()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::PolicyFormat;

    fn policy(version: &str) -> PolicyDefinition {
        let text = format!(
            "version: {version}\nrules:\n  - id: accept-all\n    priority: 1\n    when: always\n    outcome: ACCEPTED\n"
        );
        PolicyLoader::new().load_str(&text, PolicyFormat::Yaml).unwrap()
    }

    #[test]
    fn activate_swaps_current() {
        let store = PolicyStore::new(policy("v1"));
        assert_eq!(store.current().version(), "v1");
        let held = store.current();
        store.activate(policy("v2"));
        assert_eq!(store.current().version(), "v2");
        assert_eq!(held.version(), "v1");
    }

    #[test]
    fn catalog_addresses_by_hash() {
        let v1 = policy("v1");
        let v1_hash = v1.hash();
        let store = PolicyStore::new(v1);
        store.activate(policy("v2"));
        assert_eq!(store.get(&v1_hash).unwrap().version(), "v1");
        assert_eq!(store.catalog().len(), 2);
    }

    #[test]
    fn refused_activation_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "version: v9\nrules: []\n").unwrap();
        let store = PolicyStore::new(policy("v1"));
        let before = store.current().hash();
        assert!(store.activate_path(&PolicyLoader::new(), &bad).is_err());
        assert_eq!(store.current().hash(), before);
        assert_eq!(store.catalog().len(), 1);
    }

    #[test]
    fn activate_path_success() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.yaml");
        std::fs::write(
            &good,
            "version: v3\nrules:\n  - id: accept-all\n    priority: 1\n    when: always\n    outcome: ACCEPTED\n",
        )
        .unwrap();
        let store = PolicyStore::new(policy("v1"));
        let active = store.activate_path(&PolicyLoader::new(), &good).unwrap();
        assert_eq!(active.version(), "v3");
        assert_eq!(store.current().hash(), active.hash());
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        let store = PolicyStore::new(policy("v1"));
        let v1 = store.current().hash();
        let v2_def = policy("v2");
        let v2 = v2_def.hash();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..200 {
                        let snapshot = store.current();
                        let expected = if snapshot.version() == "v1" { v1 } else { v2 };
                        assert_eq!(snapshot.hash(), expected);
                    }
                });
            }
            s.spawn(|| {
                store.activate(v2_def);
            });
        });
        assert_eq!(store.current().hash(), v2);
    }
}
