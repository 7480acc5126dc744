//! `Registry` and the process-wide `RegistryPool`.
//!
//! Grounded on `excore/engine/registry.py`: a registry is a named catalogue
//! of constructible targets (here, [`TargetDescriptor`]s) plus arbitrary
//! extra metadata fields. Registries live in a single process-wide pool
//! keyed by name, mirroring `RegistryMeta._registry_pool`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use fs4::fs_std::FileExt;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::RegistryError;
use crate::target::{Factory, TargetDescriptor};

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

const CACHE_VERSION: u32 = 1;

/// A named catalogue of constructible targets.
///
/// Entries are keyed by target name; a second, free-form metadata map lets
/// callers attach arbitrary extra fields per entry the way
/// `Registry.register(obj, name=..., **extra)` does in Python.
pub struct Registry {
    name: String,
    entries: DashMap<String, TargetDescriptor>,
    extra: DashMap<String, HashMap<String, String>>,
    locked: std::sync::atomic::AtomicBool,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("len", &self.entries.len())
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl Registry {
    pub fn new(name: impl Into<String>) -> Result<Self, RegistryError> {
        let name = name.into();
        if !NAME_RE.is_match(&name) {
            return Err(RegistryError::InvalidName(name));
        }
        Ok(Self {
            name,
            entries: DashMap::new(),
            extra: DashMap::new(),
            locked: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn lock(&self) {
        self.locked.store(true, std::sync::atomic::Ordering::Release);
    }

    pub fn unlock(&self) {
        self.locked.store(false, std::sync::atomic::Ordering::Release);
    }

    /// Register a single target under `name`, with optional extra metadata.
    ///
    /// Once locked, `register*` is a no-op returning `Ok(())` unchanged —
    /// this is how the post-deserialization second pass avoids
    /// double-registering everything `#[excore::register]` already put in
    /// the cache.
    pub fn register(
        &self,
        name: &str,
        factory: Arc<dyn Factory>,
        extra: HashMap<String, String>,
    ) -> Result<(), RegistryError> {
        if self.is_locked() {
            return Ok(());
        }
        if self.entries.contains_key(name) {
            return Err(RegistryError::DuplicateTarget {
                registry: self.name.clone(),
                name: name.to_string(),
            });
        }
        self.entries.insert(
            name.to_string(),
            TargetDescriptor {
                name: Box::leak(name.to_string().into_boxed_str()),
                factory,
            },
        );
        if !extra.is_empty() {
            self.extra.insert(name.to_string(), extra);
        }
        Ok(())
    }

    /// Register many targets at once. Stops at the first failure, leaving
    /// already-registered entries in place (matches `Registry.register_all`,
    /// which is a plain loop with no transactional rollback in Python).
    pub fn register_all(
        &self,
        items: impl IntoIterator<Item = (String, Arc<dyn Factory>)>,
    ) -> Result<(), RegistryError> {
        for (name, factory) in items {
            self.register(&name, factory, HashMap::new())?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<TargetDescriptor> {
        self.entries.get(name).map(|e| e.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Merge `other`'s entries into `self`. Matches `Registry.merge`:
    /// later duplicates are an error, not a silent overwrite.
    pub fn merge(&self, other: &Registry) -> Result<(), RegistryError> {
        for entry in other.entries.iter() {
            self.register(entry.key(), entry.value().factory.clone(), HashMap::new())?;
        }
        Ok(())
    }

    /// Returns the subset of names that contain `pattern` as a substring,
    /// matching `Registry.filter`'s simple substring semantics.
    pub fn filter(&self, pattern: &str) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.key().clone())
            .filter(|n| n.contains(pattern))
            .collect()
    }

    /// Returns the subset of names matching `regex`, matching
    /// `Registry.match` (Python's `re.match`/`re.search`-backed filter).
    pub fn match_(&self, regex: &Regex) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.key().clone())
            .filter(|n| regex.is_match(n))
            .collect()
    }

    /// A human-readable table of this registry's contents, reinstated from
    /// `excore/engine/registry.py::Registry.__repr__`/`module_table` (see
    /// SPEC_FULL.md §10).
    pub fn table(&self) -> String {
        let mut names = self.names();
        names.sort();
        let mut out = format!("Registry<{}> ({} targets)\n", self.name, names.len());
        for n in names {
            out.push_str("  - ");
            out.push_str(&n);
            out.push('\n');
        }
        out
    }
}

/// A serializable snapshot of a registry's entry names, used for the
/// on-disk cache (the factories themselves are process-local function
/// pointers / trait objects and cannot be serialized; only the catalogue
/// shape is cached, matching the spirit of the Python pickle cache which
/// records class paths rather than live classes).
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub names: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    version: u32,
    pool: HashMap<String, RegistrySnapshot>,
}

/// The process-wide pool of named registries (`RegistryMeta._registry_pool`).
pub struct RegistryPool {
    registries: RwLock<HashMap<String, Arc<Registry>>>,
    find_cache: Mutex<HashMap<String, Option<String>>>,
}

impl RegistryPool {
    fn new() -> Self {
        Self {
            registries: RwLock::new(HashMap::new()),
            find_cache: Mutex::new(HashMap::new()),
        }
    }

    /// The single process-wide pool instance.
    pub fn global() -> &'static RegistryPool {
        static POOL: OnceCell<RegistryPool> = OnceCell::new();
        POOL.get_or_init(RegistryPool::new)
    }

    /// Get or create the named registry.
    pub fn get_or_create(&self, name: &str) -> Result<Arc<Registry>, RegistryError> {
        if let Some(r) = self.registries.read().get(name) {
            return Ok(r.clone());
        }
        let mut guard = self.registries.write();
        if let Some(r) = guard.get(name) {
            return Ok(r.clone());
        }
        let r = Arc::new(Registry::new(name)?);
        guard.insert(name.to_string(), r.clone());
        Ok(r)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Registry>> {
        self.registries.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.registries.read().keys().cloned().collect()
    }

    fn invalidate_find_cache(&self) {
        self.find_cache.lock().clear();
    }

    /// Scan every registry in the pool for `target_name`, returning the
    /// name of the first registry that contains it. Matches
    /// `Registry.find`'s behavior of searching the whole pool when the
    /// field a value came from doesn't pin down a specific registry.
    /// Results are cached (bounded by the pool's own size, invalidated on
    /// any registration) rather than via an LRU crate dependency the
    /// teacher's stack doesn't carry.
    pub fn find(&self, target_name: &str) -> Option<String> {
        if let Some(hit) = self.find_cache.lock().get(target_name) {
            return hit.clone();
        }
        let result = {
            let registries = self.registries.read();
            registries
                .iter()
                .find(|(_, reg)| reg.contains(target_name))
                .map(|(name, _)| name.clone())
        };
        self.find_cache
            .lock()
            .insert(target_name.to_string(), result.clone());
        result
    }

    /// A human-readable table across every registry in the pool.
    pub fn table(&self) -> String {
        let mut names = self.names();
        names.sort();
        let mut out = String::new();
        for n in names {
            if let Some(r) = self.get(&n) {
                out.push_str(&r.table());
            }
        }
        out
    }

    /// Dump a snapshot of the pool to `path` as a versioned JSON envelope,
    /// guarded by an exclusive file lock. Grounded on
    /// `excore/engine/registry.py::Registry.dump`'s `FileLock`-guarded
    /// pickle write.
    pub fn dump(&self, path: &Path) -> Result<(), RegistryError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| RegistryError::CacheIo {
                path: path.display().to_string(),
                source,
            })?;
        file.lock_exclusive().map_err(|_| RegistryError::CacheLock {
            path: path.display().to_string(),
        })?;

        let pool = self
            .registries
            .read()
            .iter()
            .map(|(name, reg)| {
                (
                    name.clone(),
                    RegistrySnapshot {
                        names: reg.names(),
                    },
                )
            })
            .collect();
        let envelope = CacheEnvelope {
            version: CACHE_VERSION,
            pool,
        };
        serde_json::to_writer_pretty(&file, &envelope).map_err(|source| RegistryError::CacheSerde {
            path: path.display().to_string(),
            source,
        })?;
        let _ = file.unlock();
        Ok(())
    }

    /// Load a snapshot from `path`, shared-locked for the duration of the
    /// read. Returns only the catalogue shape (names); actual `Factory`
    /// instances must already be registered in-process (via
    /// `#[excore::register]`) for `get_or_create`'s entries to be callable.
    pub fn load(&self, path: &Path) -> Result<HashMap<String, RegistrySnapshot>, RegistryError> {
        let file = std::fs::File::open(path).map_err(|source| RegistryError::CacheIo {
            path: path.display().to_string(),
            source,
        })?;
        file.lock_shared().map_err(|_| RegistryError::CacheLock {
            path: path.display().to_string(),
        })?;
        let envelope: CacheEnvelope =
            serde_json::from_reader(&file).map_err(|source| RegistryError::CacheSerde {
                path: path.display().to_string(),
                source,
            })?;
        let _ = file.unlock();
        if envelope.version != CACHE_VERSION {
            return Err(RegistryError::CacheVersionMismatch {
                path: path.display().to_string(),
                found: envelope.version,
                expected: CACHE_VERSION,
            });
        }
        Ok(envelope.pool)
    }
}

/// Registers `factory` under `name` in the pool's `registry` registry,
/// creating the registry on first use. This is what
/// `#[excore::register(field = "registry")]` expands a call into.
pub fn register_global(
    registry: &str,
    name: &str,
    factory: Arc<dyn Factory>,
) -> Result<(), RegistryError> {
    let reg = RegistryPool::global().get_or_create(registry)?;
    let result = reg.register(name, factory, HashMap::new());
    RegistryPool::global().invalidate_find_cache();
    result
}

/// A no-argument function submitted via `inventory::submit!` by
/// `#[excore::register(...)]`. Calling it registers the annotated target
/// into the global pool. Grounded on `libs/modkit/src/registry.rs`'s
/// `Registrator(pub fn(&mut RegistryBuilder))`; simplified here to a plain
/// `fn()` since targets register directly into the pool rather than into
/// an intermediate builder (there is no dependency graph to topo-sort).
pub struct Registrator(pub fn());

inventory::collect!(Registrator);

impl RegistryPool {
    /// Run every `#[excore::register(...)]`-submitted registrator exactly
    /// once for the life of the process. Mirrors
    /// `ModuleRegistry::discover_and_build`'s `inventory::iter` walk; unlike
    /// the teacher, there is no topo-sort step afterward since registry
    /// entries don't declare dependencies on each other.
    pub fn bootstrap() {
        static DONE: OnceCell<()> = OnceCell::new();
        DONE.get_or_init(|| {
            for r in inventory::iter::<Registrator> {
                (r.0)();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use crate::value::Value;

    struct Dummy(&'static str);
    impl Factory for Dummy {
        fn call(&self, _params: BTreeMap<String, Value>) -> anyhow::Result<Value> {
            Ok(Value::Str(self.0.to_string()))
        }
        fn dotted_path(&self) -> &'static str {
            self.0
        }
    }

    #[test]
    fn register_and_get() {
        let reg = Registry::new("models").unwrap();
        reg.register("resnet", Arc::new(Dummy("resnet")), HashMap::new())
            .unwrap();
        assert!(reg.contains("resnet"));
        assert_eq!(reg.get("resnet").unwrap().name, "resnet");
    }

    #[test]
    fn rejects_invalid_name() {
        assert!(Registry::new("has space").is_err());
        assert!(Registry::new("valid_Name123").is_ok());
    }

    #[test]
    fn duplicate_registration_errors() {
        let reg = Registry::new("models").unwrap();
        reg.register("resnet", Arc::new(Dummy("resnet")), HashMap::new())
            .unwrap();
        let err = reg
            .register("resnet", Arc::new(Dummy("resnet")), HashMap::new())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTarget { .. }));
    }

    #[test]
    fn locked_registry_silently_absorbs_new_entries() {
        let reg = Registry::new("models").unwrap();
        reg.lock();
        reg.register("resnet", Arc::new(Dummy("resnet")), HashMap::new())
            .expect("register on a locked registry is a no-op, not an error");
        assert!(reg.get("resnet").is_none());
        reg.unlock();
        reg.register("resnet", Arc::new(Dummy("resnet")), HashMap::new())
            .unwrap();
        assert!(reg.get("resnet").is_some());
    }

    #[test]
    fn merge_combines_registries() {
        let a = Registry::new("a").unwrap();
        let b = Registry::new("b").unwrap();
        a.register("x", Arc::new(Dummy("x")), HashMap::new()).unwrap();
        b.register("y", Arc::new(Dummy("y")), HashMap::new()).unwrap();
        a.merge(&b).unwrap();
        assert!(a.contains("x"));
        assert!(a.contains("y"));
    }

    #[test]
    fn filter_and_match() {
        let reg = Registry::new("models").unwrap();
        reg.register("resnet18", Arc::new(Dummy("r18")), HashMap::new()).unwrap();
        reg.register("resnet50", Arc::new(Dummy("r50")), HashMap::new()).unwrap();
        reg.register("vgg16", Arc::new(Dummy("v16")), HashMap::new()).unwrap();
        let mut filtered = reg.filter("resnet");
        filtered.sort();
        assert_eq!(filtered, vec!["resnet18".to_string(), "resnet50".to_string()]);

        let re = Regex::new(r"^vgg\d+$").unwrap();
        assert_eq!(reg.match_(&re), vec!["vgg16".to_string()]);
    }

    #[test]
    fn pool_find_scans_all_registries() {
        let pool = RegistryPool::new();
        let a = pool.get_or_create("a").unwrap();
        let b = pool.get_or_create("b").unwrap();
        a.register("foo", Arc::new(Dummy("foo")), HashMap::new()).unwrap();
        b.register("bar", Arc::new(Dummy("bar")), HashMap::new()).unwrap();
        assert_eq!(pool.find("foo"), Some("a".to_string()));
        assert_eq!(pool.find("bar"), Some("b".to_string()));
        assert_eq!(pool.find("baz"), None);
    }
}
