//! In-memory index of parsed schema modules.
//!
//! Entries are keyed three ways: by root-relative path, by service name, and
//! by method name. An entry is immutable once built; re-adding a path swaps
//! the whole entry and its registrations under one write lock, so readers see
//! either the old module or the new one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use thriftgate_idl::{IdlError, ModuleDescriptor, SchemaLoader, ServiceDescriptor, TypeTable};
use tracing::debug;

use crate::crawler::normalize_path;
use crate::health::HealthReporter;

const INDEX_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::index");

/// One parsed schema file.
#[derive(Debug)]
pub struct ModuleEntry {
    path: Utf8PathBuf,
    name: String,
    types: TypeTable,
    services: IndexMap<String, Arc<ServiceDescriptor>>,
    dependencies: Vec<Utf8PathBuf>,
}

impl ModuleEntry {
    /// Wraps a loaded module under its root-relative path.
    #[must_use]
    pub fn new(path: Utf8PathBuf, module: ModuleDescriptor) -> Self {
        let ModuleDescriptor {
            name,
            services,
            types,
            ..
        } = module;
        Self {
            path,
            name,
            types,
            services: services
                .into_iter()
                .map(|(service_name, service)| (service_name, Arc::new(service)))
                .collect(),
            dependencies: Vec::new(),
        }
    }

    /// Root-relative path of the schema file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Module name (the file stem).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Struct and enum definitions visible to the module's services.
    #[must_use]
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Services in declaration order.
    #[must_use]
    pub fn services(&self) -> &IndexMap<String, Arc<ServiceDescriptor>> {
        &self.services
    }

    /// Root-relative paths of the included files this entry was built
    /// from. Includes found outside the root are not listed.
    #[must_use]
    pub fn dependencies(&self) -> &[Utf8PathBuf] {
        &self.dependencies
    }
}

/// A service found by [`SchemaIndex::query`].
#[derive(Debug, Clone)]
pub struct ServiceMatch {
    entry: Arc<ModuleEntry>,
    service: Arc<ServiceDescriptor>,
}

impl ServiceMatch {
    /// Module declaring the service.
    #[must_use]
    pub fn entry(&self) -> &Arc<ModuleEntry> {
        &self.entry
    }

    /// The service itself.
    #[must_use]
    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }
}

#[derive(Debug, Default)]
struct IndexState {
    by_path: BTreeMap<Utf8PathBuf, Arc<ModuleEntry>>,
    by_service: HashMap<String, BTreeSet<Utf8PathBuf>>,
    by_method: HashMap<String, BTreeSet<(Utf8PathBuf, String)>>,
    by_dependency: HashMap<Utf8PathBuf, BTreeSet<Utf8PathBuf>>,
}

impl IndexState {
    fn replace(&mut self, entry: Arc<ModuleEntry>) {
        self.remove(entry.path());
        for dependency in entry.dependencies() {
            self.by_dependency
                .entry(dependency.clone())
                .or_default()
                .insert(entry.path.clone());
        }
        for (service_name, service) in entry.services() {
            self.by_service
                .entry(service_name.clone())
                .or_default()
                .insert(entry.path.clone());
            for method in service.methods.keys() {
                self.by_method
                    .entry(method.clone())
                    .or_default()
                    .insert((entry.path.clone(), service_name.clone()));
            }
        }
        self.by_path.insert(entry.path.clone(), entry);
    }

    fn remove(&mut self, path: &Utf8Path) {
        let Some(previous) = self.by_path.remove(path) else {
            return;
        };
        for dependency in previous.dependencies() {
            if let Some(dependents) = self.by_dependency.get_mut(dependency) {
                dependents.remove(path);
                if dependents.is_empty() {
                    self.by_dependency.remove(dependency);
                }
            }
        }
        for (service_name, service) in previous.services() {
            if let Some(paths) = self.by_service.get_mut(service_name) {
                paths.remove(path);
                if paths.is_empty() {
                    self.by_service.remove(service_name);
                }
            }
            for method in service.methods.keys() {
                if let Some(owners) = self.by_method.get_mut(method) {
                    owners.retain(|(owner, _)| owner != path);
                    if owners.is_empty() {
                        self.by_method.remove(method);
                    }
                }
            }
        }
    }

    fn matched(&self, path: &Utf8Path, service: &str) -> Option<ServiceMatch> {
        let entry = self.by_path.get(path)?;
        let descriptor = entry.services().get(service)?;
        Some(ServiceMatch {
            entry: Arc::clone(entry),
            service: Arc::clone(descriptor),
        })
    }

    fn in_file(&self, path: &Utf8Path) -> Vec<ServiceMatch> {
        self.by_path.get(path).map_or_else(Vec::new, |entry| {
            entry
                .services()
                .keys()
                .filter_map(|service| self.matched(path, service))
                .collect()
        })
    }

    fn named(&self, service: &str) -> Vec<ServiceMatch> {
        self.by_service.get(service).map_or_else(Vec::new, |paths| {
            paths
                .iter()
                .filter_map(|path| self.matched(path, service))
                .collect()
        })
    }

    fn declaring(&self, method: &str) -> Vec<ServiceMatch> {
        self.by_method.get(method).map_or_else(Vec::new, |owners| {
            owners
                .iter()
                .filter_map(|(path, service)| self.matched(path, service))
                .collect()
        })
    }

    fn everything(&self) -> Vec<ServiceMatch> {
        self.by_path
            .keys()
            .flat_map(|path| self.in_file(path))
            .collect()
    }
}

/// Thread-safe schema index.
pub struct SchemaIndex {
    loader: SchemaLoader,
    root: Utf8PathBuf,
    reporter: Arc<dyn HealthReporter>,
    state: RwLock<IndexState>,
}

impl SchemaIndex {
    /// Creates an empty index reading files below `root`.
    #[must_use]
    pub fn new(
        loader: SchemaLoader,
        root: impl Into<Utf8PathBuf>,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            loader,
            root: root.into(),
            reporter,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Parses `path` and replaces its entry.
    ///
    /// Parsing happens before the write lock is taken. On failure the
    /// previous entry, if any, stays in place.
    ///
    /// # Errors
    ///
    /// Returns the loader's [`IdlError`] when the file cannot be parsed.
    pub fn add(&self, path: &Utf8Path) -> Result<Arc<ModuleEntry>, IdlError> {
        let key = normalize_path(path);
        let location = self.root.join(&key);
        let module = match self.loader.load(location.as_std_path()) {
            Ok(module) => module,
            Err(error) => {
                self.reporter.schema_rejected(&key, &error);
                return Err(error);
            }
        };
        let dependencies = module
            .dependencies
            .iter()
            .filter_map(|dependency| self.root_relative(dependency))
            .collect();
        let entry = Arc::new(ModuleEntry {
            dependencies,
            ..ModuleEntry::new(key, module)
        });
        self.write_state().replace(Arc::clone(&entry));
        debug!(
            target: INDEX_TARGET,
            path = %entry.path(),
            services = entry.services().len(),
            "schema indexed"
        );
        self.reporter
            .schema_indexed(entry.path(), entry.services().len());
        Ok(entry)
    }

    /// Narrows the indexed services by up to three criteria.
    ///
    /// The first criterion given seeds the candidate set from its own index
    /// (path, then service name, then method name); each later criterion
    /// filters that set. With no criteria every service is returned.
    #[must_use]
    pub fn query(
        &self,
        path: Option<&Utf8Path>,
        service: Option<&str>,
        method: Option<&str>,
    ) -> Vec<ServiceMatch> {
        let state = self.read_state();
        let mut running = path.map(|file| state.in_file(&normalize_path(file)));
        if let Some(name) = service {
            running = Some(match running {
                Some(candidates) => candidates
                    .into_iter()
                    .filter(|candidate| candidate.service.name == name)
                    .collect(),
                None => state.named(name),
            });
        }
        if let Some(name) = method {
            running = Some(match running {
                Some(candidates) => candidates
                    .into_iter()
                    .filter(|candidate| candidate.service.has_method(name))
                    .collect(),
                None => state.declaring(name),
            });
        }
        running.unwrap_or_else(|| state.everything())
    }

    /// Entry for `path`, when it parsed.
    #[must_use]
    pub fn entry(&self, path: &Utf8Path) -> Option<Arc<ModuleEntry>> {
        self.read_state().by_path.get(&normalize_path(path)).cloned()
    }

    /// Every entry, sorted by path.
    #[must_use]
    pub fn entries(&self) -> Vec<Arc<ModuleEntry>> {
        self.read_state().by_path.values().cloned().collect()
    }

    /// Indexed files that include `path`, directly or transitively.
    #[must_use]
    pub fn dependents(&self, path: &Utf8Path) -> Vec<Utf8PathBuf> {
        self.read_state()
            .by_dependency
            .get(&normalize_path(path))
            .map_or_else(Vec::new, |dependents| dependents.iter().cloned().collect())
    }

    /// Number of indexed files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_state().by_path.len()
    }

    /// Whether nothing is indexed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_state().by_path.is_empty()
    }

    fn root_relative(&self, path: &Path) -> Option<Utf8PathBuf> {
        let path = Utf8Path::from_path(path)?;
        let relative = match path.strip_prefix(&self.root) {
            Ok(relative) => normalize_path(relative),
            Err(_) => {
                let root = self.root.canonicalize_utf8().ok()?;
                let resolved = path.canonicalize_utf8().ok()?;
                resolved.strip_prefix(&root).ok()?.to_path_buf()
            }
        };
        let escapes = relative.as_str().is_empty() || relative.starts_with("..");
        (!escapes).then_some(relative)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
