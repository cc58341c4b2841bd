//! Loads schema files, following their includes.

mod resolve;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::descriptor::ModuleDescriptor;
use crate::error::IdlError;
use crate::parser::parse_document;
use resolve::{Includes, file_identity, module_name, resolve_module};

const LOADER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::loader");

/// Parses schema files into [`ModuleDescriptor`]s.
///
/// Includes are searched relative to the including file first, then in each
/// configured include directory in order. Every call to [`Self::load`] starts
/// from a clean slate, so edits to included files are picked up the next time
/// an including file is loaded.
#[derive(Debug, Clone, Default)]
pub struct SchemaLoader {
    include_dirs: Vec<PathBuf>,
}

impl SchemaLoader {
    /// Builds a loader with extra include search directories.
    #[must_use]
    pub fn new<I, P>(include_dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            include_dirs: include_dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads and resolves the schema file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an [`IdlError`] when the file or one of its includes cannot be
    /// read, is not valid IDL, or references something undeclared.
    pub fn load(&self, path: &Path) -> Result<ModuleDescriptor, IdlError> {
        let source = read_source(path)?;
        self.load_source(path, &source)
    }

    /// Resolves `source` as though it had been read from `path`.
    ///
    /// # Errors
    ///
    /// As for [`Self::load`]; includes are still read from disk.
    pub fn load_source(&self, path: &Path, source: &str) -> Result<ModuleDescriptor, IdlError> {
        LoadSession {
            loader: self,
            stack: Vec::new(),
            cache: HashMap::new(),
        }
        .module(path, source)
    }

    fn locate(&self, including: &Path, include: &str) -> Option<PathBuf> {
        let base = including.parent().unwrap_or_else(|| Path::new(""));
        std::iter::once(base.join(include))
            .chain(self.include_dirs.iter().map(|dir| dir.join(include)))
            .find(|candidate| candidate.is_file())
    }
}

/// State for one top-level load: the include stack and already-resolved
/// includes shared by several files in the same tree.
struct LoadSession<'a> {
    loader: &'a SchemaLoader,
    stack: Vec<PathBuf>,
    cache: HashMap<PathBuf, Arc<ModuleDescriptor>>,
}

impl LoadSession<'_> {
    fn module(&mut self, path: &Path, source: &str) -> Result<ModuleDescriptor, IdlError> {
        let identity = file_identity(path);
        if self.stack.contains(&identity) {
            return Err(IdlError::IncludeCycle {
                path: path.to_path_buf(),
            });
        }
        let document = parse_document(source).map_err(|error| IdlError::Syntax {
            path: path.to_path_buf(),
            source: error,
        })?;

        self.stack.push(identity);
        let includes = self.includes(path, &document.includes);
        self.stack.pop();

        let module = resolve_module(module_name(path), path, &document, &includes?)?;
        debug!(
            target: LOADER_TARGET,
            path = %path.display(),
            services = module.services.len(),
            includes = module.includes.len(),
            "schema resolved"
        );
        Ok(module)
    }

    fn includes(&mut self, path: &Path, targets: &[String]) -> Result<Includes, IdlError> {
        let mut includes = Includes::new();
        let mut bound: HashMap<String, (PathBuf, &String)> = HashMap::new();
        for include in targets {
            let located =
                self.loader
                    .locate(path, include)
                    .ok_or_else(|| IdlError::IncludeNotFound {
                        path: path.to_path_buf(),
                        include: include.clone(),
                    })?;
            let identity = file_identity(&located);
            let namespace = module_name(Path::new(include));
            if let Some((first_identity, first)) = bound.get(&namespace) {
                if *first_identity == identity {
                    continue;
                }
                return Err(IdlError::IncludeNameClash {
                    path: path.to_path_buf(),
                    namespace,
                    first: (*first).clone(),
                    second: include.clone(),
                });
            }
            bound.insert(namespace.clone(), (identity.clone(), include));
            let module = match self.cache.get(&identity) {
                Some(cached) => Arc::clone(cached),
                None => {
                    let source = read_source(&located)?;
                    let loaded = Arc::new(self.module(&located, &source)?);
                    self.cache.insert(identity, Arc::clone(&loaded));
                    loaded
                }
            };
            includes.insert(namespace, module);
        }
        Ok(includes)
    }
}

fn read_source(path: &Path) -> Result<String, IdlError> {
    fs::read_to_string(path).map_err(|error| IdlError::Io {
        path: path.to_path_buf(),
        source: Arc::new(error),
    })
}
