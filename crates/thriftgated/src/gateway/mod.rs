//! The call dispatcher: resolves requests against the schema index and
//! translates calls, listings, and samples.
//!
//! A [`Gateway`] is built once at bootstrap and shared by every worker. It
//! holds no per-connection state; upstream connections live in the
//! [`ConnectionCache`] each worker passes to [`Gateway::call`].
//!
//! File and service patterns are either a literal name or [`WILDCARD`]. A
//! wildcard service still resolves when the file declares exactly one
//! service.

mod call;
mod errors;

use std::collections::BTreeSet;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value, json};
use thriftgate_codec::{encode_struct, generate_sample};
use thriftgate_idl::MethodDescriptor;
use tracing::debug;

pub use self::call::{CallRequest, CallResponse, FailureKind};
pub use self::errors::GatewayError;
use crate::connection::ConnectionCache;
use crate::crawler::FileMonitor;
use crate::index::{ModuleEntry, SchemaIndex, ServiceMatch};

/// Pattern that matches every file or service.
pub const WILDCARD: &str = "*";

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// A request narrowed to one method of one service.
#[derive(Debug, Clone)]
pub struct Resolved {
    entry: Arc<ModuleEntry>,
    service: String,
    method: MethodDescriptor,
}

impl Resolved {
    /// Module declaring the service.
    #[must_use]
    pub fn entry(&self) -> &Arc<ModuleEntry> {
        &self.entry
    }

    /// Service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The method to call.
    #[must_use]
    pub const fn method(&self) -> &MethodDescriptor {
        &self.method
    }
}

/// Shared dispatcher state.
pub struct Gateway {
    monitor: Arc<FileMonitor>,
    index: Arc<SchemaIndex>,
}

impl Gateway {
    /// Builds a gateway over a monitor and an index of the same root.
    #[must_use]
    pub const fn new(monitor: Arc<FileMonitor>, index: Arc<SchemaIndex>) -> Self {
        Self { monitor, index }
    }

    /// Schema file tracker.
    #[must_use]
    pub const fn monitor(&self) -> &Arc<FileMonitor> {
        &self.monitor
    }

    /// Schema index.
    #[must_use]
    pub const fn index(&self) -> &Arc<SchemaIndex> {
        &self.index
    }

    /// Re-indexes files whose change flag is set, together with every
    /// indexed file that includes one of them.
    ///
    /// [`WILDCARD`] checks every tracked file and returns `None`. A literal
    /// file is checked along with its recorded includes, and its
    /// root-relative key is returned.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] when a literal file is not a
    /// schema file below the root.
    pub fn refresh(&self, file: &str) -> Result<Option<Utf8PathBuf>, GatewayError> {
        if file == WILDCARD {
            self.refresh_all();
            return Ok(None);
        }
        let missing = || GatewayError::not_found(format!("schema file '{file}' not found"));
        let key = self.monitor.key(Utf8Path::new(file)).ok_or_else(missing)?;
        if !self.monitor.contains(&key) {
            return Err(missing());
        }
        let mut stale = BTreeSet::new();
        self.consume(&key, &mut stale);
        if let Some(entry) = self.index.entry(&key) {
            for dependency in entry.dependencies() {
                self.consume(dependency, &mut stale);
            }
        }
        self.reindex_all(&stale);
        Ok(Some(key))
    }

    /// Re-indexes every tracked file whose change flag is set, plus the
    /// files including them, and returns how many were re-read.
    pub fn refresh_all(&self) -> usize {
        let mut stale = BTreeSet::new();
        for path in self.monitor.known() {
            self.consume(&path, &mut stale);
        }
        self.reindex_all(&stale);
        stale.len()
    }

    /// Narrows `(file, service, method)` to exactly one method.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NotFound`] when nothing matches or the method is
    /// missing, [`GatewayError::Ambiguous`] when several services match.
    pub fn resolve(
        &self,
        file: &str,
        service: &str,
        method: &str,
    ) -> Result<Resolved, GatewayError> {
        let path = self.refresh(file)?;
        let entry = path.as_deref().map(|key| self.parsed(key)).transpose()?;
        let service_filter = (service != WILDCARD).then_some(service);

        if let (Some(entry), None) = (&entry, service_filter)
            && let Some((name, only)) = entry.services().first()
            && entry.services().len() == 1
        {
            let descriptor = only.method(method).ok_or_else(|| {
                GatewayError::not_found(format!(
                    "method '{method}' not found in service '{name}' of '{}'",
                    entry.path()
                ))
            })?;
            return Ok(Resolved {
                entry: Arc::clone(entry),
                service: name.clone(),
                method: descriptor.clone(),
            });
        }

        let matches = self
            .index
            .query(path.as_deref(), service_filter, Some(method));
        match <[ServiceMatch; 1]>::try_from(matches) {
            Ok([found]) => {
                let descriptor = found.service().method(method).ok_or_else(|| {
                    GatewayError::not_found(format!("method '{method}' not found"))
                })?;
                Ok(Resolved {
                    service: found.service().name.clone(),
                    method: descriptor.clone(),
                    entry: Arc::clone(found.entry()),
                })
            }
            Err(candidates) if candidates.is_empty() => Err(GatewayError::not_found(format!(
                "no service matches {file}:{service}:{method}"
            ))),
            Err(candidates) => Err(GatewayError::Ambiguous {
                method: method.to_owned(),
                candidates: candidates
                    .iter()
                    .map(|found| format!("{}:{}", found.entry().path(), found.service().name))
                    .collect(),
            }),
        }
    }

    /// Dispatches one call using the worker's connection cache.
    ///
    /// # Errors
    ///
    /// Only [`GatewayError::NotFound`]; every other failure is returned as
    /// a [`CallResponse::Failure`] payload.
    pub fn call(
        &self,
        connections: &mut ConnectionCache,
        request: &CallRequest,
    ) -> Result<CallResponse, GatewayError> {
        match self.resolve(&request.file, &request.service, &request.method) {
            Ok(resolved) => Ok(call::dispatch(connections, &resolved, request)),
            Err(error @ GatewayError::Ambiguous { .. }) => {
                debug!(target: DISPATCH_TARGET, %error, "ambiguous call");
                Ok(CallResponse::failure(FailureKind::Ambiguous, error.to_string()))
            }
            Err(error) => Err(error),
        }
    }

    /// Lists services and method names of every parsed file, or of one.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] when a literal file is unknown or
    /// failed to parse.
    pub fn list_services(&self, file: Option<&str>) -> Result<Value, GatewayError> {
        let entries = match self.refresh(file.unwrap_or(WILDCARD))? {
            Some(path) => vec![self.parsed(&path)?],
            None => self.index.entries(),
        };
        let listed: Vec<Value> = entries.iter().map(|entry| describe(entry)).collect();
        Ok(json!({ "services": listed }))
    }

    /// Generates sample `args` and `result` payloads for one method.
    ///
    /// # Errors
    ///
    /// As for [`Self::resolve`], plus [`GatewayError::Conversion`] when a
    /// sample cannot be rendered.
    pub fn sample(&self, file: &str, service: &str, method: &str) -> Result<Value, GatewayError> {
        let resolved = self.resolve(file, service, method)?;
        let types = resolved.entry.types();
        let spec = &resolved.method;
        let args = generate_sample(&spec.args, types)?;
        let result = generate_sample(&spec.result, types)?;
        Ok(json!({
            "args": encode_struct(&args, &spec.args, types)?,
            "result": encode_struct(&result, &spec.result, types)?,
        }))
    }

    fn parsed(&self, path: &Utf8Path) -> Result<Arc<ModuleEntry>, GatewayError> {
        self.index
            .entry(path)
            .ok_or_else(|| GatewayError::not_found(format!("schema file '{path}' did not parse")))
    }

    /// Clears the change flag of `path`; when it was set, queues the file
    /// and its dependents for re-indexing.
    fn consume(&self, path: &Utf8Path, stale: &mut BTreeSet<Utf8PathBuf>) {
        if self.monitor.take_changed(path).unwrap_or(false) {
            stale.insert(path.to_path_buf());
            stale.extend(self.index.dependents(path));
        }
    }

    fn reindex_all(&self, stale: &BTreeSet<Utf8PathBuf>) {
        for path in stale {
            self.reindex(path);
        }
    }

    fn reindex(&self, path: &Utf8Path) {
        if let Err(error) = self.index.add(path) {
            debug!(target: DISPATCH_TARGET, %path, %error, "keeping previous schema");
        }
    }
}

fn describe(entry: &ModuleEntry) -> Value {
    let services: Map<String, Value> = entry
        .services()
        .iter()
        .map(|(name, service)| {
            let methods = service
                .methods
                .keys()
                .map(|method| json!({ "method": method }))
                .collect();
            (name.clone(), Value::Array(methods))
        })
        .collect();
    json!({
        "path": entry.path().as_str(),
        "services": services,
    })
}
