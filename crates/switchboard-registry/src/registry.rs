//! # Registry - Global Routing Tables
//!
//! The registry holds the three process-wide indices a dispatcher reads at
//! request time:
//!
//! | Index | Key | Value | Constraint |
//! |-------|-----|-------|------------|
//! | methods | `alias.method` | one record | unique |
//! | routes | [`RouteKey`] | one record | globally unique |
//! | events | [`EventKey`] | ordered records | each record once per key |
//!
//! ## Lifecycle
//!
//! ```text
//!   startup (single writer)                 serving (many readers)
//!  ┌──────────────────────┐   freeze()    ┌──────────────────────┐
//!  │   RegistryBuilder    │──────────────▶│       Registry       │
//!  │  commit / validate   │               │  lookups, snapshot   │
//!  └──────────────────────┘               └──────────────────────┘
//! ```
//!
//! Only [`RegistryBuilder`] can write. Freezing consumes the builder, so no
//! registration is possible once the [`Registry`] is handed to readers. The
//! frozen registry is `Send + Sync` and is shared behind an `Arc` without
//! locking.

use crate::binder::BindingKind;
use crate::canonicalize::hash_canonical;
use crate::method::MethodRecord;
use crate::models::{
    Design, EventKey, GraphRef, Hash, HttpCode, ParamDescriptor, RouteError, RouteKey, Roles, Result, ServiceId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Read-only routing tables.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    methods: BTreeMap<String, Arc<MethodRecord>>,
    routes: BTreeMap<RouteKey, Arc<MethodRecord>>,
    events: BTreeMap<EventKey, Vec<Arc<MethodRecord>>>,
}

impl Registry {
    /// Looks up a method by `alias.method`.
    pub fn method(&self, qualified: &str) -> Option<&Arc<MethodRecord>> {
        self.methods.get(qualified)
    }

    /// Looks up the single owner of a route key.
    pub fn route(&self, key: &RouteKey) -> Option<&Arc<MethodRecord>> {
        self.routes.get(key)
    }

    /// All handlers of an event key, in commit order.
    pub fn handlers(&self, key: &EventKey) -> &[Arc<MethodRecord>] {
        self.events.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn methods(&self) -> impl Iterator<Item = (&str, &Arc<MethodRecord>)> {
        self.methods.iter().map(|(name, record)| (name.as_str(), record))
    }

    pub fn routes(&self) -> impl Iterator<Item = (&RouteKey, &Arc<MethodRecord>)> {
        self.routes.iter()
    }

    pub fn events(&self) -> impl Iterator<Item = (&EventKey, &[Arc<MethodRecord>])> {
        self.events.iter().map(|(key, list)| (key, list.as_slice()))
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn event_key_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.routes.is_empty() && self.events.is_empty()
    }

    /// Serializable view of every table, for schema and codegen consumers.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let qualified = |record: &MethodRecord| {
            record
                .qualified_name()
                .unwrap_or_else(|| record.id().to_string())
        };

        let methods = self
            .methods
            .iter()
            .map(|(name, record)| (name.clone(), MethodSummary::from(record.as_ref())))
            .collect();

        let routes = self
            .routes
            .iter()
            .map(|(key, record)| {
                let code = record.http().get(key).map(|r| r.code).unwrap_or_default();
                (
                    key.to_string(),
                    RouteSummary {
                        method: qualified(record),
                        code,
                    },
                )
            })
            .collect();

        let events = self
            .events
            .iter()
            .map(|(key, records)| {
                let handlers = records
                    .iter()
                    .filter_map(|record| {
                        record.events().get(key).map(|route| EventSummary {
                            method: qualified(record),
                            action_filter: route.action_filter.clone(),
                            object_filter: route.object_filter.clone(),
                        })
                    })
                    .collect();
                (key.to_string(), handlers)
            })
            .collect();

        RegistrySnapshot {
            methods,
            routes,
            events,
        }
    }

    /// SHA-256 over the canonical JSON form of [`Registry::snapshot`].
    ///
    /// Two registries built from the same declarations have the same
    /// fingerprint regardless of the order declarations were applied in.
    pub fn fingerprint(&self) -> std::result::Result<Hash, serde_json::Error> {
        let value = serde_json::to_value(self.snapshot())?;
        Ok(hash_canonical(&value))
    }
}

/// Single-writer handle used during startup.
///
/// Besides the tables it remembers which declaration committed each service
/// type, so a second declaration of the same type cannot take over names or
/// routes that only differ from the first by identity.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
    services: BTreeMap<String, (ServiceId, String)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the tables built so far.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Ends the write phase.
    pub fn freeze(self) -> Registry {
        debug!(
            "Registry frozen: {} methods, {} routes, {} event keys",
            self.registry.method_count(),
            self.registry.route_count(),
            self.registry.event_key_count()
        );
        self.registry
    }

    /// Fails if `target` was committed by a declaration other than `owner`.
    pub(crate) fn check_service(&self, target: &str, owner: ServiceId) -> Result<()> {
        match self.services.get(target) {
            Some((existing, alias)) if *existing != owner => Err(RouteError::DuplicateService {
                target: target.to_string(),
                committed: alias.clone(),
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn claim_service(&mut self, target: &str, owner: ServiceId, alias: &str) {
        self.services
            .insert(target.to_string(), (owner, alias.to_string()));
    }

    /// Fails if `qualified` is bound to a record other than `record`.
    pub(crate) fn check_method(&self, qualified: &str, record: &MethodRecord) -> Result<()> {
        match self.registry.methods.get(qualified) {
            Some(existing) if !existing.same_declaration(record) => Err(RouteError::DuplicateMethod {
                qualified: qualified.to_string(),
                existing: existing.id().clone(),
                method: record.id().clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Fails if `key` is owned by a record other than `record`.
    pub(crate) fn check_route(&self, key: &RouteKey, record: &MethodRecord) -> Result<()> {
        match self.registry.routes.get(key) {
            Some(existing) if !existing.same_declaration(record) => Err(RouteError::GlobalCollision {
                route: key.clone(),
                existing: existing.id().clone(),
                method: record.id().clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Writes a validated record into the method and route indices.
    ///
    /// An entry for the same declaration is replaced in place, so indexing a
    /// record twice never grows an index.
    pub(crate) fn index(&mut self, qualified: String, record: Arc<MethodRecord>) {
        for key in record.http().keys() {
            debug!("route {} -> {}", key, qualified);
            self.registry.routes.insert(key.clone(), Arc::clone(&record));
        }
        self.registry.methods.insert(qualified, record);
    }

    /// Appends `record` to the handlers of `key`, or replaces its earlier
    /// entry in place.
    pub(crate) fn index_handler(&mut self, key: &EventKey, record: &Arc<MethodRecord>) {
        let handlers = self.registry.events.entry(key.clone()).or_default();
        match handlers.iter_mut().find(|h| h.same_declaration(record)) {
            Some(slot) => *slot = Arc::clone(record),
            None => {
                debug!("event {} -> {}", key, record.id());
                handlers.push(Arc::clone(record));
            }
        }
    }
}

/// Serializable form of the committed tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub methods: BTreeMap<String, MethodSummary>,
    pub routes: BTreeMap<String, RouteSummary>,
    pub events: BTreeMap<String, Vec<EventSummary>>,
}

/// Committed shape of one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSummary {
    pub target: String,
    pub auth: Option<String>,
    pub roles: Roles,
    pub query: bool,
    pub mutation: bool,
    pub input: Option<GraphRef>,
    pub result: Option<GraphRef>,
    pub content_type: Option<String>,
    pub params: Vec<ParamDescriptor>,
    pub returns: Option<String>,
    pub bindings: Vec<Option<BindingSummary>>,
}

impl From<&MethodRecord> for MethodSummary {
    fn from(record: &MethodRecord) -> Self {
        let Design { params, returns } = record.design().clone();
        Self {
            target: record.target().to_string(),
            auth: record.auth().map(str::to_string),
            roles: record.effective_roles(),
            query: record.is_query(),
            mutation: record.is_mutation(),
            input: record.input().cloned(),
            result: record.result().cloned(),
            content_type: record.content_type().map(str::to_string),
            params,
            returns: returns.map(|r| r.type_name),
            bindings: record
                .bindings()
                .iter()
                .map(|slot| {
                    slot.as_ref().map(|b| BindingSummary {
                        kind: b.kind,
                        path: b.path.clone(),
                        custom: b.binder.is_some(),
                    })
                })
                .collect(),
        }
    }
}

/// One entry of a method's binding table, without the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSummary {
    pub kind: BindingKind,
    pub path: Option<String>,
    pub custom: bool,
}

/// Owner of one route key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub method: String,
    pub code: HttpCode,
}

/// One handler of an event key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub method: String,
    pub action_filter: String,
    pub object_filter: String,
}
