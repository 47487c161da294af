//! # Service Records and the Route Compiler
//!
//! A [`ServiceRecord`] owns the method records of one declaring type along
//! with the per-service aggregates built while declarations arrive:
//!
//! | Map | Key | Populated by |
//! |-----|-----|--------------|
//! | `methods` | method name | authorization declarations (and event bindings) |
//! | `routes` | [`RouteKey`] | HTTP route declarations |
//! | `events` | [`EventKey`] | event bindings (fan-out, ordered) |
//!
//! Method-level declarations go through [`MethodDeclaration`], a short-lived
//! handle that updates both the record and the service maps. Once every
//! method-level declaration is applied, [`ServiceRecord::commit`] compiles
//! the service into a [`RegistryBuilder`].
//!
//! ## Commit Semantics
//!
//! 1. Validation runs over every committable record before anything is
//!    written, so a failed commit leaves the registry untouched.
//! 2. Records are indexed under `alias.method`; their routes and events are
//!    indexed by key.
//! 3. Committing again under the same alias re-indexes the same identities
//!    and leaves every index the same size.
//! 4. Records are committed in declaration order, and each event key's
//!    handlers are appended in the order the service bound them.
//! 5. A type name belongs to one declaration per registry: a separately
//!    built record for an already committed type is rejected.

use crate::binder::{BinderFn, BindingKind, EventAdapter, HttpAdapter};
use crate::method::{ActionFilter, MethodRecord};
use crate::models::{EventKey, HttpCode, RoleOverrides, RouteError, RouteKey, Result, ServiceId, Signature};
use crate::registry::RegistryBuilder;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Everything declared about one service type.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    id: ServiceId,
    target: String,
    alias: Option<String>,
    records: BTreeMap<String, MethodRecord>,
    order: Vec<String>,
    methods: BTreeSet<String>,
    routes: BTreeMap<RouteKey, String>,
    events: BTreeMap<EventKey, Vec<String>>,
}

impl ServiceRecord {
    /// Starts an empty record for the declaring type `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            id: ServiceId::next(),
            target: target.into(),
            alias: None,
            records: BTreeMap::new(),
            order: Vec::new(),
            methods: BTreeSet::new(),
            routes: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }

    /// Identity of this declaration, shared by its method records.
    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The alias assigned at commit.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Opens (creating if needed) the record for method `name`.
    pub fn method(&mut self, name: &str) -> MethodDeclaration<'_> {
        self.ensure(name);
        MethodDeclaration {
            service: self,
            name: name.to_string(),
        }
    }

    /// Any declared record, authorized or not.
    pub fn record(&self, name: &str) -> Option<&MethodRecord> {
        self.records.get(name)
    }

    fn ensure(&mut self, name: &str) -> &mut MethodRecord {
        if !self.records.contains_key(name) {
            self.order.push(name.to_string());
        }
        let Self { id, target, records, .. } = self;
        records
            .entry(name.to_string())
            .or_insert_with(|| MethodRecord::for_service(*id, target.clone(), name))
    }

    /// Every declared record, in declaration order.
    pub fn records(&self) -> impl Iterator<Item = &MethodRecord> {
        self.order.iter().filter_map(|name| self.records.get(name))
    }

    /// Records that carry an authorization declaration.
    pub fn methods(&self) -> impl Iterator<Item = &MethodRecord> {
        self.methods.iter().filter_map(|name| self.records.get(name))
    }

    /// Per-service route map.
    pub fn routes(&self) -> impl Iterator<Item = (&RouteKey, &MethodRecord)> {
        self.routes
            .iter()
            .filter_map(|(key, name)| self.records.get(name).map(|record| (key, record)))
    }

    /// Handlers of `key` declared on this service, in declaration order.
    pub fn event_handlers(&self, key: &EventKey) -> Vec<&MethodRecord> {
        self.events
            .get(key)
            .map(|names| names.iter().filter_map(|name| self.records.get(name)).collect())
            .unwrap_or_default()
    }

    /// Event keys declared on this service.
    pub fn event_keys(&self) -> impl Iterator<Item = &EventKey> {
        self.events.keys()
    }

    /// Names of records that take part in a commit, in declaration order:
    /// every authorized method plus any method reachable through a route or
    /// event.
    fn committable(&self) -> Vec<String> {
        let mut reachable = self.methods.clone();
        reachable.extend(self.routes.values().cloned());
        reachable.extend(self.events.values().flatten().cloned());
        self.order
            .iter()
            .filter(|name| reachable.contains(*name))
            .cloned()
            .collect()
    }

    /// Compiles this service into `registry` under `alias`.
    ///
    /// # Errors
    ///
    /// - [`RouteError::AliasConflict`] if the service was already committed
    ///   under another alias.
    /// - [`RouteError::DuplicateService`] if another declaration of the same
    ///   type was already committed.
    /// - [`RouteError::DuplicateMethod`] or [`RouteError::GlobalCollision`]
    ///   if another record already owns a qualified name or route key.
    ///
    /// Nothing is written to `registry` when an error is returned.
    pub fn commit(&mut self, alias: &str, registry: &mut RegistryBuilder) -> Result<()> {
        if let Some(committed) = &self.alias {
            if committed != alias {
                return Err(RouteError::AliasConflict {
                    target: self.target.clone(),
                    committed: committed.clone(),
                    requested: alias.to_string(),
                });
            }
        }
        registry
            .check_service(&self.target, self.id)
            .inspect_err(|e| warn!("{}", e))?;

        let names = self.committable();
        for name in &names {
            let Some(record) = self.records.get(name) else {
                continue;
            };
            let qualified = format!("{}.{}", alias, name);
            registry.check_method(&qualified, record).inspect_err(|e| warn!("{}", e))?;
            for key in record.http().keys() {
                registry.check_route(key, record).inspect_err(|e| warn!("{}", e))?;
            }
        }

        self.alias = Some(alias.to_string());
        registry.claim_service(&self.target, self.id, alias);
        let mut committed = BTreeMap::new();
        for name in &names {
            if let Some(record) = self.records.get_mut(name) {
                committed.insert(name.as_str(), record.publish(alias, registry)?);
            }
        }
        for (key, handlers) in &self.events {
            for record in handlers.iter().filter_map(|name| committed.get(name.as_str())) {
                registry.index_handler(key, record);
            }
        }

        let skipped = self.records.len() - names.len();
        if skipped > 0 {
            debug!("{}: {} unreachable method records not committed", self.target, skipped);
        }
        info!(
            "Committed service {} as {} ({} methods, {} routes, {} event keys)",
            self.target,
            alias,
            names.len(),
            self.routes.len(),
            self.events.len()
        );
        Ok(())
    }
}

/// Declaration handle for one method of a [`ServiceRecord`].
///
/// Every call mutates the method record in place and keeps the service maps
/// in step with it.
///
/// # Example
///
/// ```rust
/// use switchboard_registry::{RegistryBuilder, RoleOverrides, ServiceRecord, Signature};
///
/// let mut service = ServiceRecord::new("UserService");
/// service
///     .method("get")
///     .define_signature(&Signature::new("User").param("string", "id"))
///     .add_auth("user", RoleOverrides::new().external(true))
///     .add_route("GET", "/users/:id", None, 200, None)
///     .unwrap();
///
/// let mut registry = RegistryBuilder::new();
/// service.commit("users", &mut registry).unwrap();
/// assert!(registry.registry().method("users.get").is_some());
/// ```
pub struct MethodDeclaration<'a> {
    service: &'a mut ServiceRecord,
    name: String,
}

impl<'a> MethodDeclaration<'a> {
    fn record(&mut self) -> &mut MethodRecord {
        self.service.ensure(&self.name)
    }

    /// See [`MethodRecord::define_signature`].
    pub fn define_signature(mut self, signature: &Signature) -> Self {
        self.record().define_signature(signature);
        self
    }

    /// Sets the authorization mode, merges `overrides` into the role set and
    /// lists the method in the service's `methods` map.
    pub fn add_auth(mut self, mode: &str, overrides: RoleOverrides) -> Self {
        self.record().apply_auth(mode, overrides);
        self.service.methods.insert(self.name.clone());
        self
    }

    pub fn set_query(mut self, input: Option<&str>, result: Option<&str>) -> Self {
        self.record().set_query(input, result);
        self
    }

    pub fn set_mutation(mut self, input: Option<&str>, result: Option<&str>) -> Self {
        self.record().set_mutation(input, result);
        self
    }

    pub fn set_content_type(mut self, content_type: &str) -> Self {
        self.record().set_content_type(content_type);
        self
    }

    /// See [`MethodRecord::add_binding`].
    pub fn add_binding(mut self, index: usize, kind: BindingKind, path: Option<&str>, binder: Option<BinderFn>) -> Self {
        self.record().add_binding(index, kind, path, binder);
        self
    }

    /// Binds an HTTP route to this method.
    ///
    /// # Errors
    ///
    /// - [`RouteError::DuplicateRoute`] if this method already has the key.
    /// - [`RouteError::ServiceCollision`] if another method of this service
    ///   owns the key.
    pub fn add_route(
        mut self,
        verb: &str,
        resource: &str,
        model: Option<&str>,
        code: HttpCode,
        adapter: Option<HttpAdapter>,
    ) -> Result<Self> {
        let key = RouteKey::new(verb, resource, model);
        self.record().check_route(&key)?;

        if let Some(existing) = self.service.routes.get(&key) {
            return Err(RouteError::ServiceCollision {
                route: key,
                service: self.service.target.clone(),
                existing: existing.clone(),
                method: self.name.clone(),
            });
        }

        debug!("{}.{}: route {}", self.service.target, self.name, key);
        self.service.routes.insert(key.clone(), self.name.clone());
        self.record().insert_route(key, code, adapter);
        Ok(self)
    }

    /// Binds an event trigger to this method.
    ///
    /// Forces the method to `internal` authorization with internal-only
    /// roles, lists it in `methods`, and appends it to the service's
    /// handlers for the key.
    ///
    /// # Errors
    ///
    /// [`RouteError::DuplicateEvent`] if this method already has the key.
    pub fn add_event(
        mut self,
        source: &str,
        resource: &str,
        action: impl Into<ActionFilter>,
        object: Option<&str>,
        adapter: Option<EventAdapter>,
    ) -> Result<Self> {
        let key = EventKey::new(source, resource);
        self.record().insert_event(key.clone(), action.into(), object, adapter)?;
        self.service.methods.insert(self.name.clone());

        debug!("{}.{}: event {}", self.service.target, self.name, key);
        let handlers = self.service.events.entry(key).or_default();
        if !handlers.contains(&self.name) {
            handlers.push(self.name.clone());
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Roles, WILDCARD};

    #[test]
    fn test_add_auth_registers_method() {
        let mut service = ServiceRecord::new("UserService");
        service.method("get");
        assert_eq!(service.methods().count(), 0);

        service.method("get").add_auth("user", RoleOverrides::new());
        assert_eq!(service.methods().count(), 1);
        assert_eq!(service.record("get").unwrap().auth(), Some("user"));
    }

    #[test]
    fn test_repeated_auth_merges_roles() {
        let mut service = ServiceRecord::new("UserService");
        service
            .method("get")
            .add_auth("x", RoleOverrides::new().external(true))
            .add_auth("y", RoleOverrides::new().remote(false));

        let record = service.record("get").unwrap();
        assert_eq!(record.auth(), Some("y"));
        assert_eq!(
            record.roles(),
            Some(Roles {
                internal: true,
                external: true,
                remote: false
            })
        );
    }

    #[test]
    fn test_duplicate_route_on_same_method() {
        let mut service = ServiceRecord::new("UserService");
        let err = service
            .method("list")
            .add_route("GET", "/users", None, 200, None)
            .and_then(|m| m.add_route("GET", "/users", None, 200, None))
            .err()
            .unwrap();
        assert!(matches!(err, RouteError::DuplicateRoute { .. }));
    }

    #[test]
    fn test_service_collision_between_methods() {
        let mut service = ServiceRecord::new("UserService");
        service.method("list").add_route("GET", "/users", None, 200, None).unwrap();
        let err = service
            .method("all")
            .add_route("GET", "/users", None, 200, None)
            .err()
            .unwrap();
        match err {
            RouteError::ServiceCollision { existing, method, .. } => {
                assert_eq!(existing, "list");
                assert_eq!(method, "all");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(service.record("all").unwrap().http().is_empty());
    }

    #[test]
    fn test_model_qualifier_disambiguates() {
        let mut service = ServiceRecord::new("UserService");
        service.method("list").add_route("GET", "/users", None, 200, None).unwrap();
        service
            .method("listAdmins")
            .add_route("GET", "/users", Some("Admin"), 200, None)
            .unwrap();
        assert_eq!(service.routes().count(), 2);
    }

    #[test]
    fn test_add_event_resolves_filters_and_forces_roles() {
        let mut service = ServiceRecord::new("OrderService");
        service
            .method("notify")
            .add_auth("public", RoleOverrides::new().external(true).remote(true))
            .add_event("orders", "created", true, None, None)
            .unwrap();

        let record = service.record("notify").unwrap();
        let key = EventKey::new("orders", "created");
        let route = &record.events()[&key];
        assert_eq!(key.to_string(), "orders created");
        assert_eq!(route.action_filter, "notify");
        assert_eq!(route.object_filter, WILDCARD);
        assert_eq!(record.auth(), Some("internal"));
        assert_eq!(record.roles(), Some(Roles::INTERNAL_ONLY));
        assert_eq!(service.event_handlers(&key).len(), 1);
    }

    #[test]
    fn test_duplicate_event_on_same_method() {
        let mut service = ServiceRecord::new("OrderService");
        let err = service
            .method("notify")
            .add_event("orders", "created", false, None, None)
            .and_then(|m| m.add_event("orders", "created", "other", None, None))
            .err()
            .unwrap();
        assert!(matches!(err, RouteError::DuplicateEvent { .. }));
    }

    #[test]
    fn test_event_fan_out_within_service() {
        let mut service = ServiceRecord::new("OrderService");
        service.method("notify").add_event("orders", "created", true, None, None).unwrap();
        service.method("audit").add_event("orders", "created", false, None, None).unwrap();

        let handlers = service.event_handlers(&EventKey::new("orders", "created"));
        let names: Vec<&str> = handlers.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["notify", "audit"]);
    }
}
