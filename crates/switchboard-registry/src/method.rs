//! # Method Records
//!
//! A [`MethodRecord`] accumulates everything declared about one service
//! method: signature design, authorization, GraphQL shape, HTTP routes,
//! event bindings and the argument binding table. Declarations may arrive
//! in any order; each one mutates the record in place.
//!
//! Declarations that also touch the owning service (authorization, routes,
//! events) go through [`crate::service::MethodDeclaration`]. This module
//! holds the record-local half of each operation plus the commit step that
//! indexes a finished record into a [`RegistryBuilder`].
//!
//! ## Guards
//!
//! - The design freezes once a terminal return descriptor is present.
//! - A route or event key may appear only once per record.
//! - Any event binding pins the record to internal-only roles.

use crate::binder::{bind_arguments, BindResult, BinderFn, Binding, BindingKind, CallContext, EventAdapter, EventRequest, HttpAdapter, HttpRequest};
use crate::models::{
    CallOrigin, Design, EventKey, GraphRef, HttpCode, MethodId, ParamDescriptor, ReturnDescriptor, RoleOverrides,
    RouteError, RouteKey, Roles, Result, ServiceId, Signature, INTERNAL_AUTH, WILDCARD,
};
use crate::registry::RegistryBuilder;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Requested action filter for an event binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionFilter {
    /// Match actions named after the handling method.
    Auto,
    /// Match one named action.
    Named(String),
    /// Match every action.
    Any,
}

impl ActionFilter {
    fn resolve(&self, method: &str) -> String {
        match self {
            ActionFilter::Auto => method.to_string(),
            ActionFilter::Named(action) if !action.is_empty() => action.clone(),
            _ => WILDCARD.to_string(),
        }
    }
}

impl From<bool> for ActionFilter {
    fn from(auto: bool) -> Self {
        if auto {
            ActionFilter::Auto
        } else {
            ActionFilter::Any
        }
    }
}

impl From<&str> for ActionFilter {
    fn from(action: &str) -> Self {
        ActionFilter::Named(action.to_string())
    }
}

impl From<Option<&str>> for ActionFilter {
    fn from(action: Option<&str>) -> Self {
        action.map_or(ActionFilter::Any, ActionFilter::from)
    }
}

/// An HTTP route bound to a method.
#[derive(Clone)]
pub struct HttpRoute {
    pub key: RouteKey,
    pub method: MethodId,
    /// Service alias, set at commit.
    pub service: Option<String>,
    pub code: HttpCode,
    pub adapter: Option<HttpAdapter>,
}

impl fmt::Debug for HttpRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRoute")
            .field("key", &self.key.to_string())
            .field("method", &self.method)
            .field("service", &self.service)
            .field("code", &self.code)
            .field("adapter", &self.adapter.is_some())
            .finish()
    }
}

/// An event trigger bound to a method.
#[derive(Clone)]
pub struct EventRoute {
    pub key: EventKey,
    pub method: MethodId,
    /// Service alias, set at commit.
    pub service: Option<String>,
    pub action_filter: String,
    pub object_filter: String,
    pub adapter: Option<EventAdapter>,
}

impl EventRoute {
    /// True when both filters accept the event.
    pub fn matches(&self, action: &str, object: &str) -> bool {
        (self.action_filter == WILDCARD || self.action_filter == action)
            && (self.object_filter == WILDCARD || self.object_filter == object)
    }
}

impl fmt::Debug for EventRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRoute")
            .field("key", &self.key.to_string())
            .field("method", &self.method)
            .field("service", &self.service)
            .field("action_filter", &self.action_filter)
            .field("object_filter", &self.object_filter)
            .field("adapter", &self.adapter.is_some())
            .finish()
    }
}

/// Everything declared about one service method.
#[derive(Debug, Clone)]
pub struct MethodRecord {
    id: MethodId,
    owner: ServiceId,
    service: Option<String>,
    design: Design,
    auth: Option<String>,
    roles: Option<Roles>,
    query: bool,
    mutation: bool,
    input: Option<GraphRef>,
    result: Option<GraphRef>,
    content_type: Option<String>,
    bindings: Vec<Option<Binding>>,
    http: BTreeMap<RouteKey, HttpRoute>,
    events: BTreeMap<EventKey, EventRoute>,
}

impl MethodRecord {
    /// A standalone record with its own declaration identity.
    pub fn new(target: impl Into<String>, name: impl Into<String>) -> Self {
        Self::for_service(ServiceId::next(), target, name)
    }

    pub(crate) fn for_service(owner: ServiceId, target: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: MethodId::new(target, name),
            owner,
            service: None,
            design: Design::default(),
            auth: None,
            roles: None,
            query: false,
            mutation: false,
            input: None,
            result: None,
            content_type: None,
            bindings: Vec::new(),
            http: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &MethodId {
        &self.id
    }

    /// The service declaration this record belongs to.
    pub fn owner(&self) -> ServiceId {
        self.owner
    }

    /// True if both records come from the same declaration of the same method.
    pub fn same_declaration(&self, other: &MethodRecord) -> bool {
        self.owner == other.owner && self.id == other.id
    }

    /// Name of the declaring service type.
    pub fn target(&self) -> &str {
        &self.id.target
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// Service alias, once committed.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// `alias.name`, once committed.
    pub fn qualified_name(&self) -> Option<String> {
        self.service.as_ref().map(|alias| format!("{}.{}", alias, self.id.name))
    }

    pub fn design(&self) -> &Design {
        &self.design
    }

    pub fn auth(&self) -> Option<&str> {
        self.auth.as_deref()
    }

    /// Declared roles, if any authorization was declared.
    pub fn roles(&self) -> Option<Roles> {
        self.roles
    }

    /// Declared roles, or the defaults when nothing was declared.
    pub fn effective_roles(&self) -> Roles {
        self.roles.unwrap_or_default()
    }

    /// True if a caller of `origin` may invoke this method.
    pub fn permits(&self, origin: CallOrigin) -> bool {
        self.effective_roles().permits(origin)
    }

    pub fn is_query(&self) -> bool {
        self.query
    }

    pub fn is_mutation(&self) -> bool {
        self.mutation
    }

    pub fn input(&self) -> Option<&GraphRef> {
        self.input.as_ref()
    }

    pub fn result(&self) -> Option<&GraphRef> {
        self.result.as_ref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn bindings(&self) -> &[Option<Binding>] {
        &self.bindings
    }

    pub fn http(&self) -> &BTreeMap<RouteKey, HttpRoute> {
        &self.http
    }

    pub fn events(&self) -> &BTreeMap<EventKey, EventRoute> {
        &self.events
    }

    /// Builds the argument list for an HTTP call to this method.
    ///
    /// Uses the route's adapter when one is registered under `route`,
    /// otherwise the per-position binding table.
    pub fn bind_http(&self, route: Option<&RouteKey>, ctx: &CallContext, req: &HttpRequest) -> BindResult<Vec<Option<Value>>> {
        if let Some(adapter) = route.and_then(|key| self.http.get(key)).and_then(|r| r.adapter.as_ref()) {
            return adapter(ctx, req);
        }
        bind_arguments(&self.bindings, self.design.params.len(), ctx, req)
    }

    /// Records the method signature.
    ///
    /// A no-op once the design is frozen. A named signature freezes the
    /// design; a type-only one leaves it open for a later named pass.
    pub fn define_signature(&mut self, signature: &Signature) -> &mut Self {
        if self.design.is_frozen() {
            return self;
        }

        let names = signature.names.as_deref().unwrap_or_default();
        self.design.params = signature
            .params
            .iter()
            .enumerate()
            .map(|(i, type_name)| ParamDescriptor {
                name: names.get(i).cloned(),
                type_name: type_name.clone(),
            })
            .collect();
        self.design.returns = Some(ReturnDescriptor {
            type_name: signature.returns.clone(),
            terminal: signature.is_named(),
        });
        self
    }

    pub fn set_query(&mut self, input: Option<&str>, result: Option<&str>) -> &mut Self {
        self.query = true;
        self.input = Some(GraphRef::resolve(input));
        self.result = Some(GraphRef::resolve(result));
        self
    }

    pub fn set_mutation(&mut self, input: Option<&str>, result: Option<&str>) -> &mut Self {
        self.mutation = true;
        self.input = Some(GraphRef::resolve(input));
        self.result = Some(GraphRef::resolve(result));
        self
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the binding at `index`, keeping any path or resolver already
    /// stored there when the new declaration omits it.
    pub fn add_binding(&mut self, index: usize, kind: BindingKind, path: Option<&str>, binder: Option<BinderFn>) -> &mut Self {
        if self.bindings.len() <= index {
            self.bindings.resize(index + 1, None);
        }
        let slot = &mut self.bindings[index];
        let (prior_path, prior_binder) = match slot.take() {
            Some(prior) => (prior.path, prior.binder),
            None => (None, None),
        };
        *slot = Some(Binding {
            kind,
            path: path.map(str::to_string).or(prior_path),
            binder: binder.or(prior_binder),
        });
        self
    }

    pub(crate) fn apply_auth(&mut self, mode: &str, overrides: RoleOverrides) {
        self.auth = Some(mode.to_string());
        self.roles = Some(Roles::merge(self.roles, overrides));
    }

    pub(crate) fn check_route(&self, key: &RouteKey) -> Result<()> {
        if self.http.contains_key(key) {
            return Err(RouteError::DuplicateRoute {
                route: key.clone(),
                method: self.id.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn insert_route(&mut self, key: RouteKey, code: HttpCode, adapter: Option<HttpAdapter>) {
        let route = HttpRoute {
            key: key.clone(),
            method: self.id.clone(),
            service: self.service.clone(),
            code,
            adapter,
        };
        self.http.insert(key, route);
    }

    /// Stores an event binding and pins the record to internal-only roles.
    pub(crate) fn insert_event(
        &mut self,
        key: EventKey,
        action: ActionFilter,
        object: Option<&str>,
        adapter: Option<EventAdapter>,
    ) -> Result<()> {
        if self.events.contains_key(&key) {
            return Err(RouteError::DuplicateEvent {
                event: key,
                method: self.id.clone(),
            });
        }

        let route = EventRoute {
            key: key.clone(),
            method: self.id.clone(),
            service: self.service.clone(),
            action_filter: action.resolve(&self.id.name),
            object_filter: object.filter(|o| !o.is_empty()).unwrap_or(WILDCARD).to_string(),
            adapter,
        };
        self.events.insert(key, route);
        self.apply_auth(INTERNAL_AUTH, Roles::INTERNAL_ONLY.into());
        Ok(())
    }

    /// Indexes this record into `registry` under `alias`.
    ///
    /// Fails if `alias.name` or any of the record's route keys is already
    /// owned by a different record. Re-committing the same record replaces
    /// its earlier entries without growing any index.
    pub fn commit(&mut self, alias: &str, registry: &mut RegistryBuilder) -> Result<Arc<MethodRecord>> {
        let shared = self.publish(alias, registry)?;
        for key in shared.events().keys() {
            registry.index_handler(key, &shared);
        }
        Ok(shared)
    }

    /// Checks, stamps and indexes the record's name and routes. Event
    /// handler lists are left to the caller.
    pub(crate) fn publish(&mut self, alias: &str, registry: &mut RegistryBuilder) -> Result<Arc<MethodRecord>> {
        let qualified = format!("{}.{}", alias, self.id.name);
        registry.check_method(&qualified, self)?;
        for key in self.http.keys() {
            registry.check_route(key, self)?;
        }

        self.service = Some(alias.to_string());
        for route in self.http.values_mut() {
            route.service = Some(alias.to_string());
        }
        for event in self.events.values_mut() {
            event.service = Some(alias.to_string());
        }

        let shared = Arc::new(self.clone());
        registry.index(qualified, Arc::clone(&shared));
        debug!(
            "Committed {} ({} routes, {} events)",
            self.id,
            self.http.len(),
            self.events.len()
        );
        Ok(shared)
    }
}

/// Event adapters receive the event itself; without an adapter the handler
/// gets the event as its single argument.
pub fn bind_event(route: &EventRoute, ctx: &CallContext, event: &EventRequest) -> BindResult<Vec<Option<Value>>> {
    match &route.adapter {
        Some(adapter) => adapter(ctx, event),
        None => Ok(vec![Some(serde_json::to_value(event)?)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::binder;
    use serde_json::json;

    #[test]
    fn test_signature_named_freezes_design() {
        let mut record = MethodRecord::new("UserService", "get");
        record.define_signature(&Signature::new("User").param("string", "id"));
        assert!(record.design().is_frozen());

        record.define_signature(&Signature::new("Other").param("number", "x").param("number", "y"));
        assert_eq!(record.design().params.len(), 1);
        assert_eq!(record.design().params[0].name.as_deref(), Some("id"));
        assert_eq!(record.design().returns.as_ref().unwrap().type_name, "User");
    }

    #[test]
    fn test_type_only_signature_stays_open() {
        let mut record = MethodRecord::new("UserService", "get");
        record.define_signature(&Signature::typed(vec!["string".into()], "User"));
        assert!(!record.design().is_frozen());
        assert_eq!(record.design().params[0].name, None);

        record.define_signature(&Signature::new("User").param("string", "id"));
        assert!(record.design().is_frozen());
        assert_eq!(record.design().params[0].name.as_deref(), Some("id"));
    }

    #[test]
    fn test_query_and_mutation_refs() {
        let mut record = MethodRecord::new("UserService", "find");
        record.set_query(Some("UserFilter"), None);
        assert!(record.is_query());
        assert!(!record.is_mutation());
        assert_eq!(
            record.input(),
            Some(&GraphRef::Ref {
                target: "UserFilter".to_string()
            })
        );
        assert_eq!(record.result(), Some(&GraphRef::Any));

        let mut record = MethodRecord::new("UserService", "create");
        record.set_mutation(None, Some("User")).set_content_type("application/json");
        assert!(record.is_mutation());
        assert_eq!(record.input(), Some(&GraphRef::Any));
        assert_eq!(record.content_type(), Some("application/json"));
    }

    #[test]
    fn test_add_binding_merges_fields() {
        let mut record = MethodRecord::new("UserService", "get");
        record.add_binding(2, BindingKind::PathParam, Some("id"), None);
        record.add_binding(2, BindingKind::PathParam, None, Some(binder(|_, _| Ok(json!(7)))));

        let bindings = record.bindings();
        assert_eq!(bindings.len(), 3);
        assert!(bindings[0].is_none());
        let binding = bindings[2].as_ref().unwrap();
        assert_eq!(binding.path.as_deref(), Some("id"));
        assert!(binding.binder.is_some());
    }

    #[test]
    fn test_action_filter_resolution() {
        assert_eq!(ActionFilter::from(true).resolve("notify"), "notify");
        assert_eq!(ActionFilter::from(false).resolve("notify"), "*");
        assert_eq!(ActionFilter::from("shipped").resolve("notify"), "shipped");
        assert_eq!(ActionFilter::from("").resolve("notify"), "*");
        assert_eq!(ActionFilter::from(None).resolve("notify"), "*");
    }

    #[test]
    fn test_event_filter_matching() {
        let mut record = MethodRecord::new("OrderService", "notify");
        record
            .insert_event(EventKey::new("orders", "created"), ActionFilter::Auto, Some("invoice"), None)
            .unwrap();
        let route = &record.events()[&EventKey::new("orders", "created")];
        assert!(route.matches("notify", "invoice"));
        assert!(!route.matches("notify", "receipt"));
        assert!(!route.matches("cancel", "invoice"));
    }

    #[test]
    fn test_bind_http_prefers_adapter() {
        let mut record = MethodRecord::new("UserService", "get");
        record.define_signature(&Signature::new("User").param("string", "id"));
        record.add_binding(0, BindingKind::PathParam, Some("id"), None);

        let plain = RouteKey::new("GET", "/users/:id", None);
        let adapted = RouteKey::new("GET", "/users/:id", Some("Raw"));
        record.insert_route(plain.clone(), 200, None);
        record.insert_route(
            adapted.clone(),
            200,
            Some(Arc::new(|_: &CallContext, req: &HttpRequest| -> BindResult<Vec<Option<Value>>> {
                Ok(vec![Some(req.body.clone())])
            })),
        );

        let ctx = CallContext::new("r", CallOrigin::External);
        let req = HttpRequest::new("GET", "/users/7")
            .with_path_param("id", "7")
            .with_body(json!({"raw": true}));

        assert_eq!(record.bind_http(Some(&plain), &ctx, &req).unwrap(), vec![Some(json!("7"))]);
        assert_eq!(
            record.bind_http(Some(&adapted), &ctx, &req).unwrap(),
            vec![Some(json!({"raw": true}))]
        );
    }
}
