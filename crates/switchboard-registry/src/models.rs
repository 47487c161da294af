//! # Core Data Models for the Route Registry
//!
//! This module defines the value types shared by every stage of the registry:
//! method identities, route and event keys, role sets, signature descriptors,
//! graph type references, and the declaration-time error taxonomy.
//!
//! ## Key Formats
//!
//! | Key | Serialized form | Uniqueness |
//! |-----|-----------------|------------|
//! | [`MethodId`] | `Type.method` | one record per declaring type and method |
//! | [`RouteKey`] | `VERB resource` or `VERB resource:model` | global |
//! | [`EventKey`] | `source resource` | none (fan-out) |
//!
//! ## Role Defaults
//!
//! Unset role flags resolve to `Internal = true`, `External = false`,
//! `Remote = true`. Each flag falls back to its own prior value before the
//! default, so repeated authorization declarations overlay only the flags
//! they name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// SHA-256 digest size in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; HASH_SIZE];

/// HTTP status code reported on a successful call.
pub type HttpCode = u16;

/// Filter value that matches any action or object.
pub const WILDCARD: &str = "*";

/// Authorization mode forced onto every event handler.
pub const INTERNAL_AUTH: &str = "internal";

/// Identity of a method record: the declaring type plus the method name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodId {
    /// Name of the declaring service type.
    pub target: String,

    /// Method name on that type.
    pub name: String,
}

impl MethodId {
    pub fn new(target: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.name)
    }
}

/// Identity of one service declaration.
///
/// Two records built separately for the same type name are different
/// declarations; clones of one record share its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(u64);

impl ServiceId {
    /// Allocates a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ServiceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Key identifying an HTTP-reachable method.
///
/// Serialized as `"VERB resource"`, or `"VERB resource:model"` when a model
/// qualifier disambiguates routes sharing a verb and resource.
///
/// # Example
///
/// ```rust
/// use switchboard_registry::RouteKey;
///
/// let key = RouteKey::new("GET", "/users", Some("Admin"));
/// assert_eq!(key.to_string(), "GET /users:Admin");
///
/// let parsed: RouteKey = "GET /users:Admin".parse().unwrap();
/// assert_eq!(parsed, key);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    /// HTTP verb, as declared.
    pub verb: String,

    /// Resource path template.
    pub resource: String,

    /// Optional model qualifier.
    pub model: Option<String>,
}

impl RouteKey {
    /// Builds a route key. An empty model is treated as absent.
    pub fn new(verb: impl Into<String>, resource: impl Into<String>, model: Option<&str>) -> Self {
        Self {
            verb: verb.into(),
            resource: resource.into(),
            model: model.filter(|m| !m.is_empty()).map(str::to_string),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.resource)?;
        if let Some(model) = &self.model {
            write!(f, ":{}", model)?;
        }
        Ok(())
    }
}

impl FromStr for RouteKey {
    type Err = KeyParseError;

    /// Parses `"VERB resource[:model]"`.
    ///
    /// A `:` directly after a `/` starts a path parameter (`/users/:id`),
    /// not a model qualifier.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (verb, rest) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| KeyParseError::Route(s.to_string()))?;
        if verb.is_empty() || rest.is_empty() {
            return Err(KeyParseError::Route(s.to_string()));
        }

        let (resource, model) = match rest.rfind(':') {
            Some(pos) if pos > 0 && !rest[..pos].ends_with('/') && !rest[pos + 1..].contains('/') => {
                (&rest[..pos], Some(&rest[pos + 1..]))
            }
            _ => (rest, None),
        };

        Ok(RouteKey::new(verb, resource, model))
    }
}

/// Key identifying an event source and resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    /// Event source (e.g. a queue or bucket family).
    pub source: String,

    /// Resource within the source.
    pub resource: String,
}

impl EventKey {
    pub fn new(source: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.source, self.resource)
    }
}

impl FromStr for EventKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().split_once(' ') {
            Some((source, resource)) if !source.is_empty() && !resource.is_empty() => {
                Ok(EventKey::new(source, resource))
            }
            _ => Err(KeyParseError::Event(s.to_string())),
        }
    }
}

/// Error raised when a serialized key cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("Invalid route key: {0:?} (expected \"VERB resource[:model]\")")]
    Route(String),

    #[error("Invalid event key: {0:?} (expected \"source resource\")")]
    Event(String),
}

/// Who is attempting a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallOrigin {
    /// Another method of this application.
    Internal,
    /// An end-user client (HTTP, GraphQL).
    External,
    /// Another application.
    Remote,
}

impl fmt::Display for CallOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallOrigin::Internal => write!(f, "internal"),
            CallOrigin::External => write!(f, "external"),
            CallOrigin::Remote => write!(f, "remote"),
        }
    }
}

/// Resolved capability set controlling who may invoke a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Roles {
    pub internal: bool,
    pub external: bool,
    pub remote: bool,
}

impl Roles {
    /// The role set every event handler is pinned to.
    pub const INTERNAL_ONLY: Roles = Roles {
        internal: true,
        external: false,
        remote: false,
    };

    /// Overlays `overrides` onto `prior`.
    ///
    /// Each flag takes the override when set, else its prior value, else the
    /// default (`Internal = true`, `External = false`, `Remote = true`).
    pub fn merge(prior: Option<Roles>, overrides: RoleOverrides) -> Roles {
        let defaults = Roles::default();
        let prior = prior.unwrap_or(defaults);
        Roles {
            internal: overrides.internal.unwrap_or(prior.internal),
            external: overrides.external.unwrap_or(prior.external),
            remote: overrides.remote.unwrap_or(prior.remote),
        }
    }

    /// Returns true if a caller of the given origin may invoke the method.
    pub fn permits(&self, origin: CallOrigin) -> bool {
        match origin {
            CallOrigin::Internal => self.internal,
            CallOrigin::External => self.external,
            CallOrigin::Remote => self.remote,
        }
    }
}

impl Default for Roles {
    fn default() -> Self {
        Self {
            internal: true,
            external: false,
            remote: true,
        }
    }
}

/// Partial role set carried by one authorization declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleOverrides {
    #[serde(default)]
    pub internal: Option<bool>,
    #[serde(default)]
    pub external: Option<bool>,
    #[serde(default)]
    pub remote: Option<bool>,
}

impl RoleOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn internal(mut self, allowed: bool) -> Self {
        self.internal = Some(allowed);
        self
    }

    pub fn external(mut self, allowed: bool) -> Self {
        self.external = Some(allowed);
        self
    }

    pub fn remote(mut self, allowed: bool) -> Self {
        self.remote = Some(allowed);
        self
    }
}

impl From<Roles> for RoleOverrides {
    fn from(roles: Roles) -> Self {
        Self {
            internal: Some(roles.internal),
            external: Some(roles.external),
            remote: Some(roles.remote),
        }
    }
}

/// Reference to a GraphQL input or result type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraphRef {
    /// No type was declared.
    Any,
    /// A named, declared type.
    Ref { target: String },
}

impl GraphRef {
    /// A named reference when a type is given, the `Any` sentinel otherwise.
    pub fn resolve(target: Option<&str>) -> Self {
        match target {
            Some(name) if !name.is_empty() => GraphRef::Ref {
                target: name.to_string(),
            },
            _ => GraphRef::Any,
        }
    }
}

/// One positional parameter of a method signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    /// Parameter name, when the declaring site supplied names.
    pub name: Option<String>,

    /// Declared type token.
    pub type_name: String,
}

/// The trailing return entry of a method design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDescriptor {
    /// Declared return type token.
    pub type_name: String,

    /// Set once a fully named signature has been recorded; freezes the design.
    pub terminal: bool,
}

/// Parameter design of a method: positional parameters plus a return entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Design {
    pub params: Vec<ParamDescriptor>,
    pub returns: Option<ReturnDescriptor>,
}

impl Design {
    /// True once a terminal return descriptor is present.
    pub fn is_frozen(&self) -> bool {
        self.returns.as_ref().is_some_and(|r| r.terminal)
    }
}

/// A method signature supplied as plain data by the declaring code.
///
/// `names` is `None` for a type-only pass; such a pass records the types but
/// leaves the design open so a later named pass can complete it.
///
/// # Example
///
/// ```rust
/// use switchboard_registry::Signature;
///
/// let sig = Signature::new("User")
///     .param("string", "id")
///     .param("Context", "ctx");
/// assert_eq!(sig.params, vec!["string", "Context"]);
/// assert!(sig.is_named());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Parameter type tokens in position order.
    #[serde(default)]
    pub params: Vec<String>,

    /// Parameter names aligned with `params`, when known.
    #[serde(default)]
    pub names: Option<Vec<String>>,

    /// Return type token.
    pub returns: String,
}

impl Signature {
    /// A named signature with no parameters yet.
    pub fn new(returns: impl Into<String>) -> Self {
        Self {
            params: Vec::new(),
            names: Some(Vec::new()),
            returns: returns.into(),
        }
    }

    /// A type-only signature (no parameter names available).
    pub fn typed(params: Vec<String>, returns: impl Into<String>) -> Self {
        Self {
            params,
            names: None,
            returns: returns.into(),
        }
    }

    /// Appends a named parameter.
    pub fn param(mut self, type_name: impl Into<String>, name: impl Into<String>) -> Self {
        self.params.push(type_name.into());
        self.names.get_or_insert_with(Vec::new).push(name.into());
        self
    }

    pub fn is_named(&self) -> bool {
        self.names.is_some()
    }
}

/// Declaration-time and commit-time registration failures.
///
/// Every variant is fatal to startup: each one indicates an authoring
/// mistake in the declarations, not a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The same route key was declared twice on one method.
    #[error("Duplicate HTTP route: [{route}] on {method}")]
    DuplicateRoute { route: RouteKey, method: MethodId },

    /// The same event key was declared twice on one method.
    #[error("Duplicate event route: [{event}] on {method}")]
    DuplicateEvent { event: EventKey, method: MethodId },

    /// Two methods of one service claim the same route key.
    #[error("Duplicate route: [{route}] claimed by {service}.{method}, already owned by {service}.{existing}")]
    ServiceCollision {
        route: RouteKey,
        service: String,
        existing: String,
        method: String,
    },

    /// A route key is already owned by a different record in the registry.
    #[error("Duplicate HTTP route [{route}]: {method} collides with {existing}")]
    GlobalCollision {
        route: RouteKey,
        existing: MethodId,
        method: MethodId,
    },

    /// A qualified method name is already bound to a different record.
    #[error("Duplicate method [{qualified}]: {method} collides with {existing}")]
    DuplicateMethod {
        qualified: String,
        existing: MethodId,
        method: MethodId,
    },

    /// A second, separate declaration of an already committed service type.
    #[error("Service {target} is already committed as {committed:?} by another declaration")]
    DuplicateService { target: String, committed: String },

    /// A service was committed again under a different alias.
    #[error("Service {target} already committed as {committed:?}, cannot recommit as {requested:?}")]
    AliasConflict {
        target: String,
        committed: String,
        requested: String,
    },
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_key_display() {
        assert_eq!(RouteKey::new("GET", "/users", None).to_string(), "GET /users");
        assert_eq!(
            RouteKey::new("POST", "/users", Some("Admin")).to_string(),
            "POST /users:Admin"
        );
        assert_eq!(RouteKey::new("GET", "/users", Some("")).model, None);
    }

    #[test]
    fn test_route_key_parse_path_params() {
        let key: RouteKey = "GET /users/:id".parse().unwrap();
        assert_eq!(key.resource, "/users/:id");
        assert_eq!(key.model, None);

        let key: RouteKey = "GET /users/:id:Admin".parse().unwrap();
        assert_eq!(key.resource, "/users/:id");
        assert_eq!(key.model.as_deref(), Some("Admin"));

        assert!("GET".parse::<RouteKey>().is_err());
    }

    #[test]
    fn test_event_key_parse() {
        let key: EventKey = "orders created".parse().unwrap();
        assert_eq!(key, EventKey::new("orders", "created"));
        assert_eq!(key.to_string(), "orders created");
        assert!("orders".parse::<EventKey>().is_err());
    }

    #[test]
    fn test_roles_defaults() {
        let roles = Roles::merge(None, RoleOverrides::new());
        assert_eq!(roles, Roles::default());
        assert!(roles.internal && !roles.external && roles.remote);
    }

    #[test]
    fn test_roles_merge_overlays_only_set_flags() {
        let roles = Roles::merge(None, RoleOverrides::new().external(true));
        assert_eq!(
            roles,
            Roles {
                internal: true,
                external: true,
                remote: true
            }
        );

        let roles = Roles::merge(Some(roles), RoleOverrides::new().remote(false));
        assert!(roles.external);
        assert!(!roles.remote);
    }

    #[test]
    fn test_remote_keeps_its_own_prior_value() {
        let prior = Roles {
            internal: false,
            external: false,
            remote: true,
        };
        let roles = Roles::merge(Some(prior), RoleOverrides::new());
        assert!(roles.remote);
        assert!(!roles.internal);
    }

    #[test]
    fn test_roles_permits() {
        let roles = Roles::INTERNAL_ONLY;
        assert!(roles.permits(CallOrigin::Internal));
        assert!(!roles.permits(CallOrigin::External));
        assert!(!roles.permits(CallOrigin::Remote));
    }

    #[test]
    fn test_graph_ref_resolve() {
        assert_eq!(GraphRef::resolve(None), GraphRef::Any);
        assert_eq!(GraphRef::resolve(Some("")), GraphRef::Any);
        assert_eq!(
            GraphRef::resolve(Some("User")),
            GraphRef::Ref {
                target: "User".to_string()
            }
        );
    }

    #[test]
    fn test_roles_serialization_uses_flag_names() {
        let json = serde_json::to_value(Roles::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Internal": true, "External": false, "Remote": true})
        );

        let overrides: RoleOverrides = serde_json::from_str(r#"{"External": true}"#).unwrap();
        assert_eq!(overrides, RoleOverrides::new().external(true));
    }
}
