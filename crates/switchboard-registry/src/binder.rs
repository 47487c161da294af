//! # Argument Binding
//!
//! A binder turns a call context plus an inbound request into one argument
//! value. Each method record keeps a sparse list of [`Binding`]s aligned to
//! its parameter positions; [`bind_arguments`] walks that list in position
//! order and produces the argument vector a dispatcher passes to the target.
//!
//! ## Binding Kinds
//!
//! | Kind | Produces |
//! |------|----------|
//! | `PathParam` | one path parameter (required) |
//! | `PathParams` | all path parameters as an object |
//! | `QueryParam` | one query parameter, or `null` |
//! | `QueryParams` | all query parameters as an object |
//! | `HeaderParam` | one header (case-insensitive), or `null` |
//! | `BodyParam` | one body field or JSON pointer, or `null` |
//! | `ContextParam` | one context value, or `null` |
//! | `Body` | the whole body |
//! | `ContextObject` | the whole call context |
//! | `RequestObject` | the whole request |
//! | `RequestParam` | one top-level request field, or `null` |
//!
//! A custom resolver always wins over the kind's standard resolution.
//! Positions without a binding yield `None` (the argument is left undefined).

use crate::models::{CallOrigin, MethodId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for binding operations.
pub type BindResult<T> = std::result::Result<T, BindingError>;

/// Resolver for one argument.
pub type BinderFn = Arc<dyn Fn(&CallContext, &HttpRequest) -> BindResult<Value> + Send + Sync>;

/// Builds the full argument list for an HTTP route, bypassing per-position binders.
pub type HttpAdapter =
    Arc<dyn Fn(&CallContext, &HttpRequest) -> BindResult<Vec<Option<Value>>> + Send + Sync>;

/// Builds the full argument list for an event handler.
pub type EventAdapter =
    Arc<dyn Fn(&CallContext, &EventRequest) -> BindResult<Vec<Option<Value>>> + Send + Sync>;

/// Dispatcher-side failure to produce an argument.
///
/// Reported to the caller; never fatal to the process.
#[derive(Debug, Error)]
pub enum BindingError {
    /// A required value was absent from the request.
    #[error("Missing {kind} value {name:?}")]
    MissingValue { kind: BindingKind, name: String },

    /// A custom resolver rejected the request.
    #[error("Binder for {method} failed at position {index}: {reason}")]
    Resolver {
        method: MethodId,
        index: usize,
        reason: String,
    },

    /// The context or request could not be converted to JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What part of the call an argument is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingKind {
    PathParam,
    PathParams,
    QueryParam,
    QueryParams,
    HeaderParam,
    BodyParam,
    ContextParam,
    Body,
    ContextObject,
    RequestObject,
    RequestParam,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl BindingKind {
    /// Standard resolution for this kind, used when no custom resolver is set.
    pub fn resolve(&self, path: Option<&str>, ctx: &CallContext, req: &HttpRequest) -> BindResult<Value> {
        let name = path.unwrap_or_default();
        let value = match self {
            BindingKind::PathParam => match req.path_params.get(name) {
                Some(v) => Value::String(v.clone()),
                None => {
                    return Err(BindingError::MissingValue {
                        kind: *self,
                        name: name.to_string(),
                    })
                }
            },
            BindingKind::PathParams => string_map(&req.path_params),
            BindingKind::QueryParam => optional_string(req.query.get(name)),
            BindingKind::QueryParams => string_map(&req.query),
            BindingKind::HeaderParam => optional_string(req.header(name)),
            BindingKind::BodyParam => body_field(&req.body, name),
            BindingKind::ContextParam => ctx.values.get(name).cloned().unwrap_or(Value::Null),
            BindingKind::Body => req.body.clone(),
            BindingKind::ContextObject => serde_json::to_value(ctx)?,
            BindingKind::RequestObject => serde_json::to_value(req)?,
            BindingKind::RequestParam => serde_json::to_value(req)?
                .get(name)
                .cloned()
                .unwrap_or(Value::Null),
        };
        Ok(value)
    }
}

fn optional_string(value: Option<&String>) -> Value {
    value.map_or(Value::Null, |v| Value::String(v.clone()))
}

fn string_map(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<String, Value>>(),
    )
}

fn body_field(body: &Value, path: &str) -> Value {
    let found = if path.starts_with('/') {
        body.pointer(path)
    } else {
        body.get(path)
    };
    found.cloned().unwrap_or(Value::Null)
}

/// Execution context of one call, supplied by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallContext {
    /// Correlation id of the call.
    pub request_id: String,

    /// Who is calling.
    pub origin: CallOrigin,

    /// Authenticated principal, if any.
    #[serde(default)]
    pub principal: Option<String>,

    /// Free-form values exposed to `ContextParam` bindings.
    #[serde(default)]
    pub values: Map<String, Value>,
}

impl CallContext {
    pub fn new(request_id: impl Into<String>, origin: CallOrigin) -> Self {
        Self {
            request_id: request_id.into(),
            origin,
            principal: None,
            values: Map::new(),
        }
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

/// Inbound HTTP request as seen by binders. Bodies arrive already decoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpRequest {
    pub verb: String,
    pub resource: String,
    #[serde(default)]
    pub path_params: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Header names are stored lowercase.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

impl HttpRequest {
    pub fn new(verb: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            resource: resource.into(),
            ..Self::default()
        }
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_ascii_lowercase())
    }
}

/// Inbound event as seen by event adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRequest {
    pub source: String,
    pub resource: String,
    pub action: String,
    pub object: String,
    #[serde(default)]
    pub payload: Value,
}

/// One entry of a method's binding table.
///
/// Fields are merged across repeated declarations at the same position, so
/// a path hint and a resolver supplied separately both survive.
#[derive(Clone)]
pub struct Binding {
    pub kind: BindingKind,
    pub path: Option<String>,
    pub binder: Option<BinderFn>,
}

impl Binding {
    /// Resolves this binding, preferring the custom resolver when present.
    pub fn resolve(&self, ctx: &CallContext, req: &HttpRequest) -> BindResult<Value> {
        match &self.binder {
            Some(binder) => binder(ctx, req),
            None => self.kind.resolve(self.path.as_deref(), ctx, req),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("custom", &self.binder.is_some())
            .finish()
    }
}

/// Wraps a closure as a [`BinderFn`].
pub fn binder<F>(f: F) -> BinderFn
where
    F: Fn(&CallContext, &HttpRequest) -> BindResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Builds the argument list for `bindings`.
///
/// The list covers `arity` positions or the binding table, whichever is
/// longer. Binders run sequentially in position order; the first failure
/// aborts the call.
pub fn bind_arguments(
    bindings: &[Option<Binding>],
    arity: usize,
    ctx: &CallContext,
    req: &HttpRequest,
) -> BindResult<Vec<Option<Value>>> {
    let len = arity.max(bindings.len());
    let mut args = Vec::with_capacity(len);
    for index in 0..len {
        let arg = match bindings.get(index) {
            Some(Some(binding)) => Some(binding.resolve(ctx, req)?),
            _ => None,
        };
        args.push(arg);
    }
    Ok(args)
}
