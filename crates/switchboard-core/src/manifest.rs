//! # Declaration Manifests
//!
//! A manifest describes service declarations as plain JSON data, for
//! deployments where declarations are produced by a build step instead of
//! being issued in code. Applying a manifest goes through the same
//! accumulation API as code: every method-level declaration of a service is
//! applied first, then the service is committed.
//!
//! ## Format
//!
//! ```json
//! {
//!   "services": [{
//!     "target": "UserService",
//!     "alias": "users",
//!     "methods": [{
//!       "name": "get",
//!       "signature": { "params": ["string"], "names": ["id"], "returns": "User" },
//!       "auth": { "mode": "user", "External": true },
//!       "query": { "result": "User" },
//!       "bindings": [{ "index": 0, "kind": "PathParam", "path": "id" }],
//!       "routes": [{ "verb": "GET", "resource": "/users/:id" }],
//!       "events": [{ "source": "users", "resource": "deleted", "action": true }]
//!     }]
//!   }]
//! }
//! ```
//!
//! Route codes default to 200. Event `action` is `true` (match the method
//! name), `false` (match all), or an action name.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use switchboard_registry::{ActionFilter, BindingKind, HttpCode, RoleOverrides, ServiceRecord, Signature};

/// A set of service declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub services: Vec<ServiceManifest>,
}

impl Manifest {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Declarations of one service type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceManifest {
    pub target: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodManifest>,
}

impl ServiceManifest {
    /// Applies every method-level declaration to a fresh service record.
    pub fn build(&self) -> Result<ServiceRecord> {
        let mut service = ServiceRecord::new(&self.target);
        for method in &self.methods {
            method.apply(&mut service)?;
        }
        Ok(service)
    }
}

/// Declarations of one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodManifest {
    pub name: String,
    #[serde(default)]
    pub signature: Option<Signature>,
    #[serde(default)]
    pub auth: Option<AuthManifest>,
    #[serde(default)]
    pub query: Option<GraphManifest>,
    #[serde(default)]
    pub mutation: Option<GraphManifest>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub bindings: Vec<BindingManifest>,
    #[serde(default)]
    pub routes: Vec<RouteManifest>,
    #[serde(default)]
    pub events: Vec<EventManifest>,
}

impl MethodManifest {
    fn apply(&self, service: &mut ServiceRecord) -> Result<()> {
        let mut decl = service.method(&self.name);

        if let Some(signature) = &self.signature {
            decl = decl.define_signature(signature);
        }
        if let Some(auth) = &self.auth {
            decl = decl.add_auth(&auth.mode, auth.roles);
        }
        if let Some(query) = &self.query {
            decl = decl.set_query(query.input.as_deref(), query.result.as_deref());
        }
        if let Some(mutation) = &self.mutation {
            decl = decl.set_mutation(mutation.input.as_deref(), mutation.result.as_deref());
        }
        if let Some(content_type) = &self.content_type {
            decl = decl.set_content_type(content_type);
        }
        for binding in &self.bindings {
            decl = decl.add_binding(binding.index, binding.kind, binding.path.as_deref(), None);
        }
        for route in &self.routes {
            decl = decl.add_route(&route.verb, &route.resource, route.model.as_deref(), route.code, None)?;
        }
        for event in &self.events {
            decl = decl.add_event(
                &event.source,
                &event.resource,
                event.action.to_filter(),
                event.object.as_deref(),
                None,
            )?;
        }
        Ok(())
    }
}

/// An authorization declaration: mode plus role flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthManifest {
    pub mode: String,
    #[serde(flatten)]
    pub roles: RoleOverrides,
}

/// Input and result types of a query or mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphManifest {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingManifest {
    pub index: usize,
    pub kind: BindingKind,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteManifest {
    pub verb: String,
    pub resource: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_code")]
    pub code: HttpCode,
}

fn default_code() -> HttpCode {
    200
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventManifest {
    pub source: String,
    pub resource: String,
    #[serde(default)]
    pub action: ActionManifest,
    #[serde(default)]
    pub object: Option<String>,
}

/// `true`, `false`, or an action name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionManifest {
    Auto(bool),
    Named(String),
}

impl Default for ActionManifest {
    fn default() -> Self {
        ActionManifest::Auto(false)
    }
}

impl ActionManifest {
    fn to_filter(&self) -> ActionFilter {
        match self {
            ActionManifest::Auto(auto) => ActionFilter::from(*auto),
            ActionManifest::Named(name) => ActionFilter::from(name.as_str()),
        }
    }
}
