//! # Switchboard Registry - Route Metadata Accumulation and Compilation
//!
//! Service types declare, method by method, how each method is reachable: as
//! an HTTP route, as an event handler, as a GraphQL query or mutation, with
//! which authorization rules, and how its arguments are bound. This crate
//! accumulates those declarations (in whatever order they are applied) and
//! compiles them into globally consistent routing tables that a dispatcher
//! reads at request time.
//!
//! ## Failure Model
//!
//! | Failure | Detected | Error |
//! |---------|----------|-------|
//! | Same route/event key twice on one method | declaration | [`RouteError::DuplicateRoute`], [`RouteError::DuplicateEvent`] |
//! | Same route key on two methods of a service | declaration | [`RouteError::ServiceCollision`] |
//! | Route key owned by another record anywhere | commit | [`RouteError::GlobalCollision`] |
//! | Qualified name owned by another record | commit | [`RouteError::DuplicateMethod`] |
//! | Type already committed by another declaration | commit | [`RouteError::DuplicateService`] |
//! | Required argument absent | dispatch | [`BindingError`] |
//!
//! Declaration and commit failures are authoring mistakes and abort startup.
//! Binding failures are reported to the caller of one request.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      SWITCHBOARD REGISTRY                           │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  declarations ──▶ ┌──────────────────┐                              │
//! │  (any order)      │  ServiceRecord   │  methods / routes / events   │
//! │                   │  ┌────────────┐  │                              │
//! │                   │  │MethodRecord│  │  design, auth, roles,        │
//! │                   │  └────────────┘  │  bindings, http, events      │
//! │                   └────────┬─────────┘                              │
//! │                            │ commit(alias)                          │
//! │                            ▼                                        │
//! │                   ┌──────────────────┐   freeze   ┌──────────────┐  │
//! │                   │ RegistryBuilder  │───────────▶│   Registry   │  │
//! │                   │ collision checks │            │  read-only   │  │
//! │                   └──────────────────┘            └──────┬───────┘  │
//! │                                                          │          │
//! │                              dispatcher ◀── lookups + binders       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use switchboard_registry::{BindingKind, RegistryBuilder, RoleOverrides, RouteKey, ServiceRecord, Signature};
//!
//! let mut service = ServiceRecord::new("OrderService");
//!
//! service
//!     .method("get")
//!     .define_signature(&Signature::new("Order").param("string", "id"))
//!     .add_auth("user", RoleOverrides::new().external(true))
//!     .add_binding(0, BindingKind::PathParam, Some("id"), None)
//!     .add_route("GET", "/orders/:id", None, 200, None)?;
//!
//! service
//!     .method("notify")
//!     .add_event("orders", "created", true, None, None)?;
//!
//! let mut builder = RegistryBuilder::new();
//! service.commit("orders", &mut builder)?;
//! let registry = builder.freeze();
//!
//! let record = registry.route(&RouteKey::new("GET", "/orders/:id", None)).unwrap();
//! assert_eq!(record.name(), "get");
//! assert_eq!(registry.method("orders.notify").unwrap().auth(), Some("internal"));
//! # Ok::<(), switchboard_registry::RouteError>(())
//! ```

pub mod binder;
pub mod canonicalize;
pub mod method;
pub mod models;
pub mod registry;
pub mod service;

pub use binder::{
    bind_arguments, binder, BindResult, BinderFn, Binding, BindingError, BindingKind, CallContext, EventAdapter,
    EventRequest, HttpAdapter, HttpRequest,
};
pub use method::{bind_event, ActionFilter, EventRoute, HttpRoute, MethodRecord};
pub use models::{
    CallOrigin, Design, EventKey, GraphRef, Hash, HttpCode, KeyParseError, MethodId, ParamDescriptor,
    ReturnDescriptor, RoleOverrides, Roles, RouteError, RouteKey, Result, ServiceId, Signature, INTERNAL_AUTH, WILDCARD,
};
pub use registry::{Registry, RegistryBuilder, RegistrySnapshot};
pub use service::{MethodDeclaration, ServiceRecord};
