//! # Switchboard Core
//!
//! Startup and dispatch facade over the route registry. Services are
//! declared in code or in a JSON manifest, committed once under their
//! aliases, then served read-only to any number of request tasks.
//!
//! ## Failure Classes
//!
//! | Phase | Error | Effect |
//! |-------|-------|--------|
//! | Startup | [`GatewayError::Registration`], [`GatewayError::Signature`] | Fatal; the process must not serve |
//! | Startup | [`GatewayError::Manifest`], [`GatewayError::Config`], [`GatewayError::Io`] | Fatal; bad input files |
//! | Dispatch | [`GatewayError::NoRoute`], [`GatewayError::NoMethod`] | Reported to the caller |
//! | Dispatch | [`GatewayError::Denied`] | Reported to the caller, logged |
//! | Dispatch | [`GatewayError::Binding`] | Reported to the caller |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SWITCHBOARD CORE                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   GatewayConfig        Manifest (JSON)       ServiceRecord      │
//! │         │                    │                     │            │
//! │         └──────────┬─────────┴─────────────────────┘            │
//! │                    ▼                                            │
//! │             ┌─────────────┐   commit    ┌──────────────────┐    │
//! │             │   Startup   │ ──────────▶ │ RegistryBuilder  │    │
//! │             └──────┬──────┘             └──────────────────┘    │
//! │                    │ finish()                                   │
//! │                    ▼                                            │
//! │             ┌─────────────┐   Access    ┌──────────────────┐    │
//! │             │   Gateway   │ ──────────▶ │  Arc<Registry>   │    │
//! │             └─────────────┘             └──────────────────┘    │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use switchboard_core::{GatewayConfig, Manifest, Startup};
//!
//! let mut startup = Startup::new(GatewayConfig::from_env());
//! startup.load_manifest(&Manifest::load("services.json")?)?;
//! let gateway = startup.finish();
//!
//! let call = gateway.prepare_http(&ctx, &request, None)?;
//! transport.invoke(&call.record, call.args);
//! ```
//!
//! ## Notes
//!
//! - Registration is single-threaded; `finish()` consumes the `Startup`,
//!   so nothing can be registered after serving begins
//! - Event handlers only admit internal callers
//! - The gateway never invokes handlers

mod config;
mod error;
mod gateway;
mod manifest;
mod verdict;

pub use config::{GatewayConfig, LogLevel};
pub use error::GatewayError;
pub use gateway::{Gateway, Invocation, Startup};
pub use manifest::{
    ActionManifest, AuthManifest, BindingManifest, EventManifest, GraphManifest, Manifest, MethodManifest,
    RouteManifest, ServiceManifest,
};
pub use verdict::{Access, DenyReason};

// Re-export registry types for convenience
pub use switchboard_registry::{
    CallContext, CallOrigin, EventKey, EventRequest, HttpRequest, MethodRecord, Registry, RegistrySnapshot,
    RouteKey, ServiceRecord,
};

/// Core result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests;
