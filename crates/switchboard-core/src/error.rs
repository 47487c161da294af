//! Error types for Switchboard Core.

use crate::verdict::DenyReason;
use switchboard_registry::{BindingError, MethodId, RouteError};
use thiserror::Error;

/// Core error type for gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Declaration or commit failure. Fatal to startup.
    #[error("Registration error: {0}")]
    Registration(#[from] RouteError),

    /// A method lacks a complete signature while strict signatures are on.
    #[error("Incomplete signature: {0}")]
    Signature(MethodId),

    /// No route owns the requested key.
    #[error("No route for [{0}]")]
    NoRoute(String),

    /// No method is registered under the qualified name.
    #[error("No method named {0}")]
    NoMethod(String),

    /// The caller's origin is not permitted.
    #[error("Access denied: {0}")]
    Denied(DenyReason),

    /// An argument could not be bound.
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed declaration manifest.
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Reading a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
