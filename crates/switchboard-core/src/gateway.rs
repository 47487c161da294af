//! Registration driver and the dispatch read path.
//!
//! [`Startup`] owns the single-writer registration phase. Each service is
//! committed under a resolved alias; once every service is in,
//! [`Startup::finish`] freezes the tables into a [`Gateway`] that any number
//! of request tasks can share.
//!
//! ```text
//!   ServiceRecord ──register──▶ Startup ──finish──▶ Gateway (Arc<Registry>)
//!   Manifest ─────load────────▶    │                   │
//!                                  │                   ├─ prepare_http
//!                        RegistryBuilder               ├─ prepare_call
//!                                                      └─ prepare_event
//! ```
//!
//! The gateway resolves the target method, gates the caller's origin against
//! the method's role set, and builds the argument list. Invoking the handler
//! is left to the transport.

use crate::{
    config::GatewayConfig,
    error::GatewayError,
    manifest::Manifest,
    verdict::Access,
    Result,
};

use serde_json::Value;
use std::sync::Arc;
use switchboard_registry::{
    bind_event, CallContext, CallOrigin, EventKey, EventRequest, HttpCode, HttpRequest, MethodRecord,
    Registry, RegistryBuilder, RouteKey, ServiceRecord,
};
use tracing::{debug, info, warn};

/// The registration phase.
///
/// # Example
///
/// ```rust
/// use switchboard_core::{GatewayConfig, Startup};
/// use switchboard_registry::{CallContext, CallOrigin, HttpRequest, RoleOverrides, ServiceRecord};
///
/// let mut service = ServiceRecord::new("UserService");
/// service
///     .method("list")
///     .add_auth("user", RoleOverrides::new().external(true))
///     .add_route("GET", "/users", None, 200, None)
///     .unwrap();
///
/// let mut startup = Startup::new(GatewayConfig::default());
/// startup.register(&mut service, Some("users")).unwrap();
/// let gateway = startup.finish();
///
/// let ctx = CallContext::new("r-1", CallOrigin::External);
/// let call = gateway.prepare_http(&ctx, &HttpRequest::new("GET", "/users"), None).unwrap();
/// assert_eq!(call.record.qualified_name().as_deref(), Some("users.list"));
/// ```
#[derive(Debug, Default)]
pub struct Startup {
    config: GatewayConfig,
    builder: RegistryBuilder,
}

impl Startup {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            builder: RegistryBuilder::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The tables committed so far.
    pub fn registry(&self) -> &Registry {
        self.builder.registry()
    }

    /// Picks the alias for `service`: an explicit alias wins, then the
    /// configured alias, then the alias of an earlier commit, then the
    /// declaring type name.
    pub fn resolve_alias(&self, service: &ServiceRecord, explicit: Option<&str>) -> String {
        explicit
            .or_else(|| self.config.alias_for(service.target()))
            .or_else(|| service.alias())
            .unwrap_or_else(|| service.target())
            .to_string()
    }

    /// Commits `service` into the registry.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Signature`] when strict signatures are on and a
    ///   reachable method has no named signature.
    /// - [`GatewayError::Registration`] for any commit failure.
    pub fn register(&mut self, service: &mut ServiceRecord, alias: Option<&str>) -> Result<()> {
        if self.config.strict_signatures {
            check_signatures(service)?;
        }

        let alias = self.resolve_alias(service, alias);
        service.commit(&alias, &mut self.builder)?;
        debug!(
            "Registry now holds {} methods, {} routes",
            self.builder.registry().method_count(),
            self.builder.registry().route_count()
        );
        Ok(())
    }

    /// Builds and commits every service of `manifest`.
    ///
    /// Returns the committed records so they can be committed again later.
    pub fn load_manifest(&mut self, manifest: &Manifest) -> Result<Vec<ServiceRecord>> {
        let mut services = Vec::with_capacity(manifest.services.len());
        for entry in &manifest.services {
            let mut service = entry.build()?;
            self.register(&mut service, entry.alias.as_deref())?;
            services.push(service);
        }
        Ok(services)
    }

    /// Freezes the registry.
    pub fn finish(self) -> Gateway {
        let registry = self.builder.freeze();
        info!(
            "Gateway ready ({} methods, {} routes, {} event keys, stage {})",
            registry.method_count(),
            registry.route_count(),
            registry.event_key_count(),
            self.config.stage
        );
        Gateway {
            config: Arc::new(self.config),
            registry: Arc::new(registry),
        }
    }
}

fn check_signatures(service: &ServiceRecord) -> Result<()> {
    let reachable = service
        .records()
        .filter(|r| r.auth().is_some() || !r.http().is_empty() || !r.events().is_empty());
    for record in reachable {
        if !record.design().is_frozen() {
            warn!("{} has no named signature", record.id());
            return Err(GatewayError::Signature(record.id().clone()));
        }
    }
    Ok(())
}

/// A resolved, authorized call ready for the transport to invoke.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Target method.
    pub record: Arc<MethodRecord>,

    /// Bound arguments; `None` marks an unbound position.
    pub args: Vec<Option<Value>>,

    /// Success status for HTTP calls.
    pub code: Option<HttpCode>,
}

/// Read-only dispatch facade over the frozen registry.
#[derive(Debug, Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    registry: Arc<Registry>,
}

impl Gateway {
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A shared handle to the registry.
    pub fn shared(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Gates `origin` against `record`.
    pub fn authorize(&self, record: &MethodRecord, origin: CallOrigin) -> Result<()> {
        match Access::evaluate(record, origin) {
            Access::Allow => Ok(()),
            Access::Deny { reason } => {
                warn!("Denied: {}", reason);
                Err(GatewayError::Denied(reason))
            }
        }
    }

    /// Resolves the route `req.verb req.resource` (with optional model
    /// qualifier), gates the caller and binds the arguments.
    pub fn prepare_http(&self, ctx: &CallContext, req: &HttpRequest, model: Option<&str>) -> Result<Invocation> {
        let key = RouteKey::new(req.verb.as_str(), req.resource.as_str(), model);
        let record = self
            .registry
            .route(&key)
            .ok_or_else(|| GatewayError::NoRoute(key.to_string()))?;
        self.authorize(record, ctx.origin)?;

        let args = record.bind_http(Some(&key), ctx, req)?;
        let code = record.http().get(&key).map(|route| route.code);
        debug!("[{}] {} -> {}", ctx.request_id, key, record.id());
        Ok(Invocation {
            record: Arc::clone(record),
            args,
            code,
        })
    }

    /// Resolves a method by qualified name, for direct internal or remote
    /// calls that arrive without a route.
    pub fn prepare_call(&self, qualified: &str, ctx: &CallContext, req: &HttpRequest) -> Result<Invocation> {
        let record = self
            .registry
            .method(qualified)
            .ok_or_else(|| GatewayError::NoMethod(qualified.to_string()))?;
        self.authorize(record, ctx.origin)?;

        let args = record.bind_http(None, ctx, req)?;
        debug!("[{}] call {}", ctx.request_id, qualified);
        Ok(Invocation {
            record: Arc::clone(record),
            args,
            code: None,
        })
    }

    /// Resolves every handler whose filters accept `event`, in commit
    /// order. An event nobody listens to yields an empty list.
    pub fn prepare_event(&self, ctx: &CallContext, event: &EventRequest) -> Result<Vec<Invocation>> {
        let key = EventKey::new(event.source.as_str(), event.resource.as_str());
        let mut invocations = Vec::new();
        for record in self.registry.handlers(&key) {
            let Some(route) = record.events().get(&key) else {
                continue;
            };
            if !route.matches(&event.action, &event.object) {
                continue;
            }
            self.authorize(record, ctx.origin)?;
            invocations.push(Invocation {
                record: Arc::clone(record),
                args: bind_event(route, ctx, event)?,
                code: None,
            });
        }
        debug!(
            "[{}] event {} {}/{}: {} handlers",
            ctx.request_id,
            key,
            event.action,
            event.object,
            invocations.len()
        );
        Ok(invocations)
    }
}
