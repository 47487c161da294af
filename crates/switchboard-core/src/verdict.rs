//! Access verdicts for the dispatch read path.

use serde::{Deserialize, Serialize};
use std::fmt;
use switchboard_registry::{CallOrigin, MethodRecord};

/// Whether a caller may invoke a method.
///
/// - `Allow`: the method's role set admits the caller's origin
/// - `Deny`: it does not; the reason names the method and origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Access {
    /// The call may proceed.
    Allow,

    /// The call must not proceed.
    Deny {
        /// Why the call was refused.
        reason: DenyReason,
    },
}

impl Access {
    /// Gates `origin` against the record's effective role set.
    pub fn evaluate(record: &MethodRecord, origin: CallOrigin) -> Self {
        if record.permits(origin) {
            return Self::Allow;
        }
        Self::Deny {
            reason: DenyReason {
                method: record
                    .qualified_name()
                    .unwrap_or_else(|| record.id().to_string()),
                origin,
                auth: record.auth().map(str::to_string),
            },
        }
    }

    /// Returns true if this is an Allow verdict.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns true if this is a Deny verdict.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny { .. })
    }
}

/// Why a call was refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenyReason {
    /// Qualified name of the target method.
    pub method: String,

    /// Origin of the refused caller.
    pub origin: CallOrigin,

    /// Authorization mode declared on the method.
    pub auth: Option<String>,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} calls to {} are not permitted", self.origin, self.method)?;
        if let Some(auth) = &self.auth {
            write!(f, " (auth: {})", auth)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_registry::{RegistryBuilder, RoleOverrides, ServiceRecord};

    #[test]
    fn test_evaluate_internal_only_handler() {
        let mut service = ServiceRecord::new("OrderService");
        service
            .method("notify")
            .add_event("orders", "created", true, None, None)
            .unwrap();
        let mut builder = RegistryBuilder::new();
        service.commit("orders", &mut builder).unwrap();
        let registry = builder.freeze();
        let record = registry.method("orders.notify").unwrap();

        assert!(Access::evaluate(record, CallOrigin::Internal).is_allowed());
        let denied = Access::evaluate(record, CallOrigin::External);
        assert!(denied.is_denied());
        match denied {
            Access::Deny { reason } => {
                assert_eq!(reason.method, "orders.notify");
                assert_eq!(
                    reason.to_string(),
                    "external calls to orders.notify are not permitted (auth: internal)"
                );
            }
            Access::Allow => unreachable!(),
        }
    }

    #[test]
    fn test_uncommitted_record_uses_identity() {
        let mut service = ServiceRecord::new("UserService");
        service.method("list").add_auth("user", RoleOverrides::new().remote(false));
        let record = service.record("list").unwrap();
        match Access::evaluate(record, CallOrigin::Remote) {
            Access::Deny { reason } => assert_eq!(reason.method, "UserService.list"),
            Access::Allow => panic!("remote calls must be denied"),
        }
    }
}
