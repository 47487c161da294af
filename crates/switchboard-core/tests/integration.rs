//! # Switchboard Integration Tests
//!
//! End-to-end tests from input files to prepared calls.
//!
//! ## Coverage
//!
//! | Scenario | Test |
//! |----------|------|
//! | Manifest + config files | `test_startup_from_files` |
//! | Configured alias | `test_configured_alias_applies` |
//! | Malformed inputs | `test_malformed_manifest_file`, `test_missing_config_file` |
//! | Stable fingerprint | `test_fingerprint_is_stable` |
//! | Role gating | `test_role_gating_by_origin` |
//! | Event fan-out | `test_event_fan_out` |
//! | Concurrent reads | `test_concurrent_dispatch` |

use serde_json::json;
use std::fs;
use std::path::PathBuf;
use switchboard_core::{
    CallContext, CallOrigin, EventRequest, GatewayConfig, GatewayError, HttpRequest, LogLevel, Manifest, RouteKey,
    Startup,
};
use tempfile::TempDir;

const SERVICES: &str = r#"{
    "services": [
        {
            "target": "UserService",
            "alias": "users",
            "methods": [
                {
                    "name": "get",
                    "signature": {"params": ["string"], "names": ["id"], "returns": "User"},
                    "auth": {"mode": "user", "External": true},
                    "query": {"result": "User"},
                    "bindings": [{"index": 0, "kind": "PathParam", "path": "id"}],
                    "routes": [{"verb": "GET", "resource": "/users/:id"}]
                },
                {
                    "name": "sync",
                    "signature": {"params": [], "names": [], "returns": "void"},
                    "auth": {"mode": "service", "Remote": false},
                    "routes": [{"verb": "POST", "resource": "/users/sync", "code": 202}]
                },
                {
                    "name": "onSignup",
                    "signature": {"params": ["Event"], "names": ["event"], "returns": "void"},
                    "events": [{"source": "auth", "resource": "accounts", "action": "signup"}]
                }
            ]
        },
        {
            "target": "MailService",
            "methods": [
                {
                    "name": "welcome",
                    "signature": {"params": ["Event"], "names": ["event"], "returns": "void"},
                    "events": [{"source": "auth", "resource": "accounts", "action": "signup"}]
                },
                {
                    "name": "audit",
                    "signature": {"params": ["Event"], "names": ["event"], "returns": "void"},
                    "events": [{"source": "auth", "resource": "accounts"}]
                }
            ]
        }
    ]
}"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn gateway(config: GatewayConfig) -> switchboard_core::Gateway {
    let mut startup = Startup::new(config);
    startup.load_manifest(&Manifest::from_json(SERVICES).unwrap()).unwrap();
    startup.finish()
}

fn signup() -> EventRequest {
    EventRequest {
        source: "auth".into(),
        resource: "accounts".into(),
        action: "signup".into(),
        object: "u-1".into(),
        payload: json!({"email": "a@example.com"}),
    }
}

// =============================================================================
// STARTUP TESTS
// =============================================================================

#[test]
fn test_startup_from_files() {
    let dir = TempDir::new().unwrap();
    let manifest_path = write(&dir, "services.json", SERVICES);
    let config_path = write(
        &dir,
        "gateway.json",
        r#"{"app_id": "shop", "stage": "dev", "log_level": "DEBUG", "strict_signatures": true}"#,
    );

    let config = GatewayConfig::load(&config_path).unwrap();
    assert_eq!(config.log_level, LogLevel::Debug);

    let mut startup = Startup::new(config);
    startup.load_manifest(&Manifest::load(&manifest_path).unwrap()).unwrap();
    let gateway = startup.finish();

    let registry = gateway.registry();
    assert_eq!(registry.method_count(), 5);
    assert_eq!(registry.route_count(), 2);
    assert_eq!(registry.event_key_count(), 1);
    assert_eq!(gateway.config().stage, "dev");
}

#[test]
fn test_configured_alias_applies() {
    let gateway = gateway(GatewayConfig::from_vars([("SERVICE_ALIASES", "MailService$mail")]));
    assert!(gateway.registry().method("mail.welcome").is_some());
    assert!(gateway.registry().method("MailService.welcome").is_none());

    let plain = self::gateway(GatewayConfig::default());
    assert!(plain.registry().method("MailService.welcome").is_some());
}

#[test]
fn test_malformed_manifest_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "broken.json", r#"{"services": [{"target": 7}]}"#);
    assert!(matches!(Manifest::load(&path), Err(GatewayError::Manifest(_))));
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.json");
    assert!(matches!(GatewayConfig::load(&missing), Err(GatewayError::Io(_))));

    let bad = write(&dir, "bad.json", r#"{"log_level": "LOUD"}"#);
    assert!(matches!(GatewayConfig::load(&bad), Err(GatewayError::Config(_))));
}

#[test]
fn test_fingerprint_is_stable() {
    let a = gateway(GatewayConfig::default());
    let b = gateway(GatewayConfig::default());
    assert_eq!(a.registry().fingerprint().unwrap(), b.registry().fingerprint().unwrap());

    let renamed = gateway(GatewayConfig::from_vars([("SERVICE_ALIASES", "MailService$mail")]));
    assert_ne!(a.registry().fingerprint().unwrap(), renamed.registry().fingerprint().unwrap());
}

// =============================================================================
// DISPATCH TESTS
// =============================================================================

#[test]
fn test_role_gating_by_origin() {
    let gateway = gateway(GatewayConfig::default());
    let sync = HttpRequest::new("POST", "/users/sync");

    for (origin, allowed) in [
        (CallOrigin::Internal, true),
        (CallOrigin::External, false),
        (CallOrigin::Remote, false),
    ] {
        let ctx = CallContext::new("r", origin);
        assert_eq!(gateway.prepare_http(&ctx, &sync, None).is_ok(), allowed, "{origin}");
    }

    let ctx = CallContext::new("r", CallOrigin::Remote);
    let call = gateway
        .prepare_call("users.get", &ctx, &HttpRequest::default().with_path_param("id", "3"))
        .unwrap();
    assert_eq!(call.args, vec![Some(json!("3"))]);
    assert_eq!(call.code, None);
}

#[test]
fn test_event_fan_out() {
    let gateway = gateway(GatewayConfig::default());
    let ctx = CallContext::new("e-1", CallOrigin::Internal);

    let calls = gateway.prepare_event(&ctx, &signup()).unwrap();
    let names: Vec<String> = calls.iter().filter_map(|c| c.record.qualified_name()).collect();
    assert_eq!(names, vec!["users.onSignup", "MailService.welcome", "MailService.audit"]);

    let mut login = signup();
    login.action = "login".into();
    let calls = gateway.prepare_event(&ctx, &login).unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].record.name(), "audit");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatch() {
    let gateway = gateway(GatewayConfig::default());
    let key = RouteKey::new("GET", "/users/:id", None);

    let mut handles = Vec::new();
    for i in 0..32 {
        let gateway = gateway.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            let id = i.to_string();
            let ctx = CallContext::new(format!("r-{i}"), CallOrigin::External);
            let req = HttpRequest::new(key.verb.as_str(), key.resource.as_str()).with_path_param("id", id.as_str());
            let call = gateway.prepare_http(&ctx, &req, None).unwrap();
            assert_eq!(call.args, vec![Some(json!(id))]);
            gateway.registry().fingerprint().unwrap()
        }));
    }

    let expected = gateway.registry().fingerprint().unwrap();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), expected);
    }
}
