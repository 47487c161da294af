//! Unit tests for switchboard-core.

use crate::{CallContext, CallOrigin, GatewayConfig, GatewayError, HttpRequest, Manifest, RouteKey, Startup};
use serde_json::json;
use switchboard_registry::RouteError;

const SHOP: &str = r#"{
    "services": [
        {
            "target": "CartService",
            "methods": [
                {
                    "name": "add",
                    "signature": {"params": ["string", "Item"], "names": ["cart", "item"], "returns": "Cart"},
                    "auth": {"mode": "user", "External": true},
                    "mutation": {"input": "Item", "result": "Cart"},
                    "bindings": [
                        {"index": 0, "kind": "PathParam", "path": "cart"},
                        {"index": 1, "kind": "Body"}
                    ],
                    "routes": [{"verb": "POST", "resource": "/carts/:cart/items", "code": 201}]
                }
            ]
        },
        {
            "target": "LegacyCart",
            "alias": "legacy",
            "methods": [
                {"name": "put", "routes": [{"verb": "POST", "resource": "/carts/:cart/items"}]}
            ]
        }
    ]
}"#;

#[test]
fn test_crate_structure() {
    let _config = GatewayConfig::default();
    let gateway = Startup::new(GatewayConfig::default()).finish();
    assert!(gateway.registry().is_empty());
}

#[test]
fn test_manifest_collision_is_fatal() {
    let manifest = Manifest::from_json(SHOP).unwrap();
    let mut startup = Startup::new(GatewayConfig::from_vars([("SERVICE_ALIASES", "CartService$carts")]));
    let err = startup.load_manifest(&manifest).unwrap_err();
    assert!(matches!(err, GatewayError::Registration(_)));
    assert!(err.to_string().contains("POST /carts/:cart/items"));

    // The first service stays committed; the rival wrote nothing.
    assert!(startup.registry().method("carts.add").is_some());
    assert!(startup.registry().method("legacy.put").is_none());
}

#[test]
fn test_manifest_end_to_end() {
    let mut manifest = Manifest::from_json(SHOP).unwrap();
    manifest.services.truncate(1);

    let mut startup = Startup::new(GatewayConfig::default());
    let services = startup.load_manifest(&manifest).unwrap();
    assert_eq!(services[0].alias(), Some("CartService"));
    let gateway = startup.finish();

    let ctx = CallContext::new("r-1", CallOrigin::External);
    let req = HttpRequest::new("POST", "/carts/:cart/items")
        .with_path_param("cart", "c-9")
        .with_body(json!({"sku": "A1", "qty": 2}));
    let call = gateway.prepare_http(&ctx, &req, None).unwrap();
    assert_eq!(call.code, Some(201));
    assert_eq!(
        call.args,
        vec![Some(json!("c-9")), Some(json!({"sku": "A1", "qty": 2}))]
    );
}

#[test]
fn test_manifest_repeating_a_target_is_rejected() {
    let json = r#"{"services": [
        {"target": "UserService", "alias": "a", "methods": [
            {"name": "list", "routes": [{"verb": "GET", "resource": "/users"}]}
        ]},
        {"target": "UserService", "alias": "b", "methods": [
            {"name": "list", "routes": [{"verb": "GET", "resource": "/users"}]}
        ]}
    ]}"#;
    let mut startup = Startup::new(GatewayConfig::default());
    let err = startup.load_manifest(&Manifest::from_json(json).unwrap()).unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Registration(RouteError::DuplicateService { ref committed, .. }) if committed == "a"
    ));

    let gateway = startup.finish();
    let owner = gateway.registry().route(&RouteKey::new("GET", "/users", None)).unwrap();
    assert_eq!(owner.qualified_name().as_deref(), Some("a.list"));
    assert!(gateway.registry().method("b.list").is_none());
}
