//! # Canonical JSON and Table Fingerprints
//!
//! Schema and codegen consumers regenerate artifacts only when the routing
//! tables change. To detect that cheaply, the registry snapshot is rendered
//! in a canonical JSON form (RFC 8785 style) and hashed with SHA-256.
//!
//! ## Canonical Form
//!
//! 1. **Object keys**: sorted by UTF-16 code units
//! 2. **Arrays**: original order
//! 3. **Strings**: minimal escaping (`"`, `\` and control characters)
//! 4. **Whitespace**: none
//!
//! Snapshots hold only strings, booleans, small integers and nulls, so no
//! floating point normalization is attempted.
//!
//! ## References
//!
//! - **RFC 8785** - "JSON Canonicalization Scheme (JCS)"
//!   <https://www.rfc-editor.org/rfc/rfc8785>
//!
//! ## Example
//!
//! ```rust
//! use switchboard_registry::canonicalize::canonicalize;
//! use serde_json::json;
//!
//! let a = canonicalize(&json!({"routes": {}, "methods": {}}));
//! let b = canonicalize(&json!({"methods": {}, "routes": {}}));
//! assert_eq!(a, b);
//! assert_eq!(a, r#"{"methods":{},"routes":{}}"#);
//! ```

use crate::models::Hash;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Renders `value` in canonical form.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// SHA-256 of the canonical form of `value`.
pub fn hash_canonical(value: &Value) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(value).as_bytes());
    hasher.finalize().into()
}

/// Lowercase hex rendering of a digest.
pub fn to_hex(hash: &Hash) -> String {
    let mut out = String::with_capacity(hash.len() * 2);
    for byte in hash {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x08' => out.push_str("\\b"),
            '\x0C' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\x20' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalize_scalars() {
        assert_eq!(canonicalize(&json!(null)), "null");
        assert_eq!(canonicalize(&json!(true)), "true");
        assert_eq!(canonicalize(&json!(200)), "200");
        assert_eq!(canonicalize(&json!("GET /users")), r#""GET /users""#);
        assert_eq!(canonicalize(&json!("a\"b\\c\n")), r#""a\"b\\c\n""#);
    }

    #[test]
    fn test_canonicalize_nested_sorting() {
        let value = json!({
            "routes": {"GET /b": 1, "GET /a": 2},
            "events": [3, 1, 2]
        });
        assert_eq!(
            canonicalize(&value),
            r#"{"events":[3,1,2],"routes":{"GET /a":2,"GET /b":1}}"#
        );
    }

    #[test]
    fn test_hash_deterministic() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(hash_canonical(&a), hash_canonical(&b));
        assert_ne!(hash_canonical(&a), hash_canonical(&json!({"a": 1})));
    }

    #[test]
    fn test_to_hex() {
        let mut hash = [0u8; 32];
        hash[0] = 0xab;
        hash[31] = 0x01;
        let hex = to_hex(&hash);
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("ab00"));
        assert!(hex.ends_with("01"));
    }
}
