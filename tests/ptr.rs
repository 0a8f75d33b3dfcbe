#![allow(missing_docs)]

use facet::Facet;
use serde_json::json;
use shapecast::{Value, decode};

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Server {
    host: String,
    port: u32,
}

// ============================================================================
// Option<T>
// ============================================================================

#[test]
fn option_allocates_pointee() {
    let mut port: Option<u32> = None;
    decode(&Value::from(5), &mut port).unwrap();
    assert_eq!(port, Some(5));
}

#[test]
fn option_ignores_nil() {
    let mut port = Some(1u32);
    decode(&Value::Nil, &mut port).unwrap();
    assert_eq!(port, Some(1));
}

#[test]
fn option_discards_failed_pointee() {
    let mut server: Option<Server> = None;
    let err = decode(
        &Value::from(json!({ "host": "h", "port": "eighty" })),
        &mut server,
    )
    .unwrap_err();

    assert_eq!(server, None);
    assert_eq!(
        err.to_string(),
        "1 error(s) decoding:\n\n* 'port' expected type 'u32', got unconvertible type 'string'"
    );
}

#[test]
fn option_merges_into_existing_pointee() {
    let mut server = Some(Server {
        host: "kept".into(),
        port: 1,
    });
    decode(&Value::from(json!({ "port": 2 })), &mut server).unwrap();

    assert_eq!(
        server,
        Some(Server {
            host: "kept".into(),
            port: 2,
        })
    );
}

#[test]
fn option_fields() {
    #[derive(Debug, Default, Clone, PartialEq, Facet)]
    struct Config {
        server: Option<Server>,
        retries: Option<u8>,
        timeout: Option<f64>,
    }

    let mut config = Config::default();
    decode(
        &Value::from(json!({ "server": { "host": "h" }, "retries": 3 })),
        &mut config,
    )
    .unwrap();

    assert_eq!(
        config,
        Config {
            server: Some(Server {
                host: "h".into(),
                port: 0,
            }),
            retries: Some(3),
            timeout: None,
        }
    );
}

// ============================================================================
// Box<T>
// ============================================================================

#[test]
fn box_is_transparent() {
    #[derive(Debug, Default, Clone, PartialEq, Facet)]
    struct Boxed {
        value: Box<u32>,
        server: Box<Server>,
    }

    let mut boxed = Boxed::default();
    decode(
        &Value::from(json!({ "value": 42, "server": { "port": 7 } })),
        &mut boxed,
    )
    .unwrap();

    assert_eq!(*boxed.value, 42);
    assert_eq!(boxed.server.port, 7);
}

#[test]
fn box_reports_inner_type() {
    let mut value: Box<u8> = Box::default();
    let err = decode(&Value::from("x"), &mut value).unwrap_err();
    assert_eq!(
        err.to_string(),
        "1 error(s) decoding:\n\n* '' expected type 'u8', got unconvertible type 'string'"
    );
}
