//! Showcase of shapecast decoding
//!
//! Walks through the main behaviours: decoding KDL and JSON into records,
//! merging into pre-populated targets, embedded records, and the aggregate
//! error report.
//!
//! Run with: cargo run --example showcase

use std::collections::HashMap;

use facet::Facet;
use shapecast::{DecodeError, Value, decode, record_to_map};

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Listener {
    #[facet(rename = "_")]
    host: String,
    port: u16,
    tls: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Common {
    name: String,
    version: String,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Service {
    #[facet(flatten)]
    common: Common,
    listener: Listener,
    workers: Option<u8>,
    labels: HashMap<String, String>,
    #[facet(skip)]
    password: String,
}

fn section(title: &str) {
    println!("\n{}", "─".repeat(70));
    println!("  {title}");
    println!("{}\n", "─".repeat(70));
}

fn main() -> Result<(), DecodeError> {
    println!("\n{}", "═".repeat(70));
    println!("  shapecast Showcase");
    println!("{}", "═".repeat(70));

    section("KDL into a record");
    let kdl = r#"
name "gateway"
version "1.4.2"
listener "0.0.0.0" port=8443 {
    tls #true
}
labels team="edge" tier="1"
"#;
    println!("{}", kdl.trim());
    let mut service = Service::default();
    shapecast::kdl::decode_str(kdl, &mut service)?;
    println!("\n  => {service:#?}");

    section("JSON merged into the same record");
    let json = r#"{ "WORKERS": 4, "labels": { "tier": "2" } }"#;
    println!("{json}");
    shapecast::json::decode_str(json, &mut service)?;
    println!("\n  => workers: {:?}", service.workers);
    println!("  => labels:  {:?}", service.labels);
    println!("  => name kept: {}", service.common.name);

    section("Record back into a map");
    let map = record_to_map(&service);
    println!("{}", Value::from(map));

    section("Every error in one report");
    let broken = Value::from(serde_json::json!({
        "name": 7,
        "listener": { "port": 70000, "tls": "yes" },
        "workers": -1,
    }));
    match decode(&broken, &mut Service::default()) {
        Ok(()) => println!("unexpectedly decoded"),
        Err(err) => println!("{err}"),
    }

    println!();
    Ok(())
}
