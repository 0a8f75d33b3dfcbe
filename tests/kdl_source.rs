#![allow(missing_docs)]

use facet::Facet;
use indoc::indoc;
use shapecast::{DecodeErrorKind, kdl};

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Server {
    #[facet(rename = "_")]
    host: String,
    port: u16,
    tls: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Package {
    name: String,
    version: String,
    authors: Vec<String>,
    dependency: Vec<String>,
    server: Server,
}

#[test]
fn canon_example() {
    let source = indoc! {r#"
        name "shapecast"
        version "0.28.0"
        authors "Brooks" "Amos"
        dependency "log"
        dependency "kdl"
        server "localhost" port=8080 {
            tls #true
        }
    "#};

    let mut package = Package::default();
    kdl::decode_str(source, &mut package).unwrap();

    assert_eq!(
        package,
        Package {
            name: "shapecast".into(),
            version: "0.28.0".into(),
            authors: vec!["Brooks".into(), "Amos".into()],
            dependency: vec!["log".into(), "kdl".into()],
            server: Server {
                host: "localhost".into(),
                port: 8080,
                tls: true,
            },
        }
    );
}

#[test]
fn case_insensitive_node_names() {
    let mut server = Server::default();
    kdl::decode_str(
        indoc! {r#"
            PORT 1
            Tls #true
        "#},
        &mut server,
    )
    .unwrap();

    assert_eq!(server.port, 1);
    assert!(server.tls);
}

#[test]
fn null_arguments_are_absent() {
    let mut server = Server {
        port: 9,
        ..Server::default()
    };
    kdl::decode_str("port #null", &mut server).unwrap();
    assert_eq!(server.port, 9);
}

#[test]
fn conversion_errors_carry_node_paths() {
    let mut package = Package::default();
    let err = kdl::decode_str(
        indoc! {r#"
            server "localhost" port="eighty"
        "#},
        &mut package,
    )
    .unwrap_err();

    assert_eq!(
        err.to_string(),
        "1 error(s) decoding:\n\n* 'server.port' expected type 'u16', got unconvertible type 'string'"
    );
    assert_eq!(package.server.host, "localhost");
}

#[test]
fn parse_errors_are_not_aggregated() {
    let mut package = Package::default();
    let err = kdl::decode_str(r#"name "unterminated"#, &mut package).unwrap_err();
    assert!(matches!(err.kind(), DecodeErrorKind::Kdl(_)));
    assert!(err.field_errors().is_empty());
}
