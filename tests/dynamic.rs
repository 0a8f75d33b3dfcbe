#![allow(missing_docs)]

use facet::Facet;
use serde_json::json;
use shapecast::{FieldErrorKind, Map, Number, Record, Value, decode};

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Server {
    host: String,
    port: u16,
}

#[test]
fn empty_slot_takes_the_source() {
    let mut slot = Value::Nil;
    let input = Value::from(json!({ "a": [1, "two"] }));
    decode(&input, &mut slot).unwrap();
    assert_eq!(slot, input);
}

#[test]
fn held_scalar_is_decoded_in_place() {
    let mut slot = Value::Int(1);
    decode(&Value::Uint(5), &mut slot).unwrap();
    assert_eq!(slot, Value::Int(5));

    let err = decode(&Value::from("x"), &mut slot).unwrap_err();
    assert_eq!(slot, Value::Int(5));
    assert_eq!(
        err.to_string(),
        "1 error(s) decoding:\n\n* '' expected type 'i64', got unconvertible type 'string'"
    );
}

#[test]
fn held_number_only_takes_numerals() {
    let mut slot = Value::Number(Number::new("1"));

    let err = decode(&Value::from("abc"), &mut slot).unwrap_err();
    assert_eq!(slot, Value::Number(Number::new("1")));
    assert!(matches!(
        err.field_errors()[0].kind(),
        FieldErrorKind::InvalidNumber { .. }
    ));

    let err = decode(&Value::Bool(true), &mut slot).unwrap_err();
    assert_eq!(slot, Value::Number(Number::new("1")));
    assert_eq!(err.field_errors().len(), 1);

    decode(&Value::from("2.5"), &mut slot).unwrap();
    assert_eq!(slot, Value::Number(Number::new("2.5")));

    decode(&Value::Uint(7), &mut slot).unwrap();
    assert_eq!(slot, Value::Number(Number::new("7")));
}

#[test]
fn held_sequence_is_written_in_place() {
    let mut slot = Value::from(vec![1, 2]);
    decode(&Value::from(vec![5]), &mut slot).unwrap();
    assert_eq!(slot, Value::from(vec![5, 2]));
}

#[test]
fn held_map_merges() {
    let mut slot = Value::from(json!({ "a": 1 }));
    decode(&Value::from(json!({ "b": 2 })), &mut slot).unwrap();

    let expected: Map = [("a", 1), ("b", 2)].into_iter().collect();
    assert_eq!(slot, Value::Map(expected));
}

#[test]
fn held_record_is_decoded_field_by_field() {
    let mut slot = Value::from(Record::new(Server {
        host: "h".into(),
        port: 1,
    }));
    decode(&Value::from(json!({ "port": 9 })), &mut slot).unwrap();

    let Value::Record(record) = &slot else {
        panic!("expected a record, got {slot:?}");
    };
    assert_eq!(
        record.downcast_ref::<Server>(),
        Some(&Server {
            host: "h".into(),
            port: 9,
        })
    );
}

#[test]
fn dynamic_fields() {
    #[derive(Debug, Default, Clone, PartialEq, Facet)]
    struct Envelope {
        kind: String,
        payload: Value,
    }

    let mut envelope = Envelope::default();
    decode(
        &Value::from(json!({ "kind": "ping", "payload": { "seq": [1, 2] } })),
        &mut envelope,
    )
    .unwrap();

    assert_eq!(envelope.kind, "ping");
    assert_eq!(envelope.payload, Value::from(json!({ "seq": [1, 2] })));
}

#[test]
fn records_decode_into_records() {
    let server = Server {
        host: "h".into(),
        port: 2,
    };
    let mut slot = Value::Nil;
    decode(&Value::from(Record::new(server.clone())), &mut slot).unwrap();

    let mut copy = Server::default();
    decode(&slot, &mut copy).unwrap();
    assert_eq!(copy, server);
}
