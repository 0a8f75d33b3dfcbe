#![allow(missing_docs)]

use std::collections::HashMap;

use facet::Facet;
use serde_json::json;
use shapecast::{DecodeErrorKind, Decoder, Value, decode};

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Person {
    name: String,
    age: i64,
    emails: Vec<String>,
    extra: HashMap<String, String>,
}

#[test]
fn basic_record() {
    let input = Value::from(json!({
        "name": "Mitchell",
        "age": 91,
        "emails": ["one", "two", "three"],
        "extra": { "twitter": "mitchellh" },
    }));

    let mut person = Person::default();
    decode(&input, &mut person).unwrap();

    assert_eq!(
        person,
        Person {
            name: "Mitchell".into(),
            age: 91,
            emails: vec!["one".into(), "two".into(), "three".into()],
            extra: HashMap::from([("twitter".to_owned(), "mitchellh".to_owned())]),
        }
    );
}

#[test]
fn basic_scalars() {
    #[derive(Debug, Default, Clone, PartialEq, Facet)]
    struct Basic {
        vstring: String,
        vint: i32,
        vuint: u32,
        vbool: bool,
        vfloat: f64,
        vextra: String,
        vdata: Value,
    }

    let input = Value::from(json!({
        "vstring": "foo",
        "vint": 42,
        "Vuint": 42,
        "vbool": true,
        "Vfloat": 42.42,
        "vsilent": true,
        "vdata": 42,
    }));

    let mut basic = Basic::default();
    decode(&input, &mut basic).unwrap();

    assert_eq!(basic.vstring, "foo");
    assert_eq!(basic.vint, 42);
    assert_eq!(basic.vuint, 42);
    assert!(basic.vbool);
    assert_eq!(basic.vfloat, 42.42);
    assert_eq!(basic.vextra, "");
    assert_eq!(basic.vdata, Value::Int(42));
}

#[test]
fn numeric_families_widen() {
    #[derive(Debug, Default, Clone, PartialEq, Facet)]
    struct Numbers {
        int_from_uint: i16,
        int_from_float: i64,
        uint_from_int: u8,
        uint_from_float: u64,
        float_from_int: f32,
        float_from_uint: f64,
    }

    let input: Value = [
        ("int_from_uint", Value::Uint(7)),
        ("int_from_float", Value::Float(-3.9)),
        ("uint_from_int", Value::Int(200)),
        ("uint_from_float", Value::Float(12.7)),
        ("float_from_int", Value::Int(-2)),
        ("float_from_uint", Value::Uint(5)),
    ]
    .into_iter()
    .collect::<shapecast::Map>()
    .into();

    let mut numbers = Numbers::default();
    decode(&input, &mut numbers).unwrap();

    assert_eq!(
        numbers,
        Numbers {
            int_from_uint: 7,
            int_from_float: -3,
            uint_from_int: 200,
            uint_from_float: 12,
            float_from_int: -2.0,
            float_from_uint: 5.0,
        }
    );
}

// ============================================================================
// Merge semantics
// ============================================================================

#[test]
fn nil_input_is_a_no_op() {
    let mut person = Person {
        name: "keep".into(),
        age: 3,
        emails: vec!["a".into()],
        extra: HashMap::from([("k".to_owned(), "v".to_owned())]),
    };
    let before = person.clone();

    decode(&Value::Nil, &mut person).unwrap();
    assert_eq!(person, before);

    let input = Value::from(json!({ "name": null, "emails": null, "extra": null }));
    decode(&input, &mut person).unwrap();
    assert_eq!(person, before);
}

#[test]
fn unmentioned_fields_are_kept() {
    let mut person = Person {
        name: "old".into(),
        age: 3,
        ..Person::default()
    };

    decode(&Value::from(json!({ "name": "new" })), &mut person).unwrap();

    assert_eq!(person.name, "new");
    assert_eq!(person.age, 3);
}

#[test]
fn unknown_keys_are_ignored() {
    let mut person = Person::default();
    decode(&Value::from(json!({ "nope": 1, "age": 4 })), &mut person).unwrap();
    assert_eq!(person.age, 4);
}

// ============================================================================
// Field resolution
// ============================================================================

#[test]
fn case_insensitive_fallback() {
    #[derive(Debug, Default, Clone, PartialEq, Facet)]
    struct Flags {
        #[facet(rename = "VFoo")]
        vfoo: String,
    }

    let mut flags = Flags::default();
    decode(&Value::from(json!({ "VFOO": "folded" })), &mut flags).unwrap();
    assert_eq!(flags.vfoo, "folded");

    let mut flags = Flags::default();
    decode(
        &Value::from(json!({ "VFOO": "folded", "VFoo": "exact" })),
        &mut flags,
    )
    .unwrap();
    assert_eq!(flags.vfoo, "exact");
}

#[test]
fn folded_keys_are_used_once() {
    #[derive(Debug, Default, Clone, PartialEq, Facet)]
    struct Twice {
        #[facet(rename = "Name")]
        first: String,
        #[facet(rename = "NAME")]
        second: String,
    }

    let mut twice = Twice::default();
    decode(&Value::from(json!({ "name": "x" })), &mut twice).unwrap();

    assert_eq!(twice.first, "x");
    assert_eq!(twice.second, "");
}

// ============================================================================
// Decoder
// ============================================================================

#[test]
fn decoder_with_result() {
    let mut ports: Vec<u16> = Vec::new();
    let mut decoder = Decoder::new(&mut ports);
    decoder.decode(&Value::from(vec![80, 443])).unwrap();
    decoder.decode(&Value::from(vec![8080])).unwrap();
    drop(decoder);

    assert_eq!(ports, [8080, 443]);
}

#[test]
fn decoder_without_result() {
    let err = Decoder::<Vec<u16>>::default().decode(&Value::from(1)).unwrap_err();
    assert!(matches!(
        err.kind(),
        DecodeErrorKind::Usage("result must be a pointer")
    ));
    assert_eq!(err.to_string(), "result must be a pointer");
    assert!(err.field_errors().is_empty());
}
