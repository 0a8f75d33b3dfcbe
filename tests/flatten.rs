#![allow(missing_docs)]

use facet::Facet;
use serde_json::json;
use shapecast::{Value, decode, record_to_map};

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Base {
    id: u64,
    kind: String,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Item {
    #[facet(flatten)]
    base: Base,
    name: String,
}

#[test]
fn embedded_fields_share_parent_keys() {
    let mut item = Item::default();
    decode(
        &Value::from(json!({ "id": 7, "kind": "widget", "name": "knob" })),
        &mut item,
    )
    .unwrap();

    assert_eq!(
        item,
        Item {
            base: Base {
                id: 7,
                kind: "widget".into()
            },
            name: "knob".into(),
        }
    );
}

#[test]
fn embedded_fields_are_not_nested() {
    let mut item = Item::default();
    decode(
        &Value::from(json!({ "base": { "id": 7 }, "name": "knob" })),
        &mut item,
    )
    .unwrap();

    assert_eq!(item.base, Base::default());
    assert_eq!(item.name, "knob");
}

#[test]
fn embedded_errors_use_parent_path() {
    #[derive(Debug, Default, Clone, PartialEq, Facet)]
    struct Outer {
        item: Item,
    }

    let mut outer = Outer::default();
    let err = decode(
        &Value::from(json!({ "item": { "id": "seven" } })),
        &mut outer,
    )
    .unwrap_err();

    assert_eq!(
        err.to_string(),
        "1 error(s) decoding:\n\n* 'item.id' expected type 'u64', got unconvertible type 'string'"
    );
}

#[test]
fn embedded_members_nest() {
    #[derive(Debug, Default, Clone, PartialEq, Facet)]
    struct Special {
        #[facet(flatten)]
        item: Item,
        special: bool,
    }

    let mut special = Special::default();
    decode(
        &Value::from(json!({ "id": 1, "name": "n", "special": true })),
        &mut special,
    )
    .unwrap();

    assert_eq!(special.item.base.id, 1);
    assert_eq!(special.item.name, "n");
    assert!(special.special);
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Meta {
    owner: String,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Document {
    #[facet(flatten)]
    meta: Option<Meta>,
    title: String,
}

#[test]
fn optional_embedded_allocates_on_demand() {
    let mut untouched = Document::default();
    decode(&Value::from(json!({ "title": "t" })), &mut untouched).unwrap();
    assert_eq!(untouched.meta, None);

    let mut owned = Document::default();
    decode(
        &Value::from(json!({ "title": "t", "owner": "me" })),
        &mut owned,
    )
    .unwrap();
    assert_eq!(
        owned.meta,
        Some(Meta {
            owner: "me".into()
        })
    );
}

#[test]
fn optional_embedded_merges_into_existing() {
    let mut document = Document {
        meta: Some(Meta {
            owner: "old".into(),
        }),
        title: "t".into(),
    };
    decode(&Value::from(json!({ "owner": "new" })), &mut document).unwrap();

    assert_eq!(document.meta.unwrap().owner, "new");
    assert_eq!(document.title, "t");
}

#[test]
fn embedded_round_trip() {
    let item = Item {
        base: Base {
            id: 3,
            kind: "k".into(),
        },
        name: "n".into(),
    };

    let map = record_to_map(&item);
    assert_eq!(map.len(), 3);
    assert_eq!(map.get_str("id"), Some(&Value::Uint(3)));
    assert_eq!(map.get_str("base"), None);

    let mut decoded = Item::default();
    decode(&Value::from(map), &mut decoded).unwrap();
    assert_eq!(decoded, item);
}

#[test]
fn absent_optional_embedded_is_skipped_when_expanding() {
    let document = Document {
        meta: None,
        title: "t".into(),
    };
    let map = record_to_map(&document);
    assert_eq!(map.len(), 1);
    assert_eq!(map.get_str("title"), Some(&Value::from("t")));
}
