//! Building [`Value`] trees from KDL documents.
//!
//! A document becomes a map keyed by node name:
//!
//! - a node with one argument and nothing else becomes that scalar,
//! - a node with several arguments becomes a sequence,
//! - a node with properties or children becomes a map, with any arguments
//!   stored under the `_` key,
//! - a node name repeated in one document collects its values into a
//!   sequence.
//!
//! ```
//! use facet::Facet;
//! use shapecast::kdl;
//!
//! #[derive(Debug, Default, Facet)]
//! struct Server {
//!     host: String,
//!     port: u16,
//! }
//!
//! let mut server = Server::default();
//! kdl::decode_str(r#"host "localhost"; port 8080"#, &mut server)?;
//! assert_eq!(server.port, 8080);
//! # Ok::<(), shapecast::DecodeError>(())
//! ```

use ::kdl::{KdlDocument, KdlNode, KdlValue};
use facet_core::Facet;

use crate::{
    decode::decode,
    error::DecodeError,
    value::{Map, Number, Value},
};

/// The key node arguments are stored under when a node also has properties
/// or children.
pub const ARGUMENTS_KEY: &str = "_";

/// Parses `source` as KDL and decodes it into `output`.
pub fn decode_str<T: Facet<'static>>(source: &str, output: &mut T) -> Result<(), DecodeError> {
    log::trace!("Parsing KDL source");
    let document: KdlDocument = source.parse()?;
    decode(&document_to_value(&document), output)
}

/// Converts a whole document into a [`Value::Map`].
pub fn document_to_value(document: &KdlDocument) -> Value {
    Value::Map(document_to_map(document))
}

/// Converts a whole document into a [`Map`] keyed by node name.
pub fn document_to_map(document: &KdlDocument) -> Map {
    let mut groups: Vec<(&str, Vec<Value>)> = Vec::new();
    for node in document.nodes() {
        let name = node.name().value();
        let value = node_to_value(node);
        match groups.iter_mut().find(|(group, _)| *group == name) {
            Some((_, values)) => {
                log::trace!("Collecting repeated node `{name}`");
                values.push(value);
            }
            None => groups.push((name, vec![value])),
        }
    }
    groups
        .into_iter()
        .map(|(name, values)| (name, collapse(values)))
        .collect()
}

/// Converts one node, ignoring its name.
pub fn node_to_value(node: &KdlNode) -> Value {
    let mut arguments = Vec::new();
    let mut properties = Vec::new();
    for entry in node.entries() {
        let value = kdl_value(entry.value());
        match entry.name() {
            Some(name) => properties.push((name.value(), value)),
            None => arguments.push(value),
        }
    }

    if properties.is_empty() && node.children().is_none() {
        return collapse(arguments);
    }

    let mut map = Map::new();
    if !arguments.is_empty() {
        map.insert(ARGUMENTS_KEY, collapse(arguments));
    }
    for (name, value) in properties {
        map.insert(name, value);
    }
    if let Some(children) = node.children() {
        for (key, value) in document_to_map(children) {
            map.insert(key, value);
        }
    }
    Value::Map(map)
}

/// Nothing is nil, one value stands alone, several form a sequence.
fn collapse(mut values: Vec<Value>) -> Value {
    match values.len() {
        0 => Value::Nil,
        1 => values.pop().unwrap_or_default(),
        _ => Value::Seq(values),
    }
}

/// Converts a scalar. Integers become [`Value::Int`] when they fit `i64`,
/// then [`Value::Uint`], and otherwise a deferred [`Number`].
pub fn kdl_value(value: &KdlValue) -> Value {
    match value {
        KdlValue::String(text) => Value::Text(text.clone()),
        KdlValue::Integer(integer) => {
            let integer = *integer;
            if let Ok(i) = i64::try_from(integer) {
                Value::Int(i)
            } else if let Ok(u) = u64::try_from(integer) {
                Value::Uint(u)
            } else {
                Value::Number(Number::new(integer.to_string()))
            }
        }
        KdlValue::Float(float) => Value::Float(*float),
        KdlValue::Bool(b) => Value::Bool(*b),
        KdlValue::Null => Value::Nil,
    }
}
