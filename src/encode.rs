//! Turning reflected values back into input [`Value`]s.

use facet_core::{Def, Facet};
use facet_reflect::{Peek, ScalarType};

use crate::{
    decode::copy_to_heap,
    shape::{Kind, flattened_record, is_skipped, omits_empty},
    value::{Func, Map, Record, Value},
};

/// Converts any reflected value into an input [`Value`].
///
/// Records become [`Value::Record`] and keep their concrete type; use
/// [`record_to_map`] to expand one into a map instead.
pub fn to_value<T: Facet<'static> + ?Sized>(value: &T) -> Value {
    peek_to_value(Peek::new(value))
}

pub(crate) fn peek_to_value(peek: Peek<'_, 'static>) -> Value {
    if let Ok(value) = peek.get::<Value>() {
        return value.clone();
    }
    if let Ok(map) = peek.get::<Map>() {
        return Value::Map(map.clone());
    }
    match Kind::of(peek.shape()) {
        Kind::Bool => peek.get::<bool>().map_or(Value::Nil, |b| Value::Bool(*b)),
        Kind::Text => peek.as_str().map_or(Value::Nil, Value::from),
        Kind::Int => int_of(peek).map_or(Value::Nil, Value::Int),
        Kind::Uint => uint_of(peek).map_or(Value::Nil, Value::Uint),
        Kind::Float => float_of(peek).map_or(Value::Nil, Value::Float),
        Kind::Seq | Kind::Array => peek.into_list_like().map_or(Value::Nil, |list| {
            Value::Seq(list.iter().map(peek_to_value).collect())
        }),
        Kind::Map => peek.into_map().map_or(Value::Nil, |map| {
            Value::Map(
                map.iter()
                    .map(|(key, value)| (peek_to_value(key), peek_to_value(value)))
                    .collect(),
            )
        }),
        Kind::Pointer => pointee(peek).map_or(Value::Nil, peek_to_value),
        Kind::Record => match copy_to_heap(peek) {
            Ok(record) => Value::Record(Record::from_heap(record)),
            Err(error) => {
                log::debug!("Cannot copy {} ({error}), expanding it", peek.shape());
                Value::Map(peek_to_map(peek))
            }
        },
        Kind::Func => copy_to_heap(peek).map_or(Value::Nil, |func| Value::Func(Func::from_heap(func))),
        Kind::Dynamic | Kind::Opaque => {
            log::debug!("{} has no input representation, using nil", peek.shape());
            Value::Nil
        }
    }
}

/// Expands a record into a map keyed by field name (after `rename`).
///
/// Fields marked `#[facet(skip)]` or renamed to `-` are left out, as are
/// `#[facet(omitempty)]` fields holding an empty value (see
/// [`is_empty_value`]). A field that is itself a record becomes a nested map.
/// Members of flattened records are promoted into this map rather than
/// nested under their own key.
///
/// ```
/// use facet::Facet;
/// use shapecast::{Value, record_to_map};
///
/// #[derive(Facet)]
/// struct Server {
///     #[facet(rename = "listen_port")]
///     port: u16,
///     #[facet(omitempty)]
///     name: String,
/// }
///
/// let map = record_to_map(&Server { port: 80, name: String::new() });
/// assert_eq!(map.get_str("listen_port"), Some(&Value::Uint(80)));
/// assert_eq!(map.len(), 1);
/// ```
pub fn record_to_map<T: Facet<'static> + ?Sized>(record: &T) -> Map {
    peek_to_map(Peek::new(record))
}

pub(crate) fn peek_to_map(peek: Peek<'_, 'static>) -> Map {
    let mut map = Map::new();
    expand_record(peek, &mut map);
    map
}

fn expand_record(peek: Peek<'_, 'static>, map: &mut Map) {
    let Ok(record) = peek.into_struct() else {
        return;
    };
    for (index, field) in record.ty().fields.iter().enumerate() {
        if is_skipped(field) {
            continue;
        }
        let Ok(value) = record.field(index) else {
            continue;
        };

        if omits_empty(field) && is_empty_value(value) {
            log::trace!("Omitting empty field `{}`", field.name);
            continue;
        }

        if flattened_record(field) {
            match value.shape().def {
                Def::Option(_) => {
                    if let Some(inner) = pointee(value) {
                        expand_record(inner, map);
                    }
                }
                _ => expand_record(value, map),
            }
            continue;
        }

        let entry = match Kind::of(value.shape()) {
            Kind::Record => Value::Map(peek_to_map(value)),
            _ => peek_to_value(value),
        };
        map.insert(field.name, entry);
    }
}

/// Whether a value counts as empty for `omitempty`.
///
/// Zero numbers, `false`, empty text, maps, sequences and arrays, `None` and
/// nil dynamic slots are empty. Records, owning pointers and callables never
/// are.
///
/// ```
/// use shapecast::{Peek, is_empty_value};
///
/// assert!(is_empty_value(Peek::new(&0u8)));
/// assert!(is_empty_value(Peek::new(&None::<String>)));
/// assert!(!is_empty_value(Peek::new(&vec![0u8])));
/// ```
pub fn is_empty_value(peek: Peek<'_, '_>) -> bool {
    if let Ok(value) = peek.get::<Value>() {
        return value.is_nil();
    }
    if let Ok(map) = peek.get::<Map>() {
        return map.is_empty();
    }
    match Kind::of(peek.shape()) {
        Kind::Bool => peek.get::<bool>().is_ok_and(|b| !*b),
        Kind::Text => peek.as_str().is_some_and(str::is_empty),
        Kind::Int => int_of(peek) == Some(0),
        Kind::Uint => uint_of(peek) == Some(0),
        Kind::Float => float_of(peek) == Some(0.0),
        Kind::Map => peek.into_map().is_ok_and(|map| map.is_empty()),
        Kind::Seq | Kind::Array => peek.into_list_like().is_ok_and(|list| list.is_empty()),
        Kind::Pointer => peek.into_option().is_ok_and(|option| option.is_none()),
        Kind::Record | Kind::Func | Kind::Dynamic | Kind::Opaque => false,
    }
}

/// The pointee of an `Option` or owning pointer, if there is one.
fn pointee<'mem, 'facet>(peek: Peek<'mem, 'facet>) -> Option<Peek<'mem, 'facet>> {
    match peek.shape().def {
        Def::Option(_) => peek.into_option().ok()?.value(),
        _ => peek.into_pointer().ok()?.borrow_inner(),
    }
}

fn int_of(peek: Peek<'_, '_>) -> Option<i64> {
    Some(match peek.scalar_type()? {
        ScalarType::I8 => i64::from(*peek.get::<i8>().ok()?),
        ScalarType::I16 => i64::from(*peek.get::<i16>().ok()?),
        ScalarType::I32 => i64::from(*peek.get::<i32>().ok()?),
        ScalarType::I64 => *peek.get::<i64>().ok()?,
        ScalarType::ISize => i64::try_from(*peek.get::<isize>().ok()?).ok()?,
        ScalarType::I128 => i64::try_from(*peek.get::<i128>().ok()?).ok()?,
        _ => return None,
    })
}

fn uint_of(peek: Peek<'_, '_>) -> Option<u64> {
    Some(match peek.scalar_type()? {
        ScalarType::U8 => u64::from(*peek.get::<u8>().ok()?),
        ScalarType::U16 => u64::from(*peek.get::<u16>().ok()?),
        ScalarType::U32 => u64::from(*peek.get::<u32>().ok()?),
        ScalarType::U64 => *peek.get::<u64>().ok()?,
        ScalarType::USize => u64::try_from(*peek.get::<usize>().ok()?).ok()?,
        ScalarType::U128 => u64::try_from(*peek.get::<u128>().ok()?).ok()?,
        _ => return None,
    })
}

fn float_of(peek: Peek<'_, '_>) -> Option<f64> {
    match peek.scalar_type()? {
        ScalarType::F32 => peek.get::<f32>().ok().map(|x| f64::from(*x)),
        ScalarType::F64 => peek.get::<f64>().ok().copied(),
        _ => None,
    }
}
