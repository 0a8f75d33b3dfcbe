//! The untyped input tree.

use std::{
    borrow::Cow,
    fmt,
    num::{ParseFloatError, ParseIntError},
    rc::Rc,
};

use facet_core::{Def, Facet, Shape, Type, UserType, value_vtable};
use facet_reflect::{HeapValue, Peek};

use crate::encode;

/// An untyped node, as produced by a configuration parser.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absent input. Decoding `Nil` never modifies the target.
    #[default]
    Nil,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    Uint(u64),
    /// A floating point number.
    Float(f64),
    /// A numeral whose precision is decided by the target.
    Number(Number),
    /// Text.
    Text(String),
    /// A sequence or fixed array.
    Seq(Vec<Value>),
    /// A mapping.
    Map(Map),
    /// A concrete record instance.
    Record(Record),
    /// A callable reference.
    Func(Func),
}

impl Value {
    /// Whether this is [`Value::Nil`].
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Returns the text if this is [`Value::Text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Names the kind of this value for diagnostics.
    pub fn kind_name(&self) -> Cow<'static, str> {
        match self {
            Value::Nil => "nil".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Uint(_) => "uint".into(),
            Value::Float(_) => "float".into(),
            Value::Number(_) => "number".into(),
            Value::Text(_) => "string".into(),
            Value::Seq(_) => "sequence".into(),
            Value::Map(_) => "map".into(),
            Value::Record(record) => record.shape().to_string().into(),
            Value::Func(func) => func.shape().to_string().into(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Uint(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Number(n) => f.write_str(n.as_str()),
            Value::Text(text) => f.write_str(text),
            Value::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("map[")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{key}:{value}")?;
                }
                f.write_str("]")
            }
            Value::Record(record) => write!(f, "{}", record.shape()),
            Value::Func(func) => write!(f, "{}", func.shape()),
        }
    }
}

macro_rules! impl_from {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_from!(Bool: bool);
impl_from!(Int: i8, i16, i32, i64);
impl_from!(Uint: u8, u16, u32, u64);
impl_from!(Float: f32, f64);
impl_from!(Text: String, &str);
impl_from!(Number: Number);
impl_from!(Map: Map);
impl_from!(Record: Record);
impl_from!(Func: Func);

impl From<isize> for Value {
    fn from(value: isize) -> Self {
        Value::Int(value as i64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Uint(value as u64)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Nil, Into::into)
    }
}

/// An insertion-ordered mapping from [`Value`] keys to [`Value`]s.
///
/// Keys are compared by equality, so any value can be a key. Inserting an
/// equal key overwrites the previous entry in place.
#[derive(Clone, Debug, Default)]
pub struct Map {
    entries: Vec<(Value, Value)>,
}

impl Map {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the value stored under `key`.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Looks up the value stored under the text key `key`.
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Inserts or overwrites, returning the previous value.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub(crate) fn entry_at(&self, index: usize) -> Option<(&Value, &Value)> {
        self.entries.get(index).map(|(k, v)| (k, v))
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Map::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl IntoIterator for Map {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A numeral kept as text until a target decides its precision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Number(pub(crate) String);

impl Number {
    /// Wraps numeral text. The text is not validated until it is parsed.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The numeral text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the numeral as a signed integer.
    pub fn as_i64(&self) -> Result<i64, ParseIntError> {
        self.0.parse()
    }

    /// Parses the numeral as a float.
    pub fn as_f64(&self) -> Result<f64, ParseFloatError> {
        self.0.parse()
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value owned behind an erased record or callable.
trait Stored {
    fn peek(&self) -> Peek<'_, 'static>;
}

struct Owned<T>(T);

impl<T: Facet<'static>> Stored for Owned<T> {
    fn peek(&self) -> Peek<'_, 'static> {
        Peek::new(&self.0)
    }
}

/// A value assembled by reflection, e.g. a decoded record.
struct Built(HeapValue<'static>);

impl Stored for Built {
    fn peek(&self) -> Peek<'_, 'static> {
        self.0.peek()
    }
}

fn downcast<'a, T: Facet<'static>>(peek: Peek<'a, 'static>) -> Option<&'a T> {
    // SAFETY: the shape check guarantees the pointee is a `T`.
    peek.shape()
        .is_type::<T>()
        .then(|| unsafe { peek.data().get::<T>() })
}

/// A concrete record instance carried as input.
#[derive(Clone)]
pub struct Record(Rc<dyn Stored>);

impl Record {
    /// Wraps a record, i.e. any `#[derive(Facet)]` struct.
    pub fn new<T: Facet<'static> + 'static>(record: T) -> Self {
        Self(Rc::new(Owned(record)))
    }

    pub(crate) fn from_heap(value: HeapValue<'static>) -> Self {
        Self(Rc::new(Built(value)))
    }

    /// The shape of the carried record.
    pub fn shape(&self) -> &'static Shape {
        self.peek().shape()
    }

    /// Reads the record through reflection.
    pub fn peek(&self) -> Peek<'_, 'static> {
        self.0.peek()
    }

    /// Returns the record if it is a `T`.
    pub fn downcast_ref<T: Facet<'static>>(&self) -> Option<&T> {
        downcast(self.peek())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(&self.shape().to_string())
            .field(&encode::peek_to_map(self.peek()))
            .finish()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape()
            && encode::peek_to_map(self.peek()) == encode::peek_to_map(other.peek())
    }
}

/// A callable reference: a function pointer such as `fn() -> String`.
#[derive(Clone)]
pub struct Func(Rc<dyn Stored>);

impl Func {
    /// Wraps a function pointer.
    pub fn new<F: Facet<'static> + 'static>(callable: F) -> Self {
        Self(Rc::new(Owned(callable)))
    }

    pub(crate) fn from_heap(value: HeapValue<'static>) -> Self {
        Self(Rc::new(Built(value)))
    }

    /// The callable's shape; its display form is the signature.
    pub fn shape(&self) -> &'static Shape {
        self.0.peek().shape()
    }

    pub(crate) fn peek(&self) -> Peek<'_, 'static> {
        self.0.peek()
    }

    /// Returns the callable if it is an `F`.
    pub fn downcast_ref<F: Facet<'static>>(&self) -> Option<&F> {
        downcast(self.0.peek())
    }
}

impl PartialEq for Func {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.peek() == other.peek()
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Func({})", self.shape())
    }
}

// SAFETY: the shape is built from `Value` itself and describes it as opaque.
unsafe impl Facet<'_> for Value {
    const SHAPE: &'static Shape = &const {
        Shape::builder_for_sized::<Self>()
            .vtable(value_vtable!(Value, |f, _opts| write!(
                f,
                "{}",
                Self::SHAPE.type_identifier
            )))
            .type_identifier("Value")
            .ty(Type::User(UserType::Opaque))
            .def(Def::Scalar)
            .build()
    };
}

// SAFETY: as for `Value`.
unsafe impl Facet<'_> for Map {
    const SHAPE: &'static Shape = &const {
        Shape::builder_for_sized::<Self>()
            .vtable(value_vtable!(Map, |f, _opts| write!(
                f,
                "{}",
                Self::SHAPE.type_identifier
            )))
            .type_identifier("Map")
            .ty(Type::User(UserType::Opaque))
            .def(Def::Scalar)
            .build()
    };
}
