//! The shape inspector: sorts a facet [`Shape`] into the kind family the
//! converters dispatch on, and reads the per-field attributes they honour.

use std::fmt;

use facet_core::{
    Def, Field, FieldAttribute, FieldFlags, PointerType, SequenceType, Shape, StructType,
    Type, UserType,
};
use facet_reflect::ScalarType;

use crate::value::{Map, Value};

/// The structural kind of a target or of a reflected value.
///
/// All integer widths collapse into [`Kind::Int`], all unsigned widths into
/// [`Kind::Uint`] and both float widths into [`Kind::Float`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// `bool`
    Bool,
    /// `String`
    Text,
    /// Signed integers of any width
    Int,
    /// Unsigned integers of any width
    Uint,
    /// `f32` / `f64`
    Float,
    /// Key/value collections
    Map,
    /// Growable sequences
    Seq,
    /// Fixed-length arrays
    Array,
    /// Structs with named fields
    Record,
    /// `Option<T>` and owning smart pointers
    Pointer,
    /// A slot that accepts any [`Value`](crate::Value)
    Dynamic,
    /// Function pointers
    Func,
    /// A type no converter handles
    Opaque,
}

impl Kind {
    /// Classifies `shape`.
    ///
    /// ```
    /// use shapecast::{Facet, Kind, Value};
    ///
    /// assert_eq!(Kind::of(u16::SHAPE), Kind::Uint);
    /// assert_eq!(Kind::of(<Vec<String>>::SHAPE), Kind::Seq);
    /// assert_eq!(Kind::of(<Option<Box<u8>>>::SHAPE), Kind::Pointer);
    /// assert_eq!(Kind::of(Value::SHAPE), Kind::Dynamic);
    /// assert_eq!(Kind::of(<()>::SHAPE), Kind::Opaque);
    /// ```
    pub fn of(shape: &Shape) -> Kind {
        if shape.is_type::<Value>() || shape.is_type::<Map>() {
            return Kind::Dynamic;
        }
        if let Some(scalar) = ScalarType::try_from_shape(shape) {
            return match scalar {
                ScalarType::Bool => Kind::Bool,
                ScalarType::String => Kind::Text,
                ScalarType::I8
                | ScalarType::I16
                | ScalarType::I32
                | ScalarType::I64
                | ScalarType::I128
                | ScalarType::ISize => Kind::Int,
                ScalarType::U8
                | ScalarType::U16
                | ScalarType::U32
                | ScalarType::U64
                | ScalarType::U128
                | ScalarType::USize => Kind::Uint,
                ScalarType::F32 | ScalarType::F64 => Kind::Float,
                _ => Kind::Opaque,
            };
        }
        if let Type::Pointer(PointerType::Function(_)) = shape.ty {
            return Kind::Func;
        }
        match shape.def {
            Def::Map(_) => return Kind::Map,
            Def::List(_) => return Kind::Seq,
            Def::Option(_) => return Kind::Pointer,
            Def::Pointer(def) if def.constructible_from_pointee() => {
                if def.pointee().is_some_and(|pointee| pointee.layout.sized_layout().is_ok()) {
                    return Kind::Pointer;
                }
            }
            _ => {}
        }
        match shape.ty {
            Type::Sequence(SequenceType::Array(_)) => Kind::Array,
            Type::User(UserType::Struct(_)) => Kind::Record,
            _ => Kind::Opaque,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Bool => "bool",
            Kind::Text => "string",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Float => "float",
            Kind::Map => "map",
            Kind::Seq => "sequence",
            Kind::Array => "array",
            Kind::Record => "record",
            Kind::Pointer => "pointer",
            Kind::Dynamic => "dynamic",
            Kind::Func => "func",
            Kind::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// The struct layout of `shape`, if it is a record.
pub(crate) fn struct_type(shape: &Shape) -> Option<StructType> {
    match shape.ty {
        Type::User(UserType::Struct(struct_type)) => Some(struct_type),
        _ => None,
    }
}

/// Fields marked `#[facet(skip)]` or renamed to `-` are never read or
/// written by the engine.
pub(crate) fn is_skipped(field: &Field) -> bool {
    field.name == "-" || field.attributes.contains(&FieldAttribute::Arbitrary("skip"))
}

/// `#[facet(omitempty)]`: drop the field from expanded maps when empty.
pub(crate) fn omits_empty(field: &Field) -> bool {
    field
        .attributes
        .contains(&FieldAttribute::Arbitrary("omitempty"))
}

/// `#[facet(flatten)]` on a record or optional record member.
pub(crate) fn flattened_record(field: &Field) -> bool {
    if !field.flags.contains(FieldFlags::FLATTEN) {
        return false;
    }
    let shape = field.shape();
    match shape.def {
        Def::Option(option) => struct_type(option.t).is_some(),
        _ => struct_type(shape).is_some(),
    }
}
