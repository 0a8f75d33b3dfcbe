#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

mod decode;
mod encode;
mod error;
mod shape;
mod value;

#[cfg(feature = "json")]
pub mod json;
#[cfg(feature = "kdl")]
pub mod kdl;

pub use decode::{Decoder, decode};
pub use encode::{is_empty_value, record_to_map, to_value};
pub use error::{
    AggregateError, DecodeError, DecodeErrorKind, FieldError, FieldErrorKind, Mismatch, Overflow,
};
pub use facet_core::{Facet, Shape};
pub use facet_reflect::{Peek, ReflectError};
pub use shape::Kind;
pub use value::{Func, Map, Number, Record, Value};
