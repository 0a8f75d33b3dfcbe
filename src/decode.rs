//! The conversion engine: a recursive, target-directed walk over a [`Value`]
//! tree.
//!
//! The target is rebuilt through a [`Partial`] while its current contents are
//! read through a [`Peek`], so anything the input does not mention keeps its
//! old value. Every call site gets a path for diagnostics. Container
//! converters keep going after a failed element so one decode reports every
//! problem.

use std::borrow::Cow;

use facet_core::{Def, Facet, SequenceType, Shape, Type};
use facet_reflect::{HeapValue, Partial, Peek, ReflectError, ScalarType};

use crate::{
    encode::peek_to_map,
    error::{
        AggregateError, DecodeError, DecodeErrorKind, FieldError, FieldErrorKind, Mismatch,
        Overflow,
    },
    shape::{Kind, flattened_record, is_skipped, struct_type},
    value::{Map, Number, Record, Value},
};

/// Decodes `input` into `output`, merging into whatever `output` already
/// holds.
///
/// Every leaf failure is collected; if there were any, the returned error is
/// an [`AggregateError`](crate::AggregateError) listing all of them.
///
/// ```
/// use shapecast::{Value, decode};
///
/// let mut ports: Vec<u16> = Vec::new();
/// decode(&Value::from(vec![80, 443]), &mut ports)?;
/// assert_eq!(ports, [80, 443]);
/// # Ok::<(), shapecast::DecodeError>(())
/// ```
pub fn decode<T: Facet<'static>>(input: &Value, output: &mut T) -> Result<(), DecodeError> {
    Decoder::new(output).decode(input)
}

/// A decoder bound to its result slot.
///
/// A decoder built with [`Decoder::default`] has nowhere to write and fails
/// every decode with a usage error.
pub struct Decoder<'a, T> {
    result: Option<&'a mut T>,
}

impl<T> Default for Decoder<'_, T> {
    fn default() -> Self {
        Self { result: None }
    }
}

impl<'a, T: Facet<'static>> Decoder<'a, T> {
    /// A decoder writing into `result`.
    pub fn new(result: &'a mut T) -> Self {
        Self {
            result: Some(result),
        }
    }

    /// Decodes `input` into the result slot.
    ///
    /// Conversion failures still leave every successfully decoded part in
    /// the result. A [`DecodeErrorKind::Reflect`] error means the result
    /// could not be assembled at all and is left untouched.
    pub fn decode(&mut self, input: &Value) -> Result<(), DecodeError> {
        let Some(result) = self.result.as_deref_mut() else {
            return Err(DecodeErrorKind::Usage("result must be a pointer").into());
        };
        let mut partial = Partial::alloc::<T>()?;
        let mut converter = Converter::default();
        converter.convert("", input, Some(Peek::new(&*result)), partial.inner_mut())?;
        *result = *partial.build()?;
        converter.finish()
    }
}

/// Why a scalar conversion stopped.
enum Failure {
    /// Recorded against the current path; the target keeps its old value.
    Field(FieldErrorKind),
    /// The target could not be written at all.
    Reflect(ReflectError),
}

impl From<FieldErrorKind> for Failure {
    fn from(kind: FieldErrorKind) -> Self {
        Failure::Field(kind)
    }
}

impl From<ReflectError> for Failure {
    fn from(error: ReflectError) -> Self {
        Failure::Reflect(error)
    }
}

#[derive(Default)]
struct Converter {
    errors: AggregateError,
}

impl Converter {
    fn finish(self) -> Result<(), DecodeError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            log::debug!("Decode finished with {} error(s)", self.errors.len());
            Err(self.errors.into())
        }
    }

    fn fail(&mut self, path: &str, kind: FieldErrorKind) {
        log::trace!("Failed at `{path}`: {kind:?}");
        self.errors.push(FieldError::new(path, kind));
    }

    /// Writes the decoded form of `source` into the frame on top of
    /// `partial`. `existing` is what the target held before; `None` means
    /// the target is new and starts from its default.
    fn convert(
        &mut self,
        path: &str,
        source: &Value,
        existing: Option<Peek<'_, 'static>>,
        partial: &mut Partial<'static>,
    ) -> Result<(), ReflectError> {
        if source.is_nil() {
            log::trace!("Nil source at `{path}`, leaving target untouched");
            return restore(partial, existing);
        }
        let shape = partial.shape();
        let kind = Kind::of(shape);
        log::trace!(
            "Converting {} into {kind} `{path}` ({shape})",
            source.kind_name()
        );
        match kind {
            Kind::Bool | Kind::Text | Kind::Int | Kind::Uint | Kind::Float => {
                match write_scalar(source, kind, partial) {
                    Ok(()) => Ok(()),
                    Err(Failure::Field(error)) => {
                        self.fail(path, error);
                        restore(partial, existing)
                    }
                    Err(Failure::Reflect(error)) => Err(error),
                }
            }
            Kind::Map => self.convert_map(path, source, existing, partial),
            Kind::Seq => self.convert_seq(path, source, existing, partial),
            Kind::Array => self.convert_array(path, source, existing, partial),
            Kind::Record => self.convert_record(path, source, existing, partial),
            Kind::Pointer => self.convert_pointer(path, source, existing, partial),
            Kind::Dynamic => self.convert_dynamic_slot(path, source, existing, partial),
            Kind::Func => match source {
                Value::Func(func) if func.shape() == shape => copy_peek(partial, func.peek()),
                _ => {
                    self.fail(path, unconvertible(shape, source));
                    restore(partial, existing)
                }
            },
            Kind::Opaque => {
                self.fail(
                    path,
                    FieldErrorKind::UnsupportedKind {
                        shape: shape.to_string(),
                    },
                );
                restore(partial, existing)
            }
        }
    }

    /// Decodes `source` into a fresh value of `shape`. Returns `None` when
    /// that recorded any error, in which case the value is discarded.
    fn convert_detached(
        &mut self,
        path: &str,
        source: &Value,
        shape: &'static Shape,
    ) -> Result<Option<HeapValue<'static>>, ReflectError> {
        let before = self.errors.len();
        let mut scratch = Partial::alloc_shape(shape)?;
        let outcome = self.convert(path, source, None, &mut scratch);
        if self.errors.len() != before {
            return Ok(None);
        }
        outcome?;
        scratch.build().map(Some)
    }

    /// Decodes into a `U` that currently holds `current`.
    fn convert_typed<U: Facet<'static>>(
        &mut self,
        path: &str,
        source: &Value,
        current: U,
    ) -> Result<U, ReflectError> {
        let mut partial = Partial::alloc::<U>()?;
        self.convert(path, source, Some(Peek::new(&current)), partial.inner_mut())?;
        Ok(*partial.build()?)
    }

    fn convert_dynamic_slot(
        &mut self,
        path: &str,
        source: &Value,
        existing: Option<Peek<'_, 'static>>,
        partial: &mut Partial<'static>,
    ) -> Result<(), ReflectError> {
        if partial.shape().is_type::<Map>() {
            let held = existing
                .and_then(|peek| peek.get::<Map>().ok().cloned())
                .unwrap_or_default();
            let updated = self.convert_dynamic_map(path, source, held);
            partial.set(updated)?;
        } else {
            let held = existing
                .and_then(|peek| peek.get::<Value>().ok().cloned())
                .unwrap_or_default();
            let updated = self.convert_dynamic(path, source, held)?;
            partial.set(updated)?;
        }
        Ok(())
    }

    /// A slot already holding a value is decoded into through that value's
    /// own shape; an empty slot takes a copy of the source.
    fn convert_dynamic(
        &mut self,
        path: &str,
        source: &Value,
        held: Value,
    ) -> Result<Value, ReflectError> {
        Ok(match held {
            Value::Nil => source.clone(),
            Value::Bool(b) => Value::Bool(self.convert_typed(path, source, b)?),
            Value::Int(i) => Value::Int(self.convert_typed(path, source, i)?),
            Value::Uint(u) => Value::Uint(self.convert_typed(path, source, u)?),
            Value::Float(x) => Value::Float(self.convert_typed(path, source, x)?),
            Value::Text(text) => Value::Text(self.convert_typed(path, source, text)?),
            Value::Number(number) => Value::Number(self.convert_number(path, source, number)),
            Value::Seq(items) => Value::Seq(self.convert_typed(path, source, items)?),
            Value::Map(map) => Value::Map(self.convert_dynamic_map(path, source, map)),
            Value::Record(record) => {
                let mut partial = Partial::alloc_shape(record.shape())?;
                self.convert(path, source, Some(record.peek()), &mut partial)?;
                Value::Record(Record::from_heap(partial.build()?))
            }
            Value::Func(func) => match source {
                Value::Func(other) if other.shape() == func.shape() => source.clone(),
                _ => {
                    self.fail(path, unconvertible(func.shape(), source));
                    Value::Func(func)
                }
            },
        })
    }

    /// A held numeral only takes numeric input. Text must parse as a
    /// number; anything else keeps the held numeral.
    fn convert_number(&mut self, path: &str, source: &Value, held: Number) -> Number {
        match source {
            Value::Number(number) => number.clone(),
            Value::Int(i) => Number::new(i.to_string()),
            Value::Uint(u) => Number::new(u.to_string()),
            Value::Float(x) => Number::new(x.to_string()),
            Value::Text(text) => match text.parse::<f64>() {
                Ok(_) => Number::new(text.clone()),
                Err(error) => {
                    self.fail(path, invalid_number(error));
                    held
                }
            },
            _ => {
                self.fail(path, unconvertible("Number", source));
                held
            }
        }
    }

    fn convert_dynamic_map(&mut self, path: &str, source: &Value, mut held: Map) -> Map {
        let entries = match source {
            Value::Map(entries) => Cow::Borrowed(entries),
            Value::Record(record) => Cow::Owned(peek_to_map(record.peek())),
            _ => {
                self.fail(path, expected_map(source));
                return held;
            }
        };
        for (key, value) in entries.iter() {
            held.insert(key.clone(), value.clone());
        }
        held
    }

    /// Existing entries are kept; each source entry is decoded into a fresh
    /// key and value and upserted, or skipped if either side fails.
    fn convert_map(
        &mut self,
        path: &str,
        source: &Value,
        existing: Option<Peek<'_, 'static>>,
        partial: &mut Partial<'static>,
    ) -> Result<(), ReflectError> {
        let shape = partial.shape();
        let Def::Map(def) = shape.def else {
            return Err(ReflectError::OperationFailed {
                shape,
                operation: "decoding a map into a non-map shape",
            });
        };
        let entries = match source {
            Value::Map(entries) => Cow::Borrowed(entries),
            Value::Record(record) => Cow::Owned(peek_to_map(record.peek())),
            _ => {
                self.fail(path, expected_map(source));
                return restore(partial, existing);
            }
        };

        partial.begin_map()?;
        if let Some(old) = existing {
            for (key, value) in old.into_map()?.iter() {
                insert_entry(partial, key, value)?;
            }
        }
        for (key, value) in entries.iter() {
            let entry_path = format!("{path}[{key}]");
            let Some(key) = self.convert_detached(&entry_path, key, def.k())? else {
                log::debug!("Skipping map entry `{entry_path}`");
                continue;
            };
            let Some(value) = self.convert_detached(&entry_path, value, def.v())? else {
                log::debug!("Skipping map entry `{entry_path}`");
                continue;
            };
            insert_entry(partial, key.peek(), value.peek())?;
        }
        Ok(())
    }

    /// An empty target takes exactly the source's elements; a non-empty one is
    /// written index by index and grown as needed, never shrunk.
    fn convert_seq(
        &mut self,
        path: &str,
        source: &Value,
        existing: Option<Peek<'_, 'static>>,
        partial: &mut Partial<'static>,
    ) -> Result<(), ReflectError> {
        let Value::Seq(items) = source else {
            self.fail(path, expected_list(source));
            return restore(partial, existing);
        };
        let old = existing.map(Peek::into_list_like).transpose()?;

        partial.begin_list()?;
        for (index, item) in items.iter().enumerate() {
            let current = old.as_ref().and_then(|list| list.get(index));
            partial.begin_list_item()?;
            self.convert(&format!("{path}[{index}]"), item, current, partial)?;
            partial.end()?;
        }
        if let Some(old) = old {
            for item in old.iter().skip(items.len()) {
                partial.begin_list_item()?;
                copy_peek(partial, item)?;
                partial.end()?;
            }
        }
        Ok(())
    }

    fn convert_array(
        &mut self,
        path: &str,
        source: &Value,
        existing: Option<Peek<'_, 'static>>,
        partial: &mut Partial<'static>,
    ) -> Result<(), ReflectError> {
        let shape = partial.shape();
        let Type::Sequence(SequenceType::Array(array)) = shape.ty else {
            return Err(ReflectError::OperationFailed {
                shape,
                operation: "decoding an array into a non-array shape",
            });
        };
        let Value::Seq(items) = source else {
            self.fail(path, expected_list(source));
            return restore(partial, existing);
        };
        if items.len() > array.n {
            self.fail(
                path,
                FieldErrorKind::Overflow(Overflow::Length {
                    max: array.n,
                    len: items.len(),
                }),
            );
            return restore(partial, existing);
        }
        if array.n == 0 {
            return restore(partial, existing);
        }

        let old = existing.map(Peek::into_list_like).transpose()?;
        for index in 0..array.n {
            let current = old.as_ref().and_then(|list| list.get(index));
            partial.begin_nth_field(index)?;
            match items.get(index) {
                Some(item) => self.convert(&format!("{path}[{index}]"), item, current, partial)?,
                None => restore(partial, current)?,
            }
            partial.end()?;
        }
        Ok(())
    }

    fn convert_record(
        &mut self,
        path: &str,
        source: &Value,
        existing: Option<Peek<'_, 'static>>,
        partial: &mut Partial<'static>,
    ) -> Result<(), ReflectError> {
        let shape = partial.shape();
        let fresh = match existing {
            Some(_) => None,
            None => default_value(shape)?,
        };
        let existing = existing.or(fresh.as_ref().map(HeapValue::peek));

        match source {
            Value::Record(other) if other.shape() == shape => {
                log::trace!("Copied `{path}` wholesale");
                copy_peek(partial, other.peek())
            }
            Value::Record(other) => {
                let expanded = peek_to_map(other.peek());
                self.convert_record_from_map(path, &expanded, existing, partial)
            }
            Value::Map(map) => self.convert_record_from_map(path, map, existing, partial),
            _ => {
                self.fail(path, expected_map(source));
                restore(partial, existing)
            }
        }
    }

    fn convert_record_from_map(
        &mut self,
        path: &str,
        map: &Map,
        existing: Option<Peek<'_, 'static>>,
        partial: &mut Partial<'static>,
    ) -> Result<(), ReflectError> {
        if let Some(first) = map.keys().next() {
            if map.keys().all(|key| key.as_str().is_none()) {
                self.fail(
                    path,
                    FieldErrorKind::TypeMismatch(Mismatch::NonTextKeys {
                        found: first.kind_name().into_owned(),
                    }),
                );
                return restore(partial, existing);
            }
        }
        let mut used = vec![false; map.len()];
        self.convert_fields(path, map, &mut used, existing, partial)?;
        Ok(())
    }

    /// Decodes every field of the record on top of `partial` from `map`,
    /// descending into flattened members in declaration order so their
    /// fields share this record's key space. Returns how many fields found a
    /// source entry.
    fn convert_fields(
        &mut self,
        path: &str,
        map: &Map,
        used: &mut [bool],
        existing: Option<Peek<'_, 'static>>,
        partial: &mut Partial<'static>,
    ) -> Result<usize, ReflectError> {
        let shape = partial.shape();
        let Some(record) = struct_type(shape) else {
            return Err(ReflectError::OperationFailed {
                shape,
                operation: "decoding fields into a non-record shape",
            });
        };
        let current = existing.map(Peek::into_struct).transpose()?;

        let mut resolved = 0;
        for (index, field) in record.fields.iter().enumerate() {
            let old = match &current {
                Some(current) => Some(
                    current
                        .field(index)
                        .map_err(|field_error| ReflectError::FieldError { shape, field_error })?,
                ),
                None => None,
            };
            partial.begin_nth_field(index)?;

            if is_skipped(field) {
                log::trace!("Skipping field `{}`", field.name);
                restore(partial, old)?;
            } else if flattened_record(field) {
                resolved += self.convert_flattened(path, map, used, old, partial)?;
            } else {
                let key = field.name;
                match resolve_key(map, used, key) {
                    Some(value) => {
                        resolved += 1;
                        let field_path = if path.is_empty() {
                            key.to_owned()
                        } else {
                            format!("{path}.{key}")
                        };
                        self.convert(&field_path, value, old, partial)?;
                    }
                    None => {
                        log::trace!("No source entry for field `{key}`");
                        restore(partial, old)?;
                    }
                }
            }

            partial.end()?;
        }
        Ok(resolved)
    }

    /// Flattens a member. An absent optional member is only allocated when
    /// at least one of its fields is present in `map`.
    fn convert_flattened(
        &mut self,
        path: &str,
        map: &Map,
        used: &mut [bool],
        existing: Option<Peek<'_, 'static>>,
        partial: &mut Partial<'static>,
    ) -> Result<usize, ReflectError> {
        let shape = partial.shape();
        let Def::Option(option) = shape.def else {
            let fresh = match existing {
                Some(_) => None,
                None => default_value(shape)?,
            };
            let existing = existing.or(fresh.as_ref().map(HeapValue::peek));
            return self.convert_fields(path, map, used, existing, partial);
        };

        let pointee = existing
            .map(Peek::into_option)
            .transpose()?
            .and_then(|option| option.value());
        if let Some(inner) = pointee {
            partial.begin_some()?;
            let resolved = self.convert_fields(path, map, used, Some(inner), partial)?;
            partial.end()?;
            return Ok(resolved);
        }

        let fresh = default_value(option.t)?;
        let mut scratch = Partial::alloc_shape(option.t)?;
        let resolved = self.convert_fields(
            path,
            map,
            used,
            fresh.as_ref().map(HeapValue::peek),
            &mut scratch,
        )?;
        if resolved > 0 {
            let member = scratch.build()?;
            partial.begin_some()?;
            copy_peek(partial, member.peek())?;
            partial.end()?;
        } else {
            partial.set_default()?;
        }
        Ok(resolved)
    }

    /// An existing pointee is decoded in place, and a fresh one is only kept
    /// if it decoded cleanly. Owning pointers always hold a pointee.
    fn convert_pointer(
        &mut self,
        path: &str,
        source: &Value,
        existing: Option<Peek<'_, 'static>>,
        partial: &mut Partial<'static>,
    ) -> Result<(), ReflectError> {
        let shape = partial.shape();
        let Def::Option(option) = shape.def else {
            let pointee = existing
                .map(Peek::into_pointer)
                .transpose()?
                .and_then(|pointer| pointer.borrow_inner());
            partial.begin_smart_ptr()?;
            self.convert(path, source, pointee, partial)?;
            partial.end()?;
            return Ok(());
        };

        let pointee = existing
            .map(Peek::into_option)
            .transpose()?
            .and_then(|option| option.value());
        if let Some(inner) = pointee {
            partial.begin_some()?;
            self.convert(path, source, Some(inner), partial)?;
            partial.end()?;
            return Ok(());
        }

        match self.convert_detached(path, source, option.t)? {
            Some(value) => {
                partial.begin_some()?;
                copy_peek(partial, value.peek())?;
                partial.end()?;
            }
            None => {
                log::debug!("Discarding new pointee for `{path}`");
                partial.set_default()?;
            }
        }
        Ok(())
    }
}

/// Writes `existing` back, or the default value when there is none.
fn restore(
    partial: &mut Partial<'static>,
    existing: Option<Peek<'_, 'static>>,
) -> Result<(), ReflectError> {
    match existing {
        Some(peek) => copy_peek(partial, peek),
        None => fill_default(partial),
    }
}

/// Writes a deep copy of `value` into the frame on top of `partial`.
///
/// Types with a clone function are cloned directly. Collections, options,
/// smart pointers, records and arrays are rebuilt element by element.
pub(crate) fn copy_peek(
    partial: &mut Partial<'static>,
    value: Peek<'_, 'static>,
) -> Result<(), ReflectError> {
    let shape = value.shape();
    if partial.shape() != shape {
        return Err(ReflectError::WrongShape {
            expected: partial.shape(),
            actual: shape,
        });
    }
    if let Some(clone_into) = shape.vtable.clone_into {
        // SAFETY: `value` is an initialized `shape` and the frame expects
        // that same shape.
        unsafe {
            partial.set_from_function(move |target| {
                clone_into(value.data(), target);
                Ok(())
            })?;
        }
        return Ok(());
    }

    match shape.def {
        Def::List(_) => {
            partial.begin_list()?;
            for item in value.into_list_like()?.iter() {
                partial.begin_list_item()?;
                copy_peek(partial, item)?;
                partial.end()?;
            }
        }
        Def::Map(_) => {
            partial.begin_map()?;
            for (key, item) in value.into_map()?.iter() {
                insert_entry(partial, key, item)?;
            }
        }
        Def::Option(_) => match value.into_option()?.value() {
            Some(inner) => {
                partial.begin_some()?;
                copy_peek(partial, inner)?;
                partial.end()?;
            }
            None => {
                partial.set_default()?;
            }
        },
        Def::Pointer(_) => {
            let inner = value.into_pointer()?.borrow_inner().ok_or(
                ReflectError::OperationFailed {
                    shape,
                    operation: "copying a pointer without a readable pointee",
                },
            )?;
            partial.begin_smart_ptr()?;
            copy_peek(partial, inner)?;
            partial.end()?;
        }
        _ => match shape.ty {
            Type::Sequence(SequenceType::Array(array)) if array.n == 0 => {
                partial.set_default()?;
            }
            Type::Sequence(SequenceType::Array(array)) => {
                let items = value.into_list_like()?;
                for index in 0..array.n {
                    let item = items.get(index).ok_or(ReflectError::OperationFailed {
                        shape,
                        operation: "copying an array shorter than its shape",
                    })?;
                    partial.begin_nth_field(index)?;
                    copy_peek(partial, item)?;
                    partial.end()?;
                }
            }
            _ => {
                let record = value.into_struct()?;
                for index in 0..record.field_count() {
                    let field = record
                        .field(index)
                        .map_err(|field_error| ReflectError::FieldError { shape, field_error })?;
                    partial.begin_nth_field(index)?;
                    copy_peek(partial, field)?;
                    partial.end()?;
                }
            }
        },
    }
    Ok(())
}

/// Copies `value` into a new heap allocation of its own shape.
pub(crate) fn copy_to_heap(value: Peek<'_, 'static>) -> Result<HeapValue<'static>, ReflectError> {
    let mut partial = Partial::alloc_shape(value.shape())?;
    copy_peek(&mut partial, value)?;
    partial.build()
}

/// Initializes the frame with the type's default. Records, owning pointers
/// and arrays without one of their own are assembled from their parts'
/// defaults.
fn fill_default(partial: &mut Partial<'static>) -> Result<(), ReflectError> {
    let shape = partial.shape();
    if shape.vtable.default_in_place.is_some() {
        partial.set_default()?;
        return Ok(());
    }
    if let Some(record) = struct_type(shape) {
        for index in 0..record.fields.len() {
            partial.begin_nth_field(index)?;
            fill_default(partial)?;
            partial.end()?;
        }
        return Ok(());
    }
    match (shape.def, shape.ty) {
        (Def::Pointer(_), _) if Kind::of(shape) == Kind::Pointer => {
            partial.begin_smart_ptr()?;
            fill_default(partial)?;
            partial.end()?;
        }
        (_, Type::Sequence(SequenceType::Array(array))) if array.n > 0 => {
            for index in 0..array.n {
                partial.begin_nth_field(index)?;
                fill_default(partial)?;
                partial.end()?;
            }
        }
        _ => {
            return Err(ReflectError::OperationFailed {
                shape,
                operation: "type has no default value",
            });
        }
    }
    Ok(())
}

/// The default value of `shape`, if it has one.
fn default_value(shape: &'static Shape) -> Result<Option<HeapValue<'static>>, ReflectError> {
    if shape.vtable.default_in_place.is_none() {
        return Ok(None);
    }
    let mut partial = Partial::alloc_shape(shape)?;
    partial.set_default()?;
    partial.build().map(Some)
}

fn insert_entry(
    partial: &mut Partial<'static>,
    key: Peek<'_, 'static>,
    value: Peek<'_, 'static>,
) -> Result<(), ReflectError> {
    partial.begin_key()?;
    copy_peek(partial, key)?;
    partial.end()?;
    partial.begin_value()?;
    copy_peek(partial, value)?;
    partial.end()?;
    Ok(())
}

/// Finds the source entry for `key`: an exact match first, then the first
/// unused text key equal to it ignoring case.
fn resolve_key<'m>(map: &'m Map, used: &mut [bool], key: &str) -> Option<&'m Value> {
    let index = map
        .keys()
        .position(|candidate| candidate.as_str() == Some(key))
        .or_else(|| {
            map.keys().enumerate().position(|(index, candidate)| {
                !used[index] && candidate.as_str().is_some_and(|text| eq_fold(text, key))
            })
        })?;
    used[index] = true;
    map.entry_at(index).map(|(_, value)| value)
}

fn eq_fold(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

fn unconvertible(expected: impl ToString, source: &Value) -> FieldErrorKind {
    FieldErrorKind::TypeMismatch(Mismatch::Unconvertible {
        expected: expected.to_string(),
        found: source.kind_name().into_owned(),
    })
}

fn expected_map(source: &Value) -> FieldErrorKind {
    FieldErrorKind::TypeMismatch(Mismatch::ExpectedMap {
        found: source.kind_name().into_owned(),
    })
}

fn expected_list(source: &Value) -> FieldErrorKind {
    FieldErrorKind::TypeMismatch(Mismatch::ExpectedList {
        found: source.kind_name().into_owned(),
    })
}

fn overflow(value: impl ToString, target: &Shape) -> FieldErrorKind {
    FieldErrorKind::Overflow(Overflow::Value {
        value: value.to_string(),
        target: target.to_string(),
    })
}

fn invalid_number(error: impl ToString) -> FieldErrorKind {
    FieldErrorKind::InvalidNumber {
        message: error.to_string(),
    }
}

fn write_scalar(
    source: &Value,
    kind: Kind,
    partial: &mut Partial<'static>,
) -> Result<(), Failure> {
    let shape = partial.shape();
    let scalar = ScalarType::try_from_shape(shape);
    match kind {
        Kind::Bool => {
            partial.set(convert_bool(source, shape)?)?;
        }
        Kind::Text => {
            partial.set(convert_text(source, shape)?)?;
        }
        Kind::Int => {
            let value = convert_int(source, shape)?;
            let fits = match scalar {
                Some(ScalarType::I8) => set_narrowed::<i8, _>(partial, value)?,
                Some(ScalarType::I16) => set_narrowed::<i16, _>(partial, value)?,
                Some(ScalarType::I32) => set_narrowed::<i32, _>(partial, value)?,
                Some(ScalarType::ISize) => set_narrowed::<isize, _>(partial, value)?,
                Some(ScalarType::I128) => set_narrowed::<i128, _>(partial, value)?,
                _ => set_narrowed::<i64, _>(partial, value)?,
            };
            if !fits {
                return Err(overflow(value, shape).into());
            }
        }
        Kind::Uint => {
            let value = convert_uint(source, shape)?;
            let fits = match scalar {
                Some(ScalarType::U8) => set_narrowed::<u8, _>(partial, value)?,
                Some(ScalarType::U16) => set_narrowed::<u16, _>(partial, value)?,
                Some(ScalarType::U32) => set_narrowed::<u32, _>(partial, value)?,
                Some(ScalarType::USize) => set_narrowed::<usize, _>(partial, value)?,
                Some(ScalarType::U128) => set_narrowed::<u128, _>(partial, value)?,
                _ => set_narrowed::<u64, _>(partial, value)?,
            };
            if !fits {
                return Err(overflow(value, shape).into());
            }
        }
        Kind::Float => {
            let value = convert_float(source, shape)?;
            if scalar == Some(ScalarType::F32) {
                let narrowed = value as f32;
                if value.is_finite() && narrowed.is_infinite() {
                    return Err(overflow(format!("{value:e}"), shape).into());
                }
                partial.set(narrowed)?;
            } else {
                partial.set(value)?;
            }
        }
        _ => {
            return Err(FieldErrorKind::UnsupportedKind {
                shape: shape.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Sets the frame to `value` narrowed to `N`; `false` if it does not fit.
fn set_narrowed<N, W>(partial: &mut Partial<'static>, value: W) -> Result<bool, ReflectError>
where
    N: Facet<'static> + TryFrom<W>,
{
    match N::try_from(value) {
        Ok(narrowed) => {
            partial.set(narrowed)?;
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

fn convert_bool(source: &Value, shape: &Shape) -> Result<bool, FieldErrorKind> {
    match source {
        Value::Bool(b) => Ok(*b),
        _ => Err(unconvertible(shape, source)),
    }
}

fn convert_text(source: &Value, shape: &Shape) -> Result<String, FieldErrorKind> {
    match source {
        Value::Text(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.as_str().to_owned()),
        _ => Err(unconvertible(shape, source)),
    }
}

fn convert_int(source: &Value, shape: &Shape) -> Result<i64, FieldErrorKind> {
    match source {
        Value::Int(i) => Ok(*i),
        Value::Uint(u) => i64::try_from(*u).map_err(|_| overflow(u, shape)),
        Value::Float(x) => float_to_i64(*x).ok_or_else(|| overflow(format!("{x:.6}"), shape)),
        Value::Number(number) => number.as_i64().map_err(invalid_number),
        _ => Err(unconvertible(shape, source)),
    }
}

fn convert_uint(source: &Value, shape: &Shape) -> Result<u64, FieldErrorKind> {
    match source {
        Value::Int(i) => u64::try_from(*i).map_err(|_| overflow(i, shape)),
        Value::Uint(u) => Ok(*u),
        Value::Float(x) => float_to_u64(*x).ok_or_else(|| overflow(format!("{x:.6}"), shape)),
        _ => Err(unconvertible(shape, source)),
    }
}

fn convert_float(source: &Value, shape: &Shape) -> Result<f64, FieldErrorKind> {
    match source {
        Value::Int(i) => Ok(*i as f64),
        Value::Uint(u) => Ok(*u as f64),
        Value::Float(x) => Ok(*x),
        Value::Number(number) => number.as_f64().map_err(invalid_number),
        _ => Err(unconvertible(shape, source)),
    }
}

/// Truncates toward zero; `None` if the result does not fit.
fn float_to_i64(x: f64) -> Option<i64> {
    let truncated = x.trunc();
    // 2^63 is exactly representable; everything in [-2^63, 2^63) fits.
    (truncated >= -9_223_372_036_854_775_808.0 && truncated < 9_223_372_036_854_775_808.0)
        .then_some(truncated as i64)
}

/// Truncates toward zero; `None` for any negative input, NaN and values
/// past `u64::MAX`.
fn float_to_u64(x: f64) -> Option<u64> {
    // The sign is checked before truncating so -0.5 is not read as 0.
    (x >= 0.0 && x.trunc() < 18_446_744_073_709_551_616.0).then_some(x.trunc() as u64)
}
