use std::{
    error::Error,
    fmt::{self, Display},
};

/// Error type returned by a top-level decode.
#[derive(Debug)]
pub struct DecodeError {
    kind: DecodeErrorKind,
}

impl DecodeError {
    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &DecodeErrorKind {
        &self.kind
    }

    /// The leaf failures, in recursion order. Empty unless this is an
    /// aggregate.
    pub fn field_errors(&self) -> &[FieldError] {
        match &self.kind {
            DecodeErrorKind::Aggregate(aggregate) => aggregate.errors(),
            _ => &[],
        }
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        write!(f, "{kind}")
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            DecodeErrorKind::Reflect(e) => Some(e),
            #[cfg(feature = "kdl")]
            DecodeErrorKind::Kdl(e) => Some(e),
            #[cfg(feature = "json")]
            DecodeErrorKind::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl<K: Into<DecodeErrorKind>> From<K> for DecodeError {
    fn from(value: K) -> Self {
        let kind = value.into();
        DecodeError { kind }
    }
}

/// Detailed classification of decode errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// The decoder was used without a result target. Raised before any
    /// conversion work.
    Usage(&'static str),
    /// One or more conversions failed somewhere in the tree.
    Aggregate(AggregateError),
    /// The target could not be assembled, e.g. a record without `Default`
    /// whose fields were not all supplied.
    Reflect(facet_reflect::ReflectError),
    /// The KDL source could not be parsed.
    #[cfg(feature = "kdl")]
    Kdl(::kdl::KdlError),
    /// The JSON source could not be parsed.
    #[cfg(feature = "json")]
    Json(serde_json::Error),
}

impl Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::Usage(msg) => f.write_str(msg),
            DecodeErrorKind::Aggregate(aggregate) => write!(f, "{aggregate}"),
            DecodeErrorKind::Reflect(reflect_error) => write!(f, "{reflect_error}"),
            #[cfg(feature = "kdl")]
            DecodeErrorKind::Kdl(kdl_error) => write!(f, "{kdl_error}"),
            #[cfg(feature = "json")]
            DecodeErrorKind::Json(json_error) => write!(f, "{json_error}"),
        }
    }
}

impl From<AggregateError> for DecodeErrorKind {
    fn from(value: AggregateError) -> Self {
        Self::Aggregate(value)
    }
}

impl From<facet_reflect::ReflectError> for DecodeErrorKind {
    fn from(value: facet_reflect::ReflectError) -> Self {
        Self::Reflect(value)
    }
}

#[cfg(feature = "kdl")]
impl From<::kdl::KdlError> for DecodeErrorKind {
    fn from(value: ::kdl::KdlError) -> Self {
        Self::Kdl(value)
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for DecodeErrorKind {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// One leaf failure, located by its dotted/bracketed path.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    path: String,
    kind: FieldErrorKind,
}

impl FieldError {
    pub(crate) fn new(path: &str, kind: FieldErrorKind) -> Self {
        Self {
            path: path.to_owned(),
            kind,
        }
    }

    /// Where the failure happened, e.g. `server.ports[2]`. Empty at the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// What went wrong.
    pub fn kind(&self) -> &FieldErrorKind {
        &self.kind
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = &self.path;
        match &self.kind {
            FieldErrorKind::TypeMismatch(mismatch) => match mismatch {
                Mismatch::Unconvertible { expected, found } => write!(
                    f,
                    "'{path}' expected type '{expected}', got unconvertible type '{found}'"
                ),
                Mismatch::ExpectedMap { found } => {
                    write!(f, "'{path}' expected a map, got '{found}'")
                }
                Mismatch::ExpectedList { found } => write!(
                    f,
                    "'{path}': source data must be a sequence or array, got {found}"
                ),
                Mismatch::NonTextKeys { found } => write!(
                    f,
                    "'{path}' needs a map with string keys, has '{found}' keys"
                ),
            },
            FieldErrorKind::Overflow(overflow) => match overflow {
                Overflow::Value { value, target } => {
                    write!(f, "cannot parse '{path}', {value} overflows {target}")
                }
                Overflow::Length { max, len } => write!(
                    f,
                    "'{path}': expected source data to have length less or equal to {max}, got {len}"
                ),
            },
            FieldErrorKind::UnsupportedKind { shape } => {
                write!(f, "'{path}': unsupported type: {shape}")
            }
            FieldErrorKind::InvalidNumber { message } => {
                write!(f, "error decoding number into '{path}': {message}")
            }
        }
    }
}

impl Error for FieldError {}

/// Classification of leaf failures.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FieldErrorKind {
    /// The source kind cannot be converted into the target shape.
    TypeMismatch(Mismatch),
    /// A value, or a sequence length, does not fit the target.
    Overflow(Overflow),
    /// No converter handles the target shape.
    UnsupportedKind {
        /// The target type.
        shape: String,
    },
    /// A deferred numeral did not parse for the target.
    InvalidNumber {
        /// The parser's complaint.
        message: String,
    },
}

/// The flavours of [`FieldErrorKind::TypeMismatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    /// A scalar or callable of the wrong kind.
    Unconvertible {
        /// The target type.
        expected: String,
        /// The source kind.
        found: String,
    },
    /// A map or record target fed something else.
    ExpectedMap {
        /// The source kind.
        found: String,
    },
    /// A sequence or array target fed something else.
    ExpectedList {
        /// The source kind.
        found: String,
    },
    /// A record target fed a map without text keys.
    NonTextKeys {
        /// The kind of the map's keys.
        found: String,
    },
}

/// The flavours of [`FieldErrorKind::Overflow`].
#[derive(Debug, Clone, PartialEq)]
pub enum Overflow {
    /// A numeric value out of range for the target type.
    Value {
        /// The offending value, as written in the message.
        value: String,
        /// The target type.
        target: String,
    },
    /// A source sequence longer than the target array.
    Length {
        /// The array length.
        max: usize,
        /// The source length.
        len: usize,
    },
}

/// Every leaf failure from one top-level decode.
///
/// Rendering sorts the messages so the report does not depend on recursion
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateError {
    errors: Vec<FieldError>,
}

impl AggregateError {
    pub(crate) fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Number of failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether nothing failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The failures, in the order they were encountered.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// The rendered failures, sorted lexicographically.
    pub fn messages(&self) -> Vec<String> {
        let mut messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        messages.sort();
        messages
    }
}

impl Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) decoding:\n\n", self.len())?;
        let messages = self.messages();
        for (i, message) in messages.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "* {message}")?;
        }
        Ok(())
    }
}

impl Error for AggregateError {}
