//! Column type grammar.
//!
//! A header cell's type text parses into a [`ColumnType`]: a scalar
//! keyword, an array `elem[]`/`elem[N]`, a tuple `[a,b,...]`, or a
//! dictionary `key:value`. Array, tuple and dictionary elements must be
//! scalar. The canonical text (whitespace stripped) is kept for the
//! exported header row.

use crate::error::ErrorKind;

/// The scalar leaf types of the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScalarKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Str,
}

impl ScalarKind {
    pub(crate) fn from_keyword(text: &str) -> Option<Self> {
        match text {
            "u8" => Some(Self::U8),
            "u16" => Some(Self::U16),
            "u32" => Some(Self::U32),
            "u64" => Some(Self::U64),
            "i8" => Some(Self::I8),
            "i16" => Some(Self::I16),
            "i32" => Some(Self::I32),
            "i64" => Some(Self::I64),
            "f32" => Some(Self::F32),
            "f64" => Some(Self::F64),
            "bool" => Some(Self::Bool),
            "str" => Some(Self::Str),
            _ => None,
        }
    }
}

/// The shape of a column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeShape {
    Scalar(ScalarKind),
    Array {
        elem: ScalarKind,
        /// Fixed length, or `None` for a variable-length array.
        len: Option<usize>,
    },
    Tuple(Vec<ScalarKind>),
    Dict {
        key: ScalarKind,
        value: ScalarKind,
    },
}

/// A parsed column type: its shape plus the canonical text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnType {
    pub(crate) text: String,
    pub(crate) shape: TypeShape,
}

impl ColumnType {
    pub(crate) fn is_scalar(&self) -> bool {
        matches!(self.shape, TypeShape::Scalar(_))
    }
}

/// Parse a header cell's type text.
pub(crate) fn parse_type(text: &str) -> Result<ColumnType, ErrorKind> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ErrorKind::EmptyType);
    }

    let canonical = text.replace(' ', "");
    let shape = if let Some(kind) = ScalarKind::from_keyword(text) {
        TypeShape::Scalar(kind)
    } else if text.ends_with(']') {
        match text.find('[') {
            Some(0) => parse_tuple(&text[1..text.len() - 1])?,
            Some(bracket) => parse_array(&text[..bracket], &text[bracket + 1..text.len() - 1])?,
            None => return Err(ErrorKind::TypeSyntaxError),
        }
    } else if text.matches(':').count() == 1 && !text.contains(',') {
        let (key, value) = text.split_once(':').unwrap_or_default();
        let key = ScalarKind::from_keyword(key.trim());
        let value = ScalarKind::from_keyword(value.trim());
        match (key, value) {
            (Some(key), Some(value)) => TypeShape::Dict { key, value },
            _ => return Err(ErrorKind::DictionaryElementInvalid),
        }
    } else {
        return Err(ErrorKind::TypeSyntaxError);
    };

    Ok(ColumnType {
        text: canonical,
        shape,
    })
}

/// Parse the element and bracket interior of `elem[...]`. The length, if
/// present, must be a positive integer no larger than `i32::MAX`.
fn parse_array(elem: &str, len: &str) -> Result<TypeShape, ErrorKind> {
    let len = len.trim();
    let len = if len.is_empty() {
        None
    } else {
        match len.parse::<i64>() {
            Ok(n) if n <= 0 => return Err(ErrorKind::ArrayLengthInvalid),
            Ok(n) if n > i64::from(i32::MAX) => return Err(ErrorKind::ArrayLengthOutOfRange),
            Ok(n) => Some(n as usize),
            Err(_) => return Err(ErrorKind::ArrayLengthSyntax),
        }
    };
    match ScalarKind::from_keyword(elem.trim()) {
        Some(elem) => Ok(TypeShape::Array { elem, len }),
        None => Err(ErrorKind::ArrayElementInvalid),
    }
}

/// Parse the bracket interior of `[a,b,...]`: at least two comma-separated
/// scalar keywords.
fn parse_tuple(interior: &str) -> Result<TypeShape, ErrorKind> {
    let parts: Vec<&str> = interior.split(',').collect();
    if parts.len() < 2 {
        return Err(ErrorKind::TupleArityInvalid);
    }
    let mut kinds = Vec::with_capacity(parts.len());
    for part in parts {
        match ScalarKind::from_keyword(part.trim()) {
            Some(kind) => kinds.push(kind),
            None => return Err(ErrorKind::TupleElementInvalid),
        }
    }
    Ok(TypeShape::Tuple(kinds))
}
