//! Error types for xlsxjson.
//!
//! Parse failures inside a worksheet carry an [`ErrorKind`] plus the
//! offending cell reference; everything else (I/O, corrupt zip, malformed
//! XML) surfaces through the generic variants of [`XlsxJsonError`].

/// Every schema or value error a worksheet parse can report, addressed to
/// a single cell. Human-readable messages live in [`ErrorKind::message`],
/// outside the parsing logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    // Identifier errors
    IndexEmpty,
    IndexSyntax,
    SheetNameSyntax,

    // Type-grammar errors
    EmptyType,
    MissingType,
    TypeSyntaxError,
    ArrayElementInvalid,
    ArrayLengthInvalid,
    ArrayLengthOutOfRange,
    ArrayLengthSyntax,
    TupleElementInvalid,
    TupleArityInvalid,
    DictionaryElementInvalid,
    PrimaryMustBeScalar,

    // Header-structural errors
    MergeInHeaderRow,
    OutputDefMergeCell,
    DuplicateOutputDef,
    OutputCellSyntax,
    CommentRowSyntax,
    RowFlagSyntax,

    // Value errors
    NotInteger,
    NotFloat,
    OutOfRange,
    StringQuoting,
    BoolSyntax,
    ValueCountOverflow,
    MissingColon,
    DuplicateKey,
    DuplicatePrimaryKey,

    // Container/format errors
    CellError,
    UnsupportedCellType,
    UnsupportedNumberFormat,
}

impl ErrorKind {
    /// Human-readable message for this error kind.
    pub(crate) fn message(self) -> &'static str {
        match self {
            Self::IndexEmpty => "column name must not be empty",
            Self::IndexSyntax => {
                "column name must contain only letters, digits and underscores and must not start with a digit"
            }
            Self::SheetNameSyntax => {
                "sheet name must contain only letters, digits and underscores and must not start with a digit"
            }
            Self::EmptyType => "type must not be empty",
            Self::MissingType => "column has no type cell",
            Self::TypeSyntaxError => "malformed type",
            Self::ArrayElementInvalid => "array element must be a scalar type",
            Self::ArrayLengthInvalid => "array length must be greater than 0",
            Self::ArrayLengthOutOfRange => "array length out of range",
            Self::ArrayLengthSyntax => "malformed array length",
            Self::TupleElementInvalid => "tuple element must be a scalar type",
            Self::TupleArityInvalid => "tuple must have at least 2 elements",
            Self::DictionaryElementInvalid => "dictionary key and value must be scalar types",
            Self::PrimaryMustBeScalar => "a primary column must have a scalar type",
            Self::MergeInHeaderRow => "merged cells are not allowed in the header row",
            Self::OutputDefMergeCell => "an output profile name must not be a merged cell",
            Self::DuplicateOutputDef => "duplicate output profile name",
            Self::OutputCellSyntax => "only \"-\" or an empty cell is allowed here",
            Self::CommentRowSyntax => "only \"*\", \"-\" or an empty cell is allowed here",
            Self::RowFlagSyntax => "only \"-\" or an empty cell is allowed here",
            Self::NotInteger => "not an integer",
            Self::NotFloat => "not a number",
            Self::OutOfRange => "value out of range for its type",
            Self::StringQuoting => {
                "string must be quoted with \", with inner \" escaped as \\\" and \\ escaped as \\\\"
            }
            Self::BoolSyntax => "bool accepts only 0 and 1",
            Self::ValueCountOverflow => "too many values",
            Self::MissingColon => "dictionary entry must separate key and value with one :",
            Self::DuplicateKey => "duplicate dictionary key",
            Self::DuplicatePrimaryKey => "duplicate primary key combination",
            Self::CellError => "cell is stored as an error value",
            Self::UnsupportedCellType => "unsupported cell type",
            Self::UnsupportedNumberFormat => "unsupported number format",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// All errors that can occur while reading workbooks and parsing sheets.
#[derive(Debug, thiserror::Error)]
pub(crate) enum XlsxJsonError {
    /// I/O error (file read, archive member read).
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error (from `zip` crate).
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error (from `quick-xml`).
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed container structure (missing part, unresolved relationship).
    #[error("{0}")]
    Format(String),

    /// A located parse error: error kind plus the offending cell.
    #[error("{sheet}!{reference}: {kind}")]
    Cell {
        kind: ErrorKind,
        reference: String,
        sheet: String,
    },
}

impl XlsxJsonError {
    /// Attach a sheet name to a located cell error that was raised before
    /// the sheet was known. Other variants pass through unchanged.
    pub(crate) fn in_sheet(self, name: &str) -> Self {
        match self {
            Self::Cell {
                kind, reference, ..
            } => Self::Cell {
                kind,
                reference,
                sheet: name.to_string(),
            },
            other => other,
        }
    }
}

/// Shorthand for a located cell error with the sheet name not yet known.
pub(crate) fn cell_error(kind: ErrorKind, reference: impl Into<String>) -> XlsxJsonError {
    XlsxJsonError::Cell {
        kind,
        reference: reference.into(),
        sheet: String::new(),
    }
}

/// Convenience alias used throughout the crate.
pub(crate) type Result<T> = std::result::Result<T, XlsxJsonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_error_display() {
        let err = cell_error(ErrorKind::NotInteger, "B3").in_sheet("Items");
        assert_eq!(err.to_string(), "Items!B3: not an integer");
    }

    #[test]
    fn in_sheet_leaves_other_variants_alone() {
        let err = XlsxJsonError::Format("xl/workbook.xml: missing part".into());
        assert_eq!(
            err.in_sheet("Items").to_string(),
            "xl/workbook.xml: missing part"
        );
    }
}
