//! Worksheet schema parsing.
//!
//! Interprets the dense row stream of one worksheet as a typed table:
//! row 1 declares column names (with `*` marking primary columns), row 2
//! their types, then come named output profiles, an optional `*` comment
//! row, and finally the data rows. The five phases run as an explicit
//! state machine; a phase terminator row is re-handled by the next phase
//! so no row is ever consumed twice or skipped.
//!
//! Several exits declare the sheet *empty* rather than failing: a first
//! row that is not row 1, a header with no column names, or no output
//! profile by the end of the stream. Empty sheets produce no output and
//! their names are never validated.

use std::collections::BTreeMap;

use crate::cell::{Cell, Reference};
use crate::error::{ErrorKind, Result, XlsxJsonError};
use crate::types::{parse_type, ColumnType};
use crate::values::parse_value;
use crate::workbook::Tables;
use crate::worksheet::Worksheet;

/// A declared column: its name and whether it is part of the primary key.
#[derive(Debug, Clone)]
pub(crate) struct Index {
    pub(crate) name: String,
    pub(crate) is_primary: bool,
}

impl Index {
    /// Parse a header cell: an optional leading `*` marks the column
    /// primary, the rest must be an identifier.
    fn parse(text: &str) -> std::result::Result<Self, ErrorKind> {
        let (is_primary, name) = match text.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if name.is_empty() {
            return Err(ErrorKind::IndexEmpty);
        }
        if !is_identifier(name) {
            return Err(ErrorKind::IndexSyntax);
        }
        Ok(Self {
            name: name.to_string(),
            is_primary,
        })
    }
}

/// `^[A-Za-z_][A-Za-z0-9_]*$`
pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The parse result for one worksheet. All lists are index-aligned; rows
/// hold JSON-literal text ready for embedding. An empty sheet (no
/// declared columns) has every field empty and produces no output.
#[derive(Debug, Default)]
pub(crate) struct Sheet {
    pub(crate) name: String,
    pub(crate) indices: Vec<Index>,
    pub(crate) types: Vec<ColumnType>,
    pub(crate) outputs: BTreeMap<String, Vec<bool>>,
    pub(crate) comments: Vec<String>,
    pub(crate) rows: Vec<Vec<String>>,
}

impl Sheet {
    pub(crate) fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Parse one worksheet. The first error anywhere aborts the whole
    /// parse; partial results are discarded.
    pub(crate) fn parse(worksheet: &Worksheet, tables: &Tables) -> Result<Self> {
        Parser::new(worksheet.name()).run(worksheet, tables)
    }
}

// ── State machine ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Indices,
    Types,
    Profiles,
    Comments,
    Rows,
}

/// What a phase handler decided about the row it saw.
#[derive(Debug)]
enum Transition {
    /// The row is consumed; continue with the given phase.
    Consume(Phase),
    /// The row terminates this phase; re-handle it in the given phase.
    Redo(Phase),
    /// The sheet is declared empty; stop without error.
    DeclareEmpty,
}

struct Parser {
    sheet_name: String,
    /// Declared columns with the worksheet column they live in.
    columns: Vec<(u32, Index)>,
    types: Vec<ColumnType>,
    outputs: BTreeMap<String, Vec<bool>>,
    comments: Vec<String>,
    rows: Vec<Vec<String>>,
    /// Concatenated primary-column values of every accepted row.
    seen_keys: Vec<String>,
}

impl Parser {
    fn new(sheet_name: &str) -> Self {
        Self {
            sheet_name: sheet_name.to_string(),
            columns: Vec::new(),
            types: Vec::new(),
            outputs: BTreeMap::new(),
            comments: Vec::new(),
            rows: Vec::new(),
            seen_keys: Vec::new(),
        }
    }

    fn fail(&self, kind: ErrorKind, reference: impl ToString) -> XlsxJsonError {
        XlsxJsonError::Cell {
            kind,
            reference: reference.to_string(),
            sheet: self.sheet_name.clone(),
        }
    }

    fn run(mut self, worksheet: &Worksheet, tables: &Tables) -> Result<Sheet> {
        let mut stream = worksheet.rows(tables)?;
        let mut phase = Phase::Indices;
        let mut declared_empty = false;

        'stream: while let Some(row) = stream.next() {
            let row = row.map_err(|e| e.in_sheet(&self.sheet_name))?;
            loop {
                let transition = match phase {
                    Phase::Indices => self.handle_indices(&row)?,
                    Phase::Types => self.handle_types(&row)?,
                    Phase::Profiles => self.handle_profiles(&row)?,
                    Phase::Comments => self.handle_comments(&row)?,
                    Phase::Rows => self.handle_rows(&row)?,
                };
                match transition {
                    Transition::Consume(next) => {
                        if phase == Phase::Indices {
                            // All later rows only matter up to the last
                            // declared column.
                            if let Some(&(column, _)) = self.columns.last() {
                                stream.set_max_column(column);
                            }
                        }
                        phase = next;
                        continue 'stream;
                    }
                    Transition::Redo(next) => phase = next,
                    Transition::DeclareEmpty => {
                        declared_empty = true;
                        break 'stream;
                    }
                }
            }
        }

        self.finish(declared_empty)
    }

    fn finish(self, declared_empty: bool) -> Result<Sheet> {
        let name = self.sheet_name;
        if declared_empty {
            return Ok(Sheet {
                name,
                ..Sheet::default()
            });
        }
        if !self.columns.is_empty() && !is_identifier(&name) {
            return Err(XlsxJsonError::Cell {
                kind: ErrorKind::SheetNameSyntax,
                reference: String::new(),
                sheet: name,
            });
        }
        if self.outputs.is_empty() {
            // Header rows but never an output profile: nothing to emit.
            return Ok(Sheet {
                name,
                ..Sheet::default()
            });
        }

        let mut comments = self.comments;
        comments.resize(self.columns.len(), String::new());
        Ok(Sheet {
            name,
            indices: self.columns.into_iter().map(|(_, index)| index).collect(),
            types: self.types,
            outputs: self.outputs,
            comments,
            rows: self.rows,
        })
    }

    // Phase 1: the header row declares the columns.
    fn handle_indices(&mut self, row: &[Cell]) -> Result<Transition> {
        if row[0].reference.row != 1 {
            return Ok(Transition::DeclareEmpty);
        }
        for cell in row {
            if cell.is_merged() {
                return Err(self.fail(ErrorKind::MergeInHeaderRow, cell.reference));
            }
            let text = cell.text.trim();
            if cell.reference.column == 1 || text.is_empty() {
                continue;
            }
            let index = Index::parse(text).map_err(|kind| self.fail(kind, cell.reference))?;
            self.columns.push((cell.reference.column, index));
        }
        if self.columns.is_empty() {
            return Ok(Transition::DeclareEmpty);
        }
        Ok(Transition::Consume(Phase::Types))
    }

    // Phase 2: one type per declared column.
    fn handle_types(&mut self, row: &[Cell]) -> Result<Transition> {
        let row_number = row[0].reference.row;
        for i in 0..self.columns.len() {
            let (column, is_primary) = {
                let (column, index) = &self.columns[i];
                (*column, index.is_primary)
            };
            let Some(cell) = aligned(row, column) else {
                return Err(self.fail(ErrorKind::MissingType, Reference::new(row_number, column)));
            };
            let ty =
                parse_type(&cell.text).map_err(|kind| self.fail(kind, cell.reference))?;
            if is_primary && !ty.is_scalar() {
                return Err(self.fail(ErrorKind::PrimaryMustBeScalar, cell.reference));
            }
            self.types.push(ty);
        }
        Ok(Transition::Consume(Phase::Profiles))
    }

    // Phase 3: named output profiles, until a `*`/`-`/empty flag cell.
    fn handle_profiles(&mut self, row: &[Cell]) -> Result<Transition> {
        let flag_cell = &row[0];
        let flag = flag_cell.text.trim();
        if flag_cell.reference.column != 1 || matches!(flag, "" | "*" | "-") {
            if self.outputs.is_empty() {
                return Ok(Transition::DeclareEmpty);
            }
            return Ok(Transition::Redo(Phase::Comments));
        }

        if flag_cell.is_merged() {
            return Err(self.fail(ErrorKind::OutputDefMergeCell, flag_cell.reference));
        }
        for cell in &row[1..] {
            let text = cell.text.trim();
            if !text.is_empty() && text != "-" {
                return Err(self.fail(ErrorKind::OutputCellSyntax, cell.reference));
            }
        }
        if self.outputs.contains_key(flag) {
            return Err(self.fail(ErrorKind::DuplicateOutputDef, flag_cell.reference));
        }

        let mask: Vec<bool> = self
            .columns
            .iter()
            .map(|&(column, _)| aligned(row, column).is_none_or(|cell| cell.text.trim() != "-"))
            .collect();
        if mask.contains(&true) {
            self.outputs.insert(flag.to_string(), mask);
        }
        Ok(Transition::Consume(Phase::Profiles))
    }

    // Phase 4: at most one `*` comment row.
    fn handle_comments(&mut self, row: &[Cell]) -> Result<Transition> {
        self.comments = vec![String::new(); self.columns.len()];
        let flag_cell = &row[0];
        let flag = flag_cell.text.trim();
        if flag_cell.reference.column != 1 || matches!(flag, "" | "-") {
            return Ok(Transition::Redo(Phase::Rows));
        }
        if flag != "*" {
            return Err(self.fail(ErrorKind::CommentRowSyntax, flag_cell.reference));
        }
        for (i, &(column, _)) in self.columns.iter().enumerate() {
            if let Some(cell) = aligned(row, column) {
                self.comments[i] = cell.text.trim().to_string();
            }
        }
        Ok(Transition::Consume(Phase::Rows))
    }

    // Phase 5: data rows.
    fn handle_rows(&mut self, row: &[Cell]) -> Result<Transition> {
        let row_number = row[0].reference.row;
        let flag = row[0].text.trim();
        if flag == "-" {
            return Ok(Transition::Consume(Phase::Rows));
        }
        if !flag.is_empty() {
            return Err(self.fail(ErrorKind::RowFlagSyntax, row[0].reference));
        }
        if row.len() < 2 {
            // Nothing after the flag column.
            return Ok(Transition::Consume(Phase::Rows));
        }

        let mut values = Vec::with_capacity(self.columns.len());
        let mut key = String::new();
        for (i, &(column, ref index)) in self.columns.iter().enumerate() {
            let text = aligned(row, column).map_or("", |cell| cell.text.trim());
            let value = parse_value(&self.types[i], text)
                .map_err(|kind| self.fail(kind, Reference::new(row_number, column)))?;
            if index.is_primary {
                key.push_str(&value);
            }
            values.push(value);
        }
        if self.seen_keys.contains(&key) {
            return Err(self.fail(ErrorKind::DuplicatePrimaryKey, Reference::new(row_number, 1)));
        }
        self.seen_keys.push(key);
        self.rows.push(values);
        Ok(Transition::Consume(Phase::Rows))
    }
}

/// The cell at a worksheet column, relying on rows being dense from
/// column 1 up to their last populated column.
fn aligned(row: &[Cell], column: u32) -> Option<&Cell> {
    row.get(column as usize - 1)
}
