//! Worksheet row streaming.
//!
//! A worksheet part is streamed in two passes: a bounded pre-scan of the
//! `mergeCells` section builds the ordered region list, then a forward-only
//! scan of `sheetData` yields one dense row at a time. Dense means: cells
//! sorted by column, starting at column 1, with gaps filled by synthetic
//! empty cells and merge regions expanded to one cell per covered column.
//! The stream is single-pass and not restartable; calling [`Worksheet::rows`]
//! again starts over from the beginning of the part.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::cell::{Cell, Reference};
use crate::error::{cell_error, ErrorKind, Result, XlsxJsonError};
use crate::workbook::Tables;
use crate::xml_util::get_attr;

/// A worksheet: its display name and the raw XML of its part.
pub(crate) struct Worksheet {
    name: String,
    xml: String,
}

impl Worksheet {
    pub(crate) fn new(name: String, xml: String) -> Self {
        Self { name, xml }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Start streaming dense rows. The pre-scan of merge regions happens
    /// here; a malformed region reference fails immediately.
    pub(crate) fn rows<'a>(&'a self, tables: &'a Tables) -> Result<Rows<'a>> {
        let merges = scan_merge_regions(&self.xml)?;
        Ok(Rows {
            reader: Reader::from_str(&self.xml),
            tables,
            merges,
            max_row: None,
            max_column: None,
            done: false,
        })
    }
}

/// One merge region: its corners plus the text recorded when a covered
/// row carries a raw cell in the anchor column. The text is shared by
/// every cell the region expands to, across all covered rows.
#[derive(Debug)]
struct MergeRegion {
    begin: Reference,
    end: Reference,
    text: String,
}

/// Streaming iterator over the dense rows of one worksheet.
pub(crate) struct Rows<'a> {
    reader: Reader<&'a [u8]>,
    tables: &'a Tables,
    merges: Vec<MergeRegion>,
    max_row: Option<u32>,
    max_column: Option<u32>,
    done: bool,
}

impl Rows<'_> {
    /// Stop after this row number (inclusive).
    #[allow(dead_code)] // not narrowed by the schema parser, only max_column is
    pub(crate) fn set_max_row(&mut self, max_row: u32) {
        self.max_row = Some(max_row);
    }

    /// Ignore cells and merge regions anchored beyond this column. The
    /// schema parser narrows this once the header row is known, so data
    /// rows never materialize columns past the last declared one.
    pub(crate) fn set_max_column(&mut self, max_column: u32) {
        self.max_column = Some(max_column);
    }

    /// Collect the raw (sparse) cells of one `<row>` element, resolved
    /// per the workbook's cell-value policy and sorted by column.
    fn read_raw_cells(&mut self, row: u32) -> Result<Vec<Cell>> {
        let mut cells: Vec<Cell> = Vec::new();

        loop {
            match self.reader.read_event() {
                Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"c" => {
                    let r = get_attr(e, b"r");
                    let t = get_attr(e, b"t");
                    let s = get_attr(e, b"s");
                    let v = read_cell_value(&mut self.reader)?;
                    self.push_cell(&mut cells, row, r, t, s, v)?;
                }
                Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"c" => {
                    let r = get_attr(e, b"r");
                    let t = get_attr(e, b"t");
                    let s = get_attr(e, b"s");
                    self.push_cell(&mut cells, row, r, t, s, None)?;
                }
                Ok(Event::End(ref e)) if e.local_name().as_ref() == b"row" => break,
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
        }

        cells.sort_by_key(|cell| cell.reference.column);
        Ok(cells)
    }

    fn push_cell(
        &self,
        cells: &mut Vec<Cell>,
        row: u32,
        r: Option<String>,
        t: Option<String>,
        s: Option<String>,
        v: Option<String>,
    ) -> Result<()> {
        let reference = match r {
            Some(ref r) => Reference::parse(r).ok_or_else(|| {
                XlsxJsonError::Format(format!("row {row}: malformed cell reference {r:?}"))
            })?,
            None => Reference::new(row, cells.len() as u32 + 1),
        };
        if let Some(max) = self.max_column {
            if reference.column > max {
                return Ok(());
            }
        }
        let text = resolve_cell_value(self.tables, reference, t.as_deref(), s.as_deref(), v)?;
        cells.push(Cell::new(reference, text));
        Ok(())
    }

    /// Expand merges and fill gaps: walk columns left to right, emitting
    /// merge-region cells at anchor columns and raw or synthetic cells
    /// elsewhere, until both sources are exhausted.
    fn assemble(&mut self, row: u32, raw: Vec<Cell>) -> Vec<Cell> {
        let max_column = self.max_column;
        let covering: Vec<usize> = {
            let mut covering: Vec<usize> = (0..self.merges.len())
                .filter(|&i| {
                    let m = &self.merges[i];
                    max_column.is_none_or(|max| m.begin.column <= max)
                        && m.begin.row <= row
                        && row <= m.end.row
                })
                .collect();
            covering.sort_by_key(|&i| self.merges[i].begin.column);
            covering
        };

        let mut out = Vec::new();
        let mut i1 = 0; // raw cells
        let mut i2 = 0; // covering regions
        let mut column = 1u32;
        while i1 < raw.len() || i2 < covering.len() {
            // Duplicate column references cannot stall the walk
            while i1 < raw.len() && raw[i1].reference.column < column {
                i1 += 1;
            }
            if i2 < covering.len() {
                let m = covering[i2];
                if self.merges[m].begin.column < column {
                    // Overlapping regions are out of contract; skip
                    i2 += 1;
                    continue;
                }
                if self.merges[m].begin.column == column {
                    if i1 < raw.len() && raw[i1].reference.column == column {
                        self.merges[m].text = raw[i1].text.clone();
                    }
                    let (begin, end) = (self.merges[m].begin, self.merges[m].end);
                    while max_column.is_none_or(|max| column <= max) && column <= end.column {
                        if i1 < raw.len() && raw[i1].reference.column == column {
                            i1 += 1;
                        }
                        out.push(Cell::merged(
                            Reference::new(row, column),
                            self.merges[m].text.clone(),
                            begin,
                            end,
                        ));
                        column += 1;
                    }
                    i2 += 1;
                    continue;
                }
            }
            if i1 < raw.len() && raw[i1].reference.column == column {
                out.push(raw[i1].clone());
                i1 += 1;
            } else {
                out.push(Cell::new(Reference::new(row, column), String::new()));
            }
            column += 1;
        }

        out
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<Vec<Cell>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            // A self-closing <row/> has no cells but merge regions may
            // still cover it.
            let (row_attr, has_cells) = match self.reader.read_event() {
                Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"row" => {
                    (get_attr(e, b"r"), true)
                }
                Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"row" => {
                    (get_attr(e, b"r"), false)
                }
                Ok(Event::End(ref e)) if e.local_name().as_ref() == b"sheetData" => {
                    self.done = true;
                    return None;
                }
                Ok(Event::Eof) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                _ => continue,
            };

            let row = match row_attr.and_then(|r| r.parse::<u32>().ok()) {
                Some(row) if row >= 1 => row,
                _ => {
                    self.done = true;
                    return Some(Err(XlsxJsonError::Format(
                        "worksheet: malformed row number".into(),
                    )));
                }
            };
            if let Some(max) = self.max_row {
                if row > max {
                    self.done = true;
                    return None;
                }
            }
            let raw = if has_cells {
                match self.read_raw_cells(row) {
                    Ok(raw) => raw,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            } else {
                Vec::new()
            };
            if self.max_row.is_some_and(|max| row >= max) {
                self.done = true;
            }
            let dense = self.assemble(row, raw);
            if dense.is_empty() {
                if self.done {
                    return None;
                }
                continue;
            }
            return Some(Ok(dense));
        }
    }
}

// ── Cell value resolution ──────────────────────────────────────────

/// Resolve a cell's stored value to text, per its `t` type attribute and
/// `s` style index. Formula cells carry their cached `<v>` value and need
/// no special casing. Every failure is located at the cell.
fn resolve_cell_value(
    tables: &Tables,
    reference: Reference,
    t: Option<&str>,
    s: Option<&str>,
    v: Option<String>,
) -> Result<String> {
    match t {
        Some("n" | "str" | "inlineStr") => Ok(v.unwrap_or_default()),
        Some("b") => Ok(if v.as_deref() == Some("0") {
            "FALSE".into()
        } else {
            "TRUE".into()
        }),
        Some("s") => {
            let index = v
                .as_deref()
                .and_then(|v| v.parse::<usize>().ok())
                .and_then(|i| tables.shared_string(i));
            match index {
                Some(text) => Ok(text.to_string()),
                None => Err(XlsxJsonError::Format(format!(
                    "{reference}: shared string index out of range"
                ))),
            }
        }
        Some("e") => Err(cell_error(ErrorKind::CellError, reference.to_string())),
        Some("d") => Err(cell_error(
            ErrorKind::UnsupportedCellType,
            reference.to_string(),
        )),
        None => match (s, &v) {
            (Some(s), Some(_)) => {
                let code = s.parse::<usize>().ok().and_then(|i| tables.format_code(i));
                match code {
                    Some("General" | "@") => Ok(v.unwrap_or_default()),
                    _ => Err(cell_error(
                        ErrorKind::UnsupportedNumberFormat,
                        reference.to_string(),
                    )),
                }
            }
            _ => Ok(v.unwrap_or_default()),
        },
        Some(_) => Err(cell_error(
            ErrorKind::UnsupportedCellType,
            reference.to_string(),
        )),
    }
}

/// Read the value children of a non-empty `<c>` element: either a `<v>`
/// text or an `<is>` inline string (all `<t>` runs concatenated).
fn read_cell_value(reader: &mut Reader<&[u8]>) -> Result<Option<String>> {
    let mut value: Option<String> = None;
    let mut in_v = false;
    let mut in_is = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"v" => in_v = true,
                b"is" => in_is = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"is" => in_is = false,
                b"c" => break,
                _ => {}
            },
            Ok(Event::Text(ref t)) => {
                if in_v || in_is {
                    if let Ok(s) = t.unescape() {
                        value.get_or_insert_with(String::new).push_str(&s);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    Ok(value)
}

// ── Merge region pre-scan ──────────────────────────────────────────

/// Scan the part once for `<mergeCell ref="A1:B2"/>` entries.
fn scan_merge_regions(xml: &str) -> Result<Vec<MergeRegion>> {
    let mut regions = Vec::new();
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e) | Event::Start(ref e))
                if e.local_name().as_ref() == b"mergeCell" =>
            {
                let range = get_attr(e, b"ref").unwrap_or_default();
                let region = range.split_once(':').and_then(|(begin, end)| {
                    Some(MergeRegion {
                        begin: Reference::parse(begin)?,
                        end: Reference::parse(end)?,
                        text: String::new(),
                    })
                });
                match region {
                    Some(region) => regions.push(region),
                    None => {
                        return Err(XlsxJsonError::Format(format!(
                            "worksheet: malformed merge range {range:?}"
                        )))
                    }
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"mergeCells" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    Ok(regions)
}
