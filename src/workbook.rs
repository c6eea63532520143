//! OOXML `.xlsx` container reader.
//!
//! Opens the zip archive and eagerly parses the four fixed-path parts —
//! relationships, workbook sheet list, shared strings, styles — into
//! in-memory lookup tables before any worksheet is streamed. The archive
//! stays open for the lifetime of the [`Workbook`] and is released on drop.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

use crate::error::{Result, XlsxJsonError};
use crate::worksheet::Worksheet;
use crate::xml_util::{get_attr, read_member, read_member_opt};

/// Fixed part paths inside the archive.
pub(crate) const RELATIONSHIP_PART: &str = "xl/_rels/workbook.xml.rels";
pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";
pub(crate) const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
pub(crate) const STYLES_PART: &str = "xl/styles.xml";

/// Number formats built into the file format; they never appear in
/// `xl/styles.xml` but cells may reference them by id.
///
/// Source: ECMA-376 Part 1, §18.8.30 (numFmt).
const BUILTIN_NUM_FMTS: &[(u32, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0 ;(#,##0)"),
    (38, "#,##0 ;[Red](#,##0)"),
    (39, "#,##0.00;(#,##0.00)"),
    (40, "#,##0.00;[Red](#,##0.00)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

/// The built-in format table as a fresh map, ready to be extended by the
/// styles part.
pub(crate) fn builtin_formats() -> HashMap<u32, String> {
    BUILTIN_NUM_FMTS
        .iter()
        .map(|&(id, code)| (id, code.to_string()))
        .collect()
}

/// Read-only lookup tables shared by every worksheet stream of a workbook.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    /// Deduplicated strings referenced by index from `t="s"` cells.
    shared_strings: Vec<String>,
    /// numFmtId → format code, seeded with the built-in formats.
    num_fmts: HashMap<u32, String>,
    /// Cell style index (`s` attribute) → numFmtId.
    cell_xfs: Vec<u32>,
}

impl Tables {
    pub(crate) fn new(
        shared_strings: Vec<String>,
        num_fmts: HashMap<u32, String>,
        cell_xfs: Vec<u32>,
    ) -> Self {
        Self {
            shared_strings,
            num_fmts,
            cell_xfs,
        }
    }

    pub(crate) fn shared_string(&self, index: usize) -> Option<&str> {
        self.shared_strings.get(index).map(String::as_str)
    }

    /// Resolve a cell style index to its number format code.
    pub(crate) fn format_code(&self, style_index: usize) -> Option<&str> {
        let fmt_id = self.cell_xfs.get(style_index)?;
        self.num_fmts.get(fmt_id).map(String::as_str)
    }
}

/// One worksheet as listed by the workbook part: display name plus the
/// archive path of its XML part.
#[derive(Debug, Clone)]
pub(crate) struct SheetEntry {
    pub(crate) name: String,
    pub(crate) path: String,
}

/// An open workbook: the archive handle plus the eagerly-loaded tables.
#[derive(Debug)]
pub(crate) struct Workbook<R: Read + Seek> {
    archive: ZipArchive<R>,
    sheets: Vec<SheetEntry>,
    tables: Tables,
}

impl<R: Read + Seek> Workbook<R> {
    /// Open an archive and load the relationship, workbook, shared-string
    /// and styles parts, in that order.
    pub(crate) fn open(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;

        let rels = parse_rels_xml(&read_member(&mut archive, RELATIONSHIP_PART)?);
        let sheet_ids = parse_workbook_xml(&read_member(&mut archive, WORKBOOK_PART)?);

        let mut sheets = Vec::with_capacity(sheet_ids.len());
        for (name, rid) in sheet_ids {
            let Some((_, path)) = rels.iter().find(|(id, _)| *id == rid) else {
                return Err(XlsxJsonError::Format(format!(
                    "{WORKBOOK_PART}: sheet {name:?} references unknown relationship {rid}"
                )));
            };
            sheets.push(SheetEntry {
                name,
                path: path.clone(),
            });
        }

        let shared_strings = match read_member_opt(&mut archive, SHARED_STRINGS_PART)? {
            Some(xml) => parse_shared_strings_xml(&xml),
            None => Vec::new(),
        };

        let mut num_fmts = builtin_formats();
        let mut cell_xfs = Vec::new();
        if let Some(xml) = read_member_opt(&mut archive, STYLES_PART)? {
            parse_styles_xml(&xml, &mut num_fmts, &mut cell_xfs);
        }

        Ok(Self {
            archive,
            sheets,
            tables: Tables::new(shared_strings, num_fmts, cell_xfs),
        })
    }

    /// Worksheets in workbook order.
    pub(crate) fn worksheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    pub(crate) fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Read a worksheet's XML part. Each call re-reads the part, so the
    /// returned worksheet can be streamed independently of earlier ones.
    pub(crate) fn open_worksheet(&mut self, entry: &SheetEntry) -> Result<Worksheet> {
        let xml = read_member(&mut self.archive, &entry.path)?;
        Ok(Worksheet::new(entry.name.clone(), xml))
    }
}

// ── Part parsing ───────────────────────────────────────────────────

/// Parse the relationships part into ordered `(id, part path)` pairs.
/// Targets are relative to `xl/`; absolute targets keep their own path.
fn parse_rels_xml(xml: &str) -> Vec<(String, String)> {
    let mut rels = Vec::new();
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e) | Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let id = get_attr(e, b"Id").unwrap_or_default();
                let target = get_attr(e, b"Target").unwrap_or_default();
                if id.is_empty() || target.is_empty() {
                    continue;
                }
                let path = if let Some(absolute) = target.strip_prefix('/') {
                    absolute.to_string()
                } else {
                    format!("xl/{target}")
                };
                rels.push((id, path));
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    rels
}

/// Parse the workbook part's `<sheets>` list into ordered
/// `(name, relationship id)` pairs.
fn parse_workbook_xml(xml: &str) -> Vec<(String, String)> {
    let mut sheets = Vec::new();
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e) | Event::Start(ref e))
                if e.local_name().as_ref() == b"sheet" =>
            {
                let name = get_attr(e, b"name").unwrap_or_default();
                let rid = get_attr(e, b"r:id").unwrap_or_default();
                if !name.is_empty() && !rid.is_empty() {
                    sheets.push((name, rid));
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    sheets
}

/// Parse the shared string table. Each `<si>` contributes one string at
/// its positional index; rich-text `<r><t>` runs are concatenated.
fn parse_shared_strings_xml(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut in_si = false;
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"si" => {
                in_si = true;
                current.clear();
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(std::mem::take(&mut current));
                in_si = false;
            }
            Ok(Event::Text(ref t)) => {
                if in_si {
                    if let Ok(s) = t.unescape() {
                        current.push_str(&s);
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    strings
}

/// Parse the styles part: `<numFmt>` entries extend (or override) the
/// built-in format table, and each `<xf>` inside `<cellXfs>` appends its
/// numFmtId to the style-index list.
fn parse_styles_xml(xml: &str, num_fmts: &mut HashMap<u32, String>, cell_xfs: &mut Vec<u32>) {
    let mut reader = Reader::from_str(xml);
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => push_xf(e, cell_xfs),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"numFmt" => {
                    if let (Some(id), Some(code)) =
                        (get_attr(e, b"numFmtId"), get_attr(e, b"formatCode"))
                    {
                        if let Ok(id) = id.parse::<u32>() {
                            num_fmts.insert(id, code);
                        }
                    }
                }
                b"xf" if in_cell_xfs => push_xf(e, cell_xfs),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"cellXfs" => {
                in_cell_xfs = false;
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
}

fn push_xf(e: &quick_xml::events::BytesStart, cell_xfs: &mut Vec<u32>) {
    let fmt_id = get_attr(e, b"numFmtId")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    cell_xfs.push(fmt_id);
}
