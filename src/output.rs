//! Output document assembly.
//!
//! Each (output profile × sheet) pairing contributes one row set: a
//! header row of `["name","type",primary,"comment"]` quadruples for the
//! included columns, then the data rows with the same columns in the same
//! order. Row sets are grouped by profile name across all sheets and
//! rendered as one JSON document per profile.

use std::collections::BTreeMap;

use crate::sheet::Sheet;
use crate::values::json_string;

/// Build the row set of one sheet under one inclusion mask. Every row is
/// emitted as finished JSON array text; data cells are already
/// JSON-literal and are embedded verbatim.
fn profile_rows(sheet: &Sheet, mask: &[bool]) -> Vec<String> {
    let mut rows = Vec::with_capacity(sheet.rows.len() + 1);

    let mut header = String::new();
    for (i, index) in sheet.indices.iter().enumerate() {
        if !mask[i] {
            continue;
        }
        if !header.is_empty() {
            header.push_str(", ");
        }
        header.push_str(&format!(
            "[\"{}\",\"{}\",{},{}]",
            index.name,
            sheet.types[i].text,
            u8::from(index.is_primary),
            json_string(&sheet.comments[i]),
        ));
    }
    rows.push(format!("[{header}]"));

    for data in &sheet.rows {
        let mut row = String::new();
        for (i, value) in data.iter().enumerate() {
            if !mask[i] {
                continue;
            }
            if !row.is_empty() {
                row.push_str(", ");
            }
            row.push_str(value);
        }
        rows.push(format!("[{row}]"));
    }

    rows
}

/// Group row sets by profile name (sheet order preserved) and render one
/// JSON document per profile.
pub(crate) fn render(sheets: &[Sheet]) -> BTreeMap<String, String> {
    let mut grouped: BTreeMap<String, Vec<(&str, Vec<String>)>> = BTreeMap::new();
    for sheet in sheets {
        if sheet.is_empty() {
            continue;
        }
        for (profile, mask) in &sheet.outputs {
            grouped
                .entry(profile.clone())
                .or_default()
                .push((sheet.name.as_str(), profile_rows(sheet, mask)));
        }
    }

    grouped
        .into_iter()
        .map(|(profile, tables)| {
            let mut json = String::from("{\n");
            for (i, (name, rows)) in tables.iter().enumerate() {
                if i > 0 {
                    json.push_str(",\n");
                }
                json.push_str(&format!("    \"{name}\": ["));
                for (j, row) in rows.iter().enumerate() {
                    if j > 0 {
                        json.push(',');
                    }
                    json.push_str("\n        ");
                    json.push_str(row);
                }
                json.push_str("\n    ]");
            }
            json.push_str("\n}");
            (profile, json)
        })
        .collect()
}
