//! Shared XML and archive helpers for the OOXML container.
//!
//! Used by `workbook.rs` and `worksheet.rs` to extract attributes from
//! `quick_xml` elements and read archive members into strings without
//! duplicating the plumbing.

use std::io::{Read, Seek};
use zip::ZipArchive;

use crate::error::{Result, XlsxJsonError};

/// Get an attribute value from an XML element by name.
pub(crate) fn get_attr(e: &quick_xml::events::BytesStart, attr_name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == attr_name {
            return std::str::from_utf8(&attr.value).ok().map(String::from);
        }
    }
    None
}

/// Read a required archive member into a string. A missing member is a
/// format error naming the part.
pub(crate) fn read_member<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    match read_member_opt(archive, path)? {
        Some(xml) => Ok(xml),
        None => Err(XlsxJsonError::Format(format!("{path}: missing part"))),
    }
}

/// Read an optional archive member into a string; `None` when absent.
pub(crate) fn read_member_opt<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Option<String>> {
    let mut entry = match archive.by_name(path) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn archive(members: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, content) in members {
            writer
                .start_file(*path, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        ZipArchive::new(writer.finish().unwrap()).unwrap()
    }

    // ── get_attr ─────────────────────────────────────────────────

    #[test]
    fn get_attr_present_and_absent() {
        use quick_xml::events::Event;

        let mut reader = quick_xml::reader::Reader::from_str(r#"<c r="B2" t="s"/>"#);
        let Ok(Event::Empty(e)) = reader.read_event() else {
            panic!("expected empty element");
        };
        assert_eq!(get_attr(&e, b"r").as_deref(), Some("B2"));
        assert_eq!(get_attr(&e, b"t").as_deref(), Some("s"));
        assert_eq!(get_attr(&e, b"s"), None);
    }

    // ── read_member ──────────────────────────────────────────────

    #[test]
    fn read_member_found() {
        let mut archive = archive(&[("xl/workbook.xml", "<workbook/>")]);
        assert_eq!(
            read_member(&mut archive, "xl/workbook.xml").unwrap(),
            "<workbook/>"
        );
    }

    #[test]
    fn read_member_missing_is_format_error() {
        let mut archive = archive(&[]);
        let err = read_member(&mut archive, "xl/workbook.xml").unwrap_err();
        assert!(err.to_string().contains("missing part"));
    }

    #[test]
    fn read_member_opt_missing_is_none() {
        let mut archive = archive(&[]);
        assert!(read_member_opt(&mut archive, "xl/sharedStrings.xml")
            .unwrap()
            .is_none());
    }
}
