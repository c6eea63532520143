//! Data cell parsing: raw cell text → JSON-literal text.
//!
//! Two layers of quote handling are deliberately kept apart: the
//! *tokenizer* splits composite cell text on delimiters that are
//! significant only outside quoted runs, and the *string parser* checks a
//! single token's quoting and re-escapes its content into JSON string
//! syntax. Only the latter produces JSON text.

use crate::error::ErrorKind;
use crate::types::{ColumnType, ScalarKind, TypeShape};

/// Parse one cell's raw text against its column type, producing the
/// JSON-literal text to embed in the output document.
pub(crate) fn parse_value(ty: &ColumnType, raw: &str) -> Result<String, ErrorKind> {
    match &ty.shape {
        TypeShape::Scalar(kind) => parse_scalar(*kind, raw),
        TypeShape::Array { elem, len } => {
            let tokens = sized_tokens(raw, *len)?;
            let mut parts = Vec::with_capacity(tokens.len());
            for token in tokens {
                parts.push(parse_scalar(*elem, token)?);
            }
            Ok(format!("[{}]", parts.join(",")))
        }
        TypeShape::Tuple(kinds) => {
            let tokens = sized_tokens(raw, Some(kinds.len()))?;
            let mut parts = Vec::with_capacity(kinds.len());
            for (kind, token) in kinds.iter().zip(tokens) {
                parts.push(parse_scalar(*kind, token)?);
            }
            Ok(format!("[{}]", parts.join(",")))
        }
        TypeShape::Dict { key, value } => parse_dict(*key, *value, raw),
    }
}

/// Split a composite cell into top-level tokens, pad to the fixed length
/// if one is declared, and reject extra tokens.
fn sized_tokens(raw: &str, len: Option<usize>) -> Result<Vec<&str>, ErrorKind> {
    let mut tokens = split_top_level(raw, ',');
    if let Some(len) = len {
        if tokens.len() > len {
            return Err(ErrorKind::ValueCountOverflow);
        }
        tokens.resize(len, "");
    }
    Ok(tokens)
}

fn parse_dict(key: ScalarKind, value: ScalarKind, raw: &str) -> Result<String, ErrorKind> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for entry in split_top_level(raw, ',') {
        let colons = delimiter_positions(entry, ':');
        if colons.len() != 1 {
            return Err(ErrorKind::MissingColon);
        }
        let colon = colons[0];
        let parsed_key = parse_scalar(key, &entry[..colon])?;
        let parsed_value = parse_scalar(value, &entry[colon + 1..])?;
        if pairs.iter().any(|(k, _)| *k == parsed_key) {
            return Err(ErrorKind::DuplicateKey);
        }
        pairs.push((parsed_key, parsed_value));
    }

    let entries: Vec<String> = pairs
        .into_iter()
        .map(|(k, v)| format!("[{k},{v}]"))
        .collect();
    Ok(format!("[{}]", entries.join(",")))
}

// ── Top-level tokenizing ───────────────────────────────────────────

/// Byte positions of `delim` outside quoted runs. A quoted run begins at
/// an unescaped `"` and ends at the next unescaped `"`; `\` escapes the
/// following character (including itself).
fn delimiter_positions(s: &str, delim: char) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut in_quotes = false;
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delim && !in_quotes {
            positions.push(i);
        }
    }
    positions
}

/// Split on top-level occurrences of `delim`. Empty input yields no
/// tokens (an empty composite), not one empty token.
fn split_top_level(s: &str, delim: char) -> Vec<&str> {
    if s.is_empty() {
        return Vec::new();
    }
    let mut tokens = Vec::new();
    let mut start = 0;
    for position in delimiter_positions(s, delim) {
        tokens.push(&s[start..position]);
        start = position + delim.len_utf8();
    }
    tokens.push(&s[start..]);
    tokens
}

// ── Scalar parsing ─────────────────────────────────────────────────

fn parse_scalar(kind: ScalarKind, raw: &str) -> Result<String, ErrorKind> {
    let value = raw.trim();
    match kind {
        ScalarKind::Str => parse_string(value),
        ScalarKind::Bool => {
            let value = if value.is_empty() { "0" } else { value };
            match value {
                "0" => Ok("false".into()),
                "1" => Ok("true".into()),
                _ => Err(ErrorKind::BoolSyntax),
            }
        }
        ScalarKind::F32 => {
            let value = if value.is_empty() { "0" } else { value };
            let num: f32 = value.parse().map_err(|_| ErrorKind::NotFloat)?;
            if !num.is_finite() {
                return Err(ErrorKind::NotFloat);
            }
            Ok(num.to_string())
        }
        ScalarKind::F64 => {
            let value = if value.is_empty() { "0" } else { value };
            let num: f64 = value.parse().map_err(|_| ErrorKind::NotFloat)?;
            if !num.is_finite() {
                return Err(ErrorKind::NotFloat);
            }
            Ok(num.to_string())
        }
        ScalarKind::U8 => parse_integer(value, 0, u8::MAX as i128),
        ScalarKind::U16 => parse_integer(value, 0, u16::MAX as i128),
        ScalarKind::U32 => parse_integer(value, 0, u32::MAX as i128),
        ScalarKind::U64 => parse_integer(value, 0, u64::MAX as i128),
        ScalarKind::I8 => parse_integer(value, i8::MIN as i128, i8::MAX as i128),
        ScalarKind::I16 => parse_integer(value, i16::MIN as i128, i16::MAX as i128),
        ScalarKind::I32 => parse_integer(value, i32::MIN as i128, i32::MAX as i128),
        ScalarKind::I64 => parse_integer(value, i64::MIN as i128, i64::MAX as i128),
    }
}

/// Parse an integer token and range-check it against its kind's bounds.
/// Empty text defaults to zero; the parse is width-independent so syntax
/// errors and out-of-range values are reported distinctly.
fn parse_integer(value: &str, min: i128, max: i128) -> Result<String, ErrorKind> {
    let value = if value.is_empty() { "0" } else { value };
    let num: i128 = value.parse().map_err(|_| ErrorKind::NotInteger)?;
    if num < min || num > max {
        return Err(ErrorKind::OutOfRange);
    }
    Ok(num.to_string())
}

/// Parse a string token. Empty text is the empty string; anything else
/// must be a quoted literal whose decoded content is re-escaped to JSON.
fn parse_string(value: &str) -> Result<String, ErrorKind> {
    if value.is_empty() {
        return Ok("\"\"".into());
    }
    let content = parse_quoted(value)?;
    Ok(json_string(&content))
}

/// Decode a quoted literal: `"..."` where `\"` is a quote, `\\` is a
/// backslash, and any other `\x` keeps the backslash. An unescaped `"`
/// before the end, a missing or escaped closing quote, or a missing
/// opening quote are all quoting errors.
fn parse_quoted(value: &str) -> Result<String, ErrorKind> {
    let bytes: Vec<char> = value.chars().collect();
    if bytes.len() < 2 || bytes[0] != '"' {
        return Err(ErrorKind::StringQuoting);
    }

    let mut content = String::new();
    let mut closed = false;
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            '\\' => {
                match bytes.get(i + 1) {
                    Some('"') => content.push('"'),
                    Some('\\') => content.push('\\'),
                    Some(c) => {
                        content.push('\\');
                        content.push(*c);
                    }
                    None => return Err(ErrorKind::StringQuoting),
                }
                i += 2;
            }
            '"' => {
                if i != bytes.len() - 1 {
                    return Err(ErrorKind::StringQuoting);
                }
                closed = true;
                i += 1;
            }
            c => {
                content.push(c);
                i += 1;
            }
        }
    }
    if !closed {
        return Err(ErrorKind::StringQuoting);
    }
    Ok(content)
}

/// Escape text into a JSON string literal (`\`, `"`, CR and LF).
pub(crate) fn json_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_type;

    fn parse(ty: &str, raw: &str) -> Result<String, ErrorKind> {
        parse_value(&parse_type(ty).unwrap(), raw)
    }

    // ── integers ─────────────────────────────────────────────────

    #[test]
    fn integer_bounds_accepted() {
        for (ty, min, max) in [
            ("u8", "0", "255"),
            ("u16", "0", "65535"),
            ("u32", "0", "4294967295"),
            ("u64", "0", "18446744073709551615"),
            ("i8", "-128", "127"),
            ("i16", "-32768", "32767"),
            ("i32", "-2147483648", "2147483647"),
            ("i64", "-9223372036854775808", "9223372036854775807"),
        ] {
            assert_eq!(parse(ty, min).unwrap(), min, "{ty} min");
            assert_eq!(parse(ty, max).unwrap(), max, "{ty} max");
        }
    }

    #[test]
    fn integer_beyond_bounds_rejected() {
        for (ty, below, above) in [
            ("u8", "-1", "256"),
            ("u16", "-1", "65536"),
            ("u32", "-1", "4294967296"),
            ("u64", "-1", "18446744073709551616"),
            ("i8", "-129", "128"),
            ("i16", "-32769", "32768"),
            ("i32", "-2147483649", "2147483648"),
            ("i64", "-9223372036854775809", "9223372036854775808"),
        ] {
            assert_eq!(parse(ty, below).unwrap_err(), ErrorKind::OutOfRange, "{ty}");
            assert_eq!(parse(ty, above).unwrap_err(), ErrorKind::OutOfRange, "{ty}");
        }
    }

    #[test]
    fn integer_syntax() {
        assert_eq!(parse("i32", "12x").unwrap_err(), ErrorKind::NotInteger);
        assert_eq!(parse("i32", "1.5").unwrap_err(), ErrorKind::NotInteger);
        assert_eq!(parse("i32", "+7").unwrap(), "7");
        assert_eq!(parse("i32", "007").unwrap(), "7");
        assert_eq!(parse("i32", " 42 ").unwrap(), "42");
    }

    #[test]
    fn empty_numeric_defaults_to_zero() {
        assert_eq!(parse("u8", "").unwrap(), "0");
        assert_eq!(parse("f64", "").unwrap(), "0");
        assert_eq!(parse("bool", "").unwrap(), "false");
    }

    // ── floats ───────────────────────────────────────────────────

    #[test]
    fn float_parsing() {
        assert_eq!(parse("f32", "1.5").unwrap(), "1.5");
        assert_eq!(parse("f64", "-0.25").unwrap(), "-0.25");
        assert_eq!(parse("f64", "1e3").unwrap(), "1000");
        assert_eq!(parse("f32", "abc").unwrap_err(), ErrorKind::NotFloat);
    }

    #[test]
    fn non_finite_floats_rejected() {
        assert_eq!(parse("f64", "inf").unwrap_err(), ErrorKind::NotFloat);
        assert_eq!(parse("f64", "NaN").unwrap_err(), ErrorKind::NotFloat);
    }

    // ── bools ────────────────────────────────────────────────────

    #[test]
    fn bool_strict() {
        assert_eq!(parse("bool", "0").unwrap(), "false");
        assert_eq!(parse("bool", "1").unwrap(), "true");
        assert_eq!(parse("bool", "5").unwrap_err(), ErrorKind::BoolSyntax);
        assert_eq!(parse("bool", "true").unwrap_err(), ErrorKind::BoolSyntax);
    }

    // ── strings ──────────────────────────────────────────────────

    #[test]
    fn string_empty() {
        assert_eq!(parse("str", "").unwrap(), "\"\"");
    }

    #[test]
    fn string_quoted() {
        assert_eq!(parse("str", r#""hello""#).unwrap(), r#""hello""#);
        assert_eq!(parse("str", r#""""#).unwrap(), r#""""#);
    }

    #[test]
    fn string_escapes_round_trip() {
        // He said \"hi\" — inner quotes escaped, whole token quoted.
        assert_eq!(
            parse("str", r#""He said \"hi\"""#).unwrap(),
            r#""He said \"hi\"""#
        );
        // Escaped backslash survives as an escaped backslash.
        assert_eq!(parse("str", r#""a\\b""#).unwrap(), r#""a\\b""#);
        // A lone backslash is preserved (and escaped for JSON).
        assert_eq!(parse("str", r#""a\tb""#).unwrap(), r#""a\\tb""#);
    }

    #[test]
    fn string_newlines_escaped() {
        assert_eq!(parse("str", "\"a\nb\"").unwrap(), r#""a\nb""#);
        assert_eq!(parse("str", "\"a\rb\"").unwrap(), r#""a\rb""#);
    }

    #[test]
    fn string_quoting_errors() {
        assert_eq!(parse("str", "plain").unwrap_err(), ErrorKind::StringQuoting);
        assert_eq!(parse("str", "\"open").unwrap_err(), ErrorKind::StringQuoting);
        assert_eq!(
            parse("str", r#""esc\""#).unwrap_err(),
            ErrorKind::StringQuoting
        );
        assert_eq!(
            parse("str", r#""in"ner""#).unwrap_err(),
            ErrorKind::StringQuoting
        );
    }

    // ── arrays ───────────────────────────────────────────────────

    #[test]
    fn fixed_array_pads_missing() {
        assert_eq!(parse("u8[3]", "1,2").unwrap(), "[1,2,0]");
        assert_eq!(parse("u8[3]", "").unwrap(), "[0,0,0]");
    }

    #[test]
    fn fixed_array_overflow() {
        assert_eq!(
            parse("u8[3]", "1,2,3,4").unwrap_err(),
            ErrorKind::ValueCountOverflow
        );
    }

    #[test]
    fn variable_array() {
        assert_eq!(parse("i32[]", "1, -2, 3").unwrap(), "[1,-2,3]");
        assert_eq!(parse("i32[]", "").unwrap(), "[]");
    }

    #[test]
    fn array_element_error_propagates() {
        assert_eq!(parse("u8[]", "1,999").unwrap_err(), ErrorKind::OutOfRange);
        assert_eq!(parse("u8[]", "1,x").unwrap_err(), ErrorKind::NotInteger);
    }

    #[test]
    fn string_array_ignores_quoted_commas() {
        assert_eq!(
            parse("str[]", r#""a,b","c""#).unwrap(),
            r#"["a,b","c"]"#
        );
    }

    // ── tuples ───────────────────────────────────────────────────

    #[test]
    fn tuple_positional() {
        assert_eq!(
            parse("[u8, str, bool]", r#"7, "x", 1"#).unwrap(),
            r#"[7,"x",true]"#
        );
    }

    #[test]
    fn tuple_pads_and_overflows() {
        assert_eq!(parse("[u8, u8]", "1").unwrap(), "[1,0]");
        assert_eq!(
            parse("[u8, u8]", "1,2,3").unwrap_err(),
            ErrorKind::ValueCountOverflow
        );
    }

    // ── dictionaries ─────────────────────────────────────────────

    #[test]
    fn dict_pairs_in_order() {
        assert_eq!(
            parse("str:i32", r#""a":1,"b":2"#).unwrap(),
            r#"[["a",1],["b",2]]"#
        );
    }

    #[test]
    fn dict_duplicate_key() {
        assert_eq!(
            parse("str:i32", r#""a":1,"a":2"#).unwrap_err(),
            ErrorKind::DuplicateKey
        );
    }

    #[test]
    fn dict_missing_colon() {
        assert_eq!(parse("u8:u8", "1").unwrap_err(), ErrorKind::MissingColon);
        assert_eq!(
            parse("u8:u8", "1:2,3").unwrap_err(),
            ErrorKind::MissingColon
        );
        assert_eq!(
            parse("u8:u8", "1:2:3").unwrap_err(),
            ErrorKind::MissingColon
        );
    }

    #[test]
    fn dict_empty_is_empty_array() {
        assert_eq!(parse("u8:u8", "").unwrap(), "[]");
    }

    #[test]
    fn dict_quoted_colon_not_a_separator() {
        assert_eq!(
            parse("str:u8", r#""a:b":1"#).unwrap(),
            r#"[["a:b",1]]"#
        );
    }

    #[test]
    fn dict_numeric_keys_keep_type() {
        assert_eq!(parse("u8:str", r#"1:"x""#).unwrap(), r#"[[1,"x"]]"#);
    }

    // ── tokenizer ────────────────────────────────────────────────

    #[test]
    fn split_respects_quotes_and_escapes() {
        assert_eq!(split_top_level(r#""a,b",c"#, ','), vec![r#""a,b""#, "c"]);
        assert_eq!(
            split_top_level(r#""a\",b",c"#, ','),
            vec![r#""a\",b""#, "c"]
        );
        // \\ closes the escape, so the following quote ends the run
        assert_eq!(
            split_top_level(r#""a\\",b"#, ','),
            vec![r#""a\\""#, "b"]
        );
    }

    #[test]
    fn split_trailing_delimiter_yields_empty_token() {
        assert_eq!(split_top_level("1,", ','), vec!["1", ""]);
        assert_eq!(split_top_level(",", ','), vec!["", ""]);
    }

    #[test]
    fn split_empty_is_no_tokens() {
        assert!(split_top_level("", ',').is_empty());
    }
}
