//! `xlsxjson` — converts `.xlsx` configuration workbooks into
//! schema-validated JSON tables.
//!
//! Each worksheet declares its columns in the header rows (names, types,
//! output profiles, comments); the data rows are validated against the
//! declared types and serialized as JSON literals. One JSON document is
//! written per output profile, grouping every sheet that exports under
//! that profile name. The first schema or value error aborts the whole
//! batch and nothing is written.

#![allow(clippy::redundant_pub_crate)]

mod cell;
mod error;
mod output;
mod sheet;
mod types;
mod values;
mod workbook;
mod worksheet;
mod xml_util;

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process;

use error::{Result, XlsxJsonError};
use sheet::Sheet;
use workbook::Workbook;

const USAGE: &str = "\
xlsxjson - convert .xlsx configuration workbooks into JSON tables

Usage: xlsxjson [-f FILE...] [-d DIR...] [-o OUTDIR] [FILE...]

Options:
  -f FILE...    Convert the given .xlsx files
  -d DIR...     Convert every .xlsx file in the given directories
  -o OUTDIR     Output directory for the .json documents (default: .)
  -h, --help    Show this help

Bare arguments are treated as input files. One JSON document is written
per output profile declared in the sheets; a sheet name must be unique
across all input files. The first sheet error aborts the whole batch.";

/// What the argument after a flag belongs to.
#[derive(Debug, Clone, Copy)]
enum Target {
    Files,
    Dirs,
    OutDir,
}

#[derive(Debug, Default)]
struct Config {
    files: Vec<String>,
    dirs: Vec<String>,
    out_dir: Option<String>,
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        println!("{USAGE}");
        process::exit(1);
    }

    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(unknown) => {
            eprintln!("xlsxjson: unknown option: {unknown}");
            eprintln!("{USAGE}");
            process::exit(1);
        }
    };

    let inputs = discover(&config.files, &config.dirs);
    if inputs.is_empty() {
        eprintln!("xlsxjson: no .xlsx files found");
        process::exit(1);
    }

    let mut sheets: Vec<(PathBuf, Sheet)> = Vec::new();
    for (i, path) in inputs.iter().enumerate() {
        println!("  ({}/{}) {}", i + 1, inputs.len(), path.display());
        if let Err(e) = convert_file(path, &mut sheets) {
            eprintln!("xlsxjson: {}: {e}", path.display());
            process::exit(1);
        }
    }

    let sheets: Vec<Sheet> = sheets.into_iter().map(|(_, sheet)| sheet).collect();
    let documents = output::render(&sheets);

    let out_dir = PathBuf::from(config.out_dir.as_deref().unwrap_or("."));
    if let Err(e) = write_documents(&out_dir, &documents) {
        eprintln!("xlsxjson: {}: {e}", out_dir.display());
        process::exit(1);
    }
}

/// Parse the argument list; the error carries the unknown option. Bare
/// arguments before any flag are input files, matching `-f`.
fn parse_args(args: &[String]) -> std::result::Result<Config, String> {
    let mut config = Config::default();
    let mut target = Target::Files;

    for arg in args {
        match arg.as_str() {
            "-f" => target = Target::Files,
            "-d" => target = Target::Dirs,
            "-o" => target = Target::OutDir,
            "-h" | "--help" => {
                println!("{USAGE}");
                process::exit(0);
            }
            s if s.starts_with('-') => return Err(s.to_string()),
            _ => match target {
                Target::Files => config.files.push(arg.clone()),
                Target::Dirs => config.dirs.push(arg.clone()),
                Target::OutDir => {
                    config.out_dir = Some(arg.clone());
                    target = Target::Files;
                }
            },
        }
    }

    Ok(config)
}

/// Collect the input files: named files that exist with a `.xlsx`
/// extension, plus every `.xlsx` directly inside the named directories.
/// Missing files and directories are skipped, as is anything else.
fn discover(files: &[String], dirs: &[String]) -> Vec<PathBuf> {
    let mut found = Vec::new();

    for file in files {
        let path = Path::new(file);
        if path.is_file() && has_xlsx_extension(path) {
            found.push(path.to_path_buf());
        }
    }

    for dir in dirs {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        let mut in_dir: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_xlsx_extension(path))
            .collect();
        in_dir.sort();
        found.extend(in_dir);
    }

    found
}

fn has_xlsx_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"))
}

/// Parse every worksheet of one workbook, appending the non-empty sheets.
/// A sheet name seen in an earlier workbook is a batch error.
fn convert_file(path: &Path, sheets: &mut Vec<(PathBuf, Sheet)>) -> Result<()> {
    let data = std::fs::read(path)?;
    let mut workbook = Workbook::open(Cursor::new(data))?;

    let entries = workbook.worksheets().to_vec();
    for entry in &entries {
        let worksheet = workbook.open_worksheet(entry)?;
        let sheet = Sheet::parse(&worksheet, workbook.tables())?;
        if sheet.is_empty() {
            continue;
        }
        if let Some((earlier, _)) = sheets.iter().find(|(_, s)| s.name == sheet.name) {
            return Err(XlsxJsonError::Format(format!(
                "sheet {:?} is already defined in {}",
                sheet.name,
                earlier.display()
            )));
        }
        sheets.push((path.to_path_buf(), sheet));
    }

    Ok(())
}

fn write_documents(
    out_dir: &Path,
    documents: &std::collections::BTreeMap<String, String>,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;
    for (profile, json) in documents {
        std::fs::write(out_dir.join(format!("{profile}.json")), json)?;
    }
    Ok(())
}
