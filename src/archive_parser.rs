//! Parser for zip-packaged spreadsheet report bundles
//!
//! Daily reports (I90DIA, I3DIA, IMES) arrive as a zip holding one
//! spreadsheet. Its first sheet is a directory listing (sheet-name, label)
//! pairs below a fixed header block; every labelled sheet except the
//! reserved sentinel is decoded into a [`Sheet`] and keyed by label.
//!
//! "No recognized entry" is expected for dates without data and yields
//! `Ok(None)`, never an error.

use std::io::{Cursor, Read};

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use zip::ZipArchive;

use crate::error::{ArchiveError, EsiosError};
use crate::types::{ArchiveBundle, Sheet, SheetCell};

/// Recognized bundle entry-name prefixes; the first match wins
pub const BUNDLE_PREFIXES: [&str; 3] = ["I90DIA", "I3DIA", "IMES"];

/// Directory sheet header row (0-indexed); data rows follow it
pub const DIRECTORY_HEADER_ROW: u32 = 9;

/// Sub-sheet header row (0-indexed); the two rows above it are skipped
pub const SHEET_HEADER_ROW: u32 = 2;

/// Directory label marking a sheet that carries no real data
pub const RESERVED_LABEL: &str = "Reservada";

/// Parse a zip archive bundle into labelled sheets
///
/// Scans entry names for the first one starting with a prefix in
/// [`BUNDLE_PREFIXES`]; further matches are ignored (single-bundle
/// assumption). Returns `Ok(None)` when no entry is recognized — callers
/// must treat "no data for this date" as expected. Fails only on a corrupt
/// container or an unreadable spreadsheet.
pub fn parse_archive(data: &[u8]) -> Result<Option<ArchiveBundle>, EsiosError> {
    let mut archive =
        ZipArchive::new(Cursor::new(data)).map_err(|e| ArchiveError::Zip(e.to_string()))?;

    // by_index preserves archive order; file_names() does not
    let mut matched = None;
    for i in 0..archive.len() {
        let name = archive
            .by_index(i)
            .map_err(|e| ArchiveError::Zip(e.to_string()))?
            .name()
            .to_string();
        if BUNDLE_PREFIXES.iter().any(|p| name.starts_with(p)) {
            matched = Some(name);
            break;
        }
        tracing::warn!(entry = %name, "unrecognized archive entry");
    }
    let name = match matched {
        Some(name) => name,
        None => return Ok(None),
    };

    let mut bytes = Vec::new();
    archive
        .by_name(&name)
        .map_err(|e| ArchiveError::Zip(e.to_string()))?
        .read_to_end(&mut bytes)
        .map_err(|e| ArchiveError::Zip(e.to_string()))?;

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ArchiveError::Spreadsheet(e.to_string()))?;
    let sheet_names = workbook.sheet_names();
    let directory_sheet = sheet_names
        .first()
        .cloned()
        .ok_or(ArchiveError::EmptyWorkbook)?;
    let directory_range = workbook
        .worksheet_range(&directory_sheet)
        .map_err(|e| ArchiveError::Spreadsheet(e.to_string()))?;

    let mut bundle = ArchiveBundle::new();
    for (sheet_name, label) in sheet_directory(&directory_range) {
        if label == RESERVED_LABEL {
            continue;
        }
        if !sheet_names.iter().any(|n| *n == sheet_name) {
            return Err(ArchiveError::MissingSheet(sheet_name).into());
        }
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ArchiveError::Spreadsheet(e.to_string()))?;
        bundle.insert(label, sheet_to_table(&range));
    }
    tracing::debug!(entry = %name, sheets = bundle.len(), "parsed archive bundle");
    Ok(Some(bundle))
}

/// Decode the directory sheet into (sheet-name, label) pairs
///
/// Reads the first two data columns below [`DIRECTORY_HEADER_ROW`],
/// skipping rows where either cell is blank.
pub(crate) fn sheet_directory(range: &Range<Data>) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let end_row = match range.end() {
        Some((row, _)) => row,
        None => return entries,
    };
    for row in (DIRECTORY_HEADER_ROW + 1)..=end_row {
        let sheet_name = range.get_value((row, 0)).and_then(cell_text);
        let label = range.get_value((row, 1)).and_then(cell_text);
        if let (Some(sheet_name), Some(label)) = (sheet_name, label) {
            entries.push((sheet_name, label));
        }
    }
    entries
}

/// Decode a data sheet: row [`SHEET_HEADER_ROW`] becomes the headers, the
/// rows below it become typed data rows
pub(crate) fn sheet_to_table(range: &Range<Data>) -> Sheet {
    let end = match range.end() {
        Some(end) => end,
        None => {
            return Sheet {
                headers: Vec::new(),
                rows: Vec::new(),
            }
        }
    };
    let width = end.1 + 1;

    let headers = (0..width)
        .map(|col| {
            range
                .get_value((SHEET_HEADER_ROW, col))
                .and_then(cell_text)
                .unwrap_or_default()
        })
        .collect();

    let mut rows = Vec::new();
    for row in (SHEET_HEADER_ROW + 1)..=end.0 {
        let cells: Vec<SheetCell> = (0..width)
            .map(|col| {
                range
                    .get_value((row, col))
                    .map(convert_cell)
                    .unwrap_or(SheetCell::Empty)
            })
            .collect();
        rows.push(cells);
    }
    Sheet { headers, rows }
}

fn convert_cell(data: &Data) -> SheetCell {
    match data {
        Data::Empty | Data::Error(_) => SheetCell::Empty,
        Data::String(s) => SheetCell::Text(s.clone()),
        Data::Float(f) => SheetCell::Number(*f),
        Data::Int(i) => SheetCell::Number(*i as f64),
        Data::Bool(b) => SheetCell::Bool(*b),
        Data::DateTime(dt) => SheetCell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => SheetCell::Text(s.clone()),
    }
}

fn cell_text(data: &Data) -> Option<String> {
    match data {
        Data::Empty => None,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    #[test]
    fn test_sheet_directory_reads_below_header() {
        let mut range: Range<Data> = Range::new((0, 0), (12, 1));
        range.set_value((9, 0), Data::String("Hoja".to_string()));
        range.set_value((9, 1), Data::String("Descripción".to_string()));
        range.set_value((10, 0), Data::String("Demanda".to_string()));
        range.set_value((10, 1), Data::String("Demanda del sistema".to_string()));
        // row 11 left blank on purpose
        range.set_value((12, 0), Data::String("X".to_string()));
        range.set_value((12, 1), Data::String("Reservada".to_string()));

        let entries = sheet_directory(&range);
        assert_eq!(
            entries,
            vec![
                ("Demanda".to_string(), "Demanda del sistema".to_string()),
                ("X".to_string(), "Reservada".to_string()),
            ]
        );
    }

    #[test]
    fn test_sheet_directory_empty_range() {
        let range: Range<Data> = Range::new((0, 0), (0, 0));
        assert!(sheet_directory(&range).is_empty());
    }

    #[test]
    fn test_sheet_to_table_skips_leading_rows() {
        let mut range: Range<Data> = Range::new((0, 0), (4, 2));
        range.set_value((0, 0), Data::String("Informe I90".to_string()));
        range.set_value((2, 0), Data::String("Hora".to_string()));
        range.set_value((2, 1), Data::String("Valor".to_string()));
        range.set_value((3, 0), Data::Int(1));
        range.set_value((3, 1), Data::Float(42.5));
        range.set_value((4, 0), Data::Int(2));
        range.set_value((4, 1), Data::String("N.D.".to_string()));

        let sheet = sheet_to_table(&range);
        assert_eq!(
            sheet.headers,
            vec!["Hora".to_string(), "Valor".to_string(), String::new()]
        );
        assert_eq!(sheet.num_rows(), 2);
        assert_eq!(sheet.rows[0][0], SheetCell::Number(1.0));
        assert_eq!(sheet.rows[0][1], SheetCell::Number(42.5));
        assert_eq!(sheet.rows[1][1], SheetCell::Text("N.D.".to_string()));
        assert_eq!(sheet.rows[0][2], SheetCell::Empty);
    }

    fn zip_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_no_recognized_entry_is_absent_not_error() {
        let zip = zip_with_entries(&[("readme.txt", b"hello".as_slice())]);
        let result = parse_archive(&zip).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_empty_zip_is_absent() {
        let zip = zip_with_entries(&[]);
        assert!(parse_archive(&zip).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_container_is_error() {
        let err = parse_archive(b"not a zip at all").unwrap_err();
        assert!(matches!(err, EsiosError::Archive(ArchiveError::Zip(_))));
    }

    // -- minimal XLSX fixture ------------------------------------------------

    fn text_cell(cell_ref: &str, text: &str) -> String {
        format!(
            r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
            cell_ref, text
        )
    }

    fn number_cell(cell_ref: &str, value: f64) -> String {
        format!(r#"<c r="{}"><v>{}</v></c>"#, cell_ref, value)
    }

    fn worksheet(rows: &[(u32, Vec<String>)]) -> String {
        let body: String = rows
            .iter()
            .map(|(r, cells)| format!(r#"<row r="{}">{}</row>"#, r, cells.concat()))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
            body
        )
    }

    /// Build a minimal XLSX workbook from (sheet name, worksheet XML) parts
    fn minimal_xlsx(sheets: &[(&str, String)]) -> Vec<u8> {
        let mut content_types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
        );
        let mut workbook_sheets = String::new();
        let mut workbook_rels = String::new();
        let mut parts: Vec<(String, String)> = Vec::new();
        for (i, (name, xml)) in sheets.iter().enumerate() {
            let n = i + 1;
            content_types.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            ));
            workbook_sheets.push_str(&format!(
                r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#
            ));
            workbook_rels.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
            ));
            parts.push((format!("xl/worksheets/sheet{n}.xml"), xml.clone()));
        }
        content_types.push_str("</Types>");

        let rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;
        let workbook = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>{}</sheets></workbook>"#,
            workbook_sheets
        );
        let workbook_rels = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
            workbook_rels
        );

        let mut files: Vec<(&str, &str)> = vec![
            ("[Content_Types].xml", content_types.as_str()),
            ("_rels/.rels", rels),
            ("xl/workbook.xml", workbook.as_str()),
            ("xl/_rels/workbook.xml.rels", workbook_rels.as_str()),
        ];
        for (path, xml) in &parts {
            files.push((path.as_str(), xml.as_str()));
        }
        let entries: Vec<(&str, &[u8])> =
            files.iter().map(|(n, c)| (*n, c.as_bytes())).collect();
        zip_with_entries(&entries)
    }

    fn sample_bundle_zip() -> Vec<u8> {
        // directory sheet: header block ends at row 10 (1-based), data below
        let directory = worksheet(&[
            (1, vec![text_cell("A1", "I90DIA")]),
            (
                10,
                vec![text_cell("A10", "Hoja"), text_cell("B10", "Descripción")],
            ),
            (
                11,
                vec![text_cell("A11", "Demanda"), text_cell("B11", "Demanda")],
            ),
            (
                12,
                vec![text_cell("A12", "X"), text_cell("B12", "Reservada")],
            ),
        ]);
        // data sheet: two title rows, header on row 3, one data row
        let demanda = worksheet(&[
            (1, vec![text_cell("A1", "Informe I90")]),
            (3, vec![text_cell("A3", "Hora"), text_cell("B3", "Valor")]),
            (4, vec![number_cell("A4", 1.0), number_cell("B4", 42.5)]),
        ]);
        // the reserved sheet exists but must never be decoded
        let reserved = worksheet(&[(1, vec![text_cell("A1", "reservado")])]);
        let xlsx = minimal_xlsx(&[
            ("Indice", directory),
            ("Demanda", demanda),
            ("X", reserved),
        ]);
        zip_with_entries(&[
            ("notes.txt", b"ignored".as_slice()),
            ("I90DIA_20210601.xls", xlsx.as_slice()),
        ])
    }

    #[test]
    fn test_bundle_end_to_end() {
        let bundle = parse_archive(&sample_bundle_zip()).unwrap().unwrap();
        assert_eq!(bundle.labels().collect::<Vec<_>>(), vec!["Demanda"]);
        assert!(!bundle.contains("Reservada"));
        assert!(!bundle.contains("X"));

        let sheet = bundle.get("Demanda").unwrap();
        assert_eq!(sheet.headers, vec!["Hora".to_string(), "Valor".to_string()]);
        assert_eq!(sheet.num_rows(), 1);
        assert_eq!(sheet.rows[0][1], SheetCell::Number(42.5));
    }

    #[test]
    fn test_first_matching_entry_wins() {
        // a second recognized entry that is not even a spreadsheet must be
        // ignored once the first match is processed
        let directory = worksheet(&[(
            10,
            vec![text_cell("A10", "Hoja"), text_cell("B10", "Desc")],
        )]);
        let xlsx = minimal_xlsx(&[("Indice", directory)]);
        let zip = zip_with_entries(&[
            ("I3DIA_20210601.xls", xlsx.as_slice()),
            ("IMES_garbage.xls", b"garbage".as_slice()),
        ]);
        let bundle = parse_archive(&zip).unwrap().unwrap();
        assert!(bundle.is_empty());
    }
}
