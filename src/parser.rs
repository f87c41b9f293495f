use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets};
use chrono::NaiveDate;
use csv::ReaderBuilder;

use crate::error::{Result, ScheduleError};

/// A spreadsheet cell normalized from either source encoding
///
/// CSV input only ever produces `Empty` and `Text`; workbook input also
/// carries native numbers and dates.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl RawCell {
    /// Renders the cell as trimmed text
    ///
    /// Integral numbers drop the fractional part so workbook ids like
    /// 22904073.0 compare equal to their CSV form "22904073".
    pub fn as_text(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(s) => s.trim().to_string(),
            RawCell::Number(n) => format_number(*n),
            RawCell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Converts a spreadsheet serial day count (epoch 1899-12-30) to a date
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial <= 0.0 || serial >= 300_000.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(serial.trunc() as i64)))
}

/// Accepted source encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Workbook,
}

/// Determines the source format from the file name
///
/// Unknown extensions are rejected here, before any file contents are read.
pub fn source_format(filename: &str) -> Result<SourceFormat> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => Ok(SourceFormat::Csv),
        "xlsx" | "xls" => Ok(SourceFormat::Workbook),
        _ => Err(ScheduleError::UnsupportedFormat(filename.to_string())),
    }
}

/// Reads a schedule file into the shared grid abstraction
pub fn read_grid_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<RawCell>>> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    // Reject unsupported extensions before touching the file contents
    source_format(&name)?;
    let bytes = std::fs::read(path)?;
    read_grid_from_bytes(&name, &bytes)
}

/// Reads an uploaded schedule (filename + raw bytes) into the grid abstraction
pub fn read_grid_from_bytes(filename: &str, bytes: &[u8]) -> Result<Vec<Vec<RawCell>>> {
    match source_format(filename)? {
        SourceFormat::Csv => {
            let text = String::from_utf8_lossy(bytes);
            csv_grid(&text)
        }
        SourceFormat::Workbook => {
            let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
            workbook_grid(&mut workbook)
        }
    }
}

/// Decodes delimited text into grid rows, respecting quoted fields
fn csv_grid(text: &str) -> Result<Vec<Vec<RawCell>>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    RawCell::Empty
                } else {
                    RawCell::Text(field.to_string())
                }
            })
            .collect();
        rows.push(cells);
    }
    Ok(rows)
}

/// Decodes the first worksheet of a workbook into grid rows
///
/// The used range may not start at A1; rows and columns are padded so cell
/// positions stay absolute.
fn workbook_grid<RS>(workbook: &mut Sheets<RS>) -> Result<Vec<Vec<RawCell>>>
where
    RS: std::io::Read + std::io::Seek,
{
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ScheduleError::MalformedInput("workbook has no sheets".to_string()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let (row_offset, col_offset) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => return Ok(Vec::new()),
    };

    let mut rows: Vec<Vec<RawCell>> = vec![Vec::new(); row_offset];
    for sheet_row in range.rows() {
        let mut cells = vec![RawCell::Empty; col_offset];
        cells.extend(sheet_row.iter().map(data_to_cell));
        rows.push(cells);
    }
    Ok(rows)
}

fn data_to_cell(data: &Data) -> RawCell {
    match data {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Float(f) => RawCell::Number(*f),
        Data::Bool(b) => RawCell::Text(b.to_string()),
        Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
            Some(date) => RawCell::Date(date),
            None => RawCell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(RawCell::Date)
            .unwrap_or_else(|| RawCell::Text(s.clone())),
        Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(_) => RawCell::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_quoted_field_keeps_embedded_comma() {
        let rows = csv_grid("a,\"b, c\",d\n1,2,3\n").unwrap();
        assert_eq!(rows[0][1].as_text(), "b, c");
        assert_eq!(rows[1][2].as_text(), "3");
    }

    #[test]
    fn csv_leading_bom_is_stripped() {
        let rows = csv_grid("\u{feff}x,y\n").unwrap();
        assert_eq!(rows[0][0].as_text(), "x");
    }

    #[test]
    fn csv_blank_fields_become_empty_cells() {
        let rows = csv_grid("a,,  ,b\n").unwrap();
        assert!(rows[0][1].is_empty());
        assert!(rows[0][2].is_empty());
        assert!(!rows[0][3].is_empty());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            source_format("notes.txt"),
            Err(ScheduleError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            source_format("rota.ods"),
            Err(ScheduleError::UnsupportedFormat(_))
        ));
        assert!(matches!(source_format("rota.csv"), Ok(SourceFormat::Csv)));
        assert!(matches!(
            source_format("rota.XLSX"),
            Ok(SourceFormat::Workbook)
        ));
    }

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(RawCell::Number(22904073.0).as_text(), "22904073");
        assert_eq!(RawCell::Number(22.5).as_text(), "22.5");
    }

    #[test]
    fn serial_dates_convert_from_1900_epoch() {
        assert_eq!(
            excel_serial_to_date(46023.0),
            NaiveDate::from_ymd_opt(2026, 1, 1)
        );
        assert_eq!(
            excel_serial_to_date(45658.0),
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );
        assert_eq!(excel_serial_to_date(-5.0), None);
    }
}
