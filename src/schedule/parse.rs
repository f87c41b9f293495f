use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, ScheduleError};
use crate::parser::{read_grid_from_bytes, read_grid_from_path, RawCell};

use super::context::ContextDetector;
use super::dates::{resolve_date_columns, DateResolverConfig};
use super::hospitals::{
    HospitalClassifier, ABDULLAH_HOSPITAL, AQ_GENERAL_HOSPITAL, AQ_WOMEN_HOSPITAL,
    COMMUNITY_HEALTH, DIBBA_HOSPITAL, SAQR_HOSPITAL,
};
use super::types::{DateRange, ParsedSchedule, ShiftRecord, Student};

/// Knobs for the table parser
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub dates: DateResolverConfig,
    pub min_rows: usize,
    pub id_column: usize,
    pub name_column: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            dates: DateResolverConfig::default(),
            min_rows: 4,
            id_column: 1,
            name_column: 2,
        }
    }
}

/// First two whitespace-separated tokens of a full name
pub fn derive_display_name(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps an explicit hospital-column value to a canonical hospital name
///
/// Keywords are matched case-insensitively, the short sheet abbreviations
/// (AQG, AQW, AB, DB) case-sensitively.
fn explicit_hospital(value: &str) -> Option<&'static str> {
    let lower = value.to_lowercase();
    if lower.contains("saqr") {
        return Some(SAQR_HOSPITAL);
    }
    if lower.contains("general") || value.contains("AQG") {
        return Some(AQ_GENERAL_HOSPITAL);
    }
    if lower.contains("women") || value.contains("AQW") {
        return Some(AQ_WOMEN_HOSPITAL);
    }
    if lower.contains("abdullah") || value.contains("AB") {
        return Some(ABDULLAH_HOSPITAL);
    }
    if lower.contains("dibba") || value.contains("DB") {
        return Some(DIBBA_HOSPITAL);
    }
    if lower.contains("community") {
        return Some(COMMUNITY_HEALTH);
    }
    None
}

/// Parses a decoded grid into the normalized roster
///
/// # Arguments
/// * `rows` - the raw grid from either source encoding
/// * `config` - header heuristics and column layout
/// * `classifier` - hospital ruleset applied per cell
/// * `detector` - per-student context inference
pub fn parse_schedule(
    rows: &[Vec<RawCell>],
    config: &ParserConfig,
    classifier: &HospitalClassifier,
    detector: &ContextDetector,
) -> Result<ParsedSchedule> {
    if rows.len() < config.min_rows {
        return Err(ScheduleError::MalformedInput(format!(
            "expected at least {} rows, got {}",
            config.min_rows,
            rows.len()
        )));
    }

    let (day_row_index, date_columns) = resolve_date_columns(rows, &config.dates)?;

    // Scan the likely header rows for an explicit hospital column; the last
    // matching cell wins
    let mut hospital_column: Option<usize> = None;
    for row_index in [0, 1, 2, day_row_index] {
        if let Some(row) = rows.get(row_index) {
            for (col, cell) in row.iter().enumerate() {
                if cell.as_text().to_lowercase().contains("hospital") {
                    hospital_column = Some(col);
                }
            }
        }
    }

    let start_column = config.dates.start_column;
    let mut students = Vec::new();

    for row in rows.iter().skip(day_row_index + 1) {
        if row.len() <= config.name_column {
            continue;
        }

        let id = row
            .get(config.id_column)
            .map(|c| c.as_text())
            .unwrap_or_default();
        let full_name = row
            .get(config.name_column)
            .map(|c| c.as_text().replace('"', "").trim().to_string())
            .unwrap_or_default();

        // Section separators and blank rows have no numeric id
        if id.is_empty() || full_name.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let display_name = derive_display_name(&full_name);

        let explicit = hospital_column
            .and_then(|col| row.get(col))
            .map(|cell| cell.as_text())
            .filter(|value| !value.is_empty())
            .and_then(|value| explicit_hospital(&value));

        // Context detection sees every code cell past the start column,
        // dated or not
        let raw_codes: Vec<String> = row
            .iter()
            .skip(start_column)
            .map(|cell| cell.as_text())
            .collect();
        let context = match explicit {
            Some(hospital) => Some(hospital.to_string()),
            None => detector.detect(&raw_codes),
        };

        let mut schedule = BTreeMap::new();
        for (col, cell) in row.iter().enumerate().skip(start_column) {
            let date = match date_columns.get(&col) {
                Some(date) => date,
                None => continue,
            };
            let code = cell.as_text();
            if code.is_empty() {
                continue;
            }
            let hospital = classifier.classify(&code, context.as_deref());
            schedule.insert(
                date.clone(),
                ShiftRecord {
                    code,
                    hospital: hospital.name,
                    color: hospital.color,
                },
            );
        }

        // A row with no dated shifts is not a student
        if schedule.is_empty() {
            continue;
        }

        students.push(Student { id, full_name, display_name, schedule });
    }

    let date_range = DateRange::from_dates(
        students
            .iter()
            .flat_map(|s| s.schedule.keys())
            .map(String::as_str),
    );

    log::info!(
        "parsed {} students across {} date columns",
        students.len(),
        date_columns.len()
    );

    Ok(ParsedSchedule {
        total_students: students.len(),
        students,
        date_columns,
        date_range,
    })
}

/// Loads and parses a schedule file from disk
pub fn parse_schedule_file<P: AsRef<Path>>(
    path: P,
    config: &ParserConfig,
    classifier: &HospitalClassifier,
    detector: &ContextDetector,
) -> Result<ParsedSchedule> {
    let rows = read_grid_from_path(path)?;
    parse_schedule(&rows, config, classifier, detector)
}

/// Parses an uploaded schedule from its filename and raw bytes
pub fn parse_schedule_bytes(
    filename: &str,
    bytes: &[u8],
    config: &ParserConfig,
    classifier: &HospitalClassifier,
    detector: &ContextDetector,
) -> Result<ParsedSchedule> {
    let rows = read_grid_from_bytes(filename, bytes)?;
    parse_schedule(&rows, config, classifier, detector)
}
