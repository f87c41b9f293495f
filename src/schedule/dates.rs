use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::error::{Result, ScheduleError};
use crate::parser::{excel_serial_to_date, RawCell};

/// Knobs for locating and decoding the date header
#[derive(Debug, Clone)]
pub struct DateResolverConfig {
    pub scan_rows: usize,
    pub day_row_threshold: usize, // two-digit day cells required, exclusive
    pub fallback_day_row: usize,
    pub start_column: usize,
    pub default_year: i32,
    pub default_month: u32,
}

impl Default for DateResolverConfig {
    fn default() -> Self {
        DateResolverConfig {
            scan_rows: 6,
            day_row_threshold: 5,
            fallback_day_row: 2,
            start_column: 3,
            default_year: 2026,
            default_month: 1,
        }
    }
}

/// Parses the leading integer of a cell's text, parseInt-style
///
/// "26 Mon" gives 26; "Week 2" gives None because the text does not start
/// with a digit.
fn leading_int(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Locates the header row holding day-of-month numbers
///
/// Two-digit values distinguish the day row from a week-number row of small
/// integers. Falls back to a fixed index when no row qualifies.
pub fn find_day_row(rows: &[Vec<RawCell>], config: &DateResolverConfig) -> usize {
    let limit = config.scan_rows.min(rows.len());
    for (index, row) in rows.iter().take(limit).enumerate() {
        let two_digit_days = row
            .iter()
            .filter(|cell| {
                leading_int(&cell.as_text())
                    .map(|n| (10..=31).contains(&n))
                    .unwrap_or(false)
            })
            .count();
        if two_digit_days > config.day_row_threshold {
            return index;
        }
    }
    config.fallback_day_row
}

/// Determines the base year/month from the month header row
///
/// Accepts a native date cell, a spreadsheet serial number, or a text date
/// containing '-' or '/'. Falls back to the configured defaults.
fn detect_base_month(month_row: &[RawCell], config: &DateResolverConfig) -> (i32, u32) {
    for cell in month_row {
        match cell {
            RawCell::Date(date) => return (date.year(), date.month()),
            RawCell::Number(n) if *n > 40_000.0 => {
                if let Some(date) = excel_serial_to_date(*n) {
                    return (date.year(), date.month());
                }
            }
            RawCell::Text(s) => {
                let text = s.trim();
                if text.contains('-') || text.contains('/') {
                    if let Some(date) = parse_flexible_date(text) {
                        return (date.year(), date.month());
                    }
                }
            }
            _ => {}
        }
    }
    (config.default_year, config.default_month)
}

// Month-first forms take precedence over day-first, matching the exports
// this parser was built against.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y", "%d/%m/%Y", "%d-%m-%Y"];

fn parse_flexible_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Advances (year, month) by one calendar month, wrapping December
fn advance_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Maps header columns to ISO dates, rolling the month forward on decreases
///
/// Returns the day header row index together with the column mapping. Cells
/// that do not parse as a day-of-month are skipped; an unconstructible date
/// (day out of range for the month) skips that cell only.
pub fn resolve_date_columns(
    rows: &[Vec<RawCell>],
    config: &DateResolverConfig,
) -> Result<(usize, BTreeMap<usize, String>)> {
    if rows.is_empty() {
        return Err(ScheduleError::MalformedInput(
            "schedule grid is empty".to_string(),
        ));
    }
    let day_row_index = find_day_row(rows, config);
    let day_row = rows.get(day_row_index).ok_or_else(|| {
        ScheduleError::MalformedInput("no day header row found".to_string())
    })?;

    let (mut year, mut month) = detect_base_month(&rows[0], config);
    let mut date_columns = BTreeMap::new();
    let mut previous_day: Option<u32> = None;

    for (column, cell) in day_row.iter().enumerate().skip(config.start_column) {
        let day = match leading_int(&cell.as_text()) {
            Some(d) if (1..=31).contains(&d) => d,
            _ => continue, // spacer or merge artifact
        };
        if let Some(last) = previous_day {
            // A decreasing day value means the header crossed into the next
            // month. Decreases from a mid-month value advance the same way.
            if day < last {
                let (y, m) = advance_month(year, month);
                year = y;
                month = m;
            }
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            date_columns.insert(column, date.format("%Y-%m-%d").to_string());
        }
        previous_day = Some(day);
    }

    if date_columns.is_empty() {
        log::debug!(
            "no date columns resolved from header row {}",
            day_row_index
        );
    }

    Ok((day_row_index, date_columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(cells: &[&str]) -> Vec<RawCell> {
        cells
            .iter()
            .map(|s| {
                if s.is_empty() {
                    RawCell::Empty
                } else {
                    RawCell::Text(s.to_string())
                }
            })
            .collect()
    }

    #[test]
    fn leading_int_matches_parse_int_semantics() {
        assert_eq!(leading_int("26 Mon"), Some(26));
        assert_eq!(leading_int("  15"), Some(15));
        assert_eq!(leading_int("Week 2"), None);
        assert_eq!(leading_int(""), None);
    }

    #[test]
    fn day_row_detected_by_two_digit_values() {
        let rows = vec![
            text_row(&["Rotation Schedule", "", "", "1", "2", "3", "4", "5", "6"]),
            text_row(&["", "ID", "Name", "12", "13", "14", "15", "16", "17"]),
        ];
        let config = DateResolverConfig::default();
        assert_eq!(find_day_row(&rows, &config), 1);
    }

    #[test]
    fn day_row_falls_back_when_nothing_qualifies() {
        let rows = vec![
            text_row(&["Schedule"]),
            text_row(&["", "ID", "Name"]),
            text_row(&["", "", "", "5", "6"]),
            text_row(&["", "1", "Somebody"]),
        ];
        let config = DateResolverConfig::default();
        assert_eq!(find_day_row(&rows, &config), 2);
    }

    #[test]
    fn month_rolls_forward_at_end_of_month() {
        let rows = vec![
            text_row(&["JANUARY 2026"]),
            Vec::new(),
            text_row(&["Week", "ID", "Name", "26", "27", "28", "29", "30", "31", "1", "2"]),
            text_row(&["", "1001", "Somebody", "ER"]),
        ];
        let config = DateResolverConfig::default();
        let (day_row, columns) = resolve_date_columns(&rows, &config).unwrap();
        assert_eq!(day_row, 2);
        assert_eq!(columns[&3], "2026-01-26");
        assert_eq!(columns[&8], "2026-01-31");
        assert_eq!(columns[&9], "2026-02-01");
        assert_eq!(columns[&10], "2026-02-02");

        // Dates never move backward across columns
        let dates: Vec<&String> = columns.values().collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn decrease_from_mid_month_value_also_advances() {
        let rows = vec![
            Vec::new(),
            Vec::new(),
            text_row(&["", "", "", "15", "16", "17", "18", "5"]),
            text_row(&["", "1001", "Somebody", "ER"]),
        ];
        let config = DateResolverConfig::default();
        let (_, columns) = resolve_date_columns(&rows, &config).unwrap();
        assert_eq!(columns[&6], "2026-01-18");
        assert_eq!(columns[&7], "2026-02-05");
    }

    #[test]
    fn december_rollover_wraps_the_year() {
        let rows = vec![
            text_row(&["12/01/2026"]),
            Vec::new(),
            text_row(&["", "", "", "26", "27", "28", "29", "30", "31", "1"]),
            text_row(&["", "1001", "Somebody", "ER"]),
        ];
        let config = DateResolverConfig::default();
        let (_, columns) = resolve_date_columns(&rows, &config).unwrap();
        assert_eq!(columns[&8], "2026-12-31");
        assert_eq!(columns[&9], "2027-01-01");
    }

    #[test]
    fn base_month_from_serial_number_cell() {
        let mut month_row = vec![RawCell::Empty, RawCell::Number(46023.0)];
        let config = DateResolverConfig::default();
        assert_eq!(detect_base_month(&month_row, &config), (2026, 1));

        // Small numbers are not serial dates
        month_row[1] = RawCell::Number(235.0);
        assert_eq!(detect_base_month(&month_row, &config), (2026, 1));
    }

    #[test]
    fn base_month_from_native_date_cell() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let month_row = vec![RawCell::Date(date)];
        let config = DateResolverConfig::default();
        assert_eq!(detect_base_month(&month_row, &config), (2025, 6));
    }

    #[test]
    fn base_month_from_text_date() {
        let config = DateResolverConfig::default();
        let month_row = text_row(&["Rota", "02/01/2026"]);
        assert_eq!(detect_base_month(&month_row, &config), (2026, 2));

        // Plain month names carry no '-' or '/' and fall back to defaults
        let month_row = text_row(&["FEBRUARY 2026"]);
        assert_eq!(detect_base_month(&month_row, &config), (2026, 1));
    }

    #[test]
    fn empty_grid_is_malformed() {
        let config = DateResolverConfig::default();
        assert!(matches!(
            resolve_date_columns(&[], &config),
            Err(ScheduleError::MalformedInput(_))
        ));
    }

    #[test]
    fn invalid_calendar_day_skips_cell_only() {
        let rows = vec![
            text_row(&["02/01/2026"]),
            Vec::new(),
            text_row(&["", "", "", "27", "28", "29", "30", "31", "25"]),
            text_row(&["", "1001", "Somebody", "ER"]),
        ];
        let config = DateResolverConfig::default();
        let (_, columns) = resolve_date_columns(&rows, &config).unwrap();
        // February has no 29th in 2026; 30 and 31 are skipped the same way
        assert_eq!(columns.get(&5), None);
        assert_eq!(columns.get(&6), None);
        assert_eq!(columns.get(&7), None);
        assert_eq!(columns[&3], "2026-02-27");
        // The trailing 25 still rolls into March
        assert_eq!(columns[&8], "2026-03-25");
    }
}
