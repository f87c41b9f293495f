use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;

use crate::error::Result;
use crate::schedule::merge::roster_to_docs;
use crate::schedule::types::{ShiftRecord, Student};

/// Builds an iCalendar document for one student's merged schedule
///
/// Every non-empty shift that is not OFF becomes a VEVENT from 07:00 to
/// 15:00 local wall time on its date. Lines are CRLF separated as the
/// format requires.
pub fn generate_ics(user_name: &str, schedule: &BTreeMap<String, ShiftRecord>) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//Clinical Rota//Clinical Rota v1.0//EN".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
    ];

    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let uid_name = underscore_whitespace(user_name);

    for (date, shift) in schedule {
        if shift.code.is_empty() || shift.code.eq_ignore_ascii_case("OFF") {
            continue;
        }
        let compact_date = date.replace('-', "");

        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:{}-{}-{}@clinicalrota.app", date, shift.code, uid_name));
        lines.push(format!("DTSTAMP:{}", stamp));
        lines.push(format!("DTSTART:{}T070000", compact_date));
        lines.push(format!("DTEND:{}T150000", compact_date));
        lines.push(format!("SUMMARY:Clinical Rotation: {}", shift.code));
        lines.push(format!("LOCATION:{}", shift.hospital));
        lines.push(format!(
            "DESCRIPTION:Clinical rotation for {} at {}. Shift code: {}.",
            user_name, shift.hospital, shift.code
        ));
        lines.push("STATUS:CONFIRMED".to_string());
        lines.push("TRANSP:OPAQUE".to_string());
        lines.push("END:VEVENT".to_string());
    }

    lines.push("END:VCALENDAR".to_string());
    lines.join("\r\n")
}

/// Download filename for a student's calendar
pub fn ics_filename(user_name: &str) -> String {
    format!("{}_Clinical_Schedule.ics", underscore_whitespace(user_name))
}

fn underscore_whitespace(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Writes the roster to disk in the document shape the store uses
pub fn write_roster_json(path: &Path, students: &[Student]) -> Result<()> {
    let docs = roster_to_docs(students);
    fs::write(path, serde_json::to_string_pretty(&docs)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::ScheduleDoc;
    use tempfile::TempDir;

    fn record(code: &str, hospital: &str) -> ShiftRecord {
        ShiftRecord {
            code: code.to_string(),
            hospital: hospital.to_string(),
            color: "bg-yellow-500".to_string(),
        }
    }

    fn sample_schedule() -> BTreeMap<String, ShiftRecord> {
        BTreeMap::from([
            ("2026-01-15".to_string(), record("ICU 2", "Al Qasimi General Hospital")),
            ("2026-01-16".to_string(), record("OFF", "")),
            ("2026-01-17".to_string(), record("off", "")),
            ("2026-01-18".to_string(), record("", "")),
            ("2026-01-19".to_string(), record("ER", "Saqr Hospital")),
        ])
    }

    #[test]
    fn off_and_empty_shifts_produce_no_events() {
        let ics = generate_ics("Ahmed Mohammed Al Ali", &sample_schedule());
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
        assert!(!ics.contains("SUMMARY:Clinical Rotation: OFF"));
    }

    #[test]
    fn events_span_the_seven_to_three_shift() {
        let ics = generate_ics("Ahmed Mohammed Al Ali", &sample_schedule());
        assert!(ics.contains("DTSTART:20260115T070000"));
        assert!(ics.contains("DTEND:20260115T150000"));
    }

    #[test]
    fn uid_carries_date_code_and_underscored_name() {
        let ics = generate_ics("Ahmed Mohammed Al Ali", &sample_schedule());
        assert!(ics.contains("UID:2026-01-15-ICU 2-Ahmed_Mohammed_Al_Ali@clinicalrota.app"));
    }

    #[test]
    fn calendar_uses_crlf_line_endings() {
        let ics = generate_ics("Ahmed Mohammed Al Ali", &sample_schedule());
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(ics.ends_with("END:VCALENDAR"));
        assert!(!ics.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn filename_replaces_each_space() {
        assert_eq!(
            ics_filename("Fatima Hassan"),
            "Fatima_Hassan_Clinical_Schedule.ics"
        );
    }

    #[test]
    fn roster_json_round_trips_through_the_doc_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updated_schedule.json");

        let student = Student {
            id: "22904073".to_string(),
            full_name: "Ahmed Mohammed Al Ali".to_string(),
            display_name: "Ahmed Mohammed".to_string(),
            schedule: BTreeMap::from([(
                "2026-01-15".to_string(),
                record("ICU 2", "Al Qasimi General Hospital"),
            )]),
        };
        write_roster_json(&path, std::slice::from_ref(&student)).unwrap();

        let docs: Vec<ScheduleDoc> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(docs[0].id, "22904073");
        assert_eq!(docs[0].shifts["2026-01-15"].shift, "ICU 2");
        assert_eq!(docs[0].shifts["2026-01-15"].hospital, "Al Qasimi General Hospital");
    }
}
