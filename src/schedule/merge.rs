use std::collections::BTreeMap;

use super::context::ContextDetector;
use super::hospitals::{Hospital, HospitalClassifier, HospitalDirectory};
use super::parse::derive_display_name;
use super::types::{
    DateRange, OverrideMap, Roster, ScheduleDoc, ShiftEntry, ShiftOverride, ShiftRecord, Student,
};

/// Applies one cell override on top of a resolved code/label pair
///
/// A set hospital replaces name and color together; the color falls back to
/// the directory when the override carries none. A set code replaces the
/// code alone, even when empty.
fn apply_cell_override(
    code: &mut String,
    label: &mut Hospital,
    ov: &ShiftOverride,
    directory: &HospitalDirectory,
) {
    if let Some(hospital) = &ov.hospital {
        if !hospital.is_empty() {
            *label = Hospital::new(
                hospital.clone(),
                ov.color
                    .clone()
                    .unwrap_or_else(|| directory.label_for(hospital).color),
            );
        }
    }
    if let Some(code_override) = &ov.code {
        *code = code_override.clone();
    }
}

/// Derives the displayed roster from store documents plus local overrides
///
/// Entries that already carry a hospital name resolve their color through
/// the directory; everything else goes through the classifier with the
/// student's context, computed from the raw pre-override codes. The merge
/// is total and idempotent, and only dates present in the base documents
/// are considered.
pub fn merge_docs(
    docs: &[ScheduleDoc],
    overrides: &OverrideMap,
    directory: &HospitalDirectory,
    classifier: &HospitalClassifier,
    detector: &ContextDetector,
) -> Roster {
    let mut students: Vec<Student> = docs
        .iter()
        .map(|doc| {
            let raw_codes: Vec<String> =
                doc.shifts.values().map(|entry| entry.shift.clone()).collect();
            let context = detector.detect(&raw_codes);

            let mut schedule = BTreeMap::new();
            for (date, entry) in &doc.shifts {
                let mut label = if entry.hospital.is_empty() {
                    classifier.classify(&entry.shift, context.as_deref())
                } else {
                    directory.label_for(&entry.hospital)
                };
                let mut code = entry.shift.clone();

                if let Some(ov) = overrides.get(&doc.id).and_then(|by_date| by_date.get(date)) {
                    apply_cell_override(&mut code, &mut label, ov, directory);
                }

                schedule.insert(
                    date.clone(),
                    ShiftRecord { code, hospital: label.name, color: label.color },
                );
            }

            Student {
                id: doc.id.clone(),
                full_name: doc.name.clone(),
                display_name: derive_display_name(&doc.name),
                schedule,
            }
        })
        .collect();

    sort_by_numeric_id(&mut students);

    let date_range = DateRange::from_dates(
        students
            .iter()
            .flat_map(|s| s.schedule.keys())
            .map(String::as_str),
    );

    Roster { total_students: students.len(), students, date_range }
}

/// Applies overrides to an already classified roster
///
/// Base records keep their derived hospital and color untouched unless an
/// override replaces them, so merging an empty map returns the roster
/// unchanged. Student order is preserved.
pub fn apply_overrides(
    students: &[Student],
    overrides: &OverrideMap,
    directory: &HospitalDirectory,
) -> Roster {
    let students: Vec<Student> = students
        .iter()
        .map(|student| {
            let mut schedule = BTreeMap::new();
            for (date, record) in &student.schedule {
                let mut code = record.code.clone();
                let mut label = Hospital::new(record.hospital.clone(), record.color.clone());

                if let Some(ov) = overrides
                    .get(&student.id)
                    .and_then(|by_date| by_date.get(date))
                {
                    apply_cell_override(&mut code, &mut label, ov, directory);
                }

                schedule.insert(
                    date.clone(),
                    ShiftRecord { code, hospital: label.name, color: label.color },
                );
            }
            Student { schedule, ..student.clone() }
        })
        .collect();

    let date_range = DateRange::from_dates(
        students
            .iter()
            .flat_map(|s| s.schedule.keys())
            .map(String::as_str),
    );

    Roster { total_students: students.len(), students, date_range }
}

/// Sorts students ascending by the numeric value of their id
pub fn sort_by_numeric_id(students: &mut [Student]) {
    students.sort_by_key(|s| s.id.parse::<i64>().unwrap_or(i64::MAX));
}

/// Converts roster students into store documents for persistence
pub fn roster_to_docs(students: &[Student]) -> Vec<ScheduleDoc> {
    students
        .iter()
        .map(|student| ScheduleDoc {
            id: student.id.clone(),
            name: student.full_name.clone(),
            shifts: student
                .schedule
                .iter()
                .map(|(date, record)| {
                    (
                        date.clone(),
                        ShiftEntry::new(record.code.clone(), record.hospital.clone()),
                    )
                })
                .collect(),
        })
        .collect()
}
