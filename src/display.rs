use std::collections::BTreeMap;

use crate::schedule::types::{Roster, Student};

/// Formats a student header line
pub fn format_student_line(student: &Student) -> String {
    format!("{} (ID: {})", student.display_name, student.id)
}

/// Counts a student's shifts per hospital
pub fn hospital_breakdown(student: &Student) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for record in student.schedule.values() {
        *counts.entry(record.hospital.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Prints the roster summary in a readable format
pub fn print_roster(roster: &Roster, review_color: &str) {
    println!("\n=== Clinical Rotation Roster ===");
    println!("Total students: {}", roster.total_students);

    if let (Some(start), Some(end)) = (
        roster.date_range.start_date.as_deref(),
        roster.date_range.end_date.as_deref(),
    ) {
        println!("Date range: {} to {}", start, end);
    }

    let review_cells: usize = roster
        .students
        .iter()
        .flat_map(|s| s.schedule.values())
        .filter(|r| r.color == review_color)
        .count();
    if review_cells > 0 {
        println!("⚠️  {} shifts could not be classified and need review", review_cells);
    }

    for student in &roster.students {
        println!(
            "\n  {} -> {} shifts",
            format_student_line(student),
            student.schedule.len()
        );
        for (hospital, count) in hospital_breakdown(student) {
            println!("    {} x{}", hospital, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::ShiftRecord;

    fn record(hospital: &str) -> ShiftRecord {
        ShiftRecord {
            code: "ER".to_string(),
            hospital: hospital.to_string(),
            color: "bg-yellow-500".to_string(),
        }
    }

    #[test]
    fn breakdown_counts_shifts_per_hospital() {
        let student = Student {
            id: "1001".to_string(),
            full_name: "Aisha Said".to_string(),
            display_name: "Aisha Said".to_string(),
            schedule: BTreeMap::from([
                ("2026-01-15".to_string(), record("Saqr Hospital")),
                ("2026-01-16".to_string(), record("Saqr Hospital")),
                ("2026-01-17".to_string(), record("Dibba Hospital")),
            ]),
        };
        let breakdown = hospital_breakdown(&student);
        assert_eq!(breakdown["Saqr Hospital"], 2);
        assert_eq!(breakdown["Dibba Hospital"], 1);
    }

    #[test]
    fn student_line_uses_the_display_name() {
        let student = Student {
            id: "22904073".to_string(),
            full_name: "Ahmed Mohammed Al Ali".to_string(),
            display_name: "Ahmed Mohammed".to_string(),
            schedule: BTreeMap::new(),
        };
        assert_eq!(format_student_line(&student), "Ahmed Mohammed (ID: 22904073)");
    }
}
