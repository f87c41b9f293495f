use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

/// One classified shift cell: raw rotation code plus the derived hospital
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub code: String,
    pub hospital: String,
    pub color: String,
}

/// A student row from the parsed schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub full_name: String,
    pub display_name: String,
    pub schedule: BTreeMap<String, ShiftRecord>, // ISO date -> shift
}

/// Overall span of the schedule, from the union of all per-student dates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl DateRange {
    /// Computes the min/max span over a set of ISO date strings
    pub fn from_dates<'a, I: IntoIterator<Item = &'a str>>(dates: I) -> Self {
        let mut sorted: Vec<&str> = dates.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();
        DateRange {
            start_date: sorted.first().map(|d| d.to_string()),
            end_date: sorted.last().map(|d| d.to_string()),
        }
    }
}

/// The displayed roster: merged students plus summary fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    pub students: Vec<Student>,
    pub total_students: usize,
    pub date_range: DateRange,
}

/// Direct output of a parse: the roster plus the resolved column mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSchedule {
    pub students: Vec<Student>,
    pub date_columns: BTreeMap<usize, String>, // column index -> ISO date
    pub total_students: usize,
    pub date_range: DateRange,
}

/// One dated entry in a stored schedule document
///
/// An empty `hospital` means the entry has not been pre-classified and the
/// classifier decides at merge time. Legacy store data held a bare code
/// string per date; both shapes deserialize into this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ShiftEntryRepr")]
pub struct ShiftEntry {
    pub shift: String,
    #[serde(default)]
    pub hospital: String,
}

impl ShiftEntry {
    pub fn new(shift: impl Into<String>, hospital: impl Into<String>) -> Self {
        ShiftEntry { shift: shift.into(), hospital: hospital.into() }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ShiftEntryRepr {
    Tagged {
        shift: String,
        #[serde(default)]
        hospital: String,
    },
    Bare(String),
}

impl From<ShiftEntryRepr> for ShiftEntry {
    fn from(repr: ShiftEntryRepr) -> Self {
        match repr {
            ShiftEntryRepr::Tagged { shift, hospital } => ShiftEntry { shift, hospital },
            ShiftEntryRepr::Bare(shift) => ShiftEntry { shift, hospital: String::new() },
        }
    }
}

/// Per-student document as held by the schedule store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDoc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub shifts: BTreeMap<String, ShiftEntry>, // ISO date -> entry
}

/// Partial manual correction for one student/date cell
///
/// Absent fields leave the base value untouched. `code` may be present but
/// empty, which clears the code without touching hospital or color.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShiftOverride {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hospital: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color: Option<String>,
}

/// student id -> date -> partial correction
pub type OverrideMap = BTreeMap<String, BTreeMap<String, ShiftOverride>>;

/// Audit entry recorded alongside a full schedule replace. The timestamp
/// is filled in server-side when the client leaves it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: String,
    pub description: String,
    #[serde(default)]
    pub affected_students: usize,
    #[serde(default)]
    pub hospital: String,
}

/// The viewer identity held in local storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedUser {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_from_unsorted_dates() {
        let range = DateRange::from_dates(["2026-02-03", "2026-01-15", "2026-01-20"]);
        assert_eq!(range.start_date.as_deref(), Some("2026-01-15"));
        assert_eq!(range.end_date.as_deref(), Some("2026-02-03"));
    }

    #[test]
    fn date_range_empty() {
        let range = DateRange::from_dates([]);
        assert_eq!(range, DateRange::default());
    }

    #[test]
    fn shift_entry_accepts_legacy_bare_string() {
        let entry: ShiftEntry = serde_json::from_str("\"ICU 2\"").unwrap();
        assert_eq!(entry.shift, "ICU 2");
        assert_eq!(entry.hospital, "");
    }

    #[test]
    fn shift_entry_accepts_tagged_object() {
        let entry: ShiftEntry =
            serde_json::from_str(r#"{"shift":"OT","hospital":"Saqr Hospital"}"#).unwrap();
        assert_eq!(entry.shift, "OT");
        assert_eq!(entry.hospital, "Saqr Hospital");
    }

    #[test]
    fn shift_entry_serializes_tagged() {
        let entry = ShiftEntry::new("ER", "");
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"shift":"ER","hospital":""}"#);
    }

    #[test]
    fn shift_override_omits_absent_fields() {
        let ov = ShiftOverride { code: Some("OFF".to_string()), ..Default::default() };
        let json = serde_json::to_string(&ov).unwrap();
        assert_eq!(json, r#"{"code":"OFF"}"#);
        let back: ShiftOverride = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code.as_deref(), Some("OFF"));
        assert!(back.hospital.is_none());
        assert!(back.color.is_none());
    }
}
