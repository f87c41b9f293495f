use chrono::NaiveDate;

use crate::error::{Result, ScheduleError};
use crate::schedule::context::ContextDetector;
use crate::schedule::hospitals::{HospitalClassifier, HospitalDirectory};
use crate::schedule::merge::{apply_overrides, merge_docs};
use crate::schedule::parse::{parse_schedule_bytes, ParserConfig};
use crate::schedule::types::{OverrideMap, Roster, ScheduleDoc, ShiftOverride, Student};

/// In-memory application state: a classified base roster from whichever
/// source produced it last (store feed or file upload) with an override
/// layer on top. Every event recomputes the merged roster wholesale.
pub struct AppModel {
    base: Vec<Student>,
    overrides: OverrideMap,
    roster: Roster,
    directory: HospitalDirectory,
    classifier: HospitalClassifier,
    detector: ContextDetector,
}

impl AppModel {
    pub fn new() -> Self {
        AppModel {
            base: Vec::new(),
            overrides: OverrideMap::new(),
            roster: Roster::default(),
            directory: HospitalDirectory::standard(),
            classifier: HospitalClassifier::standard(),
            detector: ContextDetector::standard(),
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn overrides(&self) -> &OverrideMap {
        &self.overrides
    }

    pub fn directory(&self) -> &HospitalDirectory {
        &self.directory
    }

    /// Replaces the base roster from store documents. Entries are classified
    /// and sorted by student id; pending overrides stay layered on top.
    pub fn apply_base_docs(&mut self, docs: &[ScheduleDoc]) {
        self.base = merge_docs(
            docs,
            &OverrideMap::new(),
            &self.directory,
            &self.classifier,
            &self.detector,
        )
        .students;
        self.remerge();
    }

    /// Replaces the base roster with freshly parsed students, keeping their
    /// classification colors as-is
    pub fn apply_base_roster(&mut self, students: Vec<Student>) {
        self.base = students;
        self.remerge();
    }

    /// Parses an uploaded schedule file and makes it the base roster.
    /// Returns the number of students found; a parse failure leaves the
    /// current state untouched.
    pub fn ingest_upload(
        &mut self,
        filename: &str,
        bytes: &[u8],
        config: &ParserConfig,
    ) -> Result<usize> {
        let parsed = parse_schedule_bytes(filename, bytes, config, &self.classifier, &self.detector)?;
        let count = parsed.total_students;
        self.apply_base_roster(parsed.students);
        Ok(count)
    }

    /// Layers one cell override on top of any already present for that
    /// cell. Fields the update carries win; the rest keep their values.
    pub fn apply_override(&mut self, student_id: &str, date: &str, ov: ShiftOverride) {
        let slot = self
            .overrides
            .entry(student_id.to_string())
            .or_default()
            .entry(date.to_string())
            .or_default();
        if ov.code.is_some() {
            slot.code = ov.code;
        }
        if ov.hospital.is_some() {
            slot.hospital = ov.hospital;
        }
        if ov.color.is_some() {
            slot.color = ov.color;
        }
        self.remerge();
    }

    /// Assigns a hospital to every date in the range for the targeted
    /// students (all of them when `targets` is `None`). Returns the number
    /// of students and days touched.
    pub fn apply_bulk(
        &mut self,
        start_date: &str,
        end_date: &str,
        hospital: &str,
        targets: Option<&[String]>,
    ) -> Result<(usize, usize)> {
        let dates = dates_in_range(start_date, end_date)?;
        let color = self.directory.label_for(hospital).color;
        let ids: Vec<String> = match targets {
            Some(ids) => ids.to_vec(),
            None => self.base.iter().map(|s| s.id.clone()).collect(),
        };

        for id in &ids {
            let by_date = self.overrides.entry(id.clone()).or_default();
            for date in &dates {
                by_date.insert(
                    date.clone(),
                    ShiftOverride {
                        code: None,
                        hospital: Some(hospital.to_string()),
                        color: Some(color.clone()),
                    },
                );
            }
        }

        self.remerge();
        log::info!(
            "bulk assignment of {} to {} students over {} days",
            hospital,
            ids.len(),
            dates.len()
        );
        Ok((ids.len(), dates.len()))
    }

    pub fn set_overrides(&mut self, overrides: OverrideMap) {
        self.overrides = overrides;
        self.remerge();
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
        self.remerge();
    }

    fn remerge(&mut self) {
        self.roster = apply_overrides(&self.base, &self.overrides, &self.directory);
    }
}

impl Default for AppModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Expands an inclusive ISO date range into the dates it contains
pub fn dates_in_range(start: &str, end: &str) -> Result<Vec<String>> {
    let start = parse_iso(start)?;
    let end = parse_iso(end)?;

    let mut dates = Vec::new();
    let mut day = start;
    while day <= end {
        dates.push(day.format("%Y-%m-%d").to_string());
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    Ok(dates)
}

fn parse_iso(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ScheduleError::MalformedInput(format!("invalid date {:?}", date)))
}
