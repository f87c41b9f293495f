use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::watch;

use crate::error::Result;
use crate::schedule::types::{LogEntry, ScheduleDoc, ShiftEntry};

/// Shared document store every device reads the rota from
pub trait ScheduleStore {
    /// Returns every stored schedule document
    fn load_all(&self) -> Result<Vec<ScheduleDoc>>;

    /// Replaces the whole schedule, optionally recording an audit entry
    fn replace_all(&self, docs: &[ScheduleDoc], log: Option<LogEntry>) -> Result<()>;

    /// Writes one shift cell, creating the student document if needed
    fn set_shift(&self, student_id: &str, date: &str, entry: ShiftEntry) -> Result<()>;

    /// Deletes one shift cell; a missing cell is not an error
    fn remove_shift(&self, student_id: &str, date: &str) -> Result<()>;

    /// Returns the audit log, newest first
    fn changelog(&self) -> Result<Vec<LogEntry>>;

    /// Subscribes to write notifications
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// File-backed store keeping `schedule.json` and `changelog.json` under a
/// data directory. Every successful mutation bumps a revision counter that
/// subscribers can watch to refresh their view.
pub struct JsonFileStore {
    dir: PathBuf,
    revision: watch::Sender<u64>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let (revision, _) = watch::channel(0);
        Ok(JsonFileStore { dir, revision })
    }

    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    fn schedule_path(&self) -> PathBuf {
        self.dir.join("schedule.json")
    }

    fn changelog_path(&self) -> PathBuf {
        self.dir.join("changelog.json")
    }

    fn read_docs(&self) -> Result<Vec<ScheduleDoc>> {
        let path = self.schedule_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    fn write_docs(&self, docs: &[ScheduleDoc]) -> Result<()> {
        fs::write(self.schedule_path(), serde_json::to_string_pretty(docs)?)?;
        Ok(())
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

impl ScheduleStore for JsonFileStore {
    fn load_all(&self) -> Result<Vec<ScheduleDoc>> {
        self.read_docs()
    }

    fn replace_all(&self, docs: &[ScheduleDoc], log: Option<LogEntry>) -> Result<()> {
        self.write_docs(docs)?;
        if let Some(entry) = log {
            let mut entries = self.changelog()?;
            entries.insert(0, entry);
            fs::write(
                self.changelog_path(),
                serde_json::to_string_pretty(&entries)?,
            )?;
        }
        self.bump();
        log::info!("replaced schedule store with {} documents", docs.len());
        Ok(())
    }

    fn set_shift(&self, student_id: &str, date: &str, entry: ShiftEntry) -> Result<()> {
        let mut docs = self.read_docs()?;
        match docs.iter_mut().find(|doc| doc.id == student_id) {
            Some(doc) => {
                doc.shifts.insert(date.to_string(), entry);
            }
            None => {
                let mut shifts = BTreeMap::new();
                shifts.insert(date.to_string(), entry);
                docs.push(ScheduleDoc {
                    id: student_id.to_string(),
                    name: String::new(),
                    shifts,
                });
            }
        }
        self.write_docs(&docs)?;
        self.bump();
        Ok(())
    }

    fn remove_shift(&self, student_id: &str, date: &str) -> Result<()> {
        let mut docs = self.read_docs()?;
        let removed = docs
            .iter_mut()
            .find(|doc| doc.id == student_id)
            .is_some_and(|doc| doc.shifts.remove(date).is_some());
        if removed {
            self.write_docs(&docs)?;
            self.bump();
        }
        Ok(())
    }

    fn changelog(&self) -> Result<Vec<LogEntry>> {
        let path = self.changelog_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(shift: &str) -> ShiftEntry {
        ShiftEntry::new(shift, "")
    }

    #[test]
    fn empty_store_loads_no_documents() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        assert!(store.load_all().unwrap().is_empty());
        assert!(store.changelog().unwrap().is_empty());
    }

    #[test]
    fn set_shift_creates_the_document_on_demand() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.set_shift("1001", "2026-01-15", entry("ICU 2")).unwrap();

        let docs = store.load_all().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "1001");
        assert_eq!(docs[0].shifts["2026-01-15"].shift, "ICU 2");
    }

    #[test]
    fn remove_shift_deletes_only_that_cell() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.set_shift("1001", "2026-01-15", entry("ICU 2")).unwrap();
        store.set_shift("1001", "2026-01-16", entry("ER")).unwrap();

        store.remove_shift("1001", "2026-01-15").unwrap();
        let docs = store.load_all().unwrap();
        assert_eq!(docs[0].shifts.len(), 1);
        assert!(docs[0].shifts.contains_key("2026-01-16"));

        // Removing a cell that is already gone is fine
        store.remove_shift("1001", "2026-01-15").unwrap();
        store.remove_shift("9999", "2026-01-15").unwrap();
    }

    #[test]
    fn replace_all_prepends_changelog_entries() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        let docs = vec![ScheduleDoc {
            id: "1001".to_string(),
            name: "Aisha Said".to_string(),
            shifts: BTreeMap::from([("2026-01-15".to_string(), entry("ER"))]),
        }];
        let log = |description: &str| LogEntry {
            timestamp: "2026-01-15T08:00:00Z".to_string(),
            description: description.to_string(),
            affected_students: 1,
            hospital: String::new(),
        };

        store.replace_all(&docs, Some(log("first upload"))).unwrap();
        store.replace_all(&docs, Some(log("second upload"))).unwrap();

        let entries = store.changelog().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "second upload");
    }

    #[test]
    fn every_write_bumps_the_revision() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow_and_update(), 0);

        store.set_shift("1001", "2026-01-15", entry("ER")).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);

        // A no-op removal is not a write
        store.remove_shift("1001", "2026-02-01").unwrap();
        assert!(!rx.has_changed().unwrap());

        store.replace_all(&[], None).unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[test]
    fn legacy_bare_string_shifts_still_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        fs::write(
            dir.path().join("schedule.json"),
            r#"[{"id": "1001", "name": "Aisha Said", "shifts": {"2026-01-15": "ICU 2"}}]"#,
        )
        .unwrap();

        let docs = store.load_all().unwrap();
        let entry = &docs[0].shifts["2026-01-15"];
        assert_eq!(entry.shift, "ICU 2");
        assert_eq!(entry.hospital, "");
    }
}
