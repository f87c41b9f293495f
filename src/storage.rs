use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::schedule::types::{OverrideMap, Roster, SelectedUser};

const SELECTED_USER_FILE: &str = "selected_user.json";
const OVERRIDES_FILE: &str = "overrides.json";
const ROSTER_CACHE_FILE: &str = "roster_cache.json";

/// Device-local state kept outside the shared document store: the selected
/// user, the operator's shift overrides and the last parsed roster. Each
/// key is one JSON file under the data directory.
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(LocalStore { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&fs::read_to_string(path)?)?))
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::write(self.path(key), serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        let path = self.path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn selected_user(&self) -> Result<Option<SelectedUser>> {
        self.read(SELECTED_USER_FILE)
    }

    pub fn set_selected_user(&self, user: &SelectedUser) -> Result<()> {
        self.write(SELECTED_USER_FILE, user)
    }

    pub fn clear_selected_user(&self) -> Result<()> {
        self.clear(SELECTED_USER_FILE)
    }

    pub fn overrides(&self) -> Result<OverrideMap> {
        Ok(self.read(OVERRIDES_FILE)?.unwrap_or_default())
    }

    pub fn set_overrides(&self, overrides: &OverrideMap) -> Result<()> {
        self.write(OVERRIDES_FILE, overrides)
    }

    pub fn cached_roster(&self) -> Result<Option<Roster>> {
        self.read(ROSTER_CACHE_FILE)
    }

    pub fn set_cached_roster(&self, roster: &Roster) -> Result<()> {
        self.write(ROSTER_CACHE_FILE, roster)
    }

    /// Clears every key. Used by the app reset flow.
    pub fn clear_all(&self) -> Result<()> {
        self.clear(SELECTED_USER_FILE)?;
        self.clear(OVERRIDES_FILE)?;
        self.clear(ROSTER_CACHE_FILE)?;
        log::info!("cleared local storage under {}", self.dir.display());
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::ShiftOverride;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn missing_keys_read_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        assert!(store.selected_user().unwrap().is_none());
        assert!(store.overrides().unwrap().is_empty());
        assert!(store.cached_roster().unwrap().is_none());
    }

    #[test]
    fn selected_user_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        let user = SelectedUser {
            id: "22904073".to_string(),
            name: "Ahmed Mohammed Al Ali".to_string(),
            display_name: "Ahmed Mohammed".to_string(),
        };
        store.set_selected_user(&user).unwrap();
        assert_eq!(store.selected_user().unwrap(), Some(user));

        store.clear_selected_user().unwrap();
        assert!(store.selected_user().unwrap().is_none());
    }

    #[test]
    fn clear_all_wipes_every_key() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();

        let mut overrides = OverrideMap::new();
        overrides.insert(
            "1001".to_string(),
            BTreeMap::from([(
                "2026-01-15".to_string(),
                ShiftOverride { code: Some("OFF".to_string()), ..Default::default() },
            )]),
        );
        store.set_overrides(&overrides).unwrap();
        store
            .set_selected_user(&SelectedUser {
                id: "1001".to_string(),
                name: "Aisha Said".to_string(),
                display_name: "Aisha Said".to_string(),
            })
            .unwrap();

        store.clear_all().unwrap();
        assert!(store.overrides().unwrap().is_empty());
        assert!(store.selected_user().unwrap().is_none());
    }
}
