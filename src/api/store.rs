//! JSON-file scenario store.
//!
//! File layout:
//! ```json
//! { "nextId": 3, "scenarios": { "1": { "id": 1, "name": "...", "savedAt": "...", "inputs": { ... } } } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::core::Inputs;

/// A named input snapshot saved for later re-simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: u64,
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub inputs: Inputs,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StoreData {
    next_id: u64,
    scenarios: BTreeMap<u64, Scenario>,
}

#[derive(Debug)]
pub struct ScenarioStore {
    path: PathBuf,
    data: StoreData,
}

impl ScenarioStore {
    /// Opens the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ApiError> {
        let path = path.into();
        let data = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            debug!("no scenario store at {}, starting empty", path.display());
            StoreData::default()
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.scenarios.is_empty()
    }

    /// Inserts a scenario, replacing any existing one with the same name.
    pub fn save(&mut self, name: &str, inputs: Inputs) -> Result<Scenario, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput(
                "scenario name must not be empty".to_string(),
            ));
        }

        let id = match self.find_by_name(name) {
            Some(existing) => existing.id,
            None => {
                self.data.next_id += 1;
                self.data.next_id
            }
        };
        let scenario = Scenario {
            id,
            name: name.to_string(),
            saved_at: Utc::now(),
            inputs,
        };
        self.data.scenarios.insert(id, scenario.clone());
        self.persist()?;
        info!("saved scenario {:?} as #{id}", scenario.name);
        Ok(scenario)
    }

    /// Looks a scenario up by exact name, falling back to its numeric id.
    pub fn get(&self, key: &str) -> Option<&Scenario> {
        self.find_by_name(key).or_else(|| {
            key.parse::<u64>()
                .ok()
                .and_then(|id| self.data.scenarios.get(&id))
        })
    }

    /// All scenarios sorted by name.
    pub fn list(&self) -> Vec<&Scenario> {
        let mut scenarios = self.data.scenarios.values().collect::<Vec<_>>();
        scenarios.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        scenarios
    }

    pub fn remove(&mut self, key: &str) -> Result<Scenario, ApiError> {
        let id = self
            .get(key)
            .map(|s| s.id)
            .ok_or_else(|| ApiError::ScenarioNotFound(key.to_string()))?;
        let removed = self
            .data
            .scenarios
            .remove(&id)
            .ok_or_else(|| ApiError::ScenarioNotFound(key.to_string()))?;
        self.persist()?;
        info!("removed scenario {:?}", removed.name);
        Ok(removed)
    }

    fn find_by_name(&self, name: &str) -> Option<&Scenario> {
        self.data.scenarios.values().find(|s| s.name == name)
    }

    fn persist(&self) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&self.data)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::payload::{build_inputs, default_plan_args};

    fn sample_inputs() -> Inputs {
        build_inputs(default_plan_args()).expect("defaults are valid")
    }

    #[test]
    fn missing_file_opens_as_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ScenarioStore::open(dir.path().join("scenarios.json")).expect("opens");
        assert!(store.is_empty());
        assert!(store.list().is_empty());
    }

    #[test]
    fn saved_scenarios_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("scenarios.json");

        let mut store = ScenarioStore::open(&path).expect("opens");
        let saved = store.save("baseline", sample_inputs()).expect("saves");
        assert_eq!(saved.id, 1);

        let reopened = ScenarioStore::open(&path).expect("reopens");
        assert_eq!(reopened.len(), 1);
        let loaded = reopened.get("baseline").expect("found by name");
        assert_eq!(loaded, &saved);
        assert_eq!(reopened.get("1"), Some(&saved));
    }

    #[test]
    fn saving_same_name_replaces_and_keeps_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = ScenarioStore::open(dir.path().join("s.json")).expect("opens");
        store.save("plan", sample_inputs()).expect("saves");
        store.save("other", sample_inputs()).expect("saves");

        let mut changed = sample_inputs();
        changed.retirement_age = 60;
        let replaced = store.save("plan", changed).expect("replaces");
        assert_eq!(replaced.id, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("plan").map(|s| s.inputs.retirement_age), Some(60));
    }

    #[test]
    fn list_is_sorted_by_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = ScenarioStore::open(dir.path().join("s.json")).expect("opens");
        for name in ["zeta", "alpha", "mid"] {
            store.save(name, sample_inputs()).expect("saves");
        }
        let names = store.list().iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn remove_unknown_scenario_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = ScenarioStore::open(dir.path().join("s.json")).expect("opens");
        store.save("keep", sample_inputs()).expect("saves");

        let err = store.remove("missing").expect_err("nothing to remove");
        assert!(matches!(err, ApiError::ScenarioNotFound(_)));

        let removed = store.remove("keep").expect("removes");
        assert_eq!(removed.name, "keep");
        assert!(store.is_empty());
    }

    #[test]
    fn numeric_names_win_over_matching_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = ScenarioStore::open(dir.path().join("s.json")).expect("opens");
        store.save("first", sample_inputs()).expect("saves");
        store.save("second", sample_inputs()).expect("saves");
        let numbered = store.save("1", sample_inputs()).expect("saves");
        assert_eq!(numbered.id, 3);

        assert_eq!(store.get("1").map(|s| s.id), Some(3));
        assert_eq!(store.get("2").map(|s| s.name.as_str()), Some("second"));

        let removed = store.remove("1").expect("removes by name");
        assert_eq!(removed.id, 3);
        assert_eq!(store.get("1").map(|s| s.name.as_str()), Some("first"));
    }

    #[test]
    fn blank_names_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = ScenarioStore::open(dir.path().join("s.json")).expect("opens");
        let err = store.save("  ", sample_inputs()).expect_err("blank name");
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}
