use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::info;

use crate::constants::{COMPLETED_TASKS_FILE, ROADMAP_FILE};
use crate::error::{Result, RoadmapError};

/// MIME type offered with [`export_roadmap_bytes`].
pub const ROADMAP_MIME: &str = "application/json";

/// Writes `roadmap.json` and `completed_tasks.json` into one directory.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    dir: PathBuf,
}

impl ProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the process working directory.
    pub fn in_working_dir() -> Self {
        Self::new(".")
    }

    pub fn roadmap_path(&self) -> PathBuf {
        self.dir.join(ROADMAP_FILE)
    }

    pub fn progress_path(&self) -> PathBuf {
        self.dir.join(COMPLETED_TASKS_FILE)
    }

    /// Overwrites `roadmap.json` with the full roadmap document as the model returned it.
    pub fn save_roadmap(&self, document: &Value) -> Result<PathBuf> {
        let path = self.roadmap_path();
        write_json(&path, document)?;
        let modules = document["modules"].as_array().map_or(0, Vec::len);
        info!(path = %path.display(), modules, "Saved roadmap");
        Ok(path)
    }

    /// Overwrites `completed_tasks.json` with the completed entries only.
    pub fn save_progress(&self, completed: &BTreeMap<String, bool>) -> Result<PathBuf> {
        let path = self.progress_path();
        write_json(&path, completed)?;
        info!(path = %path.display(), completed = completed.len(), "Saved progress");
        Ok(path)
    }
}

/// Download body for the in-memory roadmap document. Independent of anything saved on disk.
pub fn export_roadmap_bytes(document: &Value) -> Vec<u8> {
    // A Value always has string keys, so serializing cannot fail.
    serde_json::to_vec_pretty(document).unwrap_or_default()
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let storage_err = |source: std::io::Error| RoadmapError::StorageWrite {
        path: path.to_path_buf(),
        source,
    };

    let body = serde_json::to_vec_pretty(value).map_err(|e| storage_err(e.into()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(storage_err)?;
    tmp.write_all(&body).map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roadmap::Roadmap;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Value {
        json!({"modules": [{"module": "Backend", "dependencies": ["Design"], "submodules": [{
            "submodule_name": "API",
            "tasks": ["Design schema", "Implement endpoints"],
            "tools": ["Go", "Postgres"]
        }]}]})
    }

    #[test]
    fn roadmap_round_trips_through_file() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path());
        let roadmap = sample();

        let path = store.save_roadmap(&roadmap).unwrap();
        assert_eq!(path, dir.path().join("roadmap.json"));

        let reread: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reread, roadmap);
        let typed: Roadmap = serde_json::from_value(reread).unwrap();
        assert_eq!(typed, Roadmap::from_value(&roadmap).unwrap());
    }

    #[test]
    fn fields_outside_the_schema_are_saved_and_exported() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path());
        let document = json!({"project": "Recipes", "modules": [{"module": "Backend", "description": "server side",
            "submodules": [{"submodule_name": "API", "tasks": ["t"], "tools": [], "dependencies": [], "estimated_time": "2w"}]}]});

        store.save_roadmap(&document).unwrap();
        let saved: Value = serde_json::from_str(&std::fs::read_to_string(store.roadmap_path()).unwrap()).unwrap();
        assert_eq!(saved, document);

        let exported: Value = serde_json::from_slice(&export_roadmap_bytes(&document)).unwrap();
        assert_eq!(exported, document);
    }

    #[test]
    fn roadmap_file_uses_two_space_indent() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path());
        store.save_roadmap(&sample()).unwrap();

        let text = std::fs::read_to_string(store.roadmap_path()).unwrap();
        assert!(text.starts_with("{\n  \"modules\": [\n    {"));
    }

    #[test]
    fn save_roadmap_overwrites_previous_file() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path());
        std::fs::write(store.roadmap_path(), "stale content that is much longer than it should be").unwrap();

        store.save_roadmap(&json!({"modules": []})).unwrap();
        let text = std::fs::read_to_string(store.roadmap_path()).unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&text).unwrap(), json!({"modules": []}));
    }

    #[test]
    fn progress_file_holds_completed_entries() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path());
        let mut completed = BTreeMap::new();
        completed.insert("Backend_API_0".to_string(), true);

        store.save_progress(&completed).unwrap();
        let text = std::fs::read_to_string(store.progress_path()).unwrap();
        assert_eq!(text, "{\n  \"Backend_API_0\": true\n}");
    }

    #[test]
    fn missing_directory_is_a_storage_error() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path().join("does/not/exist"));
        match store.save_roadmap(&sample()).unwrap_err() {
            RoadmapError::StorageWrite { path, .. } => assert!(path.ends_with("roadmap.json")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn export_matches_saved_content() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path());
        let roadmap = sample();
        store.save_roadmap(&roadmap).unwrap();

        let exported = export_roadmap_bytes(&roadmap);
        assert_eq!(exported, std::fs::read(store.roadmap_path()).unwrap());
    }
}
