use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, RoadmapError};

/// A validated plan: modules → submodules → ordered tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roadmap {
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub module: String,
    pub submodules: Vec<Submodule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submodule {
    pub submodule_name: String,
    pub tasks: Vec<String>,
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// Stable key for one task's completion flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// `"{module}_{submodule}_{index}"` with spaces replaced by underscores.
    pub fn derive(module: &str, submodule: &str, index: usize) -> Self {
        TaskId(format!("{module}_{submodule}_{index}").replace(' ', "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn with_counter(&self, n: usize) -> Self {
        TaskId(format!("{}#{}", self.0, n))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One task with the id it is tracked under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry<'a> {
    pub id: TaskId,
    pub module: usize,
    pub submodule: usize,
    pub index: usize,
    pub text: &'a str,
}

impl Roadmap {
    /// Checks an extracted JSON document against the roadmap schema.
    pub fn from_value(value: &Value) -> Result<Self> {
        let root = expect_object(value, "$")?;
        let modules = required_array(root, "modules", "$")?
            .iter()
            .enumerate()
            .map(|(i, module)| Module::from_value(module, &format!("modules[{i}]")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Roadmap { modules })
    }

    /// Every task in display order. Ids are unique: a derived id that an earlier task already
    /// holds gets `#2`, `#3`, ... appended.
    pub fn tasks(&self) -> Vec<TaskEntry<'_>> {
        let mut used = HashSet::new();
        let mut entries = Vec::new();
        for (m, module) in self.modules.iter().enumerate() {
            for (s, sub) in module.submodules.iter().enumerate() {
                for (index, text) in sub.tasks.iter().enumerate() {
                    let base = TaskId::derive(&module.module, &sub.submodule_name, index);
                    let mut id = base.clone();
                    let mut n = 2;
                    while used.contains(&id) {
                        id = base.with_counter(n);
                        n += 1;
                    }
                    used.insert(id.clone());
                    entries.push(TaskEntry {
                        id,
                        module: m,
                        submodule: s,
                        index,
                        text,
                    });
                }
            }
        }
        entries
    }

    /// Derived ids shared by more than one task, in first-seen order.
    pub fn collisions(&self) -> Vec<TaskId> {
        let mut seen = HashSet::new();
        let mut collided = Vec::new();
        for (module, sub) in self
            .modules
            .iter()
            .flat_map(|m| m.submodules.iter().map(move |s| (m, s)))
        {
            for index in 0..sub.tasks.len() {
                let id = TaskId::derive(&module.module, &sub.submodule_name, index);
                if !seen.insert(id.clone()) && !collided.contains(&id) {
                    collided.push(id);
                }
            }
        }
        collided
    }

    pub fn task_count(&self) -> usize {
        self.modules
            .iter()
            .flat_map(|m| &m.submodules)
            .map(|s| s.tasks.len())
            .sum()
    }
}

impl Module {
    fn from_value(value: &Value, path: &str) -> Result<Self> {
        let obj = expect_object(value, path)?;
        let submodules = required_array(obj, "submodules", path)?
            .iter()
            .enumerate()
            .map(|(i, sub)| Submodule::from_value(sub, &format!("{path}.submodules[{i}]")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Module {
            module: required_string(obj, "module", path)?,
            submodules,
            dependencies: optional_strings(obj, "dependencies", path)?,
        })
    }
}

impl Submodule {
    fn from_value(value: &Value, path: &str) -> Result<Self> {
        let obj = expect_object(value, path)?;
        Ok(Submodule {
            submodule_name: required_string(obj, "submodule_name", path)?,
            tasks: required_strings(obj, "tasks", path)?,
            tools: required_strings(obj, "tools", path)?,
            dependencies: optional_strings(obj, "dependencies", path)?,
        })
    }
}

fn invalid(path: impl Into<String>, reason: impl Into<String>) -> RoadmapError {
    RoadmapError::InvalidRoadmap {
        path: path.into(),
        reason: reason.into(),
    }
}

fn field_path(parent: &str, key: &str) -> String {
    if parent == "$" {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| invalid(path, "expected an object"))
}

fn required_array<'a>(obj: &'a Map<String, Value>, key: &str, parent: &str) -> Result<&'a Vec<Value>> {
    let path = field_path(parent, key);
    match obj.get(key) {
        None => Err(invalid(path, "missing required field")),
        Some(value) => value.as_array().ok_or_else(|| invalid(path, "expected an array")),
    }
}

fn required_string(obj: &Map<String, Value>, key: &str, parent: &str) -> Result<String> {
    let path = field_path(parent, key);
    match obj.get(key) {
        None => Err(invalid(path, "missing required field")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(invalid(path, "expected a string")),
    }
}

fn required_strings(obj: &Map<String, Value>, key: &str, parent: &str) -> Result<Vec<String>> {
    let items = required_array(obj, key, parent)?;
    strings_at(items, &field_path(parent, key))
}

fn optional_strings(obj: &Map<String, Value>, key: &str, parent: &str) -> Result<Vec<String>> {
    let path = field_path(parent, key);
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => strings_at(items, &path),
        Some(_) => Err(invalid(path, "expected an array")),
    }
}

fn strings_at(items: &[Value], path: &str) -> Result<Vec<String>> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(format!("{path}[{i}]"), "expected a string"))
        })
        .collect()
}

/// Completion flags keyed by task id.
///
/// Any key is accepted; flags are not checked against the current roadmap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskCompletion {
    flags: BTreeMap<String, bool>,
}

impl TaskCompletion {
    /// Registers `id` as not done unless it already has a flag; returns the current flag.
    pub fn ensure(&mut self, id: &str) -> bool {
        *self.flags.entry(id.to_string()).or_insert(false)
    }

    pub fn toggle(&mut self, id: impl Into<String>, done: bool) {
        self.flags.insert(id.into(), done);
    }

    pub fn is_done(&self, id: &str) -> bool {
        self.flags.get(id).copied().unwrap_or(false)
    }

    /// Only the entries currently marked done.
    pub fn completed_subset(&self) -> BTreeMap<String, bool> {
        self.flags
            .iter()
            .filter(|(_, done)| **done)
            .map(|(id, done)| (id.clone(), *done))
            .collect()
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

/// A validated roadmap and the exact document it was read from.
///
/// `roadmap` drives rendering and task ids; `document` is what gets saved and downloaded, so
/// fields outside the schema survive.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRoadmap {
    pub roadmap: Roadmap,
    pub document: Value,
}

impl ParsedRoadmap {
    pub fn from_value(document: Value) -> Result<Self> {
        let roadmap = Roadmap::from_value(&document)?;
        Ok(Self { roadmap, document })
    }
}

/// The roadmap currently shown plus every completion flag seen this session.
#[derive(Debug, Clone, Default)]
pub struct RoadmapModel {
    current: Option<ParsedRoadmap>,
    completion: TaskCompletion,
}

impl RoadmapModel {
    /// Replaces the roadmap wholesale. Flags are kept, so a task whose id reappears in the new
    /// roadmap keeps its old state.
    pub fn load(&mut self, parsed: ParsedRoadmap) {
        self.current = Some(parsed);
    }

    pub fn roadmap(&self) -> Option<&Roadmap> {
        self.current.as_ref().map(|p| &p.roadmap)
    }

    /// The model's document as extracted, for persistence and download.
    pub fn document(&self) -> Option<&Value> {
        self.current.as_ref().map(|p| &p.document)
    }

    /// Gives every task of the current roadmap a flag, `false` unless one already exists.
    pub fn ensure_flags(&mut self) {
        if let Some(parsed) = &self.current {
            for task in parsed.roadmap.tasks() {
                self.completion.ensure(task.id.as_str());
            }
        }
    }

    pub fn toggle(&mut self, id: impl Into<String>, done: bool) {
        self.completion.toggle(id, done);
    }

    pub fn completion(&self) -> &TaskCompletion {
        &self.completion
    }

    pub fn completed_subset(&self) -> BTreeMap<String, bool> {
        self.completion.completed_subset()
    }

    /// Done/total over the tasks of the current roadmap only.
    pub fn progress(&self) -> Progress {
        let Some(roadmap) = self.roadmap() else {
            return Progress { done: 0, total: 0 };
        };
        let tasks = roadmap.tasks();
        Progress {
            done: tasks
                .iter()
                .filter(|t| self.completion.is_done(t.id.as_str()))
                .count(),
            total: tasks.len(),
        }
    }
}
