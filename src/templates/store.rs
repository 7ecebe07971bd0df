//! Template and scenario document sources
//!
//! Documents live under a config root:
//! - `templates/<kind>/<name>.yaml`
//! - `tax_systems/<name>.yaml`
//! - `scenarios/<id>.yaml` and `scenarios/examples/<id>.yaml`

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use super::TemplateKind;
use crate::error::ConfigurationError;

/// Default path to the config root
pub const DEFAULT_CONFIG_ROOT: &str = "config";

/// Scenario file stems that are documentation, not runnable scenarios
const NON_SCENARIO_STEMS: [&str; 2] = ["README", "template"];

/// Somewhere template and scenario documents can be read from
pub trait TemplateSource: Send + Sync {
    /// Read the raw (unmerged) template document
    fn read_template(&self, kind: TemplateKind, name: &str) -> Result<Value, ConfigurationError>;

    /// Read a raw scenario document
    fn read_scenario(&self, id: &str) -> Result<Value, ConfigurationError>;

    /// Ids of every runnable scenario, sorted
    fn list_scenarios(&self) -> Result<Vec<String>, ConfigurationError>;
}

/// Reads YAML documents from a config directory
#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    root: PathBuf,
}

impl FsTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at [`DEFAULT_CONFIG_ROOT`]
    pub fn default_root() -> Self {
        Self::new(DEFAULT_CONFIG_ROOT)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn template_path(&self, kind: TemplateKind, name: &str) -> PathBuf {
        self.root
            .join(kind.relative_dir())
            .join(format!("{name}.yaml"))
    }

    pub fn scenario_path(&self, id: &str) -> PathBuf {
        self.root.join("scenarios").join(format!("{id}.yaml"))
    }

    /// Returns `None` when the file is absent or holds an empty document
    fn read_yaml(path: &Path) -> Result<Option<Value>, ConfigurationError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_yaml::from_str(&text).map_err(|source| ConfigurationError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    fn yaml_stems(dir: &Path) -> Result<Vec<String>, ConfigurationError> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(dir).map_err(|source| ConfigurationError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut stems = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| ConfigurationError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("yaml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if !NON_SCENARIO_STEMS.contains(&stem) {
                    stems.push(stem.to_string());
                }
            }
        }
        Ok(stems)
    }
}

impl TemplateSource for FsTemplateStore {
    fn read_template(&self, kind: TemplateKind, name: &str) -> Result<Value, ConfigurationError> {
        let path = self.template_path(kind, name);
        log::debug!("Loading {} template from {}", kind, path.display());
        Self::read_yaml(&path)?.ok_or_else(|| ConfigurationError::TemplateNotFound {
            kind,
            name: name.to_string(),
            path,
        })
    }

    fn read_scenario(&self, id: &str) -> Result<Value, ConfigurationError> {
        let path = self.scenario_path(id);
        log::debug!("Loading scenario from {}", path.display());
        Self::read_yaml(&path)?.ok_or_else(|| ConfigurationError::ScenarioNotFound {
            id: id.to_string(),
            path,
        })
    }

    fn list_scenarios(&self) -> Result<Vec<String>, ConfigurationError> {
        let scenarios_dir = self.root.join("scenarios");
        let mut ids = Self::yaml_stems(&scenarios_dir)?;
        ids.extend(
            Self::yaml_stems(&scenarios_dir.join("examples"))?
                .into_iter()
                .map(|stem| format!("examples/{stem}")),
        );
        ids.sort();
        Ok(ids)
    }
}

/// In-memory documents, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateStore {
    templates: HashMap<(TemplateKind, String), Value>,
    scenarios: BTreeMap<String, Value>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_template(&mut self, kind: TemplateKind, name: impl Into<String>, body: Value) {
        self.templates.insert((kind, name.into()), body);
    }

    pub fn insert_scenario(&mut self, id: impl Into<String>, body: Value) {
        self.scenarios.insert(id.into(), body);
    }

    /// Parse and insert a template written as YAML text
    pub fn insert_template_yaml(
        &mut self,
        kind: TemplateKind,
        name: &str,
        text: &str,
    ) -> Result<(), ConfigurationError> {
        let body = serde_yaml::from_str(text).map_err(|source| ConfigurationError::Parse {
            path: Self::memory_path(kind.dir_name(), name),
            source,
        })?;
        self.insert_template(kind, name, body);
        Ok(())
    }

    /// Parse and insert a scenario written as YAML text
    pub fn insert_scenario_yaml(&mut self, id: &str, text: &str) -> Result<(), ConfigurationError> {
        let body = serde_yaml::from_str(text).map_err(|source| ConfigurationError::Parse {
            path: Self::memory_path("scenarios", id),
            source,
        })?;
        self.insert_scenario(id, body);
        Ok(())
    }

    fn memory_path(dir: &str, name: &str) -> PathBuf {
        PathBuf::from(format!("memory:{dir}/{name}"))
    }
}

impl TemplateSource for MemoryTemplateStore {
    fn read_template(&self, kind: TemplateKind, name: &str) -> Result<Value, ConfigurationError> {
        self.templates
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| ConfigurationError::TemplateNotFound {
                kind,
                name: name.to_string(),
                path: Self::memory_path(kind.dir_name(), name),
            })
    }

    fn read_scenario(&self, id: &str) -> Result<Value, ConfigurationError> {
        self.scenarios
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigurationError::ScenarioNotFound {
                id: id.to_string(),
                path: Self::memory_path("scenarios", id),
            })
    }

    fn list_scenarios(&self) -> Result<Vec<String>, ConfigurationError> {
        Ok(self.scenarios.keys().cloned().collect())
    }
}
