use crate::error::Result;
use crate::variable::Variable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Persisted macro state: recorded command lists keyed by macro name, plus
/// variable definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMacros {
    #[serde(default)]
    pub macros: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

pub trait MacroStore {
    fn load(&self) -> Result<StoredMacros>;
    fn save(&mut self, macros: &StoredMacros) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: StoredMacros,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &StoredMacros {
        &self.data
    }
}

impl MacroStore for MemoryStore {
    fn load(&self) -> Result<StoredMacros> {
        Ok(self.data.clone())
    }

    fn save(&mut self, macros: &StoredMacros) -> Result<()> {
        self.data = macros.clone();
        Ok(())
    }
}

/// A JSON file. A missing or empty file loads as an empty store.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MacroStore for JsonStore {
    fn load(&self) -> Result<StoredMacros> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoredMacros::default()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(StoredMacros::default());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&mut self, macros: &StoredMacros) -> Result<()> {
        let json = serde_json::to_string_pretty(macros)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
