use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where a goal's text comes from: a file on disk or an editor buffer.
pub trait GoalSource: Send + Sync {
    /// Goal name, the file stem for file-backed goals
    fn name(&self) -> &str;
    /// Stable identifier used in diagnostics and edits
    fn uri(&self) -> &str;
    /// Current content of the goal.
    fn read(&self) -> std::io::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    uri: String,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let uri = path.to_string_lossy().into_owned();
        Self { path, name, uri }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GoalSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn read(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.path)
    }
}

/// In-memory goal text, used for unsaved buffers and synthesized goals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySource {
    name: String,
    uri: String,
    text: String,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            uri: format!("memory:///{name}"),
            name,
            text: text.into(),
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }
}

impl GoalSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn read(&self) -> std::io::Result<String> {
        Ok(self.text.clone())
    }
}

/// A level object, as extracted from level data by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceName {
    pub guid: String,
    pub name: String,
    /// GUID alias of the object, e.g. `CHARACTERGUID`
    pub kind: String,
}
