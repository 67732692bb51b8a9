//! JSON 설정 파일 저장소
//!
//! 범위(scope)별 디렉토리 하나에 JSON 문서를 읽고 쓴다.
//! - Global: <config_dir>/fileshare/
//! - Project: <cwd>/.fileshare/

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Directory name used for both global and project-local settings
pub const CONFIG_DIR_NAME: &str = "fileshare";

/// Which settings directory a document belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Global,
    Project,
}

/// JSON 설정 저장소
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn for_scope(scope: ConfigScope) -> Result<Self> {
        match scope {
            ConfigScope::Global => dirs::config_dir()
                .map(|dir| Self::new(dir.join(CONFIG_DIR_NAME)))
                .ok_or_else(|| Error::Config("Cannot find config directory".to_string())),
            ConfigScope::Project => std::env::current_dir()
                .map(Self::project)
                .map_err(|e| Error::Config(format!("Cannot get current directory: {}", e))),
        }
    }

    /// `<root>/.fileshare`
    pub fn project(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(format!(".{}", CONFIG_DIR_NAME)))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(filename)
    }

    /// Parsed document, or `None` if the file does not exist
    pub fn read<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        let path = self.file_path(filename);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Write `data` as pretty JSON through a sibling `.tmp` file renamed into place
    pub fn write<T: Serialize>(&self, filename: &str, data: &T) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.base_dir).map_err(|e| {
            Error::Config(format!(
                "Failed to create {}: {}",
                self.base_dir.display(),
                e
            ))
        })?;

        let path = self.file_path(filename);
        let staging = self.file_path(&format!("{}.tmp", filename));
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| Error::Config(format!("Failed to serialize {}: {}", filename, e)))?;

        std::fs::write(&staging, content)
            .and_then(|_| std::fs::rename(&staging, &path))
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", path.display(), e)))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = JsonStore::project(dir.path());
        assert!(store.base_dir().ends_with(".fileshare"));

        let missing: Option<BTreeMap<String, u32>> = store.read("data.json").expect("read");
        assert!(missing.is_none());

        let mut data = BTreeMap::new();
        data.insert("maxPolicies".to_string(), 10u32);
        let written = store.write("data.json", &data).expect("Failed to write");
        assert_eq!(written, store.file_path("data.json"));
        assert!(!store.file_path("data.json.tmp").exists());

        let loaded: Option<BTreeMap<String, u32>> = store.read("data.json").expect("read");
        assert_eq!(loaded, Some(data));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = JsonStore::new(dir.path());
        std::fs::write(store.file_path("bad.json"), "{ not json").expect("write");

        let result: Result<Option<BTreeMap<String, u32>>> = store.read("bad.json");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
