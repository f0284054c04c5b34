use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::PlanbookData;

const DATA_FILE: &str = "planbook.json";
const SETTINGS_FILE: &str = "settings.json";

/// Environment variable overriding the data directory.
pub const DIR_ENV: &str = "PLANBOOK_DIR";

/// Resolve the data directory: `$PLANBOOK_DIR`, else `~/.planbook/`.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".planbook")
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Author recorded on created records when the caller names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_created_by: Option<String>,
}

/// The book and settings files under one directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn open_default() -> Self {
        Self::new(data_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self) -> PathBuf {
        self.root.join(DATA_FILE)
    }

    /// Read the book. A missing file is an empty book.
    pub fn read(&self) -> Result<PlanbookData> {
        let path = self.data_path();
        if !path.exists() {
            debug!("no book at {}, starting empty", path.display());
            return Ok(PlanbookData::default());
        }
        let raw = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the book atomically (temp file + rename) so a reader never sees a
    /// half-written file.
    pub fn write(&self, data: &PlanbookData) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(data)?;
        let tmp = self.root.join(format!(".{DATA_FILE}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.data_path())?;
        debug!("wrote book to {}", self.data_path().display());
        Ok(())
    }

    /// Read, apply `f`, and write back only if `f` succeeds.
    ///
    /// There is no lock between the read and the write; concurrent updaters
    /// of the same directory can overwrite each other.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PlanbookData) -> Result<T>,
    {
        let mut data = self.read()?;
        let out = f(&mut data)?;
        self.write(&data)?;
        Ok(out)
    }

    /// Settings are optional: unreadable or missing files give the defaults.
    pub fn read_settings(&self) -> Settings {
        let path = self.root.join(SETTINGS_FILE);
        if !path.exists() {
            return Settings::default();
        }
        match fs::read_to_string(&path)
            .map_err(crate::PlanbookError::from)
            .and_then(|s| serde_json::from_str(&s).map_err(Into::into))
        {
            Ok(settings) => settings,
            Err(e) => {
                warn!("ignoring unreadable {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    pub fn write_settings(&self, settings: &Settings) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(self.root.join(SETTINGS_FILE), json)?;
        Ok(())
    }
}
