//! Configuration service: workbench settings with JSON persistence.

use std::cell::RefCell;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::core::Token;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    /// Columns for the left and right regions.
    pub sidebar_width: u16,
    /// Rows for the bottom region.
    pub bottom_height: u16,
    /// Lines kept by the log console.
    pub log_history: usize,
    /// Restore the persisted layout on startup.
    pub restore_layout: bool,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            sidebar_width: 32,
            bottom_height: 8,
            log_history: 500,
            restore_layout: true,
        }
    }
}

impl WorkbenchConfig {
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    /// Missing or unreadable files fall back to defaults; a malformed file
    /// is worth a warning but never blocks startup.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "config unreadable, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        std::fs::write(path, text)
    }
}

pub struct ConfigService {
    config: RefCell<WorkbenchConfig>,
}

impl ConfigService {
    pub fn new(config: WorkbenchConfig) -> Self {
        Self {
            config: RefCell::new(config),
        }
    }

    pub fn snapshot(&self) -> WorkbenchConfig {
        self.config.borrow().clone()
    }

    pub fn sidebar_width(&self) -> u16 {
        self.config.borrow().sidebar_width
    }

    pub fn bottom_height(&self) -> u16 {
        self.config.borrow().bottom_height
    }

    pub fn log_history(&self) -> usize {
        self.config.borrow().log_history
    }

    pub fn restore_layout(&self) -> bool {
        self.config.borrow().restore_layout
    }

    pub fn update(&self, f: impl FnOnce(&mut WorkbenchConfig)) {
        f(&mut self.config.borrow_mut());
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new(WorkbenchConfig::default())
    }
}

/// Well-known token other plugins use to request the config service.
pub fn config_token() -> &'static Token<ConfigService> {
    static TOKEN: OnceLock<Token<ConfigService>> = OnceLock::new();
    TOKEN.get_or_init(|| Token::new("atelier:config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = WorkbenchConfig::default();
        assert!(config.sidebar_width > 0);
        assert!(config.bottom_height > 0);
        assert!(config.restore_layout);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbench.json");
        std::fs::write(&path, r#"{ "sidebar_width": 40 }"#).unwrap();

        let config = WorkbenchConfig::load(&path).unwrap();
        assert_eq!(config.sidebar_width, 40);
        assert_eq!(config.bottom_height, WorkbenchConfig::default().bottom_height);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkbenchConfig::load_or_default(&dir.path().join("absent.json"));
        assert_eq!(config, WorkbenchConfig::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbench.json");

        let mut config = WorkbenchConfig::default();
        config.bottom_height = 12;
        config.save(&path).unwrap();

        assert_eq!(WorkbenchConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn service_updates_apply() {
        let service = ConfigService::default();
        service.update(|config| config.sidebar_width = 20);
        assert_eq!(service.sidebar_width(), 20);
    }

    #[test]
    fn token_is_process_wide() {
        assert_eq!(config_token(), config_token());
    }
}
