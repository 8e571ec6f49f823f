use crate::event::key_code;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tuning knobs of the scan detector, fixed at construction.
///
/// All durations are milliseconds. The defaults match common USB hand
/// scanners: a burst of at least six characters with under 30ms between
/// keystrokes, terminated by Tab or Enter or by 100ms of silence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub min_length: usize,
    pub avg_time_by_char_ms: u64,
    pub time_before_scan_test_ms: u64,
    pub start_char: Vec<u32>,
    pub end_char: Vec<u32>,
    pub scan_button_key_code: Option<u32>,
    pub scan_button_long_press_threshold: u32,
    pub stop_propagation: bool,
    pub prevent_default: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_length: 6,
            avg_time_by_char_ms: 30,
            time_before_scan_test_ms: 100,
            start_char: vec![],
            end_char: vec![key_code::TAB, key_code::ENTER],
            scan_button_key_code: None,
            scan_button_long_press_threshold: 3,
            stop_propagation: false,
            prevent_default: false,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> DetectorConfig;
    fn save(&self, cfg: &DetectorConfig) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "scanlight") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("scanlight_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> DetectorConfig {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<DetectorConfig>(&bytes) {
                return cfg;
            }
        }
        DetectorConfig::default()
    }

    fn save(&self, cfg: &DetectorConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_common_scanners() {
        let cfg = DetectorConfig::default();
        assert_eq!(cfg.min_length, 6);
        assert_eq!(cfg.avg_time_by_char_ms, 30);
        assert_eq!(cfg.time_before_scan_test_ms, 100);
        assert!(cfg.start_char.is_empty());
        assert_eq!(cfg.end_char, vec![9, 13]);
        assert_eq!(cfg.scan_button_key_code, None);
        assert_eq!(cfg.scan_button_long_press_threshold, 3);
        assert!(!cfg.stop_propagation);
        assert!(!cfg.prevent_default);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = DetectorConfig::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = DetectorConfig {
            min_length: 10,
            avg_time_by_char_ms: 15,
            time_before_scan_test_ms: 250,
            start_char: vec![2],
            end_char: vec![13],
            scan_button_key_code: Some(17),
            scan_button_long_press_threshold: 5,
            stop_propagation: true,
            prevent_default: true,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nope.json"));
        assert_eq!(store.load(), DetectorConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "min_length": 12 }"#).unwrap();
        let store = FileConfigStore::with_path(&path);
        let loaded = store.load();
        assert_eq!(loaded.min_length, 12);
        assert_eq!(loaded.avg_time_by_char_ms, 30);
    }
}
