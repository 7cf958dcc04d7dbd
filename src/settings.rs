use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Well-known key the serialized settings blob lives under.
pub const SETTINGS_KEY: &str = "settings.json";

pub const DEFAULT_SPEED_LIMIT_KMH: u32 = 55;
pub const DEFAULT_GEO_TIMEOUT_MS: u64 = 5000;

/// User-tunable configuration. Handed out as an immutable snapshot;
/// `SettingsStore` owns the persisted copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub speed_limit_kmh: u32,
    pub geo_timeout_ms: u64,
    pub sound_enabled: bool,
}

impl Settings {
    /// Defaults with an alternate speed limit (deployments have shipped
    /// both 55 and 40 as the out-of-the-box limit).
    pub fn with_default_limit(speed_limit_kmh: u32) -> Self {
        Settings {
            speed_limit_kmh,
            ..Settings::default()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            speed_limit_kmh: DEFAULT_SPEED_LIMIT_KMH,
            geo_timeout_ms: DEFAULT_GEO_TIMEOUT_MS,
            sound_enabled: true,
        }
    }
}

/// Single string-keyed blob store. The settings value is opaque to the
/// backend.
pub trait KvStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> std::io::Result<()>;
}

/// File-per-key store under a data directory.
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        FileKvStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: HashMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> std::io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Load/save of `Settings` against a key-value backend.
///
/// `load` never fails: a missing or unparseable blob falls back to the
/// configured defaults, and non-positive limit/timeout values are clamped
/// back to their defaults.
pub struct SettingsStore<S: KvStore> {
    store: S,
    defaults: Settings,
}

impl<S: KvStore> SettingsStore<S> {
    pub fn new(store: S, defaults: Settings) -> Self {
        SettingsStore { store, defaults }
    }

    pub fn defaults(&self) -> Settings {
        self.defaults
    }

    pub fn load(&self) -> Settings {
        let blob = match self.store.get(SETTINGS_KEY) {
            Some(blob) => blob,
            None => return self.defaults,
        };
        match serde_json::from_str::<Settings>(&blob) {
            Ok(settings) => self.clamp(settings),
            Err(e) => {
                log::debug!("settings blob failed to parse, using defaults: {}", e);
                self.defaults
            }
        }
    }

    pub fn save(&mut self, settings: &Settings) -> std::io::Result<()> {
        let blob = serde_json::to_string_pretty(settings)?;
        self.store.set(SETTINGS_KEY, &blob)
    }

    pub fn backend(&self) -> &S {
        &self.store
    }

    fn clamp(&self, mut settings: Settings) -> Settings {
        if settings.speed_limit_kmh == 0 {
            settings.speed_limit_kmh = self.defaults.speed_limit_kmh;
        }
        if settings.geo_timeout_ms == 0 {
            settings.geo_timeout_ms = self.defaults.geo_timeout_ms;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_empty_store_returns_defaults() {
        let store = SettingsStore::new(MemoryKvStore::new(), Settings::default());
        let s = store.load();
        assert_eq!(s.speed_limit_kmh, 55);
        assert_eq!(s.geo_timeout_ms, 5000);
        assert!(s.sound_enabled);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut store = SettingsStore::new(MemoryKvStore::new(), Settings::default());
        let s = Settings {
            speed_limit_kmh: 40,
            geo_timeout_ms: 12_000,
            sound_enabled: false,
        };
        store.save(&s).unwrap();
        assert_eq!(store.load(), s);
    }

    #[test]
    fn test_corrupt_blob_falls_back_to_defaults() {
        let mut kv = MemoryKvStore::new();
        kv.set(SETTINGS_KEY, "{not json").unwrap();
        let store = SettingsStore::new(kv, Settings::with_default_limit(40));
        assert_eq!(store.load().speed_limit_kmh, 40);
    }

    #[test]
    fn test_zero_values_clamped_to_defaults() {
        let mut kv = MemoryKvStore::new();
        kv.set(
            SETTINGS_KEY,
            r#"{"speed_limit_kmh":0,"geo_timeout_ms":0,"sound_enabled":false}"#,
        )
        .unwrap();
        let store = SettingsStore::new(kv, Settings::default());
        let s = store.load();
        assert_eq!(s.speed_limit_kmh, 55);
        assert_eq!(s.geo_timeout_ms, 5000);
        assert!(!s.sound_enabled);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = std::env::temp_dir().join("speedometer_settings_test");
        let _ = fs::remove_dir_all(&dir);
        let mut store = SettingsStore::new(FileKvStore::new(&dir), Settings::default());

        let s = Settings {
            speed_limit_kmh: 70,
            geo_timeout_ms: 3000,
            sound_enabled: true,
        };
        store.save(&s).unwrap();
        assert_eq!(store.load(), s);

        let _ = fs::remove_dir_all(&dir);
    }
}
