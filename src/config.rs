//! Persisted wrapper configuration and the context object device init snapshots from.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::ConfigError;
use crate::registry::{self, GpuPreset};

/// Config section holding every [`DeviceConfig`] key.
pub const CONFIG_SECTION: &str = "DgVoodoo2";

pub const KEY_ENABLED: &str = "enabled";
pub const KEY_GPU_VENDOR: &str = "gpu_vendor";
pub const KEY_GPU_MODEL: &str = "gpu_model";
pub const KEY_DDRAW_ENABLED: &str = "ddraw_enabled";
pub const KEY_D3DIMM_ENABLED: &str = "d3dimm_enabled";
pub const KEY_D3D8_ENABLED: &str = "d3d8_enabled";
pub const KEY_D3D9_ENABLED: &str = "d3d9_enabled";
pub const KEY_USE_AGP: &str = "use_agp";
pub const KEY_PATH: &str = "path";

/// Section/key configuration storage, as provided by the host emulator's config file.
///
/// Getters return `default` when the key is absent or holds a value of the wrong type.
pub trait ConfigStore {
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn set_int(&mut self, section: &str, key: &str, value: i64);
    fn get_string(&self, section: &str, key: &str, default: &str) -> String;
    fn set_string(&mut self, section: &str, key: &str, value: &str);
}

/// User-selectable wrapper settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub enabled: bool,
    pub gpu_vendor: i32,
    pub gpu_model: i32,
    /// Legacy 2D API wrapper (`DDraw.dll`).
    pub ddraw_enabled: bool,
    /// Immediate-mode 3D API wrapper (`D3DImm.dll`).
    pub d3dimm_enabled: bool,
    pub d3d8_enabled: bool,
    pub d3d9_enabled: bool,
    /// Prefer attaching as an AGP card when the machine has an AGP slot.
    pub use_agp: bool,
    /// Directory holding the external wrapper DLLs. Empty when unset.
    pub path: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gpu_vendor: registry::GpuVendor::Nvidia.to_config_i32(),
            gpu_model: 0,
            ddraw_enabled: true,
            d3dimm_enabled: true,
            d3d8_enabled: true,
            d3d9_enabled: true,
            use_agp: true,
            path: String::new(),
        }
    }
}

impl DeviceConfig {
    pub fn load(store: &dyn ConfigStore) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| store.get_int(CONFIG_SECTION, key, default as i64) != 0;
        let int = |key: &str, default: i32| {
            i32::try_from(store.get_int(CONFIG_SECTION, key, i64::from(default))).unwrap_or(default)
        };

        Self {
            enabled: flag(KEY_ENABLED, defaults.enabled),
            gpu_vendor: int(KEY_GPU_VENDOR, defaults.gpu_vendor),
            gpu_model: int(KEY_GPU_MODEL, defaults.gpu_model),
            ddraw_enabled: flag(KEY_DDRAW_ENABLED, defaults.ddraw_enabled),
            d3dimm_enabled: flag(KEY_D3DIMM_ENABLED, defaults.d3dimm_enabled),
            d3d8_enabled: flag(KEY_D3D8_ENABLED, defaults.d3d8_enabled),
            d3d9_enabled: flag(KEY_D3D9_ENABLED, defaults.d3d9_enabled),
            use_agp: flag(KEY_USE_AGP, defaults.use_agp),
            path: store.get_string(CONFIG_SECTION, KEY_PATH, &defaults.path),
        }
    }

    pub fn save(&self, store: &mut dyn ConfigStore) {
        let flags = [
            (KEY_ENABLED, self.enabled),
            (KEY_DDRAW_ENABLED, self.ddraw_enabled),
            (KEY_D3DIMM_ENABLED, self.d3dimm_enabled),
            (KEY_D3D8_ENABLED, self.d3d8_enabled),
            (KEY_D3D9_ENABLED, self.d3d9_enabled),
            (KEY_USE_AGP, self.use_agp),
        ];
        for (key, value) in flags {
            store.set_int(CONFIG_SECTION, key, i64::from(value));
        }
        store.set_int(CONFIG_SECTION, KEY_GPU_VENDOR, i64::from(self.gpu_vendor));
        store.set_int(CONFIG_SECTION, KEY_GPU_MODEL, i64::from(self.gpu_model));
        store.set_string(CONFIG_SECTION, KEY_PATH, &self.path);
    }
}

/// JSON-file backed [`ConfigStore`]: one top-level object per section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonConfigStore {
    sections: BTreeMap<String, BTreeMap<String, Value>>,
}

impl JsonConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `path`. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(err) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        };
        let sections = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { sections })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(&self.sections).map_err(|source| {
            ConfigError::Serialize {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn value(&self, section: &str, key: &str) -> Option<&Value> {
        self.sections.get(section)?.get(key)
    }

    fn set_value(&mut self, section: &str, key: &str, value: Value) {
        self.sections
            .entry(section.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
    }
}

impl ConfigStore for JsonConfigStore {
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.value(section, key)
            .and_then(Value::as_i64)
            .unwrap_or(default)
    }

    fn set_int(&mut self, section: &str, key: &str, value: i64) {
        self.set_value(section, key, Value::from(value));
    }

    fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.value(section, key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_owned()
    }

    fn set_string(&mut self, section: &str, key: &str, value: &str) {
        self.set_value(section, key, Value::from(value));
    }
}

/// Configuration plus the active GPU preset, passed explicitly to selection and device init.
///
/// A device instance snapshots the active preset when it is created; later selections only affect
/// instances created afterwards. The GPU selection is changed only through
/// [`registry::select_preset`], which keeps the recorded pair and the active preset in step.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    config: DeviceConfig,
    active: &'static GpuPreset,
    rom_root: PathBuf,
}

impl DeviceContext {
    /// Builds a context from `config`, selecting the preset it names.
    pub fn new(config: DeviceConfig, rom_root: impl Into<PathBuf>) -> Self {
        let active = registry::resolve(config.gpu_vendor, config.gpu_model);
        Self {
            config,
            active,
            rom_root: rom_root.into(),
        }
    }

    /// Loads the persisted configuration and selects the configured preset.
    pub fn from_store(store: &dyn ConfigStore, rom_root: impl Into<PathBuf>) -> Self {
        Self::new(DeviceConfig::load(store), rom_root)
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn active_preset(&self) -> &'static GpuPreset {
        self.active
    }

    /// Persists the configuration, including the requested `(vendor, model)` pair.
    pub fn save(&self, store: &mut dyn ConfigStore) {
        self.config.save(store);
    }

    pub(crate) fn set_selection(&mut self, vendor: i32, model: i32, preset: &'static GpuPreset) {
        self.config.gpu_vendor = vendor;
        self.config.gpu_model = model;
        self.active = preset;
    }

    /// Directory that preset ROM paths are relative to.
    pub fn rom_root(&self) -> &Path {
        &self.rom_root
    }

    /// Absolute location of the active preset's ROM image, if it has one.
    pub fn active_rom_path(&self) -> Option<PathBuf> {
        self.active
            .has_rom()
            .then(|| self.rom_root.join(self.active.rom_path))
    }
}
