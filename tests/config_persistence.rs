use std::fs;

use dgvoodoo_pci::config::{CONFIG_SECTION, KEY_GPU_MODEL, KEY_GPU_VENDOR};
use dgvoodoo_pci::{
    available_options, display_name, ConfigError, ConfigStore, DeviceConfig, DeviceContext,
    JsonConfigStore,
};
use pretty_assertions::assert_eq;

#[test]
fn saved_config_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("dgvoodoo2.json");

    let config = DeviceConfig {
        enabled: true,
        gpu_vendor: 1,
        gpu_model: 0,
        ddraw_enabled: true,
        d3dimm_enabled: false,
        d3d8_enabled: true,
        d3d9_enabled: false,
        use_agp: false,
        path: String::new(),
    };
    let mut store = JsonConfigStore::new();
    config.save(&mut store);
    store.save(&file).unwrap();

    let reloaded = JsonConfigStore::load(&file).unwrap();
    assert_eq!(reloaded, store);
    assert_eq!(DeviceConfig::load(&reloaded), config);
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonConfigStore::load(&dir.path().join("absent.json")).unwrap();
    let config = DeviceConfig::load(&store);
    assert_eq!(config, DeviceConfig::default());
    assert!(available_options(&config).is_empty());
}

#[test]
fn malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("broken.json");
    fs::write(&file, "{ not json").unwrap();

    let err = JsonConfigStore::load(&file).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
}

#[test]
fn context_selects_persisted_preset() {
    let mut store = JsonConfigStore::new();
    store.set_int(CONFIG_SECTION, KEY_GPU_VENDOR, 2);
    store.set_int(CONFIG_SECTION, KEY_GPU_MODEL, 0);

    let ctx = DeviceContext::from_store(&store, "/opt/86box");
    assert_eq!(ctx.active_preset().name, "Matrox Parhelia-512");
    assert_eq!(
        ctx.active_rom_path().unwrap(),
        std::path::Path::new("/opt/86box/roms/video/matrox/parhelia.bin")
    );
    assert_eq!(display_name(2, 0), "Matrox Parhelia-512");
}

#[test]
fn out_of_range_persisted_model_falls_back() {
    let mut store = JsonConfigStore::new();
    store.set_int(CONFIG_SECTION, KEY_GPU_VENDOR, 0);
    store.set_int(CONFIG_SECTION, KEY_GPU_MODEL, 9);

    let ctx = DeviceContext::from_store(&store, "/opt/86box");
    assert_eq!(ctx.active_preset().name, "NVIDIA GeForce4 Ti 4800");
    assert_eq!(ctx.config().gpu_model, 9);
}

#[test]
fn save_errors_are_reported_by_cause() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("no/such/dir/dgvoodoo2.json");
    let err = JsonConfigStore::new().save(&file).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "{err}");

    // Encoding failures get their own variant rather than being reported as a bad file.
    let source = serde_json::from_str::<u8>("\"x\"").unwrap_err();
    let err = ConfigError::Serialize {
        path: file,
        source,
    };
    assert!(err.to_string().starts_with("failed to serialize config"), "{err}");
}
