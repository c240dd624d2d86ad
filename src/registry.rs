//! GPU identity presets and the selectable device options built on them.
//!
//! Every preset is a fixed PCI identity (vendor/device ID, revision, class code) plus the amount of
//! framebuffer memory to expose and the VBIOS image to map at the legacy expansion ROM window.
//! Presets are addressed by the `(vendor, model)` integer pair stored in the persisted
//! configuration, so lookups take raw integers and must tolerate values that name nothing.

use crate::config::{DeviceConfig, DeviceContext};

pub const PCI_CLASS_DISPLAY: u8 = 0x03;
pub const PCI_SUBCLASS_VGA_COMPATIBLE: u8 = 0x00;

pub const PCI_VENDOR_NVIDIA: u16 = 0x10DE;
pub const PCI_VENDOR_ATI: u16 = 0x1002;
pub const PCI_VENDOR_MATROX: u16 = 0x102B;

/// Name reported by [`display_name`] for a vendor index that is not in the table.
pub const UNKNOWN_GPU_NAME: &str = "Unknown GPU";

/// GPU vendor, encoded as the integer used by the `gpu_vendor` config key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Ati,
    Matrox,
}

impl GpuVendor {
    pub const fn to_config_i32(self) -> i32 {
        match self {
            Self::Nvidia => 0,
            Self::Ati => 1,
            Self::Matrox => 2,
        }
    }

    pub const fn from_config_i32(val: i32) -> Option<Self> {
        match val {
            0 => Some(Self::Nvidia),
            1 => Some(Self::Ati),
            2 => Some(Self::Matrox),
            _ => None,
        }
    }

    /// All presets offered for this vendor, indexed by model number.
    pub fn presets(self) -> &'static [GpuPreset] {
        match self {
            Self::Nvidia => &NVIDIA_PRESETS,
            Self::Ati => &ATI_PRESETS,
            Self::Matrox => &MATROX_PRESETS,
        }
    }
}

/// Immutable PCI identity of one emulated GPU model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuPreset {
    pub vendor_id: u16,
    pub device_id: u16,
    pub revision: u8,
    pub class: u8,
    pub subclass: u8,
    pub memory_size_mb: u32,
    /// VBIOS image path relative to the ROM root. Empty when the model ships without a ROM.
    pub rom_path: &'static str,
    pub name: &'static str,
}

impl GpuPreset {
    pub const fn memory_size_bytes(&self) -> u64 {
        self.memory_size_mb as u64 * 1024 * 1024
    }

    pub const fn has_rom(&self) -> bool {
        !self.rom_path.is_empty()
    }
}

const fn display_preset(
    vendor_id: u16,
    device_id: u16,
    revision: u8,
    memory_size_mb: u32,
    rom_path: &'static str,
    name: &'static str,
) -> GpuPreset {
    GpuPreset {
        vendor_id,
        device_id,
        revision,
        class: PCI_CLASS_DISPLAY,
        subclass: PCI_SUBCLASS_VGA_COMPATIBLE,
        memory_size_mb,
        rom_path,
        name,
    }
}

pub const GEFORCE4_TI4800: GpuPreset = display_preset(
    PCI_VENDOR_NVIDIA,
    0x0301,
    0xA1,
    128,
    "roms/video/nvidia/NV28.rom",
    "NVIDIA GeForce4 Ti 4800",
);

pub const GEFORCE_FX5700_ULTRA: GpuPreset = display_preset(
    PCI_VENDOR_NVIDIA,
    0x0341,
    0xA2,
    256,
    "roms/video/nvidia/NV36.rom",
    "NVIDIA GeForce FX 5700 Ultra",
);

pub const GEFORCE_9800GT: GpuPreset = display_preset(
    PCI_VENDOR_NVIDIA,
    0x0614,
    0xA3,
    512,
    "roms/video/nvidia/G92.rom",
    "NVIDIA GeForce 9800 GT",
);

pub const RADEON_8500: GpuPreset = display_preset(
    PCI_VENDOR_ATI,
    0x514C,
    0x00,
    128,
    "roms/video/ati/r200.bin",
    "ATI Radeon 8500",
);

pub const PARHELIA_512: GpuPreset = display_preset(
    PCI_VENDOR_MATROX,
    0x0D80,
    0x00,
    256,
    "roms/video/matrox/parhelia.bin",
    "Matrox Parhelia-512",
);

static NVIDIA_PRESETS: [GpuPreset; 3] = [GEFORCE4_TI4800, GEFORCE_FX5700_ULTRA, GEFORCE_9800GT];
static ATI_PRESETS: [GpuPreset; 1] = [RADEON_8500];
static MATROX_PRESETS: [GpuPreset; 1] = [PARHELIA_512];

/// Preset used whenever a `(vendor, model)` pair does not name a table entry.
pub const DEFAULT_PRESET: &GpuPreset = &GEFORCE4_TI4800;

/// Exact table lookup; `None` for unknown vendors and out-of-range models.
pub fn lookup(vendor: i32, model: i32) -> Option<&'static GpuPreset> {
    let vendor = GpuVendor::from_config_i32(vendor)?;
    let model = usize::try_from(model).ok()?;
    vendor.presets().get(model)
}

/// Table lookup with the silent fallback used for device selection.
pub fn resolve(vendor: i32, model: i32) -> &'static GpuPreset {
    lookup(vendor, model).unwrap_or(DEFAULT_PRESET)
}

/// Makes `(vendor, model)` the active selection of `ctx`.
///
/// The requested pair is recorded as given so that it round-trips through the persisted
/// configuration; the active preset falls back to [`DEFAULT_PRESET`] when the pair is unknown.
pub fn select_preset(ctx: &mut DeviceContext, vendor: i32, model: i32) {
    let preset = resolve(vendor, model);
    if lookup(vendor, model).is_none() {
        tracing::debug!(vendor, model, fallback = preset.name, "unknown GPU selection");
    }
    ctx.set_selection(vendor, model, preset);
}

/// Human readable model name.
///
/// Out-of-range models of a known vendor report the default preset's name; an unknown vendor
/// reports [`UNKNOWN_GPU_NAME`].
pub fn display_name(vendor: i32, model: i32) -> &'static str {
    if GpuVendor::from_config_i32(vendor).is_none() {
        return UNKNOWN_GPU_NAME;
    }
    resolve(vendor, model).name
}

/// A selectable video card entry, binding one fixed `(vendor, model)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceOption {
    pub name: &'static str,
    pub internal_name: &'static str,
    pub vendor: GpuVendor,
    pub model: i32,
}

impl DeviceOption {
    pub fn preset(&self) -> &'static GpuPreset {
        resolve(self.vendor.to_config_i32(), self.model)
    }

    /// Selects this option's preset in `ctx`. Called by the option's init path before the device
    /// instance snapshots the active preset.
    pub fn select(&self, ctx: &mut DeviceContext) {
        select_preset(ctx, self.vendor.to_config_i32(), self.model);
    }
}

pub static DEVICE_OPTIONS: [DeviceOption; 5] = [
    DeviceOption {
        name: "NVIDIA GeForce4 Ti 4800 (DgVoodoo2)",
        internal_name: "nvidia_geforce4_ti4800_dgvoodoo2",
        vendor: GpuVendor::Nvidia,
        model: 0,
    },
    DeviceOption {
        name: "NVIDIA GeForce FX 5700 Ultra (DgVoodoo2)",
        internal_name: "nvidia_geforcefx_5700ultra_dgvoodoo2",
        vendor: GpuVendor::Nvidia,
        model: 1,
    },
    DeviceOption {
        name: "NVIDIA GeForce 9800 GT (DgVoodoo2)",
        internal_name: "nvidia_geforce_9800gt_dgvoodoo2",
        vendor: GpuVendor::Nvidia,
        model: 2,
    },
    DeviceOption {
        name: "ATI Radeon 8500 (DgVoodoo2)",
        internal_name: "ati_radeon_8500_dgvoodoo2",
        vendor: GpuVendor::Ati,
        model: 0,
    },
    DeviceOption {
        name: "Matrox Parhelia-512 (DgVoodoo2)",
        internal_name: "matrox_parhelia512_dgvoodoo2",
        vendor: GpuVendor::Matrox,
        model: 0,
    },
];

/// Device options to offer in the video card list. Empty while the wrapper is disabled.
pub fn available_options(config: &DeviceConfig) -> &'static [DeviceOption] {
    if config.enabled {
        &DEVICE_OPTIONS
    } else {
        &[]
    }
}

pub fn find_option(internal_name: &str) -> Option<&'static DeviceOption> {
    DEVICE_OPTIONS
        .iter()
        .find(|opt| opt.internal_name == internal_name)
}
