//! DgVoodoo2 video card model.
//!
//! A PCI/AGP display controller that presents one of a handful of real GPU identities to the guest
//! while the actual DirectDraw/Direct3D work is done by the external DgVoodoo2 wrapper DLLs. The
//! device itself only provides:
//! - a 256-byte PCI config space with per-offset write rules ([`config_space`]),
//! - placeholder framebuffer and MMIO apertures ([`aperture`]),
//! - the model's VBIOS at the legacy expansion ROM window ([`rom`]),
//! - one-time installation of the wrapper DLLs ([`wrapper`]).
//!
//! The entry point is [`DgVoodooDevice::init`], which snapshots the preset selected in a
//! [`DeviceContext`] and wires the card into a host implementing [`bus::HostBus`].
#![forbid(unsafe_code)]

pub mod aperture;
pub mod bus;
pub mod config;
pub mod config_space;
pub mod device;
pub mod error;
pub mod registry;
pub mod rom;
pub mod wrapper;

pub use aperture::{ApertureHandler, ApertureMappings, PlaceholderAperture};
pub use bus::{
    ApertureHandle, ApertureRegion, ApertureRegistry, BusAttacher, BusKind, HostBus,
    PciConfigFunction, PciSlot, SharedPciConfigFunction,
};
pub use config::{ConfigStore, DeviceConfig, DeviceContext, JsonConfigStore};
pub use config_space::{write_policy, DgVoodooConfigSpace, WritePolicy};
pub use device::DgVoodooDevice;
pub use error::{ConfigError, DeviceError, HostError};
pub use registry::{
    available_options, display_name, find_option, select_preset, DeviceOption, GpuPreset, GpuVendor,
    DEVICE_OPTIONS,
};
pub use rom::{ExpansionRom, RomImage};
pub use wrapper::{WrapperComponent, WrapperInstallState, WrapperManager};
