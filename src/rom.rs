//! VBIOS expansion ROM, mapped read-only at the legacy `0xC0000` video ROM window.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use crate::aperture::ApertureHandler;
use crate::bus::{ApertureHandle, ApertureRegion, ApertureRegistry};
use crate::error::HostError;

pub const LEGACY_ROM_BASE: u64 = 0xC0000;
pub const LEGACY_ROM_SIZE: usize = 0x8000;
pub const LEGACY_ROM_MASK: u64 = 0x7FFF;

/// Reset value of the expansion ROM BAR when a ROM is present (disabled, base `0xF000_0000`).
pub const EXPANSION_ROM_BAR_RESET: u32 = 0xF000_0000;

/// Fill byte for the part of the window not covered by the image.
const ROM_FILL_BYTE: u8 = 0xFF;

/// ROM window contents. Shared with the host-side read handler while mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomImage {
    bytes: Rc<[u8]>,
}

impl RomImage {
    /// Copies `image` into a window-sized buffer, padding or truncating as needed.
    pub fn from_bytes(image: &[u8]) -> Self {
        let mut bytes = vec![ROM_FILL_BYTE; LEGACY_ROM_SIZE];
        let len = image.len().min(LEGACY_ROM_SIZE);
        bytes[..len].copy_from_slice(&image[..len]);
        Self {
            bytes: bytes.into(),
        }
    }

    /// Loads an image from disk. Missing, unreadable and empty files all yield `None`.
    pub fn load(path: &Path) -> Option<Self> {
        match fs::read(path) {
            Ok(image) if image.is_empty() => {
                tracing::warn!(path = %path.display(), "VBIOS image is empty; continuing without ROM");
                None
            }
            Ok(image) => {
                if image.len() > LEGACY_ROM_SIZE {
                    tracing::debug!(
                        path = %path.display(),
                        len = image.len(),
                        "VBIOS image larger than ROM window; truncating"
                    );
                }
                Some(Self::from_bytes(&image))
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), "failed to load VBIOS image: {err}; continuing without ROM");
                None
            }
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn read(&self, paddr: u64) -> u8 {
        self.bytes[(paddr & LEGACY_ROM_MASK) as usize]
    }
}

/// Read-only handler for the ROM window; writes are ignored.
#[derive(Debug, Clone)]
pub struct RomAperture {
    image: RomImage,
}

impl ApertureHandler for RomAperture {
    fn read_u8(&mut self, paddr: u64) -> u8 {
        self.image.read(paddr)
    }

    fn write_u8(&mut self, _paddr: u64, _val: u8) {}
}

pub const fn legacy_rom_region() -> ApertureRegion {
    ApertureRegion::new(LEGACY_ROM_BASE, LEGACY_ROM_SIZE as u64)
}

/// A ROM image mapped into the legacy window. Owned by exactly one device instance.
#[derive(Debug)]
pub struct ExpansionRom {
    image: RomImage,
    handle: ApertureHandle,
}

impl ExpansionRom {
    pub fn map<R: ApertureRegistry + ?Sized>(
        registry: &mut R,
        image: RomImage,
    ) -> Result<Self, HostError> {
        let handle = registry.register_aperture(
            legacy_rom_region(),
            Box::new(RomAperture {
                image: image.clone(),
            }),
        )?;
        Ok(Self { image, handle })
    }

    pub fn image(&self) -> &RomImage {
        &self.image
    }

    pub fn handle(&self) -> ApertureHandle {
        self.handle
    }

    /// Removes the mapping and releases the buffer.
    pub fn unmap<R: ApertureRegistry + ?Sized>(self, registry: &mut R) {
        registry.unregister_aperture(self.handle);
    }
}
