//! Framebuffer and MMIO apertures.
//!
//! Neither aperture is backed by device state: every byte reads as `0xFF` and writes are dropped.
//! Wider accesses are built from byte accesses, so swapping in a real handler only requires the
//! byte accessors.

use crate::bus::{ApertureHandle, ApertureRegion, ApertureRegistry};
use crate::error::HostError;

/// Default guest-physical base of the framebuffer aperture (BAR0).
pub const FRAMEBUFFER_BASE: u64 = 0xE000_0000;
/// Default guest-physical base of the MMIO register aperture (BAR1).
pub const MMIO_BASE: u64 = 0xFD00_0000;
pub const MMIO_SIZE: u64 = 16 * 1024 * 1024;

/// Byte value returned by apertures with no backing state.
pub const OPEN_BUS_BYTE: u8 = 0xFF;

/// Memory-mapped access handler registered with the host.
///
/// Addresses are absolute guest-physical addresses. Only the byte accessors are required; word and
/// dword accessors are composed little-endian (low byte at the lower address).
pub trait ApertureHandler {
    fn read_u8(&mut self, paddr: u64) -> u8;
    fn write_u8(&mut self, paddr: u64, val: u8);

    fn read_u16(&mut self, paddr: u64) -> u16 {
        u16::from(self.read_u8(paddr)) | (u16::from(self.read_u8(paddr.wrapping_add(1))) << 8)
    }

    fn read_u32(&mut self, paddr: u64) -> u32 {
        u32::from(self.read_u16(paddr)) | (u32::from(self.read_u16(paddr.wrapping_add(2))) << 16)
    }

    fn write_u16(&mut self, paddr: u64, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.write_u8(paddr, lo);
        self.write_u8(paddr.wrapping_add(1), hi);
    }

    fn write_u32(&mut self, paddr: u64, val: u32) {
        self.write_u16(paddr, val as u16);
        self.write_u16(paddr.wrapping_add(2), (val >> 16) as u16);
    }
}

/// Handler for apertures without emulated contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderAperture;

impl ApertureHandler for PlaceholderAperture {
    fn read_u8(&mut self, _paddr: u64) -> u8 {
        OPEN_BUS_BYTE
    }

    fn write_u8(&mut self, _paddr: u64, _val: u8) {}
}

pub const fn framebuffer_region(memory_size_bytes: u64) -> ApertureRegion {
    ApertureRegion::new(FRAMEBUFFER_BASE, memory_size_bytes)
}

pub const fn mmio_region() -> ApertureRegion {
    ApertureRegion::new(MMIO_BASE, MMIO_SIZE)
}

/// Host mappings for the framebuffer and MMIO apertures of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApertureMappings {
    pub framebuffer: ApertureHandle,
    pub mmio: ApertureHandle,
}

impl ApertureMappings {
    /// Registers both apertures. Nothing stays registered if either registration fails.
    pub fn map<R: ApertureRegistry + ?Sized>(
        registry: &mut R,
        memory_size_bytes: u64,
    ) -> Result<Self, HostError> {
        let framebuffer = registry.register_aperture(
            framebuffer_region(memory_size_bytes),
            Box::new(PlaceholderAperture),
        )?;
        let mmio = match registry.register_aperture(mmio_region(), Box::new(PlaceholderAperture)) {
            Ok(handle) => handle,
            Err(err) => {
                registry.unregister_aperture(framebuffer);
                return Err(err);
            }
        };
        Ok(Self { framebuffer, mmio })
    }

    pub fn unmap<R: ApertureRegistry + ?Sized>(self, registry: &mut R) {
        registry.unregister_aperture(self.framebuffer);
        registry.unregister_aperture(self.mmio);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every byte access so the composition order can be checked.
    #[derive(Default)]
    struct Recorder {
        reads: Vec<u64>,
        writes: Vec<(u64, u8)>,
    }

    impl ApertureHandler for Recorder {
        fn read_u8(&mut self, paddr: u64) -> u8 {
            self.reads.push(paddr);
            paddr as u8
        }

        fn write_u8(&mut self, paddr: u64, val: u8) {
            self.writes.push((paddr, val));
        }
    }

    #[test]
    fn wide_reads_are_little_endian() {
        let mut rec = Recorder::default();
        assert_eq!(rec.read_u16(0x1000), 0x0100);
        assert_eq!(rec.read_u32(0x2010), 0x1312_1110);
        assert_eq!(rec.reads, [0x1000, 0x1001, 0x2010, 0x2011, 0x2012, 0x2013]);
    }

    #[test]
    fn wide_writes_split_low_byte_first() {
        let mut rec = Recorder::default();
        rec.write_u16(0x10, 0xBEEF);
        rec.write_u32(0x20, 0x1122_3344);
        assert_eq!(
            rec.writes,
            [
                (0x10, 0xEF),
                (0x11, 0xBE),
                (0x20, 0x44),
                (0x21, 0x33),
                (0x22, 0x22),
                (0x23, 0x11),
            ]
        );
    }

    #[test]
    fn placeholder_reads_all_ones_and_ignores_writes() {
        let mut ap = PlaceholderAperture;
        ap.write_u32(FRAMEBUFFER_BASE, 0);
        ap.write_u8(MMIO_BASE + 3, 0);
        assert_eq!(ap.read_u8(FRAMEBUFFER_BASE), 0xFF);
        assert_eq!(ap.read_u16(MMIO_BASE + 3), 0xFFFF);
        assert_eq!(ap.read_u32(MMIO_BASE + MMIO_SIZE - 4), 0xFFFF_FFFF);
    }

    #[test]
    fn regions_use_fixed_bases() {
        let fb = framebuffer_region(128 * 1024 * 1024);
        assert_eq!(fb.base, 0xE000_0000);
        assert_eq!(fb.end_exclusive(), 0xE800_0000);
        assert_eq!(mmio_region().end_exclusive(), 0xFE00_0000);
    }
}
