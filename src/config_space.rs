//! PCI configuration space of the video card.
//!
//! Guest writes go through an ordered rule table: the first rule whose offset range covers the
//! written byte decides what is stored. Reads are always verbatim. Only function 0 exists; other
//! functions read as all-ones and ignore writes.

use core::ops::RangeInclusive;

use crate::bus::PciConfigFunction;

pub const PCI_CONFIG_SPACE_SIZE: usize = 256;

pub const PCI_VENDOR_ID_OFFSET: u8 = 0x00;
pub const PCI_DEVICE_ID_OFFSET: u8 = 0x02;
pub const PCI_COMMAND_OFFSET: u8 = 0x04;
pub const PCI_STATUS_OFFSET: u8 = 0x06;
pub const PCI_REVISION_ID_OFFSET: u8 = 0x08;
pub const PCI_PROG_IF_OFFSET: u8 = 0x09;
pub const PCI_SUBCLASS_OFFSET: u8 = 0x0A;
pub const PCI_CLASS_OFFSET: u8 = 0x0B;
pub const PCI_HEADER_TYPE_OFFSET: u8 = 0x0E;
pub const PCI_BAR0_OFFSET: u8 = 0x10;
pub const PCI_BAR1_OFFSET: u8 = 0x14;
pub const PCI_BAR_COUNT: u8 = 6;
pub const PCI_SUBSYSTEM_VENDOR_ID_OFFSET: u8 = 0x2C;
pub const PCI_SUBSYSTEM_ID_OFFSET: u8 = 0x2E;
pub const PCI_EXPANSION_ROM_OFFSET: u8 = 0x30;
pub const PCI_INTERRUPT_LINE_OFFSET: u8 = 0x3C;
pub const PCI_INTERRUPT_PIN_OFFSET: u8 = 0x3D;

/// COMMAND bits the card implements: I/O space (bit 0) and memory space (bit 1) enable.
pub const PCI_COMMAND_WRITABLE_MASK: u8 = 0x03;
pub const PCI_STATUS_CAPABILITIES_LIST: u16 = 1 << 4;
pub const PCI_STATUS_FAST_BACK_TO_BACK: u16 = 1 << 7;
pub const PCI_STATUS_DEVSEL_MEDIUM: u16 = 1 << 9;

/// Expansion ROM BAR byte 0: only the ROM enable bit is writable.
pub const PCI_ROM_ENABLE_MASK: u8 = 0x01;
/// Expansion ROM BAR byte 1: address bits 8..=9 are hard-wired to zero.
pub const PCI_ROM_ADDR_LOW_MASK: u8 = 0xFC;

/// Value returned for config reads of unimplemented functions.
pub const PCI_UNIMPLEMENTED_FUNCTION_READ: u8 = 0xFF;

/// What a guest write to one config-space byte does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Read-only byte; the write is dropped.
    Discard,
    /// Store `value & mask`.
    Masked(u8),
    /// Store `value & mask`, but only while an expansion ROM is loaded.
    RomGated(u8),
    /// Store verbatim and latch into the interrupt routing line.
    InterruptLine,
    /// Plain read/write byte.
    ReadWrite,
}

#[derive(Debug, Clone)]
pub struct WriteRule {
    pub offsets: RangeInclusive<u8>,
    pub policy: WritePolicy,
}

const fn rule(start: u8, end: u8, policy: WritePolicy) -> WriteRule {
    WriteRule {
        offsets: start..=end,
        policy,
    }
}

/// Write rules in evaluation order. Offsets no rule covers are [`WritePolicy::ReadWrite`].
///
/// BAR0 (`0x10..=0x13`) is discarded before anything else gets a say: the framebuffer aperture
/// sits at a fixed address and is not relocatable. Subsystem IDs mirror the preset identity and
/// are read-only like the vendor/device ID.
pub static WRITE_RULES: [WriteRule; 9] = [
    rule(0x00, 0x03, WritePolicy::Discard),
    rule(0x08, 0x0B, WritePolicy::Discard),
    rule(0x10, 0x13, WritePolicy::Discard),
    rule(0x2C, 0x2F, WritePolicy::Discard),
    rule(0x04, 0x04, WritePolicy::Masked(PCI_COMMAND_WRITABLE_MASK)),
    rule(0x30, 0x30, WritePolicy::RomGated(PCI_ROM_ENABLE_MASK)),
    rule(0x31, 0x31, WritePolicy::RomGated(PCI_ROM_ADDR_LOW_MASK)),
    rule(0x32, 0x33, WritePolicy::RomGated(0xFF)),
    rule(0x3C, 0x3C, WritePolicy::InterruptLine),
];

pub fn write_policy(offset: u8) -> WritePolicy {
    WRITE_RULES
        .iter()
        .find(|rule| rule.offsets.contains(&offset))
        .map_or(WritePolicy::ReadWrite, |rule| rule.policy)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PciVendorDeviceId {
    pub vendor_id: u16,
    pub device_id: u16,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PciSubsystemIds {
    pub subsystem_vendor_id: u16,
    pub subsystem_id: u16,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PciClassCode {
    pub class: u8,
    pub subclass: u8,
    pub prog_if: u8,
    pub revision_id: u8,
}

/// Type 0 config header of the card plus the interrupt line latched for the host's IRQ routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DgVoodooConfigSpace {
    bytes: [u8; PCI_CONFIG_SPACE_SIZE],
    interrupt_line: u8,
    rom_present: bool,
}

impl DgVoodooConfigSpace {
    /// All-zero header with the identity fields set. Identity bytes cannot be changed afterwards
    /// through guest writes.
    pub fn new(ids: PciVendorDeviceId, rom_present: bool) -> Self {
        let mut bytes = [0u8; PCI_CONFIG_SPACE_SIZE];
        put_u16(&mut bytes, PCI_VENDOR_ID_OFFSET, ids.vendor_id);
        put_u16(&mut bytes, PCI_DEVICE_ID_OFFSET, ids.device_id);
        Self {
            bytes,
            interrupt_line: 0,
            rom_present,
        }
    }

    pub fn read(&self, function: u8, offset: u8) -> u8 {
        if function != 0 {
            return PCI_UNIMPLEMENTED_FUNCTION_READ;
        }
        self.bytes[usize::from(offset)]
    }

    pub fn write(&mut self, function: u8, offset: u8, value: u8) {
        if function != 0 {
            return;
        }

        let slot = &mut self.bytes[usize::from(offset)];
        match write_policy(offset) {
            WritePolicy::Discard => {
                tracing::trace!(offset, value, "discarding write to read-only config byte");
            }
            WritePolicy::Masked(mask) => *slot = value & mask,
            WritePolicy::RomGated(mask) => {
                if self.rom_present {
                    *slot = value & mask;
                }
            }
            WritePolicy::InterruptLine => {
                *slot = value;
                self.interrupt_line = value;
            }
            WritePolicy::ReadWrite => *slot = value,
        }
    }

    /// Interrupt line last programmed by firmware/guest.
    pub fn interrupt_line(&self) -> u8 {
        self.interrupt_line
    }

    pub fn rom_present(&self) -> bool {
        self.rom_present
    }

    pub fn bytes(&self) -> &[u8; PCI_CONFIG_SPACE_SIZE] {
        &self.bytes
    }

    pub fn read_u16(&self, offset: u8) -> u16 {
        u16::from_le_bytes([self.byte(offset), self.byte(offset.wrapping_add(1))])
    }

    pub fn read_u32(&self, offset: u8) -> u32 {
        u32::from(self.read_u16(offset)) | (u32::from(self.read_u16(offset.wrapping_add(2))) << 16)
    }

    pub fn vendor_device_id(&self) -> PciVendorDeviceId {
        PciVendorDeviceId {
            vendor_id: self.read_u16(PCI_VENDOR_ID_OFFSET),
            device_id: self.read_u16(PCI_DEVICE_ID_OFFSET),
        }
    }

    pub fn subsystem_ids(&self) -> PciSubsystemIds {
        PciSubsystemIds {
            subsystem_vendor_id: self.read_u16(PCI_SUBSYSTEM_VENDOR_ID_OFFSET),
            subsystem_id: self.read_u16(PCI_SUBSYSTEM_ID_OFFSET),
        }
    }

    pub fn class_code(&self) -> PciClassCode {
        PciClassCode {
            revision_id: self.byte(PCI_REVISION_ID_OFFSET),
            prog_if: self.byte(PCI_PROG_IF_OFFSET),
            subclass: self.byte(PCI_SUBCLASS_OFFSET),
            class: self.byte(PCI_CLASS_OFFSET),
        }
    }

    pub fn command(&self) -> u16 {
        self.read_u16(PCI_COMMAND_OFFSET)
    }

    pub fn status(&self) -> u16 {
        self.read_u16(PCI_STATUS_OFFSET)
    }

    /// Raw value of BAR `index`; `None` past BAR5.
    pub fn bar(&self, index: u8) -> Option<u32> {
        (index < PCI_BAR_COUNT).then(|| self.read_u32(PCI_BAR0_OFFSET + index * 4))
    }

    pub fn expansion_rom_bar(&self) -> u32 {
        self.read_u32(PCI_EXPANSION_ROM_OFFSET)
    }

    // Device-side setters bypass the write rules; they are only used while building the reset
    // image.

    pub(crate) fn set_class_code(&mut self, code: PciClassCode) {
        self.bytes[usize::from(PCI_REVISION_ID_OFFSET)] = code.revision_id;
        self.bytes[usize::from(PCI_PROG_IF_OFFSET)] = code.prog_if;
        self.bytes[usize::from(PCI_SUBCLASS_OFFSET)] = code.subclass;
        self.bytes[usize::from(PCI_CLASS_OFFSET)] = code.class;
    }

    pub(crate) fn set_subsystem_ids(&mut self, ids: PciSubsystemIds) {
        put_u16(&mut self.bytes, PCI_SUBSYSTEM_VENDOR_ID_OFFSET, ids.subsystem_vendor_id);
        put_u16(&mut self.bytes, PCI_SUBSYSTEM_ID_OFFSET, ids.subsystem_id);
    }

    pub(crate) fn set_u8(&mut self, offset: u8, value: u8) {
        self.bytes[usize::from(offset)] = value;
    }

    pub(crate) fn set_u16(&mut self, offset: u8, value: u16) {
        put_u16(&mut self.bytes, offset, value);
    }

    pub(crate) fn set_u32(&mut self, offset: u8, value: u32) {
        let off = usize::from(offset);
        self.bytes[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn set_interrupt_line(&mut self, line: u8) {
        self.bytes[usize::from(PCI_INTERRUPT_LINE_OFFSET)] = line;
        self.interrupt_line = line;
    }

    fn byte(&self, offset: u8) -> u8 {
        self.bytes[usize::from(offset)]
    }
}

impl PciConfigFunction for DgVoodooConfigSpace {
    fn config_read(&self, function: u8, offset: u8) -> u8 {
        self.read(function, offset)
    }

    fn config_write(&mut self, function: u8, offset: u8, value: u8) {
        self.write(function, offset, value)
    }
}

fn put_u16(bytes: &mut [u8; PCI_CONFIG_SPACE_SIZE], offset: u8, value: u16) {
    let off = usize::from(offset);
    bytes[off..off + 2].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rom_present: bool) -> DgVoodooConfigSpace {
        let mut cfg = DgVoodooConfigSpace::new(
            PciVendorDeviceId {
                vendor_id: 0x10DE,
                device_id: 0x0301,
            },
            rom_present,
        );
        cfg.set_u32(PCI_BAR0_OFFSET, 0xE000_0000);
        cfg.set_u8(PCI_REVISION_ID_OFFSET, 0xA1);
        cfg
    }

    #[test]
    fn rule_order_puts_bar0_discard_first() {
        for offset in 0x10..=0x13 {
            assert_eq!(write_policy(offset), WritePolicy::Discard);
        }
        assert_eq!(write_policy(0x14), WritePolicy::ReadWrite);
        assert_eq!(write_policy(0x0C), WritePolicy::ReadWrite);
        assert_eq!(write_policy(0x04), WritePolicy::Masked(0x03));
        assert_eq!(write_policy(0x05), WritePolicy::ReadWrite);
        assert_eq!(write_policy(0x31), WritePolicy::RomGated(0xFC));
        assert_eq!(write_policy(0x3C), WritePolicy::InterruptLine);
        assert_eq!(write_policy(0x3D), WritePolicy::ReadWrite);
        assert_eq!(write_policy(0xFF), WritePolicy::ReadWrite);
    }

    #[test]
    fn nonzero_function_is_unimplemented() {
        let mut cfg = config(true);
        assert_eq!(cfg.read(1, 0x00), 0xFF);
        assert_eq!(cfg.read(7, 0x3C), 0xFF);

        let before = cfg.clone();
        cfg.write(3, 0x40, 0x55);
        cfg.write(1, 0x3C, 0x0A);
        assert_eq!(cfg, before);
    }

    #[test]
    fn command_register_keeps_only_io_and_memory_enable() {
        let mut cfg = config(false);
        cfg.write(0, PCI_COMMAND_OFFSET, 0xFF);
        assert_eq!(cfg.read(0, PCI_COMMAND_OFFSET), 0x03);
        cfg.write(0, PCI_COMMAND_OFFSET, 0x06);
        assert_eq!(cfg.read(0, PCI_COMMAND_OFFSET), 0x02);
        cfg.write(0, PCI_COMMAND_OFFSET, 0x00);
        assert_eq!(cfg.command(), 0);
    }

    #[test]
    fn identity_and_bar0_writes_are_dropped() {
        let mut cfg = config(false);
        for offset in [0x00, 0x01, 0x02, 0x03, 0x08, 0x09, 0x0A, 0x0B, 0x10, 0x11, 0x12, 0x13] {
            cfg.write(0, offset, 0x5A);
        }
        assert_eq!(
            cfg.vendor_device_id(),
            PciVendorDeviceId {
                vendor_id: 0x10DE,
                device_id: 0x0301
            }
        );
        assert_eq!(cfg.class_code().revision_id, 0xA1);
        assert_eq!(cfg.bar(0), Some(0xE000_0000));
    }

    #[test]
    fn subsystem_ids_are_read_only() {
        let mut cfg = config(false);
        cfg.set_subsystem_ids(PciSubsystemIds {
            subsystem_vendor_id: 0x10DE,
            subsystem_id: 0x0301,
        });
        for offset in 0x2C..=0x2F {
            assert_eq!(write_policy(offset), WritePolicy::Discard);
            cfg.write(0, offset, 0x00);
        }
        assert_eq!(
            cfg.subsystem_ids(),
            PciSubsystemIds {
                subsystem_vendor_id: 0x10DE,
                subsystem_id: 0x0301,
            }
        );
    }

    #[test]
    fn bar_index_past_bar5_is_none() {
        let cfg = config(false);
        assert_eq!(cfg.bar(5), Some(0));
        assert_eq!(cfg.bar(6), None);
        assert_eq!(cfg.bar(60), None);
        assert_eq!(cfg.bar(u8::MAX), None);
    }

    #[test]
    fn expansion_rom_bar_is_inert_without_rom() {
        let mut cfg = config(false);
        for offset in 0x30..=0x33 {
            cfg.write(0, offset, 0xFF);
        }
        assert_eq!(cfg.expansion_rom_bar(), 0);
    }

    #[test]
    fn expansion_rom_bar_masks_with_rom() {
        let mut cfg = config(true);
        cfg.write(0, 0x30, 0xFF);
        cfg.write(0, 0x31, 0xFF);
        cfg.write(0, 0x32, 0xAB);
        cfg.write(0, 0x33, 0xCD);
        assert_eq!(cfg.read(0, 0x30), 0x01);
        assert_eq!(cfg.read(0, 0x31), 0xFC);
        assert_eq!(cfg.expansion_rom_bar(), 0xCDAB_FC01);
    }

    #[test]
    fn interrupt_line_write_latches() {
        let mut cfg = config(false);
        cfg.write(0, PCI_INTERRUPT_LINE_OFFSET, 0x0B);
        assert_eq!(cfg.read(0, PCI_INTERRUPT_LINE_OFFSET), 0x0B);
        assert_eq!(cfg.interrupt_line(), 0x0B);
    }

    #[test]
    fn other_bytes_are_plain_read_write() {
        let mut cfg = config(false);
        cfg.write(0, 0x14, 0x12);
        cfg.write(0, 0x0D, 0x40);
        cfg.write(0, 0xFF, 0x99);
        assert_eq!(cfg.read(0, 0x14), 0x12);
        assert_eq!(cfg.read(0, 0x0D), 0x40);
        assert_eq!(cfg.read(0, 0xFF), 0x99);
    }
}
