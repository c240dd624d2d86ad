//! Host-side collaborators: PCI/AGP card attachment and physical-address aperture registration.
//!
//! The device never talks to a concrete emulator; the host implements these traits and the
//! lifecycle manager drives them. Tests substitute in-memory fakes.

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use crate::aperture::ApertureHandler;
use crate::error::HostError;

/// Bus a video card can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusKind {
    Pci,
    Agp,
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pci => f.write_str("PCI"),
            Self::Agp => f.write_str("AGP"),
        }
    }
}

/// Bus/device number assigned by the host on attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PciSlot {
    pub bus: u8,
    pub device: u8,
}

impl PciSlot {
    pub const fn new(bus: u8, device: u8) -> Self {
        Self { bus, device }
    }
}

/// Byte-wide config-space access, called by the host for every config cycle addressed to the card.
pub trait PciConfigFunction {
    fn config_read(&self, function: u8, offset: u8) -> u8;
    fn config_write(&mut self, function: u8, offset: u8, value: u8);
}

pub type SharedPciConfigFunction = Rc<RefCell<dyn PciConfigFunction>>;

pub trait BusAttacher {
    /// Whether the machine profile provides a slot of this kind.
    fn machine_supports_bus(&self, kind: BusKind) -> bool;

    /// Inserts a card; the host keeps `card` to service config cycles.
    fn attach(&mut self, kind: BusKind, card: SharedPciConfigFunction)
        -> Result<PciSlot, HostError>;
}

/// A guest-physical window decoded by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApertureRegion {
    pub base: u64,
    pub size: u64,
}

impl ApertureRegion {
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    pub fn end_exclusive(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub fn contains(&self, paddr: u64) -> bool {
        (self.base..self.end_exclusive()).contains(&paddr)
    }
}

/// Opaque token identifying one host memory mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApertureHandle(pub u32);

pub trait ApertureRegistry {
    fn register_aperture(
        &mut self,
        region: ApertureRegion,
        handler: Box<dyn ApertureHandler>,
    ) -> Result<ApertureHandle, HostError>;

    /// Removes a mapping. Unknown handles are ignored.
    fn unregister_aperture(&mut self, handle: ApertureHandle);
}

/// Everything device init needs from the host.
pub trait HostBus: BusAttacher + ApertureRegistry {}

impl<T: BusAttacher + ApertureRegistry + ?Sized> HostBus for T {}
