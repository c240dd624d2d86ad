use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use dgvoodoo_pci::{
    ApertureHandle, ApertureHandler, ApertureRegion, ApertureRegistry, BusAttacher, BusKind,
    HostError, PciSlot, SharedPciConfigFunction,
};

/// In-memory stand-in for the host emulator's PCI bus and memory mapping layer.
pub struct FakeHost {
    pub agp_slot: bool,
    pub reject_base: Option<u64>,
    pub slots_full: bool,
    pub attached: Vec<(BusKind, PciSlot, SharedPciConfigFunction)>,
    pub apertures: BTreeMap<ApertureHandle, (ApertureRegion, Box<dyn ApertureHandler>)>,
    next_handle: u32,
}

#[allow(dead_code)]
impl FakeHost {
    pub fn new(agp_slot: bool) -> Self {
        Self {
            agp_slot,
            reject_base: None,
            slots_full: false,
            attached: Vec::new(),
            apertures: BTreeMap::new(),
            next_handle: 1,
        }
    }

    pub fn regions(&self) -> Vec<ApertureRegion> {
        self.apertures.values().map(|(region, _)| *region).collect()
    }

    fn handler_at(&mut self, paddr: u64) -> &mut Box<dyn ApertureHandler> {
        self.apertures
            .values_mut()
            .find(|(region, _)| region.contains(paddr))
            .map(|(_, handler)| handler)
            .unwrap_or_else(|| panic!("no aperture decodes 0x{paddr:x}"))
    }

    pub fn read_u8(&mut self, paddr: u64) -> u8 {
        self.handler_at(paddr).read_u8(paddr)
    }

    pub fn read_u16(&mut self, paddr: u64) -> u16 {
        self.handler_at(paddr).read_u16(paddr)
    }

    pub fn read_u32(&mut self, paddr: u64) -> u32 {
        self.handler_at(paddr).read_u32(paddr)
    }

    pub fn write_u8(&mut self, paddr: u64, val: u8) {
        self.handler_at(paddr).write_u8(paddr, val)
    }

    pub fn write_u16(&mut self, paddr: u64, val: u16) {
        self.handler_at(paddr).write_u16(paddr, val)
    }

    pub fn write_u32(&mut self, paddr: u64, val: u32) {
        self.handler_at(paddr).write_u32(paddr, val)
    }

    /// Config read as the host bus would issue it, through the card it was handed on attach.
    pub fn config_read(&self, card: usize, function: u8, offset: u8) -> u8 {
        self.attached[card].2.borrow().config_read(function, offset)
    }

    pub fn config_write(&self, card: usize, function: u8, offset: u8, value: u8) {
        self.attached[card]
            .2
            .borrow_mut()
            .config_write(function, offset, value)
    }
}

impl BusAttacher for FakeHost {
    fn machine_supports_bus(&self, kind: BusKind) -> bool {
        match kind {
            BusKind::Pci => true,
            BusKind::Agp => self.agp_slot,
        }
    }

    fn attach(
        &mut self,
        kind: BusKind,
        card: SharedPciConfigFunction,
    ) -> Result<PciSlot, HostError> {
        if self.slots_full {
            return Err(HostError::NoFreeSlot { kind });
        }
        let slot = match kind {
            BusKind::Agp => PciSlot::new(1, 0),
            BusKind::Pci => PciSlot::new(0, 0x10 + self.attached.len() as u8),
        };
        self.attached.push((kind, slot, card));
        Ok(slot)
    }
}

impl ApertureRegistry for FakeHost {
    fn register_aperture(
        &mut self,
        region: ApertureRegion,
        handler: Box<dyn ApertureHandler>,
    ) -> Result<ApertureHandle, HostError> {
        if self.reject_base == Some(region.base) {
            return Err(HostError::ApertureConflict {
                base: region.base,
                size: region.size,
            });
        }
        let handle = ApertureHandle(self.next_handle);
        self.next_handle += 1;
        self.apertures.insert(handle, (region, handler));
        Ok(handle)
    }

    fn unregister_aperture(&mut self, handle: ApertureHandle) {
        self.apertures.remove(&handle);
    }
}

/// Writes a small VBIOS-looking image to `root/rel`.
#[allow(dead_code)]
pub fn write_rom(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut image = vec![0u8; 0x200];
    image[0] = 0x55;
    image[1] = 0xAA;
    image[2] = 0x40;
    fs::write(path, image).unwrap();
}
