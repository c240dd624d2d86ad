//! Device lifecycle: building the reset image, attaching to the host bus, mapping apertures and
//! the VBIOS, and tearing all of it down again.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::aperture::{ApertureMappings, FRAMEBUFFER_BASE, MMIO_BASE};
use crate::bus::{BusKind, HostBus, PciSlot};
use crate::config::DeviceContext;
use crate::config_space::{
    DgVoodooConfigSpace, PciClassCode, PciSubsystemIds, PciVendorDeviceId, PCI_BAR0_OFFSET,
    PCI_BAR1_OFFSET, PCI_COMMAND_OFFSET, PCI_EXPANSION_ROM_OFFSET, PCI_HEADER_TYPE_OFFSET,
    PCI_INTERRUPT_PIN_OFFSET, PCI_STATUS_CAPABILITIES_LIST, PCI_STATUS_DEVSEL_MEDIUM,
    PCI_STATUS_FAST_BACK_TO_BACK, PCI_STATUS_OFFSET,
};
use crate::error::DeviceError;
use crate::registry::{DeviceOption, GpuPreset};
use crate::rom::{ExpansionRom, RomImage, EXPANSION_ROM_BAR_RESET};
use crate::wrapper::WrapperManager;

/// COMMAND at reset: I/O and memory decoding enabled.
pub const RESET_COMMAND: u16 = 0x0003;
pub const RESET_STATUS: u16 =
    PCI_STATUS_CAPABILITIES_LIST | PCI_STATUS_FAST_BACK_TO_BACK | PCI_STATUS_DEVSEL_MEDIUM;
/// Interrupt line programmed at reset, before firmware routes the card.
pub const RESET_INTERRUPT_LINE: u8 = 0x01;
/// INTA#.
pub const INTERRUPT_PIN_INTA: u8 = 0x01;

pub type SharedConfigSpace = Rc<RefCell<DgVoodooConfigSpace>>;

/// Builds the reset config-space image for `preset`.
pub fn build_config_space(preset: &GpuPreset, rom_present: bool) -> DgVoodooConfigSpace {
    let mut cfg = DgVoodooConfigSpace::new(
        PciVendorDeviceId {
            vendor_id: preset.vendor_id,
            device_id: preset.device_id,
        },
        rom_present,
    );

    cfg.set_u16(PCI_COMMAND_OFFSET, RESET_COMMAND);
    cfg.set_u16(PCI_STATUS_OFFSET, RESET_STATUS);
    cfg.set_class_code(PciClassCode {
        class: preset.class,
        subclass: preset.subclass,
        prog_if: 0,
        revision_id: preset.revision,
    });
    cfg.set_u8(PCI_HEADER_TYPE_OFFSET, 0x00);

    cfg.set_u32(PCI_BAR0_OFFSET, FRAMEBUFFER_BASE as u32);
    cfg.set_u32(PCI_BAR1_OFFSET, MMIO_BASE as u32);

    cfg.set_subsystem_ids(PciSubsystemIds {
        subsystem_vendor_id: preset.vendor_id,
        subsystem_id: preset.device_id,
    });

    if rom_present {
        cfg.set_u32(PCI_EXPANSION_ROM_OFFSET, EXPANSION_ROM_BAR_RESET);
    }

    cfg.set_interrupt_line(RESET_INTERRUPT_LINE);
    cfg.set_u8(PCI_INTERRUPT_PIN_OFFSET, INTERRUPT_PIN_INTA);
    cfg
}

/// Picks the bus to attach to: AGP only when both requested and available.
pub fn choose_bus<H: HostBus + ?Sized>(use_agp: bool, host: &H) -> BusKind {
    if use_agp && host.machine_supports_bus(BusKind::Agp) {
        BusKind::Agp
    } else {
        if use_agp {
            tracing::debug!("machine has no AGP slot; attaching as PCI");
        }
        BusKind::Pci
    }
}

/// One attached DgVoodoo2 video card.
#[derive(Debug)]
pub struct DgVoodooDevice {
    preset: &'static GpuPreset,
    bus_kind: BusKind,
    slot: PciSlot,
    config: SharedConfigSpace,
    memory_size_bytes: u64,
    apertures: ApertureMappings,
    rom: Option<ExpansionRom>,
}

impl DgVoodooDevice {
    /// Creates the card from the preset currently active in `ctx`.
    ///
    /// The first successful init in a process also installs the external wrapper files.
    pub fn init<H: HostBus + ?Sized>(
        ctx: &DeviceContext,
        host: &mut H,
        wrappers: &mut WrapperManager,
    ) -> Result<Self, DeviceError> {
        let preset = ctx.active_preset();
        let rom_image = ctx.active_rom_path().and_then(|path| RomImage::load(&path));

        let config = Rc::new(RefCell::new(build_config_space(preset, rom_image.is_some())));

        let memory_size_bytes = preset.memory_size_bytes();
        let apertures = ApertureMappings::map(host, memory_size_bytes)?;

        let rom = match rom_image {
            Some(image) => match ExpansionRom::map(host, image) {
                Ok(rom) => Some(rom),
                Err(err) => {
                    apertures.unmap(host);
                    return Err(err.into());
                }
            },
            None => None,
        };

        // Attach last: once the host holds the card, nothing below can fail.
        let bus_kind = choose_bus(ctx.config().use_agp, host);
        let slot = match host.attach(bus_kind, config.clone()) {
            Ok(slot) => slot,
            Err(err) => {
                if let Some(rom) = rom {
                    rom.unmap(host);
                }
                apertures.unmap(host);
                return Err(err.into());
            }
        };
        tracing::info!(
            gpu = preset.name,
            bus = %bus_kind,
            bus_number = slot.bus,
            device = slot.device,
            "attached DgVoodoo2 video card"
        );

        wrappers.install_once(ctx.config());

        Ok(Self {
            preset,
            bus_kind,
            slot,
            config,
            memory_size_bytes,
            apertures,
            rom,
        })
    }

    /// Unmaps the apertures and ROM, removes installed wrapper files and drops the card.
    pub fn close<H: HostBus + ?Sized>(self, host: &mut H, wrappers: &WrapperManager) {
        self.apertures.unmap(host);
        if let Some(rom) = self.rom {
            rom.unmap(host);
        }
        wrappers.remove_installed();
        tracing::debug!(gpu = self.preset.name, "closed DgVoodoo2 video card");
    }

    pub fn preset(&self) -> &'static GpuPreset {
        self.preset
    }

    pub fn bus_kind(&self) -> BusKind {
        self.bus_kind
    }

    pub fn slot(&self) -> PciSlot {
        self.slot
    }

    pub fn config(&self) -> Ref<'_, DgVoodooConfigSpace> {
        self.config.borrow()
    }

    pub fn shared_config(&self) -> SharedConfigSpace {
        self.config.clone()
    }

    pub fn config_read(&self, function: u8, offset: u8) -> u8 {
        self.config.borrow().read(function, offset)
    }

    pub fn config_write(&self, function: u8, offset: u8, value: u8) {
        self.config.borrow_mut().write(function, offset, value)
    }

    /// Interrupt line latched from the last config write to `0x3C`.
    pub fn interrupt_line(&self) -> u8 {
        self.config.borrow().interrupt_line()
    }

    pub fn memory_size_bytes(&self) -> u64 {
        self.memory_size_bytes
    }

    pub fn apertures(&self) -> ApertureMappings {
        self.apertures
    }

    pub fn rom(&self) -> Option<&ExpansionRom> {
        self.rom.as_ref()
    }

    pub fn has_rom(&self) -> bool {
        self.rom.is_some()
    }
}

impl DeviceOption {
    /// Selects this option's preset and creates the card.
    pub fn init<H: HostBus + ?Sized>(
        &self,
        ctx: &mut DeviceContext,
        host: &mut H,
        wrappers: &mut WrapperManager,
    ) -> Result<DgVoodooDevice, DeviceError> {
        self.select(ctx);
        DgVoodooDevice::init(ctx, host, wrappers)
    }
}
