// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash map and slot address resolution for the HBox board.
//!
//! The external 8 MiB QSPI flash is memory-mapped (XIP) at `0x9000_0000`.
//! It holds two firmware slots (A/B), the persisted metadata record, and the
//! bootloader section table. All mapping here is pure constant lookup.

use serde::{Deserialize, Serialize};

// --- External flash map (CPU-mapped addresses) ---

pub const EXTERNAL_FLASH_BASE: u32 = 0x9000_0000;
pub const EXTERNAL_FLASH_SIZE: u32 = 8 * 1024 * 1024; // W25Q64, 8MB

pub const FLASH_SECTOR_SIZE: u32 = 4096;
pub const FLASH_PAGE_SIZE: u32 = 256;

pub const SLOT_SIZE: u32 = 0x002B_0000; // 2752KB per slot
pub const SLOT_A_BASE: u32 = 0x9000_0000;
pub const SLOT_B_BASE: u32 = 0x902B_0000;

/// Persisted metadata record, directly after slot B.
pub const METADATA_ADDR: u32 = 0x9056_0000;
/// Bootloader section table, one sector region after the metadata.
pub const SECTION_TABLE_ADDR: u32 = 0x9057_0000;

// --- Component layout within a slot ---

pub const APPLICATION_OFFSET: u32 = 0x0000_0000;
pub const APPLICATION_SIZE: u32 = 0x0010_0000; // 1MB
pub const WEBRESOURCES_OFFSET: u32 = 0x0010_0000;
pub const WEBRESOURCES_SIZE: u32 = 0x0018_0000; // 1.5MB
pub const ADC_MAPPING_OFFSET: u32 = 0x0028_0000;
pub const ADC_MAPPING_SIZE: u32 = 0x0002_0000; // 128KB

// --- Device identity ---

pub const DEVICE_MODEL: &str = "STM32H750_HBOX";
pub const HARDWARE_VERSION: u32 = 100;
pub const BOOTLOADER_VERSION: u32 = 100;

/// Idle upgrade sessions are reclaimed after this many milliseconds.
pub const UPGRADE_SESSION_TIMEOUT_MS: u32 = 300_000;

/// One of the two firmware slots.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    A,
    B,
}

impl Slot {
    /// The slot an upgrade writes into while this one is running.
    pub fn opposite(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    pub fn base(self) -> u32 {
        match self {
            Slot::A => SLOT_A_BASE,
            Slot::B => SLOT_B_BASE,
        }
    }

    /// Persisted encoding: 0 = A, everything else = B.
    pub fn from_index(index: u8) -> Self {
        if index == 0 {
            Slot::A
        } else {
            Slot::B
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

/// The fixed component kinds a firmware image is made of.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ComponentType {
    Application,
    WebResources,
    AdcMapping,
}

impl ComponentType {
    pub const ALL: [ComponentType; 3] = [
        ComponentType::Application,
        ComponentType::WebResources,
        ComponentType::AdcMapping,
    ];

    /// Component name as carried in metadata records and chunk headers.
    pub fn name(self) -> &'static str {
        match self {
            ComponentType::Application => "application",
            ComponentType::WebResources => "webresources",
            ComponentType::AdcMapping => "adc_mapping",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.name() == name)
    }

    /// Offset of this component from the owning slot's base.
    pub fn slot_offset(self) -> u32 {
        match self {
            ComponentType::Application => APPLICATION_OFFSET,
            ComponentType::WebResources => WEBRESOURCES_OFFSET,
            ComponentType::AdcMapping => ADC_MAPPING_OFFSET,
        }
    }

    /// Size of the flash window reserved for this component.
    pub fn size(self) -> u32 {
        match self {
            ComponentType::Application => APPLICATION_SIZE,
            ComponentType::WebResources => WEBRESOURCES_SIZE,
            ComponentType::AdcMapping => ADC_MAPPING_SIZE,
        }
    }
}

/// CPU-mapped address of a component inside a slot.
pub fn component_address(slot: Slot, ty: ComponentType) -> u32 {
    slot.base() + ty.slot_offset()
}

/// Size of the window reserved for a component (slot-independent).
pub fn component_size(ty: ComponentType) -> u32 {
    ty.size()
}

/// Whether a CPU-mapped address falls inside the given slot's window.
pub fn address_in_slot(address: u32, slot: Slot) -> bool {
    let base = slot.base();
    address >= base && address < base + SLOT_SIZE
}

/// Convert a CPU-mapped XIP address to a flash-relative offset.
pub fn flash_offset(address: u32) -> u32 {
    address - EXTERNAL_FLASH_BASE
}
