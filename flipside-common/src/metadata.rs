// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Persisted firmware metadata record.
//!
//! A single fixed-size, CRC32-protected record describes which slot is active
//! and where each firmware component lives. It is written by
//! [`FirmwareManager::complete_upgrade_session`](crate::manager::FirmwareManager)
//! and read back by both the application and the bootloader, so the layout
//! below is a wire format: `#[repr(C)]`, little-endian scalars, explicit
//! padding, no implicit layout.
//!
//! Binary layout (1280 bytes total):
//!
//! | offset | field                  | type                 |
//! |--------|------------------------|----------------------|
//! | 0      | magic                  | u32 (`"HBOX"`)       |
//! | 4      | version_major/minor    | u8 + u8 + 2 pad      |
//! | 8      | metadata_size          | u32                  |
//! | 12     | firmware_version       | [u8; 32]             |
//! | 44     | target_slot            | u8 + 3 pad           |
//! | 48     | build_timestamp        | u32                  |
//! | 52     | build_date             | [u8; 20]             |
//! | 72     | device_model           | [u8; 32]             |
//! | 104    | hardware_version       | u32                  |
//! | 108    | bootloader_min_version | u32                  |
//! | 112    | component_count        | u32                  |
//! | 116    | components             | [FirmwareComponent; 8] |
//! | 980    | firmware_hash          | [u8; 32]             |
//! | 1012   | signature              | [u8; 64]             |
//! | 1076   | signature_algorithm    | u32                  |
//! | 1080   | _reserved              | [u8; 196]            |
//! | 1276   | metadata_crc32         | u32                  |
//!
//! The CRC32 covers every byte of the record except the CRC field itself.

use crc::{Crc, CRC_32_ISO_HDLC};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::error::MetadataError;
use crate::layout::{
    component_address, ComponentType, Slot, BOOTLOADER_VERSION, DEVICE_MODEL, HARDWARE_VERSION,
};

// --- Format constants ---

/// `"HBOX"` in little-endian byte order.
pub const METADATA_MAGIC: u32 = u32::from_le_bytes(*b"HBOX");
pub const METADATA_VERSION_MAJOR: u8 = 1;
pub const METADATA_VERSION_MINOR: u8 = 0;
/// Size of the encoded record. `metadata_size` must carry this value.
pub const METADATA_SIZE: u32 = 1280;
pub const MAX_COMPONENTS: usize = 8;

pub const COMPONENT_NAME_LEN: usize = 32;
pub const COMPONENT_FILE_LEN: usize = 64;
pub const FIRMWARE_VERSION_LEN: usize = 32;
pub const BUILD_DATE_LEN: usize = 20;
pub const DEVICE_MODEL_LEN: usize = 32;

/// Seed 0xFFFFFFFF, reflected polynomial, final XOR 0xFFFFFFFF.
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

const CRC32_OFFSET: usize = core::mem::offset_of!(FirmwareMetadata, metadata_crc32);

/// Copy `value` into a NUL-padded fixed-size string field, truncating if
/// needed. The field is zeroed first so old tails never leak through.
pub fn set_fixed_str(dst: &mut [u8], value: &str) {
    dst.fill(0);
    let n = value.len().min(dst.len());
    dst[..n].copy_from_slice(&value.as_bytes()[..n]);
}

/// Read a NUL-padded fixed-size string field. Invalid UTF-8 reads as `""`.
pub fn fixed_str(buf: &[u8]) -> &str {
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    core::str::from_utf8(&buf[..len]).unwrap_or("")
}

/// One named, independently addressed piece of the firmware image.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct FirmwareComponent {
    pub name: [u8; COMPONENT_NAME_LEN],
    pub file: [u8; COMPONENT_FILE_LEN],
    /// CPU-mapped address of the component in external flash.
    pub address: u32,
    pub size: u32,
    pub active: u8,
    pub _pad: [u8; 3],
}

const _: () = assert!(core::mem::size_of::<FirmwareComponent>() == 108);

impl FirmwareComponent {
    pub fn name(&self) -> &str {
        fixed_str(&self.name)
    }

    pub fn file(&self) -> &str {
        fixed_str(&self.file)
    }

    pub fn is_active(&self) -> bool {
        self.active != 0
    }
}

/// The persisted metadata record. See the module docs for the byte layout.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct FirmwareMetadata {
    pub magic: u32,
    pub version_major: u8,
    pub version_minor: u8,
    pub _pad0: [u8; 2],
    pub metadata_size: u32,
    pub firmware_version: [u8; FIRMWARE_VERSION_LEN],
    /// 0 = slot A, anything else = slot B.
    pub target_slot: u8,
    pub _pad1: [u8; 3],
    /// Unix timestamp of the build, seconds.
    pub build_timestamp: u32,
    pub build_date: [u8; BUILD_DATE_LEN],
    pub device_model: [u8; DEVICE_MODEL_LEN],
    pub hardware_version: u32,
    pub bootloader_min_version: u32,
    pub component_count: u32,
    pub components: [FirmwareComponent; MAX_COMPONENTS],
    /// Whole-image hash. Reserved, currently zeroed.
    pub firmware_hash: [u8; 32],
    /// Signature over the record. Reserved, currently zeroed.
    pub signature: [u8; 64],
    pub signature_algorithm: u32,
    pub _reserved: [u8; 196],
    /// Covers every preceding byte. Always the last field.
    pub metadata_crc32: u32,
}

const _: () = assert!(core::mem::size_of::<FirmwareMetadata>() == METADATA_SIZE as usize);
const _: () = assert!(core::mem::offset_of!(FirmwareMetadata, components) == 116);
const _: () = assert!(core::mem::offset_of!(FirmwareMetadata, firmware_hash) == 980);
const _: () = assert!(CRC32_OFFSET == 1276);

impl FirmwareMetadata {
    /// A canonical record describing a factory device: slot A active, every
    /// known component mapped to its full reserved window, CRC stamped.
    pub fn factory_default() -> Self {
        let mut meta = Self::new_zeroed();
        meta.magic = METADATA_MAGIC;
        meta.version_major = METADATA_VERSION_MAJOR;
        meta.version_minor = METADATA_VERSION_MINOR;
        meta.metadata_size = METADATA_SIZE;
        set_fixed_str(&mut meta.firmware_version, "0.0.0");
        meta.target_slot = Slot::A.index();
        set_fixed_str(&mut meta.device_model, DEVICE_MODEL);
        meta.hardware_version = HARDWARE_VERSION;
        meta.bootloader_min_version = BOOTLOADER_VERSION;
        for ty in ComponentType::ALL {
            meta.add_component(ty.name(), "", component_address(Slot::A, ty), ty.size());
        }
        meta.update_crc32();
        meta
    }

    /// Decode a record from exactly [`METADATA_SIZE`] bytes. Performs no
    /// semantic checks; call [`validate`](Self::validate) afterwards.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        Self::read_from_bytes(buf).ok()
    }

    /// CRC32 over the record with the 4-byte CRC field skipped.
    pub fn compute_crc32(&self) -> u32 {
        let bytes = self.as_bytes();
        let mut digest = CRC32.digest();
        digest.update(&bytes[..CRC32_OFFSET]);
        digest.update(&bytes[CRC32_OFFSET + 4..]);
        digest.finalize()
    }

    pub fn update_crc32(&mut self) {
        self.metadata_crc32 = self.compute_crc32();
    }

    /// Ordered semantic checks, short-circuiting at the first failure.
    ///
    /// The order is part of the contract: a record can carry several defects
    /// at once and callers rely on which one is reported.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.magic != METADATA_MAGIC {
            return Err(MetadataError::InvalidMagic);
        }
        if self.version_major != METADATA_VERSION_MAJOR {
            return Err(MetadataError::InvalidVersion);
        }
        if self.device_model() != DEVICE_MODEL {
            return Err(MetadataError::InvalidDevice);
        }
        if self.hardware_version > HARDWARE_VERSION {
            return Err(MetadataError::InvalidDevice);
        }
        if self.bootloader_min_version > BOOTLOADER_VERSION {
            return Err(MetadataError::InvalidVersion);
        }
        if self.metadata_size != METADATA_SIZE {
            return Err(MetadataError::InvalidVersion);
        }
        if self.metadata_crc32 != self.compute_crc32() {
            return Err(MetadataError::InvalidCrc);
        }
        if self.component_count > MAX_COMPONENTS as u32 {
            return Err(MetadataError::Corrupted);
        }
        Ok(())
    }

    pub fn firmware_version(&self) -> &str {
        fixed_str(&self.firmware_version)
    }

    pub fn set_firmware_version(&mut self, version: &str) {
        set_fixed_str(&mut self.firmware_version, version);
    }

    pub fn build_date(&self) -> &str {
        fixed_str(&self.build_date)
    }

    pub fn set_build_date(&mut self, date: &str) {
        set_fixed_str(&mut self.build_date, date);
    }

    pub fn device_model(&self) -> &str {
        fixed_str(&self.device_model)
    }

    pub fn slot(&self) -> Slot {
        Slot::from_index(self.target_slot)
    }

    pub fn set_slot(&mut self, slot: Slot) {
        self.target_slot = slot.index();
    }

    /// The populated prefix of the component arena.
    pub fn components(&self) -> &[FirmwareComponent] {
        let n = (self.component_count as usize).min(MAX_COMPONENTS);
        &self.components[..n]
    }

    pub fn component(&self, name: &str) -> Option<&FirmwareComponent> {
        self.components().iter().find(|c| c.name() == name)
    }

    pub fn clear_components(&mut self) {
        self.components = [FirmwareComponent::new_zeroed(); MAX_COMPONENTS];
        self.component_count = 0;
    }

    /// Append a component to the arena. Fails once all slots are taken.
    /// Does not restamp the CRC.
    pub fn add_component(&mut self, name: &str, file: &str, address: u32, size: u32) -> bool {
        let idx = self.component_count as usize;
        if idx >= MAX_COMPONENTS {
            return false;
        }
        let entry = &mut self.components[idx];
        set_fixed_str(&mut entry.name, name);
        set_fixed_str(&mut entry.file, file);
        entry.address = address;
        entry.size = size;
        entry.active = 1;
        self.component_count += 1;
        true
    }
}
