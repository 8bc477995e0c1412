// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Unit tests for the persisted metadata record.

use flipside_common::error::MetadataError;
use flipside_common::layout::{component_address, ComponentType, Slot, DEVICE_MODEL};
use flipside_common::metadata::{
    fixed_str, set_fixed_str, FirmwareMetadata, MAX_COMPONENTS, METADATA_MAGIC, METADATA_SIZE,
};
use zerocopy::IntoBytes;

fn make_record() -> FirmwareMetadata {
    let mut meta = FirmwareMetadata::factory_default();
    meta.set_firmware_version("2.1.0");
    meta.set_build_date("2026-08-20");
    meta.build_timestamp = 1_755_648_000;
    meta.update_crc32();
    meta
}

// =============================================================================
// Factory default tests
// =============================================================================

#[test]
fn test_factory_default_is_valid() {
    let meta = FirmwareMetadata::factory_default();
    assert_eq!(meta.validate(), Ok(()));
    assert_eq!(meta.slot(), Slot::A);
    assert_eq!(meta.metadata_size, METADATA_SIZE);
    assert_eq!(meta.device_model(), DEVICE_MODEL);
    assert_eq!(meta.components().len(), 3);
}

#[test]
fn test_factory_default_maps_components_to_slot_a() {
    let meta = FirmwareMetadata::factory_default();
    for ty in ComponentType::ALL {
        let comp = meta.component(ty.name()).unwrap();
        assert_eq!(comp.address, component_address(Slot::A, ty));
        assert_eq!(comp.size, ty.size());
        assert!(comp.is_active());
    }
}

#[test]
fn test_magic_is_hbox_little_endian() {
    assert_eq!(METADATA_MAGIC, 0x584F_4248);
    assert_eq!(METADATA_MAGIC.to_le_bytes(), *b"HBOX");
}

// =============================================================================
// Encoding tests
// =============================================================================

#[test]
fn test_record_is_exactly_metadata_size() {
    let meta = make_record();
    assert_eq!(meta.as_bytes().len(), METADATA_SIZE as usize);
}

#[test]
fn test_round_trip_bytes() {
    let meta = make_record();
    let decoded = FirmwareMetadata::from_bytes(meta.as_bytes()).unwrap();
    assert_eq!(decoded, meta);
    assert_eq!(decoded.validate(), Ok(()));
}

#[test]
fn test_from_bytes_rejects_wrong_length() {
    let meta = make_record();
    let bytes = meta.as_bytes();
    assert!(FirmwareMetadata::from_bytes(&bytes[..bytes.len() - 1]).is_none());
}

#[test]
fn test_crc_is_reproducible() {
    let meta = make_record();
    assert_eq!(meta.compute_crc32(), meta.compute_crc32());
    assert_eq!(meta.metadata_crc32, meta.compute_crc32());
}

#[test]
fn test_crc_tracks_content_changes() {
    let mut meta = make_record();
    let before = meta.metadata_crc32;
    meta.set_firmware_version("2.1.1");
    meta.update_crc32();
    assert_ne!(meta.metadata_crc32, before);
    assert_eq!(meta.validate(), Ok(()));
}

// =============================================================================
// Validation order tests
// =============================================================================

#[test]
fn test_validate_bad_magic() {
    let mut meta = make_record();
    meta.magic = 0xDEAD_BEEF;
    // Magic is checked before anything else, including the CRC.
    assert_eq!(meta.validate(), Err(MetadataError::InvalidMagic));
}

#[test]
fn test_validate_bad_major_version() {
    let mut meta = make_record();
    meta.version_major = 2;
    assert_eq!(meta.validate(), Err(MetadataError::InvalidVersion));
}

#[test]
fn test_validate_minor_version_is_not_checked() {
    let mut meta = make_record();
    meta.version_minor = 9;
    meta.update_crc32();
    assert_eq!(meta.validate(), Ok(()));
}

#[test]
fn test_validate_wrong_device_model() {
    let mut meta = make_record();
    set_fixed_str(&mut meta.device_model, "STM32H750_OTHER");
    meta.update_crc32();
    assert_eq!(meta.validate(), Err(MetadataError::InvalidDevice));
}

#[test]
fn test_validate_hardware_too_new() {
    let mut meta = make_record();
    meta.hardware_version += 1;
    meta.update_crc32();
    assert_eq!(meta.validate(), Err(MetadataError::InvalidDevice));
}

#[test]
fn test_validate_bootloader_too_old() {
    let mut meta = make_record();
    meta.bootloader_min_version += 1;
    meta.update_crc32();
    assert_eq!(meta.validate(), Err(MetadataError::InvalidVersion));
}

#[test]
fn test_validate_wrong_size_field() {
    let mut meta = make_record();
    meta.metadata_size = 1024;
    meta.update_crc32();
    assert_eq!(meta.validate(), Err(MetadataError::InvalidVersion));
}

#[test]
fn test_validate_stale_crc() {
    let mut meta = make_record();
    meta.build_timestamp += 1;
    assert_eq!(meta.validate(), Err(MetadataError::InvalidCrc));
}

#[test]
fn test_validate_component_count_overflow() {
    let mut meta = make_record();
    meta.component_count = MAX_COMPONENTS as u32 + 1;
    meta.update_crc32();
    assert_eq!(meta.validate(), Err(MetadataError::Corrupted));
}

#[test]
fn test_tampered_bytes_fail_crc() {
    let meta = make_record();
    // One flipped bit anywhere outside the identity fields surfaces as a
    // CRC failure.
    for offset in [13usize, 60, 120, 700, 1100] {
        let mut bytes = [0u8; METADATA_SIZE as usize];
        bytes.copy_from_slice(meta.as_bytes());
        bytes[offset] ^= 0x40;
        let tampered = FirmwareMetadata::from_bytes(&bytes).unwrap();
        assert_eq!(tampered.validate(), Err(MetadataError::InvalidCrc));
    }
}

// =============================================================================
// Fixed string tests
// =============================================================================

#[test]
fn test_fixed_str_round_trip() {
    let mut buf = [0u8; 16];
    set_fixed_str(&mut buf, "2.1.0");
    assert_eq!(fixed_str(&buf), "2.1.0");
}

#[test]
fn test_fixed_str_truncates() {
    let mut buf = [0u8; 4];
    set_fixed_str(&mut buf, "longer-than-four");
    assert_eq!(fixed_str(&buf), "long");
}

#[test]
fn test_fixed_str_no_tail_leak() {
    let mut buf = [0u8; 16];
    set_fixed_str(&mut buf, "2.10.44-beta");
    set_fixed_str(&mut buf, "3.0");
    assert_eq!(fixed_str(&buf), "3.0");
    assert!(buf[3..].iter().all(|&b| b == 0));
}

// =============================================================================
// Component arena tests
// =============================================================================

#[test]
fn test_add_component_caps_at_arena_size() {
    let mut meta = FirmwareMetadata::factory_default();
    meta.clear_components();
    for i in 0..MAX_COMPONENTS {
        assert!(meta.add_component("filler", "", 0x9000_0000 + i as u32, 16));
    }
    assert!(!meta.add_component("overflow", "", 0, 16));
    assert_eq!(meta.component_count, MAX_COMPONENTS as u32);
}

#[test]
fn test_component_lookup_by_name() {
    let meta = make_record();
    assert!(meta.component("application").is_some());
    assert!(meta.component("webresources").is_some());
    assert!(meta.component("nonexistent").is_none());
}

#[test]
fn test_clear_components_resets_arena() {
    let mut meta = make_record();
    meta.clear_components();
    assert_eq!(meta.components().len(), 0);
    assert!(meta.component("application").is_none());
}

#[test]
fn test_component_file_names() {
    let mut meta = FirmwareMetadata::factory_default();
    meta.clear_components();
    meta.add_component("application", "firmware_v2.bin", 0x9000_0000, 1024);
    let comp = meta.component("application").unwrap();
    assert_eq!(comp.file(), "firmware_v2.bin");
}

#[test]
fn test_slot_field_encoding() {
    let mut meta = make_record();
    meta.set_slot(Slot::B);
    assert_eq!(meta.target_slot, 1);
    assert_eq!(meta.slot(), Slot::B);
    meta.set_slot(Slot::A);
    assert_eq!(meta.target_slot, 0);
    assert_eq!(meta.slot(), Slot::A);
}
