// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Unit tests for the section table codec and the RAM staging plan.

use flipside_common::error::BootError;
use flipside_common::section_table::{
    CopyOp, SectionRecord, SectionTable, VectorWords, MAX_SECTIONS, SECTION_RECORD_SIZE,
    SECTION_TABLE_MAX_BYTES,
};

/// Layout of a representative application build: sections in link order,
/// LMAs in slot A, VMAs in AXI SRAM, stack in DTCM.
fn make_table() -> SectionTable {
    let mut table = SectionTable::new();
    table.push(SectionRecord::new(".isr_vector", 0x298, 0x2400_0000, 0x9000_0000));
    table.push(SectionRecord::new(".text", 0x4_2000, 0x2400_0298, 0x9000_0298));
    table.push(SectionRecord::new(".rodata", 0x8000, 0x2404_2298, 0x9004_2298));
    table.push(SectionRecord::new(".init_array", 0x8, 0x2404_A298, 0x9004_A298));
    table.push(SectionRecord::new(".fini_array", 0x4, 0x2404_A2A0, 0x9004_A2A0));
    table.push(SectionRecord::new(".data", 0x1200, 0x2404_A2A4, 0x9004_A2A4));
    table.push(SectionRecord::new(".bss", 0x3400, 0x2404_B4A4, 0x2404_B4A4));
    table.push(SectionRecord::new("._user_heap_stack", 0x600, 0x2404_E8A4, 0x2404_E8A4));
    table
}

// =============================================================================
// Codec tests
// =============================================================================

#[test]
fn test_encode_parse_round_trip() {
    let table = make_table();
    let blob = table.encode();
    let parsed = SectionTable::parse(&blob).unwrap();
    assert_eq!(parsed, table);
}

#[test]
fn test_encode_layout() {
    let table = make_table();
    let blob = table.encode();
    assert_eq!(blob.len(), 4 + table.records().len() * SECTION_RECORD_SIZE);
    // Count header, little-endian.
    assert_eq!(blob[0], table.records().len() as u8);
    assert_eq!(&blob[1..4], &[0, 0, 0]);
    // First record starts with its NUL-padded name.
    assert_eq!(&blob[4..15], b".isr_vector");
    assert_eq!(blob[15], 0);
}

#[test]
fn test_parse_rejects_short_buffer() {
    assert_eq!(
        SectionTable::parse(&[0x01, 0x00]),
        Err(BootError::BadSectionTable)
    );
}

#[test]
fn test_parse_rejects_absurd_count() {
    let mut blob = vec![0u8; SECTION_TABLE_MAX_BYTES];
    blob[..4].copy_from_slice(&u32::MAX.to_le_bytes());
    assert_eq!(SectionTable::parse(&blob), Err(BootError::BadSectionTable));

    blob[..4].copy_from_slice(&(MAX_SECTIONS as u32 + 1).to_le_bytes());
    assert_eq!(SectionTable::parse(&blob), Err(BootError::BadSectionTable));
}

#[test]
fn test_parse_rejects_truncated_records() {
    let table = make_table();
    let blob = table.encode();
    assert_eq!(
        SectionTable::parse(&blob[..blob.len() - 1]),
        Err(BootError::BadSectionTable)
    );
}

#[test]
fn test_parse_empty_table() {
    let table = SectionTable::parse(&0u32.to_le_bytes()).unwrap();
    assert!(table.records().is_empty());
    assert!(table.copy_plan().is_empty());
}

#[test]
fn test_parse_ignores_trailing_bytes() {
    // The flash window is larger than the table; whatever follows the last
    // record must not matter.
    let mut blob = vec![0xFFu8; SECTION_TABLE_MAX_BYTES];
    let encoded = make_table().encode();
    blob[..encoded.len()].copy_from_slice(&encoded);
    let parsed = SectionTable::parse(&blob).unwrap();
    assert_eq!(parsed, make_table());
}

#[test]
fn test_push_caps_at_max_sections() {
    let mut table = SectionTable::new();
    for i in 0..MAX_SECTIONS {
        assert!(table.push(SectionRecord::new(".text", 4, i as u32, i as u32)));
    }
    assert!(!table.push(SectionRecord::new(".text", 4, 0, 0)));
}

#[test]
fn test_find_by_name() {
    let table = make_table();
    assert_eq!(table.find(".bss").unwrap().size, 0x3400);
    assert!(table.find(".got").is_none());
}

// =============================================================================
// Copy plan tests
// =============================================================================

#[test]
fn test_copy_plan_zeroes_bss_first() {
    let plan = make_table().copy_plan();
    assert_eq!(
        plan[0],
        CopyOp::Zero {
            vma: 0x2404_B4A4,
            size: 0x3400,
        }
    );
}

#[test]
fn test_copy_plan_follows_table_order() {
    let plan = make_table().copy_plan();
    let copies: Vec<_> = plan
        .iter()
        .filter_map(|op| match op {
            CopyOp::Copy { vma, .. } => Some(*vma),
            _ => None,
        })
        .collect();
    assert_eq!(
        copies,
        [0x2400_0000, 0x2400_0298, 0x2404_2298, 0x2404_A298, 0x2404_A2A0, 0x2404_A2A4]
    );
}

#[test]
fn test_copy_plan_strips_xip_base_from_lma() {
    let plan = make_table().copy_plan();
    match plan[1] {
        CopyOp::Copy { flash_offset, vma, size } => {
            assert_eq!(flash_offset, 0);
            assert_eq!(vma, 0x2400_0000);
            assert_eq!(size, 0x298);
        }
        other => panic!("expected a copy op, got {:?}", other),
    }
}

#[test]
fn test_copy_plan_slot_b_offsets() {
    let mut table = SectionTable::new();
    table.push(SectionRecord::new(".isr_vector", 0x298, 0x2400_0000, 0x902B_0000));
    let plan = table.copy_plan();
    match plan[0] {
        CopyOp::Copy { flash_offset, .. } => assert_eq!(flash_offset, 0x2B_0000),
        other => panic!("expected a copy op, got {:?}", other),
    }
}

#[test]
fn test_copy_plan_skips_empty_and_noncopy_sections() {
    let mut table = SectionTable::new();
    table.push(SectionRecord::new(".text", 0, 0x2400_0000, 0x9000_0000));
    table.push(SectionRecord::new(".ARM.attributes", 0x30, 0, 0));
    table.push(SectionRecord::new("._user_heap_stack", 0x600, 0x2404_0000, 0x2404_0000));
    assert!(table.copy_plan().is_empty());
}

#[test]
fn test_copy_plan_without_bss_has_no_zero_op() {
    let mut table = SectionTable::new();
    table.push(SectionRecord::new(".text", 0x100, 0x2400_0000, 0x9000_0000));
    let plan = table.copy_plan();
    assert_eq!(plan.len(), 1);
    assert!(matches!(plan[0], CopyOp::Copy { .. }));
}

// =============================================================================
// Vector word tests
// =============================================================================

#[test]
fn test_vector_words_accepts_plausible_image() {
    let words = VectorWords {
        sp: 0x2002_0000,
        entry: 0x2400_0299,
    };
    assert_eq!(words.validate(), Ok(()));
}

#[test]
fn test_vector_words_rejects_stack_outside_dtcm() {
    let words = VectorWords {
        sp: 0x2400_8000,
        entry: 0x2400_0299,
    };
    assert_eq!(
        words.validate(),
        Err(BootError::InvalidStackPointer(0x2400_8000))
    );
}

#[test]
fn test_vector_words_rejects_entry_outside_axi_sram() {
    let words = VectorWords {
        sp: 0x2002_0000,
        entry: 0x0800_0199,
    };
    assert_eq!(
        words.validate(),
        Err(BootError::InvalidEntryPoint(0x0800_0199))
    );
}

#[test]
fn test_vector_words_erased_flash_rejected() {
    let words = VectorWords {
        sp: 0xFFFF_FFFF,
        entry: 0xFFFF_FFFF,
    };
    assert!(words.validate().is_err());
}

// =============================================================================
// Record tests
// =============================================================================

#[test]
fn test_record_name_round_trip() {
    let rec = SectionRecord::new(".isr_vector", 0x298, 0x2400_0000, 0x9000_0000);
    assert_eq!(rec.name(), ".isr_vector");
    assert_eq!(rec.size, 0x298);
    assert_eq!(rec.vma, 0x2400_0000);
    assert_eq!(rec.lma, 0x9000_0000);
}
