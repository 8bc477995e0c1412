// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Bootloader section table.
//!
//! A build step extracts the application's section layout into a small blob
//! stored at [`SECTION_TABLE_ADDR`](crate::layout::SECTION_TABLE_ADDR):
//! a `u32` section count followed by fixed 44-byte records
//! `{name[32], size, vma, lma}`, all little-endian. The bootloader turns it
//! into a [`CopyOp`] plan: zero `.bss`, then copy each loadable section from
//! its flash LMA to its RAM VMA before jumping to the application.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::BootError;
use crate::metadata::{fixed_str, set_fixed_str};

pub const SECTION_NAME_LEN: usize = 32;
pub const MAX_SECTIONS: usize = 64;
pub const SECTION_RECORD_SIZE: usize = 44;
/// Encoded size of a full table: count word plus all records.
pub const SECTION_TABLE_MAX_LEN: usize = 4 + MAX_SECTIONS * SECTION_RECORD_SIZE;
/// Fixed window the bootloader reads from flash for the table blob.
pub const SECTION_TABLE_MAX_BYTES: usize = 8192;
/// Zero op for `.bss` plus one copy op per record.
pub const MAX_COPY_OPS: usize = MAX_SECTIONS + 1;

const _: () = assert!(SECTION_TABLE_MAX_LEN <= SECTION_TABLE_MAX_BYTES);

pub const BSS_SECTION: &str = ".bss";
pub const VECTOR_TABLE_SECTION: &str = ".isr_vector";
/// Sections the bootloader stages into RAM, in link order.
pub const COPY_SECTIONS: [&str; 6] = [
    ".isr_vector",
    ".text",
    ".rodata",
    ".init_array",
    ".fini_array",
    ".data",
];

/// Section LMAs are CPU-mapped QSPI addresses; the low 28 bits are the
/// flash-relative offset.
pub const LMA_OFFSET_MASK: u32 = 0x0FFF_FFFF;

/// High-byte prefix a plausible initial stack pointer carries (DTCM RAM).
pub const SP_REGION_PREFIX: u32 = 0x2000_0000;
/// High-byte prefix a plausible entry point carries (AXI SRAM, where the
/// application executes after staging).
pub const ENTRY_REGION_PREFIX: u32 = 0x2400_0000;
pub const REGION_PREFIX_MASK: u32 = 0xFF00_0000;

/// One section as recorded by the build step.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SectionRecord {
    pub name: [u8; SECTION_NAME_LEN],
    pub size: u32,
    /// Execution address (RAM).
    pub vma: u32,
    /// Storage address (CPU-mapped flash).
    pub lma: u32,
}

const _: () = assert!(core::mem::size_of::<SectionRecord>() == SECTION_RECORD_SIZE);

impl SectionRecord {
    pub fn new(name: &str, size: u32, vma: u32, lma: u32) -> Self {
        let mut name_buf = [0u8; SECTION_NAME_LEN];
        set_fixed_str(&mut name_buf, name);
        Self {
            name: name_buf,
            size,
            vma,
            lma,
        }
    }

    pub fn name(&self) -> &str {
        fixed_str(&self.name)
    }
}

/// Parsed section table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTable {
    records: heapless::Vec<SectionRecord, MAX_SECTIONS>,
}

/// One step of the staging plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOp {
    /// Zero-fill `vma..vma + size` in RAM.
    Zero { vma: u32, size: u32 },
    /// Copy `size` bytes from flash at `flash_offset` to `vma`.
    Copy { flash_offset: u32, vma: u32, size: u32 },
}

impl SectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a table blob. Rejects implausible counts and short buffers
    /// rather than reading past the blob.
    pub fn parse(buf: &[u8]) -> Result<Self, BootError> {
        if buf.len() < 4 {
            return Err(BootError::BadSectionTable);
        }
        let count = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if count > MAX_SECTIONS {
            return Err(BootError::BadSectionTable);
        }
        let needed = 4 + count * SECTION_RECORD_SIZE;
        if buf.len() < needed {
            return Err(BootError::BadSectionTable);
        }

        let mut records = heapless::Vec::new();
        for i in 0..count {
            let off = 4 + i * SECTION_RECORD_SIZE;
            let rec = SectionRecord::read_from_bytes(&buf[off..off + SECTION_RECORD_SIZE])
                .map_err(|_| BootError::BadSectionTable)?;
            // Capacity checked against count above.
            let _ = records.push(rec);
        }
        Ok(Self { records })
    }

    pub fn encode(&self) -> heapless::Vec<u8, SECTION_TABLE_MAX_LEN> {
        let mut out = heapless::Vec::new();
        let _ = out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        for rec in &self.records {
            let _ = out.extend_from_slice(rec.as_bytes());
        }
        out
    }

    pub fn push(&mut self, record: SectionRecord) -> bool {
        self.records.push(record).is_ok()
    }

    pub fn records(&self) -> &[SectionRecord] {
        &self.records
    }

    pub fn find(&self, name: &str) -> Option<&SectionRecord> {
        self.records.iter().find(|r| r.name() == name)
    }

    /// Staging plan: `.bss` zeroed first, then every copyable section in
    /// table order. Empty sections are skipped.
    pub fn copy_plan(&self) -> heapless::Vec<CopyOp, MAX_COPY_OPS> {
        let mut plan = heapless::Vec::new();
        if let Some(bss) = self.find(BSS_SECTION) {
            if bss.size > 0 {
                let _ = plan.push(CopyOp::Zero {
                    vma: bss.vma,
                    size: bss.size,
                });
            }
        }
        for rec in self.records() {
            if rec.size == 0 || !COPY_SECTIONS.contains(&rec.name()) {
                continue;
            }
            let _ = plan.push(CopyOp::Copy {
                flash_offset: rec.lma & LMA_OFFSET_MASK,
                vma: rec.vma,
                size: rec.size,
            });
        }
        plan
    }
}

/// First two words of a vector table: initial stack pointer and reset
/// handler address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorWords {
    pub sp: u32,
    pub entry: u32,
}

impl VectorWords {
    /// Plausibility check before a jump: the stack pointer must sit in DTCM
    /// and the entry point in AXI SRAM. A Thumb bit on the entry address is
    /// tolerated by the prefix mask.
    pub fn validate(&self) -> Result<(), BootError> {
        if self.sp & REGION_PREFIX_MASK != SP_REGION_PREFIX {
            return Err(BootError::InvalidStackPointer(self.sp));
        }
        if self.entry & REGION_PREFIX_MASK != ENTRY_REGION_PREFIX {
            return Err(BootError::InvalidEntryPoint(self.entry));
        }
        Ok(())
    }
}
