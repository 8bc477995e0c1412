// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot sequence: read persisted state, stage the application into AXI
//! SRAM, validate the staged vector table, and hand over the CPU.
//!
//! The section table is the staging authority. The metadata record is read
//! first purely as a boot report; a damaged record is logged and otherwise
//! ignored, while a damaged section table halts the boot. There is no
//! fallback to the other slot: the table describes exactly one image.

use flipside_common::error::BootError;
use flipside_common::layout::{flash_offset, METADATA_ADDR, SECTION_TABLE_ADDR};
use flipside_common::metadata::{FirmwareMetadata, METADATA_SIZE};
use flipside_common::section_table::{
    CopyOp, SectionTable, VectorWords, SECTION_TABLE_MAX_BYTES, VECTOR_TABLE_SECTION,
};
use flipside_common::store::FlashStore;

/// Scratch granularity for flash-to-RAM staging copies.
const COPY_CHUNK: usize = 4096;

/// Run the boot sequence. Returns only by halting: on success the CPU
/// belongs to the application.
pub fn run(store: &mut impl FlashStore) -> ! {
    if let Err(e) = try_boot(store) {
        defmt::println!("boot failed: {}", e);
    }
    halt()
}

fn try_boot(store: &mut impl FlashStore) -> Result<(), BootError> {
    report_metadata(store);

    let table = read_section_table(store)?;
    defmt::println!("section table: {} sections", table.records().len());

    let vector = table
        .find(VECTOR_TABLE_SECTION)
        .ok_or(BootError::SectionNotFound(VECTOR_TABLE_SECTION))?;

    let plan = table.copy_plan();
    unsafe { stage_sections(store, &plan)? };

    let words = unsafe { read_vector_words(vector.vma) };
    words.validate()?;

    defmt::println!(
        "handoff: vtor=0x{:08x} sp=0x{:08x} entry=0x{:08x}",
        vector.vma,
        words.sp,
        words.entry
    );
    unsafe { execute_cold_jump(vector.vma, words) }
}

/// Log what the persisted record says should be running. The record has no
/// say in staging, so a bad one is only reported.
fn report_metadata(store: &mut impl FlashStore) {
    let mut buf = [0u8; METADATA_SIZE as usize];
    if store.read(flash_offset(METADATA_ADDR), &mut buf).is_err() {
        defmt::println!("metadata: unreadable");
        return;
    }
    match FirmwareMetadata::from_bytes(&buf) {
        Some(meta) => match meta.validate() {
            Ok(()) => defmt::println!(
                "metadata: slot {} firmware {=str} ({} components)",
                meta.slot(),
                meta.firmware_version(),
                meta.component_count
            ),
            Err(e) => defmt::println!("metadata: invalid ({})", e),
        },
        None => defmt::println!("metadata: unreadable"),
    }
}

fn read_section_table(store: &mut impl FlashStore) -> Result<SectionTable, BootError> {
    let mut blob = [0u8; SECTION_TABLE_MAX_BYTES];
    store.read(flash_offset(SECTION_TABLE_ADDR), &mut blob)?;
    SectionTable::parse(&blob)
}

/// Execute the staging plan against raw RAM.
///
/// # Safety
/// The plan's VMAs must lie in memory nothing live occupies. The linker
/// script keeps the whole bootloader out of AXI SRAM, so a plan built from
/// a validated section table only touches memory the application owns.
unsafe fn stage_sections(store: &mut impl FlashStore, plan: &[CopyOp]) -> Result<(), BootError> {
    for op in plan {
        match *op {
            CopyOp::Zero { vma, size } => {
                defmt::println!("zero  0x{:08x} ({} bytes)", vma, size);
                core::ptr::write_bytes(vma as *mut u8, 0, size as usize);
            }
            CopyOp::Copy {
                flash_offset,
                vma,
                size,
            } => {
                defmt::println!("stage 0x{:06x} -> 0x{:08x} ({} bytes)", flash_offset, vma, size);
                copy_region(store, flash_offset, vma, size)?;
            }
        }
    }
    cortex_m::asm::dsb();
    Ok(())
}

/// Copy one flash region to RAM through a bounded scratch buffer.
unsafe fn copy_region(
    store: &mut impl FlashStore,
    offset: u32,
    vma: u32,
    size: u32,
) -> Result<(), BootError> {
    let mut scratch = [0u8; COPY_CHUNK];
    let mut done = 0u32;
    while done < size {
        let n = ((size - done) as usize).min(COPY_CHUNK);
        store.read(offset + done, &mut scratch[..n])?;
        core::ptr::copy_nonoverlapping(scratch.as_ptr(), (vma + done) as *mut u8, n);
        done += n as u32;
    }
    Ok(())
}

/// First two words of the staged vector table.
unsafe fn read_vector_words(vma: u32) -> VectorWords {
    let ptr = vma as *const u32;
    VectorWords {
        sp: ptr.read_volatile(),
        entry: ptr.offset(1).read_volatile(),
    }
}

/// Hand the CPU to the staged application, never to return.
///
/// The register sequence approximates a cold reset as closely as software
/// can: SysTick stopped, thread mode privileged on MSP, every NVIC line
/// disabled and acknowledged, MPU off, VTOR redirected, MSP reloaded from
/// the staged table.
///
/// # Safety
/// `vtor` must point at a staged vector table whose first two words passed
/// [`VectorWords::validate`]. Nothing may rely on interrupts or SysTick
/// after this is called.
unsafe fn execute_cold_jump(vtor: u32, words: VectorWords) -> ! {
    const SYST_CSR: *mut u32 = 0xE000_E010 as *mut u32;
    const SYST_RVR: *mut u32 = 0xE000_E014 as *mut u32;
    const SYST_CVR: *mut u32 = 0xE000_E018 as *mut u32;
    // Cortex-M7 exposes 8 words of ICER/ICPR.
    const NVIC_ICER: *mut u32 = 0xE000_E180 as *mut u32;
    const NVIC_ICPR: *mut u32 = 0xE000_E280 as *mut u32;
    const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;
    const MPU_CTRL: *mut u32 = 0xE000_ED94 as *mut u32;

    SYST_CSR.write_volatile(0);
    SYST_RVR.write_volatile(0);
    SYST_CVR.write_volatile(0);

    // Thread mode privileged, MSP selected, matching the reset state.
    core::arch::asm!("msr CONTROL, {0}", "isb", in(reg) 0u32);

    cortex_m::interrupt::disable();

    for i in 0..8 {
        NVIC_ICER.add(i).write_volatile(0xFFFF_FFFF);
        NVIC_ICPR.add(i).write_volatile(0xFFFF_FFFF);
    }

    // The application sets up its own regions.
    MPU_CTRL.write_volatile(0);

    SCB_VTOR.write_volatile(vtor);
    cortex_m::asm::dsb();
    cortex_m::asm::isb();

    core::arch::asm!(
        "msr msp, {sp}",
        "dsb",
        "isb",
        "bx {entry}",
        sp = in(reg) words.sp,
        // Thumb bit forced on the entry address.
        entry = in(reg) words.entry | 1,
        options(noreturn)
    );
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfe();
    }
}
