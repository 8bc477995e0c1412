// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations.
//!
//! `manifest` and `inspect` work on the persisted metadata record,
//! `sections` turns an `objdump -h` listing into the section-table blob the
//! bootloader stages from, and `chunks` produces a chunk pack: a
//! postcard-encoded `Vec<ChunkFrame>` the transport replays into an upgrade
//! session one frame at a time.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use zerocopy::IntoBytes;

use flipside_common::metadata::{BUILD_DATE_LEN, COMPONENT_NAME_LEN, FIRMWARE_VERSION_LEN};
use flipside_common::section_table::{MAX_SECTIONS, VECTOR_TABLE_SECTION};
use flipside_common::{
    component_address, ChunkFrame, ComponentType, FirmwareChunk, FirmwareMetadata, SectionRecord,
    SectionTable, Slot, MAX_CHUNK_SIZE, METADATA_SIZE, SESSION_ID_LEN,
};

fn parse_slot(slot: u8) -> Result<Slot> {
    if slot > 1 {
        bail!("Invalid slot: must be 0 (A) or 1 (B)");
    }
    Ok(Slot::from_index(slot))
}

/// Copy `value` into a fixed-capacity transport string.
fn fixed<const N: usize>(value: &str, what: &str) -> Result<heapless::String<N>> {
    heapless::String::try_from(value)
        .map_err(|_| anyhow!("{} longer than {} bytes: {:?}", what, N, value))
}

/// Build a metadata record for a slot from component binaries.
pub fn manifest(
    version: &str,
    build_date: &str,
    slot: u8,
    application: Option<&Path>,
    webresources: Option<&Path>,
    adc_mapping: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let slot = parse_slot(slot)?;
    if version.len() > FIRMWARE_VERSION_LEN {
        bail!("Version string longer than {} bytes", FIRMWARE_VERSION_LEN);
    }
    if build_date.len() > BUILD_DATE_LEN {
        bail!("Build date longer than {} bytes", BUILD_DATE_LEN);
    }

    let inputs = [
        (ComponentType::Application, application),
        (ComponentType::WebResources, webresources),
        (ComponentType::AdcMapping, adc_mapping),
    ];
    if inputs.iter().all(|(_, path)| path.is_none()) {
        bail!("No component files given (need --application, --webresources or --adc-mapping)");
    }

    let mut meta = FirmwareMetadata::factory_default();
    meta.clear_components();
    meta.set_firmware_version(version);
    meta.set_build_date(build_date);
    meta.set_slot(slot);
    meta.build_timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?
        .as_secs() as u32;

    for (ty, path) in inputs {
        let Some(path) = path else { continue };
        let len = fs::metadata(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
            .len();
        if len > u64::from(ty.size()) {
            bail!(
                "{}: {} bytes does not fit the {} window ({} bytes)",
                path.display(),
                len,
                ty.name(),
                ty.size()
            );
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("{}: unusable file name", path.display()))?;
        meta.add_component(ty.name(), file_name, component_address(slot, ty), len as u32);
    }
    meta.update_crc32();

    fs::write(output, meta.as_bytes())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Firmware {} for slot {:?}, {} component(s):",
        version, slot, meta.component_count
    );
    for c in meta.components() {
        println!(
            "  {:<14} {:>9} bytes @ 0x{:08x}  {}",
            c.name(),
            c.size,
            c.address,
            c.file()
        );
    }
    println!();
    println!(
        "Wrote {} ({} bytes, CRC32 0x{:08x})",
        output.display(),
        METADATA_SIZE,
        meta.metadata_crc32
    );

    Ok(())
}

/// Decode, validate and print a metadata record.
pub fn inspect(file: &Path) -> Result<()> {
    let raw = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    if raw.len() != METADATA_SIZE as usize {
        bail!(
            "{}: expected a {}-byte record, got {} bytes",
            file.display(),
            METADATA_SIZE,
            raw.len()
        );
    }
    let meta = FirmwareMetadata::from_bytes(&raw)
        .with_context(|| format!("{}: record does not decode", file.display()))?;

    println!("Metadata record {}:", file.display());
    println!("  Magic:       0x{:08x}", meta.magic);
    println!("  Format:      {}.{}", meta.version_major, meta.version_minor);
    println!("  Firmware:    {}", meta.firmware_version());
    println!("  Slot:        {:?}", meta.slot());
    println!(
        "  Built:       {} (timestamp {})",
        meta.build_date(),
        meta.build_timestamp
    );
    println!(
        "  Device:      {} (hw {})",
        meta.device_model(),
        meta.hardware_version
    );
    println!("  Bootloader:  min {}", meta.bootloader_min_version);
    println!("  Components:  {}", meta.component_count);
    for c in meta.components() {
        println!(
            "    {:<14} {:>9} bytes @ 0x{:08x}  {}",
            c.name(),
            c.size,
            c.address,
            c.file()
        );
    }

    match meta.validate() {
        Ok(()) => println!("  Status:      valid"),
        Err(e) => bail!("{}: validation failed: {:?}", file.display(), e),
    }

    Ok(())
}

/// Extract the section table from a linked application ELF.
pub fn sections(elf: &Path, output: &Path, objdump: &str) -> Result<()> {
    let listing = Command::new(objdump)
        .arg("-h")
        .arg(elf)
        .output()
        .with_context(|| format!("Failed to run {}", objdump))?;
    if !listing.status.success() {
        bail!(
            "{} -h {} failed:\n{}",
            objdump,
            elf.display(),
            String::from_utf8_lossy(&listing.stderr)
        );
    }
    let stdout = String::from_utf8_lossy(&listing.stdout);

    let mut table = SectionTable::new();
    for line in stdout.lines() {
        let Some(record) = parse_header_line(line) else {
            continue;
        };
        if !table.push(record) {
            bail!("{}: more than {} sections", elf.display(), MAX_SECTIONS);
        }
    }
    if table.records().is_empty() {
        bail!("{}: no sections found in objdump output", elf.display());
    }
    if table.find(VECTOR_TABLE_SECTION).is_none() {
        bail!(
            "{}: no {} section (not a linked application image?)",
            elf.display(),
            VECTOR_TABLE_SECTION
        );
    }

    let blob = table.encode();
    fs::write(output, &blob).with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Sections found:");
    for r in table.records() {
        println!(
            "  {}: size=0x{:08x}, VMA=0x{:08x}, LMA=0x{:08x}",
            r.name(),
            r.size,
            r.vma,
            r.lma
        );
    }
    println!();
    println!(
        "Wrote {} ({} bytes, {} sections)",
        output.display(),
        blob.len(),
        table.records().len()
    );

    Ok(())
}

/// Parse one `objdump -h` section row.
///
/// A row is `Idx Name Size VMA LMA File-off Algn`. Rows whose name is not
/// `.` followed by `[A-Za-z0-9_]+` are skipped (`.ARM.extab` and friends
/// never reach the table), as are the attribute lines objdump prints under
/// each section.
fn parse_header_line(line: &str) -> Option<SectionRecord> {
    let mut fields = line.split_whitespace();
    let idx = fields.next()?;
    if !idx.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let name = fields.next()?;
    let rest = name.strip_prefix('.')?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return None;
    }
    let size = u32::from_str_radix(fields.next()?, 16).ok()?;
    let vma = u32::from_str_radix(fields.next()?, 16).ok()?;
    let lma = u32::from_str_radix(fields.next()?, 16).ok()?;
    Some(SectionRecord::new(name, size, vma, lma))
}

/// Split a component binary into a checksummed chunk pack.
pub fn chunks(file: &Path, component: &str, slot: u8, session: &str, output: &Path) -> Result<()> {
    let slot = parse_slot(slot)?;
    let Some(ty) = ComponentType::from_name(component) else {
        bail!(
            "Unknown component {:?} (expected application, webresources or adc_mapping)",
            component
        );
    };

    let data = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    if data.is_empty() {
        bail!("{} is empty", file.display());
    }
    if data.len() as u64 > u64::from(ty.size()) {
        bail!(
            "{}: {} bytes does not fit the {} window ({} bytes)",
            file.display(),
            data.len(),
            ty.name(),
            ty.size()
        );
    }

    let session_id = fixed::<SESSION_ID_LEN>(session, "Session id")?;
    let component_name = fixed::<COMPONENT_NAME_LEN>(ty.name(), "Component name")?;
    let base = component_address(slot, ty);
    let total = data.len().div_ceil(MAX_CHUNK_SIZE) as u32;

    println!("Component: {} ({} bytes, {} chunks)", ty.name(), data.len(), total);
    println!("Target:    slot {:?} @ 0x{:08x}", slot, base);
    println!("Session:   {}", session);
    println!();

    let pb = ProgressBar::new(data.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let mut frames = Vec::with_capacity(total as usize);
    for (index, part) in data.chunks(MAX_CHUNK_SIZE).enumerate() {
        let address = base + (index * MAX_CHUNK_SIZE) as u32;
        let chunk =
            FirmwareChunk::new(index as u32, total, address, part).context("Chunk too large")?;
        frames.push(ChunkFrame {
            session_id: session_id.clone(),
            component: component_name.clone(),
            chunk,
        });
        pb.inc(part.len() as u64);
    }
    pb.finish();

    let pack = postcard::to_stdvec(&frames).context("Failed to encode chunk pack")?;
    fs::write(output, &pack).with_context(|| format!("Failed to write {}", output.display()))?;

    println!();
    println!(
        "Wrote {} ({} frames, {} bytes)",
        output.display(),
        frames.len(),
        pack.len()
    );

    Ok(())
}
