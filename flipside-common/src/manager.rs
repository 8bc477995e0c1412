// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Upgrade orchestration: metadata ownership and the chunk-upload session.
//!
//! [`FirmwareManager`] owns the single in-memory [`FirmwareMetadata`] cache
//! and at most one live [`UpgradeSession`]. It is an explicitly constructed
//! service object: callers hold it by reference, tests build one per case
//! against a fake [`FlashStore`] and [`Clock`].
//!
//! Session state machine:
//!
//! ```text
//! Active -> Completed   all components complete, integrity scan ok,
//!                       metadata written and verified
//! Active -> Failed      chunk validation/write/verify failure, or the
//!                       completion write failed
//! Active -> Aborted     explicit abort, superseded by a new session,
//!                       or older than the session timeout
//! ```
//!
//! All three outcomes are terminal. Terminal sessions are reclaimed by a
//! cleanup pass that runs at the top of every public entry point, so no
//! background timer is involved.

use crate::chunk::{FirmwareChunk, SESSION_ID_LEN};
use crate::error::{FlashError, SessionError, StoreError};
use crate::layout::{
    address_in_slot, component_address, flash_offset, ComponentType, Slot, BOOTLOADER_VERSION,
    DEVICE_MODEL, HARDWARE_VERSION, METADATA_ADDR, SLOT_SIZE, UPGRADE_SESSION_TIMEOUT_MS,
};
use crate::metadata::{
    set_fixed_str, FirmwareMetadata, COMPONENT_NAME_LEN, MAX_COMPONENTS, METADATA_SIZE,
};
use crate::store::{FlashStore, ERASED_BYTE};
use zerocopy::FromZeros;

/// Bytes of the application image sampled by the completion integrity scan.
const INTEGRITY_SCAN_LEN: usize = 256;

/// Monotonic millisecond time source for session aging.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<C: Clock> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
    Aborted,
}

/// Per-component upload accounting within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentProgress {
    pub name: heapless::String<COMPONENT_NAME_LEN>,
    /// Chunks expected in total. Zero until the first chunk announces it.
    pub total_chunks: u32,
    pub received_chunks: u32,
    /// Declared component size from the manifest.
    pub total_size: u32,
    pub received_size: u32,
    /// Address as declared by the manifest. Informational only; chunk
    /// targets are validated against the slot window, not against this.
    pub address: u32,
    pub completed: bool,
}

impl ComponentProgress {
    /// Chunk-completion percentage, capped at 100.
    pub fn percent(&self) -> u8 {
        if self.completed {
            return 100;
        }
        if self.total_chunks == 0 {
            return 0;
        }
        ((self.received_chunks * 100) / self.total_chunks).min(100) as u8
    }
}

/// Transient state of one chunked upload. Owned exclusively by the manager
/// and stack-resident; there is never more than one.
#[derive(Debug, Clone)]
pub struct UpgradeSession {
    pub(crate) id: heapless::String<SESSION_ID_LEN>,
    pub(crate) status: SessionStatus,
    /// Verbatim copy of the client-supplied manifest. Identity and address
    /// fields in it are never trusted; completion rebuilds them.
    pub(crate) manifest: FirmwareMetadata,
    pub(crate) target_slot: Slot,
    /// Expiry is measured from this, not from the last chunk: a session has
    /// a fixed total lifetime regardless of how busy it is.
    pub(crate) created_at_ms: u32,
    pub(crate) components: heapless::Vec<ComponentProgress, MAX_COMPONENTS>,
    pub(crate) progress_percent: u8,
}

impl UpgradeSession {
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn target_slot(&self) -> Slot {
        self.target_slot
    }

    pub fn created_at_ms(&self) -> u32 {
        self.created_at_ms
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn components(&self) -> &[ComponentProgress] {
        &self.components
    }

    pub fn component(&self, name: &str) -> Option<&ComponentProgress> {
        self.components.iter().find(|c| c.name.as_str() == name)
    }

    /// Unweighted average of per-component percentages. Deliberately not
    /// size-weighted so the figure is reproducible from chunk counts alone.
    fn aggregate_progress(&self) -> u8 {
        if self.components.is_empty() {
            return 0;
        }
        let sum: u32 = self.components.iter().map(|c| c.percent() as u32).sum();
        (sum / self.components.len() as u32) as u8
    }
}

/// Owner of the persisted metadata and broker of the single upgrade session.
pub struct FirmwareManager<F, C> {
    flash: F,
    clock: C,
    metadata: FirmwareMetadata,
    metadata_loaded: bool,
    session: Option<UpgradeSession>,
}

impl<F: FlashStore, C: Clock> FirmwareManager<F, C> {
    /// A fresh manager with a factory-default metadata cache. Nothing is
    /// read from flash until [`load_metadata_from_flash`] is called.
    ///
    /// [`load_metadata_from_flash`]: Self::load_metadata_from_flash
    pub fn new(flash: F, clock: C) -> Self {
        Self {
            flash,
            clock,
            metadata: FirmwareMetadata::factory_default(),
            metadata_loaded: false,
            session: None,
        }
    }

    /// Read and validate the persisted record.
    ///
    /// Failure is recoverable: the manager keeps its previous cache, reports
    /// `metadata_loaded() == false` and [`current_slot`](Self::current_slot)
    /// falls back to slot A.
    pub fn load_metadata_from_flash(&mut self) -> Result<(), StoreError> {
        let mut buf = [0u8; METADATA_SIZE as usize];
        match self.flash.read(flash_offset(METADATA_ADDR), &mut buf) {
            Ok(()) => {}
            Err(e) => {
                self.metadata_loaded = false;
                return Err(e.into());
            }
        }
        let meta = match FirmwareMetadata::from_bytes(&buf) {
            Some(m) => m,
            None => {
                self.metadata_loaded = false;
                return Err(StoreError::Readback("record size"));
            }
        };
        if let Err(e) = meta.validate() {
            self.metadata_loaded = false;
            return Err(e.into());
        }
        self.metadata = meta;
        self.metadata_loaded = true;
        Ok(())
    }

    /// Restamp the CRC, persist the cached record and verify the write by
    /// reading it back field by field.
    pub fn save_metadata_to_flash(&mut self) -> Result<(), StoreError> {
        self.metadata.update_crc32();
        Self::write_and_verify(&mut self.flash, &self.metadata)
    }

    /// Persist a factory-default record. Intended for first-boot
    /// provisioning or recovery from an unreadable metadata sector.
    pub fn initialize_default_metadata(&mut self) -> Result<(), StoreError> {
        self.metadata = FirmwareMetadata::factory_default();
        self.metadata_loaded = true;
        self.save_metadata_to_flash()
    }

    /// The slot the metadata currently describes as active. Defaults to
    /// slot A while no valid metadata has been loaded.
    pub fn current_slot(&self) -> Slot {
        if self.metadata_loaded {
            self.metadata.slot()
        } else {
            Slot::A
        }
    }

    /// Ping-pong target: always the slot opposite the active one, so an
    /// upgrade never overwrites the running image.
    pub fn target_upgrade_slot(&self) -> Slot {
        self.current_slot().opposite()
    }

    /// Erase a whole slot. Establishes the precondition
    /// [`create_upgrade_session`](Self::create_upgrade_session) relies on.
    pub fn erase_slot(&mut self, slot: Slot) -> Result<(), FlashError> {
        self.flash.erase_range(flash_offset(slot.base()), SLOT_SIZE)
    }

    /// Open a new upload session, superseding any existing one.
    ///
    /// Last-writer-wins: a live session is marked Aborted and freed rather
    /// than rejecting the new one. Component counters start at zero from the
    /// manifest's declared sizes; chunk counts are adopted from the first
    /// chunk of each component.
    ///
    /// The target slot is not erased here. Callers must have erased it
    /// (see [`erase_slot`](Self::erase_slot)) before sending chunks.
    pub fn create_upgrade_session(
        &mut self,
        session_id: &str,
        manifest: &FirmwareMetadata,
    ) -> Result<(), SessionError> {
        self.cleanup_expired_sessions();
        if let Some(old) = self.session.as_mut() {
            if old.status == SessionStatus::Active {
                old.status = SessionStatus::Aborted;
            }
            self.session = None;
        }

        let target_slot = self.target_upgrade_slot();

        let mut components = heapless::Vec::new();
        for c in manifest.components() {
            let progress = ComponentProgress {
                name: truncated(c.name()),
                total_chunks: 0,
                received_chunks: 0,
                total_size: c.size,
                received_size: 0,
                address: c.address,
                completed: false,
            };
            // Capacity matches the manifest arena, push cannot fail.
            let _ = components.push(progress);
        }

        self.session = Some(UpgradeSession {
            id: truncated(session_id),
            status: SessionStatus::Active,
            manifest: *manifest,
            target_slot,
            created_at_ms: self.clock.now_ms(),
            components,
            progress_percent: 0,
        });
        Ok(())
    }

    /// Verify and persist one chunk.
    ///
    /// Order of checks: active session and id match, component known,
    /// target address inside the target slot, SHA-256 matches, flash write,
    /// read-back comparison. Only then do the counters advance. Any check
    /// after the id match marks the session Failed; there is no partial
    /// accept and no internal retry.
    pub fn process_firmware_chunk(
        &mut self,
        session_id: &str,
        component_name: &str,
        chunk: &FirmwareChunk,
    ) -> Result<(), SessionError> {
        self.cleanup_expired_sessions();

        let session = match self.session.as_mut() {
            Some(s) => s,
            None => return Err(SessionError::NoActiveSession),
        };
        if session.id.as_str() != session_id {
            return Err(SessionError::SessionIdMismatch);
        }
        if session.status != SessionStatus::Active {
            return Err(SessionError::SessionNotActive);
        }

        let idx = match session
            .components
            .iter()
            .position(|c| c.name.as_str() == component_name)
        {
            Some(i) => i,
            None => {
                session.status = SessionStatus::Failed;
                return Err(SessionError::ComponentNotFound);
            }
        };

        let len = chunk.data.len() as u32;
        let start_ok = address_in_slot(chunk.target_address, session.target_slot);
        let end_ok = len == 0
            || chunk
                .target_address
                .checked_add(len - 1)
                .is_some_and(|end| address_in_slot(end, session.target_slot));
        if !start_ok || !end_ok {
            session.status = SessionStatus::Failed;
            return Err(SessionError::InvalidAddress);
        }

        if !chunk.verify_checksum() {
            session.status = SessionStatus::Failed;
            return Err(SessionError::ChecksumMismatch);
        }

        let offset = flash_offset(chunk.target_address);
        if self.flash.write(offset, &chunk.data).is_err() {
            session.status = SessionStatus::Failed;
            return Err(SessionError::WriteFailed);
        }
        match self.flash.verify_region(offset, &chunk.data) {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                session.status = SessionStatus::Failed;
                return Err(SessionError::VerifyFailed);
            }
        }

        let comp = &mut session.components[idx];
        if comp.total_chunks == 0 {
            comp.total_chunks = chunk.total_chunks;
        }
        comp.received_chunks += 1;
        comp.received_size += chunk.chunk_size;
        if comp.total_chunks > 0 && comp.received_chunks >= comp.total_chunks {
            comp.completed = true;
        }

        session.progress_percent = session.aggregate_progress();
        Ok(())
    }

    /// Commit the upload: this is the slot switch.
    ///
    /// Requires every component complete, samples the start of the written
    /// application image against blank flash, then rebuilds the metadata
    /// from the session manifest with canonical identity fields and
    /// resolver-computed addresses and persists it. The only durable state
    /// change is that single metadata write, so a failure anywhere leaves
    /// the device booting the previous slot.
    pub fn complete_upgrade_session(&mut self, session_id: &str) -> Result<(), SessionError> {
        self.cleanup_expired_sessions();

        let session = match self.session.as_mut() {
            Some(s) => s,
            None => return Err(SessionError::NoActiveSession),
        };
        if session.id.as_str() != session_id {
            return Err(SessionError::SessionIdMismatch);
        }
        if session.status != SessionStatus::Active {
            return Err(SessionError::SessionNotActive);
        }
        // Not a failure state: the caller may still be sending chunks.
        if session.components.iter().any(|c| !c.completed) {
            return Err(SessionError::IncompleteComponents);
        }

        // Best-effort scan: rejects the "nothing was written" case, nothing
        // stronger. Per-chunk SHA-256 already vouched for the content.
        let scan_addr = component_address(session.target_slot, ComponentType::Application);
        let mut head = [0u8; INTEGRITY_SCAN_LEN];
        let scan_ok = self
            .flash
            .read(flash_offset(scan_addr), &mut head)
            .is_ok()
            && head.iter().any(|&b| b != ERASED_BYTE);
        if !scan_ok {
            session.status = SessionStatus::Failed;
            return Err(SessionError::IntegrityCheckFailed);
        }

        let meta = match Self::rebuild_metadata(&session.manifest, session.target_slot) {
            Ok(m) => m,
            Err(e) => {
                session.status = SessionStatus::Failed;
                return Err(e);
            }
        };

        match Self::write_and_verify(&mut self.flash, &meta) {
            Ok(()) => {
                session.status = SessionStatus::Completed;
                self.metadata = meta;
                self.metadata_loaded = true;
                Ok(())
            }
            Err(StoreError::Flash(_)) => {
                session.status = SessionStatus::Failed;
                Err(SessionError::WriteFailed)
            }
            Err(_) => {
                session.status = SessionStatus::Failed;
                Err(SessionError::VerifyFailed)
            }
        }
    }

    /// Mark the session Aborted and free it immediately.
    pub fn abort_upgrade_session(&mut self, session_id: &str) -> Result<(), SessionError> {
        self.cleanup_expired_sessions();

        let session = match self.session.as_mut() {
            Some(s) => s,
            None => return Err(SessionError::NoActiveSession),
        };
        if session.id.as_str() != session_id {
            return Err(SessionError::SessionIdMismatch);
        }
        session.status = SessionStatus::Aborted;
        self.session = None;
        Ok(())
    }

    /// Aggregate progress in percent; 0 for an unknown or mismatched id.
    pub fn upgrade_progress(&mut self, session_id: &str) -> u8 {
        self.cleanup_expired_sessions();
        match self.session.as_ref() {
            Some(s) if s.id.as_str() == session_id => s.progress_percent,
            _ => 0,
        }
    }

    /// Reclaim the session if it is terminal or older than
    /// [`UPGRADE_SESSION_TIMEOUT_MS`]. Runs at the top of every public
    /// entry point.
    pub fn cleanup_expired_sessions(&mut self) {
        let now = self.clock.now_ms();
        let drop_it = match self.session.as_mut() {
            Some(s) if s.status != SessionStatus::Active => true,
            Some(s) if now.wrapping_sub(s.created_at_ms) > UPGRADE_SESSION_TIMEOUT_MS => {
                s.status = SessionStatus::Aborted;
                true
            }
            _ => false,
        };
        if drop_it {
            self.session = None;
        }
    }

    /// Unconditionally drop the session, aborting it first if still active.
    pub fn force_cleanup_session(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.status == SessionStatus::Active {
                session.status = SessionStatus::Aborted;
            }
            self.session = None;
        }
    }

    pub fn metadata(&self) -> &FirmwareMetadata {
        &self.metadata
    }

    pub fn metadata_loaded(&self) -> bool {
        self.metadata_loaded
    }

    pub fn session(&self) -> Option<&UpgradeSession> {
        self.session.as_ref()
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Canonical record for a finished upload. Identity and compatibility
    /// fields come from the running device, component addresses from the
    /// resolver; only version strings, timestamps, file names and sizes are
    /// taken from the manifest.
    fn rebuild_metadata(
        manifest: &FirmwareMetadata,
        target_slot: Slot,
    ) -> Result<FirmwareMetadata, SessionError> {
        use crate::metadata::{METADATA_MAGIC, METADATA_VERSION_MAJOR, METADATA_VERSION_MINOR};

        let mut meta = FirmwareMetadata::new_zeroed();
        meta.magic = METADATA_MAGIC;
        meta.version_major = METADATA_VERSION_MAJOR;
        meta.version_minor = METADATA_VERSION_MINOR;
        meta.metadata_size = METADATA_SIZE;
        meta.firmware_version = manifest.firmware_version;
        meta.set_slot(target_slot);
        meta.build_timestamp = manifest.build_timestamp;
        meta.build_date = manifest.build_date;
        set_fixed_str(&mut meta.device_model, DEVICE_MODEL);
        meta.hardware_version = HARDWARE_VERSION;
        meta.bootloader_min_version = BOOTLOADER_VERSION;
        for c in manifest.components() {
            let ty = ComponentType::from_name(c.name())
                .ok_or(SessionError::ComponentNotFound)?;
            meta.add_component(c.name(), c.file(), component_address(target_slot, ty), c.size);
        }
        meta.update_crc32();
        Ok(meta)
    }

    /// Write a record and read it back, comparing the fields the record is
    /// trusted for one by one. A mismatch is reported without retry.
    fn write_and_verify(flash: &mut F, meta: &FirmwareMetadata) -> Result<(), StoreError> {
        use zerocopy::IntoBytes;

        let offset = flash_offset(METADATA_ADDR);
        flash.erase_range(offset, crate::layout::FLASH_SECTOR_SIZE)?;
        flash.write(offset, meta.as_bytes())?;

        let mut buf = [0u8; METADATA_SIZE as usize];
        flash.read(offset, &mut buf)?;
        let read = match FirmwareMetadata::from_bytes(&buf) {
            Some(m) => m,
            None => return Err(StoreError::Readback("record size")),
        };

        if read.magic != meta.magic {
            return Err(StoreError::Readback("magic"));
        }
        if read.version_major != meta.version_major || read.version_minor != meta.version_minor {
            return Err(StoreError::Readback("format version"));
        }
        if read.metadata_size != meta.metadata_size {
            return Err(StoreError::Readback("record size"));
        }
        if read.firmware_version != meta.firmware_version {
            return Err(StoreError::Readback("firmware version"));
        }
        if read.target_slot != meta.target_slot {
            return Err(StoreError::Readback("target slot"));
        }
        if read.device_model != meta.device_model {
            return Err(StoreError::Readback("device model"));
        }
        if read.hardware_version != meta.hardware_version {
            return Err(StoreError::Readback("hardware version"));
        }
        if read.component_count != meta.component_count {
            return Err(StoreError::Readback("component count"));
        }
        if read.metadata_crc32 != meta.metadata_crc32 {
            return Err(StoreError::Readback("crc32"));
        }
        for (got, want) in read.components().iter().zip(meta.components()) {
            if got.name != want.name {
                return Err(StoreError::Readback("component name"));
            }
            if got.address != want.address {
                return Err(StoreError::Readback("component address"));
            }
            if got.size != want.size {
                return Err(StoreError::Readback("component size"));
            }
            if got.active != want.active {
                return Err(StoreError::Readback("component active flag"));
            }
        }
        Ok(())
    }
}

/// Copy into a bounded string, truncating at a char boundary.
fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
