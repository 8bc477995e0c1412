// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Shared dual-slot firmware upgrade logic for the HBox controller board.
//!
//! Everything the application and the bootloader must agree on lives here:
//! the external flash map, the persisted metadata record, the chunked
//! transfer format, and the upgrade session state machine. The crate is
//! `no_std` by default; the `std` feature is for host-side tooling and
//! tests.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod chunk;
pub mod error;
pub mod layout;
pub mod manager;
pub mod metadata;
pub mod section_table;
pub mod store;

pub use chunk::{
    decode_frame, encode_frame, sha256_hex, ChunkFrame, FirmwareChunk, MAX_CHUNK_SIZE,
    MAX_FRAME_LEN, SESSION_ID_LEN,
};
pub use error::{BootError, FlashError, MetadataError, SessionError, StoreError};
pub use layout::{
    address_in_slot, component_address, component_size, flash_offset, ComponentType, Slot,
    EXTERNAL_FLASH_BASE, EXTERNAL_FLASH_SIZE, FLASH_SECTOR_SIZE, METADATA_ADDR,
    SECTION_TABLE_ADDR, SLOT_A_BASE, SLOT_B_BASE, SLOT_SIZE, UPGRADE_SESSION_TIMEOUT_MS,
};
pub use manager::{Clock, ComponentProgress, FirmwareManager, SessionStatus, UpgradeSession};
pub use metadata::{
    FirmwareComponent, FirmwareMetadata, MAX_COMPONENTS, METADATA_MAGIC, METADATA_SIZE,
};
pub use section_table::{
    CopyOp, SectionRecord, SectionTable, VectorWords, SECTION_TABLE_MAX_BYTES,
};
#[cfg(feature = "std")]
pub use store::MemFlash;
pub use store::{FlashStore, ERASED_BYTE};
