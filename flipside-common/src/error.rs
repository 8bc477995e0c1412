// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Error taxonomies for metadata validation, upgrade sessions, flash access,
//! and the bootloader.

/// Metadata record rejection reasons, in the order `validate` checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MetadataError {
    InvalidMagic,
    InvalidVersion,
    InvalidDevice,
    InvalidCrc,
    Corrupted,
}

/// Upgrade session failures.
///
/// Chunk and completion failures (everything past the id/state checks) also
/// drive the live session to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    NoActiveSession,
    SessionIdMismatch,
    SessionNotActive,
    ComponentNotFound,
    InvalidAddress,
    ChecksumMismatch,
    WriteFailed,
    VerifyFailed,
    IncompleteComponents,
    IntegrityCheckFailed,
}

/// Failures at the external flash boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// The requested range does not fit the part.
    OutOfBounds,
    /// The operation is not available on this store (e.g. writes through
    /// the read-only XIP window).
    Unsupported,
    /// The device reported a failure.
    Device,
}

/// Failures while loading or persisting the metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    Flash(FlashError),
    Invalid(MetadataError),
    /// Verify-after-write found the named field differing from what was
    /// just written.
    Readback(&'static str),
}

impl From<FlashError> for StoreError {
    fn from(err: FlashError) -> Self {
        StoreError::Flash(err)
    }
}

impl From<MetadataError> for StoreError {
    fn from(err: MetadataError) -> Self {
        StoreError::Invalid(err)
    }
}

/// Bootloader-side failures. Every one of these halts the boot; there is no
/// automatic fallback to the other slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootError {
    /// The section table header or records do not decode.
    BadSectionTable,
    /// A required section is missing from the table.
    SectionNotFound(&'static str),
    /// The initial stack pointer does not point into stack RAM.
    InvalidStackPointer(u32),
    /// The reset vector does not point into the execution RAM region.
    InvalidEntryPoint(u32),
    Flash(FlashError),
}

impl From<FlashError> for BootError {
    fn from(err: FlashError) -> Self {
        BootError::Flash(err)
    }
}
