// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Read-only access to the external QSPI flash through its XIP window.
//!
//! The QSPI controller must be in memory-mapped mode before any of this
//! runs; the startup code leaves it that way. The whole part is then
//! readable with plain loads at `EXTERNAL_FLASH_BASE`. Reads go through
//! volatile accesses so the staging loop always sees the device, and
//! writes and erases are refused outright: the bootloader never modifies
//! the external flash.

use flipside_common::error::FlashError;
use flipside_common::layout::{EXTERNAL_FLASH_BASE, EXTERNAL_FLASH_SIZE};
use flipside_common::store::FlashStore;

#[derive(Default)]
pub struct XipFlash;

impl XipFlash {
    pub fn new() -> Self {
        Self
    }
}

impl FlashStore for XipFlash {
    fn read(&mut self, offset: u32, dst: &mut [u8]) -> Result<(), FlashError> {
        let end = offset
            .checked_add(dst.len() as u32)
            .ok_or(FlashError::OutOfBounds)?;
        if end > EXTERNAL_FLASH_SIZE {
            return Err(FlashError::OutOfBounds);
        }
        let base = (EXTERNAL_FLASH_BASE + offset) as *const u8;
        for (i, byte) in dst.iter_mut().enumerate() {
            *byte = unsafe { base.add(i).read_volatile() };
        }
        Ok(())
    }

    fn write(&mut self, _offset: u32, _src: &[u8]) -> Result<(), FlashError> {
        Err(FlashError::Unsupported)
    }

    fn erase_range(&mut self, _offset: u32, _len: u32) -> Result<(), FlashError> {
        Err(FlashError::Unsupported)
    }

    fn capacity(&self) -> u32 {
        EXTERNAL_FLASH_SIZE
    }
}
