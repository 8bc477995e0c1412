// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Abstract byte-addressable external flash.
//!
//! All offsets here are flash-relative, not CPU-mapped: callers translate XIP
//! addresses with [`flash_offset`](crate::layout::flash_offset) first. Writes
//! assume the target range was erased beforehand; the store never erases on
//! its own.

use crate::error::FlashError;

/// Value a freshly erased byte reads as.
pub const ERASED_BYTE: u8 = 0xFF;

/// Scratch size for chunked read-back comparisons.
const VERIFY_CHUNK_SIZE: usize = 256;

pub trait FlashStore {
    fn read(&mut self, offset: u32, dst: &mut [u8]) -> Result<(), FlashError>;

    /// Program `src` at `offset`. The range must be erased.
    fn write(&mut self, offset: u32, src: &[u8]) -> Result<(), FlashError>;

    /// Erase `len` bytes starting at `offset`; both are expected to be
    /// sector-aligned.
    fn erase_range(&mut self, offset: u32, len: u32) -> Result<(), FlashError>;

    fn capacity(&self) -> u32;

    /// Read `offset..offset + expected.len()` back and compare against
    /// `expected` through a bounded scratch buffer.
    fn verify_region(&mut self, offset: u32, expected: &[u8]) -> Result<bool, FlashError> {
        let mut scratch = [0u8; VERIFY_CHUNK_SIZE];
        let mut done = 0usize;
        while done < expected.len() {
            let n = (expected.len() - done).min(VERIFY_CHUNK_SIZE);
            self.read(offset + done as u32, &mut scratch[..n])?;
            if scratch[..n] != expected[done..done + n] {
                return Ok(false);
            }
            done += n;
        }
        Ok(true)
    }
}

impl<F: FlashStore + ?Sized> FlashStore for &mut F {
    fn read(&mut self, offset: u32, dst: &mut [u8]) -> Result<(), FlashError> {
        (**self).read(offset, dst)
    }

    fn write(&mut self, offset: u32, src: &[u8]) -> Result<(), FlashError> {
        (**self).write(offset, src)
    }

    fn erase_range(&mut self, offset: u32, len: u32) -> Result<(), FlashError> {
        (**self).erase_range(offset, len)
    }

    fn capacity(&self) -> u32 {
        (**self).capacity()
    }
}

/// In-memory NOR-style store for host tests and tooling.
///
/// Programming clears bits like the real part, so writing over unerased
/// flash leaves data that a read-back comparison will catch. The `fail_*`
/// switches make the corresponding operation report [`FlashError::Device`],
/// and `corrupt_writes` flips one bit of each write after programming.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MemFlash {
    mem: Vec<u8>,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub fail_erases: bool,
    pub corrupt_writes: bool,
}

#[cfg(feature = "std")]
impl MemFlash {
    /// A fully erased store of `capacity` bytes.
    pub fn new(capacity: u32) -> Self {
        Self {
            mem: vec![ERASED_BYTE; capacity as usize],
            fail_reads: false,
            fail_writes: false,
            fail_erases: false,
            corrupt_writes: false,
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.mem
    }

    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, FlashError> {
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(FlashError::OutOfBounds)?;
        if end > self.mem.len() {
            return Err(FlashError::OutOfBounds);
        }
        Ok(start..end)
    }
}

#[cfg(feature = "std")]
impl FlashStore for MemFlash {
    fn read(&mut self, offset: u32, dst: &mut [u8]) -> Result<(), FlashError> {
        if self.fail_reads {
            return Err(FlashError::Device);
        }
        let range = self.range(offset, dst.len())?;
        dst.copy_from_slice(&self.mem[range]);
        Ok(())
    }

    fn write(&mut self, offset: u32, src: &[u8]) -> Result<(), FlashError> {
        if self.fail_writes {
            return Err(FlashError::Device);
        }
        let range = self.range(offset, src.len())?;
        for (cell, &b) in self.mem[range].iter_mut().zip(src) {
            *cell &= b;
        }
        if self.corrupt_writes && !src.is_empty() {
            self.mem[offset as usize] ^= 0x01;
        }
        Ok(())
    }

    fn erase_range(&mut self, offset: u32, len: u32) -> Result<(), FlashError> {
        if self.fail_erases {
            return Err(FlashError::Device);
        }
        let range = self.range(offset, len as usize)?;
        self.mem[range].fill(ERASED_BYTE);
        Ok(())
    }

    fn capacity(&self) -> u32 {
        self.mem.len() as u32
    }
}
