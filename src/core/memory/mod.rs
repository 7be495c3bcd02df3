// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! GS local memory arena
//!
//! Local memory is a flat 4MB array. Every storage mode addresses it through
//! one of four element views:
//!
//! | View    | Unit    | Elements  |
//! |---------|---------|-----------|
//! | words   | 32-bit  | 1M        |
//! | halves  | 16-bit  | 2M        |
//! | bytes   | 8-bit   | 4M        |
//! | nibbles | 4-bit   | 8M        |
//!
//! The backing store is a `Box<[u32]>`, so every narrower view produced with
//! `bytemuck` is correctly aligned. All accessors mask their index into the
//! arena: no coordinate or base pointer can reach outside it.
//!
//! # Example
//!
//! ```
//! use gsvram::core::memory::GsMemory;
//!
//! let mut mem = GsMemory::new();
//! mem.write32(1, 0x11223344);
//!
//! // Views alias the same storage (little-endian element order)
//! assert_eq!(mem.read8(4), 0x44);
//! assert_eq!(mem.read16(3), 0x1122);
//! assert_eq!(mem.read_nibble(9), 0x4);
//! ```

mod pages;
pub mod savestate;

pub use pages::PageSet;

use crate::core::error::{GsError, Result};

/// Local memory size in bytes
pub const MEMORY_SIZE: usize = 4 * 1024 * 1024;

/// Block size in bytes
pub const BLOCK_SIZE: usize = 256;

/// Page size in bytes
pub const PAGE_SIZE: usize = 8192;

const WORDS: usize = MEMORY_SIZE / 4;
const WORD_MASK: usize = WORDS - 1;
const HALF_MASK: usize = MEMORY_SIZE / 2 - 1;
const BYTE_MASK: usize = MEMORY_SIZE - 1;
const NIBBLE_MASK: usize = MEMORY_SIZE * 2 - 1;

/// 4MB GS local memory
#[derive(Clone)]
pub struct GsMemory {
    words: Box<[u32]>,
}

impl GsMemory {
    /// Create zero-filled local memory
    pub fn new() -> Self {
        Self {
            words: vec![0u32; WORDS].into_boxed_slice(),
        }
    }

    /// Zero the whole arena
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// 32-bit view
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    #[inline]
    pub fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }

    /// 16-bit view
    #[inline]
    pub fn halves(&self) -> &[u16] {
        bytemuck::cast_slice(&self.words)
    }

    #[inline]
    pub fn halves_mut(&mut self) -> &mut [u16] {
        bytemuck::cast_slice_mut(&mut self.words)
    }

    /// Byte view
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.words)
    }

    /// Read a word (index in 32-bit units)
    #[inline]
    pub fn read32(&self, addr: u32) -> u32 {
        self.words[addr as usize & WORD_MASK]
    }

    /// Read a halfword (index in 16-bit units)
    #[inline]
    pub fn read16(&self, addr: u32) -> u16 {
        self.halves()[addr as usize & HALF_MASK]
    }

    /// Read a byte
    #[inline]
    pub fn read8(&self, addr: u32) -> u8 {
        self.bytes()[addr as usize & BYTE_MASK]
    }

    /// Read a nibble (index in 4-bit units, even index is the low nibble)
    #[inline]
    pub fn read_nibble(&self, addr: u32) -> u8 {
        let addr = addr as usize & NIBBLE_MASK;
        (self.bytes()[addr >> 1] >> ((addr & 1) << 2)) & 0x0F
    }

    #[inline]
    pub fn write32(&mut self, addr: u32, value: u32) {
        self.words[addr as usize & WORD_MASK] = value;
    }

    /// Replace only the bits of a word selected by `mask`
    #[inline]
    pub fn write32_masked(&mut self, addr: u32, value: u32, mask: u32) {
        let word = &mut self.words[addr as usize & WORD_MASK];
        *word = (*word & !mask) | (value & mask);
    }

    #[inline]
    pub fn write16(&mut self, addr: u32, value: u16) {
        self.halves_mut()[addr as usize & HALF_MASK] = value;
    }

    #[inline]
    pub fn write8(&mut self, addr: u32, value: u8) {
        self.bytes_mut()[addr as usize & BYTE_MASK] = value;
    }

    /// Write a nibble, leaving its neighbour untouched
    #[inline]
    pub fn write_nibble(&mut self, addr: u32, value: u8) {
        let addr = addr as usize & NIBBLE_MASK;
        let shift = (addr & 1) << 2;
        let byte = &mut self.bytes_mut()[addr >> 1];
        *byte = (*byte & !(0x0F << shift)) | ((value & 0x0F) << shift);
    }

    /// Copy raw bytes into memory starting at a byte offset
    ///
    /// Writes past the end wrap to the start of the arena.
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) {
        let bytes = self.bytes_mut();
        let mut offset = offset & BYTE_MASK;
        let mut data = data;
        while !data.is_empty() {
            let n = data.len().min(MEMORY_SIZE - offset);
            bytes[offset..offset + n].copy_from_slice(&data[..n]);
            data = &data[n..];
            offset = 0;
        }
    }

    /// Replace the whole arena with a memory image
    ///
    /// # Errors
    ///
    /// Returns [`GsError::InvalidMemorySize`] unless `image` is exactly 4MB.
    pub fn load_image(&mut self, image: &[u8]) -> Result<()> {
        if image.len() != MEMORY_SIZE {
            return Err(GsError::InvalidMemorySize {
                expected: MEMORY_SIZE,
                got: image.len(),
            });
        }
        self.bytes_mut().copy_from_slice(image);
        Ok(())
    }
}

impl Default for GsMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GsMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GsMemory")
            .field("size", &MEMORY_SIZE)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_memory_is_zeroed() {
        let mem = GsMemory::new();
        assert_eq!(mem.bytes().len(), MEMORY_SIZE);
        assert_eq!(mem.halves().len(), MEMORY_SIZE / 2);
        assert!(mem.words().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_accessors_wrap() {
        let mut mem = GsMemory::new();
        mem.write32(WORDS as u32, 0xDEADBEEF);
        assert_eq!(mem.read32(0), 0xDEADBEEF);

        mem.write8(MEMORY_SIZE as u32 + 5, 0x7F);
        assert_eq!(mem.read8(5), 0x7F);

        mem.write_nibble(u32::MAX, 0xA);
        assert_eq!(mem.read8(BYTE_MASK as u32) >> 4, 0xA);
    }

    #[test]
    fn test_nibble_write_preserves_neighbour() {
        let mut mem = GsMemory::new();
        mem.write8(10, 0x5A);
        mem.write_nibble(20, 0x3);
        assert_eq!(mem.read8(10), 0x53);
        mem.write_nibble(21, 0xC);
        assert_eq!(mem.read8(10), 0xC3);
        assert_eq!(mem.read_nibble(20), 0x3);
        assert_eq!(mem.read_nibble(21), 0xC);
    }

    #[test]
    fn test_masked_write() {
        let mut mem = GsMemory::new();
        mem.write32(7, 0x11223344);
        mem.write32_masked(7, 0xAABBCCDD, 0x00FF_FFFF);
        assert_eq!(mem.read32(7), 0x11BBCCDD);
        mem.write32_masked(7, 0xEE00_0000, 0xFF00_0000);
        assert_eq!(mem.read32(7), 0xEEBBCCDD);
    }

    #[test]
    fn test_write_bytes_wraps() {
        let mut mem = GsMemory::new();
        mem.write_bytes(MEMORY_SIZE - 2, &[1, 2, 3, 4]);
        assert_eq!(mem.read8((MEMORY_SIZE - 2) as u32), 1);
        assert_eq!(mem.read8((MEMORY_SIZE - 1) as u32), 2);
        assert_eq!(mem.read8(0), 3);
        assert_eq!(mem.read8(1), 4);
    }

    #[test]
    fn test_load_image_size_check() {
        let mut mem = GsMemory::new();
        assert!(matches!(
            mem.load_image(&[0u8; 16]),
            Err(GsError::InvalidMemorySize { got: 16, .. })
        ));

        let mut image = vec![0u8; MEMORY_SIZE];
        image[100] = 0x42;
        mem.load_image(&image).unwrap();
        assert_eq!(mem.read8(100), 0x42);
    }
}
