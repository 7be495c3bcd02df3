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

//! Pixel-granular access
//!
//! Values are passed in the storage mode's native encoding, right aligned:
//! a 16-bit pixel is the low 16 bits of the `u32`, a 4HH index the low 4
//! bits, and so on. Writes truncate wider values to the mode's width.

use super::LocalMemory;
use crate::core::color::{expand16, expand24};
use crate::core::psm::Psm;
use crate::core::registers::Texa;

/// Everything needed to turn a stored pixel into RGBA32
#[derive(Debug, Clone, Copy)]
pub struct TexelLookup<'a> {
    /// Palette expanded to RGBA32 (indexed modes only)
    pub clut: &'a [u32; 256],
    pub texa: Texa,
}

impl TexelLookup<'_> {
    /// Convert a raw stored value of `psm` to RGBA32
    #[inline]
    pub fn color(&self, psm: Psm, raw: u32) -> u32 {
        match psm {
            Psm::Ct32 | Psm::Z32 => raw,
            Psm::Ct24 | Psm::Z24 => expand24(raw, &self.texa),
            Psm::Ct16 | Psm::Ct16S | Psm::Z16 | Psm::Z16S => expand16(raw as u16, &self.texa),
            Psm::T8 | Psm::T4 | Psm::T8H | Psm::T4HL | Psm::T4HH => self.clut[(raw & 0xFF) as usize],
        }
    }
}

impl LocalMemory {
    /// Element offset of pixel `(x, y)` for a storage mode
    #[inline]
    pub fn pixel_address(&self, psm: Psm, x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        self.tables.pixel_address(psm.layout(), x, y, bp, bw)
    }

    /// Read the value of `psm` stored at element offset `addr`
    #[inline]
    pub fn read_element(&self, psm: Psm, addr: u32) -> u32 {
        let vm = &self.vm;
        match psm {
            Psm::Ct32 | Psm::Z32 => vm.read32(addr),
            Psm::Ct24 | Psm::Z24 => vm.read32(addr) & 0x00FF_FFFF,
            Psm::Ct16 | Psm::Ct16S | Psm::Z16 | Psm::Z16S => vm.read16(addr) as u32,
            Psm::T8 => vm.read8(addr) as u32,
            Psm::T4 => vm.read_nibble(addr) as u32,
            Psm::T8H => vm.read32(addr) >> 24,
            Psm::T4HL => (vm.read32(addr) >> 24) & 0x0F,
            Psm::T4HH => vm.read32(addr) >> 28,
        }
    }

    /// Write a value of `psm` at element offset `addr`
    ///
    /// Only the bits the mode owns are modified.
    #[inline]
    pub fn write_element(&mut self, psm: Psm, addr: u32, value: u32) {
        let vm = &mut self.vm;
        match psm {
            Psm::Ct32 | Psm::Z32 => vm.write32(addr, value),
            Psm::Ct24 | Psm::Z24 => vm.write32_masked(addr, value, 0x00FF_FFFF),
            Psm::Ct16 | Psm::Ct16S | Psm::Z16 | Psm::Z16S => vm.write16(addr, value as u16),
            Psm::T8 => vm.write8(addr, value as u8),
            Psm::T4 => vm.write_nibble(addr, value as u8),
            Psm::T8H => vm.write32_masked(addr, value << 24, 0xFF00_0000),
            Psm::T4HL => vm.write32_masked(addr, value << 24, 0x0F00_0000),
            Psm::T4HH => vm.write32_masked(addr, value << 28, 0xF000_0000),
        }
    }

    /// Read one pixel in its native encoding
    ///
    /// # Arguments
    ///
    /// * `psm` - Storage mode of the buffer
    /// * `x`, `y` - Pixel coordinates
    /// * `bp` - Buffer base pointer (blocks)
    /// * `bw` - Buffer width (64 pixel units)
    ///
    /// # Examples
    ///
    /// ```
    /// use gsvram::core::local_memory::LocalMemory;
    /// use gsvram::core::psm::Psm;
    ///
    /// let mut mem = LocalMemory::default();
    /// mem.write_pixel(Psm::Ct24, 0, 0, 0, 1, 0xFF123456);
    /// assert_eq!(mem.read_pixel(Psm::Ct24, 0, 0, 0, 1), 0x123456);
    /// ```
    #[inline]
    pub fn read_pixel(&self, psm: Psm, x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        self.read_element(psm, self.pixel_address(psm, x, y, bp, bw))
    }

    /// Write one pixel in its native encoding
    #[inline]
    pub fn write_pixel(&mut self, psm: Psm, x: u32, y: u32, bp: u32, bw: u32, value: u32) {
        let addr = self.pixel_address(psm, x, y, bp, bw);
        self.write_element(psm, addr, value);
    }

    /// Read one pixel converted to RGBA32
    ///
    /// Indexed modes look their index up in `lookup.clut`; 16-bit and 24-bit
    /// modes are expanded with `lookup.texa`.
    #[inline]
    pub fn read_texel(&self, psm: Psm, x: u32, y: u32, bp: u32, bw: u32, lookup: &TexelLookup<'_>) -> u32 {
        lookup.color(psm, self.read_pixel(psm, x, y, bp, bw))
    }
}
