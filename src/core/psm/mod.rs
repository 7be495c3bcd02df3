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

//! Pixel storage modes
//!
//! A pixel storage mode (PSM) fixes both how a pixel is encoded and how it is
//! laid out inside local memory. Layouts are built from three nested units:
//!
//! - **Page**: 8KB, 32 blocks. Pages tile the buffer row-major, `bw` pages wide.
//! - **Block**: 256 bytes. Blocks are placed inside a page in a fixed
//!   interleaved order (the block table).
//! - **Column**: 64 bytes, 4 per block. Pixels inside a block are permuted by
//!   the column table.
//!
//! Several modes share a layout. 24-bit and the 8H/4HL/4HH modes reuse the
//! 32-bit layout and only touch some bits of each word; that is what the
//! per-mode plane mask records.
//!
//! # Page geometry
//!
//! | Layout        | Page (px) | Block (px) | Element |
//! |---------------|-----------|------------|---------|
//! | 32-bit        | 64×32     | 8×8        | u32     |
//! | 16-bit        | 64×64     | 16×8       | u16     |
//! | 8-bit         | 128×64    | 16×16      | u8      |
//! | 4-bit         | 128×128   | 32×16      | nibble  |

mod address;
mod tables;

pub use address::{MAX_BLOCKS, MAX_PAGES};
pub use tables::AddressTables;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::error::{GsError, Result};

/// Pixel storage mode, discriminant is the hardware PSM code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Psm {
    Ct32 = 0x00,
    Ct24 = 0x01,
    Ct16 = 0x02,
    Ct16S = 0x0A,
    T8 = 0x13,
    T4 = 0x14,
    T8H = 0x1B,
    T4HL = 0x24,
    T4HH = 0x2C,
    Z32 = 0x30,
    Z24 = 0x31,
    Z16 = 0x32,
    Z16S = 0x3A,
}

/// Memory layout family shared by one or more storage modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    Ct32,
    Z32,
    Ct16,
    Ct16S,
    Z16,
    Z16S,
    T8,
    T4,
}

bitflags! {
    /// Static properties of a storage mode
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PsmFlags: u8 {
        /// Pixels are palette indices
        const INDEXED = 1 << 0;
        /// Depth buffer layout
        const DEPTH = 1 << 1;
        /// Index lives in the upper bits of a 32-bit word
        const HIGH_BITS = 1 << 2;
        /// Fewer than 8 bits per pixel
        const SUB_BYTE = 1 << 3;
        /// Writes leave part of the storage word untouched
        const PARTIAL_WORD = 1 << 4;
    }
}

/// Immutable per-mode description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsmDescriptor {
    pub psm: Psm,
    pub layout: Layout,
    /// Bits of storage consumed per pixel
    pub bpp: u32,
    /// Bits per pixel in a host transfer
    pub trbpp: u32,
    /// Palette entries (0 for direct colour)
    pub pal: u32,
    pub flags: PsmFlags,
    /// Bits of the layout element this mode reads and writes, as a 32-bit word mask
    pub plane_mask: u32,
}

const fn descriptor(
    psm: Psm,
    layout: Layout,
    bpp: u32,
    trbpp: u32,
    pal: u32,
    flags: PsmFlags,
    plane_mask: u32,
) -> PsmDescriptor {
    PsmDescriptor {
        psm,
        layout,
        bpp,
        trbpp,
        pal,
        flags,
        plane_mask,
    }
}

const INDEXED_4: PsmFlags = PsmFlags::INDEXED.union(PsmFlags::SUB_BYTE);
const INDEXED_HIGH: PsmFlags = PsmFlags::INDEXED
    .union(PsmFlags::HIGH_BITS)
    .union(PsmFlags::PARTIAL_WORD);
const DEPTH_24: PsmFlags = PsmFlags::DEPTH.union(PsmFlags::PARTIAL_WORD);

/// Descriptor table, indexed by [`Psm::index`]
const DESCRIPTORS: [PsmDescriptor; 13] = [
    descriptor(Psm::Ct32, Layout::Ct32, 32, 32, 0, PsmFlags::empty(), 0xFFFF_FFFF),
    descriptor(Psm::Ct24, Layout::Ct32, 32, 24, 0, PsmFlags::PARTIAL_WORD, 0x00FF_FFFF),
    descriptor(Psm::Ct16, Layout::Ct16, 16, 16, 0, PsmFlags::empty(), 0xFFFF_FFFF),
    descriptor(Psm::Ct16S, Layout::Ct16S, 16, 16, 0, PsmFlags::empty(), 0xFFFF_FFFF),
    descriptor(Psm::T8, Layout::T8, 8, 8, 256, PsmFlags::INDEXED, 0xFFFF_FFFF),
    descriptor(Psm::T4, Layout::T4, 4, 4, 16, INDEXED_4, 0xFFFF_FFFF),
    descriptor(Psm::T8H, Layout::Ct32, 32, 8, 256, INDEXED_HIGH, 0xFF00_0000),
    descriptor(Psm::T4HL, Layout::Ct32, 32, 4, 16, INDEXED_HIGH.union(PsmFlags::SUB_BYTE), 0x0F00_0000),
    descriptor(Psm::T4HH, Layout::Ct32, 32, 4, 16, INDEXED_HIGH.union(PsmFlags::SUB_BYTE), 0xF000_0000),
    descriptor(Psm::Z32, Layout::Z32, 32, 32, 0, PsmFlags::DEPTH, 0xFFFF_FFFF),
    descriptor(Psm::Z24, Layout::Z32, 32, 24, 0, DEPTH_24, 0x00FF_FFFF),
    descriptor(Psm::Z16, Layout::Z16, 16, 16, 0, PsmFlags::DEPTH, 0xFFFF_FFFF),
    descriptor(Psm::Z16S, Layout::Z16S, 16, 16, 0, PsmFlags::DEPTH, 0xFFFF_FFFF),
];

/// PSM code to mode, for O(1) decoding of register fields
const CODE_TABLE: [Option<Psm>; 64] = {
    let mut table = [None; 64];
    let mut i = 0;
    while i < Psm::ALL.len() {
        table[Psm::ALL[i] as usize] = Some(Psm::ALL[i]);
        i += 1;
    }
    table
};

impl Psm {
    /// Every storage mode, in descriptor table order
    pub const ALL: [Psm; 13] = [
        Psm::Ct32,
        Psm::Ct24,
        Psm::Ct16,
        Psm::Ct16S,
        Psm::T8,
        Psm::T4,
        Psm::T8H,
        Psm::T4HL,
        Psm::T4HH,
        Psm::Z32,
        Psm::Z24,
        Psm::Z16,
        Psm::Z16S,
    ];

    /// Decode a 6-bit PSM register field
    ///
    /// # Returns
    ///
    /// `None` for codes that do not name a storage mode
    #[inline]
    pub fn from_code(code: u32) -> Option<Psm> {
        CODE_TABLE.get(code as usize).copied().flatten()
    }

    /// Decode a PSM register field, reporting unknown codes
    pub fn try_from_code(code: u32) -> Result<Psm> {
        Self::from_code(code).ok_or(GsError::UnsupportedPsm(code))
    }

    /// Hardware PSM code
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    #[inline]
    fn index(self) -> usize {
        match self {
            Psm::Ct32 => 0,
            Psm::Ct24 => 1,
            Psm::Ct16 => 2,
            Psm::Ct16S => 3,
            Psm::T8 => 4,
            Psm::T4 => 5,
            Psm::T8H => 6,
            Psm::T4HL => 7,
            Psm::T4HH => 8,
            Psm::Z32 => 9,
            Psm::Z24 => 10,
            Psm::Z16 => 11,
            Psm::Z16S => 12,
        }
    }

    /// Static description of this mode
    #[inline]
    pub fn descriptor(self) -> &'static PsmDescriptor {
        &DESCRIPTORS[self.index()]
    }

    #[inline]
    pub fn layout(self) -> Layout {
        self.descriptor().layout
    }

    #[inline]
    pub fn is_indexed(self) -> bool {
        self.descriptor().flags.contains(PsmFlags::INDEXED)
    }

    #[inline]
    pub fn is_depth(self) -> bool {
        self.descriptor().flags.contains(PsmFlags::DEPTH)
    }

    /// Block size in pixels
    #[inline]
    pub fn block_size(self) -> (u32, u32) {
        self.layout().block_size()
    }

    /// Page size in pixels
    #[inline]
    pub fn page_size(self) -> (u32, u32) {
        self.layout().page_size()
    }
}

impl std::fmt::Display for Psm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Psm::Ct32 => "PSMCT32",
            Psm::Ct24 => "PSMCT24",
            Psm::Ct16 => "PSMCT16",
            Psm::Ct16S => "PSMCT16S",
            Psm::T8 => "PSMT8",
            Psm::T4 => "PSMT4",
            Psm::T8H => "PSMT8H",
            Psm::T4HL => "PSMT4HL",
            Psm::T4HH => "PSMT4HH",
            Psm::Z32 => "PSMZ32",
            Psm::Z24 => "PSMZ24",
            Psm::Z16 => "PSMZ16",
            Psm::Z16S => "PSMZ16S",
        };
        f.write_str(name)
    }
}

impl Layout {
    /// All layouts, in table order
    pub const ALL: [Layout; 8] = [
        Layout::Ct32,
        Layout::Z32,
        Layout::Ct16,
        Layout::Ct16S,
        Layout::Z16,
        Layout::Z16S,
        Layout::T8,
        Layout::T4,
    ];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Layout::Ct32 => 0,
            Layout::Z32 => 1,
            Layout::Ct16 => 2,
            Layout::Ct16S => 3,
            Layout::Z16 => 4,
            Layout::Z16S => 5,
            Layout::T8 => 6,
            Layout::T4 => 7,
        }
    }

    /// Bits per addressable element
    #[inline]
    pub const fn element_bits(self) -> u32 {
        match self {
            Layout::Ct32 | Layout::Z32 => 32,
            Layout::Ct16 | Layout::Ct16S | Layout::Z16 | Layout::Z16S => 16,
            Layout::T8 => 8,
            Layout::T4 => 4,
        }
    }

    /// Page size in pixels
    #[inline]
    pub const fn page_size(self) -> (u32, u32) {
        match self.element_bits() {
            32 => (64, 32),
            16 => (64, 64),
            8 => (128, 64),
            _ => (128, 128),
        }
    }

    /// Block size in pixels
    #[inline]
    pub const fn block_size(self) -> (u32, u32) {
        match self.element_bits() {
            32 => (8, 8),
            16 => (16, 8),
            8 => (16, 16),
            _ => (32, 16),
        }
    }

    /// Rows covered by one column
    #[inline]
    pub const fn column_height(self) -> u32 {
        match self.element_bits() {
            32 | 16 => 2,
            _ => 4,
        }
    }

    /// log2 of the number of elements in one page
    #[inline]
    pub const fn page_shift(self) -> u32 {
        match self.element_bits() {
            32 => 11,
            16 => 12,
            8 => 13,
            _ => 14,
        }
    }

    /// Elements in one 256-byte block
    #[inline]
    pub const fn elements_per_block(self) -> u32 {
        1 << (self.page_shift() - 5)
    }

    /// Mask wrapping an element offset into local memory
    #[inline]
    pub const fn element_mask(self) -> u32 {
        (1 << (self.page_shift() + 9)) - 1
    }

    /// Pages per row of a buffer `bw` units (64 pixels) wide
    ///
    /// 8-bit and 4-bit pages are 128 pixels wide, so odd widths round up.
    #[inline]
    pub const fn page_stride(self, bw: u32) -> u32 {
        match self.element_bits() {
            32 | 16 => bw,
            _ => (bw + 1) >> 1,
        }
    }
}

/// True when writes in one mode can change pixels read in the other
///
/// 24-bit colour leaves the top byte of each word alone, which is exactly
/// where 8H/4HL/4HH keep their indices, so those pairs never interfere.
/// Everything else overlaps whenever the address ranges do.
#[inline]
pub fn shares_bits(a: Psm, b: Psm) -> bool {
    a.descriptor().plane_mask & b.descriptor().plane_mask != 0
}
