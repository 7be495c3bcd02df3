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

//! CLUT (colour lookup table) management
//!
//! The GS keeps its palette in a dedicated 1KB buffer, separate from local
//! memory, organised as 512 16-bit entries. Loading the buffer is a copy out
//! of local memory triggered by a TEX0 write.
//!
//! # Storage
//!
//! - 16-bit palettes use the entries directly. CSA selects a bank of 16
//!   entries over the whole buffer (32 banks).
//! - 32-bit palettes split each colour: the low halfword goes to the first
//!   256 entries and the high halfword to the same slot of the second 256.
//!   Only 16 banks are addressable.
//!
//! # Load modes
//!
//! - CSM 0 (block arrangement): colours are taken from a 16×16 (8-bit) or
//!   8×2 (4-bit) pixel area at CBP with a fixed scan order.
//! - CSM 1 (linear): colours are a single row at `(COU * 16, COV)` in a
//!   buffer CBW wide, as laid out by TEXCLUT.
//!
//! Reloads are expensive and frequent TEX0 writes rarely change anything, so
//! the write side remembers the last load signature and only copies again
//! when it changed or the source memory was written.

use serde::{Deserialize, Serialize};

use super::color::{expand16, expand24};
use super::local_memory::LocalMemory;
use super::memory::PageSet;
use super::psm::{Layout, Psm};
use super::registers::{Tex0, TexClut, Texa};

/// Number of 16-bit entries in the CLUT buffer
pub const CLUT_ENTRIES: usize = 512;

/// Storage format of palette colours (TEX0.CPSM)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClutFormat {
    Ct32,
    /// Non-standard; stored like 32-bit, alpha from TEXA
    Ct24,
    Ct16,
    Ct16S,
}

impl ClutFormat {
    /// Decode TEX0.CPSM
    ///
    /// # Returns
    ///
    /// `None` for codes that are not colour formats, including indexed ones
    pub fn from_cpsm(cpsm: u32) -> Option<Self> {
        match cpsm {
            0x00 => Some(ClutFormat::Ct32),
            0x01 => Some(ClutFormat::Ct24),
            0x02 => Some(ClutFormat::Ct16),
            0x0A => Some(ClutFormat::Ct16S),
            _ => None,
        }
    }

    /// Storage mode palette colours are read with
    pub fn psm(self) -> Psm {
        match self {
            ClutFormat::Ct32 | ClutFormat::Ct24 => Psm::Ct32,
            ClutFormat::Ct16 => Psm::Ct16,
            ClutFormat::Ct16S => Psm::Ct16S,
        }
    }

    pub fn is_32bit(self) -> bool {
        matches!(self, ClutFormat::Ct32 | ClutFormat::Ct24)
    }

    fn layout(self) -> Layout {
        self.psm().layout()
    }
}

/// Everything that determines what a load copies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WriteSignature {
    entries: u32,
    format: ClutFormat,
    csm: u32,
    csa: u32,
    cbp: u32,
    /// Only meaningful in linear mode
    texclut: Option<TexClut>,
}

/// Everything that determines the RGBA32 expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ReadSignature {
    entries: u32,
    format: ClutFormat,
    csa: u32,
    /// Only meaningful for 16-bit and 24-bit palettes
    texa: Option<Texa>,
}

/// CLUT buffer and its load/expansion caches
pub struct ClutManager {
    /// Raw palette buffer
    clut: Box<[u16; CLUT_ENTRIES]>,

    /// Last load signature; `None` forces the next load
    write_signature: Option<WriteSignature>,

    /// Source memory changed since the last load
    write_dirty: bool,

    /// Pages the last load read from
    source_pages: PageSet,

    /// CLD latches CBP0 and CBP1
    cbp: [u32; 2],

    /// Expanded palette
    buff32: Box<[u32; 256]>,

    read_signature: Option<ReadSignature>,

    /// Raw buffer changed since the last expansion
    read_dirty: bool,

    /// Number of loads actually performed
    loads: u64,
}

impl ClutManager {
    pub fn new() -> Self {
        Self {
            clut: Box::new([0; CLUT_ENTRIES]),
            write_signature: None,
            write_dirty: true,
            source_pages: PageSet::new(),
            cbp: [0; 2],
            buff32: Box::new([0; 256]),
            read_signature: None,
            read_dirty: true,
            loads: 0,
        }
    }

    /// Apply TEX0.CLD load control
    ///
    /// Updates the CBP0/CBP1 latches as a side effect.
    ///
    /// # Returns
    ///
    /// Whether this TEX0 write asks for a palette load
    ///
    /// | CLD | Behaviour                                  |
    /// |-----|--------------------------------------------|
    /// | 0   | no load                                    |
    /// | 1   | load                                       |
    /// | 2   | load, CBP0 = CBP                           |
    /// | 3   | load, CBP1 = CBP                           |
    /// | 4   | load and CBP0 = CBP only if CBP != CBP0    |
    /// | 5   | load and CBP1 = CBP only if CBP != CBP1    |
    /// | 6-7 | no load                                    |
    pub fn load_requested(&mut self, tex0: &Tex0) -> bool {
        match tex0.cld {
            1 => true,
            2 => {
                self.cbp[0] = tex0.cbp;
                true
            }
            3 => {
                self.cbp[1] = tex0.cbp;
                true
            }
            4 | 5 => {
                let latch = &mut self.cbp[(tex0.cld - 4) as usize];
                if *latch == tex0.cbp {
                    false
                } else {
                    *latch = tex0.cbp;
                    true
                }
            }
            _ => false,
        }
    }

    fn write_signature(tex0: &Tex0, texclut: &TexClut, psm: Psm, format: ClutFormat) -> WriteSignature {
        WriteSignature {
            entries: psm.descriptor().pal,
            format,
            csm: tex0.csm,
            csa: tex0.csa,
            cbp: tex0.cbp,
            texclut: (tex0.csm != 0).then_some(*texclut),
        }
    }

    /// True if a load with these registers would change the buffer
    pub fn is_dirty(&self, tex0: &Tex0, texclut: &TexClut) -> bool {
        if self.write_dirty {
            return true;
        }
        let (Some(psm), Some(format)) = (Psm::from_code(tex0.psm), ClutFormat::from_cpsm(tex0.cpsm)) else {
            return false;
        };
        self.write_signature != Some(Self::write_signature(tex0, texclut, psm, format))
    }

    /// Load the palette described by TEX0 from local memory
    ///
    /// Nothing is copied unless the load signature changed or the source was
    /// invalidated since the last load. Direct-colour textures and invalid
    /// palette formats never load.
    ///
    /// # Returns
    ///
    /// Whether the buffer was reloaded
    pub fn write(&mut self, mem: &LocalMemory, tex0: &Tex0, texclut: &TexClut) -> bool {
        let Some(psm) = Psm::from_code(tex0.psm) else {
            return false;
        };
        let entries = psm.descriptor().pal;
        if entries == 0 {
            return false;
        }
        let Some(format) = ClutFormat::from_cpsm(tex0.cpsm) else {
            log::warn!("CLUT load with invalid CPSM 0x{:02X} ignored", tex0.cpsm);
            return false;
        };

        let signature = Self::write_signature(tex0, texclut, psm, format);
        if !self.write_dirty && self.write_signature == Some(signature) {
            return false;
        }

        let offset = Self::bank_offset(format, tex0.csa);
        if tex0.csm == 0 {
            self.load_block(mem, tex0.cbp, format, entries, offset);
        } else {
            self.load_linear(mem, tex0.cbp, texclut, format, entries, offset);
        }

        log::trace!(
            "CLUT load: {} entries {:?} cbp=0x{:04X} csm={} csa={}",
            entries,
            format,
            tex0.cbp,
            tex0.csm,
            tex0.csa
        );

        self.write_signature = Some(signature);
        self.write_dirty = false;
        self.read_dirty = true;
        self.loads += 1;
        true
    }

    /// First entry written for a bank
    fn bank_offset(format: ClutFormat, csa: u32) -> usize {
        if format.is_32bit() {
            ((csa & 15) * 16) as usize
        } else {
            ((csa & 31) * 16) as usize
        }
    }

    fn store(&mut self, format: ClutFormat, slot: usize, color: u32) {
        if format.is_32bit() {
            let slot = slot & 0xFF;
            self.clut[slot] = color as u16;
            self.clut[slot + 256] = (color >> 16) as u16;
        } else {
            self.clut[slot & 0x1FF] = color as u16;
        }
    }

    fn load_block(&mut self, mem: &LocalMemory, cbp: u32, format: ClutFormat, entries: u32, offset: usize) {
        let layout = format.layout();
        let psm = format.psm();
        let base = mem.tables.block_base(layout, cbp);
        let scan = mem.tables.clut_scan(layout, entries);

        for (i, &off) in scan.iter().enumerate() {
            let color = mem.read_element(psm, base.wrapping_add(off as u32));
            self.store(format, offset + i, color);
        }

        let (w, h) = if entries == 256 { (16, 16) } else { (8, 2) };
        self.source_pages = PageSet::from_rect(layout, cbp, 1, 0, 0, w, h);
    }

    fn load_linear(
        &mut self,
        mem: &LocalMemory,
        cbp: u32,
        texclut: &TexClut,
        format: ClutFormat,
        entries: u32,
        offset: usize,
    ) {
        let psm = format.psm();
        let x0 = texclut.cou * 16;
        for i in 0..entries {
            let color = mem.read_pixel(psm, x0 + i, texclut.cov, cbp, texclut.cbw);
            self.store(format, offset + i as usize, color);
        }

        self.source_pages = PageSet::from_rect(
            format.layout(),
            cbp,
            texclut.cbw,
            x0,
            texclut.cov,
            x0 + entries,
            texclut.cov + 1,
        );
    }

    /// Force the next load to copy
    pub fn invalidate(&mut self) {
        self.write_dirty = true;
    }

    /// Mark the palette stale if `pages` overlaps the memory it was loaded from
    pub fn invalidate_pages(&mut self, pages: &PageSet) {
        if !self.write_dirty && self.source_pages.intersects(pages) {
            log::trace!("CLUT source overwritten, next load will copy");
            self.write_dirty = true;
        }
    }

    /// Palette expanded to RGBA32
    ///
    /// Entry `i` of the result is the colour for index `i`; 4-bit modes use
    /// the first 16 entries. The expansion is cached and recomputed only when
    /// the buffer, the bank, the format or (for 16/24-bit colours) TEXA
    /// changes.
    ///
    /// Passing a direct-colour `psm` is a caller bug: it asserts in debug
    /// builds and returns the previous expansion in release builds.
    pub fn read32(&mut self, psm: Psm, tex0: &Tex0, texa: &Texa) -> &[u32; 256] {
        let entries = psm.descriptor().pal;
        debug_assert!(entries != 0, "read32 called for direct colour {}", psm);
        if entries == 0 {
            return &self.buff32;
        }
        let format = ClutFormat::from_cpsm(tex0.cpsm).unwrap_or_else(|| {
            debug_assert!(false, "read32 with invalid CPSM 0x{:02X}", tex0.cpsm);
            ClutFormat::Ct32
        });

        let signature = ReadSignature {
            entries,
            format,
            csa: tex0.csa,
            texa: (format != ClutFormat::Ct32).then_some(*texa),
        };
        if !self.read_dirty && self.read_signature == Some(signature) {
            return &self.buff32;
        }

        let offset = Self::bank_offset(format, tex0.csa);
        for i in 0..entries as usize {
            self.buff32[i] = match format {
                ClutFormat::Ct32 => self.color32(offset + i),
                ClutFormat::Ct24 => expand24(self.color32(offset + i), texa),
                ClutFormat::Ct16 | ClutFormat::Ct16S => expand16(self.clut[(offset + i) & 0x1FF], texa),
            };
        }
        self.buff32[entries as usize..].fill(0);

        self.read_signature = Some(signature);
        self.read_dirty = false;
        &self.buff32
    }

    #[inline]
    fn color32(&self, slot: usize) -> u32 {
        let slot = slot & 0xFF;
        self.clut[slot] as u32 | ((self.clut[slot + 256] as u32) << 16)
    }

    /// Palette colours in their stored encoding, one per index
    ///
    /// 32-bit colours are reassembled from their two halves.
    pub fn native_entries(&self, psm: Psm, tex0: &Tex0) -> Vec<u32> {
        let entries = psm.descriptor().pal as usize;
        let format = ClutFormat::from_cpsm(tex0.cpsm).unwrap_or(ClutFormat::Ct32);
        let offset = Self::bank_offset(format, tex0.csa);
        (0..entries)
            .map(|i| {
                if format.is_32bit() {
                    self.color32(offset + i)
                } else {
                    self.clut[(offset + i) & 0x1FF] as u32
                }
            })
            .collect()
    }

    /// Raw CLUT buffer
    pub fn native(&self) -> &[u16; CLUT_ENTRIES] {
        &self.clut
    }

    /// CBP0/CBP1 latches
    pub fn cbp_latches(&self) -> [u32; 2] {
        self.cbp
    }

    /// Number of loads that actually copied from memory
    pub fn load_count(&self) -> u64 {
        self.loads
    }

    /// Restore buffer contents and latches from a snapshot
    ///
    /// Short snapshots leave the remaining entries zero. Both caches are
    /// invalidated.
    pub fn restore(&mut self, clut: &[u16], cbp: [u32; 2]) {
        self.clut.fill(0);
        let n = clut.len().min(CLUT_ENTRIES);
        self.clut[..n].copy_from_slice(&clut[..n]);
        self.cbp = cbp;
        self.write_signature = None;
        self.write_dirty = true;
        self.read_signature = None;
        self.read_dirty = true;
        self.source_pages = PageSet::new();
    }
}

impl Default for ClutManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClutManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClutManager")
            .field("write_dirty", &self.write_dirty)
            .field("read_dirty", &self.read_dirty)
            .field("cbp", &self.cbp)
            .field("loads", &self.loads)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tex0(psm: Psm, cpsm: u32, cbp: u32) -> Tex0 {
        Tex0 {
            psm: psm.code(),
            cpsm,
            cbp,
            cld: 1,
            ..Default::default()
        }
    }

    /// 256 32-bit colours in block arrangement, colour(i) = i * 0x01010101 + 0x00030201
    fn fill_block_palette32(mem: &mut LocalMemory, cbp: u32) {
        for i in 0..256u32 {
            let p = (i & 0xE7) | ((i & 0x08) << 1) | ((i & 0x10) >> 1);
            mem.write_pixel(Psm::Ct32, p & 15, p >> 4, cbp, 1, i.wrapping_mul(0x0101_0101) + 0x0003_0201);
        }
    }

    #[test]
    fn test_block_load_32bit_8bit_index() {
        let mut mem = LocalMemory::default();
        fill_block_palette32(&mut mem, 0x100);
        let mut clut = ClutManager::new();
        let t = tex0(Psm::T8, 0x00, 0x100);

        assert!(clut.write(&mem, &t, &TexClut::default()));
        let colors = clut.read32(Psm::T8, &t, &Texa::default());
        for i in 0..256u32 {
            assert_eq!(colors[i as usize], i.wrapping_mul(0x0101_0101) + 0x0003_0201, "entry {i}");
        }

        // Halves land in the two banks of the raw buffer
        assert_eq!(clut.native()[1], 0x0302);
        assert_eq!(clut.native()[256 + 1], 0x0104);
    }

    #[test]
    fn test_block_load_4bit_index_uses_csa_bank() {
        let mut mem = LocalMemory::default();
        for i in 0..16u32 {
            mem.write_pixel(Psm::Ct16, i & 7, i >> 3, 0x40, 1, 0x8000 | i);
        }
        let mut clut = ClutManager::new();
        let mut t = tex0(Psm::T4, 0x02, 0x40);
        t.csa = 5;

        assert!(clut.write(&mem, &t, &TexClut::default()));
        assert_eq!(clut.native()[5 * 16 + 3], 0x8003);
        assert_eq!(clut.native()[3], 0);

        let texa = Texa {
            ta0: 0,
            aem: false,
            ta1: 0xFF,
        };
        let colors = clut.read32(Psm::T4, &t, &texa);
        assert_eq!(colors[3], 0xFF00_0018);
        assert_eq!(colors[16], 0);
    }

    #[test]
    fn test_linear_load() {
        let mut mem = LocalMemory::default();
        let texclut = TexClut {
            cbw: 2,
            cou: 3,
            cov: 10,
        };
        for i in 0..16u32 {
            mem.write_pixel(Psm::Ct32, 48 + i, 10, 0x200, 2, 0xFF00_0000 | i);
        }
        let mut clut = ClutManager::new();
        let mut t = tex0(Psm::T4HH, 0x00, 0x200);
        t.csm = 1;

        assert!(clut.write(&mem, &t, &texclut));
        let colors = clut.read32(Psm::T4HH, &t, &Texa::default());
        for i in 0..16u32 {
            assert_eq!(colors[i as usize], 0xFF00_0000 | i);
        }
    }

    #[test]
    fn test_unchanged_signature_does_not_reload() {
        let mut mem = LocalMemory::default();
        fill_block_palette32(&mut mem, 0);
        let mut clut = ClutManager::new();
        let t = tex0(Psm::T8, 0x00, 0);

        assert!(clut.write(&mem, &t, &TexClut::default()));
        assert!(!clut.write(&mem, &t, &TexClut::default()));
        assert_eq!(clut.load_count(), 1);

        // TEXCLUT is irrelevant in block mode
        let other = TexClut {
            cbw: 9,
            cou: 1,
            cov: 1,
        };
        assert!(!clut.is_dirty(&t, &other));

        // Memory changes are invisible until invalidated
        mem.write_pixel(Psm::Ct32, 0, 0, 0, 1, 0xDEAD_BEEF);
        assert!(!clut.write(&mem, &t, &TexClut::default()));
        clut.invalidate();
        assert!(clut.write(&mem, &t, &TexClut::default()));
        assert_eq!(clut.read32(Psm::T8, &t, &Texa::default())[0], 0xDEAD_BEEF);
    }

    #[test]
    fn test_signature_change_reloads() {
        let mem = LocalMemory::default();
        let mut clut = ClutManager::new();
        let t = tex0(Psm::T8, 0x00, 0);
        clut.write(&mem, &t, &TexClut::default());

        let mut moved = t;
        moved.cbp = 32;
        assert!(clut.is_dirty(&moved, &TexClut::default()));
        assert!(clut.write(&mem, &moved, &TexClut::default()));

        let mut rebanked = moved;
        rebanked.csa = 1;
        assert!(clut.write(&mem, &rebanked, &TexClut::default()));
        assert_eq!(clut.load_count(), 3);
    }

    #[test]
    fn test_invalidate_pages() {
        let mem = LocalMemory::default();
        let mut clut = ClutManager::new();
        let t = tex0(Psm::T8, 0x00, 64);
        clut.write(&mem, &t, &TexClut::default());

        // Page 0 is not where the palette came from
        clut.invalidate_pages(&PageSet::from_byte_range(0, 256));
        assert!(!clut.is_dirty(&t, &TexClut::default()));

        // Block 64 is page 2
        clut.invalidate_pages(&PageSet::from_byte_range(64 * 256, 4));
        assert!(clut.is_dirty(&t, &TexClut::default()));
    }

    #[test]
    fn test_cld_latches() {
        let mut clut = ClutManager::new();
        let mut t = Tex0 {
            cbp: 0x80,
            ..Default::default()
        };

        t.cld = 0;
        assert!(!clut.load_requested(&t));
        t.cld = 2;
        assert!(clut.load_requested(&t));
        assert_eq!(clut.cbp_latches(), [0x80, 0]);

        // CBP0 already matches
        t.cld = 4;
        assert!(!clut.load_requested(&t));
        // CBP1 does not
        t.cld = 5;
        assert!(clut.load_requested(&t));
        assert!(!clut.load_requested(&t));
        assert_eq!(clut.cbp_latches(), [0x80, 0x80]);

        t.cld = 6;
        assert!(!clut.load_requested(&t));
    }

    #[test]
    fn test_read32_is_deterministic_and_cached() {
        let mut mem = LocalMemory::default();
        for i in 0..256u32 {
            let p = (i & 0xE7) | ((i & 0x08) << 1) | ((i & 0x10) >> 1);
            mem.write_pixel(Psm::Ct16, p & 15, p >> 4, 0, 1, i * 0x81);
        }
        let mut clut = ClutManager::new();
        let t = tex0(Psm::T8, 0x02, 0);
        clut.write(&mem, &t, &TexClut::default());

        let texa = Texa {
            ta0: 0x33,
            aem: true,
            ta1: 0xCC,
        };
        let first: Vec<u32> = clut.read32(Psm::T8, &t, &texa).to_vec();
        let second: Vec<u32> = clut.read32(Psm::T8, &t, &texa).to_vec();
        assert_eq!(first, second);
        // Entry 0 is black with AEM set
        assert_eq!(first[0], 0);

        // TEXA participates for 16-bit palettes
        let opaque = Texa { aem: false, ..texa };
        assert_eq!(clut.read32(Psm::T8, &t, &opaque)[0], 0x3300_0000);
    }

    #[test]
    fn test_ct24_palette_uses_texa_alpha() {
        let mut mem = LocalMemory::default();
        mem.write_pixel(Psm::Ct32, 0, 0, 0, 1, 0xAA12_3456);
        let mut clut = ClutManager::new();
        let t = tex0(Psm::T4, 0x01, 0);
        clut.write(&mem, &t, &TexClut::default());

        let texa = Texa {
            ta0: 0x40,
            aem: false,
            ta1: 0,
        };
        assert_eq!(clut.read32(Psm::T4, &t, &texa)[0], 0x4012_3456);
    }

    #[test]
    fn test_invalid_cpsm_never_loads() {
        let mem = LocalMemory::default();
        let mut clut = ClutManager::new();
        let t = tex0(Psm::T8, 0x13, 0);
        assert!(!clut.write(&mem, &t, &TexClut::default()));
        assert_eq!(clut.load_count(), 0);
    }

    #[test]
    fn test_native_entries_and_restore() {
        let mut clut = ClutManager::new();
        let mut raw = vec![0u16; CLUT_ENTRIES];
        raw[2] = 0x5678;
        raw[258] = 0x1234;
        clut.restore(&raw, [1, 2]);

        let t = tex0(Psm::T8, 0x00, 0);
        assert_eq!(clut.native_entries(Psm::T8, &t)[2], 0x1234_5678);
        assert_eq!(clut.cbp_latches(), [1, 2]);
        assert_eq!(clut.read32(Psm::T8, &t, &Texa::default())[2], 0x1234_5678);
    }
}
