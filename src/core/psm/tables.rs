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

//! Swizzle lookup tables
//!
//! The block tables below are the hardware block orderings. Column tables
//! (the pixel permutation inside a block) are derived from the 32-bit column
//! table when [`AddressTables`] is built, together with whole-page offset
//! tables, their inverses and the CLUT scan orders.
//!
//! Tables are built once per owner and shared read-only, there is no global
//! state.

use super::Layout;

const BLOCK_TABLE32: [[u8; 8]; 4] = [
    [0, 1, 4, 5, 16, 17, 20, 21],
    [2, 3, 6, 7, 18, 19, 22, 23],
    [8, 9, 12, 13, 24, 25, 28, 29],
    [10, 11, 14, 15, 26, 27, 30, 31],
];

const BLOCK_TABLE32Z: [[u8; 8]; 4] = [
    [24, 25, 28, 29, 8, 9, 12, 13],
    [26, 27, 30, 31, 10, 11, 14, 15],
    [16, 17, 20, 21, 0, 1, 4, 5],
    [18, 19, 22, 23, 2, 3, 6, 7],
];

const BLOCK_TABLE16: [[u8; 4]; 8] = [
    [0, 2, 8, 10],
    [1, 3, 9, 11],
    [4, 6, 12, 14],
    [5, 7, 13, 15],
    [16, 18, 24, 26],
    [17, 19, 25, 27],
    [20, 22, 28, 30],
    [21, 23, 29, 31],
];

const BLOCK_TABLE16S: [[u8; 4]; 8] = [
    [0, 2, 16, 18],
    [1, 3, 17, 19],
    [8, 10, 24, 26],
    [9, 11, 25, 27],
    [4, 6, 20, 22],
    [5, 7, 21, 23],
    [12, 14, 28, 30],
    [13, 15, 29, 31],
];

const BLOCK_TABLE16Z: [[u8; 4]; 8] = [
    [24, 26, 16, 18],
    [25, 27, 17, 19],
    [28, 30, 20, 22],
    [29, 31, 21, 23],
    [8, 10, 0, 2],
    [9, 11, 1, 3],
    [12, 14, 4, 6],
    [13, 15, 5, 7],
];

const BLOCK_TABLE16SZ: [[u8; 4]; 8] = [
    [24, 26, 8, 10],
    [25, 27, 9, 11],
    [16, 18, 0, 2],
    [17, 19, 1, 3],
    [28, 30, 12, 14],
    [29, 31, 13, 15],
    [20, 22, 4, 6],
    [21, 23, 5, 7],
];

const BLOCK_TABLE8: [[u8; 8]; 4] = BLOCK_TABLE32;

const BLOCK_TABLE4: [[u8; 4]; 8] = BLOCK_TABLE16;

/// Word order of an 8×8 32-bit block
const COLUMN_TABLE32: [[u8; 8]; 8] = [
    [0, 1, 4, 5, 8, 9, 12, 13],
    [2, 3, 6, 7, 10, 11, 14, 15],
    [16, 17, 20, 21, 24, 25, 28, 29],
    [18, 19, 22, 23, 26, 27, 30, 31],
    [32, 33, 36, 37, 40, 41, 44, 45],
    [34, 35, 38, 39, 42, 43, 46, 47],
    [48, 49, 52, 53, 56, 57, 60, 61],
    [50, 51, 54, 55, 58, 59, 62, 63],
];

/// Block index of the block at block coordinates `(bx, by)` inside a page
#[inline]
pub(crate) fn block_in_page(layout: Layout, bx: u32, by: u32) -> u32 {
    let (bx, by) = (bx as usize, by as usize);
    let block = match layout {
        Layout::Ct32 => BLOCK_TABLE32[by][bx],
        Layout::Z32 => BLOCK_TABLE32Z[by][bx],
        Layout::Ct16 => BLOCK_TABLE16[by][bx],
        Layout::Ct16S => BLOCK_TABLE16S[by][bx],
        Layout::Z16 => BLOCK_TABLE16Z[by][bx],
        Layout::Z16S => BLOCK_TABLE16SZ[by][bx],
        Layout::T8 => BLOCK_TABLE8[by][bx],
        Layout::T4 => BLOCK_TABLE4[by][bx],
    };
    block as u32
}

/// Element offset of pixel `(x, y)` inside its block
fn column_offset(bits: u32, x: u32, y: u32) -> u32 {
    let col32 = |x: u32, y: u32| COLUMN_TABLE32[y as usize][x as usize] as u32;
    match bits {
        32 => col32(x, y),
        16 => 2 * col32(x & 7, y) + (x >> 3),
        8 | 4 => {
            // Odd column pairs are rotated by half a column
            let column = y >> 2;
            let row = y & 3;
            let rotate = ((row >> 1) ^ (column & 1)) & 1;
            let word = col32((x + 4 * rotate) & 7, row & 1);
            let sub = ((row >> 1) & 1) | ((x >> 3) << 1);
            if bits == 8 {
                column * 64 + word * 4 + sub
            } else {
                column * 128 + word * 8 + sub
            }
        }
        _ => unreachable!("no layout uses {} bit elements", bits),
    }
}

/// Tables for a single layout
#[derive(Debug, Clone)]
pub(crate) struct LayoutTables {
    /// In-block element offset, indexed `y * block_w + x`
    pub(crate) column: Vec<u16>,
    /// In-page element offset, indexed `y * page_w + x`
    pub(crate) page: Vec<u16>,
    /// Page offset back to `(x, y)` inside the page, packed as `x | y << 8`
    pub(crate) inverse: Vec<u16>,
}

impl LayoutTables {
    fn build(layout: Layout) -> Self {
        let bits = layout.element_bits();
        let (pw, ph) = layout.page_size();
        let (bw, bh) = layout.block_size();
        let per_block = layout.elements_per_block();

        let mut column = vec![0u16; (bw * bh) as usize];
        for y in 0..bh {
            for x in 0..bw {
                column[(y * bw + x) as usize] = column_offset(bits, x, y) as u16;
            }
        }

        let mut page = vec![0u16; (pw * ph) as usize];
        let mut inverse = vec![0u16; (pw * ph) as usize];
        for y in 0..ph {
            for x in 0..pw {
                let block = block_in_page(layout, x / bw, y / bh);
                let offset = block * per_block + column[((y % bh) * bw + x % bw) as usize] as u32;
                page[(y * pw + x) as usize] = offset as u16;
                inverse[offset as usize] = (x | (y << 8)) as u16;
            }
        }

        Self {
            column,
            page,
            inverse,
        }
    }
}

/// Precomputed address translation tables
///
/// Built once by the owning context and shared (usually behind an `Arc`)
/// by every component that translates coordinates.
///
/// # Examples
///
/// ```
/// use gsvram::core::psm::{AddressTables, Layout};
///
/// let tables = AddressTables::new();
/// // Second pixel of the first row lives in the second word
/// assert_eq!(tables.page_offset(Layout::Ct32, 1, 0), 1);
/// // Second row starts at word 2 (columns interleave row pairs)
/// assert_eq!(tables.page_offset(Layout::Ct32, 0, 1), 2);
/// ```
#[derive(Debug, Clone)]
pub struct AddressTables {
    layouts: Vec<LayoutTables>,
    /// CLUT block-mode scan orders: `[layout][0 = 4-bit, 1 = 8-bit]`
    clut_scan: [[Vec<u16>; 2]; 3],
}

impl AddressTables {
    pub fn new() -> Self {
        let layouts: Vec<LayoutTables> = Layout::ALL.iter().map(|&l| LayoutTables::build(l)).collect();

        let scan = |layout: Layout, entries: u32| -> Vec<u16> {
            let tables = &layouts[layout.index()];
            let (pw, _) = layout.page_size();
            (0..entries)
                .map(|entry| {
                    let (x, y) = if entries == 256 {
                        // Index bits 3 and 4 are swapped in the 16×16 arrangement
                        let p = (entry & 0xE7) | ((entry & 0x08) << 1) | ((entry & 0x10) >> 1);
                        (p & 15, p >> 4)
                    } else {
                        (entry & 7, entry >> 3)
                    };
                    tables.page[(y * pw + x) as usize]
                })
                .collect()
        };

        let clut_scan = [
            [scan(Layout::Ct32, 16), scan(Layout::Ct32, 256)],
            [scan(Layout::Ct16, 16), scan(Layout::Ct16, 256)],
            [scan(Layout::Ct16S, 16), scan(Layout::Ct16S, 256)],
        ];

        Self { layouts, clut_scan }
    }

    #[inline]
    pub(crate) fn layout(&self, layout: Layout) -> &LayoutTables {
        &self.layouts[layout.index()]
    }

    /// In-block permutation for a layout, indexed `y * block_w + x`
    #[inline]
    pub fn column_table(&self, layout: Layout) -> &[u16] {
        &self.layout(layout).column
    }

    /// Element offset of `(x, y)` from the start of its page, for a page-aligned buffer
    #[inline]
    pub fn page_offset(&self, layout: Layout, x: u32, y: u32) -> u32 {
        let (pw, ph) = layout.page_size();
        self.layout(layout).page[((y & (ph - 1)) * pw + (x & (pw - 1))) as usize] as u32
    }

    /// Block-mode CLUT scan order: element offsets from the CLUT base block
    ///
    /// Only the colour layouts a palette can be stored in have scan tables;
    /// anything else falls back to the 32-bit order.
    pub fn clut_scan(&self, layout: Layout, entries: u32) -> &[u16] {
        let bank = match layout {
            Layout::Ct16 => 1,
            Layout::Ct16S => 2,
            _ => 0,
        };
        &self.clut_scan[bank][usize::from(entries > 16)]
    }
}

impl Default for AddressTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_block_tables_mirror_color_tables() {
        for by in 0..4 {
            for bx in 0..8 {
                assert_eq!(
                    BLOCK_TABLE32Z[by][bx],
                    BLOCK_TABLE32[by][bx] ^ 24,
                    "32Z at ({bx}, {by})"
                );
            }
        }
        for by in 0..8 {
            for bx in 0..4 {
                assert_eq!(BLOCK_TABLE16Z[by][bx], BLOCK_TABLE16[by][bx] ^ 24);
                assert_eq!(BLOCK_TABLE16SZ[by][bx], BLOCK_TABLE16S[by][bx] ^ 24);
            }
        }
    }

    #[test]
    fn test_column_table16_rows() {
        let tables = AddressTables::new();
        let column = tables.column_table(Layout::Ct16);
        let row0: Vec<u16> = column[0..16].to_vec();
        assert_eq!(
            row0,
            vec![0, 2, 8, 10, 16, 18, 24, 26, 1, 3, 9, 11, 17, 19, 25, 27]
        );
        let row1: Vec<u16> = column[16..32].to_vec();
        assert_eq!(
            row1,
            vec![4, 6, 12, 14, 20, 22, 28, 30, 5, 7, 13, 15, 21, 23, 29, 31]
        );
    }

    #[test]
    fn test_column_table8_rows() {
        let tables = AddressTables::new();
        let column = tables.column_table(Layout::T8);
        assert_eq!(
            column[0..16].to_vec(),
            vec![0, 4, 16, 20, 32, 36, 48, 52, 2, 6, 18, 22, 34, 38, 50, 54]
        );
        assert_eq!(
            column[16..32].to_vec(),
            vec![8, 12, 24, 28, 40, 44, 56, 60, 10, 14, 26, 30, 42, 46, 58, 62]
        );
        assert_eq!(
            column[32..48].to_vec(),
            vec![33, 37, 49, 53, 1, 5, 17, 21, 35, 39, 51, 55, 3, 7, 19, 23]
        );
        // Second column is rotated the other way round
        assert_eq!(column[64], 96);
        assert_eq!(column[68], 64);
    }

    #[test]
    fn test_column_table4_rows() {
        let tables = AddressTables::new();
        let column = tables.column_table(Layout::T4);
        assert_eq!(
            column[0..8].to_vec(),
            vec![0, 8, 32, 40, 64, 72, 96, 104]
        );
        assert_eq!(column[8], 2);
        assert_eq!(column[64], 65);
        assert_eq!(column[68], 1);
        assert_eq!(column[4 * 32], 192);
    }

    #[test]
    fn test_page_tables_are_bijective() {
        let tables = AddressTables::new();
        for layout in Layout::ALL {
            let page = &tables.layout(layout).page;
            let mut seen = vec![false; page.len()];
            for &offset in page {
                assert!(!seen[offset as usize], "{layout:?} repeats offset {offset}");
                seen[offset as usize] = true;
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn test_inverse_tables() {
        let tables = AddressTables::new();
        for layout in Layout::ALL {
            let (pw, ph) = layout.page_size();
            let t = tables.layout(layout);
            for y in 0..ph {
                for x in 0..pw {
                    let offset = t.page[(y * pw + x) as usize];
                    let packed = t.inverse[offset as usize] as u32;
                    assert_eq!((packed & 0xFF, packed >> 8), (x, y));
                }
            }
        }
    }

    #[test]
    fn test_clut_scan_swaps_index_bits() {
        let tables = AddressTables::new();
        let scan = tables.clut_scan(Layout::Ct32, 256);
        assert_eq!(scan.len(), 256);
        // Entries 0..8 are the first 8 pixels of row 0
        assert_eq!(scan[1] as u32, tables.page_offset(Layout::Ct32, 1, 0));
        // Entry 8 is stored at (0, 1), entry 16 at (8, 0)
        assert_eq!(scan[8] as u32, tables.page_offset(Layout::Ct32, 0, 1));
        assert_eq!(scan[16] as u32, tables.page_offset(Layout::Ct32, 8, 0));

        let scan4 = tables.clut_scan(Layout::Ct16, 16);
        assert_eq!(scan4.len(), 16);
        assert_eq!(scan4[9] as u32, tables.page_offset(Layout::Ct16, 1, 1));
    }
}
