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

//! Address translation
//!
//! Maps `(x, y)` inside a buffer described by a base pointer `bp` (in 256-byte
//! blocks) and a buffer width `bw` (in units of 64 pixels) to an element
//! offset in local memory, and back.
//!
//! Coordinates are not bounds checked: addresses wrap around the 4MB arena,
//! which is also what the hardware does.

use super::tables::{block_in_page, AddressTables};
use super::Layout;

/// Number of 256-byte blocks in local memory
pub const MAX_BLOCKS: u32 = 16384;

/// Number of 8KB pages in local memory
pub const MAX_PAGES: u32 = 512;

impl AddressTables {
    /// Element offset of pixel `(x, y)`
    ///
    /// The offset is in units of the layout's element: words for 32-bit
    /// layouts, halfwords for 16-bit, bytes for 8-bit and nibbles for 4-bit.
    ///
    /// # Arguments
    ///
    /// * `layout` - Memory layout of the buffer
    /// * `x`, `y` - Pixel coordinates inside the buffer
    /// * `bp` - Buffer base pointer in blocks
    /// * `bw` - Buffer width in units of 64 pixels
    ///
    /// # Returns
    ///
    /// Element offset, always inside local memory
    ///
    /// # Examples
    ///
    /// ```
    /// use gsvram::core::psm::{AddressTables, Layout};
    ///
    /// let tables = AddressTables::new();
    /// // One page to the right of the origin in a 2-page wide buffer
    /// assert_eq!(tables.pixel_address(Layout::Ct32, 64, 0, 0, 2), 2048);
    /// ```
    #[inline]
    pub fn pixel_address(&self, layout: Layout, x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        let (pw, ph) = layout.page_size();
        let shift = layout.page_shift();
        let page = (y / ph)
            .wrapping_mul(layout.page_stride(bw))
            .wrapping_add(x / pw);
        let base = bp << (shift - 5);
        let offset = self.layout(layout).page[((y & (ph - 1)) * pw + (x & (pw - 1))) as usize] as u32;

        base.wrapping_add(page << shift).wrapping_add(offset) & layout.element_mask()
    }

    /// Block number (256-byte units) holding pixel `(x, y)`
    #[inline]
    pub fn block_address(&self, layout: Layout, x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        let (pw, ph) = layout.page_size();
        let (bw_px, bh_px) = layout.block_size();
        let page = (y / ph)
            .wrapping_mul(layout.page_stride(bw))
            .wrapping_add(x / pw);
        let block = block_in_page(layout, (x & (pw - 1)) / bw_px, (y & (ph - 1)) / bh_px);

        bp.wrapping_add(page << 5).wrapping_add(block) & (MAX_BLOCKS - 1)
    }

    /// Page number (8KB units) holding the first block of pixel `(x, y)`'s page
    ///
    /// When `bp` is not page aligned a page of the buffer straddles two
    /// memory pages; this returns the first of them.
    #[inline]
    pub fn page_address(&self, layout: Layout, x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        let (pw, ph) = layout.page_size();
        let page = (y / ph)
            .wrapping_mul(layout.page_stride(bw))
            .wrapping_add(x / pw);

        (bp >> 5).wrapping_add(page) & (MAX_PAGES - 1)
    }

    /// Element offset of the first element of a block
    #[inline]
    pub fn block_base(&self, layout: Layout, block: u32) -> u32 {
        (block & (MAX_BLOCKS - 1)) * layout.elements_per_block()
    }

    /// Inverse of [`pixel_address`](Self::pixel_address)
    ///
    /// Returns the coordinates, inside a buffer `bw` wide based at `bp`, of the
    /// pixel stored at element offset `addr`. Addresses below `bp` wrap around
    /// the arena.
    ///
    /// # Examples
    ///
    /// ```
    /// use gsvram::core::psm::{AddressTables, Layout};
    ///
    /// let tables = AddressTables::new();
    /// let addr = tables.pixel_address(Layout::T4, 200, 77, 64, 4);
    /// assert_eq!(tables.pixel_coords(Layout::T4, addr, 64, 4), (200, 77));
    /// ```
    pub fn pixel_coords(&self, layout: Layout, addr: u32, bp: u32, bw: u32) -> (u32, u32) {
        let (pw, ph) = layout.page_size();
        let shift = layout.page_shift();
        let rel = addr.wrapping_sub(bp << (shift - 5)) & layout.element_mask();
        let page = rel >> shift;
        let packed = self.layout(layout).inverse[(rel & ((1 << shift) - 1)) as usize] as u32;
        let stride = layout.page_stride(bw).max(1);

        (
            (page % stride) * pw + (packed & 0xFF),
            (page / stride) * ph + (packed >> 8),
        )
    }
}
