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

//! Page occupancy bitsets
//!
//! Overlap between a memory write and a cached texture is first decided at
//! page granularity.

use crate::core::psm::{Layout, MAX_PAGES};
use crate::core::rect::Rect;

/// Set of local memory pages (512 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageSet {
    bits: [u64; (MAX_PAGES as usize) / 64],
}

impl PageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every page in memory
    pub fn all() -> Self {
        Self {
            bits: [u64::MAX; (MAX_PAGES as usize) / 64],
        }
    }

    #[inline]
    pub fn insert(&mut self, page: u32) {
        let page = page & (MAX_PAGES - 1);
        self.bits[(page >> 6) as usize] |= 1 << (page & 63);
    }

    #[inline]
    pub fn contains(&self, page: u32) -> bool {
        let page = page & (MAX_PAGES - 1);
        self.bits[(page >> 6) as usize] & (1 << (page & 63)) != 0
    }

    pub fn intersects(&self, other: &PageSet) -> bool {
        self.bits.iter().zip(other.bits.iter()).any(|(a, b)| a & b != 0)
    }

    pub fn union_with(&mut self, other: &PageSet) {
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a |= b;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Pages touched by the pixel rectangle `[left, right) × [top, bottom)`
    /// of a buffer in `layout` based at `bp`, `bw` wide
    ///
    /// A base pointer that is not page aligned spreads each buffer page over
    /// two memory pages; both are included.
    pub fn from_rect(layout: Layout, bp: u32, bw: u32, left: u32, top: u32, right: u32, bottom: u32) -> Self {
        let mut set = Self::new();
        if left >= right || top >= bottom {
            return set;
        }

        let (pw, ph) = layout.page_size();
        let stride = layout.page_stride(bw);
        let straddles = bp & 31 != 0;
        let first = bp >> 5;

        for py in top / ph..=(bottom - 1) / ph {
            for px in left / pw..=(right - 1) / pw {
                let page = first.wrapping_add(py.wrapping_mul(stride)).wrapping_add(px);
                set.insert(page);
                if straddles {
                    set.insert(page.wrapping_add(1));
                }
            }
        }
        set
    }

    /// Part of `extent`, a rectangle of a buffer in `layout` based at `bp`,
    /// `bw` wide, that is stored in these pages
    ///
    /// The result is widened to whole buffer pages and is the bounding box
    /// of every such page, clipped to `extent`. This is how a write made
    /// through one layout is located in a buffer of another: pixel
    /// coordinates do not carry over, memory pages do.
    pub fn buffer_rect(&self, layout: Layout, bp: u32, bw: u32, extent: Rect) -> Rect {
        if extent.is_empty() {
            return Rect::default();
        }

        let (pw, ph) = layout.page_size();
        let stride = layout.page_stride(bw);
        let straddles = bp & 31 != 0;
        let first = bp >> 5;
        let mut touched = Rect::default();

        for py in extent.top / ph..=(extent.bottom - 1) / ph {
            for px in extent.left / pw..=(extent.right - 1) / pw {
                let page = first.wrapping_add(py.wrapping_mul(stride)).wrapping_add(px);
                if self.contains(page) || (straddles && self.contains(page.wrapping_add(1))) {
                    touched = touched.union(&Rect::new(px * pw, py * ph, (px + 1) * pw, (py + 1) * ph));
                }
            }
        }
        touched.intersect(&extent)
    }

    /// Pages covering a byte range of local memory
    pub fn from_byte_range(offset: usize, len: usize) -> Self {
        let mut set = Self::new();
        if len == 0 {
            return set;
        }
        let first = offset / super::PAGE_SIZE;
        let last = (offset + len - 1) / super::PAGE_SIZE;
        if last - first >= MAX_PAGES as usize {
            return Self::all();
        }
        for page in first..=last {
            set.insert(page as u32);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_wrap() {
        let mut set = PageSet::new();
        set.insert(3);
        set.insert(512 + 7);
        assert!(set.contains(3));
        assert!(set.contains(7));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_from_rect() {
        // 128×64 in a 2-page wide 32-bit buffer: pages 0..4
        let set = PageSet::from_rect(Layout::Ct32, 0, 2, 0, 0, 128, 64);
        assert_eq!(set.len(), 4);
        assert!(set.contains(3));
        assert!(!set.contains(4));

        // Unaligned base pointer spills into the next page
        let set = PageSet::from_rect(Layout::Ct32, 1, 1, 0, 0, 8, 8);
        assert!(set.contains(0));
        assert!(set.contains(1));

        assert!(PageSet::from_rect(Layout::T4, 0, 1, 5, 5, 5, 9).is_empty());
    }

    #[test]
    fn test_intersects() {
        let a = PageSet::from_rect(Layout::Ct16, 32, 1, 0, 0, 64, 64);
        let b = PageSet::from_byte_range(8192, 4);
        let c = PageSet::from_byte_range(0, 8192);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_buffer_rect_maps_pages_across_layouts() {
        // Second page of a 32-bit buffer two pages wide
        let written = PageSet::from_rect(Layout::Ct32, 0, 2, 72, 0, 80, 8);
        assert_eq!(written, {
            let mut page = PageSet::new();
            page.insert(1);
            page
        });

        // 8-bit pages are 128×64 with one page per row at the same width
        assert_eq!(
            written.buffer_rect(Layout::T8, 0, 2, Rect::new(0, 0, 128, 128)),
            Rect::new(0, 64, 128, 128)
        );
        // 16-bit pages are 64×64, one per row at width 1
        assert_eq!(
            written.buffer_rect(Layout::Ct16, 0, 1, Rect::new(0, 0, 64, 128)),
            Rect::new(0, 64, 64, 128)
        );
        // Clipped to the extent
        assert_eq!(
            written.buffer_rect(Layout::Ct16, 0, 1, Rect::new(0, 0, 16, 80)),
            Rect::new(0, 64, 16, 80)
        );
        assert!(written
            .buffer_rect(Layout::Ct16, 0, 1, Rect::new(0, 0, 64, 64))
            .is_empty());

        // A buffer base inside page 0 also reaches into page 1
        assert_eq!(
            written.buffer_rect(Layout::Ct32, 16, 1, Rect::new(0, 0, 64, 32)),
            Rect::new(0, 0, 64, 32)
        );
    }

    #[test]
    fn test_from_byte_range_everything() {
        let set = PageSet::from_byte_range(100, super::super::MEMORY_SIZE + 1);
        assert_eq!(set, PageSet::all());
    }
}
