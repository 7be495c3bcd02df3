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

//! Dirty rectangle tracking
//!
//! Rectangles are recorded in pixels of the owner's own layout. A write made
//! through the same layout, base pointer and width keeps its rectangle; any
//! other write is located through the memory pages it touched (see
//! [`PageSet::buffer_rect`](crate::core::memory::PageSet::buffer_rect)).

use crate::core::psm::Psm;
use crate::core::rect::Rect;

/// Lists longer than this collapse into their bounding box
const MAX_RECTS: usize = 16;

/// A written rectangle, in pixels of `psm`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub rect: Rect,
    pub psm: Psm,
}

impl DirtyRect {
    pub fn new(rect: Rect, psm: Psm) -> Self {
        Self { rect, psm }
    }

    /// The rectangle aligned outward to whole blocks
    ///
    /// # Examples
    ///
    /// ```
    /// use gsvram::core::psm::Psm;
    /// use gsvram::core::rect::Rect;
    /// use gsvram::core::texture::DirtyRect;
    ///
    /// let dirty = DirtyRect::new(Rect::new(3, 3, 9, 5), Psm::Ct16);
    /// assert_eq!(dirty.aligned(), Rect::new(0, 0, 16, 8));
    /// ```
    pub fn aligned(&self) -> Rect {
        let (bw, bh) = self.psm.block_size();
        self.rect.align_outside(bw, bh)
    }
}

/// Pending dirty rectangles of one cache entry or render target
#[derive(Debug, Clone, Default)]
pub struct DirtyRectList {
    rects: Vec<DirtyRect>,
}

impl DirtyRectList {
    pub fn push(&mut self, dirty: DirtyRect) {
        if dirty.rect.is_empty() {
            return;
        }
        debug_assert!(
            self.rects.iter().all(|r| r.psm.layout() == dirty.psm.layout()),
            "dirty rectangles of one owner must share a layout"
        );
        if self.rects.iter().any(|r| r.rect.contains(&dirty.rect)) {
            return;
        }
        self.rects.push(dirty);
        if self.rects.len() > MAX_RECTS {
            let bounds = self.bounds();
            self.rects.clear();
            self.rects.push(DirtyRect::new(bounds, dirty.psm));
        }
    }

    /// Append every rectangle of `other`
    pub fn extend(&mut self, other: &DirtyRectList) {
        for &dirty in &other.rects {
            self.push(dirty);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirtyRect> {
        self.rects.iter()
    }

    /// Union of every rectangle, block aligned
    pub fn bounds(&self) -> Rect {
        self.rects
            .iter()
            .fold(Rect::default(), |acc, r| acc.union(&r.aligned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_uses_own_block_size() {
        let ct16 = DirtyRect::new(Rect::new(17, 9, 31, 16), Psm::Ct16);
        assert_eq!(ct16.aligned(), Rect::new(16, 8, 32, 16));

        let t4 = DirtyRect::new(Rect::new(1, 1, 33, 2), Psm::T4);
        assert_eq!(t4.aligned(), Rect::new(0, 0, 64, 16));

        let ct24 = DirtyRect::new(Rect::new(3, 3, 5, 5), Psm::Ct24);
        assert_eq!(ct24.aligned(), Rect::new(0, 0, 8, 8));
    }

    #[test]
    fn test_list_merges_and_collapses() {
        let mut list = DirtyRectList::default();
        list.push(DirtyRect::new(Rect::new(0, 0, 64, 64), Psm::Ct32));
        list.push(DirtyRect::new(Rect::new(8, 8, 16, 16), Psm::Ct32));
        list.push(DirtyRect::new(Rect::default(), Psm::Ct32));
        assert_eq!(list.len(), 1);

        for i in 0..20 {
            list.push(DirtyRect::new(Rect::new(100 + i * 8, 0, 108 + i * 8, 8), Psm::Ct32));
        }
        assert!(list.len() <= MAX_RECTS);
        assert_eq!(list.bounds(), Rect::new(0, 0, 264, 64));

        list.clear();
        assert!(list.is_empty());
        assert!(list.bounds().is_empty());
    }

    #[test]
    fn test_extend_keeps_both_lists() {
        let mut a = DirtyRectList::default();
        a.push(DirtyRect::new(Rect::new(0, 0, 8, 8), Psm::Ct32));
        let mut b = DirtyRectList::default();
        b.push(DirtyRect::new(Rect::new(16, 16, 24, 24), Psm::Ct24));

        a.extend(&b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.bounds(), Rect::new(0, 0, 24, 24));
    }
}
