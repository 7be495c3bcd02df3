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

//! Pixel rectangles
//!
//! Rectangles are half-open: `left..right` by `top..bottom`.

use serde::{Deserialize, Serialize};

/// Half-open pixel rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

#[inline]
pub(crate) fn align_down(v: u32, a: u32) -> u32 {
    v & !(a - 1)
}

#[inline]
pub(crate) fn align_up(v: u32, a: u32) -> u32 {
    v.saturating_add(a - 1) & !(a - 1)
}

impl Rect {
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle from origin and size
    pub const fn from_size(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Overlap of two rectangles (possibly empty)
    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        )
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Bounding box of two rectangles; empty inputs are ignored
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// True if `other` lies entirely inside this rectangle
    pub fn contains(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.left >= self.left
                && other.top >= self.top
                && other.right <= self.right
                && other.bottom <= self.bottom)
    }

    /// Grow outwards to multiples of `(w, h)` (both powers of two)
    pub fn align_outside(&self, w: u32, h: u32) -> Rect {
        Rect::new(
            align_down(self.left, w),
            align_down(self.top, h),
            align_up(self.right, w),
            align_up(self.bottom, h),
        )
    }

    /// Parts of this rectangle not covered by `other`, at most four
    pub fn subtract(&self, other: &Rect) -> Vec<Rect> {
        if self.is_empty() {
            return Vec::new();
        }
        let cut = self.intersect(other);
        if cut.is_empty() {
            return vec![*self];
        }
        let mut parts = Vec::with_capacity(4);
        if self.top < cut.top {
            parts.push(Rect::new(self.left, self.top, self.right, cut.top));
        }
        if cut.bottom < self.bottom {
            parts.push(Rect::new(self.left, cut.bottom, self.right, self.bottom));
        }
        if self.left < cut.left {
            parts.push(Rect::new(self.left, cut.top, cut.left, cut.bottom));
        }
        if cut.right < self.right {
            parts.push(Rect::new(cut.right, cut.top, self.right, cut.bottom));
        }
        parts
    }

    /// True if every edge is a multiple of `(w, h)`
    pub fn is_aligned(&self, w: u32, h: u32) -> bool {
        self.left % w == 0 && self.right % w == 0 && self.top % h == 0 && self.bottom % h == 0
    }
}
