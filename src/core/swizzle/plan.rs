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

//! Rectangle decomposition
//!
//! A transfer rectangle is split into whole blocks, column runs of the
//! partial block rows above and below them, and a per-pixel remainder. Block
//! and column spans go through the block kernels; the remainder goes through
//! pixel addressing.

use std::ops::Range;

use crate::core::psm::Layout;
use crate::core::rect::{align_down, align_up, Rect};

/// Rows `rows` of the block whose top-left pixel is `(x, y)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockSpan {
    pub x: u32,
    pub y: u32,
    pub rows: Range<u32>,
}

#[derive(Debug, Default)]
pub(crate) struct TransferPlan {
    pub blocks: Vec<BlockSpan>,
    pub pixels: Vec<Rect>,
}

pub(crate) fn plan_rect(rect: Rect, layout: Layout) -> TransferPlan {
    let mut plan = TransferPlan::default();
    if rect.is_empty() {
        return plan;
    }

    let (bw, bh) = layout.block_size();
    let ch = layout.column_height();
    let ax0 = align_up(rect.left, bw);
    let ax1 = align_down(rect.right, bw);

    if ax0 >= ax1 {
        plan.pixels.push(rect);
        return plan;
    }

    if rect.left < ax0 {
        plan.pixels.push(Rect::new(rect.left, rect.top, ax0, rect.bottom));
    }
    if ax1 < rect.right {
        plan.pixels.push(Rect::new(ax1, rect.top, rect.right, rect.bottom));
    }

    let mut by = align_down(rect.top, bh);
    while by < rect.bottom {
        let r0 = rect.top.max(by) - by;
        let r1 = rect.bottom.min(by + bh) - by;
        let c0 = align_up(r0, ch).min(r1);
        let c1 = align_down(r1, ch).max(c0);

        if c0 < c1 {
            let mut bx = ax0;
            while bx < ax1 {
                plan.blocks.push(BlockSpan {
                    x: bx,
                    y: by,
                    rows: c0..c1,
                });
                bx += bw;
            }
        }
        if r0 < c0 {
            plan.pixels.push(Rect::new(ax0, by + r0, ax1, by + c0));
        }
        if c1 < r1 {
            plan.pixels.push(Rect::new(ax0, by + c1, ax1, by + r1));
        }
        by += bh;
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn coverage(rect: Rect, layout: Layout) -> Vec<u32> {
        let (bw, _) = layout.block_size();
        let plan = plan_rect(rect, layout);
        let w = rect.right as usize;
        let mut hits = vec![0u32; w * rect.bottom as usize];
        for span in &plan.blocks {
            for r in span.rows.clone() {
                for i in 0..bw {
                    hits[(span.y + r) as usize * w + (span.x + i) as usize] += 1;
                }
            }
        }
        for p in &plan.pixels {
            for y in p.top..p.bottom {
                for x in p.left..p.right {
                    hits[y as usize * w + x as usize] += 1;
                }
            }
        }
        hits
    }

    #[test]
    fn test_aligned_rect_is_all_blocks() {
        let plan = plan_rect(Rect::new(0, 0, 64, 32), Layout::Ct32);
        assert!(plan.pixels.is_empty());
        assert_eq!(plan.blocks.len(), 8 * 4);
        assert!(plan.blocks.iter().all(|b| b.rows == (0..8)));
    }

    #[test]
    fn test_strips_use_column_runs() {
        // T8 blocks are 16x16 with 4-row columns
        let plan = plan_rect(Rect::new(0, 5, 32, 16), Layout::T8);
        assert_eq!(plan.blocks.len(), 2);
        assert!(plan.blocks.iter().all(|b| b.rows == (8..16)));
        assert_eq!(plan.pixels, vec![Rect::new(0, 5, 32, 8)]);
    }

    #[test]
    fn test_narrow_rect_is_per_pixel() {
        let plan = plan_rect(Rect::new(3, 0, 7, 40), Layout::Ct16);
        assert!(plan.blocks.is_empty());
        assert_eq!(plan.pixels, vec![Rect::new(3, 0, 7, 40)]);
    }

    proptest! {
        #[test]
        fn prop_plan_covers_each_pixel_once(
            layout_index in 0usize..8,
            left in 0u32..80,
            top in 0u32..80,
            w in 1u32..150,
            h in 1u32..150,
        ) {
            let layout = Layout::ALL[layout_index];
            let rect = Rect::from_size(left, top, w, h);
            let hits = coverage(rect, layout);
            let width = rect.right as usize;
            for y in 0..rect.bottom {
                for x in 0..rect.right {
                    let expected = u32::from(x >= rect.left && y >= rect.top);
                    prop_assert_eq!(hits[y as usize * width + x as usize], expected, "({}, {})", x, y);
                }
            }
        }
    }
}
