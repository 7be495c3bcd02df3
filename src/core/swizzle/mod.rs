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

//! Swizzle engine
//!
//! Moves pixels between packed host images and the block/column layout of
//! local memory:
//!
//! - [`LocalMemory::swizzle_in`]: host to local, resumable through a cursor
//! - [`LocalMemory::read_image`]: local to host, resumable through a cursor
//! - [`LocalMemory::unswizzle_out`]: a whole rectangle to a linear image
//! - [`LocalMemory::move_rect`]: local to local, honouring the copy order
//! - [`LocalMemory::decode_texture`]: to RGBA32 or raw texels
//!
//! Whole rows are split by [`plan`] into block spans for the kernels and a
//! per-pixel remainder; partial rows at either end of a chunk are stepped
//! pixel by pixel.

mod cursor;
mod decode;
mod kernel;
mod linear;
mod plan;

pub use cursor::{ImageTransfer, TransferCursor, TransferDirection, TransferRegion};
pub use decode::TexelConversion;
pub use kernel::{BufferDesc, KernelStrategy};

use linear::{read_packed, write_packed, LinearDst, LinearSrc};
use plan::plan_rect;

use crate::core::local_memory::LocalMemory;
use crate::core::rect::Rect;

impl TransferRegion {
    /// Buffer the region lives in
    pub fn buffer(&self) -> BufferDesc {
        BufferDesc::new(self.psm, self.bp, self.bw)
    }
}

/// Bring a cursor that points outside its region back to a row start
fn normalize(region: &TransferRegion, mut cursor: TransferCursor) -> TransferCursor {
    if cursor.x < region.x || cursor.x >= region.right() {
        debug_assert!(false, "transfer cursor {:?} outside {:?}", cursor, region);
        if cursor.x >= region.right() {
            cursor.y += 1;
        }
        cursor.x = region.x;
    }
    cursor
}

impl LocalMemory {
    /// Store host data into `region`, starting at `cursor`
    ///
    /// `src` holds consecutive pixels in transfer order (rows left to right,
    /// top to bottom) packed at the mode's transfer width; a trailing partial
    /// pixel is ignored. Returns the cursor after the last pixel stored, and
    /// data past the end of the region is dropped. Feeding a transfer in
    /// several chunks gives the same memory contents as feeding it in one.
    ///
    /// # Examples
    ///
    /// ```
    /// use gsvram::core::local_memory::LocalMemory;
    /// use gsvram::core::psm::Psm;
    /// use gsvram::core::swizzle::{TransferCursor, TransferRegion};
    ///
    /// let mut mem = LocalMemory::default();
    /// let region = TransferRegion { bp: 0, bw: 1, psm: Psm::Ct32, x: 0, y: 0, width: 2, height: 1 };
    /// let data = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
    /// let cursor = mem.swizzle_in(&region, TransferCursor::start(&region), &data);
    ///
    /// assert!(cursor.is_complete(&region));
    /// assert_eq!(mem.read_pixel(Psm::Ct32, 1, 0, 0, 1), 0x8877_6655);
    /// ```
    pub fn swizzle_in(&mut self, region: &TransferRegion, cursor: TransferCursor, src: &[u8]) -> TransferCursor {
        if src.is_empty() || cursor.is_complete(region) {
            return cursor;
        }
        let mut cursor = normalize(region, cursor);
        let bits = region.bits_per_pixel() as usize;
        let mut src = src;
        log::trace!(
            "swizzle_in {} bytes of {} at ({}, {}) bp={} bw={}",
            src.len(),
            region.psm,
            cursor.x,
            cursor.y,
            region.bp,
            region.bw
        );

        if cursor.x != region.x {
            let row_bits = (region.right() - cursor.x) as usize * bits;
            if row_bits % 8 != 0 {
                return self.write_stream(region, cursor, src);
            }
            let n = (row_bits / 8).min(src.len());
            cursor = self.write_stream(region, cursor, &src[..n]);
            src = &src[n..];
            if cursor.x != region.x {
                return cursor;
            }
        }

        let row_bits = region.width as usize * bits;
        if row_bits % 8 == 0 && !cursor.is_complete(region) {
            let pitch = row_bits / 8;
            let rows = ((src.len() / pitch) as u64).min((region.bottom() - cursor.y) as u64) as u32;
            if rows > 0 {
                let rect = Rect::new(region.x, cursor.y, region.right(), cursor.y + rows);
                let linear = LinearSrc::new(src, pitch, region.x, cursor.y, bits as u32);
                self.write_rect(region.buffer(), rect, &linear);
                cursor.y += rows;
                src = &src[rows as usize * pitch..];
            }
        }

        if !src.is_empty() && !cursor.is_complete(region) {
            cursor = self.write_stream(region, cursor, src);
        }
        cursor
    }

    fn write_stream(&mut self, region: &TransferRegion, mut cursor: TransferCursor, src: &[u8]) -> TransferCursor {
        let bits = region.bits_per_pixel();
        let count = src.len() * 8 / bits as usize;
        let mut bit = 0;
        for _ in 0..count {
            if cursor.is_complete(region) {
                break;
            }
            let value = read_packed(src, bit, bits);
            self.write_pixel(region.psm, cursor.x, cursor.y, region.bp, region.bw, value);
            cursor.advance(region);
            bit += bits as usize;
        }
        cursor
    }

    fn write_rect(&mut self, buf: BufferDesc, rect: Rect, src: &LinearSrc<'_>) {
        let plan = plan_rect(rect, buf.psm.layout());
        for span in &plan.blocks {
            self.write_span(buf, span, src);
        }
        for part in &plan.pixels {
            for y in part.top..part.bottom {
                for x in part.left..part.right {
                    self.write_pixel(buf.psm, x, y, buf.bp, buf.bw, src.pixel(x, y));
                }
            }
        }
    }

    /// Copy the whole of `region` into a linear image
    ///
    /// `dst` receives row `y - region.y` at byte offset `(y - region.y) * dst_pitch`,
    /// packed at the mode's transfer width. An undersized `dst` is a caller
    /// bug: it asserts in debug builds and copies nothing in release builds.
    pub fn unswizzle_out(&self, region: &TransferRegion, dst: &mut [u8], dst_pitch: usize) {
        if region.width == 0 || region.height == 0 {
            return;
        }
        let bits = region.bits_per_pixel();
        let row_bytes = (region.width as usize * bits as usize).div_ceil(8);
        let needed = (region.height as usize - 1) * dst_pitch + row_bytes;
        if dst_pitch < row_bytes || dst.len() < needed {
            debug_assert!(
                false,
                "unswizzle_out: {} bytes at pitch {} cannot hold {}x{} {}",
                dst.len(),
                dst_pitch,
                region.width,
                region.height,
                region.psm
            );
            log::warn!("unswizzle_out of {:?} skipped: output buffer too small", region.rect());
            return;
        }

        let (bw_px, bh_px) = region.psm.layout().block_size();
        let parallel = self.parallel;
        if parallel.enabled
            && parallel.threads > 1
            && region.rect().is_aligned(bw_px, bh_px)
            && region.height / bh_px >= parallel.min_block_rows
        {
            self.unswizzle_parallel(region, &mut dst[..needed], dst_pitch);
        } else {
            let mut linear = LinearDst::new(dst, dst_pitch, region.x, region.y, bits);
            self.read_rect(region.buffer(), region.rect(), &mut linear);
        }
    }

    /// Block rows are disjoint in memory and in the output, so each band of
    /// `dst` is filled independently.
    fn unswizzle_parallel(&self, region: &TransferRegion, dst: &mut [u8], dst_pitch: usize) {
        let buf = region.buffer();
        let bits = region.bits_per_pixel();
        let (_, bh_px) = region.psm.layout().block_size();
        let mut bands: Vec<(u32, &mut [u8])> = dst
            .chunks_mut(bh_px as usize * dst_pitch)
            .enumerate()
            .map(|(i, band)| (region.y + i as u32 * bh_px, band))
            .collect();
        let per_thread = bands.len().div_ceil(self.parallel.threads);

        std::thread::scope(|s| {
            for group in bands.chunks_mut(per_thread) {
                s.spawn(move || {
                    for (top, band) in group.iter_mut() {
                        let rect = Rect::new(region.x, *top, region.right(), *top + bh_px);
                        let mut linear = LinearDst::new(band, dst_pitch, region.x, *top, bits);
                        self.read_rect(buf, rect, &mut linear);
                    }
                });
            }
        });
    }

    fn read_rect(&self, buf: BufferDesc, rect: Rect, dst: &mut LinearDst<'_>) {
        let plan = plan_rect(rect, buf.psm.layout());
        for span in &plan.blocks {
            self.read_span(buf, span, dst);
        }
        for part in &plan.pixels {
            for y in part.top..part.bottom {
                for x in part.left..part.right {
                    dst.set(x, y, self.read_pixel(buf.psm, x, y, buf.bp, buf.bw));
                }
            }
        }
    }

    /// Read `region` back to the host, starting at `cursor`
    ///
    /// Fills as much of `dst` as the remaining pixels allow and returns the
    /// advanced cursor with the number of bytes produced.
    pub fn read_image(&self, region: &TransferRegion, cursor: TransferCursor, dst: &mut [u8]) -> (TransferCursor, usize) {
        if dst.is_empty() || cursor.is_complete(region) {
            return (cursor, 0);
        }
        let mut cursor = normalize(region, cursor);
        let bits = region.bits_per_pixel() as usize;
        let mut written = 0;

        if cursor.x != region.x {
            let row_bits = (region.right() - cursor.x) as usize * bits;
            if row_bits % 8 != 0 {
                return self.read_stream(region, cursor, dst);
            }
            let n = (row_bits / 8).min(dst.len());
            let (next, count) = self.read_stream(region, cursor, &mut dst[..n]);
            cursor = next;
            written += count;
            if cursor.x != region.x {
                return (cursor, written);
            }
        }

        let row_bits = region.width as usize * bits;
        if row_bits % 8 == 0 && !cursor.is_complete(region) {
            let pitch = row_bits / 8;
            let rows = (((dst.len() - written) / pitch) as u64).min((region.bottom() - cursor.y) as u64) as u32;
            if rows > 0 {
                let end = written + rows as usize * pitch;
                let rect = Rect::new(region.x, cursor.y, region.right(), cursor.y + rows);
                let mut linear = LinearDst::new(&mut dst[written..end], pitch, region.x, cursor.y, bits as u32);
                self.read_rect(region.buffer(), rect, &mut linear);
                cursor.y += rows;
                written = end;
            }
        }

        if written < dst.len() && !cursor.is_complete(region) {
            let (next, count) = self.read_stream(region, cursor, &mut dst[written..]);
            cursor = next;
            written += count;
        }
        (cursor, written)
    }

    fn read_stream(&self, region: &TransferRegion, mut cursor: TransferCursor, dst: &mut [u8]) -> (TransferCursor, usize) {
        let bits = region.bits_per_pixel();
        let count = dst.len() * 8 / bits as usize;
        let mut bit = 0;
        for _ in 0..count {
            if cursor.is_complete(region) {
                break;
            }
            let value = self.read_pixel(region.psm, cursor.x, cursor.y, region.bp, region.bw);
            write_packed(dst, bit, bits, value);
            cursor.advance(region);
            bit += bits as usize;
        }
        (cursor, bit.div_ceil(8))
    }

    /// Copy a rectangle between two buffers
    ///
    /// `dir` is the TRXPOS copy order: bit 0 walks rows bottom-up, bit 1
    /// walks columns right-to-left. The order only matters when the two
    /// rectangles overlap in memory. Pixels are copied in their stored
    /// encoding and truncated to the destination mode.
    pub fn move_rect(&mut self, src: &TransferRegion, dst: &TransferRegion, dir: u32) {
        let width = src.width.min(dst.width);
        let height = src.height.min(dst.height);
        log::trace!(
            "move {}x{} {} ({}, {}) -> {} ({}, {}) dir={}",
            width,
            height,
            src.psm,
            src.x,
            src.y,
            dst.psm,
            dst.x,
            dst.y,
            dir
        );

        for j in 0..height {
            let dy = if dir & 1 != 0 { height - 1 - j } else { j };
            for i in 0..width {
                let dx = if dir & 2 != 0 { width - 1 - i } else { i };
                let value = self.read_pixel(src.psm, src.x + dx, src.y + dy, src.bp, src.bw);
                self.write_pixel(dst.psm, dst.x + dx, dst.y + dy, dst.bp, dst.bw, value);
            }
        }
    }
}
