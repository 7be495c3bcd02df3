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

//! Texture decode
//!
//! Converts a rectangle of a buffer to one `u32` per texel, either as RGBA32
//! or in the stored encoding. Large block-aligned rectangles can be split
//! into bands of block rows decoded on scoped threads; each band writes a
//! disjoint slice of the output, so the result is identical to the serial
//! path.

use std::hash::Hasher;

use fnv::FnvHasher;

use super::kernel::BufferDesc;
use super::plan::plan_rect;
use crate::core::local_memory::{LocalMemory, TexelLookup};
use crate::core::psm::Psm;
use crate::core::rect::Rect;

/// How stored pixels become output texels
#[derive(Debug, Clone, Copy)]
pub enum TexelConversion<'a> {
    /// Stored encoding (palette indices for indexed modes)
    Raw,
    /// RGBA32 through the palette and TEXA
    Rgba(TexelLookup<'a>),
}

impl TexelConversion<'_> {
    #[inline]
    fn apply(&self, psm: Psm, raw: u32) -> u32 {
        match self {
            TexelConversion::Raw => raw,
            TexelConversion::Rgba(lookup) => lookup.color(psm, raw),
        }
    }
}

impl LocalMemory {
    /// Decode `rect` of a buffer into `dst`
    ///
    /// `dst` is indexed `y * pitch + x` in buffer coordinates, so texel
    /// `(rect.left, rect.top)` lands at `rect.top * pitch + rect.left`. Texels
    /// outside `rect` are left untouched. An undersized `dst` is a caller bug:
    /// it asserts in debug builds and decodes nothing in release builds.
    pub fn decode_texture(
        &self,
        buf: BufferDesc,
        rect: Rect,
        conversion: &TexelConversion<'_>,
        dst: &mut [u32],
        pitch: usize,
    ) {
        if rect.is_empty() {
            return;
        }
        let needed = (rect.bottom as usize - 1) * pitch + rect.right as usize;
        if rect.right as usize > pitch || dst.len() < needed {
            debug_assert!(
                false,
                "decode_texture: {} texels at pitch {} cannot hold {:?}",
                dst.len(),
                pitch,
                rect
            );
            log::warn!("Texture decode of {:?} skipped: output buffer too small", rect);
            return;
        }

        let (bw_px, bh_px) = buf.psm.layout().block_size();
        let parallel = self.parallel;
        if parallel.enabled
            && parallel.threads > 1
            && rect.is_aligned(bw_px, bh_px)
            && rect.height() / bh_px >= parallel.min_block_rows
        {
            self.decode_parallel(buf, rect, conversion, dst, pitch);
        } else {
            self.decode_rows(buf, rect, conversion, dst, pitch, 0);
        }
    }

    fn decode_parallel(
        &self,
        buf: BufferDesc,
        rect: Rect,
        conversion: &TexelConversion<'_>,
        dst: &mut [u32],
        pitch: usize,
    ) {
        let (_, bh_px) = buf.psm.layout().block_size();
        let start = rect.top as usize * pitch;
        let end = (rect.bottom as usize * pitch).min(dst.len());
        let mut bands: Vec<(u32, &mut [u32])> = dst[start..end]
            .chunks_mut(bh_px as usize * pitch)
            .enumerate()
            .map(|(i, band)| (rect.top + i as u32 * bh_px, band))
            .collect();
        let per_thread = bands.len().div_ceil(self.parallel.threads);
        log::trace!(
            "Parallel decode of {:?}: {} bands on {} threads",
            rect,
            bands.len(),
            bands.len().div_ceil(per_thread)
        );

        std::thread::scope(|s| {
            for group in bands.chunks_mut(per_thread) {
                s.spawn(move || {
                    for (top, band) in group.iter_mut() {
                        let band_rect = Rect::new(rect.left, *top, rect.right, *top + bh_px);
                        self.decode_rows(buf, band_rect, conversion, band, pitch, *top);
                    }
                });
            }
        });
    }

    /// Serial decode into `out`, whose first row is buffer row `origin_y`
    fn decode_rows(
        &self,
        buf: BufferDesc,
        rect: Rect,
        conversion: &TexelConversion<'_>,
        out: &mut [u32],
        pitch: usize,
        origin_y: u32,
    ) {
        let psm = buf.psm;
        let layout = psm.layout();
        let (bw_px, _) = layout.block_size();
        let column = self.tables.column_table(layout);
        let plan = plan_rect(rect, layout);

        for span in &plan.blocks {
            let base = self.span_base(buf, span);
            for r in span.rows.clone() {
                let row = (span.y + r - origin_y) as usize * pitch + span.x as usize;
                let offsets = &column[(r * bw_px) as usize..((r + 1) * bw_px) as usize];
                for (texel, &off) in out[row..row + bw_px as usize].iter_mut().zip(offsets) {
                    *texel = conversion.apply(psm, self.read_element(psm, (base + off as usize) as u32));
                }
            }
        }

        for part in &plan.pixels {
            for y in part.top..part.bottom {
                let row = (y - origin_y) as usize * pitch;
                for x in part.left..part.right {
                    let raw = self.read_pixel(psm, x, y, buf.bp, buf.bw);
                    out[row + x as usize] = conversion.apply(psm, raw);
                }
            }
        }
    }

    /// FNV-1a hash of the stored pixels of `rect`
    pub fn content_hash(&self, buf: BufferDesc, rect: Rect) -> u64 {
        let mut hasher = FnvHasher::default();
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                hasher.write_u32(self.read_pixel(buf.psm, x, y, buf.bp, buf.bw));
            }
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SwizzleConfig;
    use crate::core::registers::Texa;

    fn filled(psm: Psm, bp: u32, bw: u32, w: u32, h: u32) -> LocalMemory {
        let mut mem = LocalMemory::default();
        for y in 0..h {
            for x in 0..w {
                mem.write_pixel(psm, x, y, bp, bw, x.wrapping_mul(31) ^ y.wrapping_mul(17) ^ 0x5A5A_5A5A);
            }
        }
        mem
    }

    #[test]
    fn test_raw_decode_matches_pixel_reads() {
        for psm in Psm::ALL {
            let mem = filled(psm, 32, 2, 128, 64);
            let buf = BufferDesc::new(psm, 32, 2);
            let rect = Rect::new(3, 5, 101, 61);
            let mut out = vec![0u32; 128 * 64];
            mem.decode_texture(buf, rect, &TexelConversion::Raw, &mut out, 128);

            for y in 0..64 {
                for x in 0..128 {
                    let expected = if rect.contains(&Rect::from_size(x, y, 1, 1)) {
                        mem.read_pixel(psm, x, y, 32, 2)
                    } else {
                        0
                    };
                    assert_eq!(out[(y * 128 + x) as usize], expected, "{psm} ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_rgba_decode_uses_palette() {
        let mem = filled(Psm::T8, 0, 2, 64, 32);
        let clut: [u32; 256] = std::array::from_fn(|i| 0xFF00_0000 | i as u32 * 3);
        let lookup = TexelLookup {
            clut: &clut,
            texa: Texa::default(),
        };
        let mut out = vec![0u32; 64 * 32];
        mem.decode_texture(
            BufferDesc::new(Psm::T8, 0, 2),
            Rect::new(0, 0, 64, 32),
            &TexelConversion::Rgba(lookup),
            &mut out,
            64,
        );
        assert_eq!(out[5 * 64 + 7], clut[mem.read_pixel(Psm::T8, 7, 5, 0, 2) as usize]);
    }

    #[test]
    fn test_parallel_decode_matches_serial() {
        let serial = filled(Psm::Ct16, 0, 4, 256, 128);
        let mut parallel = LocalMemory::new(&SwizzleConfig {
            parallel_decode: true,
            decode_threads: 3,
            parallel_min_block_rows: 2,
            ..SwizzleConfig::default()
        });
        parallel.raw_mut().words_mut().copy_from_slice(serial.raw().words());

        let buf = BufferDesc::new(Psm::Ct16, 0, 4);
        let rect = Rect::new(16, 8, 240, 128);
        let mut a = vec![0u32; 256 * 128];
        let mut b = vec![0u32; 256 * 128];
        serial.decode_texture(buf, rect, &TexelConversion::Raw, &mut a, 256);
        parallel.decode_texture(buf, rect, &TexelConversion::Raw, &mut b, 256);
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_hash_tracks_changes() {
        let mut mem = filled(Psm::Ct32, 0, 1, 64, 32);
        let buf = BufferDesc::new(Psm::Ct32, 0, 1);
        let rect = Rect::new(0, 0, 16, 16);
        let before = mem.content_hash(buf, rect);
        assert_eq!(before, mem.content_hash(buf, rect));

        mem.write_pixel(Psm::Ct32, 40, 20, 0, 1, 0);
        assert_eq!(before, mem.content_hash(buf, rect));

        mem.write_pixel(Psm::Ct32, 4, 4, 0, 1, 0xFFFF_FFFF);
        assert_ne!(before, mem.content_hash(buf, rect));
    }
}
