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

//! Block kernels
//!
//! Both kernels walk a [`BlockSpan`] row by row through the in-block column
//! table. The scalar kernel reads and writes every pixel through the element
//! accessors and handles any storage mode. The wide kernel reinterprets a
//! linear row as typed elements and stores them straight into the arena
//! view; it covers the modes whose host and storage encodings coincide and
//! falls back to the scalar path for a row it cannot cast.

use std::fmt;
use std::sync::Arc;

use super::linear::{LinearDst, LinearSrc};
use super::plan::BlockSpan;
use crate::core::config::KernelPreference;
use crate::core::local_memory::LocalMemory;
use crate::core::psm::Psm;

/// Block kernel used for bulk transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelStrategy {
    /// Table-driven per-element copy
    Scalar,
    /// Typed row copy through cast slices
    Wide,
}

impl KernelStrategy {
    /// Pick a kernel for this host
    ///
    /// The wide kernel relies on the arena and host rows sharing byte order,
    /// so big-endian hosts always get the scalar kernel.
    pub fn select(preference: KernelPreference) -> Self {
        if cfg!(target_endian = "big") {
            return KernelStrategy::Scalar;
        }
        match preference {
            KernelPreference::Scalar => KernelStrategy::Scalar,
            KernelPreference::Wide => KernelStrategy::Wide,
            KernelPreference::Auto => {
                if Self::host_has_vector_unit() {
                    KernelStrategy::Wide
                } else {
                    KernelStrategy::Scalar
                }
            }
        }
    }

    #[cfg(target_arch = "x86_64")]
    fn host_has_vector_unit() -> bool {
        std::is_x86_feature_detected!("sse2")
    }

    #[cfg(target_arch = "aarch64")]
    fn host_has_vector_unit() -> bool {
        std::arch::is_aarch64_feature_detected!("neon")
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    fn host_has_vector_unit() -> bool {
        false
    }
}

impl fmt::Display for KernelStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelStrategy::Scalar => write!(f, "scalar"),
            KernelStrategy::Wide => write!(f, "wide"),
        }
    }
}

/// A buffer in local memory: base pointer, width and storage mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub psm: Psm,
    /// Base pointer (blocks)
    pub bp: u32,
    /// Width (64 pixel units)
    pub bw: u32,
}

impl BufferDesc {
    pub fn new(psm: Psm, bp: u32, bw: u32) -> Self {
        Self { psm, bp, bw }
    }
}

impl LocalMemory {
    /// First element of the block holding `span`
    #[inline]
    pub(crate) fn span_base(&self, target: BufferDesc, span: &BlockSpan) -> usize {
        let layout = target.psm.layout();
        let block = self
            .tables
            .block_address(layout, span.x, span.y, target.bp, target.bw);
        self.tables.block_base(layout, block) as usize
    }

    /// Store a span of linear pixels
    pub(crate) fn write_span(&mut self, target: BufferDesc, span: &BlockSpan, src: &LinearSrc<'_>) {
        let layout = target.psm.layout();
        let (bw_px, _) = layout.block_size();
        let base = self.span_base(target, span);
        let tables = Arc::clone(&self.tables);
        let column = tables.column_table(layout);

        for r in span.rows.clone() {
            let y = span.y + r;
            let offsets = &column[(r * bw_px) as usize..((r + 1) * bw_px) as usize];
            if self.strategy == KernelStrategy::Wide
                && self.write_row_wide(target.psm, base, offsets, src.row_bytes(span.x, y, bw_px))
            {
                continue;
            }
            for (i, &off) in offsets.iter().enumerate() {
                let value = src.pixel(span.x + i as u32, y);
                self.write_element(target.psm, (base + off as usize) as u32, value);
            }
        }
    }

    fn write_row_wide(&mut self, psm: Psm, base: usize, offsets: &[u16], row: Option<&[u8]>) -> bool {
        let Some(row) = row else {
            return false;
        };
        match psm {
            Psm::Ct32 | Psm::Z32 => {
                let Ok(pixels) = bytemuck::try_cast_slice::<u8, u32>(row) else {
                    return false;
                };
                let words = &mut self.vm.words_mut()[base..];
                for (&off, &value) in offsets.iter().zip(pixels) {
                    words[off as usize] = value;
                }
                true
            }
            Psm::Ct16 | Psm::Ct16S | Psm::Z16 | Psm::Z16S => {
                let Ok(pixels) = bytemuck::try_cast_slice::<u8, u16>(row) else {
                    return false;
                };
                let halves = &mut self.vm.halves_mut()[base..];
                for (&off, &value) in offsets.iter().zip(pixels) {
                    halves[off as usize] = value;
                }
                true
            }
            Psm::T8 => {
                let bytes = &mut self.vm.bytes_mut()[base..];
                for (&off, &value) in offsets.iter().zip(row) {
                    bytes[off as usize] = value;
                }
                true
            }
            _ => false,
        }
    }

    /// Load a span into linear pixels
    pub(crate) fn read_span(&self, target: BufferDesc, span: &BlockSpan, dst: &mut LinearDst<'_>) {
        let layout = target.psm.layout();
        let (bw_px, _) = layout.block_size();
        let base = self.span_base(target, span);
        let column = self.tables.column_table(layout);

        for r in span.rows.clone() {
            let y = span.y + r;
            let offsets = &column[(r * bw_px) as usize..((r + 1) * bw_px) as usize];
            if self.strategy == KernelStrategy::Wide
                && self.read_row_wide(target.psm, base, offsets, dst.row_bytes_mut(span.x, y, bw_px))
            {
                continue;
            }
            for (i, &off) in offsets.iter().enumerate() {
                let value = self.read_element(target.psm, (base + off as usize) as u32);
                dst.set(span.x + i as u32, y, value);
            }
        }
    }

    fn read_row_wide(&self, psm: Psm, base: usize, offsets: &[u16], row: Option<&mut [u8]>) -> bool {
        let Some(row) = row else {
            return false;
        };
        match psm {
            Psm::Ct32 | Psm::Z32 => {
                let Ok(pixels) = bytemuck::try_cast_slice_mut::<u8, u32>(row) else {
                    return false;
                };
                let words = &self.vm.words()[base..];
                for (&off, out) in offsets.iter().zip(pixels) {
                    *out = words[off as usize];
                }
                true
            }
            Psm::Ct16 | Psm::Ct16S | Psm::Z16 | Psm::Z16S => {
                let Ok(pixels) = bytemuck::try_cast_slice_mut::<u8, u16>(row) else {
                    return false;
                };
                let halves = &self.vm.halves()[base..];
                for (&off, out) in offsets.iter().zip(pixels) {
                    *out = halves[off as usize];
                }
                true
            }
            Psm::T8 => {
                let bytes = &self.vm.bytes()[base..];
                for (&off, out) in offsets.iter().zip(row) {
                    *out = bytes[off as usize];
                }
                true
            }
            _ => false,
        }
    }
}
