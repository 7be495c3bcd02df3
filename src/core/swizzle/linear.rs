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

//! Packed host-side images
//!
//! Host data is row-major with a byte pitch. Pixels are packed little-endian
//! at 32, 24, 16, 8 or 4 bits; a 4-bit byte holds the left pixel in its low
//! nibble.

/// Read a packed pixel starting at bit offset `bit`
#[inline]
pub(crate) fn read_packed(data: &[u8], bit: usize, bits: u32) -> u32 {
    let i = bit >> 3;
    match bits {
        32 => u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]),
        24 => data[i] as u32 | (data[i + 1] as u32) << 8 | (data[i + 2] as u32) << 16,
        16 => u16::from_le_bytes([data[i], data[i + 1]]) as u32,
        8 => data[i] as u32,
        _ => ((data[i] >> (bit & 4)) & 0x0F) as u32,
    }
}

/// Write a packed pixel starting at bit offset `bit`
#[inline]
pub(crate) fn write_packed(data: &mut [u8], bit: usize, bits: u32, value: u32) {
    let i = bit >> 3;
    match bits {
        32 => data[i..i + 4].copy_from_slice(&value.to_le_bytes()),
        24 => data[i..i + 3].copy_from_slice(&value.to_le_bytes()[..3]),
        16 => data[i..i + 2].copy_from_slice(&(value as u16).to_le_bytes()),
        8 => data[i] = value as u8,
        _ => {
            let shift = bit & 4;
            data[i] = (data[i] & !(0x0F << shift)) | (((value & 0x0F) as u8) << shift);
        }
    }
}

/// Read-only packed image whose first byte holds pixel `(ox, oy)`
pub(crate) struct LinearSrc<'a> {
    data: &'a [u8],
    pitch: usize,
    ox: u32,
    oy: u32,
    bits: u32,
}

impl<'a> LinearSrc<'a> {
    pub(crate) fn new(data: &'a [u8], pitch: usize, ox: u32, oy: u32, bits: u32) -> Self {
        Self {
            data,
            pitch,
            ox,
            oy,
            bits,
        }
    }

    #[inline]
    fn bit_offset(&self, x: u32, y: u32) -> usize {
        (y - self.oy) as usize * self.pitch * 8 + (x - self.ox) as usize * self.bits as usize
    }

    #[inline]
    pub(crate) fn pixel(&self, x: u32, y: u32) -> u32 {
        read_packed(self.data, self.bit_offset(x, y), self.bits)
    }

    /// Bytes of `count` pixels from `(x, y)`, if they start on a byte boundary
    #[inline]
    pub(crate) fn row_bytes(&self, x: u32, y: u32, count: u32) -> Option<&'a [u8]> {
        let bit = self.bit_offset(x, y);
        if bit % 8 != 0 {
            return None;
        }
        let start = bit / 8;
        let len = count as usize * self.bits as usize / 8;
        self.data.get(start..start + len)
    }
}

/// Writable packed image whose first byte holds pixel `(ox, oy)`
pub(crate) struct LinearDst<'a> {
    data: &'a mut [u8],
    pitch: usize,
    ox: u32,
    oy: u32,
    bits: u32,
}

impl<'a> LinearDst<'a> {
    pub(crate) fn new(data: &'a mut [u8], pitch: usize, ox: u32, oy: u32, bits: u32) -> Self {
        Self {
            data,
            pitch,
            ox,
            oy,
            bits,
        }
    }

    #[inline]
    fn bit_offset(&self, x: u32, y: u32) -> usize {
        (y - self.oy) as usize * self.pitch * 8 + (x - self.ox) as usize * self.bits as usize
    }

    #[inline]
    pub(crate) fn set(&mut self, x: u32, y: u32, value: u32) {
        let bit = self.bit_offset(x, y);
        write_packed(self.data, bit, self.bits, value);
    }

    #[inline]
    pub(crate) fn row_bytes_mut(&mut self, x: u32, y: u32, count: u32) -> Option<&mut [u8]> {
        let bit = self.bit_offset(x, y);
        if bit % 8 != 0 {
            return None;
        }
        let start = bit / 8;
        let len = count as usize * self.bits as usize / 8;
        self.data.get_mut(start..start + len)
    }
}
