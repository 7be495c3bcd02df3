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

//! Colour expansion
//!
//! Every texel leaves this core as canonical RGBA32: R in bits 0-7, G in
//! 8-15, B in 16-23 and A in 24-31. 32-bit texels already are. 16-bit and
//! 24-bit texels carry no (or one bit of) alpha, which TEXA supplies.

use super::registers::Texa;

/// Expand a 16-bit RGB5A1 texel to RGBA32
///
/// Each 5-bit channel is widened by a left shift of 3 (no bit replication,
/// matching the hardware). Alpha is TA1 when bit 15 is set, otherwise TA0,
/// except that with AEM enabled an all-zero texel is fully transparent.
///
/// # Examples
///
/// ```
/// use gsvram::core::color::expand16;
/// use gsvram::core::registers::Texa;
///
/// let texa = Texa { ta0: 0x40, aem: false, ta1: 0x80 };
/// assert_eq!(expand16(0x801F, &texa), 0x8000_00F8);
/// assert_eq!(expand16(0x0000, &texa), 0x4000_0000);
/// ```
#[inline]
pub fn expand16(c: u16, texa: &Texa) -> u32 {
    let c = c as u32;
    let alpha = if c & 0x8000 != 0 {
        texa.ta1
    } else if !texa.aem || c != 0 {
        texa.ta0
    } else {
        0
    };

    ((alpha & 0xFF) << 24) | ((c & 0x7C00) << 9) | ((c & 0x03E0) << 6) | ((c & 0x001F) << 3)
}

/// Expand a 24-bit texel to RGBA32
///
/// Alpha is TA0, or zero for black texels when AEM is enabled. Bits above
/// 24 of `c` are ignored.
#[inline]
pub fn expand24(c: u32, texa: &Texa) -> u32 {
    let rgb = c & 0x00FF_FFFF;
    if !texa.aem || rgb != 0 {
        rgb | ((texa.ta0 & 0xFF) << 24)
    } else {
        rgb
    }
}

/// Narrow RGBA32 to RGB5A1, the inverse of [`expand16`] for in-range colours
///
/// Alpha bit is set for any alpha with bit 7 set.
#[inline]
pub fn rgba32_to_16(c: u32) -> u16 {
    let r = (c >> 3) & 0x1F;
    let g = (c >> 11) & 0x1F;
    let b = (c >> 19) & 0x1F;
    let a = (c >> 31) & 1;
    (r | (g << 5) | (b << 10) | (a << 15)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXA: Texa = Texa {
        ta0: 0x11,
        aem: false,
        ta1: 0xEE,
    };

    #[test]
    fn test_expand16_channels() {
        // R=31, G=0, B=0
        assert_eq!(expand16(0x001F, &TEXA) & 0x00FF_FFFF, 0x0000_00F8);
        // G=31
        assert_eq!(expand16(0x03E0, &TEXA) & 0x00FF_FFFF, 0x0000_F800);
        // B=31
        assert_eq!(expand16(0x7C00, &TEXA) & 0x00FF_FFFF, 0x00F8_0000);
    }

    #[test]
    fn test_expand16_alpha() {
        assert_eq!(expand16(0x8000, &TEXA) >> 24, 0xEE);
        assert_eq!(expand16(0x0001, &TEXA) >> 24, 0x11);
        assert_eq!(expand16(0x0000, &TEXA) >> 24, 0x11);

        let aem = Texa { aem: true, ..TEXA };
        assert_eq!(expand16(0x0000, &aem), 0);
        assert_eq!(expand16(0x0001, &aem) >> 24, 0x11);
        // Bit 15 wins over AEM
        assert_eq!(expand16(0x8000, &aem) >> 24, 0xEE);
    }

    #[test]
    fn test_expand24() {
        assert_eq!(expand24(0xFF12_3456, &TEXA), 0x1112_3456);
        assert_eq!(expand24(0x0000_0000, &TEXA), 0x1100_0000);

        let aem = Texa { aem: true, ..TEXA };
        assert_eq!(expand24(0xFF00_0000, &aem), 0);
        assert_eq!(expand24(0x0000_0001, &aem), 0x1100_0001);
    }

    #[test]
    fn test_rgba32_to_16_round_trip() {
        let texa = Texa {
            ta0: 0,
            aem: false,
            ta1: 0x80,
        };
        for c in [0x0000u16, 0x801F, 0x7FFF, 0x5555, 0xAAAA] {
            assert_eq!(rgba32_to_16(expand16(c, &texa)), c);
        }
    }
}
