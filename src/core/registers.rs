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

//! GS register type definitions
//!
//! This module contains the GS privileged-free registers that describe
//! textures, palettes and image transfers. Each register decodes from and
//! encodes to its raw 64-bit value bit-exactly.
//!
//! # Bit layouts
//!
//! | Register  | Fields                                                           |
//! |-----------|------------------------------------------------------------------|
//! | TEX0      | TBP0 0-13, TBW 14-19, PSM 20-25, TW 26-29, TH 30-33, TCC 34,      |
//! |           | TFX 35-36, CBP 37-50, CPSM 51-54, CSM 55, CSA 56-60, CLD 61-63    |
//! | TEXCLUT   | CBW 0-5, COU 6-11, COV 12-21                                      |
//! | TEXA      | TA0 0-7, AEM 15, TA1 32-39                                        |
//! | CLAMP     | WMS 0-1, WMT 2-3, MINU 4-13, MAXU 14-23, MINV 24-33, MAXV 34-43   |
//! | BITBLTBUF | SBP 0-13, SBW 16-21, SPSM 24-29, DBP 32-45, DBW 48-53, DPSM 56-61 |
//! | TRXPOS    | SSAX 0-10, SSAY 16-26, DSAX 32-42, DSAY 48-58, DIR 59-60          |
//! | TRXREG    | RRW 0-11, RRH 32-43                                               |
//! | TRXDIR    | XDIR 0-1                                                          |

use serde::{Deserialize, Serialize};

#[inline]
fn field(value: u64, shift: u32, bits: u32) -> u32 {
    ((value >> shift) & ((1u64 << bits) - 1)) as u32
}

#[inline]
fn pack(value: u32, shift: u32, bits: u32) -> u64 {
    ((value as u64) & ((1u64 << bits) - 1)) << shift
}

/// TEX0: texture and palette description
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tex0 {
    /// Texture base pointer (blocks)
    pub tbp0: u32,

    /// Texture buffer width (64 pixel units)
    pub tbw: u32,

    /// Texture pixel storage mode code
    pub psm: u32,

    /// log2 of the texture width
    pub tw: u32,

    /// log2 of the texture height
    pub th: u32,

    /// Texture colour component (0 = RGB, 1 = RGBA)
    pub tcc: u32,

    /// Texture function
    pub tfx: u32,

    /// CLUT base pointer (blocks)
    pub cbp: u32,

    /// CLUT pixel storage mode code
    pub cpsm: u32,

    /// CLUT storage mode (0 = block arrangement, 1 = linear via TEXCLUT)
    pub csm: u32,

    /// CLUT entry offset (16 entry units)
    pub csa: u32,

    /// CLUT load control
    pub cld: u32,
}

impl Tex0 {
    pub fn from_u64(value: u64) -> Self {
        Self {
            tbp0: field(value, 0, 14),
            tbw: field(value, 14, 6),
            psm: field(value, 20, 6),
            tw: field(value, 26, 4),
            th: field(value, 30, 4),
            tcc: field(value, 34, 1),
            tfx: field(value, 35, 2),
            cbp: field(value, 37, 14),
            cpsm: field(value, 51, 4),
            csm: field(value, 55, 1),
            csa: field(value, 56, 5),
            cld: field(value, 61, 3),
        }
    }

    pub fn to_u64(&self) -> u64 {
        pack(self.tbp0, 0, 14)
            | pack(self.tbw, 14, 6)
            | pack(self.psm, 20, 6)
            | pack(self.tw, 26, 4)
            | pack(self.th, 30, 4)
            | pack(self.tcc, 34, 1)
            | pack(self.tfx, 35, 2)
            | pack(self.cbp, 37, 14)
            | pack(self.cpsm, 51, 4)
            | pack(self.csm, 55, 1)
            | pack(self.csa, 56, 5)
            | pack(self.cld, 61, 3)
    }

    /// Texture width in pixels (log2 clamped to 1024)
    #[inline]
    pub fn width(&self) -> u32 {
        1 << self.tw.min(10)
    }

    /// Texture height in pixels (log2 clamped to 1024)
    #[inline]
    pub fn height(&self) -> u32 {
        1 << self.th.min(10)
    }
}

/// TEXCLUT: linear CLUT position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TexClut {
    /// CLUT buffer width (64 pixel units)
    pub cbw: u32,

    /// CLUT X offset (16 pixel units)
    pub cou: u32,

    /// CLUT Y offset
    pub cov: u32,
}

impl TexClut {
    pub fn from_u64(value: u64) -> Self {
        Self {
            cbw: field(value, 0, 6),
            cou: field(value, 6, 6),
            cov: field(value, 12, 10),
        }
    }

    pub fn to_u64(&self) -> u64 {
        pack(self.cbw, 0, 6) | pack(self.cou, 6, 6) | pack(self.cov, 12, 10)
    }
}

/// TEXA: alpha expansion for 16-bit and 24-bit texels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Texa {
    /// Alpha used when the 16-bit alpha bit is clear (and for 24-bit texels)
    pub ta0: u32,

    /// Alpha expansion mode: black texels become transparent
    pub aem: bool,

    /// Alpha used when the 16-bit alpha bit is set
    pub ta1: u32,
}

impl Texa {
    pub fn from_u64(value: u64) -> Self {
        Self {
            ta0: field(value, 0, 8),
            aem: field(value, 15, 1) != 0,
            ta1: field(value, 32, 8),
        }
    }

    pub fn to_u64(&self) -> u64 {
        pack(self.ta0, 0, 8) | pack(self.aem as u32, 15, 1) | pack(self.ta1, 32, 8)
    }
}

/// Texture wrap mode (CLAMP.WMS / WMT)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapMode {
    #[default]
    Repeat,
    Clamp,
    RegionClamp,
    RegionRepeat,
}

impl WrapMode {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => WrapMode::Repeat,
            1 => WrapMode::Clamp,
            2 => WrapMode::RegionClamp,
            _ => WrapMode::RegionRepeat,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            WrapMode::Repeat => 0,
            WrapMode::Clamp => 1,
            WrapMode::RegionClamp => 2,
            WrapMode::RegionRepeat => 3,
        }
    }
}

/// CLAMP: texture wrap modes and region bounds
///
/// For region repeat, MINU/MINV hold the coordinate mask and MAXU/MAXV the
/// fixed bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clamp {
    pub wms: WrapMode,
    pub wmt: WrapMode,
    pub minu: u32,
    pub maxu: u32,
    pub minv: u32,
    pub maxv: u32,
}

impl Clamp {
    pub fn from_u64(value: u64) -> Self {
        Self {
            wms: WrapMode::from_bits(field(value, 0, 2)),
            wmt: WrapMode::from_bits(field(value, 2, 2)),
            minu: field(value, 4, 10),
            maxu: field(value, 14, 10),
            minv: field(value, 24, 10),
            maxv: field(value, 34, 10),
        }
    }

    pub fn to_u64(&self) -> u64 {
        pack(self.wms.bits(), 0, 2)
            | pack(self.wmt.bits(), 2, 2)
            | pack(self.minu, 4, 10)
            | pack(self.maxu, 14, 10)
            | pack(self.minv, 24, 10)
            | pack(self.maxv, 34, 10)
    }
}

/// BITBLTBUF: source and destination buffers of an image transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitBltBuf {
    pub sbp: u32,
    pub sbw: u32,
    pub spsm: u32,
    pub dbp: u32,
    pub dbw: u32,
    pub dpsm: u32,
}

impl BitBltBuf {
    pub fn from_u64(value: u64) -> Self {
        Self {
            sbp: field(value, 0, 14),
            sbw: field(value, 16, 6),
            spsm: field(value, 24, 6),
            dbp: field(value, 32, 14),
            dbw: field(value, 48, 6),
            dpsm: field(value, 56, 6),
        }
    }

    pub fn to_u64(&self) -> u64 {
        pack(self.sbp, 0, 14)
            | pack(self.sbw, 16, 6)
            | pack(self.spsm, 24, 6)
            | pack(self.dbp, 32, 14)
            | pack(self.dbw, 48, 6)
            | pack(self.dpsm, 56, 6)
    }
}

/// TRXPOS: transfer origins and local-to-local copy direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrxPos {
    pub ssax: u32,
    pub ssay: u32,
    pub dsax: u32,
    pub dsay: u32,

    /// Copy order: bit 0 flips Y, bit 1 flips X
    pub dir: u32,
}

impl TrxPos {
    pub fn from_u64(value: u64) -> Self {
        Self {
            ssax: field(value, 0, 11),
            ssay: field(value, 16, 11),
            dsax: field(value, 32, 11),
            dsay: field(value, 48, 11),
            dir: field(value, 59, 2),
        }
    }

    pub fn to_u64(&self) -> u64 {
        pack(self.ssax, 0, 11)
            | pack(self.ssay, 16, 11)
            | pack(self.dsax, 32, 11)
            | pack(self.dsay, 48, 11)
            | pack(self.dir, 59, 2)
    }
}

/// TRXREG: transfer rectangle size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrxReg {
    pub rrw: u32,
    pub rrh: u32,
}

impl TrxReg {
    pub fn from_u64(value: u64) -> Self {
        Self {
            rrw: field(value, 0, 12),
            rrh: field(value, 32, 12),
        }
    }

    pub fn to_u64(&self) -> u64 {
        pack(self.rrw, 0, 12) | pack(self.rrh, 32, 12)
    }
}

/// TRXDIR: transfer direction, writing it starts the transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrxDir {
    /// 0 = host to local, 1 = local to host, 2 = local to local, 3 = off
    pub xdir: u32,
}

impl TrxDir {
    pub fn from_u64(value: u64) -> Self {
        Self {
            xdir: field(value, 0, 2),
        }
    }

    pub fn to_u64(&self) -> u64 {
        pack(self.xdir, 0, 2)
    }
}

/// Memory-related GS registers as last written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GsRegisters {
    pub tex0: Tex0,
    pub texclut: TexClut,
    pub texa: Texa,
    pub bitbltbuf: BitBltBuf,
    pub trxpos: TrxPos,
    pub trxreg: TrxReg,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tex0_fields() {
        // TBP0=0x1234, TBW=5, PSM=T8, TW=8, TH=7, CBP=0x3000, CPSM=CT16, CSM=1, CSA=3, CLD=4
        let raw = 0x1234u64
            | (5 << 14)
            | (0x13 << 20)
            | (8 << 26)
            | (7u64 << 30)
            | (0x3000u64 << 37)
            | (0x2u64 << 51)
            | (1u64 << 55)
            | (3u64 << 56)
            | (4u64 << 61);
        let tex0 = Tex0::from_u64(raw);
        assert_eq!(tex0.tbp0, 0x1234);
        assert_eq!(tex0.tbw, 5);
        assert_eq!(tex0.psm, 0x13);
        assert_eq!(tex0.tw, 8);
        assert_eq!(tex0.th, 7);
        assert_eq!(tex0.cbp, 0x3000);
        assert_eq!(tex0.cpsm, 0x2);
        assert_eq!(tex0.csm, 1);
        assert_eq!(tex0.csa, 3);
        assert_eq!(tex0.cld, 4);
        assert_eq!(tex0.to_u64(), raw);
        assert_eq!(tex0.width(), 256);
        assert_eq!(tex0.height(), 128);
    }

    #[test]
    fn test_tex0_size_clamped() {
        let tex0 = Tex0 {
            tw: 15,
            th: 11,
            ..Default::default()
        };
        assert_eq!(tex0.width(), 1024);
        assert_eq!(tex0.height(), 1024);
    }

    #[test]
    fn test_texa_fields() {
        let raw = 0x80u64 | (1 << 15) | (0x7Fu64 << 32);
        let texa = Texa::from_u64(raw);
        assert_eq!(texa.ta0, 0x80);
        assert!(texa.aem);
        assert_eq!(texa.ta1, 0x7F);
        assert_eq!(texa.to_u64(), raw);
    }

    #[test]
    fn test_clamp_fields() {
        let clamp = Clamp {
            wms: WrapMode::RegionClamp,
            wmt: WrapMode::RegionRepeat,
            minu: 3,
            maxu: 600,
            minv: 0x3FF,
            maxv: 17,
        };
        assert_eq!(Clamp::from_u64(clamp.to_u64()), clamp);
        assert_eq!(clamp.to_u64() & 0xF, 0b1110);
    }

    #[test]
    fn test_transfer_registers() {
        let buf = BitBltBuf {
            sbp: 0x10,
            sbw: 2,
            spsm: 0x00,
            dbp: 0x3FFF,
            dbw: 63,
            dpsm: 0x3A,
        };
        let raw = buf.to_u64();
        assert_eq!(raw >> 56, 0x3A);
        assert_eq!(BitBltBuf::from_u64(raw), buf);

        let pos = TrxPos::from_u64((5u64 << 32) | (7u64 << 48) | (2u64 << 59) | 0x7FF);
        assert_eq!(pos.ssax, 0x7FF);
        assert_eq!(pos.dsax, 5);
        assert_eq!(pos.dsay, 7);
        assert_eq!(pos.dir, 2);

        let reg = TrxReg::from_u64(0xFFFF_FFFF_FFFF_FFFF);
        assert_eq!(reg.rrw, 0xFFF);
        assert_eq!(reg.rrh, 0xFFF);

        assert_eq!(TrxDir::from_u64(7).xdir, 3);
    }

    #[test]
    fn test_texclut_fields() {
        let clut = TexClut::from_u64(4 | (2 << 6) | (300 << 12));
        assert_eq!(clut.cbw, 4);
        assert_eq!(clut.cou, 2);
        assert_eq!(clut.cov, 300);
    }
}
