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

//! Image transfer state
//!
//! A transfer is described once by its [`TransferRegion`] and then fed in
//! chunks; the [`TransferCursor`] records the next pixel so a later chunk
//! resumes exactly where the previous one stopped.

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::psm::Psm;
use crate::core::rect::Rect;
use crate::core::registers::{BitBltBuf, TrxPos, TrxReg};

/// Image transfer direction (TRXDIR XDIR field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferDirection {
    /// Host to local memory
    HostToLocal,
    /// Local memory to host
    LocalToHost,
    /// Local memory to local memory
    LocalToLocal,
    /// Transmission deactivated
    Deactivated,
}

impl TransferDirection {
    pub fn from_xdir(xdir: u32) -> Self {
        match xdir & 3 {
            0 => TransferDirection::HostToLocal,
            1 => TransferDirection::LocalToHost,
            2 => TransferDirection::LocalToLocal,
            _ => TransferDirection::Deactivated,
        }
    }
}

/// Rectangle of a buffer taking part in a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferRegion {
    /// Buffer base pointer (blocks)
    pub bp: u32,
    /// Buffer width (64 pixel units)
    pub bw: u32,
    pub psm: Psm,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TransferRegion {
    /// Destination region of a host-to-local or local-to-local transfer
    pub fn destination(buf: &BitBltBuf, pos: &TrxPos, reg: &TrxReg) -> Result<Self> {
        Ok(Self {
            bp: buf.dbp,
            bw: buf.dbw,
            psm: Psm::try_from_code(buf.dpsm)?,
            x: pos.dsax,
            y: pos.dsay,
            width: reg.rrw,
            height: reg.rrh,
        })
    }

    /// Source region of a local-to-host or local-to-local transfer
    pub fn source(buf: &BitBltBuf, pos: &TrxPos, reg: &TrxReg) -> Result<Self> {
        Ok(Self {
            bp: buf.sbp,
            bw: buf.sbw,
            psm: Psm::try_from_code(buf.spsm)?,
            x: pos.ssax,
            y: pos.ssay,
            width: reg.rrw,
            height: reg.rrh,
        })
    }

    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn rect(&self) -> Rect {
        Rect::from_size(self.x, self.y, self.width, self.height)
    }

    /// Bits per pixel on the host side
    #[inline]
    pub fn bits_per_pixel(&self) -> u32 {
        self.psm.descriptor().trbpp
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Host-side size of the whole region in bytes (rounded up)
    pub fn byte_len(&self) -> usize {
        (self.pixel_count() * self.bits_per_pixel() as u64).div_ceil(8) as usize
    }
}

/// Next pixel of a transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCursor {
    pub x: u32,
    pub y: u32,
}

impl TransferCursor {
    /// Cursor at the first pixel of `region`
    pub fn start(region: &TransferRegion) -> Self {
        Self {
            x: region.x,
            y: region.y,
        }
    }

    /// True once every pixel of `region` has been transferred
    #[inline]
    pub fn is_complete(&self, region: &TransferRegion) -> bool {
        region.width == 0 || self.y >= region.bottom()
    }

    /// Step one pixel, wrapping to the next row at the right edge
    #[inline]
    pub(crate) fn advance(&mut self, region: &TransferRegion) {
        self.x += 1;
        if self.x >= region.right() {
            self.x = region.x;
            self.y += 1;
        }
    }

    /// Pixels left to transfer
    pub fn remaining(&self, region: &TransferRegion) -> u64 {
        if self.is_complete(region) {
            return 0;
        }
        let rows_after = (region.bottom() - self.y - 1) as u64;
        rows_after * region.width as u64 + (region.right() - self.x) as u64
    }
}

/// An in-flight image transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTransfer {
    pub region: TransferRegion,
    pub cursor: TransferCursor,
    pub direction: TransferDirection,
}

impl ImageTransfer {
    pub fn new(region: TransferRegion, direction: TransferDirection) -> Self {
        Self {
            region,
            cursor: TransferCursor::start(&region),
            direction,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor.is_complete(&self.region)
    }
}
