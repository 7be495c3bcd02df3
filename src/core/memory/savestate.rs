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

//! Save states
//!
//! A save state holds everything needed to resume the memory core exactly:
//! the raw 4MB arena, the CLUT buffer with its CBP latches, the memory
//! registers, and the image transfer in flight. Decoded textures and render
//! targets are never saved; owners rebuild them after loading.
//!
//! States are encoded with `bincode` in serde mode. The encoding starts with
//! a magic tag and a format version, which are checked before the rest is
//! decoded.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GsMemory, MEMORY_SIZE, PAGE_SIZE};
use crate::core::clut::ClutManager;
use crate::core::error::{GsError, Result};
use crate::core::registers::GsRegisters;
use crate::core::swizzle::ImageTransfer;

const MAGIC: [u8; 4] = *b"GSVR";

/// Snapshot of the memory core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    magic: [u8; 4],

    /// Format version, [`SaveState::VERSION`] when written by this build
    pub version: u32,

    pub created_at: DateTime<Utc>,

    pub registers: GsRegisters,

    /// Raw local memory, exactly [`MEMORY_SIZE`] bytes
    pub memory: Vec<u8>,

    /// CLUT buffer in native 16-bit entries
    pub clut: Vec<u16>,

    /// CBP0/CBP1 latches
    pub clut_cbp: [u32; 2],

    pub transfer: Option<ImageTransfer>,

    /// Bytes of a host transfer that did not yet make up a whole pixel
    pub pending: Vec<u8>,
}

/// Leading fields of every save state, whatever its version
#[derive(Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u32,
}

impl SaveState {
    pub const VERSION: u32 = 1;

    /// Capture the current state of the core
    pub fn capture(
        memory: &GsMemory,
        clut: &ClutManager,
        registers: GsRegisters,
        transfer: Option<ImageTransfer>,
        pending: &[u8],
    ) -> Self {
        Self {
            magic: MAGIC,
            version: Self::VERSION,
            created_at: Utc::now(),
            registers,
            memory: memory.bytes().to_vec(),
            clut: clut.native().to_vec(),
            clut_cbp: clut.cbp_latches(),
            transfer,
            pending: pending.to_vec(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| GsError::SaveState(format!("Failed to encode save state: {}", e)))
    }

    /// Decode a save state
    ///
    /// # Errors
    ///
    /// - [`GsError::SaveState`] if the data is not a save state or is corrupt
    /// - [`GsError::SaveStateVersion`] if it was written by another format version
    /// - [`GsError::InvalidMemorySize`] if the memory image is not 4MB
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config = bincode::config::standard();
        let (header, _): (Header, usize) = bincode::serde::decode_from_slice(bytes, config)
            .map_err(|e| GsError::SaveState(format!("Failed to decode save state header: {}", e)))?;
        if header.magic != MAGIC {
            return Err(GsError::SaveState("Not a gsvram save state".to_string()));
        }
        if header.version != Self::VERSION {
            return Err(GsError::SaveStateVersion {
                expected: Self::VERSION,
                found: header.version,
            });
        }

        let (state, _): (Self, usize) = bincode::serde::decode_from_slice(bytes, config)
            .map_err(|e| GsError::SaveState(format!("Failed to decode save state: {}", e)))?;
        if state.memory.len() != MEMORY_SIZE {
            return Err(GsError::InvalidMemorySize {
                expected: MEMORY_SIZE,
                got: state.memory.len(),
            });
        }
        Ok(state)
    }

    /// Write the encoded state to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()?)?;
        log::info!("Save state written to {}", path.display());
        Ok(())
    }

    /// Read a state written by [`SaveState::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let state = Self::from_bytes(&std::fs::read(path)?)?;
        log::info!("Save state loaded from {} ({})", path.display(), state.created_at);
        Ok(state)
    }

    pub fn summary(&self) -> SaveStateSummary {
        SaveStateSummary {
            version: self.version,
            created_at: self.created_at,
            memory_bytes: self.memory.len(),
            used_pages: self.memory.chunks(PAGE_SIZE).filter(|p| p.iter().any(|&b| b != 0)).count(),
            clut_cbp: self.clut_cbp,
            registers: self.registers,
            transfer: self.transfer,
        }
    }
}

/// Human- and machine-readable description of a save state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveStateSummary {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub memory_bytes: usize,
    /// Pages holding at least one non-zero byte
    pub used_pages: usize,
    pub clut_cbp: [u32; 2],
    pub registers: GsRegisters,
    pub transfer: Option<ImageTransfer>,
}

impl SaveStateSummary {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GsError::SaveState(format!("Failed to serialize summary: {}", e)))
    }
}

impl fmt::Display for SaveStateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version:    {}", self.version)?;
        writeln!(f, "created:    {}", self.created_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(
            f,
            "memory:     {} bytes, {} of {} pages in use",
            self.memory_bytes,
            self.used_pages,
            self.memory_bytes / PAGE_SIZE
        )?;
        writeln!(f, "clut cbp:   0x{:04X} / 0x{:04X}", self.clut_cbp[0], self.clut_cbp[1])?;
        match &self.transfer {
            Some(t) => write!(
                f,
                "transfer:   {:?} {} {}x{} at ({}, {}), next pixel ({}, {})",
                t.direction,
                t.region.psm,
                t.region.width,
                t.region.height,
                t.region.x,
                t.region.y,
                t.cursor.x,
                t.cursor.y
            ),
            None => write!(f, "transfer:   none"),
        }
    }
}
