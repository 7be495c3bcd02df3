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

//! Error types
//!
//! Hot-path contract violations (out-of-range coordinates, undersized
//! buffers) are not errors: they trip a `debug_assert!` and fall back to a
//! defined release behaviour. Everything that can legitimately fail at runtime
//! is reported through [`GsError`].

use thiserror::Error;

use super::psm::Psm;
use super::swizzle::TransferDirection;
use super::texture::SurfaceHandle;

/// Errors produced by the GS memory core
#[derive(Debug, Error)]
pub enum GsError {
    /// PSM code does not name a storage mode
    #[error("Unsupported pixel storage mode: 0x{0:02X}")]
    UnsupportedPsm(u32),

    /// Indexed texture whose palette format is not a colour format
    #[error("Invalid palette format 0x{cpsm:02X} for indexed texture {psm:?}")]
    InvalidPaletteFormat { psm: Psm, cpsm: u32 },

    /// Every cache slot is held by a render target
    #[error("Texture cache exhausted: {capacity} entries, none evictable")]
    CacheExhausted { capacity: usize },

    /// Transfer data arrived with no transfer started
    #[error("No image transfer in progress")]
    NoActiveTransfer,

    /// Transfer data flows the wrong way for the active transfer
    #[error("Transfer direction mismatch: requested {requested:?}, active {active:?}")]
    TransferDirection {
        requested: TransferDirection,
        active: TransferDirection,
    },

    /// Backend surface handle is not known to the backend
    #[error("Unknown surface handle: {0:?}")]
    UnknownSurface(SurfaceHandle),

    /// Save state could not be encoded or decoded
    #[error("Save state error: {0}")]
    SaveState(String),

    /// Save state was written by an incompatible version
    #[error("Save state version mismatch: expected {expected}, found {found}")]
    SaveStateVersion { expected: u32, found: u32 },

    /// Memory image has the wrong size
    #[error("Invalid memory image size: expected {expected} bytes, got {got}")]
    InvalidMemorySize { expected: usize, got: usize },

    /// Configuration could not be parsed or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for GS memory operations
pub type Result<T> = std::result::Result<T, GsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GsError::UnsupportedPsm(0x3F);
        assert_eq!(err.to_string(), "Unsupported pixel storage mode: 0x3F");

        let err = GsError::InvalidPaletteFormat {
            psm: Psm::T8,
            cpsm: 0x13,
        };
        assert!(err.to_string().contains("T8"));

        let err = GsError::CacheExhausted { capacity: 4 };
        assert!(err.to_string().contains("4 entries"));
    }

    #[test]
    fn test_io_error_conversion() {
        fn open_missing() -> Result<std::fs::File> {
            Ok(std::fs::File::open("/definitely/not/here.gsvram")?)
        }

        assert!(matches!(open_missing(), Err(GsError::Io(_))));
    }
}
