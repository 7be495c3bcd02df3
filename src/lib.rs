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

//! gsvram: Graphics Synthesizer video memory core
//!
//! This crate emulates the 4MB local memory of the PlayStation 2 Graphics
//! Synthesizer: its swizzled page/block/column layouts, every pixel storage
//! mode, the CLUT, and a host-side texture cache that keeps decoded textures
//! coherent with memory.
//!
//! # Architecture
//!
//! The core is organized into the following modules:
//!
//! - [`core`]: Local memory, address translation, pixel IO, CLUT, swizzling,
//!   texture cache and the [`core::gs::GsContext`] owner tying them together
//!
//! # Example
//!
//! ```
//! use gsvram::core::gs::GsContext;
//! use gsvram::core::psm::Psm;
//!
//! let mut gs = GsContext::default();
//! gs.write_pixel(Psm::Ct32, 3, 5, 0, 1, 0xAABBCCDD).unwrap();
//! assert_eq!(gs.memory().read_pixel(Psm::Ct32, 3, 5, 0, 1), 0xAABBCCDD);
//! ```
//!
//! # Modules
//!
//! - [`core::psm`]: Pixel storage modes and address translation tables
//! - [`core::local_memory`]: Pixel-granular reads and writes
//! - [`core::clut`]: Palette memory and colour lookup
//! - [`core::swizzle`]: Host/local image transfers and texture decoding
//! - [`core::texture`]: Texture cache and render-target aliasing
//! - [`core::gs`]: Owning execution context and command queue
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`] which is an alias for
//! `Result<T, GsError>`.

pub mod core;

// Re-export commonly used types
pub use core::error::{GsError, Result};
