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

//! Core components of the GS local memory emulation
//!
//! Components are listed leaf-first: address translation has no dependencies,
//! the texture cache sits on top of everything else, and [`gs::GsContext`]
//! owns one instance of each.

pub mod clut;
pub mod color;
pub mod config;
pub mod error;
pub mod gs;
pub mod local_memory;
pub mod memory;
pub mod psm;
pub mod rect;
pub mod registers;
pub mod swizzle;
pub mod texture;
