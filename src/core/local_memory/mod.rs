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

//! Local memory with address translation
//!
//! [`LocalMemory`] pairs the raw arena with the translation tables and the
//! kernel selection, and is what every higher component reads and writes
//! through. Pixel access lives in [`pixel`], bulk transfers in
//! [`crate::core::swizzle`].

mod pixel;

pub use pixel::TexelLookup;

use std::sync::Arc;

use super::config::SwizzleConfig;
use super::memory::GsMemory;
use super::psm::AddressTables;
use super::swizzle::KernelStrategy;

/// GS local memory as seen by the rest of the core
pub struct LocalMemory {
    /// Raw 4MB arena
    pub(crate) vm: GsMemory,

    /// Shared translation tables
    pub(crate) tables: Arc<AddressTables>,

    /// Kernel used for block-aligned bulk transfers
    pub(crate) strategy: KernelStrategy,

    /// Parallel decode settings
    pub(crate) parallel: ParallelDecode,
}

/// Parallel texture decode settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParallelDecode {
    pub(crate) enabled: bool,
    pub(crate) threads: usize,
    pub(crate) min_block_rows: u32,
}

impl LocalMemory {
    /// Create zeroed local memory
    ///
    /// Builds a fresh set of translation tables and selects the transfer
    /// kernel from `config` and host capabilities.
    pub fn new(config: &SwizzleConfig) -> Self {
        Self::with_tables(config, Arc::new(AddressTables::new()))
    }

    /// Create zeroed local memory sharing existing tables
    pub fn with_tables(config: &SwizzleConfig, tables: Arc<AddressTables>) -> Self {
        let strategy = KernelStrategy::select(config.kernel);
        log::info!(
            "GS local memory: {} kernel, parallel decode {}",
            strategy,
            if config.parallel_decode { "on" } else { "off" }
        );

        Self {
            vm: GsMemory::new(),
            tables,
            strategy,
            parallel: ParallelDecode {
                enabled: config.parallel_decode,
                threads: config.decode_threads.max(1),
                min_block_rows: config.parallel_min_block_rows.max(1),
            },
        }
    }

    /// Raw arena
    #[inline]
    pub fn raw(&self) -> &GsMemory {
        &self.vm
    }

    /// Mutable raw arena
    ///
    /// Writes made here bypass cache invalidation; owners must report them.
    #[inline]
    pub fn raw_mut(&mut self) -> &mut GsMemory {
        &mut self.vm
    }

    /// Translation tables
    #[inline]
    pub fn tables(&self) -> &Arc<AddressTables> {
        &self.tables
    }

    /// Kernel used for block-aligned transfers
    #[inline]
    pub fn strategy(&self) -> KernelStrategy {
        self.strategy
    }

    /// Override the transfer kernel
    pub fn set_strategy(&mut self, strategy: KernelStrategy) {
        self.strategy = strategy;
    }

    /// Turn parallel texture decode on or off
    pub fn set_parallel_decode(&mut self, enabled: bool, threads: usize) {
        self.parallel.enabled = enabled;
        self.parallel.threads = threads.max(1);
    }
}

impl Default for LocalMemory {
    fn default() -> Self {
        Self::new(&SwizzleConfig::default())
    }
}

impl std::fmt::Debug for LocalMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMemory")
            .field("strategy", &self.strategy)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}
