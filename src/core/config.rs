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

//! Runtime configuration
//!
//! Configuration is a TOML file with one table per component. Every field
//! has a default, so a partial (or empty) file is valid. `GSVRAM_*`
//! environment variables, including ones from a `.env` file, override the
//! file.
//!
//! ```toml
//! [cache]
//! max_age = 10
//! min_live_targets = 3
//! hash_speculation = true
//!
//! [swizzle]
//! kernel = "auto"
//! parallel_decode = true
//! decode_threads = 4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{GsError, Result};

/// Block kernel selection for bulk transfers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelPreference {
    /// Wide kernel when the host supports it, scalar otherwise
    #[default]
    Auto,
    /// Always use the table-driven scalar kernel
    Scalar,
    /// Use the wide kernel even without capability detection
    Wide,
}

/// What the texture cache hands out for indexed textures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteOutput {
    /// Texels expanded through the palette to RGBA32
    #[default]
    Expanded,
    /// Raw indices plus the RGBA32 palette
    Native,
}

/// Filter used when a render target is resampled to a different size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    #[default]
    Nearest,
    Bilinear,
}

/// Texture cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Frames an entry may go unused before it is evicted
    pub max_age: u32,

    /// Render targets are only aged out while more than this many are alive
    pub min_live_targets: usize,

    /// Maximum number of decoded textures held at once
    pub max_entries: usize,

    /// Skip re-decodes of textures whose memory keeps hashing the same
    pub hash_speculation: bool,

    /// Consecutive hash matches that arm speculation
    pub hash_streak: u32,

    /// Invalidations skipped once speculation is armed
    pub hash_skip_budget: u32,

    pub palette_output: PaletteOutput,

    pub resample_filter: ResampleFilter,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: 10,
            min_live_targets: 3,
            max_entries: 1024,
            hash_speculation: true,
            hash_streak: 3,
            hash_skip_budget: 4,
            palette_output: PaletteOutput::Expanded,
            resample_filter: ResampleFilter::Nearest,
        }
    }
}

/// Swizzle engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwizzleConfig {
    pub kernel: KernelPreference,

    /// Decode large block-aligned textures on several threads
    pub parallel_decode: bool,

    pub decode_threads: usize,

    /// Minimum number of block rows before decoding goes parallel
    pub parallel_min_block_rows: u32,
}

impl Default for SwizzleConfig {
    fn default() -> Self {
        Self {
            kernel: KernelPreference::Auto,
            parallel_decode: false,
            decode_threads: 4,
            parallel_min_block_rows: 8,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GsConfig {
    pub cache: CacheConfig,
    pub swizzle: SwizzleConfig,
}

impl GsConfig {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| GsError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| GsError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Default configuration with environment overrides applied
    ///
    /// Reads a `.env` file from the working directory if there is one.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `GSVRAM_*` environment overrides
    ///
    /// | Variable                  | Field                     |
    /// |---------------------------|---------------------------|
    /// | `GSVRAM_KERNEL`           | `swizzle.kernel`          |
    /// | `GSVRAM_PARALLEL_DECODE`  | `swizzle.parallel_decode` |
    /// | `GSVRAM_DECODE_THREADS`   | `swizzle.decode_threads`  |
    /// | `GSVRAM_CACHE_MAX_AGE`    | `cache.max_age`           |
    /// | `GSVRAM_CACHE_ENTRIES`    | `cache.max_entries`       |
    /// | `GSVRAM_HASH_SPECULATION` | `cache.hash_speculation`  |
    /// | `GSVRAM_PALETTE_OUTPUT`   | `cache.palette_output`    |
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env(&mut self) {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Failed to load .env file: {}", e);
            }
        }
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(name: &str, value: Option<String>) -> Option<T> {
            let value = value?;
            match value.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    log::warn!("Ignoring {}={}: not a valid value", name, value);
                    None
                }
            }
        }

        if let Some(kernel) = var("GSVRAM_KERNEL") {
            match kernel.trim().to_ascii_lowercase().as_str() {
                "auto" => self.swizzle.kernel = KernelPreference::Auto,
                "scalar" => self.swizzle.kernel = KernelPreference::Scalar,
                "wide" => self.swizzle.kernel = KernelPreference::Wide,
                other => log::warn!("Ignoring GSVRAM_KERNEL={}: expected auto, scalar or wide", other),
            }
        }
        if let Some(v) = parsed("GSVRAM_PARALLEL_DECODE", var("GSVRAM_PARALLEL_DECODE")) {
            self.swizzle.parallel_decode = v;
        }
        if let Some(v) = parsed("GSVRAM_DECODE_THREADS", var("GSVRAM_DECODE_THREADS")) {
            self.swizzle.decode_threads = v;
        }
        if let Some(v) = parsed("GSVRAM_CACHE_MAX_AGE", var("GSVRAM_CACHE_MAX_AGE")) {
            self.cache.max_age = v;
        }
        if let Some(v) = parsed("GSVRAM_CACHE_ENTRIES", var("GSVRAM_CACHE_ENTRIES")) {
            self.cache.max_entries = v;
        }
        if let Some(v) = parsed("GSVRAM_HASH_SPECULATION", var("GSVRAM_HASH_SPECULATION")) {
            self.cache.hash_speculation = v;
        }
        if let Some(output) = var("GSVRAM_PALETTE_OUTPUT") {
            match output.trim().to_ascii_lowercase().as_str() {
                "expanded" => self.cache.palette_output = PaletteOutput::Expanded,
                "native" => self.cache.palette_output = PaletteOutput::Native,
                other => log::warn!("Ignoring GSVRAM_PALETTE_OUTPUT={}", other),
            }
        }
    }
}
