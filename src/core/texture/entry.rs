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

//! Cache entries

use serde::Serialize;

use super::dirty::{DirtyRect, DirtyRectList};
use super::target::SurfaceHandle;
use crate::core::config::CacheConfig;
use crate::core::local_memory::LocalMemory;
use crate::core::memory::PageSet;
use crate::core::psm::Psm;
use crate::core::rect::Rect;
use crate::core::registers::{Texa, WrapMode};
use crate::core::swizzle::{BufferDesc, TexelConversion};

use super::CacheStats;

/// Everything that makes two decoded textures interchangeable
///
/// Region bounds are not part of it: they only decide how much of the
/// texture has to be valid, and an entry grows to cover whatever is asked of
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey {
    /// Base pointer (blocks)
    pub tbp0: u32,
    /// Buffer width (64 pixel units)
    pub tbw: u32,
    pub psm: Psm,
    pub width: u32,
    pub height: u32,
    /// Wrap modes along U and V
    pub wrap: (WrapMode, WrapMode),
    /// Hash of the expanded palette baked into the texels
    pub palette: Option<u64>,
    /// Alpha expansion baked into 16/24-bit texels
    pub texa: Option<Texa>,
}

impl TextureKey {
    pub fn buffer(&self) -> BufferDesc {
        BufferDesc::new(self.psm, self.tbp0, self.tbw)
    }

    pub fn rect(&self) -> Rect {
        Rect::from_size(0, 0, self.width, self.height)
    }
}

/// Entry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryState {
    /// Being decoded for the first time
    Building,
    /// Texels match memory over the validity rectangle
    Valid,
    /// Writes are pending re-decode
    PartiallyDirty,
}

/// Where an entry's texels live
#[derive(Debug)]
pub enum TextureData {
    /// Decoded on the host, `width` texels per row
    Bitmap(Vec<u32>),
    /// A render target surface (or a retiled/resampled copy of one)
    Surface(SurfaceHandle),
}

/// Change detection state for speculative skips
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HashState {
    pub hash: u64,
    pub streak: u32,
    pub skip_budget: u32,
}

/// A decoded texture
#[derive(Debug)]
pub struct CachedTexture {
    pub(crate) key: TextureKey,
    pub(crate) data: TextureData,
    pub(crate) valid: Rect,
    pub(crate) dirty: DirtyRectList,
    /// Writes passed over by speculative skips, not yet checked
    pub(crate) skipped: DirtyRectList,
    pub(crate) pages: PageSet,
    pub(crate) age: u32,
    pub(crate) state: EntryState,
    pub(crate) alias_of: Option<SurfaceHandle>,
    pub(crate) palette: Option<Box<[u32; 256]>>,
    pub(crate) hash: HashState,
}

impl CachedTexture {
    /// Decode `required` of a new bitmap entry
    pub(crate) fn build(
        mem: &LocalMemory,
        key: TextureKey,
        conversion: &TexelConversion<'_>,
        required: Rect,
        config: &CacheConfig,
        stats: &mut CacheStats,
    ) -> Self {
        let mut entry = Self {
            key,
            data: TextureData::Bitmap(vec![0; key.width as usize * key.height as usize]),
            valid: Rect::default(),
            dirty: DirtyRectList::default(),
            skipped: DirtyRectList::default(),
            pages: PageSet::from_rect(key.psm.layout(), key.tbp0, key.tbw, 0, 0, key.width, key.height),
            age: 0,
            state: EntryState::Building,
            alias_of: None,
            palette: None,
            hash: HashState::default(),
        };
        entry.decode(mem, required, conversion, stats);
        entry.valid = required;
        if config.hash_speculation {
            entry.hash.hash = mem.content_hash(key.buffer(), required);
        }
        entry.state = EntryState::Valid;
        stats.full_decodes += 1;
        entry
    }

    /// Entry standing for a render target surface
    pub(crate) fn alias(key: TextureKey, target: SurfaceHandle, surface: SurfaceHandle) -> Self {
        Self {
            key,
            data: TextureData::Surface(surface),
            valid: key.rect(),
            dirty: DirtyRectList::default(),
            skipped: DirtyRectList::default(),
            pages: PageSet::new(),
            age: 0,
            state: EntryState::Valid,
            alias_of: Some(target),
            palette: None,
            hash: HashState::default(),
        }
    }

    fn decode(&mut self, mem: &LocalMemory, rect: Rect, conversion: &TexelConversion<'_>, stats: &mut CacheStats) {
        let rect = rect.intersect(&self.key.rect());
        if rect.is_empty() {
            return;
        }
        if let TextureData::Bitmap(pixels) = &mut self.data {
            mem.decode_texture(self.key.buffer(), rect, conversion, pixels, self.key.width as usize);
            stats.texels_decoded += rect.area();
        }
    }

    /// Record a write; refreshed on the next fetch
    pub(crate) fn mark_dirty(&mut self, dirty: DirtyRect) {
        self.dirty.push(dirty);
        if !self.dirty.is_empty() {
            self.state = EntryState::PartiallyDirty;
        }
    }

    /// Bring a hit up to date with memory and grow it to cover `required`
    pub(crate) fn refresh(
        &mut self,
        mem: &LocalMemory,
        conversion: &TexelConversion<'_>,
        required: Rect,
        config: &CacheConfig,
        stats: &mut CacheStats,
    ) {
        self.age = 0;
        let buf = self.key.buffer();

        let verify_skipped = !self.skipped.is_empty() && self.hash.skip_budget == 0;
        if !self.dirty.is_empty() || verify_skipped {
            if !self.dirty.is_empty() && config.hash_speculation && self.hash.skip_budget > 0 {
                self.hash.skip_budget -= 1;
                self.skipped.extend(&self.dirty);
                stats.speculative_skips += 1;
                log::debug!("Speculatively skipping refresh of {:?}", self.key);
            } else {
                let stale = self
                    .dirty
                    .bounds()
                    .union(&self.skipped.bounds())
                    .intersect(&self.valid);
                let hash = config.hash_speculation.then(|| mem.content_hash(buf, self.valid));

                match hash {
                    Some(hash) if hash == self.hash.hash => {
                        stats.hash_matches += 1;
                        self.hash.streak += 1;
                        if self.hash.streak >= config.hash_streak {
                            self.hash.streak = 0;
                            self.hash.skip_budget = config.hash_skip_budget;
                        }
                    }
                    _ => {
                        self.hash.streak = 0;
                        self.hash.skip_budget = 0;
                        if let Some(hash) = hash {
                            self.hash.hash = hash;
                        }
                        log::debug!("Re-decoding {:?} of {:?}", stale, self.key);
                        self.decode(mem, stale, conversion, stats);
                        stats.partial_redecodes += 1;
                    }
                }
                self.skipped.clear();
            }
            self.dirty.clear();
            self.state = EntryState::Valid;
        }

        if !self.valid.contains(&required) {
            if !self.skipped.is_empty() {
                let stale = self.skipped.bounds().intersect(&self.valid);
                self.decode(mem, stale, conversion, stats);
                self.skipped.clear();
            }
            let grown = self.valid.union(&required);
            for part in grown.subtract(&self.valid) {
                self.decode(mem, part, conversion, stats);
            }
            self.valid = grown;
            if config.hash_speculation {
                self.hash.hash = mem.content_hash(buf, grown);
            }
        }
    }

    pub fn key(&self) -> &TextureKey {
        &self.key
    }

    pub fn width(&self) -> u32 {
        self.key.width
    }

    pub fn height(&self) -> u32 {
        self.key.height
    }

    /// Texels per row of [`pixels`](Self::pixels)
    pub fn pitch(&self) -> usize {
        self.key.width as usize
    }

    /// Host texels, for entries decoded from memory
    pub fn pixels(&self) -> Option<&[u32]> {
        match &self.data {
            TextureData::Bitmap(pixels) => Some(pixels),
            TextureData::Surface(_) => None,
        }
    }

    /// One host texel
    pub fn texel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.key.width || y >= self.key.height {
            return None;
        }
        self.pixels()
            .map(|pixels| pixels[y as usize * self.pitch() + x as usize])
    }

    /// Backend surface, for entries standing for a render target
    pub fn surface(&self) -> Option<SurfaceHandle> {
        match self.data {
            TextureData::Surface(handle) => Some(handle),
            TextureData::Bitmap(_) => None,
        }
    }

    pub fn is_render_target(&self) -> bool {
        self.alias_of.is_some()
    }

    /// Render target this entry aliases
    pub fn alias_of(&self) -> Option<SurfaceHandle> {
        self.alias_of
    }

    /// RGBA32 palette for entries holding raw indices
    pub fn palette(&self) -> Option<&[u32; 256]> {
        self.palette.as_deref()
    }

    /// Rectangle whose texels match memory
    pub fn valid_rect(&self) -> Rect {
        self.valid
    }

    /// Pending writes, in this entry's pixels
    pub fn dirty_bounds(&self) -> Rect {
        self.dirty.bounds()
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn age(&self) -> u32 {
        self.age
    }
}
