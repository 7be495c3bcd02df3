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

//! Texture cache
//!
//! Maps a texture description (base pointer, buffer width, mode, size,
//! wrap modes, palette) to decoded texels and keeps them coherent with local
//! memory without re-decoding more than was written.
//!
//! # Entry lifecycle
//!
//! ```text
//! absent -> building -> valid <-> partially dirty -> evicted
//! ```
//!
//! Writes are reported through [`TextureCache::invalidate`] and friends and
//! only recorded as dirty rectangles; the next [`TextureCache::fetch`] of an
//! entry re-decodes the union of its dirty rectangles intersected with what
//! it currently holds. A fetch whose base pointer matches a live render
//! target is answered from the target's surface instead, retiled and
//! resampled through the [`RenderBackend`] when the texture reads it with a
//! different buffer width or size.
//!
//! Bitmap entries age by one every [`TextureCache::end_frame`] and are
//! evicted once older than `max_age`. Render targets age the same way but
//! the most recently used `min_live_targets` of them are always kept.

mod dirty;
mod entry;
mod target;

pub use dirty::{DirtyRect, DirtyRectList};
pub use entry::{CachedTexture, EntryState, TextureData, TextureKey};
pub use target::{RenderBackend, SoftwareBackend, Surface, SurfaceHandle, TargetDesc, TileLayout};

use std::collections::hash_map::Entry;
use std::hash::Hasher;

use fnv::{FnvHashMap, FnvHasher};
use serde::Serialize;

use crate::core::clut::{ClutFormat, ClutManager};
use crate::core::config::{CacheConfig, PaletteOutput};
use crate::core::error::{GsError, Result};
use crate::core::local_memory::{LocalMemory, TexelLookup};
use crate::core::memory::PageSet;
use crate::core::psm::{shares_bits, Psm};
use crate::core::rect::Rect;
use crate::core::registers::{Clamp, Tex0, Texa, WrapMode};
use crate::core::swizzle::{BufferDesc, TexelConversion, TransferRegion};
use target::{AliasKey, RenderTarget};

/// Palette used for direct-colour conversions, never indexed
static NO_PALETTE: [u32; 256] = [0; 256];

/// Texture registers of one fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureRequest {
    pub tex0: Tex0,
    pub clamp: Clamp,
    pub texa: Texa,
}

/// A rectangle of local memory that was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRegion {
    /// Base pointer (blocks)
    pub bp: u32,
    /// Buffer width (64 pixel units)
    pub bw: u32,
    pub psm: Psm,
    pub rect: Rect,
}

impl From<&TransferRegion> for WriteRegion {
    fn from(region: &TransferRegion) -> Self {
        Self {
            bp: region.bp,
            bw: region.bw,
            psm: region.psm,
            rect: region.rect(),
        }
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub full_decodes: u64,
    pub partial_redecodes: u64,
    pub texels_decoded: u64,
    pub invalidations: u64,
    pub hash_matches: u64,
    pub speculative_skips: u64,
    pub evictions: u64,
    pub alias_hits: u64,
    pub retiles: u64,
    pub resamples: u64,
}

/// Rectangle of the texture that sampling can reach under `clamp`
///
/// Region clamp reaches `[min, max]`, region repeat reaches
/// `[max, max | min]`. A range that misses the texture entirely falls back
/// to the whole texture.
pub fn required_rect(clamp: &Clamp, width: u32, height: u32) -> Rect {
    fn axis(mode: WrapMode, min: u32, max: u32, size: u32) -> (u32, u32) {
        let (lo, hi) = match mode {
            WrapMode::Repeat | WrapMode::Clamp => (0, size),
            WrapMode::RegionClamp => (min.min(max), max.max(min) + 1),
            WrapMode::RegionRepeat => (max, (max | min) + 1),
        };
        let hi = hi.min(size);
        if lo >= hi {
            (0, size)
        } else {
            (lo, hi)
        }
    }

    let (left, right) = axis(clamp.wms, clamp.minu, clamp.maxu, width);
    let (top, bottom) = axis(clamp.wmt, clamp.minv, clamp.maxv, height);
    Rect::new(left, top, right, bottom)
}

fn palette_hash(palette: &[u32]) -> u64 {
    let mut hasher = FnvHasher::default();
    for &color in palette {
        hasher.write_u32(color);
    }
    hasher.finish()
}

/// Decoded texture cache
#[derive(Debug)]
pub struct TextureCache {
    config: CacheConfig,
    entries: FnvHashMap<TextureKey, CachedTexture>,
    targets: FnvHashMap<SurfaceHandle, RenderTarget>,
    stats: CacheStats,
}

impl TextureCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: FnvHashMap::default(),
            targets: FnvHashMap::default(),
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of cached textures (render targets not included)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn has_target(&self, handle: SurfaceHandle) -> bool {
        self.targets.contains_key(&handle)
    }

    /// Cached entries, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &CachedTexture> {
        self.entries.values()
    }

    /// Look a texture up, decoding or refreshing it as needed
    ///
    /// # Errors
    ///
    /// - [`GsError::UnsupportedPsm`] if TEX0.PSM names no storage mode
    /// - [`GsError::InvalidPaletteFormat`] for an indexed texture whose
    ///   CPSM is not a colour format; the caller must decode outside the cache
    /// - [`GsError::CacheExhausted`] if a new entry is needed and nothing is
    ///   evictable
    /// - backend errors while resolving a render target
    pub fn fetch(
        &mut self,
        mem: &LocalMemory,
        clut: &mut ClutManager,
        backend: &mut dyn RenderBackend,
        request: &TextureRequest,
    ) -> Result<&CachedTexture> {
        let tex0 = request.tex0;
        let psm = Psm::try_from_code(tex0.psm)?;
        if psm.is_indexed() && ClutFormat::from_cpsm(tex0.cpsm).is_none() {
            log::warn!("Refusing {} texture with palette format 0x{:02X}", psm, tex0.cpsm);
            return Err(GsError::InvalidPaletteFormat { psm, cpsm: tex0.cpsm });
        }
        let (width, height) = (tex0.width(), tex0.height());

        if !psm.is_indexed() {
            if let Some(target) = self.find_target(tex0.tbp0, psm) {
                return self.fetch_alias(mem, backend, target, psm, request);
            }
        }

        let mut key = TextureKey {
            tbp0: tex0.tbp0,
            tbw: tex0.tbw,
            psm,
            width,
            height,
            wrap: (request.clamp.wms, request.clamp.wmt),
            palette: None,
            texa: None,
        };
        let mut native_palette = None;
        let conversion = if psm.is_indexed() {
            let colors = clut.read32(psm, &tex0, &request.texa);
            match self.config.palette_output {
                PaletteOutput::Expanded => {
                    key.palette = Some(palette_hash(&colors[..psm.descriptor().pal as usize]));
                    TexelConversion::Rgba(TexelLookup {
                        clut: colors,
                        texa: request.texa,
                    })
                }
                PaletteOutput::Native => {
                    native_palette = Some(Box::new(*colors));
                    TexelConversion::Raw
                }
            }
        } else {
            if !matches!(psm, Psm::Ct32 | Psm::Z32) {
                key.texa = Some(request.texa);
            }
            TexelConversion::Rgba(TexelLookup {
                clut: &NO_PALETTE,
                texa: request.texa,
            })
        };
        let required = required_rect(&request.clamp, width, height);

        if !self.entries.contains_key(&key) {
            self.ensure_capacity()?;
        }
        let entry = match self.entries.entry(key) {
            Entry::Occupied(occupied) => {
                self.stats.hits += 1;
                let entry = occupied.into_mut();
                entry.refresh(mem, &conversion, required, &self.config, &mut self.stats);
                entry
            }
            Entry::Vacant(vacant) => {
                self.stats.misses += 1;
                log::debug!("Texture cache miss: {} {}x{} at bp={} bw={}", psm, width, height, key.tbp0, key.tbw);
                vacant.insert(CachedTexture::build(
                    mem,
                    key,
                    &conversion,
                    required,
                    &self.config,
                    &mut self.stats,
                ))
            }
        };
        if native_palette.is_some() {
            entry.palette = native_palette;
        }
        Ok(&*entry)
    }

    fn find_target(&self, bp: u32, psm: Psm) -> Option<SurfaceHandle> {
        self.targets
            .values()
            .filter(|t| {
                t.desc.bp == bp
                    && shares_bits(t.desc.psm, psm)
                    && t.desc.psm.layout().element_bits() == psm.layout().element_bits()
            })
            .min_by_key(|t| (t.age, t.handle))
            .map(|t| t.handle)
    }

    fn fetch_alias(
        &mut self,
        mem: &LocalMemory,
        backend: &mut dyn RenderBackend,
        target: SurfaceHandle,
        psm: Psm,
        request: &TextureRequest,
    ) -> Result<&CachedTexture> {
        let surface = self.resolve_alias(mem, backend, target, request)?;
        let tex0 = request.tex0;
        let key = TextureKey {
            tbp0: tex0.tbp0,
            tbw: tex0.tbw,
            psm,
            width: tex0.width(),
            height: tex0.height(),
            wrap: (request.clamp.wms, request.clamp.wmt),
            palette: None,
            texa: None,
        };

        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| CachedTexture::alias(key, target, surface));
        entry.data = TextureData::Surface(surface);
        entry.alias_of = Some(target);
        entry.age = 0;
        Ok(&*entry)
    }

    /// Surface presenting render target `target` as the texture in `request`
    ///
    /// Memory written since the target was last synchronised is uploaded
    /// first. A different buffer width retiles the surface, a different size
    /// resamples it; both results are cached with the target.
    pub fn resolve_alias(
        &mut self,
        mem: &LocalMemory,
        backend: &mut dyn RenderBackend,
        target: SurfaceHandle,
        request: &TextureRequest,
    ) -> Result<SurfaceHandle> {
        let tex0 = request.tex0;
        let psm = Psm::try_from_code(tex0.psm)?;
        let filter = self.config.resample_filter;
        let target = self
            .targets
            .get_mut(&target)
            .ok_or(GsError::UnknownSurface(target))?;
        target.age = 0;
        let desc = target.desc;

        if !target.dirty.is_empty() {
            let rect = target.dirty.bounds().intersect(&desc.rect());
            target.dirty.clear();
            target.release_sub_surfaces(backend);
            if !rect.is_empty() {
                let pitch = rect.right as usize;
                let mut texels = vec![0u32; rect.bottom as usize * pitch];
                let conversion = TexelConversion::Rgba(TexelLookup {
                    clut: &NO_PALETTE,
                    texa: request.texa,
                });
                mem.decode_texture(
                    BufferDesc::new(desc.psm, desc.bp, desc.bw),
                    rect,
                    &conversion,
                    &mut texels,
                    pitch,
                );
                let start = rect.top as usize * pitch + rect.left as usize;
                backend.upload(target.handle, rect, &texels[start..], pitch)?;
                log::debug!("Uploaded {:?} of render target {:?} from memory", rect, target.handle);
            }
        }

        let (width, height) = (tex0.width(), tex0.height());
        if tex0.tbw == desc.bw && width == desc.width && height == desc.height {
            return Ok(target.handle);
        }

        let alias_key = AliasKey {
            psm,
            bw: tex0.tbw,
            width,
            height,
        };
        if let Some(&handle) = target.sub_surfaces.get(&alias_key) {
            self.stats.alias_hits += 1;
            return Ok(handle);
        }

        let mut handle = target.handle;
        let mut intermediate = None;
        if tex0.tbw != desc.bw {
            let from = TileLayout {
                psm: desc.psm,
                bw: desc.bw,
            };
            let to = TileLayout { psm, bw: tex0.tbw };
            handle = backend.retile(handle, &from, &to, desc.width, desc.height)?;
            intermediate = Some(handle);
            self.stats.retiles += 1;
        }
        if width != desc.width || height != desc.height {
            let resampled = backend.resample(handle, width, height, filter)?;
            if let Some(retiled) = intermediate {
                backend.release(retiled);
            }
            handle = resampled;
            self.stats.resamples += 1;
        }
        target.sub_surfaces.insert(alias_key, handle);
        Ok(handle)
    }

    /// Evict until a new entry fits
    ///
    /// Only bitmap entries are evicted; the oldest goes first.
    fn ensure_capacity(&mut self) -> Result<()> {
        let capacity = self.config.max_entries;
        while self.entries.len() >= capacity {
            let victim = self
                .entries
                .iter()
                .filter(|(_, e)| e.alias_of.is_none())
                .max_by_key(|(_, e)| e.age)
                .map(|(key, _)| *key);
            match victim {
                Some(key) => {
                    self.entries.remove(&key);
                    self.stats.evictions += 1;
                    log::debug!("Evicted {:?} to make room", key);
                }
                None => {
                    log::warn!("Texture cache exhausted: {} entries, all render targets", capacity);
                    return Err(GsError::CacheExhausted { capacity });
                }
            }
        }
        Ok(())
    }

    /// Record a write to local memory
    ///
    /// Every entry whose pages overlap the write and whose mode shares bits
    /// with the written mode gets a dirty rectangle in its own pixels: the
    /// written rectangle when the entry has the same base pointer, width and
    /// layout, otherwise the part of its extent lying on the pages the write
    /// touched. Render targets are marked the same way, meaning memory is now
    /// newer than their surface.
    pub fn invalidate(&mut self, region: &WriteRegion) {
        if region.rect.is_empty() {
            return;
        }
        let r = region.rect;
        let pages = PageSet::from_rect(region.psm.layout(), region.bp, region.bw, r.left, r.top, r.right, r.bottom);
        let dirty_for = |bp: u32, bw: u32, psm: Psm, extent: Rect| {
            let rect = if bp == region.bp && bw == region.bw && psm.layout() == region.psm.layout() {
                region.rect.intersect(&extent)
            } else {
                pages.buffer_rect(psm.layout(), bp, bw, extent)
            };
            (!rect.is_empty()).then(|| DirtyRect::new(rect, psm))
        };

        for entry in self.entries.values_mut() {
            if entry.alias_of.is_some() || !entry.pages.intersects(&pages) || !shares_bits(entry.key.psm, region.psm) {
                continue;
            }
            let key = entry.key;
            if let Some(dirty) = dirty_for(key.tbp0, key.tbw, key.psm, key.rect()) {
                entry.mark_dirty(dirty);
                self.stats.invalidations += 1;
            }
        }

        for target in self.targets.values_mut() {
            if target.pages.intersects(&pages) && shares_bits(target.desc.psm, region.psm) {
                let desc = target.desc;
                if let Some(dirty) = dirty_for(desc.bp, desc.bw, desc.psm, desc.rect()) {
                    target.dirty.push(dirty);
                }
            }
        }
    }

    /// Record a raw write to whole pages (CPU writes, save-state loads)
    pub fn invalidate_pages(&mut self, pages: &PageSet) {
        for entry in self.entries.values_mut() {
            if entry.alias_of.is_none() && entry.pages.intersects(pages) {
                let key = entry.key;
                entry.mark_dirty(DirtyRect::new(key.rect(), key.psm));
                self.stats.invalidations += 1;
            }
        }
        for target in self.targets.values_mut() {
            if target.pages.intersects(pages) {
                let desc = target.desc;
                target.dirty.push(DirtyRect::new(desc.rect(), desc.psm));
            }
        }
    }

    /// The renderer drew into `handle`
    ///
    /// Bitmap entries decoded from the memory under the target are stale and
    /// dropped, as are the target's retiled and resampled copies.
    pub fn invalidate_from_target(&mut self, handle: SurfaceHandle, backend: &mut dyn RenderBackend) -> Result<()> {
        let target = self
            .targets
            .get_mut(&handle)
            .ok_or(GsError::UnknownSurface(handle))?;
        target.age = 0;
        target.dirty.clear();
        target.release_sub_surfaces(backend);
        let (pages, psm) = (target.pages, target.desc.psm);

        let before = self.entries.len();
        self.entries.retain(|_, e| {
            if e.alias_of == Some(handle) {
                return false;
            }
            e.alias_of.is_some() || !(e.pages.intersects(&pages) && shares_bits(e.key.psm, psm))
        });
        let dropped = before - self.entries.len();
        self.stats.evictions += dropped as u64;
        log::debug!("Render target {:?} drawn: dropped {} cached textures", handle, dropped);
        Ok(())
    }

    /// Forget every decoded texture and mark every target stale
    pub fn invalidate_all(&mut self, backend: &mut dyn RenderBackend) {
        self.stats.evictions += self.entries.len() as u64;
        self.entries.clear();
        for target in self.targets.values_mut() {
            target.release_sub_surfaces(backend);
            target.dirty.clear();
            target.dirty.push(DirtyRect::new(target.desc.rect(), target.desc.psm));
        }
        log::info!("Texture cache invalidated");
    }

    /// Start tracking a render target; the cache now owns `handle`
    pub fn register_render_target(&mut self, desc: TargetDesc, handle: SurfaceHandle) {
        log::debug!(
            "Render target {:?}: {} {}x{} at bp={} bw={}",
            handle,
            desc.psm,
            desc.width,
            desc.height,
            desc.bp,
            desc.bw
        );
        self.targets.insert(handle, RenderTarget::new(desc, handle));
    }

    /// Mark a render target as used this frame
    pub fn touch_render_target(&mut self, handle: SurfaceHandle) -> Result<()> {
        let target = self
            .targets
            .get_mut(&handle)
            .ok_or(GsError::UnknownSurface(handle))?;
        target.age = 0;
        Ok(())
    }

    /// Stop tracking a render target and release its surfaces
    pub fn drop_render_target(&mut self, handle: SurfaceHandle, backend: &mut dyn RenderBackend) -> Result<()> {
        let target = self
            .targets
            .remove(&handle)
            .ok_or(GsError::UnknownSurface(handle))?;
        self.release_target(target, backend);
        Ok(())
    }

    fn release_target(&mut self, mut target: RenderTarget, backend: &mut dyn RenderBackend) {
        target.release_sub_surfaces(backend);
        backend.release(target.handle);
        self.entries.retain(|_, e| e.alias_of != Some(target.handle));
    }

    /// Frame boundary: age everything and evict what went unused too long
    pub fn end_frame(&mut self, backend: &mut dyn RenderBackend) {
        let max_age = self.config.max_age;
        for entry in self.entries.values_mut() {
            entry.age += 1;
        }
        for target in self.targets.values_mut() {
            target.age += 1;
        }

        let before = self.entries.len();
        self.entries.retain(|_, e| e.age <= max_age);
        let evicted = before - self.entries.len();
        self.stats.evictions += evicted as u64;

        let mut stale: Vec<(u32, SurfaceHandle)> = self
            .targets
            .values()
            .filter(|t| t.age > max_age)
            .map(|t| (t.age, t.handle))
            .collect();
        stale.sort_by(|a, b| b.cmp(a));
        for (_, handle) in stale {
            if self.targets.len() <= self.config.min_live_targets {
                break;
            }
            if let Some(target) = self.targets.remove(&handle) {
                log::debug!("Render target {:?} aged out", handle);
                self.release_target(target, backend);
                self.stats.evictions += 1;
            }
        }

        if evicted > 0 {
            log::debug!("End of frame: evicted {} textures, {} remain", evicted, self.entries.len());
        }
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
