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

//! Render targets and the backend seam
//!
//! The cache never touches backend storage directly. Everything it needs
//! from the renderer goes through [`RenderBackend`]: creating surfaces,
//! retiling a surface to another buffer width, resampling it to another
//! size, and uploading texels decoded from local memory.
//! [`SoftwareBackend`] keeps surfaces in host memory and is used by the
//! command-line tool and the tests.

use std::sync::Arc;

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

use super::dirty::DirtyRectList;
use crate::core::config::ResampleFilter;
use crate::core::error::{GsError, Result};
use crate::core::memory::PageSet;
use crate::core::psm::{AddressTables, Psm};
use crate::core::rect::Rect;

/// Opaque handle to backend-resident storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceHandle(pub u32);

/// How a surface's texels map to local memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileLayout {
    pub psm: Psm,
    /// Buffer width (64 pixel units)
    pub bw: u32,
}

/// A render target as the renderer created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetDesc {
    /// Base pointer (blocks)
    pub bp: u32,
    /// Buffer width (64 pixel units)
    pub bw: u32,
    pub psm: Psm,
    pub width: u32,
    pub height: u32,
}

impl TargetDesc {
    pub fn rect(&self) -> Rect {
        Rect::from_size(0, 0, self.width, self.height)
    }

    pub(crate) fn pages(&self) -> PageSet {
        PageSet::from_rect(self.psm.layout(), self.bp, self.bw, 0, 0, self.width, self.height)
    }
}

/// Renderer operations the texture cache relies on
pub trait RenderBackend {
    /// Allocate a zeroed RGBA32 surface
    fn create_surface(&mut self, width: u32, height: u32) -> SurfaceHandle;

    /// New `width`×`height` surface holding `src` reinterpreted from tiling
    /// `from` to tiling `to`
    fn retile(
        &mut self,
        src: SurfaceHandle,
        from: &TileLayout,
        to: &TileLayout,
        width: u32,
        height: u32,
    ) -> Result<SurfaceHandle>;

    /// New surface holding `src` scaled to `width`×`height`
    fn resample(&mut self, src: SurfaceHandle, width: u32, height: u32, filter: ResampleFilter) -> Result<SurfaceHandle>;

    /// Overwrite `rect` of a surface; `pixels` starts at the rect's top-left
    /// corner and has `pitch` texels per row
    fn upload(&mut self, surface: SurfaceHandle, rect: Rect, pixels: &[u32], pitch: usize) -> Result<()>;

    /// Free a surface; unknown handles are ignored
    fn release(&mut self, surface: SurfaceHandle);
}

/// Host-memory surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl Surface {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// [`RenderBackend`] keeping every surface in host memory
#[derive(Debug)]
pub struct SoftwareBackend {
    tables: Arc<AddressTables>,
    surfaces: FnvHashMap<SurfaceHandle, Surface>,
    next: u32,
}

impl SoftwareBackend {
    pub fn new(tables: Arc<AddressTables>) -> Self {
        Self {
            tables,
            surfaces: FnvHashMap::default(),
            next: 1,
        }
    }

    pub fn surface(&self, handle: SurfaceHandle) -> Option<&Surface> {
        self.surfaces.get(&handle)
    }

    /// Direct access, standing in for the renderer drawing into a surface
    pub fn surface_mut(&mut self, handle: SurfaceHandle) -> Option<&mut Surface> {
        self.surfaces.get_mut(&handle)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    fn insert(&mut self, surface: Surface) -> SurfaceHandle {
        let handle = SurfaceHandle(self.next);
        self.next = self.next.wrapping_add(1).max(1);
        self.surfaces.insert(handle, surface);
        handle
    }

    fn get(&self, handle: SurfaceHandle) -> Result<&Surface> {
        self.surfaces.get(&handle).ok_or(GsError::UnknownSurface(handle))
    }
}

impl RenderBackend for SoftwareBackend {
    fn create_surface(&mut self, width: u32, height: u32) -> SurfaceHandle {
        self.insert(Surface::new(width, height))
    }

    fn retile(
        &mut self,
        src: SurfaceHandle,
        from: &TileLayout,
        to: &TileLayout,
        width: u32,
        height: u32,
    ) -> Result<SurfaceHandle> {
        let source = self.get(src)?;
        let mut out = Surface::new(width, height);
        let from_layout = from.psm.layout();
        let to_layout = to.psm.layout();

        for y in 0..height {
            for x in 0..width {
                let addr = self.tables.pixel_address(to_layout, x, y, 0, to.bw);
                let (sx, sy) = self.tables.pixel_coords(from_layout, addr, 0, from.bw);
                if sx < source.width && sy < source.height {
                    out.pixels[(y * width + x) as usize] = source.get(sx, sy);
                }
            }
        }
        log::debug!(
            "Retiled surface {:?} from {} bw={} to {} bw={} ({}x{})",
            src,
            from.psm,
            from.bw,
            to.psm,
            to.bw,
            width,
            height
        );
        Ok(self.insert(out))
    }

    fn resample(&mut self, src: SurfaceHandle, width: u32, height: u32, filter: ResampleFilter) -> Result<SurfaceHandle> {
        let source = self.get(src)?;
        let mut out = Surface::new(width, height);
        if source.width > 0 && source.height > 0 {
            for y in 0..height {
                for x in 0..width {
                    out.pixels[(y * width + x) as usize] = match filter {
                        ResampleFilter::Nearest => {
                            let sx = (x as u64 * source.width as u64 / width as u64) as u32;
                            let sy = (y as u64 * source.height as u64 / height as u64) as u32;
                            source.get(sx, sy)
                        }
                        ResampleFilter::Bilinear => bilinear(source, x, y, width, height),
                    };
                }
            }
        }
        Ok(self.insert(out))
    }

    fn upload(&mut self, surface: SurfaceHandle, rect: Rect, pixels: &[u32], pitch: usize) -> Result<()> {
        let target = self
            .surfaces
            .get_mut(&surface)
            .ok_or(GsError::UnknownSurface(surface))?;
        let rect = rect.intersect(&Rect::from_size(0, 0, target.width, target.height));
        for y in rect.top..rect.bottom {
            let row = (y - rect.top) as usize * pitch;
            for x in rect.left..rect.right {
                if let Some(&value) = pixels.get(row + (x - rect.left) as usize) {
                    target.pixels[(y * target.width + x) as usize] = value;
                }
            }
        }
        Ok(())
    }

    fn release(&mut self, surface: SurfaceHandle) {
        self.surfaces.remove(&surface);
    }
}

fn bilinear(src: &Surface, x: u32, y: u32, width: u32, height: u32) -> u32 {
    let sample = |pos: u32, dst: u32, size: u32| -> (u32, u32, f32) {
        let f = ((pos as f32 + 0.5) * size as f32 / dst as f32 - 0.5).max(0.0);
        let i0 = (f.floor() as u32).min(size - 1);
        let i1 = (i0 + 1).min(size - 1);
        (i0, i1, f - i0 as f32)
    };
    let (x0, x1, tx) = sample(x, width, src.width);
    let (y0, y1, ty) = sample(y, height, src.height);
    let corners = [src.get(x0, y0), src.get(x1, y0), src.get(x0, y1), src.get(x1, y1)];

    let mut out = 0u32;
    for shift in [0, 8, 16, 24] {
        let c = |v: u32| ((v >> shift) & 0xFF) as f32;
        let top = c(corners[0]) * (1.0 - tx) + c(corners[1]) * tx;
        let bottom = c(corners[2]) * (1.0 - tx) + c(corners[3]) * tx;
        let v = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u32;
        out |= v << shift;
    }
    out
}

/// Size and tiling a target was reinterpreted as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct AliasKey {
    pub psm: Psm,
    pub bw: u32,
    pub width: u32,
    pub height: u32,
}

/// A live render target known to the cache
#[derive(Debug)]
pub(crate) struct RenderTarget {
    pub desc: TargetDesc,
    pub handle: SurfaceHandle,
    pub pages: PageSet,
    pub age: u32,
    /// Regions where local memory is newer than the surface
    pub dirty: DirtyRectList,
    /// Retiled and resampled copies, owned by this target
    pub sub_surfaces: FnvHashMap<AliasKey, SurfaceHandle>,
}

impl RenderTarget {
    pub fn new(desc: TargetDesc, handle: SurfaceHandle) -> Self {
        Self {
            pages: desc.pages(),
            desc,
            handle,
            age: 0,
            dirty: DirtyRectList::default(),
            sub_surfaces: FnvHashMap::default(),
        }
    }

    pub fn release_sub_surfaces(&mut self, backend: &mut dyn RenderBackend) {
        for (_, handle) in self.sub_surfaces.drain() {
            backend.release(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SoftwareBackend {
        SoftwareBackend::new(Arc::new(AddressTables::new()))
    }

    #[test]
    fn test_upload_and_release() {
        let mut backend = backend();
        let handle = backend.create_surface(4, 4);
        backend
            .upload(handle, Rect::new(1, 1, 3, 3), &[1, 2, 3, 4], 2)
            .unwrap();
        let surface = backend.surface(handle).unwrap();
        assert_eq!(surface.get(1, 1), 1);
        assert_eq!(surface.get(2, 2), 4);
        assert_eq!(surface.get(0, 0), 0);

        backend.release(handle);
        assert!(backend.surface(handle).is_none());
        assert!(matches!(
            backend.upload(handle, Rect::new(0, 0, 1, 1), &[0], 1),
            Err(GsError::UnknownSurface(_))
        ));
    }

    #[test]
    fn test_retile_follows_memory_addresses() {
        let tables = Arc::new(AddressTables::new());
        let mut backend = SoftwareBackend::new(Arc::clone(&tables));
        let src = backend.create_surface(128, 32);
        for y in 0..32 {
            for x in 0..128 {
                backend.surface_mut(src).unwrap().pixels[(y * 128 + x) as usize] =
                    tables.pixel_address(Psm::Ct32.layout(), x, y, 0, 2);
            }
        }

        let from = TileLayout { psm: Psm::Ct32, bw: 2 };
        let to = TileLayout { psm: Psm::Ct32, bw: 1 };
        let out = backend.retile(src, &from, &to, 64, 64).unwrap();
        let out = backend.surface(out).unwrap();
        // Each texel of the new tiling carries the address it reads from memory
        for y in 0..64 {
            for x in 0..64 {
                assert_eq!(out.get(x, y), tables.pixel_address(Psm::Ct32.layout(), x, y, 0, 1));
            }
        }
    }

    #[test]
    fn test_resample_filters() {
        let mut backend = backend();
        let src = backend.create_surface(2, 1);
        backend
            .upload(src, Rect::new(0, 0, 2, 1), &[0x0000_0000, 0xFFFF_FFFF], 2)
            .unwrap();

        let near = backend.resample(src, 4, 1, ResampleFilter::Nearest).unwrap();
        assert_eq!(backend.surface(near).unwrap().pixels, vec![0, 0, 0xFFFF_FFFF, 0xFFFF_FFFF]);

        let linear = backend.resample(src, 4, 1, ResampleFilter::Bilinear).unwrap();
        let pixels = &backend.surface(linear).unwrap().pixels;
        assert_eq!(pixels[0], 0);
        assert_eq!(pixels[3], 0xFFFF_FFFF);
        assert!(pixels[1] & 0xFF > 0 && pixels[1] & 0xFF < 0xFF);
    }
}
