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

//! GS memory execution context
//!
//! [`GsContext`] is the single owner of local memory, the CLUT, the texture
//! cache and the render backend. Nothing in the core locks: every mutation
//! goes through the context, one at a time.
//!
//! # Command queue
//!
//! External writers (the register layer, host transfers, CPU writes into
//! memory) do not touch memory directly. They [`submit`](GsContext::submit)
//! a [`GsCommand`], and the context applies queued commands in order on
//! [`flush`](GsContext::flush). Every read path (texture fetches, local to
//! host transfers, save states) flushes first, so a read always observes the
//! writes submitted before it.
//!
//! # Transfers
//!
//! Writing TRXDIR starts an image transfer described by BITBLTBUF, TRXPOS
//! and TRXREG:
//!
//! | XDIR | Transfer        | Data path                        |
//! |------|-----------------|----------------------------------|
//! | 0    | host to local   | [`GsCommand::ImageData`]         |
//! | 1    | local to host   | [`GsContext::read_image`]        |
//! | 2    | local to local  | executed immediately             |
//! | 3    | deactivated     | ends any transfer in progress    |
//!
//! Host data may arrive in chunks of any size. Bytes that do not complete
//! a pixel are held until the next chunk.

use std::collections::VecDeque;
use std::sync::Arc;

use super::clut::ClutManager;
use super::config::GsConfig;
use super::error::{GsError, Result};
use super::local_memory::LocalMemory;
use super::memory::savestate::SaveState;
use super::memory::PageSet;
use super::psm::{AddressTables, Psm};
use super::rect::Rect;
use super::registers::{BitBltBuf, Clamp, GsRegisters, Tex0, TexClut, Texa, TrxDir, TrxPos, TrxReg};
use super::swizzle::{ImageTransfer, TransferCursor, TransferDirection, TransferRegion};
use super::texture::{
    CachedTexture, RenderBackend, SoftwareBackend, SurfaceHandle, TargetDesc, TextureCache, TextureRequest,
    WriteRegion,
};

/// GS register addresses handled by the memory core
pub mod addr {
    pub const TEX0_1: u8 = 0x06;
    pub const TEX0_2: u8 = 0x07;
    pub const TEXCLUT: u8 = 0x1C;
    pub const TEXA: u8 = 0x3B;
    pub const BITBLTBUF: u8 = 0x50;
    pub const TRXPOS: u8 = 0x51;
    pub const TRXREG: u8 = 0x52;
    pub const TRXDIR: u8 = 0x53;
    pub const HWREG: u8 = 0x54;
}

/// A write queued for the memory core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GsCommand {
    /// TEX0 write; loads the CLUT as CLD requests
    Tex0(Tex0),
    TexClut(TexClut),
    Texa(Texa),
    BitBltBuf(BitBltBuf),
    TrxPos(TrxPos),
    TrxReg(TrxReg),
    /// TRXDIR write; starts or executes a transfer
    TrxDir(TrxDir),
    /// Host to local transfer data
    ImageData(Vec<u8>),
    /// CPU write of raw bytes at a byte offset into local memory
    RawWrite { offset: usize, data: Vec<u8> },
}

impl GsCommand {
    /// Command for a write of `value` to GS register `address`
    ///
    /// Returns `None` for registers the memory core does not handle. HWREG
    /// writes become 8 bytes of image data.
    pub fn from_register(address: u8, value: u64) -> Option<Self> {
        let command = match address {
            addr::TEX0_1 | addr::TEX0_2 => GsCommand::Tex0(Tex0::from_u64(value)),
            addr::TEXCLUT => GsCommand::TexClut(TexClut::from_u64(value)),
            addr::TEXA => GsCommand::Texa(Texa::from_u64(value)),
            addr::BITBLTBUF => GsCommand::BitBltBuf(BitBltBuf::from_u64(value)),
            addr::TRXPOS => GsCommand::TrxPos(TrxPos::from_u64(value)),
            addr::TRXREG => GsCommand::TrxReg(TrxReg::from_u64(value)),
            addr::TRXDIR => GsCommand::TrxDir(TrxDir::from_u64(value)),
            addr::HWREG => GsCommand::ImageData(value.to_le_bytes().to_vec()),
            _ => return None,
        };
        Some(command)
    }
}

/// Bytes of `len` that make up whole pixels of `bits` each
#[inline]
fn whole_pixel_bytes(len: usize, bits: usize) -> usize {
    len * 8 / bits * bits / 8
}

/// Owner of the GS memory core
pub struct GsContext<B: RenderBackend = SoftwareBackend> {
    /// Local memory and address translation
    mem: LocalMemory,

    clut: ClutManager,

    cache: TextureCache,

    /// Renderer holding render-target surfaces
    backend: B,

    /// Memory-related registers as last written
    regs: GsRegisters,

    /// Image transfer in progress
    transfer: Option<ImageTransfer>,

    /// Host transfer bytes short of a whole pixel
    pending: Vec<u8>,

    /// Writes not yet applied
    queue: VecDeque<GsCommand>,
}

impl GsContext<SoftwareBackend> {
    /// Create a context rendering into host-memory surfaces
    pub fn new(config: &GsConfig) -> Self {
        let tables = Arc::new(AddressTables::new());
        let backend = SoftwareBackend::new(Arc::clone(&tables));
        let mem = LocalMemory::with_tables(&config.swizzle, tables);
        Self::assemble(config, mem, backend)
    }
}

impl Default for GsContext<SoftwareBackend> {
    fn default() -> Self {
        Self::new(&GsConfig::default())
    }
}

impl<B: RenderBackend> GsContext<B> {
    /// Create a context around an existing render backend
    pub fn with_backend(config: &GsConfig, backend: B) -> Self {
        Self::assemble(config, LocalMemory::new(&config.swizzle), backend)
    }

    fn assemble(config: &GsConfig, mem: LocalMemory, backend: B) -> Self {
        log::info!(
            "GS memory core ready: max_age={} max_entries={} hash_speculation={}",
            config.cache.max_age,
            config.cache.max_entries,
            config.cache.hash_speculation
        );
        Self {
            mem,
            clut: ClutManager::new(),
            cache: TextureCache::new(config.cache.clone()),
            backend,
            regs: GsRegisters::default(),
            transfer: None,
            pending: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    /// Clear memory and forget all state
    ///
    /// Render targets stay registered but are marked stale.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.mem.raw_mut().clear();
        self.clut.restore(&[], [0, 0]);
        self.regs = GsRegisters::default();
        self.transfer = None;
        self.pending.clear();
        self.cache.invalidate_all(&mut self.backend);
        log::info!("GS memory core reset");
    }

    /// Local memory
    ///
    /// Does not flush: queued writes may still be pending.
    #[inline]
    pub fn memory(&self) -> &LocalMemory {
        &self.mem
    }

    #[inline]
    pub fn clut(&self) -> &ClutManager {
        &self.clut
    }

    #[inline]
    pub fn cache(&self) -> &TextureCache {
        &self.cache
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn registers(&self) -> &GsRegisters {
        &self.regs
    }

    /// Image transfer in progress, if any
    #[inline]
    pub fn transfer(&self) -> Option<&ImageTransfer> {
        self.transfer.as_ref()
    }

    /// Number of submitted commands not yet applied
    #[inline]
    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    /// Queue a write
    pub fn submit(&mut self, command: GsCommand) {
        self.queue.push_back(command);
    }

    /// Queue a GS register write
    ///
    /// Returns false (and queues nothing) for registers outside the memory core.
    pub fn submit_register(&mut self, address: u8, value: u64) -> bool {
        match GsCommand::from_register(address, value) {
            Some(command) => {
                self.submit(command);
                true
            }
            None => {
                log::trace!("Ignoring GS register 0x{:02X}", address);
                false
            }
        }
    }

    /// Apply every queued command in submission order
    ///
    /// A failing command does not stop the queue: the remaining commands are
    /// still applied and the first error is returned.
    pub fn flush(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(command) = self.queue.pop_front() {
            if let Err(e) = self.apply(command) {
                log::warn!("GS command failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn apply(&mut self, command: GsCommand) -> Result<()> {
        match command {
            GsCommand::Tex0(tex0) => self.write_tex0(tex0),
            GsCommand::TexClut(texclut) => self.regs.texclut = texclut,
            GsCommand::Texa(texa) => self.regs.texa = texa,
            GsCommand::BitBltBuf(buf) => self.regs.bitbltbuf = buf,
            GsCommand::TrxPos(pos) => self.regs.trxpos = pos,
            GsCommand::TrxReg(reg) => self.regs.trxreg = reg,
            GsCommand::TrxDir(dir) => return self.start_transfer(dir),
            GsCommand::ImageData(data) => return self.apply_image_data(&data),
            GsCommand::RawWrite { offset, data } => self.apply_raw_write(offset, &data),
        }
        Ok(())
    }

    fn write_tex0(&mut self, tex0: Tex0) {
        self.regs.tex0 = tex0;
        if self.clut.load_requested(&tex0) && self.clut.write(&self.mem, &tex0, &self.regs.texclut) {
            log::trace!("CLUT loaded from cbp=0x{:X} cpsm=0x{:X}", tex0.cbp, tex0.cpsm);
        }
    }

    fn start_transfer(&mut self, dir: TrxDir) -> Result<()> {
        if let Some(old) = self.transfer.take() {
            if !old.is_complete() {
                log::debug!(
                    "Abandoning {:?} transfer with {} pixels left",
                    old.direction,
                    old.cursor.remaining(&old.region)
                );
            }
        }
        self.pending.clear();

        let (buf, pos, reg) = (self.regs.bitbltbuf, self.regs.trxpos, self.regs.trxreg);
        let direction = TransferDirection::from_xdir(dir.xdir);
        match direction {
            TransferDirection::HostToLocal => {
                let region = TransferRegion::destination(&buf, &pos, &reg)?;
                log::debug!(
                    "Host->local transfer: {} {}x{} at ({}, {}) bp={} bw={}",
                    region.psm,
                    region.width,
                    region.height,
                    region.x,
                    region.y,
                    region.bp,
                    region.bw
                );
                self.transfer = Some(ImageTransfer::new(region, direction));
            }
            TransferDirection::LocalToHost => {
                let region = TransferRegion::source(&buf, &pos, &reg)?;
                log::debug!(
                    "Local->host transfer: {} {}x{} at ({}, {}) bp={} bw={}",
                    region.psm,
                    region.width,
                    region.height,
                    region.x,
                    region.y,
                    region.bp,
                    region.bw
                );
                self.transfer = Some(ImageTransfer::new(region, direction));
            }
            TransferDirection::LocalToLocal => {
                let src = TransferRegion::source(&buf, &pos, &reg)?;
                let dst = TransferRegion::destination(&buf, &pos, &reg)?;
                self.mem.move_rect(&src, &dst, pos.dir);
                self.invalidate_written(&WriteRegion::from(&dst));
            }
            TransferDirection::Deactivated => {}
        }
        Ok(())
    }

    /// Feed host to local transfer data
    ///
    /// Flushes queued commands first. Data beyond the end of the transfer is
    /// dropped; the transfer ends once its last pixel is stored.
    ///
    /// # Errors
    ///
    /// - [`GsError::NoActiveTransfer`] if no transfer was started
    /// - [`GsError::TransferDirection`] if the active transfer is not host to local
    pub fn write_image(&mut self, data: &[u8]) -> Result<()> {
        self.flush()?;
        self.apply_image_data(data)
    }

    fn apply_image_data(&mut self, data: &[u8]) -> Result<()> {
        let mut transfer = self.transfer.ok_or(GsError::NoActiveTransfer)?;
        if transfer.direction != TransferDirection::HostToLocal {
            return Err(GsError::TransferDirection {
                requested: TransferDirection::HostToLocal,
                active: transfer.direction,
            });
        }

        let bits = transfer.region.bits_per_pixel() as usize;
        let start = transfer.cursor;
        if self.pending.is_empty() {
            let usable = whole_pixel_bytes(data.len(), bits);
            transfer.cursor = self.mem.swizzle_in(&transfer.region, start, &data[..usable]);
            self.pending.extend_from_slice(&data[usable..]);
        } else {
            self.pending.extend_from_slice(data);
            let usable = whole_pixel_bytes(self.pending.len(), bits);
            transfer.cursor = self.mem.swizzle_in(&transfer.region, start, &self.pending[..usable]);
            self.pending.drain(..usable);
        }
        self.invalidate_rows(&transfer.region, start, transfer.cursor);

        if transfer.is_complete() {
            if !self.pending.is_empty() {
                log::debug!("Dropping {} bytes past the end of the transfer", self.pending.len());
                self.pending.clear();
            }
            log::trace!("Host->local transfer complete");
            self.transfer = None;
        } else {
            self.transfer = Some(transfer);
        }
        Ok(())
    }

    /// Read local to host transfer data into `dst`
    ///
    /// Flushes queued commands first. Returns the number of bytes produced,
    /// which is less than `dst.len()` only when the transfer ends.
    ///
    /// # Errors
    ///
    /// - [`GsError::NoActiveTransfer`] if no transfer was started
    /// - [`GsError::TransferDirection`] if the active transfer is not local to host
    pub fn read_image(&mut self, dst: &mut [u8]) -> Result<usize> {
        self.flush()?;
        let mut transfer = self.transfer.ok_or(GsError::NoActiveTransfer)?;
        if transfer.direction != TransferDirection::LocalToHost {
            return Err(GsError::TransferDirection {
                requested: TransferDirection::LocalToHost,
                active: transfer.direction,
            });
        }

        let (cursor, written) = self.mem.read_image(&transfer.region, transfer.cursor, dst);
        transfer.cursor = cursor;
        self.transfer = if transfer.is_complete() { None } else { Some(transfer) };
        Ok(written)
    }

    /// Write raw bytes into local memory at a byte offset
    ///
    /// Flushes queued commands first, then behaves like a queued
    /// [`GsCommand::RawWrite`].
    pub fn write_raw(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.flush()?;
        self.apply_raw_write(offset, data);
        Ok(())
    }

    /// Write one pixel through `psm`
    ///
    /// Flushes queued commands first. Cached textures and the CLUT see the
    /// write like any other.
    pub fn write_pixel(&mut self, psm: Psm, x: u32, y: u32, bp: u32, bw: u32, value: u32) -> Result<()> {
        self.flush()?;
        self.mem.write_pixel(psm, x, y, bp, bw, value);
        self.invalidate_written(&WriteRegion {
            bp,
            bw,
            psm,
            rect: Rect::new(x, y, x + 1, y + 1),
        });
        Ok(())
    }

    fn apply_raw_write(&mut self, offset: usize, data: &[u8]) {
        self.mem.raw_mut().write_bytes(offset, data);
        let pages = PageSet::from_byte_range(offset, data.len());
        self.cache.invalidate_pages(&pages);
        self.clut.invalidate_pages(&pages);
    }

    /// Rows `from.y` up to the row holding `to` were written
    fn invalidate_rows(&mut self, region: &TransferRegion, from: TransferCursor, to: TransferCursor) {
        if from == to {
            return;
        }
        let bottom = (to.y + u32::from(to.x != region.x)).min(region.bottom());
        let rect = Rect::new(region.x, from.y, region.right(), bottom);
        self.invalidate_written(&WriteRegion {
            bp: region.bp,
            bw: region.bw,
            psm: region.psm,
            rect,
        });
    }

    fn invalidate_written(&mut self, write: &WriteRegion) {
        let r = write.rect;
        self.cache.invalidate(write);
        self.clut
            .invalidate_pages(&PageSet::from_rect(write.psm.layout(), write.bp, write.bw, r.left, r.top, r.right, r.bottom));
    }

    /// Texture described by the current TEX0 and TEXA, sampled with `clamp`
    ///
    /// Flushes queued commands first. See [`TextureCache::fetch`] for errors.
    pub fn fetch_texture(&mut self, clamp: Clamp) -> Result<&CachedTexture> {
        self.flush()?;
        let request = TextureRequest {
            tex0: self.regs.tex0,
            clamp,
            texa: self.regs.texa,
        };
        self.cache.fetch(&self.mem, &mut self.clut, &mut self.backend, &request)
    }

    /// Allocate a surface for a render target and start tracking it
    pub fn register_render_target(&mut self, desc: TargetDesc) -> SurfaceHandle {
        let handle = self.backend.create_surface(desc.width, desc.height);
        self.cache.register_render_target(desc, handle);
        handle
    }

    /// The renderer drew into `handle` this frame
    pub fn target_drawn(&mut self, handle: SurfaceHandle) -> Result<()> {
        self.cache.touch_render_target(handle)?;
        self.cache.invalidate_from_target(handle, &mut self.backend)
    }

    /// Stop tracking a render target and free its surfaces
    pub fn drop_render_target(&mut self, handle: SurfaceHandle) -> Result<()> {
        self.cache.drop_render_target(handle, &mut self.backend)
    }

    /// Frame boundary: flush, then age the texture cache
    pub fn end_frame(&mut self) -> Result<()> {
        let flushed = self.flush();
        self.cache.end_frame(&mut self.backend);
        flushed
    }

    /// Snapshot the core after applying queued commands
    pub fn save_state(&mut self) -> Result<SaveState> {
        self.flush()?;
        Ok(SaveState::capture(
            self.mem.raw(),
            &self.clut,
            self.regs,
            self.transfer,
            &self.pending,
        ))
    }

    /// Restore a snapshot
    ///
    /// Queued commands are discarded. Every decoded texture is dropped and
    /// every render target marked stale, since memory changed underneath them.
    pub fn load_state(&mut self, state: &SaveState) -> Result<()> {
        self.mem.raw_mut().load_image(&state.memory)?;
        self.queue.clear();
        self.clut.restore(&state.clut, state.clut_cbp);
        self.regs = state.registers;
        self.transfer = state.transfer;
        self.pending = state.pending.clone();
        self.cache.invalidate_all(&mut self.backend);
        log::info!("Save state from {} restored", state.created_at);
        Ok(())
    }
}

impl<B: RenderBackend> std::fmt::Debug for GsContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GsContext")
            .field("mem", &self.mem)
            .field("clut", &self.clut)
            .field("cache_entries", &self.cache.len())
            .field("transfer", &self.transfer)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
