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

//! GS context tests

use super::*;
use crate::core::psm::Psm;

fn ctx() -> GsContext {
    let mut config = GsConfig::default();
    config.cache.hash_speculation = false;
    GsContext::new(&config)
}

fn ct32_bytes(pixels: &[u32]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
}

#[allow(clippy::too_many_arguments)]
fn start_upload(gs: &mut GsContext, bp: u32, bw: u32, psm: u32, x: u32, y: u32, w: u32, h: u32) {
    gs.submit(GsCommand::BitBltBuf(BitBltBuf {
        dbp: bp,
        dbw: bw,
        dpsm: psm,
        ..Default::default()
    }));
    gs.submit(GsCommand::TrxPos(TrxPos {
        dsax: x,
        dsay: y,
        ..Default::default()
    }));
    gs.submit(GsCommand::TrxReg(TrxReg { rrw: w, rrh: h }));
    gs.submit(GsCommand::TrxDir(TrxDir { xdir: 0 }));
}

#[allow(clippy::too_many_arguments)]
fn upload(gs: &mut GsContext, bp: u32, bw: u32, psm: u32, x: u32, y: u32, w: u32, h: u32, data: &[u8]) {
    start_upload(gs, bp, bw, psm, x, y, w, h);
    gs.submit(GsCommand::ImageData(data.to_vec()));
}

fn ct32_tex0(tbp0: u32, tw: u32) -> Tex0 {
    Tex0 {
        tbp0,
        tbw: 1,
        psm: 0x00,
        tw,
        th: tw,
        ..Default::default()
    }
}

fn texel(gs: &mut GsContext, x: u32, y: u32) -> Option<u32> {
    gs.fetch_texture(Clamp::default()).unwrap().texel(x, y)
}

#[test]
fn test_register_commands() {
    let raw = 0x40u64 | (2 << 14) | (0x13 << 20);
    assert_eq!(
        GsCommand::from_register(addr::TEX0_2, raw),
        Some(GsCommand::Tex0(Tex0::from_u64(raw)))
    );
    assert_eq!(
        GsCommand::from_register(addr::HWREG, 0x0807_0605_0403_0201),
        Some(GsCommand::ImageData(vec![1, 2, 3, 4, 5, 6, 7, 8]))
    );
    // PRIM is not a memory register
    assert_eq!(GsCommand::from_register(0x00, 0), None);

    let mut gs = ctx();
    assert!(gs.submit_register(addr::TEXA, 0x80 | (1 << 15) | (0x40u64 << 32)));
    assert!(!gs.submit_register(0x00, 0));
    assert_eq!(gs.pending_commands(), 1);
    gs.flush().unwrap();
    assert_eq!(
        gs.registers().texa,
        Texa {
            ta0: 0x80,
            aem: true,
            ta1: 0x40,
        }
    );
}

#[test]
fn test_queued_upload_applies_on_flush() {
    let mut gs = ctx();
    let pixels: Vec<u32> = (0..64u32).map(|i| 0xFF00_0000 | (i * 0x0001_0203)).collect();
    upload(&mut gs, 0, 1, 0x00, 8, 8, 8, 8, &ct32_bytes(&pixels));

    assert_eq!(gs.pending_commands(), 5);
    assert_eq!(gs.memory().read_pixel(Psm::Ct32, 8, 8, 0, 1), 0);

    gs.flush().unwrap();
    assert_eq!(gs.pending_commands(), 0);
    for (i, &expected) in pixels.iter().enumerate() {
        let (x, y) = (8 + i as u32 % 8, 8 + i as u32 / 8);
        assert_eq!(gs.memory().read_pixel(Psm::Ct32, x, y, 0, 1), expected, "({x}, {y})");
    }
    assert!(gs.transfer().is_none());
}

#[test]
fn test_partial_pixels_held_between_chunks() {
    let mut gs = ctx();
    let bytes: Vec<u8> = (1..=12).collect();
    start_upload(&mut gs, 0, 1, 0x01, 0, 0, 4, 1);

    gs.write_image(&bytes[..5]).unwrap();
    assert_eq!(gs.transfer().map(|t| t.cursor.x), Some(1));
    assert_eq!(gs.pending.len(), 2);

    gs.write_image(&bytes[5..10]).unwrap();
    assert_eq!(gs.transfer().map(|t| t.cursor.x), Some(3));
    assert_eq!(gs.pending.len(), 1);

    gs.write_image(&bytes[10..]).unwrap();
    assert!(gs.transfer().is_none());

    let row: Vec<u32> = (0..4).map(|x| gs.memory().read_pixel(Psm::Ct24, x, 0, 0, 1)).collect();
    assert_eq!(row, vec![0x03_0201, 0x06_0504, 0x09_0807, 0x0C_0B0A]);
}

#[test]
fn test_transfer_errors() {
    let mut gs = ctx();
    assert!(matches!(gs.write_image(&[0; 4]), Err(GsError::NoActiveTransfer)));
    assert!(matches!(gs.read_image(&mut [0; 4]), Err(GsError::NoActiveTransfer)));

    gs.submit(GsCommand::BitBltBuf(BitBltBuf {
        sbw: 1,
        ..Default::default()
    }));
    gs.submit(GsCommand::TrxReg(TrxReg { rrw: 8, rrh: 8 }));
    gs.submit(GsCommand::TrxDir(TrxDir { xdir: 1 }));
    assert!(matches!(
        gs.write_image(&[0; 4]),
        Err(GsError::TransferDirection {
            requested: TransferDirection::HostToLocal,
            active: TransferDirection::LocalToHost,
        })
    ));

    // Deactivating ends the transfer
    gs.submit(GsCommand::TrxDir(TrxDir { xdir: 3 }));
    gs.flush().unwrap();
    assert!(gs.transfer().is_none());
}

#[test]
fn test_failing_command_does_not_stop_queue() {
    let mut gs = ctx();
    gs.submit(GsCommand::BitBltBuf(BitBltBuf {
        dbw: 1,
        dpsm: 0x3F,
        ..Default::default()
    }));
    gs.submit(GsCommand::TrxReg(TrxReg { rrw: 8, rrh: 8 }));
    gs.submit(GsCommand::TrxDir(TrxDir { xdir: 0 }));
    gs.submit(GsCommand::Texa(Texa {
        ta0: 0x11,
        ..Default::default()
    }));

    assert!(matches!(gs.flush(), Err(GsError::UnsupportedPsm(0x3F))));
    assert_eq!(gs.registers().texa.ta0, 0x11);
    assert!(gs.transfer().is_none());
    assert_eq!(gs.pending_commands(), 0);
}

#[test]
fn test_read_image_in_chunks() {
    let mut gs = ctx();
    for y in 0..8 {
        for x in 0..16 {
            gs.write_pixel(Psm::Ct16, x, y, 32, 1, 0x8000 | (x * 16 + y)).unwrap();
        }
    }
    gs.submit(GsCommand::BitBltBuf(BitBltBuf {
        sbp: 32,
        sbw: 1,
        spsm: 0x02,
        ..Default::default()
    }));
    gs.submit(GsCommand::TrxPos(TrxPos {
        ssax: 2,
        ssay: 1,
        ..Default::default()
    }));
    gs.submit(GsCommand::TrxReg(TrxReg { rrw: 6, rrh: 3 }));
    gs.submit(GsCommand::TrxDir(TrxDir { xdir: 1 }));

    let mut out = Vec::new();
    let mut chunk = [0u8; 7];
    gs.flush().unwrap();
    while gs.transfer().is_some() {
        let n = gs.read_image(&mut chunk).unwrap();
        assert!(n > 0);
        out.extend_from_slice(&chunk[..n]);
    }

    assert_eq!(out.len(), 6 * 3 * 2);
    for (i, px) in out.chunks_exact(2).enumerate() {
        let (x, y) = (2 + i as u32 % 6, 1 + i as u32 / 6);
        assert_eq!(u16::from_le_bytes([px[0], px[1]]) as u32, 0x8000 | (x * 16 + y));
    }
}

#[test]
fn test_local_to_local_move_invalidates_destination() {
    let mut gs = ctx();
    gs.submit(GsCommand::Tex0(ct32_tex0(64, 5)));
    assert_eq!(texel(&mut gs, 16, 16), Some(0));

    for y in 0..8 {
        for x in 0..8 {
            gs.write_pixel(Psm::Ct32, x, y, 0, 1, 0xAB00_0000 | (y << 8) | x).unwrap();
        }
    }
    gs.submit(GsCommand::BitBltBuf(BitBltBuf {
        sbp: 0,
        sbw: 1,
        spsm: 0x00,
        dbp: 64,
        dbw: 1,
        dpsm: 0x00,
    }));
    gs.submit(GsCommand::TrxPos(TrxPos {
        dsax: 16,
        dsay: 16,
        ..Default::default()
    }));
    gs.submit(GsCommand::TrxReg(TrxReg { rrw: 8, rrh: 8 }));
    gs.submit(GsCommand::TrxDir(TrxDir { xdir: 2 }));

    assert_eq!(texel(&mut gs, 16, 16), Some(0xAB00_0000));
    assert_eq!(texel(&mut gs, 23, 21), Some(0xAB00_0507));
    assert!(gs.transfer().is_none());
}

#[test]
fn test_upload_redecodes_only_written_rows() {
    let mut gs = ctx();
    gs.submit(GsCommand::Tex0(ct32_tex0(0, 6)));
    assert_eq!(texel(&mut gs, 9, 9), Some(0));
    assert_eq!(gs.cache().stats().texels_decoded, 64 * 64);

    upload(&mut gs, 0, 1, 0x00, 8, 8, 8, 8, &ct32_bytes(&[0x1234_5678; 64]));
    assert_eq!(texel(&mut gs, 9, 9), Some(0x1234_5678));

    let stats = gs.cache().stats();
    assert_eq!(stats.partial_redecodes, 1);
    assert_eq!(stats.texels_decoded, 64 * 64 + 64);
}

#[test]
fn test_fetch_sees_queued_raw_write() {
    let mut gs = ctx();
    gs.submit(GsCommand::Tex0(ct32_tex0(0, 5)));
    assert_eq!(texel(&mut gs, 0, 0), Some(0));

    gs.submit(GsCommand::RawWrite {
        offset: 0,
        data: vec![1, 2, 3, 4],
    });
    assert_eq!(texel(&mut gs, 0, 0), Some(0x0403_0201));

    gs.write_raw(0, &[5, 6, 7, 8]).unwrap();
    assert_eq!(texel(&mut gs, 0, 0), Some(0x0807_0605));
}

#[test]
fn test_clut_reloads_after_palette_upload() {
    let mut gs = ctx();
    upload(&mut gs, 0x200, 1, 0x00, 0, 0, 2, 1, &ct32_bytes(&[0xFF00_0011, 0xFF00_0022]));
    for y in 0..16 {
        for x in 0..16 {
            gs.write_pixel(Psm::T8, x, y, 64, 2, 1).unwrap();
        }
    }
    let tex0 = Tex0 {
        tbp0: 64,
        tbw: 2,
        psm: 0x13,
        tw: 4,
        th: 4,
        cbp: 0x200,
        cld: 1,
        ..Default::default()
    };
    gs.submit(GsCommand::Tex0(tex0));
    assert_eq!(texel(&mut gs, 3, 3), Some(0xFF00_0022));
    let loads = gs.clut().load_count();

    // Same TEX0 again: the palette memory changed, so the load copies
    upload(&mut gs, 0x200, 1, 0x00, 1, 0, 1, 1, &ct32_bytes(&[0xFF00_0033]));
    gs.submit(GsCommand::Tex0(tex0));
    assert_eq!(texel(&mut gs, 3, 3), Some(0xFF00_0033));
    assert_eq!(gs.clut().load_count(), loads + 1);
    assert_eq!(gs.cache().len(), 2);

    // CLD 0 keeps the loaded palette
    upload(&mut gs, 0x200, 1, 0x00, 1, 0, 1, 1, &ct32_bytes(&[0xFF00_0044]));
    gs.submit(GsCommand::Tex0(Tex0 { cld: 0, ..tex0 }));
    assert_eq!(texel(&mut gs, 3, 3), Some(0xFF00_0033));
}

#[test]
fn test_save_state_resumes_transfer() {
    let pixels: Vec<u32> = (0..256u32).map(|i| i * 0x0101_0101).collect();
    let bytes = ct32_bytes(&pixels);

    let mut a = ctx();
    start_upload(&mut a, 0, 1, 0x00, 0, 0, 16, 16);
    a.write_image(&bytes[..401]).unwrap();
    let state = a.save_state().unwrap();
    assert_eq!(state.pending.len(), 1);

    let mut b = ctx();
    b.submit(GsCommand::Tex0(ct32_tex0(0, 4)));
    b.fetch_texture(Clamp::default()).unwrap();
    assert_eq!(b.cache().len(), 1);

    let restored = SaveState::from_bytes(&state.to_bytes().unwrap()).unwrap();
    b.load_state(&restored).unwrap();
    assert!(b.cache().is_empty());
    assert_eq!(b.transfer(), a.transfer());

    a.write_image(&bytes[401..]).unwrap();
    b.write_image(&bytes[401..]).unwrap();
    assert!(a.transfer().is_none());
    assert!(b.transfer().is_none());
    assert_eq!(a.memory().raw().bytes(), b.memory().raw().bytes());
    for (i, &expected) in pixels.iter().enumerate() {
        let (x, y) = (i as u32 % 16, i as u32 / 16);
        assert_eq!(b.memory().read_pixel(Psm::Ct32, x, y, 0, 1), expected);
    }
}

#[test]
fn test_render_target_alias_through_context() {
    let mut gs = ctx();
    let handle = gs.register_render_target(TargetDesc {
        bp: 0,
        bw: 1,
        psm: Psm::Ct32,
        width: 64,
        height: 64,
    });
    upload(&mut gs, 0, 1, 0x00, 0, 0, 8, 8, &ct32_bytes(&[0xFF00_00FF; 64]));
    gs.submit(GsCommand::Tex0(ct32_tex0(0, 6)));

    let tex = gs.fetch_texture(Clamp::default()).unwrap();
    assert!(tex.is_render_target());
    assert_eq!(tex.surface(), Some(handle));
    assert_eq!(gs.backend().surface(handle).map(|s| s.get(3, 3)), Some(0xFF00_00FF));

    gs.target_drawn(handle).unwrap();
    assert!(gs.cache().is_empty());

    gs.drop_render_target(handle).unwrap();
    assert!(gs.backend().surface(handle).is_none());
    assert!(matches!(gs.target_drawn(handle), Err(GsError::UnknownSurface(_))));
}

#[test]
fn test_end_frame_ages_out_textures() {
    let mut config = GsConfig::default();
    config.cache.max_age = 1;
    let mut gs = GsContext::new(&config);
    gs.submit(GsCommand::Tex0(ct32_tex0(0, 4)));
    gs.fetch_texture(Clamp::default()).unwrap();

    gs.end_frame().unwrap();
    assert_eq!(gs.cache().len(), 1);
    gs.end_frame().unwrap();
    assert!(gs.cache().is_empty());
}

#[test]
fn test_reset() {
    let mut gs = ctx();
    gs.write_raw(100, &[0xFF; 16]).unwrap();
    start_upload(&mut gs, 0, 1, 0x00, 0, 0, 8, 8);
    gs.flush().unwrap();
    assert!(gs.transfer().is_some());

    gs.reset();
    assert!(gs.memory().raw().bytes().iter().all(|&b| b == 0));
    assert!(gs.transfer().is_none());
    assert_eq!(*gs.registers(), GsRegisters::default());
}

#[test]
fn test_write_pixel_refreshes_cached_texture() {
    let mut gs = ctx();
    gs.submit(GsCommand::Tex0(ct32_tex0(0, 4)));
    assert_eq!(texel(&mut gs, 3, 5), Some(0));

    gs.write_pixel(Psm::Ct32, 3, 5, 0, 1, 0xAABB_CCDD).unwrap();
    assert_eq!(gs.memory().read_pixel(Psm::Ct32, 3, 5, 0, 1), 0xAABB_CCDD);
    assert_eq!(texel(&mut gs, 3, 5), Some(0xAABB_CCDD));
    assert_eq!(gs.cache().stats().misses, 1);
}
