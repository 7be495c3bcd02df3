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

//! Transfer and texture decode throughput

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use gsvram::core::local_memory::{LocalMemory, TexelLookup};
use gsvram::core::psm::Psm;
use gsvram::core::rect::Rect;
use gsvram::core::registers::Texa;
use gsvram::core::swizzle::{BufferDesc, KernelStrategy, TexelConversion, TransferCursor, TransferRegion};

const SIZE: u32 = 256;

fn region(psm: Psm) -> TransferRegion {
    TransferRegion {
        bp: 0,
        bw: SIZE / 64,
        psm,
        x: 0,
        y: 0,
        width: SIZE,
        height: SIZE,
    }
}

fn noise(len: usize) -> Vec<u8> {
    let mut state = 0x2545_F491u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

fn bench_swizzle_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("swizzle_in");
    for psm in [Psm::Ct32, Psm::Ct16, Psm::T8, Psm::T4] {
        let region = region(psm);
        let data = noise(region.byte_len());
        group.throughput(Throughput::Bytes(data.len() as u64));

        for strategy in [KernelStrategy::Scalar, KernelStrategy::Wide] {
            let mut mem = LocalMemory::default();
            mem.set_strategy(strategy);
            group.bench_with_input(BenchmarkId::new(psm.to_string(), strategy), &data, |b, data| {
                b.iter(|| mem.swizzle_in(&region, TransferCursor::start(&region), black_box(data)))
            });
        }
    }
    group.finish();
}

fn bench_unswizzle_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("unswizzle_out");
    for psm in [Psm::Ct32, Psm::T8] {
        let region = region(psm);
        let mut mem = LocalMemory::default();
        mem.swizzle_in(&region, TransferCursor::start(&region), &noise(region.byte_len()));
        let pitch = region.byte_len() / SIZE as usize;
        let mut out = vec![0u8; region.byte_len()];
        group.throughput(Throughput::Bytes(out.len() as u64));

        group.bench_function(BenchmarkId::new(psm.to_string(), "serial"), |b| {
            b.iter(|| mem.unswizzle_out(&region, black_box(&mut out), pitch))
        });
        mem.set_parallel_decode(true, 4);
        group.bench_function(BenchmarkId::new(psm.to_string(), "parallel"), |b| {
            b.iter(|| mem.unswizzle_out(&region, black_box(&mut out), pitch))
        });
    }
    group.finish();
}

fn bench_decode_texture(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_texture");
    let region = region(Psm::T8);
    let mut mem = LocalMemory::default();
    mem.swizzle_in(&region, TransferCursor::start(&region), &noise(region.byte_len()));

    let clut: [u32; 256] = std::array::from_fn(|i| 0x8000_0000 | (i as u32 * 0x0001_0101));
    let conversion = TexelConversion::Rgba(TexelLookup {
        clut: &clut,
        texa: Texa::default(),
    });
    let buf = BufferDesc::new(Psm::T8, 0, SIZE / 64);
    let rect = Rect::new(0, 0, SIZE, SIZE);
    let mut out = vec![0u32; (SIZE * SIZE) as usize];
    group.throughput(Throughput::Elements(rect.area()));

    for (name, parallel) in [("serial", false), ("parallel", true)] {
        mem.set_parallel_decode(parallel, 4);
        group.bench_function(name, |b| {
            b.iter(|| mem.decode_texture(buf, rect, &conversion, black_box(&mut out), SIZE as usize))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_swizzle_in, bench_unswizzle_out, bench_decode_texture);
criterion_main!(benches);
