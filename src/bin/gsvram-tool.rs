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

//! gsvram command line tool
//!
//! Inspects GS local memory images: decodes textures out of raw 4MB memory
//! dumps or save states, summarises save states, and writes a default
//! configuration file.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use gsvram::core::config::{GsConfig, PaletteOutput};
use gsvram::core::gs::{GsCommand, GsContext};
use gsvram::core::memory::savestate::SaveState;
use gsvram::core::memory::MEMORY_SIZE;
use gsvram::core::registers::{Clamp, Tex0};

#[derive(Parser)]
#[command(name = "gsvram-tool")]
#[command(version, about = "GS local memory inspection tool", long_about = None)]
struct Cli {
    /// Configuration file (defaults plus GSVRAM_* overrides if omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a texture to a PAM (RGBA) image
    Decode {
        /// Raw 4MB memory dump or save state
        input: PathBuf,

        /// Output .pam file
        #[arg(short, long)]
        out: PathBuf,

        /// Texture base pointer (blocks)
        #[arg(long, default_value = "0", value_parser = parse_u32)]
        tbp: u32,

        /// Texture buffer width (64 pixel units)
        #[arg(long, default_value = "1", value_parser = parse_u32)]
        tbw: u32,

        /// Pixel storage mode code, e.g. 0x13 for T8
        #[arg(long, default_value = "0", value_parser = parse_u32)]
        psm: u32,

        /// Width as a power of two
        #[arg(long, default_value = "8", value_parser = parse_u32)]
        tw: u32,

        /// Height as a power of two
        #[arg(long, default_value = "8", value_parser = parse_u32)]
        th: u32,

        /// Palette base pointer (blocks)
        #[arg(long, default_value = "0", value_parser = parse_u32)]
        cbp: u32,

        /// Palette storage mode code
        #[arg(long, default_value = "0", value_parser = parse_u32)]
        cpsm: u32,

        /// Palette storage mode (0: CSM1, 1: CSM2)
        #[arg(long, default_value = "0", value_parser = parse_u32)]
        csm: u32,

        /// Palette entry offset (16 entry units)
        #[arg(long, default_value = "0", value_parser = parse_u32)]
        csa: u32,
    },

    /// Describe a save state
    StateInfo {
        state: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write the default configuration as TOML
    DefaultConfig {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Decimal or `0x` prefixed hexadecimal
fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GsConfig::load(path)?,
        None => GsConfig::from_env(),
    };

    match cli.command {
        Commands::Decode {
            input,
            out,
            tbp,
            tbw,
            psm,
            tw,
            th,
            cbp,
            cpsm,
            csm,
            csa,
        } => {
            let tex0 = Tex0 {
                tbp0: tbp,
                tbw,
                psm,
                tw,
                th,
                cbp,
                cpsm,
                csm,
                csa,
                cld: 1,
                ..Default::default()
            };
            decode(&config, &input, &out, tex0)?;
        }
        Commands::StateInfo { state, json } => {
            let summary = SaveState::load(&state)?.summary();
            if json {
                println!("{}", summary.to_json()?);
            } else {
                println!("{}", summary);
            }
        }
        Commands::DefaultConfig { out } => {
            let toml = GsConfig::default().to_toml()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, toml)?;
                    log::info!("Default configuration written to {}", path.display());
                }
                None => print!("{}", toml),
            }
        }
    }

    Ok(())
}

fn decode(config: &GsConfig, input: &Path, out: &Path, tex0: Tex0) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config.clone();
    config.cache.palette_output = PaletteOutput::Expanded;
    let mut gs = GsContext::new(&config);

    let bytes = std::fs::read(input)?;
    if bytes.len() == MEMORY_SIZE {
        log::info!("Loading raw memory dump {}", input.display());
        gs.write_raw(0, &bytes)?;
    } else {
        log::info!("Loading save state {}", input.display());
        gs.load_state(&SaveState::from_bytes(&bytes)?)?;
    }

    gs.submit(GsCommand::Tex0(tex0));
    let texture = gs.fetch_texture(Clamp::default())?;
    let (width, height) = (texture.width(), texture.height());
    let pixels = texture
        .pixels()
        .ok_or("texture is held by the render backend, not as a bitmap")?;

    let mut file = std::io::BufWriter::new(std::fs::File::create(out)?);
    write!(
        file,
        "P7\nWIDTH {}\nHEIGHT {}\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n",
        width, height
    )?;
    for &texel in pixels {
        let [r, g, b, a] = texel.to_le_bytes();
        // GS alpha 0x80 is fully opaque
        let a = (a as u32 * 255 / 0x80).min(255) as u8;
        file.write_all(&[r, g, b, a])?;
    }
    file.flush()?;

    log::info!("Wrote {}x{} texture to {}", width, height, out.display());
    Ok(())
}
