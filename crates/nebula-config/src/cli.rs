//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Shared command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "nebula-atlas", about = "Nebula voxel texture atlas")]
pub struct CliArgs {
    /// Directory (or URL prefix) tile images are loaded from.
    #[arg(long)]
    pub texture_path: Option<String>,

    /// Initial atlas width.
    #[arg(long)]
    pub atlas_width: Option<u32>,

    /// Initial atlas height.
    #[arg(long)]
    pub atlas_height: Option<u32>,

    /// Paint vertex colors only, without the atlas material.
    #[arg(long)]
    pub flat_color: Option<bool>,

    /// Seed for the color blending noise.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref path) = args.texture_path {
            self.texture.texture_path = path.clone();
        }
        if let Some(w) = args.atlas_width {
            self.texture.atlas_width = w;
        }
        if let Some(h) = args.atlas_height {
            self.texture.atlas_height = h;
        }
        if let Some(flat) = args.flat_color {
            self.texture.material_flat_color = flat;
        }
        if let Some(seed) = args.seed {
            self.texture.noise_seed = Some(seed);
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
