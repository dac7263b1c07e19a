//! Demo binary that builds a texture atlas and paints a small voxel terrain.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p nebula-demo` to pack a set of generated tiles.
//! Run with `cargo run -p nebula-demo -- --texture-path assets/ grass dirt stone`
//! to pack tiles from disk, or `--blocks blocks.ron` to read a block list.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use glam::Vec3;
use image::{Rgba, RgbaImage};
use nebula_config::{CliArgs, Config};
use nebula_texture::{
    FsImageSource, ImageSource, MaterialSpec, MemoryImageSource, MeshSurface, PaintOutcome, QuadMesh,
    SharedMesh, Texture, TextureEvent, resolve_path,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info, warn};

/// How long to wait for all batches before giving up.
const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Side length of the generated terrain in voxels.
const TERRAIN_SIZE: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "nebula-demo", about = "Pack tiles into an atlas and paint a voxel mesh")]
struct DemoArgs {
    #[command(flatten)]
    cli: CliArgs,

    /// RON file holding a list of material specs, e.g. `[Name("grass"), List(["a", "b", "c"])]`.
    #[arg(long)]
    blocks: Option<PathBuf>,

    /// Sprite sheet to slice into 16x16 tiles.
    #[arg(long)]
    sprite: Option<String>,

    /// Where to write the atlas PNG. Defaults to `atlas.png` in the config
    /// directory when `debug.dump_atlas` is set.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Tile names to load; generated tiles are used when empty.
    tiles: Vec<String>,
}

/// Generated tiles: name and base color.
const GENERATED_TILES: [(&str, [u8; 3]); 5] = [
    ("grass", [76, 153, 0]),
    ("dirt", [121, 85, 58]),
    ("grass_dirt", [98, 120, 30]),
    ("stone", [125, 125, 125]),
    ("sand", [219, 209, 160]),
];

fn main() {
    let args = DemoArgs::parse();

    // Resolve config directory
    let config_dir = args.cli.config.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nebula-atlas")
    });

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args.cli);

    let log_dir = config_dir.join("logs");
    nebula_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let specs = match material_specs(&args) {
        Ok(specs) => specs,
        Err(e) => {
            error!("Failed to read block list: {e}");
            return;
        }
    };

    let source: Arc<dyn ImageSource> = if args.tiles.is_empty() && args.blocks.is_none() {
        info!("No tiles given, generating {} tiles", GENERATED_TILES.len());
        Arc::new(generated_source(&config.texture.texture_path, config.texture.noise_seed))
    } else {
        Arc::new(FsImageSource)
    };

    let mut texture = match Texture::new(config.texture.clone(), source) {
        Ok(texture) => texture,
        Err(e) => {
            error!("Failed to create texture atlas: {e}");
            return;
        }
    };

    let registry_len = specs.len();
    if let Err(e) = texture.load(specs) {
        error!("Failed to load materials: {e}");
        return;
    }
    if let Some(sheet) = &args.sprite {
        if let Err(e) = texture.sprite(sheet, None, None) {
            warn!("Skipping sprite sheet {sheet}: {e}");
        }
    }

    let terrain = demonstrate_deferred_paint(&mut texture, registry_len);
    demonstrate_color_blending(&mut texture);
    demonstrate_animation(&mut texture);
    report_atlas(&texture, &terrain);

    let out = args
        .out
        .clone()
        .or_else(|| config.debug.dump_atlas.then(|| config_dir.join("atlas.png")));
    if let Some(out) = out {
        if let Err(e) = texture.save_atlas(&out) {
            error!("Failed to save atlas to {}: {e}", out.display());
        }
    }
}

/// Materials from `--blocks`, the positional tiles, or the generated set.
fn material_specs(args: &DemoArgs) -> Result<Vec<MaterialSpec>, String> {
    if let Some(path) = &args.blocks {
        let contents = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
        return ron::from_str(&contents).map_err(|e| format!("{}: {e}", path.display()));
    }
    if !args.tiles.is_empty() {
        return Ok(args.tiles.iter().map(|t| MaterialSpec::from(t.as_str())).collect());
    }
    Ok(vec![
        MaterialSpec::from("stone"),
        MaterialSpec::from(["grass", "dirt", "grass_dirt"]),
        MaterialSpec::from("sand"),
        MaterialSpec::from("#3a7d2c/#6b4a2f"),
    ])
}

/// Noisy 16x16 tiles around each base color, registered under their
/// resolved paths.
fn generated_source(texture_path: &str, seed: Option<u32>) -> MemoryImageSource {
    let mut rng = StdRng::seed_from_u64(seed.map_or(0x5eed, u64::from));
    let source = MemoryImageSource::new();
    for (name, [r, g, b]) in GENERATED_TILES {
        let tile = RgbaImage::from_fn(16, 16, |_, _| {
            let jitter: i16 = rng.random_range(-12..=12);
            let c = |v: u8| (v as i16 + jitter).clamp(0, 255) as u8;
            Rgba([c(r), c(g), c(b), 255])
        });
        source.insert(resolve_path(texture_path, name), tile);
    }
    source
}

/// Builds a heightmap of voxels whose faces encode a registry index.
fn build_terrain(materials: usize) -> QuadMesh {
    let mut mesh = QuadMesh::new(Vec3::ZERO);
    if materials == 0 {
        return mesh;
    }
    for x in 0..TERRAIN_SIZE {
        for z in 0..TERRAIN_SIZE {
            let height = 1 + (x + z) % 3;
            for y in 0..height {
                // Top layer uses the second material when there is one.
                let index = if y + 1 == height { 2.min(materials) } else { 1 };
                mesh.push_voxel(Vec3::new(x as f32, y as f32, z as f32), index);
            }
        }
    }
    mesh
}

/// Paints a voxel mesh while the atlas is still loading.
fn demonstrate_deferred_paint(texture: &mut Texture, materials: usize) -> SharedMesh {
    let terrain: SharedMesh = build_terrain(materials).into_shared();
    match texture.paint(&terrain, None) {
        Ok(PaintOutcome::Deferred) => info!(
            "Terrain paint deferred ({} queued, {} batches loading)",
            texture.queued_paints(),
            texture.loading()
        ),
        Ok(PaintOutcome::Painted(stats)) => info!("Terrain painted immediately: {stats:?}"),
        Err(e) => warn!("Terrain paint failed: {e}"),
    }

    for event in texture.wait_idle(LOAD_TIMEOUT) {
        match event {
            TextureEvent::BatchReady { ticket, materials } => {
                info!("Batch {} ready with {} materials", ticket.0, materials.len());
            }
            TextureEvent::ImageFailed { path, error, .. } => warn!("Image {path} failed: {error}"),
            TextureEvent::PaintFailed { error } => warn!("Deferred paint failed: {error}"),
        }
    }
    if texture.is_loading() {
        warn!("Atlas still loading after {LOAD_TIMEOUT:?}");
    }
    terrain
}

/// Paints a block with a two-color noise blend at increasing heights.
fn demonstrate_color_blending(texture: &mut Texture) {
    for y in [0.0, 10.0, 20.0] {
        let mut block = QuadMesh::new(Vec3::new(0.0, y, 0.0));
        block.push_voxel(Vec3::ZERO, 1);
        let block = block.into_shared();
        let shared: SharedMesh = block.clone();
        if let Err(e) = texture.paint(&shared, Some(MaterialSpec::from("#3a7d2c/#6b4a2f"))) {
            warn!("Color blend failed: {e}");
            continue;
        }
        let top = block.borrow().faces.iter().find(|f| f.normal == Vec3::Y).map(|f| f.color);
        info!("Blend at y={y}: top face color {top:?}");
    }

    match texture.light_dark("#3a7d2c") {
        Ok((light, dark)) => info!("Light/dark pair: {light} / {dark}"),
        Err(e) => warn!("{e}"),
    }
}

/// Cycles a block through two tiles with the frame scheduler.
fn demonstrate_animation(texture: &mut Texture) {
    let names: Vec<String> = texture
        .uv_index()
        .iter()
        .map(|(name, _)| name.to_string())
        .take(2)
        .collect();
    let block: SharedMesh = QuadMesh::voxel(1).into_shared();
    let Some(handle) = texture.animate(&block, names, Some(250.0)) else {
        info!("Fewer than two tiles packed, skipping animation");
        return;
    };

    let frames: usize = (0..10).map(|_| texture.tick(100.0)).sum();
    info!("Animation painted {frames} frames in 1s of ticks");
    texture.cancel_animation(handle.id);
}

fn report_atlas(texture: &Texture, terrain: &SharedMesh) {
    let canvas = texture.canvas();
    info!(
        "Atlas {}x{} with {} tiles, {} materials, texture version {}",
        canvas.width(),
        canvas.height(),
        texture.uv_index().len(),
        texture.materials().len(),
        texture.texture_handle().version
    );

    let mut tiles: Vec<_> = texture.uv_index().iter().collect();
    tiles.sort_by(|a, b| a.0.cmp(b.0));
    for (name, rect) in tiles {
        let [a, _, c, _] = rect.0;
        info!("  {name:<16} ({:.3}, {:.3}) - ({:.3}, {:.3})", a.x, a.y, c.x, c.y);
    }

    for name in ["stone", "grass", "lava"] {
        info!("find({name}) = {}", texture.find(name));
    }
    info!("Terrain has {} faces", terrain.borrow().face_count());
    info!("Material: {:?}", texture.material().kind);
}
