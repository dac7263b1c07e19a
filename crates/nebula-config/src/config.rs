//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Texture atlas settings.
    pub texture: TextureConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Material family used for the atlas-backed material.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MaterialType {
    /// Diffuse-only shading.
    #[default]
    Lambert,
    /// Diffuse + specular shading.
    Phong,
}

/// Sampling filter applied to the atlas texture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapLinear,
}

/// How a face picks one of the six material slots.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum FaceSelection {
    /// Pick the slot matching the face normal (back, front, top, bottom, left, right).
    #[default]
    ByNormal,
    /// Always use the `back` slot, whatever the face direction.
    BackOnly,
}

/// Parameters forwarded to the renderer when the material is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaterialParams {
    /// Ambient color as `0xRRGGBB`.
    pub ambient: u32,
    /// Optional diffuse tint as `0xRRGGBB`.
    pub color: Option<u32>,
    /// Material opacity (0.0 - 1.0).
    pub opacity: f32,
}

/// Texture atlas configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextureConfig {
    /// Prefix prepended to every tile name when resolving its image path.
    pub texture_path: String,
    /// Cross-origin mode forwarded to image sources that fetch remotely.
    pub cross_origin: String,
    /// Initial canvas width in pixels. Need not be a power of two.
    pub atlas_width: u32,
    /// Initial canvas height in pixels. Need not be a power of two.
    pub atlas_height: u32,
    /// Skip the textured material and paint per-vertex colors only.
    pub material_flat_color: bool,
    /// Material family for the atlas material.
    pub material_type: MaterialType,
    /// Material parameters.
    pub material_params: MaterialParams,
    /// Magnification filter for the atlas texture.
    pub mag_filter: TextureFilter,
    /// Minification filter for the atlas texture.
    pub min_filter: TextureFilter,
    /// Debounce between the last pack of a batch and the UV rebuild.
    pub settle_delay_ms: u64,
    /// Seed for the color/height noise fields. Random when unset.
    pub noise_seed: Option<u32>,
    /// Slot selection policy for painted faces.
    pub face_selection: FaceSelection,
    /// Worker threads used to fetch and decode images.
    pub loader_threads: usize,
    /// Capacity of the light/dark color pair cache.
    pub light_dark_cache_capacity: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write the final atlas canvas to `atlas.png` in the config directory
    /// when the demo exits.
    pub dump_atlas: bool,
}

// --- Default implementations ---

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            ambient: 0xbbbbbb,
            color: None,
            opacity: 1.0,
        }
    }
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            texture_path: "textures/".to_string(),
            cross_origin: "Anonymous".to_string(),
            atlas_width: 512,
            atlas_height: 512,
            material_flat_color: false,
            material_type: MaterialType::Lambert,
            material_params: MaterialParams::default(),
            mag_filter: TextureFilter::Nearest,
            min_filter: TextureFilter::LinearMipmapLinear,
            settle_delay_ms: 100,
            noise_seed: None,
            face_selection: FaceSelection::ByNormal,
            loader_threads: 2,
            light_dark_cache_capacity: 256,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            dump_atlas: false,
        }
    }
}

impl TextureConfig {
    /// Checks that sizes and capacities are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.atlas_width == 0 || self.atlas_height == 0 {
            return Err(ConfigError::Invalid {
                field: "texture.atlas_width/atlas_height",
                reason: format!(
                    "atlas must be at least 1x1, got {}x{}",
                    self.atlas_width, self.atlas_height
                ),
            });
        }
        if self.loader_threads == 0 {
            return Err(ConfigError::Invalid {
                field: "texture.loader_threads",
                reason: "at least one loader thread is required".to_string(),
            });
        }
        if self.light_dark_cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "texture.light_dark_cache_capacity",
                reason: "cache capacity must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

/// File name of the persisted config inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// Reads `config.ron` from `config_dir`, writing the defaults first when
    /// the file does not exist yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Wrote default atlas config to {}", path.display());
            return Ok(config);
        }
        let config = read_config(&path)?;
        log::info!("Loaded atlas config from {}", path.display());
        Ok(config)
    }

    /// Writes the config to `config_dir/config.ron`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(config_dir).map_err(write_err)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;
        std::fs::write(&path, serialized).map_err(write_err)
    }

    /// Re-reads the file; `Some` only when it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = read_config(&config_dir.join(CONFIG_FILE_NAME))?;
        if fresh == *self {
            return Ok(None);
        }
        log::info!("Atlas config changed on disk");
        Ok(Some(fresh))
    }
}
