//! Renderer-facing descriptors for the atlas texture and its material.
//!
//! These carry no GPU resources; a renderer reads them and uploads when a
//! `needs_update` flag is set.

use nebula_config::{MaterialParams, MaterialType, TextureConfig, TextureFilter};

/// Sampling state of the atlas texture.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureHandle {
    pub mag_filter: TextureFilter,
    pub min_filter: TextureFilter,
    /// Set whenever the canvas changed and must be re-uploaded.
    pub needs_update: bool,
    /// Incremented on every atlas rebuild.
    pub version: u64,
}

impl TextureHandle {
    /// Texture with the filters from `config`.
    pub fn from_config(config: &TextureConfig) -> Self {
        Self {
            mag_filter: config.mag_filter,
            min_filter: config.min_filter,
            needs_update: false,
            version: 0,
        }
    }

    /// Flags the canvas for upload and bumps the version.
    pub fn touch(&mut self) {
        self.needs_update = true;
        self.version += 1;
    }
}

/// How the material colors fragments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialKind {
    /// Samples the atlas with the configured shading model.
    Textured(MaterialType),
    /// Phong shading from per-vertex colors only.
    FlatColor,
}

/// Material bound to the atlas texture.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialHandle {
    pub kind: MaterialKind,
    pub params: MaterialParams,
    /// Whether the atlas is bound as the color map.
    pub uses_atlas: bool,
    pub transparent: bool,
    pub vertex_colors: bool,
    pub needs_update: bool,
}

impl MaterialHandle {
    /// A transparent material sampling the atlas.
    pub fn textured(material_type: MaterialType, params: MaterialParams) -> Self {
        Self {
            kind: MaterialKind::Textured(material_type),
            params,
            uses_atlas: true,
            transparent: true,
            vertex_colors: false,
            needs_update: false,
        }
    }

    /// A vertex-colored material with no texture map.
    pub fn flat_color() -> Self {
        Self {
            kind: MaterialKind::FlatColor,
            params: MaterialParams::default(),
            uses_atlas: false,
            transparent: false,
            vertex_colors: true,
            needs_update: false,
        }
    }

    /// The material described by `config`.
    pub fn from_config(config: &TextureConfig) -> Self {
        if config.material_flat_color {
            Self::flat_color()
        } else {
            Self::textured(config.material_type, config.material_params.clone())
        }
    }
}
