//! Error types for atlas loading and painting.

use thiserror::Error;

/// Errors returned by [`crate::Texture`] operations.
#[derive(Debug, Error)]
pub enum TextureError {
    /// A material list had a length that has no face layout.
    #[error("material spec has {len} names; expected 1, 2, 3, 4 or 6")]
    InvalidSpecLength {
        /// Number of names supplied.
        len: usize,
    },

    /// A `#` color reference could not be parsed.
    #[error("invalid color reference `{0}`")]
    InvalidColor(String),

    /// Sprite tiles must be at least one pixel in each direction.
    #[error("invalid sprite tile size {width}x{height}")]
    InvalidTileSize {
        width: u32,
        height: u32,
    },

    /// A face index past the end of the mesh.
    #[error("face {face} out of range for a mesh with {count} faces")]
    FaceOutOfRange { face: usize, count: usize },

    /// The mesh is already borrowed elsewhere (e.g. by the caller during a flush).
    #[error("mesh is already borrowed")]
    MeshBorrowed,

    /// The texture configuration is unusable.
    #[error("invalid texture config: {0}")]
    Config(#[from] nebula_config::ConfigError),

    /// The image loader threads are gone.
    #[error("image loader is shut down")]
    LoaderClosed,

    /// Writing the atlas canvas failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors reported by an [`crate::ImageSource`].
#[derive(Debug, Error)]
pub enum ImageSourceError {
    /// The image could not be opened or decoded.
    #[error("couldn't load URL [{path}]: {source}")]
    Decode {
        /// Resolved image path.
        path: String,
        /// Underlying decoder error.
        #[source]
        source: image::ImageError,
    },

    /// No image is registered under the requested path.
    #[error("couldn't load URL [{0}]: not found")]
    NotFound(String),

    /// The source panicked while fetching.
    #[error("couldn't load URL [{path}]: source panicked: {message}")]
    Panicked { path: String, message: String },
}
