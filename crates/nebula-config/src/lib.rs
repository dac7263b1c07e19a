//! Configuration for the Nebula voxel texture atlas.
//!
//! Settings persist to disk as RON files and can be overridden from the
//! command line via clap. Every section uses `#[serde(default)]`, so partial
//! files stay forward/backward compatible.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE_NAME,
    Config, DebugConfig, FaceSelection, MaterialParams, MaterialType, TextureConfig, TextureFilter,
};
pub use error::ConfigError;
