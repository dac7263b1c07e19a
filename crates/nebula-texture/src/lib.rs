//! Runtime texture atlas for voxel meshes: packs named tiles into one
//! power-of-two canvas, indexes their UV rectangles, and paints mesh faces
//! with atlas UVs or noise-blended vertex colors.

mod blend;
mod canvas;
mod color;
mod error;
mod expand;
mod loader;
mod material;
mod mesh;
mod packer;
mod paint;
mod queue;
mod scheduler;
mod sprite;
mod texture;
mod uv;

pub use blend::{ColorBlender, DARK_LIGHTNESS_OFFSET, NOISE_SCALE};
pub use canvas::{AtlasCanvas, pow2};
pub use color::{HexColor, hsl_to_rgb, is_color_ref, lerp_color, parse_color_ref, rgb_to_hsl};
pub use error::{ImageSourceError, TextureError};
pub use expand::{ExpandedMaterial, FaceSlot, MaterialSpec, NamedFaces, expand};
pub use loader::{FsImageSource, ImageLoader, ImageRequest, ImageSource, MemoryImageSource, resolve_path};
pub use material::{MaterialHandle, MaterialKind, TextureHandle};
pub use mesh::{MAX_ENCODED_INDEX, MeshSurface, QuadFace, QuadMesh, SharedMesh, decode_index, encode_index, slot_for_normal};
pub use nebula_config::{FaceSelection, MaterialParams, MaterialType, TextureConfig, TextureFilter};
pub use packer::{AtlasPacker, GuillotinePacker, PackedRect, PackedTile};
pub use paint::{PaintOutcome, PaintStats, orient_uvs, select_slot};
pub use queue::{LoadTicket, PaintQueue, PaintRequest};
pub use scheduler::{IntervalId, Scheduler};
pub use sprite::{DEFAULT_TILE_SIZE, slice_sheet, tile_name};
pub use texture::{AnimationHandle, DEFAULT_ANIMATION_DELAY_MS, Texture, TextureBuilder, TextureEvent};
pub use uv::{UvIndex, UvRect, uvinvert, uvrot};
