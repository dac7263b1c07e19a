//! Per-face material resolution and UV assignment.
//!
//! Voxel meshes (no explicit material) decode each face's registry index from
//! its color; simple meshes apply one expanded material to every face. A face
//! then receives either atlas UVs or a blended flat color.

use glam::{Vec2, Vec3};
use nebula_config::FaceSelection;
use tracing::{trace, warn};

use crate::blend::ColorBlender;
use crate::color::is_color_ref;
use crate::error::TextureError;
use crate::expand::{ExpandedMaterial, FaceSlot};
use crate::mesh::{MeshSurface, decode_index, slot_for_normal};
use crate::uv::{UvIndex, UvRect, uvinvert, uvrot};

/// Result of a [`crate::Texture::paint`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintOutcome {
    /// The atlas is loading; the call was queued and the mesh left untouched.
    Deferred,
    /// The mesh was painted.
    Painted(PaintStats),
}

/// Per-call face counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaintStats {
    /// Faces that received atlas UVs.
    pub uv_faces: usize,
    /// Faces that received a blended color.
    pub color_faces: usize,
    /// Faces left untouched (no name, unknown tile, bad color, no UV channel).
    pub skipped: usize,
}

/// Where each face's material comes from.
pub(crate) enum MaterialSource<'a> {
    /// Decode the registry index from the face color.
    Voxel(&'a [ExpandedMaterial]),
    /// One material for every face.
    Simple(&'a ExpandedMaterial),
}

/// Read-only state needed to paint one mesh.
pub(crate) struct PaintContext<'a> {
    pub materials: MaterialSource<'a>,
    pub uv_index: &'a UvIndex,
    pub blender: &'a ColorBlender,
    pub selection: FaceSelection,
}

/// Picks the slot of an expanded material used for a face.
pub fn select_slot(normal: Vec3, selection: FaceSelection) -> FaceSlot {
    match selection {
        FaceSelection::ByNormal => slot_for_normal(normal),
        FaceSelection::BackOnly => FaceSlot::Back,
    }
}

/// Orients an atlas rectangle for a face and flips V for the renderer.
///
/// Voxel meshes are wound upside down, so their corners are reversed, and
/// `-Z`/`+X` faces are additionally turned a quarter. Simple meshes only get
/// a quarter turn the other way.
pub fn orient_uvs(rect: UvRect, normal: Vec3, voxel: bool) -> [Vec2; 4] {
    let oriented = if voxel {
        let rotated = if normal.abs_diff_eq(Vec3::NEG_Z, 1e-4) || normal.abs_diff_eq(Vec3::X, 1e-4)
        {
            uvrot(rect, 90)
        } else {
            rect
        };
        uvinvert(rotated)
    } else {
        uvrot(rect, -90)
    };
    oriented.0.map(|c| Vec2::new(c.x, 1.0 - c.y))
}

/// Paints every face of `mesh` and flags its UVs dirty.
pub(crate) fn paint_faces(mesh: &mut dyn MeshSurface, ctx: &PaintContext<'_>) -> PaintStats {
    let mut stats = PaintStats::default();
    let voxel = matches!(ctx.materials, MaterialSource::Voxel(_));
    let origin = mesh.position();

    for face in 0..mesh.face_count() {
        let material = match &ctx.materials {
            MaterialSource::Simple(material) => Some(*material),
            MaterialSource::Voxel(registry) => {
                let [r, g, b] = mesh.face_color(face);
                let index = decode_index(r, g, b);
                registry
                    .get(index.wrapping_sub(1))
                    .or_else(|| registry.first())
            }
        };

        let normal = mesh.face_normal(face);
        let slot = select_slot(normal, ctx.selection);
        let Some(name) = material.and_then(|m| m.get(slot)).filter(|n| !n.is_empty()) else {
            stats.skipped += 1;
            continue;
        };

        if is_color_ref(name) {
            let world = origin + mesh.face_anchor(face);
            match ctx.blender.resolve(name, world) {
                Ok(color) => {
                    mesh.set_face_color(face, color.to_rgb_f32());
                    stats.color_faces += 1;
                }
                Err(err) => {
                    warn!(face, %err, "skipping face with unusable color");
                    stats.skipped += 1;
                }
            }
            continue;
        }

        let Some(rect) = ctx.uv_index.get(name) else {
            trace!(face, name, "tile not in atlas, face left untouched");
            stats.skipped += 1;
            continue;
        };
        if !mesh.has_uvs() {
            stats.skipped += 1;
            continue;
        }

        mesh.set_face_uvs(face, orient_uvs(*rect, normal, voxel));
        stats.uv_faces += 1;
    }

    mesh.mark_uvs_dirty();
    stats
}

/// Writes a `#rrggbb` color to one face.
pub(crate) fn set_color(
    mesh: &mut dyn MeshSurface,
    face: usize,
    color: &str,
) -> Result<(), TextureError> {
    let count = mesh.face_count();
    if face >= count {
        return Err(TextureError::FaceOutOfRange { face, count });
    }
    let color = crate::color::HexColor::parse(color)?;
    mesh.set_face_color(face, color.to_rgb_f32());
    Ok(())
}
