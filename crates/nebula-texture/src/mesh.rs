//! The mesh surface the atlas paints onto, plus a simple quad mesh.
//!
//! Voxel meshers store each face's 1-based material index in its base color:
//! the blue, green and red bytes are base-255 digits, least significant first.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Vec2, Vec3};

use crate::expand::FaceSlot;

/// Mesh shared between its owner and deferred paint requests.
pub type SharedMesh = Rc<RefCell<dyn MeshSurface>>;

/// What the atlas needs from a renderer mesh.
///
/// Faces are quads addressed by index. Each has a normal, a base color, an
/// anchor vertex (its first corner) and four UV corners.
pub trait MeshSurface {
    /// Number of quad faces.
    fn face_count(&self) -> usize;

    /// Unit normal of `face`.
    fn face_normal(&self, face: usize) -> Vec3;

    /// Base color of `face` as `[r, g, b]` in `[0, 1]`.
    fn face_color(&self, face: usize) -> [f32; 3];

    fn set_face_color(&mut self, face: usize, rgb: [f32; 3]);

    /// Returns `false` if the mesh carries no UV channel.
    fn has_uvs(&self) -> bool;

    /// Writes the four UV corners of `face`.
    fn set_face_uvs(&mut self, face: usize, uvs: [Vec2; 4]);

    /// First corner of `face`, in mesh-local space.
    fn face_anchor(&self, face: usize) -> Vec3;

    /// World-space position of the mesh origin.
    fn position(&self) -> Vec3;

    /// Flags the UV buffer for re-upload.
    fn mark_uvs_dirty(&mut self);
}

// ---------------------------------------------------------------------------
// Index encoding
// ---------------------------------------------------------------------------

/// Largest index that fits in three base-255 digits.
pub const MAX_ENCODED_INDEX: usize = 255 * 255 * 255 - 1;

/// Decodes a material index from a face color.
///
/// Each channel is scaled back to its byte value before combining as
/// `b + g * 255 + r * 255 * 255`.
pub fn decode_index(r: f32, g: f32, b: f32) -> usize {
    let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as usize;
    byte(b) + byte(g) * 255 + byte(r) * 255 * 255
}

/// Encodes `index` as a face color, the inverse of [`decode_index`].
///
/// Indices above [`MAX_ENCODED_INDEX`] are clamped.
pub fn encode_index(index: usize) -> [f32; 3] {
    let index = index.min(MAX_ENCODED_INDEX);
    let b = index % 255;
    let g = (index / 255) % 255;
    let r = index / (255 * 255);
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
}

/// The geometric slot a face normal points at.
///
/// Only exact axis normals map to a specific slot; anything else, including
/// `-Z`, is treated as the back face.
pub fn slot_for_normal(normal: Vec3) -> FaceSlot {
    const EPS: f32 = 1e-4;
    if normal.abs_diff_eq(Vec3::Z, EPS) {
        FaceSlot::Front
    } else if normal.abs_diff_eq(Vec3::Y, EPS) {
        FaceSlot::Top
    } else if normal.abs_diff_eq(Vec3::NEG_Y, EPS) {
        FaceSlot::Bottom
    } else if normal.abs_diff_eq(Vec3::NEG_X, EPS) {
        FaceSlot::Left
    } else if normal.abs_diff_eq(Vec3::X, EPS) {
        FaceSlot::Right
    } else {
        FaceSlot::Back
    }
}

// ---------------------------------------------------------------------------
// QuadMesh
// ---------------------------------------------------------------------------

/// One quad of a [`QuadMesh`].
#[derive(Clone, Debug, PartialEq)]
pub struct QuadFace {
    pub normal: Vec3,
    pub color: [f32; 3],
    /// Corners in winding order; corner 0 is the anchor.
    pub corners: [Vec3; 4],
    pub uvs: [Vec2; 4],
}

/// Plain in-memory quad mesh.
#[derive(Clone, Debug, Default)]
pub struct QuadMesh {
    pub position: Vec3,
    pub faces: Vec<QuadFace>,
    /// Whether the mesh has a UV channel at all.
    pub has_uvs: bool,
    /// Set after UVs were written; cleared by the renderer on upload.
    pub uvs_need_update: bool,
}

impl QuadMesh {
    /// Empty mesh with a UV channel, placed at `position`.
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            faces: Vec::new(),
            has_uvs: true,
            uvs_need_update: false,
        }
    }

    /// Appends the six faces of the unit cube at `origin`, each carrying
    /// `material_index` in its color.
    pub fn push_voxel(&mut self, origin: Vec3, material_index: usize) {
        let color = encode_index(material_index);
        for (normal, corners) in cube_faces(origin) {
            self.faces.push(QuadFace {
                normal,
                color,
                corners,
                uvs: [Vec2::ZERO; 4],
            });
        }
    }

    /// One voxel of `material_index` at the origin.
    pub fn voxel(material_index: usize) -> Self {
        let mut mesh = Self::new(Vec3::ZERO);
        mesh.push_voxel(Vec3::ZERO, material_index);
        mesh
    }

    /// Wraps the mesh for sharing with deferred paint requests.
    pub fn into_shared(self) -> Rc<RefCell<QuadMesh>> {
        Rc::new(RefCell::new(self))
    }
}

/// Normals and corners of a unit cube's faces: +X, -X, +Y, -Y, +Z, -Z.
fn cube_faces(o: Vec3) -> [(Vec3, [Vec3; 4]); 6] {
    let p = |x: f32, y: f32, z: f32| o + Vec3::new(x, y, z);
    [
        (
            Vec3::X,
            [p(1., 1., 1.), p(1., 1., 0.), p(1., 0., 0.), p(1., 0., 1.)],
        ),
        (
            Vec3::NEG_X,
            [p(0., 1., 0.), p(0., 1., 1.), p(0., 0., 1.), p(0., 0., 0.)],
        ),
        (
            Vec3::Y,
            [p(0., 1., 0.), p(1., 1., 0.), p(1., 1., 1.), p(0., 1., 1.)],
        ),
        (
            Vec3::NEG_Y,
            [p(0., 0., 1.), p(1., 0., 1.), p(1., 0., 0.), p(0., 0., 0.)],
        ),
        (
            Vec3::Z,
            [p(0., 1., 1.), p(1., 1., 1.), p(1., 0., 1.), p(0., 0., 1.)],
        ),
        (
            Vec3::NEG_Z,
            [p(1., 1., 0.), p(0., 1., 0.), p(0., 0., 0.), p(1., 0., 0.)],
        ),
    ]
}

impl MeshSurface for QuadMesh {
    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn face_normal(&self, face: usize) -> Vec3 {
        self.faces[face].normal
    }

    fn face_color(&self, face: usize) -> [f32; 3] {
        self.faces[face].color
    }

    fn set_face_color(&mut self, face: usize, rgb: [f32; 3]) {
        self.faces[face].color = rgb;
    }

    fn has_uvs(&self) -> bool {
        self.has_uvs
    }

    fn set_face_uvs(&mut self, face: usize, uvs: [Vec2; 4]) {
        self.faces[face].uvs = uvs;
    }

    fn face_anchor(&self, face: usize) -> Vec3 {
        self.faces[face].corners[0]
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn mark_uvs_dirty(&mut self) {
        self.uvs_need_update = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_small_indices() {
        for index in [0usize, 1, 2, 17, 254, 255, 256, 1000, 65_024, 65_025, 70_000] {
            let [r, g, b] = encode_index(index);
            assert_eq!(decode_index(r, g, b), index, "index {index}");
        }
    }

    #[test]
    fn test_decode_matches_channel_weights() {
        // B contributes 1 per step, G 255, R 255 * 255.
        assert_eq!(decode_index(0.0, 0.0, 3.0 / 255.0), 3);
        assert_eq!(decode_index(0.0, 2.0 / 255.0, 0.0), 510);
        assert_eq!(decode_index(1.0 / 255.0, 0.0, 0.0), 65_025);
        assert_eq!(decode_index(0.0, 0.0, 0.0), 0);
    }

    #[test]
    fn test_decode_rounds_channels_to_nearest_byte() {
        // A channel a hair below its byte value still decodes to that byte.
        assert_eq!(decode_index(0.0, 0.0, 2.0 / 255.0 - 1e-6), 2);
        assert_eq!(decode_index(0.0, 0.0, 0.5), 128);
    }

    #[test]
    fn test_slot_for_axis_normals() {
        assert_eq!(slot_for_normal(Vec3::Z), FaceSlot::Front);
        assert_eq!(slot_for_normal(Vec3::NEG_Z), FaceSlot::Back);
        assert_eq!(slot_for_normal(Vec3::Y), FaceSlot::Top);
        assert_eq!(slot_for_normal(Vec3::NEG_Y), FaceSlot::Bottom);
        assert_eq!(slot_for_normal(Vec3::NEG_X), FaceSlot::Left);
        assert_eq!(slot_for_normal(Vec3::X), FaceSlot::Right);
        assert_eq!(
            slot_for_normal(Vec3::new(0.6, 0.8, 0.0)),
            FaceSlot::Back
        );
    }

    #[test]
    fn test_voxel_has_six_faces_with_encoded_index() {
        let mesh = QuadMesh::voxel(42);
        assert_eq!(mesh.face_count(), 6);
        for face in 0..6 {
            let [r, g, b] = mesh.face_color(face);
            assert_eq!(decode_index(r, g, b), 42);
        }
    }

    #[test]
    fn test_cube_corners_lie_on_their_face_plane() {
        let mesh = QuadMesh::voxel(1);
        for face in &mesh.faces {
            let plane = face.corners[0].dot(face.normal);
            for corner in &face.corners {
                assert!((corner.dot(face.normal) - plane).abs() < 1e-6);
            }
        }
    }
}
