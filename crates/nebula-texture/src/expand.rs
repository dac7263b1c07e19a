//! Material specs and their expansion to six cube faces.
//!
//! A voxel type can name one texture for every face, a short list that is
//! spread over the faces by convention, or each face explicitly. Everything is
//! normalized to an [`ExpandedMaterial`] ordered back, front, top, bottom,
//! left, right.

use serde::{Deserialize, Serialize};

use crate::error::TextureError;

// ---------------------------------------------------------------------------
// FaceSlot
// ---------------------------------------------------------------------------

/// Position of a face inside an [`ExpandedMaterial`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FaceSlot {
    /// -Z face (and the default slot).
    Back = 0,
    /// +Z face.
    Front = 1,
    /// +Y face.
    Top = 2,
    /// -Y face.
    Bottom = 3,
    /// -X face.
    Left = 4,
    /// +X face.
    Right = 5,
}

impl FaceSlot {
    /// All six slots in storage order.
    pub const ALL: [FaceSlot; 6] = [
        Self::Back,
        Self::Front,
        Self::Top,
        Self::Bottom,
        Self::Left,
        Self::Right,
    ];

    /// Index into the six-entry array.
    pub fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// MaterialSpec
// ---------------------------------------------------------------------------

/// Explicit per-face names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedFaces {
    pub back: Option<String>,
    pub front: Option<String>,
    pub top: Option<String>,
    pub bottom: Option<String>,
    pub left: Option<String>,
    pub right: Option<String>,
}

/// User-supplied description of a voxel type's face textures.
///
/// Names starting with `#` are color references (`#rrggbb` or
/// `#rrggbb/#rrggbb`) and are painted as vertex colors instead of atlas UVs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialSpec {
    /// No faces at all.
    None,
    /// One name for all six faces.
    Name(String),
    /// 1, 2, 3, 4 or 6 names spread over the faces.
    List(Vec<String>),
    /// Each face named explicitly.
    Faces(NamedFaces),
}

impl MaterialSpec {
    /// Builds a [`MaterialSpec::List`] from anything yielding names.
    pub fn list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(names.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for MaterialSpec {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for MaterialSpec {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Vec<String>> for MaterialSpec {
    fn from(names: Vec<String>) -> Self {
        Self::List(names)
    }
}

impl From<&[&str]> for MaterialSpec {
    fn from(names: &[&str]) -> Self {
        Self::list(names.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for MaterialSpec {
    fn from(names: [&str; N]) -> Self {
        Self::list(names)
    }
}

impl From<NamedFaces> for MaterialSpec {
    fn from(faces: NamedFaces) -> Self {
        Self::Faces(faces)
    }
}

// ---------------------------------------------------------------------------
// ExpandedMaterial
// ---------------------------------------------------------------------------

/// Canonical six-face form of a [`MaterialSpec`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ExpandedMaterial(pub [Option<String>; 6]);

impl ExpandedMaterial {
    /// Six absent faces.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The same name on every face.
    pub fn uniform(name: &str) -> Self {
        Self(std::array::from_fn(|_| Some(name.to_string())))
    }

    /// Name stored for `slot`, if any.
    pub fn get(&self, slot: FaceSlot) -> Option<&str> {
        self.0[slot.index()].as_deref()
    }

    /// Present names in slot order (duplicates included).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|n| n.as_deref())
    }

    /// Returns `true` if any slot holds `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }
}

/// Expands `spec` to exactly six faces.
///
/// # Errors
///
/// Lists whose length is not 1, 2, 3, 4 or 6 are rejected with
/// [`TextureError::InvalidSpecLength`].
pub fn expand(spec: &MaterialSpec) -> Result<ExpandedMaterial, TextureError> {
    let names = match spec {
        MaterialSpec::None => return Ok(ExpandedMaterial::empty()),
        MaterialSpec::Faces(f) => {
            return Ok(ExpandedMaterial([
                f.back.clone(),
                f.front.clone(),
                f.top.clone(),
                f.bottom.clone(),
                f.left.clone(),
                f.right.clone(),
            ]));
        }
        MaterialSpec::Name(name) => std::slice::from_ref(name),
        MaterialSpec::List(names) => names.as_slice(),
    };

    // Source index for each of back, front, top, bottom, left, right.
    let layout: [usize; 6] = match names.len() {
        1 => [0, 0, 0, 0, 0, 0],
        // 0 is top/bottom, 1 is sides
        2 => [1, 1, 0, 0, 1, 1],
        // 0 is top, 1 is bottom, 2 is sides
        3 => [2, 2, 0, 1, 2, 2],
        // 0 is top, 1 is bottom, 2 is front/back, 3 is left/right
        4 => [2, 2, 0, 1, 3, 3],
        6 => [0, 1, 2, 3, 4, 5],
        len => return Err(TextureError::InvalidSpecLength { len }),
    };

    Ok(ExpandedMaterial(layout.map(|i| Some(names[i].clone()))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faces(m: &ExpandedMaterial) -> Vec<&str> {
        m.0.iter().map(|n| n.as_deref().unwrap_or("")).collect()
    }

    #[test]
    fn test_none_gives_six_absent_faces() {
        let m = expand(&MaterialSpec::None).unwrap();
        assert_eq!(m.0.len(), 6);
        assert!(m.0.iter().all(Option::is_none));
    }

    #[test]
    fn test_single_name_fills_every_face() {
        let m = expand(&"stone".into()).unwrap();
        assert_eq!(faces(&m), ["stone"; 6]);
    }

    #[test]
    fn test_single_color_list_fills_every_face() {
        let m = expand(&MaterialSpec::from(["#ff0000"])).unwrap();
        assert_eq!(faces(&m), ["#ff0000"; 6]);
    }

    #[test]
    fn test_two_names_top_bottom_then_sides() {
        let m = expand(&MaterialSpec::from(["cap", "side"])).unwrap();
        assert_eq!(faces(&m), ["side", "side", "cap", "cap", "side", "side"]);
    }

    #[test]
    fn test_three_names_top_bottom_sides() {
        let m = expand(&MaterialSpec::from(["grass", "dirt", "grass_dirt"])).unwrap();
        assert_eq!(
            faces(&m),
            ["grass_dirt", "grass_dirt", "grass", "dirt", "grass_dirt", "grass_dirt"]
        );
    }

    #[test]
    fn test_four_names_split_front_back_and_left_right() {
        let m = expand(&MaterialSpec::from(["top", "bottom", "fb", "lr"])).unwrap();
        assert_eq!(faces(&m), ["fb", "fb", "top", "bottom", "lr", "lr"]);
        assert_eq!(m.get(FaceSlot::Right), Some("lr"));
        assert_eq!(m.get(FaceSlot::Front), Some("fb"));
    }

    #[test]
    fn test_six_names_used_verbatim() {
        let names = ["b", "f", "t", "u", "l", "r"];
        let m = expand(&MaterialSpec::from(names)).unwrap();
        assert_eq!(faces(&m), names);
    }

    #[test]
    fn test_named_faces_read_by_key() {
        let spec = MaterialSpec::Faces(NamedFaces {
            top: Some("log_top".into()),
            bottom: Some("log_top".into()),
            back: Some("log".into()),
            front: Some("log".into()),
            left: Some("bark".into()),
            right: None,
        });
        let m = expand(&spec).unwrap();
        assert_eq!(faces(&m), ["log", "log", "log_top", "log_top", "bark", ""]);
    }

    #[test]
    fn test_unsupported_lengths_rejected() {
        for len in [0usize, 5, 7] {
            let spec = MaterialSpec::list((0..len).map(|i| format!("t{i}")));
            assert!(
                matches!(expand(&spec), Err(TextureError::InvalidSpecLength { len: l }) if l == len),
                "length {len} should be rejected"
            );
        }
    }

    #[test]
    fn test_every_valid_length_yields_six() {
        for len in [1usize, 2, 3, 4, 6] {
            let spec = MaterialSpec::list((0..len).map(|i| format!("t{i}")));
            let m = expand(&spec).unwrap();
            assert_eq!(m.names().count(), 6);
        }
    }

    #[test]
    fn test_contains() {
        let m = expand(&MaterialSpec::from(["a", "b"])).unwrap();
        assert!(m.contains("a"));
        assert!(!m.contains("c"));
    }

    #[test]
    fn test_spec_from_ron() {
        let spec: MaterialSpec = ron::from_str(r#"List(["grass", "dirt", "grass_dirt"])"#).unwrap();
        assert_eq!(spec, MaterialSpec::from(["grass", "dirt", "grass_dirt"]));

        let spec: MaterialSpec = ron::from_str(r#"Faces((top: Some("t")))"#).unwrap();
        let m = expand(&spec).unwrap();
        assert_eq!(m.get(FaceSlot::Top), Some("t"));
        assert_eq!(m.get(FaceSlot::Back), None);
    }
}
