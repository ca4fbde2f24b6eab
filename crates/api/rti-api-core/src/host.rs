//! Minimal stand-ins for the host scene objects exchanged by the protocol.
//!
//! The host owns the real mesh/node/material representations; these types carry
//! just enough of them for providers and renderers to talk to each other.

use serde::{Deserialize, Serialize};

use crate::math::{Point3, UvVert};

/// Triangle referencing mesh vertex indices.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    pub v: [u32; 3],
}

/// Triangle referencing map-vertex indices of one map channel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvFace {
    pub t: [u32; 3],
}

/// One per-face map channel: map vertices plus a face table into them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshMap {
    pub tv: Vec<UvVert>,
    pub tf: Vec<TvFace>,
}

impl MeshMap {
    #[inline]
    pub fn face_count(&self) -> usize {
        self.tf.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub verts: Vec<Point3>,
    pub faces: Vec<Face>,
    /// Map channels indexed by channel number; `None` means unsupported.
    #[serde(default)]
    pub maps: Vec<Option<MeshMap>>,
}

impl Mesh {
    #[inline]
    pub fn vert_count(&self) -> usize {
        self.verts.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Map channel `channel` if it is initialized on this mesh.
    pub fn map(&self, channel: i32) -> Option<&MeshMap> {
        let idx = usize::try_from(channel).ok()?;
        self.maps.get(idx).and_then(Option::as_ref)
    }

    #[inline]
    pub fn map_support(&self, channel: i32) -> bool {
        self.map(channel).is_some()
    }

    /// Install `map` on `channel`, growing the channel table as needed.
    pub fn set_map(&mut self, channel: usize, map: MeshMap) {
        if self.maps.len() <= channel {
            self.maps.resize(channel + 1, None);
        }
        self.maps[channel] = Some(map);
    }

    /// Append `other` with its vertices offset, as used for aggregate meshes.
    /// Map channels are not merged.
    pub fn append(&mut self, other: &Mesh, offset: impl Fn(Point3) -> Point3) {
        let base = self.verts.len() as u32;
        self.verts.extend(other.verts.iter().copied().map(offset));
        self.faces.extend(other.faces.iter().map(|f| Face {
            v: [f.v[0] + base, f.v[1] + base, f.v[2] + base],
        }));
    }
}

/// Opaque reference to a host scene node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneNode {
    pub handle: u64,
    pub name: String,
}

/// Opaque reference to a host material.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Material {
    pub id: u64,
    pub name: String,
}
