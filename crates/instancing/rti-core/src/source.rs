//! Instance sources: one distinct shape shared by a list of targets.

use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::sync::Arc;

use rti_api_core::{Mesh, SceneNode};

use crate::target::InstanceTarget;

/// Who is responsible for the source data once the renderer is done with it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Provider keeps the data; valid only until `release()`.
    #[default]
    Borrowed,
    /// Renderer takes the data and must drop it by `release()` at the latest.
    CallerReleases,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Mesh,
    Node,
}

/// What gets instanced.
#[derive(Clone, Debug)]
pub enum SourceData {
    Mesh { mesh: Arc<Mesh>, ownership: Ownership },
    Node { node: Arc<SceneNode>, ownership: Ownership },
}

/// Data handed over to the renderer for a [`Ownership::CallerReleases`] source.
#[derive(Clone, Debug)]
pub enum ClaimedData {
    Mesh(Arc<Mesh>),
    Node(Arc<SceneNode>),
}

impl SourceData {
    pub fn mesh(mesh: Arc<Mesh>) -> Self {
        SourceData::Mesh {
            mesh,
            ownership: Ownership::Borrowed,
        }
    }

    pub fn node(node: Arc<SceneNode>) -> Self {
        SourceData::Node {
            node,
            ownership: Ownership::Borrowed,
        }
    }

    pub fn with_ownership(mut self, value: Ownership) -> Self {
        match &mut self {
            SourceData::Mesh { ownership, .. } | SourceData::Node { ownership, .. } => {
                *ownership = value
            }
        }
        self
    }

    #[inline]
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceData::Mesh { .. } => SourceKind::Mesh,
            SourceData::Node { .. } => SourceKind::Node,
        }
    }

    #[inline]
    pub fn ownership(&self) -> Ownership {
        match self {
            SourceData::Mesh { ownership, .. } | SourceData::Node { ownership, .. } => *ownership,
        }
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match self {
            SourceData::Mesh { mesh, .. } => Some(mesh.as_ref()),
            SourceData::Node { .. } => None,
        }
    }

    pub fn as_node(&self) -> Option<&SceneNode> {
        match self {
            SourceData::Node { node, .. } => Some(node.as_ref()),
            SourceData::Mesh { .. } => None,
        }
    }

    /// Take a handle to caller-owned data; `None` for borrowed data.
    pub fn claim(&self) -> Option<ClaimedData> {
        match self {
            SourceData::Mesh {
                mesh,
                ownership: Ownership::CallerReleases,
            } => Some(ClaimedData::Mesh(Arc::clone(mesh))),
            SourceData::Node {
                node,
                ownership: Ownership::CallerReleases,
            } => Some(ClaimedData::Node(Arc::clone(node))),
            _ => None,
        }
    }

    /// Identity of the underlying allocation, used to group targets.
    pub(crate) fn identity(&self) -> (SourceKind, usize) {
        match self {
            SourceData::Mesh { mesh, .. } => (SourceKind::Mesh, Arc::as_ptr(mesh) as usize),
            SourceData::Node { node, .. } => (SourceKind::Node, Arc::as_ptr(node) as usize),
        }
    }

    /// True when both refer to the same allocation.
    pub fn same_data(&self, other: &SourceData) -> bool {
        self.identity() == other.identity()
    }
}

/// Legacy bitset view of a source's data tag. Test membership with
/// [`DataFlags::contains`], never equality: auxiliary bits may be set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DataFlags(pub u32);

impl DataFlags {
    pub const NONE: DataFlags = DataFlags(0);
    pub const MESH: DataFlags = DataFlags(1 << 0);
    pub const INODE: DataFlags = DataFlags(1 << 1);
    pub const CALLER_MUST_RELEASE: DataFlags = DataFlags(1 << 31);
    pub const ALL_KINDS: DataFlags = DataFlags(Self::MESH.0 | Self::INODE.0);

    #[inline]
    pub fn contains(self, other: DataFlags) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether a request filter admits sources of `kind`. An empty filter
    /// admits everything.
    pub fn admits(self, kind: SourceKind) -> bool {
        let kinds = DataFlags(self.0 & Self::ALL_KINDS.0);
        kinds.is_empty()
            || match kind {
                SourceKind::Mesh => kinds.contains(Self::MESH),
                SourceKind::Node => kinds.contains(Self::INODE),
            }
    }
}

impl BitOr for DataFlags {
    type Output = DataFlags;
    fn bitor(self, rhs: DataFlags) -> DataFlags {
        DataFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for DataFlags {
    fn bitor_assign(&mut self, rhs: DataFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for DataFlags {
    type Output = DataFlags;
    fn bitand(self, rhs: DataFlags) -> DataFlags {
        DataFlags(self.0 & rhs.0)
    }
}

#[derive(Clone, Debug)]
pub struct InstanceSource {
    pub(crate) data: SourceData,
    pub(crate) velocity_map_channel: i32,
    pub(crate) targets: Vec<InstanceTarget>,
}

impl InstanceSource {
    pub(crate) fn new(data: SourceData, velocity_map_channel: i32) -> Self {
        Self {
            data,
            velocity_map_channel: velocity_map_channel.max(-1),
            targets: Vec::new(),
        }
    }

    pub fn flags(&self) -> DataFlags {
        let mut flags = match self.data.kind() {
            SourceKind::Mesh => DataFlags::MESH,
            SourceKind::Node => DataFlags::INODE,
        };
        if self.caller_must_release() {
            flags |= DataFlags::CALLER_MUST_RELEASE;
        }
        flags
    }

    #[inline]
    pub fn data(&self) -> &SourceData {
        &self.data
    }

    #[inline]
    pub fn kind(&self) -> SourceKind {
        self.data.kind()
    }

    #[inline]
    pub fn caller_must_release(&self) -> bool {
        self.data.ownership() == Ownership::CallerReleases
    }

    /// Map channel holding per-vertex velocity (units/frame) on meshes of
    /// this source; -1 when there is none. See [`crate::velocity`].
    #[inline]
    pub fn velocity_map_channel(&self) -> i32 {
        self.velocity_map_channel
    }

    #[inline]
    pub fn targets(&self) -> &[InstanceTarget] {
        &self.targets
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
