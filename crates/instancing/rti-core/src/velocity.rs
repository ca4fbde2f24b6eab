//! Per-vertex velocities stored in a mesh map channel.
//!
//! A source's velocity map channel only says where velocities *might* be.
//! The channel has to exist on the mesh and its face count has to equal the
//! mesh face count. Map vertex indices do not correspond to mesh vertex
//! indices, even when the counts match, so velocities are resolved through
//! the face tables corner by corner.

use rti_api_core::{Mesh, Point3};

/// Whether `channel` on `mesh` can be trusted as a velocity channel.
pub fn has_vertex_velocities(mesh: &Mesh, channel: i32) -> bool {
    mesh.map(channel)
        .is_some_and(|map| map.face_count() == mesh.face_count())
}

/// Velocity (units/frame) per mesh vertex, or `None` when the channel is
/// absent or unusable. Vertices no face references keep a zero velocity.
pub fn vertex_velocities(mesh: &Mesh, channel: i32) -> Option<Vec<Point3>> {
    let mut out = Vec::new();
    vertex_velocities_into(mesh, channel, &mut out).then_some(out)
}

/// Buffer-reusing form of [`vertex_velocities`]; returns false (and leaves
/// `out` empty) when the channel is unusable.
pub fn vertex_velocities_into(mesh: &Mesh, channel: i32, out: &mut Vec<Point3>) -> bool {
    out.clear();
    if !has_vertex_velocities(mesh, channel) {
        return false;
    }
    let Some(map) = mesh.map(channel) else {
        return false;
    };
    out.resize(mesh.vert_count(), Point3::ORIGIN);
    for (face, map_face) in mesh.faces.iter().zip(map.tf.iter()) {
        for corner in 0..3 {
            let vi = face.v[corner] as usize;
            let ti = map_face.t[corner] as usize;
            if let (Some(slot), Some(vel)) = (out.get_mut(vi), map.tv.get(ti)) {
                *slot = *vel;
            }
        }
    }
    true
}
