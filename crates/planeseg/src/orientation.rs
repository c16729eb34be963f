//! Terrain frame from a surface normal.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// Below this norm the projected world x-axis is considered degenerate.
const MIN_AXIS_NORM: f64 = 1e-6;

/// Rotation taking world-frame vectors into the terrain frame of a plane.
///
/// The terrain z-axis is `normal`; the terrain x-axis is world x projected
/// onto the plane (world y when the normal is almost parallel to world x);
/// the y-axis completes a right-handed frame. `normal` must be unit length.
pub fn orientation_world_to_terrain(normal: &Vector3<f64>) -> Rotation3<f64> {
    let mut x_axis = Vector3::x() - normal * normal.x;
    if x_axis.norm() < MIN_AXIS_NORM {
        x_axis = Vector3::y() - normal * normal.y;
    }
    x_axis.normalize_mut();
    let y_axis = normal.cross(&x_axis);
    let terrain_to_world = Matrix3::from_columns(&[x_axis, y_axis, *normal]);
    Rotation3::from_matrix_unchecked(terrain_to_world.transpose())
}
