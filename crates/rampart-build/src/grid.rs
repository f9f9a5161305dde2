//! Server-side grid snapping.
//!
//! Clients snap their ghost preview locally, but the server re-snaps every
//! position to the build grid and every rotation to the yaw step. A client
//! position that lies further than `snap_tolerance` from its snapped cell is
//! treated as tampering and rejected.

use glam::{EulerRot, Quat, Vec3};

/// Grid and yaw quantization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSnap {
    grid_size: f32,
    yaw_step: f32,
    tolerance: f32,
}

/// Why a client position could not be snapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapError {
    /// A coordinate was NaN or infinite.
    NonFinite,
    /// The position was too far from the nearest grid point.
    OffGrid {
        /// Distance from the nearest grid point.
        deviation: f32,
    },
}

impl GridSnap {
    /// Create a snapper.
    ///
    /// Non-positive sizes fall back to `1.0` for the grid and 90 degrees
    /// for the yaw step.
    pub fn new(grid_size: f32, rotation_step_degrees: f32, tolerance: f32) -> Self {
        let grid_size = if grid_size.is_finite() && grid_size > 0.0 {
            grid_size
        } else {
            1.0
        };
        let step = if rotation_step_degrees.is_finite() && rotation_step_degrees > 0.0 {
            rotation_step_degrees
        } else {
            90.0
        };
        Self {
            grid_size,
            yaw_step: step.to_radians(),
            tolerance: tolerance.max(0.0),
        }
    }

    /// Nearest grid point, without a tolerance check.
    pub fn snap_position(&self, position: Vec3) -> Vec3 {
        (position / self.grid_size).round() * self.grid_size
    }

    /// Rotation reduced to yaw and rounded to the nearest step.
    pub fn snap_rotation(&self, rotation: Quat) -> Quat {
        if !rotation.is_finite() || rotation.length_squared() <= f32::EPSILON {
            return Quat::IDENTITY;
        }
        let (yaw, _, _) = rotation.normalize().to_euler(EulerRot::YXZ);
        let snapped = (yaw / self.yaw_step).round() * self.yaw_step;
        Quat::from_rotation_y(snapped)
    }

    /// Snap a client-reported position, enforcing the tolerance.
    ///
    /// # Errors
    ///
    /// Returns [`SnapError`] for non-finite input or off-grid positions.
    pub fn snap_client(&self, position: Vec3) -> Result<Vec3, SnapError> {
        if !position.is_finite() {
            return Err(SnapError::NonFinite);
        }
        let snapped = self.snap_position(position);
        let deviation = snapped.distance(position);
        if deviation > self.tolerance {
            return Err(SnapError::OffGrid { deviation });
        }
        Ok(snapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snaps_to_nearest_cell() {
        let grid = GridSnap::new(2.0, 90.0, 0.1);
        let snapped = grid.snap_position(Vec3::new(2.9, 0.2, -3.1));
        assert!(snapped.abs_diff_eq(Vec3::new(2.0, 0.0, -4.0), 1e-6));
    }

    #[test]
    fn client_within_tolerance_is_accepted() {
        let grid = GridSnap::new(1.0, 90.0, 0.1);
        let snapped = grid.snap_client(Vec3::new(3.02, 0.0, 4.98)).ok();
        assert!(snapped.is_some_and(|p| p.abs_diff_eq(Vec3::new(3.0, 0.0, 5.0), 1e-6)));
    }

    #[test]
    fn client_off_grid_is_rejected() {
        let grid = GridSnap::new(1.0, 90.0, 0.1);
        assert!(matches!(
            grid.snap_client(Vec3::new(3.4, 0.0, 0.0)),
            Err(SnapError::OffGrid { .. })
        ));
        assert_eq!(
            grid.snap_client(Vec3::new(f32::NAN, 0.0, 0.0)),
            Err(SnapError::NonFinite)
        );
    }

    #[test]
    fn yaw_rounds_to_step_and_drops_tilt() {
        let grid = GridSnap::new(1.0, 90.0, 0.1);
        let tilted = Quat::from_rotation_y(80_f32.to_radians()) * Quat::from_rotation_x(0.3);
        let snapped = grid.snap_rotation(tilted);
        assert!(snapped.abs_diff_eq(Quat::from_rotation_y(90_f32.to_radians()), 1e-4));
    }

    #[test]
    fn degenerate_rotation_becomes_identity() {
        let grid = GridSnap::new(1.0, 45.0, 0.1);
        assert_eq!(
            grid.snap_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)),
            Quat::IDENTITY
        );
    }
}
