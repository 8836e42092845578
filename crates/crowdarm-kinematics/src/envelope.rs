//! Workspace geometry constants and the reachability predicate.
//!
//! The reachable volume of the arm is approximated as a torus around the arm
//! base: the distance of a target from the circle of radius
//! `base_offset_xy` at height `base_offset_z` must stay within
//! `max_radius_xy - base_offset_xy`. This is a deliberate approximation of
//! the true inverse-kinematic limits, not exact joint-space reachability.

use crowdarm_types::{ArmError, Coordinates, Frame};
use serde::{Deserialize, Serialize};

/// Static workspace geometry, loaded once at startup and never mutated.
///
/// All lengths are millimetres in the device frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceEnvelope {
    /// Side length of one lattice cell in x and y.
    pub cell_xy: f64,
    /// Height of one lattice cell. Differs from `cell_xy` because of the
    /// blocks' locking mechanism.
    pub cell_z: f64,
    /// Offset of the user-frame origin in device x.
    pub x_offset: f64,
    /// Offset of the user-frame origin in device y.
    pub y_offset: f64,
    /// Offset of the user-frame origin in device z.
    pub z_offset: f64,
    /// Distance of the workspace torus centre from the base in the xy-plane.
    pub base_offset_xy: f64,
    /// Height of the workspace torus centre above the base.
    pub base_offset_z: f64,
    /// Minimum reachable xy distance from the base.
    pub min_radius_xy: f64,
    /// Maximum reachable xy distance from the base.
    pub max_radius_xy: f64,
}

impl Default for WorkspaceEnvelope {
    /// Geometry of the uArm Swift Pro setup the project was built around.
    fn default() -> Self {
        Self {
            cell_xy: 60.0,
            cell_z: 4.0,
            x_offset: 0.0,
            y_offset: -320.0,
            z_offset: 0.0,
            base_offset_xy: 174.0,
            base_offset_z: 93.5,
            min_radius_xy: 120.0,
            max_radius_xy: 340.0,
        }
    }
}

impl WorkspaceEnvelope {
    /// Basic sanity checks, run once when configuration is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Config`] for non-positive cell sizes or an
    /// inverted radius range.
    pub fn validate(&self) -> Result<(), ArmError> {
        if self.cell_xy <= 0.0 || self.cell_z <= 0.0 {
            return Err(ArmError::Config(format!(
                "cell sizes must be positive (cell_xy={}, cell_z={})",
                self.cell_xy, self.cell_z
            )));
        }
        if self.min_radius_xy >= self.max_radius_xy {
            return Err(ArmError::Config(format!(
                "min_radius_xy ({}) must be less than max_radius_xy ({})",
                self.min_radius_xy, self.max_radius_xy
            )));
        }
        Ok(())
    }
}

/// Check that a device-frame coordinate lies inside the workspace envelope.
///
/// A target is reachable iff all of the following hold:
///
/// 1. its distance from the torus centre circle is at most
///    `max_radius_xy - base_offset_xy`,
/// 2. `x >= 0` (the arm cannot reach behind its base),
/// 3. the xy distance from the base strictly exceeds `min_radius_xy`,
/// 4. `z` clears one cell height above the user-frame floor.
///
/// # Errors
///
/// [`ArmError::OutOfWorkspace`] carrying the offending coordinate. The
/// rejection is surfaced to the caller, never clamped.
pub fn check_workspace(
    envelope: &WorkspaceEnvelope,
    coordinates: Coordinates,
) -> Result<(), ArmError> {
    debug_assert_eq!(coordinates.frame, Frame::Device);

    let xy_len = (coordinates.x.powi(2) + coordinates.y.powi(2)).sqrt();
    let xy_radius = (xy_len - envelope.base_offset_xy).abs();
    let z_radius = (coordinates.z - envelope.base_offset_z).abs();
    let radius = (xy_radius.powi(2) + z_radius.powi(2)).sqrt();

    if radius > (envelope.max_radius_xy - envelope.base_offset_xy)
        || coordinates.x < 0.0
        || xy_len <= envelope.min_radius_xy
        || coordinates.z < envelope.cell_z + envelope.z_offset
    {
        tracing::debug!(
            x = coordinates.x,
            y = coordinates.y,
            z = coordinates.z,
            radius,
            "workspace check rejected target"
        );
        return Err(ArmError::OutOfWorkspace {
            x: coordinates.x,
            y: coordinates.y,
            z: coordinates.z,
        });
    }
    Ok(())
}
