//! Wrist-servo kinematics.
//!
//! The wrist servo rotates the end-effector independently of the arm, and
//! the controller uses it to keep a held block's orientation consistent
//! across moves. Two policies exist:
//!
//! * [`WristPolicy::AlignedAxis`] – keep the end-effector aligned with the
//!   user-frame x-axis ([`aligned_wrist_angle`]).
//! * [`WristPolicy::OrientationInvariant`] – keep a held block's world
//!   orientation unchanged relative to where it was picked up
//!   ([`invariant_wrist_angle`]).
//!
//! The policies are alternatives selected at the call site; they are never
//! mixed within one move.
//!
//! The physical servo only reaches a measured sub-range of its nominal
//! `[0, 180]` degrees, so commanded angles pass through the linear
//! [`correct_servo_range`] mapping first. An angle that falls outside
//! `[0, 180]` after correction is a hard [`ArmError::WristOutOfRange`]
//! rejection: clamping would silently rotate the held block.

use crowdarm_types::{ArmError, Coordinates};

/// Sub-range of the nominal `[0, 180]` degrees the installed servo actually
/// reaches, measured on the real arm.
pub const SERVO_RANGE_MEASURED: (f64, f64) = (7.0, 169.0);

/// Neutral wrist angle commanded after homing.
pub const NEUTRAL_WRIST_DEG: f64 = 90.0;

/// Strategy for choosing the wrist angle when the arm moves in the xy-plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WristPolicy {
    /// Keep the end-effector aligned with the user-frame x-axis.
    #[default]
    AlignedAxis,
    /// Keep the held block's world-frame orientation unchanged across the
    /// move.
    OrientationInvariant,
}

/// Linearly map an angle in the nominal `[lower, upper]` servo range onto
/// the logical `[0, 180]` range.
///
/// With `lower = 0` and `upper = 180` this is the identity.
pub fn correct_servo_range(angle_deg: f64, lower: f64, upper: f64) -> f64 {
    (angle_deg - lower) / (upper - lower) * 180.0
}

/// Wrist angle that keeps the end-effector aligned with the user-frame
/// x-axis at the given device-frame target.
///
/// `atan2(y, x)` gives the arm's own rotation towards the target; the servo
/// zero sits 90 degrees off that axis, hence the shift. An angle outside the
/// servo's `[0, 180]` span is first brought back by a ±90-degree branch
/// correction (block faces are fourfold symmetric, so a quarter turn is
/// equivalent), then passed through [`correct_servo_range`] for the
/// measured sub-range.
///
/// # Errors
///
/// [`ArmError::WristOutOfRange`] if the corrected angle still falls outside
/// `[0, 180]`. Checked, never clamped.
pub fn aligned_wrist_angle(device: Coordinates) -> Result<f64, ArmError> {
    let mut aligned = device.y.atan2(device.x).to_degrees() + 90.0;

    if !(0.0..=180.0).contains(&aligned) {
        tracing::debug!(angle_deg = aligned, "wrist angle flipped by a quarter turn");
        if aligned <= 0.0 {
            aligned += 90.0;
        } else {
            aligned -= 90.0;
        }
    }

    let corrected =
        correct_servo_range(aligned, SERVO_RANGE_MEASURED.0, SERVO_RANGE_MEASURED.1);

    if !(0.0..=180.0).contains(&corrected) {
        return Err(ArmError::WristOutOfRange {
            angle_deg: corrected,
        });
    }
    Ok(corrected)
}

/// Wrist angle that keeps a held block's world-frame orientation unchanged
/// when moving from `old` to `new`.
///
/// The block's world orientation at a pose is the arm rotation
/// `alpha = atan2(y, x)` plus the wrist offset, so the new wrist angle must
/// absorb the change in `alpha`:
///
/// ```text
/// new_wrist = -(old_alpha + 90 - old_wrist) + new_alpha + 90
/// ```
///
/// The result is a raw logical angle; the caller applies range checks and
/// servo correction before commanding the servo.
pub fn invariant_wrist_angle(old: Coordinates, old_wrist_deg: f64, new: Coordinates) -> f64 {
    let old_alpha = old.y.atan2(old.x).to_degrees();
    let new_alpha = new.y.atan2(new.x).to_degrees();
    -(old_alpha + 90.0 - old_wrist_deg) + new_alpha + 90.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn full_range_correction_is_identity() {
        for angle in [0.0, 45.0, 90.0, 135.0, 180.0] {
            let corrected = correct_servo_range(angle, 0.0, 180.0);
            assert!(
                (corrected - angle).abs() < TOL,
                "identity broken at {angle}: {corrected}"
            );
        }
    }

    #[test]
    fn measured_range_maps_limits_to_nominal_limits() {
        let (lower, upper) = SERVO_RANGE_MEASURED;
        assert!(correct_servo_range(lower, lower, upper).abs() < TOL);
        assert!((correct_servo_range(upper, lower, upper) - 180.0).abs() < TOL);
    }

    #[test]
    fn aligned_angle_for_forward_target() {
        // atan2(10, 150) ~ 3.81 deg, + 90, then measured-range correction.
        let angle = aligned_wrist_angle(Coordinates::device(150.0, 10.0, 82.0)).unwrap();
        let raw = (10.0f64).atan2(150.0).to_degrees() + 90.0;
        let expected = correct_servo_range(raw, 7.0, 169.0);
        assert!((angle - expected).abs() < TOL);
        assert!((0.0..=180.0).contains(&angle));
    }

    #[test]
    fn out_of_span_angle_is_branch_corrected() {
        // atan2 = 95 deg -> raw 185, outside [0, 180]; a quarter-turn flip
        // brings it to 95, which survives servo correction.
        let y = 95.0f64.to_radians().sin() * 100.0;
        let x = 95.0f64.to_radians().cos() * 100.0;
        let angle = aligned_wrist_angle(Coordinates::device(x, y, 82.0)).unwrap();
        let expected = correct_servo_range(95.0, 7.0, 169.0);
        assert!((angle - expected).abs() < 1e-6, "angle = {angle}");
    }

    #[test]
    fn unreachable_wrist_angle_is_rejected_not_clamped() {
        // atan2(-10, -150) ~ -176 deg -> raw ~ -86, flipped to ~ 3.8, which
        // maps below 0 after the measured-range correction.
        let result = aligned_wrist_angle(Coordinates::device(-150.0, -10.0, 82.0));
        assert!(matches!(result, Err(ArmError::WristOutOfRange { .. })));
    }

    #[test]
    fn invariant_angle_absorbs_the_arm_rotation() {
        // A 90-degree sweep of the arm must be countered one-for-one.
        let old = Coordinates::device(100.0, 0.0, 82.0);
        let new = Coordinates::device(0.0, 100.0, 82.0);
        let new_wrist = invariant_wrist_angle(old, 90.0, new);
        assert!((new_wrist - 180.0).abs() < TOL, "new_wrist = {new_wrist}");
    }

    #[test]
    fn invariant_angle_is_identity_without_rotation() {
        // Moving radially does not change alpha, so the wrist holds still.
        let old = Coordinates::device(100.0, 50.0, 82.0);
        let new = Coordinates::device(200.0, 100.0, 82.0);
        let new_wrist = invariant_wrist_angle(old, 77.0, new);
        assert!((new_wrist - 77.0).abs() < TOL);
    }
}
