//! The [`ArmDriver`] trait: crowdarm's seam towards the vendor motion SDK.
//!
//! The rest of the system only ever talks to this trait, so the physical
//! driver can be swapped for [`SimArm`][crate::sim::SimArm] in tests and
//! headless runs without touching control logic. There is no wire protocol
//! on this side; the driver is an in-process capability.

use crowdarm_types::ArmError;

/// Joint id of the wrist servo on the arm.
pub const WRIST_JOINT_ID: u8 = 3;

/// Primitive motion capability of the physical arm.
///
/// All calls block until the primitive has been flushed to the device.
/// Implementations report failures as [`ArmError::Io`]-class errors, except
/// [`ArmDriver::get_position`], which uses
/// [`ArmError::PositionUnreadable`] when the device returns no valid
/// 3-vector.
pub trait ArmDriver: Send {
    /// Move the arm to its home position.
    fn home(&mut self) -> Result<(), ArmError>;

    /// Move the end-effector to `(x, y, z)` in device-frame millimetres.
    fn move_to(&mut self, x: f64, y: f64, z: f64) -> Result<(), ArmError>;

    /// Set a joint servo to an absolute angle in degrees.
    fn set_joint_angle(&mut self, joint_id: u8, angle_deg: f64) -> Result<(), ArmError>;

    /// Switch the end-effector (suction pump) on or off.
    fn set_end_effector(&mut self, on: bool) -> Result<(), ArmError>;

    /// Read back the current device-frame position.
    fn get_position(&mut self) -> Result<[f64; 3], ArmError>;
}
