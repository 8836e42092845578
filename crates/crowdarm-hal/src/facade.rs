//! [`ArmFacade`] – owner of the arm's logical pose and the only caller of
//! the driver.
//!
//! # State machine
//!
//! ```text
//! Uninitialized --home()--> Ready
//! ```
//!
//! Motion methods require `Ready` and fail with [`ArmError::NotHomed`]
//! otherwise. `home()` is the only operation that reads position back from
//! the device; every other motion updates the local [`ActuatorPose`]
//! optimistically after the primitive returns. That is a deliberate latency
//! trade-off inherited from the original controller: if the hardware
//! silently drops a primitive, the logical pose drifts until the next
//! `home()`.
//!
//! The compound [`ArmFacade::hold`] sequence must not interleave with other
//! motion; the dispatch path that calls into this facade is strictly serial
//! (one motion in flight at any time).

use std::time::Duration;

use crowdarm_kinematics::wrist::NEUTRAL_WRIST_DEG;
use crowdarm_types::{ArmError, Coordinates};
use tracing::{debug, info};

use crate::driver::{ArmDriver, WRIST_JOINT_ID};

/// Lifecycle state of the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    /// No valid pose is known; motion commands are refused.
    Uninitialized,
    /// Homed, pose known, accepting motion commands.
    Ready,
}

/// The arm's logical state: device-frame position, wrist angle, and whether
/// the end-effector currently holds a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorPose {
    /// Device-frame position of the end-effector.
    pub position: Coordinates,
    /// Last commanded wrist servo angle in degrees.
    pub wrist_angle_deg: f64,
    /// True while the end-effector holds a block.
    pub held: bool,
}

/// Wraps an [`ArmDriver`] with pose tracking and the
/// `Uninitialized → Ready` lifecycle.
pub struct ArmFacade<D: ArmDriver> {
    driver: D,
    state: ArmState,
    pose: ActuatorPose,
}

impl<D: ArmDriver> ArmFacade<D> {
    /// Wrap a driver; the facade starts `Uninitialized` until [`home`] runs.
    ///
    /// [`home`]: ArmFacade::home
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            state: ArmState::Uninitialized,
            pose: ActuatorPose {
                position: Coordinates::device(0.0, 0.0, 0.0),
                wrist_angle_deg: 0.0,
                held: false,
            },
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ArmState {
        self.state
    }

    /// Current logical pose.
    pub fn pose(&self) -> &ActuatorPose {
        &self.pose
    }

    fn ensure_ready(&self) -> Result<(), ArmError> {
        match self.state {
            ArmState::Ready => Ok(()),
            ArmState::Uninitialized => Err(ArmError::NotHomed),
        }
    }

    /// Home the arm and establish a trusted pose.
    ///
    /// Runs the driver's homing primitive, reads the resulting position
    /// back, and sets the wrist to its neutral angle.
    ///
    /// # Errors
    ///
    /// [`ArmError::PositionUnreadable`] if the readback fails; the facade
    /// then stays (or reverts to) `Uninitialized` — no safe default pose
    /// can be assumed, so this is fatal to initialisation.
    pub fn home(&mut self) -> Result<(), ArmError> {
        self.state = ArmState::Uninitialized;
        self.driver.home()?;
        let position = self.driver.get_position()?;
        self.pose.position = Coordinates::device(position[0], position[1], position[2]);

        self.driver
            .set_joint_angle(WRIST_JOINT_ID, NEUTRAL_WRIST_DEG)?;
        self.pose.wrist_angle_deg = NEUTRAL_WRIST_DEG;

        self.state = ArmState::Ready;
        info!(
            x = self.pose.position.x,
            y = self.pose.position.y,
            z = self.pose.position.z,
            "arm homed"
        );
        Ok(())
    }

    /// Move to a new device-frame height, keeping x and y.
    pub fn move_height(&mut self, z: f64) -> Result<(), ArmError> {
        self.ensure_ready()?;
        let p = self.pose.position;
        self.driver.move_to(p.x, p.y, z)?;
        self.pose.position.z = z;
        Ok(())
    }

    /// Move to a new device-frame xy position, keeping the height.
    pub fn move_position(&mut self, x: f64, y: f64) -> Result<(), ArmError> {
        self.ensure_ready()?;
        let z = self.pose.position.z;
        self.driver.move_to(x, y, z)?;
        self.pose.position.x = x;
        self.pose.position.y = y;
        Ok(())
    }

    /// Move to a full device-frame target.
    pub fn move_to(&mut self, x: f64, y: f64, z: f64) -> Result<(), ArmError> {
        self.ensure_ready()?;
        self.driver.move_to(x, y, z)?;
        self.pose.position = Coordinates::device(x, y, z);
        Ok(())
    }

    /// Rotate the wrist servo to an absolute angle.
    ///
    /// The angle must already be in servo space (the kinematics layer owns
    /// range correction); anything outside the joint limit `[0, 180]` is
    /// refused here as a last line of defence before the hardware.
    ///
    /// # Errors
    ///
    /// [`ArmError::WristOutOfRange`] outside `[0, 180]`.
    pub fn rotate_wrist(&mut self, angle_deg: f64) -> Result<(), ArmError> {
        self.ensure_ready()?;
        if !(0.0..=180.0).contains(&angle_deg) {
            return Err(ArmError::WristOutOfRange { angle_deg });
        }
        self.driver.set_joint_angle(WRIST_JOINT_ID, angle_deg)?;
        self.pose.wrist_angle_deg = angle_deg;
        Ok(())
    }

    /// Switch the end-effector pump to an explicit state.
    pub fn set_pump(&mut self, on: bool) -> Result<(), ArmError> {
        self.ensure_ready()?;
        self.driver.set_end_effector(on)?;
        self.pose.held = on;
        Ok(())
    }

    /// Switch the end-effector pump to the opposite state.
    pub fn toggle_pump(&mut self) -> Result<(), ArmError> {
        let next = !self.pose.held;
        self.set_pump(next)
    }

    /// Pick up or drop the block directly below the end-effector.
    ///
    /// Lowers by `lower_by` millimetres, toggles the pump, waits `settle`
    /// for the suction to take or release, and raises back to the pre-hold
    /// height. `held` flips only once the whole sequence has completed; a
    /// driver failure mid-sequence leaves `held` at its previous value and
    /// propagates the error (the physical pump state may then disagree —
    /// there is no hardware confirmation to reconcile against).
    pub async fn hold(&mut self, lower_by: f64, settle: Duration) -> Result<(), ArmError> {
        self.ensure_ready()?;
        let z_before = self.pose.position.z;
        debug!(z_before, lower_by, "hold sequence start");

        self.move_height(z_before - lower_by)?;
        tokio::time::sleep(settle).await;

        self.driver.set_end_effector(!self.pose.held)?;
        tokio::time::sleep(settle).await;

        self.move_height(z_before)?;
        self.pose.held = !self.pose.held;
        info!(held = self.pose.held, "hold sequence complete");
        Ok(())
    }
}
