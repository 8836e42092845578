//! [`UserFrameController`] – the user-frame operations behind the voting
//! pipeline.
//!
//! Composes the [`FrameTransformer`] (lattice → millimetres, workspace
//! guarded) with the [`ArmFacade`] (pose + driver) and a [`WristPolicy`].
//! Every operation validates its full target — frame transform, workspace
//! envelope, wrist range — strictly *before* the first driver call, so a
//! rejected command leaves both the logical pose and the physical arm
//! untouched.

use std::time::Duration;

use crowdarm_kinematics::envelope::WorkspaceEnvelope;
use crowdarm_kinematics::transform::FrameTransformer;
use crowdarm_kinematics::wrist::{self, WristPolicy};
use crowdarm_types::{ArmError, Coordinates, FunctionKind};
use tracing::info;

use crate::driver::ArmDriver;
use crate::facade::{ActuatorPose, ArmFacade};

/// Pause between the primitives of the hold sequence, giving the suction
/// time to take or release.
const DEFAULT_HOLD_SETTLE: Duration = Duration::from_millis(500);

/// User-frame motion controller over an [`ArmFacade`].
pub struct UserFrameController<D: ArmDriver> {
    transformer: FrameTransformer,
    facade: ArmFacade<D>,
    policy: WristPolicy,
    /// Current user-frame coordinates; trusted once `home` has run.
    current: Coordinates,
    hold_settle: Duration,
}

impl<D: ArmDriver> UserFrameController<D> {
    /// Build a controller over `driver` with the given envelope and wrist
    /// policy. The controller is unusable until [`home`] has run.
    ///
    /// [`home`]: UserFrameController::home
    pub fn new(envelope: WorkspaceEnvelope, driver: D, policy: WristPolicy) -> Self {
        Self {
            transformer: FrameTransformer::new(envelope),
            facade: ArmFacade::new(driver),
            policy,
            current: Coordinates::user(0.0, 0.0, 0.0),
            hold_settle: DEFAULT_HOLD_SETTLE,
        }
    }

    /// Replace the hold settle pause (tests use [`Duration::ZERO`]).
    pub fn with_hold_settle(mut self, settle: Duration) -> Self {
        self.hold_settle = settle;
        self
    }

    /// Current user-frame coordinates.
    pub fn current(&self) -> Coordinates {
        self.current
    }

    /// The facade's logical pose.
    pub fn pose(&self) -> &ActuatorPose {
        self.facade.pose()
    }

    /// Home the arm and derive the current user-frame cell from the homed
    /// device position.
    ///
    /// # Errors
    ///
    /// [`ArmError::PositionUnreadable`] if the post-home readback fails
    /// (fatal to initialisation), or [`ArmError::OutOfWorkspace`] if the
    /// homed position lies outside the configured envelope.
    pub fn home(&mut self) -> Result<(), ArmError> {
        self.facade.home()?;
        self.current = self.transformer.to_user(self.facade.pose().position)?;
        Ok(())
    }

    /// Move to the configured start cell: xy first, then height.
    pub fn move_to_start(&mut self, x: f64, y: f64, z: f64) -> Result<(), ArmError> {
        self.position(x, y)?;
        self.height(z)?;
        info!(x, y, z, "arm at start cell");
        Ok(())
    }

    /// Move to a new lattice height.
    pub fn height(&mut self, z_user: f64) -> Result<(), ArmError> {
        let new_user = self.current.with_z(z_user);
        let new_device = self.transformer.to_device(new_user)?;
        self.facade.move_height(new_device.z)?;
        self.current = new_user;
        Ok(())
    }

    /// Move to a new lattice xy position, re-aiming the wrist so the held
    /// block's orientation follows the configured [`WristPolicy`].
    pub fn position(&mut self, x_user: f64, y_user: f64) -> Result<(), ArmError> {
        let new_user = self.current.with_x(x_user).with_y(y_user);
        let new_device = self.transformer.to_device(new_user)?;

        // Resolve the wrist angle before any motion so a wrist rejection
        // cannot leave the arm half-moved.
        let wrist_deg = match self.policy {
            WristPolicy::AlignedAxis => wrist::aligned_wrist_angle(new_device)?,
            WristPolicy::OrientationInvariant => {
                let raw = wrist::invariant_wrist_angle(
                    self.facade.pose().position,
                    self.facade.pose().wrist_angle_deg,
                    new_device,
                );
                if !(0.0..=180.0).contains(&raw) {
                    return Err(ArmError::WristOutOfRange { angle_deg: raw });
                }
                raw
            }
        };

        self.facade.move_position(new_device.x, new_device.y)?;
        self.facade.rotate_wrist(wrist_deg)?;
        self.current = new_user;
        Ok(())
    }

    /// Pick up or drop the block below the end-effector: lower by half a
    /// cell height, toggle the pump, raise back.
    pub async fn hold(&mut self) -> Result<(), ArmError> {
        let lower_by = 0.5 * self.transformer.envelope().cell_z;
        self.facade.hold(lower_by, self.hold_settle).await
    }

    /// Direct device-frame move (bridge primitive), workspace-guarded like
    /// every other target; the current lattice cell is re-derived from the
    /// new position.
    pub fn move_device(&mut self, x: f64, y: f64, z: f64) -> Result<(), ArmError> {
        let target = Coordinates::device(x, y, z);
        crowdarm_kinematics::check_workspace(self.transformer.envelope(), target)?;
        self.facade.move_to(x, y, z)?;
        self.current = self.transformer.to_user(target)?;
        Ok(())
    }

    /// Command the wrist servo directly (bridge primitive).
    pub fn set_wrist(&mut self, angle_deg: f64) -> Result<(), ArmError> {
        self.facade.rotate_wrist(angle_deg)
    }

    /// Switch the end-effector pump directly (bridge primitive).
    pub fn set_pump(&mut self, on: bool) -> Result<(), ArmError> {
        self.facade.set_pump(on)
    }

    /// Execute one winning command.
    pub async fn execute(&mut self, function: FunctionKind) -> Result<(), ArmError> {
        match function {
            FunctionKind::Height { z } => self.height(z as f64),
            FunctionKind::Position { x, y } => self.position(x as f64, y as f64),
            FunctionKind::Hold => self.hold().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimArm, SimState};
    use std::sync::{Arc, Mutex};

    fn homed_controller(policy: WristPolicy) -> (UserFrameController<SimArm>, Arc<Mutex<SimState>>) {
        let arm = SimArm::new();
        let state = arm.state();
        let mut controller =
            UserFrameController::new(WorkspaceEnvelope::default(), arm, policy)
                .with_hold_settle(Duration::ZERO);
        controller.home().unwrap();
        (controller, state)
    }

    #[test]
    fn home_derives_the_current_cell_from_the_readback() {
        let (controller, _) = homed_controller(WristPolicy::AlignedAxis);
        // Home pose (200, 0, 150) maps back through the default envelope.
        let cell = controller.current();
        assert!((cell.x - (200.0 / 60.0 - 0.5)).abs() < 1e-9);
        assert!((cell.y - (320.0 / 60.0 - 0.5)).abs() < 1e-9);
        assert!((cell.z - 37.0).abs() < 1e-9);
    }

    #[test]
    fn position_moves_and_re_aims_the_wrist() {
        let (mut controller, state) = homed_controller(WristPolicy::AlignedAxis);

        controller.position(2.0, 5.0).unwrap();

        let pose = controller.pose();
        assert!((pose.position.x - 150.0).abs() < 1e-9);
        assert!((pose.position.y - 10.0).abs() < 1e-9);

        // The wrist was re-aimed after the move.
        let expected =
            wrist::aligned_wrist_angle(Coordinates::device(150.0, 10.0, 150.0)).unwrap();
        assert!((pose.wrist_angle_deg - expected).abs() < 1e-9);

        let cell = controller.current();
        assert!((cell.x - 2.0).abs() < 1e-9);
        assert!((cell.y - 5.0).abs() < 1e-9);

        // Motion happened: move_to then wrist servo.
        let calls = state.lock().unwrap().calls.len();
        assert!(calls >= 4, "home(2) + move + wrist, got {calls}");
    }

    #[test]
    fn rejected_position_leaves_arm_and_cell_untouched() {
        let (mut controller, state) = homed_controller(WristPolicy::AlignedAxis);
        controller.move_to_start(2.0, 5.0, 20.0).unwrap();
        let calls_before = state.lock().unwrap().calls.len();
        let cell_before = controller.current();
        let pose_before = *controller.pose();

        let result = controller.position(10.0, 5.0);
        assert!(matches!(result, Err(ArmError::OutOfWorkspace { .. })));

        assert_eq!(controller.current(), cell_before);
        assert_eq!(*controller.pose(), pose_before);
        assert_eq!(
            state.lock().unwrap().calls.len(),
            calls_before,
            "no driver primitive may run for a rejected target"
        );
    }

    #[test]
    fn invariant_policy_counters_the_arm_rotation() {
        let (mut controller, _) = homed_controller(WristPolicy::OrientationInvariant);
        controller.move_to_start(2.0, 5.0, 20.0).unwrap();
        let old_pose = *controller.pose();

        controller.position(2.0, 6.0).unwrap();

        let new_device = Coordinates::device(150.0, 70.0, 82.0);
        let expected = wrist::invariant_wrist_angle(
            old_pose.position,
            old_pose.wrist_angle_deg,
            new_device,
        );
        assert!((controller.pose().wrist_angle_deg - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn execute_routes_the_winning_command() {
        let (mut controller, _) = homed_controller(WristPolicy::AlignedAxis);
        controller.move_to_start(2.0, 5.0, 20.0).unwrap();

        controller
            .execute(FunctionKind::Height { z: 15 })
            .await
            .unwrap();
        assert!((controller.current().z - 15.0).abs() < 1e-9);

        controller.execute(FunctionKind::Hold).await.unwrap();
        assert!(controller.pose().held);

        controller
            .execute(FunctionKind::Position { x: 2, y: 6 })
            .await
            .unwrap();
        assert!((controller.current().y - 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn hold_restores_the_lattice_height() {
        let (mut controller, _) = homed_controller(WristPolicy::AlignedAxis);
        controller.move_to_start(2.0, 5.0, 20.0).unwrap();
        let z_before = controller.pose().position.z;

        controller.hold().await.unwrap();

        assert!((controller.pose().position.z - z_before).abs() < 1e-9);
        assert!(controller.pose().held);
    }
}
