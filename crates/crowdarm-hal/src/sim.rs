//! In-process simulated arm driver for CI and headless runs.
//!
//! [`SimArm`] records every primitive it receives and returns plausible
//! kinematic state, so the full crowdarm stack can run without hardware.
//! Tests hold a clone of the shared [`SimState`] to inspect the recorded
//! call sequence and to inject driver faults.

use std::sync::{Arc, Mutex};

use crowdarm_types::ArmError;

use crate::driver::ArmDriver;

/// One recorded driver primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    Home,
    MoveTo { x: f64, y: f64, z: f64 },
    SetJointAngle { joint_id: u8, angle_deg: f64 },
    SetEndEffector { on: bool },
}

/// Shared, inspectable state of a [`SimArm`].
#[derive(Debug, Default)]
pub struct SimState {
    /// Every primitive in arrival order.
    pub calls: Vec<SimCall>,
    /// When set, the next `set_end_effector` fails with an i/o error.
    pub fail_end_effector: bool,
    /// When set, `get_position` fails with `PositionUnreadable`.
    pub fail_position_readback: bool,
}

/// Simulated arm driver. Always succeeds unless a fault flag is set on its
/// [`SimState`].
pub struct SimArm {
    state: Arc<Mutex<SimState>>,
    position: [f64; 3],
}

impl SimArm {
    /// Device-frame position the simulated arm homes to (uArm reset pose).
    pub const HOME_POSITION: [f64; 3] = [200.0, 0.0, 150.0];

    /// Create a simulated arm at the origin, not yet homed.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            position: [0.0, 0.0, 0.0],
        }
    }

    /// Handle onto the shared call log and fault flags.
    pub fn state(&self) -> Arc<Mutex<SimState>> {
        Arc::clone(&self.state)
    }

    fn record(&self, call: SimCall) {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .calls
            .push(call);
    }
}

impl Default for SimArm {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmDriver for SimArm {
    fn home(&mut self) -> Result<(), ArmError> {
        self.position = Self::HOME_POSITION;
        self.record(SimCall::Home);
        Ok(())
    }

    fn move_to(&mut self, x: f64, y: f64, z: f64) -> Result<(), ArmError> {
        self.position = [x, y, z];
        self.record(SimCall::MoveTo { x, y, z });
        Ok(())
    }

    fn set_joint_angle(&mut self, joint_id: u8, angle_deg: f64) -> Result<(), ArmError> {
        self.record(SimCall::SetJointAngle {
            joint_id,
            angle_deg,
        });
        Ok(())
    }

    fn set_end_effector(&mut self, on: bool) -> Result<(), ArmError> {
        let fail = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .fail_end_effector;
        if fail {
            return Err(ArmError::Io("sim: end-effector fault injected".to_string()));
        }
        self.record(SimCall::SetEndEffector { on });
        Ok(())
    }

    fn get_position(&mut self) -> Result<[f64; 3], ArmError> {
        let fail = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .fail_position_readback;
        if fail {
            return Err(ArmError::PositionUnreadable);
        }
        Ok(self.position)
    }
}
