//! Hardware abstraction for the crowdarm pipeline.
//!
//! * [`driver`] – the [`ArmDriver`] trait, the seam between crowdarm and the
//!   vendor SDK that executes primitive motions.
//! * [`sim`] – an in-process recording driver so the full stack runs in
//!   headless tests and CI without hardware.
//! * [`facade`] – [`ArmFacade`], the single source of truth for the arm's
//!   logical pose, wrapping the driver in a small state machine.
//! * [`controller`] – [`UserFrameController`], the user-frame operations
//!   (`height`, `position`, `hold`) built from the facade plus the
//!   kinematics layer.

pub mod controller;
pub mod driver;
pub mod facade;
pub mod sim;

pub use controller::UserFrameController;
pub use driver::{ArmDriver, WRIST_JOINT_ID};
pub use facade::{ActuatorPose, ArmFacade, ArmState};
pub use sim::{SimArm, SimCall, SimState};
