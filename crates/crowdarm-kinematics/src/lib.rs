//! Coordinate transforms and kinematic safety checks for the crowdarm
//! pipeline.
//!
//! Everything in this crate is pure math over [`Coordinates`] values and the
//! static [`WorkspaceEnvelope`] loaded at startup:
//!
//! * [`envelope`] – the workspace geometry constants and the reachability
//!   predicate that guards every device-frame target.
//! * [`transform`] – the user-lattice ↔ device-millimetre frame mapping.
//! * [`wrist`] – wrist-servo kinematics: axis alignment, orientation-invariant
//!   deltas, and the linear correction for the measured servo sub-range.
//!
//! No function here touches hardware; rejection happens strictly before any
//! driver call.

pub mod envelope;
pub mod transform;
pub mod wrist;

pub use envelope::{WorkspaceEnvelope, check_workspace};
pub use transform::FrameTransformer;
pub use wrist::{SERVO_RANGE_MEASURED, WristPolicy, correct_servo_range};
