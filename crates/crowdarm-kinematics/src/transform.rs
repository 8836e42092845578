//! User-lattice ↔ device-millimetre frame mapping.
//!
//! The user frame is a lattice of cells; a user coordinate addresses a cell
//! index, and its device-frame image is the *centre* of that cell, hence the
//! `+ 0.5` in the forward mapping:
//!
//! ```text
//! device = (user + 0.5) * cell_size + offset
//! ```
//!
//! `z` uses its own cell size because the blocks interlock vertically.
//! Every transform result in the device frame is passed through
//! [`check_workspace`] before being returned, so downstream code never sees
//! an unreachable target.

use crowdarm_types::{ArmError, Coordinates, Frame};

use crate::envelope::{WorkspaceEnvelope, check_workspace};

/// Converts [`Coordinates`] between the user and device frames, guarded by
/// the workspace envelope.
#[derive(Debug, Clone, Copy)]
pub struct FrameTransformer {
    envelope: WorkspaceEnvelope,
}

impl FrameTransformer {
    /// Build a transformer over a validated envelope.
    pub fn new(envelope: WorkspaceEnvelope) -> Self {
        Self { envelope }
    }

    /// The envelope this transformer validates against.
    pub fn envelope(&self) -> &WorkspaceEnvelope {
        &self.envelope
    }

    /// Map a user-frame coordinate onto the centre of its device-frame cell.
    ///
    /// # Errors
    ///
    /// * [`ArmError::AlreadyInFrame`] if the input is already device-frame.
    ///   Callers must branch explicitly rather than rely on a no-op.
    /// * [`ArmError::OutOfWorkspace`] if the mapped target is unreachable;
    ///   nothing is clamped.
    pub fn to_device(&self, user: Coordinates) -> Result<Coordinates, ArmError> {
        if user.frame == Frame::Device {
            return Err(ArmError::AlreadyInFrame(Frame::Device));
        }
        let device = Coordinates::device(
            (user.x + 0.5) * self.envelope.cell_xy + self.envelope.x_offset,
            (user.y + 0.5) * self.envelope.cell_xy + self.envelope.y_offset,
            (user.z + 0.5) * self.envelope.cell_z + self.envelope.z_offset,
        );
        check_workspace(&self.envelope, device)?;
        Ok(device)
    }

    /// Inverse mapping: device-frame millimetres back to user-frame cell
    /// coordinates.
    ///
    /// The *input* is workspace-checked: an unreachable device coordinate
    /// has no meaningful user-frame image.
    ///
    /// # Errors
    ///
    /// * [`ArmError::AlreadyInFrame`] if the input is already user-frame.
    /// * [`ArmError::OutOfWorkspace`] if the input lies outside the envelope.
    pub fn to_user(&self, device: Coordinates) -> Result<Coordinates, ArmError> {
        if device.frame == Frame::User {
            return Err(ArmError::AlreadyInFrame(Frame::User));
        }
        check_workspace(&self.envelope, device)?;
        Ok(Coordinates::user(
            (device.x - self.envelope.x_offset) / self.envelope.cell_xy - 0.5,
            (device.y - self.envelope.y_offset) / self.envelope.cell_xy - 0.5,
            (device.z - self.envelope.z_offset) / self.envelope.cell_z - 0.5,
        ))
    }
}
