use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coordinate frame tag: the logical lattice meaningful to chat users, or the
/// physical millimetre frame of the arm base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frame {
    /// Integer-indexed lattice the command source reasons in.
    User,
    /// Millimetre coordinates relative to the arm base.
    Device,
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frame::User => write!(f, "user"),
            Frame::Device => write!(f, "device"),
        }
    }
}

/// A 3-vector tagged with the frame it is expressed in.
///
/// Value type: every hand-off between pending and committed state copies it,
/// so there is no shared mutable aliasing. Converting between frames goes
/// through `crowdarm-kinematics`; a conversion into the frame the coordinate
/// is already in is an [`ArmError::AlreadyInFrame`] error, never a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub frame: Frame,
}

impl Coordinates {
    /// Coordinates in the user (lattice) frame.
    pub fn user(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            frame: Frame::User,
        }
    }

    /// Coordinates in the device (millimetre) frame.
    pub fn device(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            frame: Frame::Device,
        }
    }

    /// Copy with a replaced x component.
    pub fn with_x(self, x: f64) -> Self {
        Self { x, ..self }
    }

    /// Copy with a replaced y component.
    pub fn with_y(self, y: f64) -> Self {
        Self { y, ..self }
    }

    /// Copy with a replaced z component.
    pub fn with_z(self, z: f64) -> Self {
        Self { z, ..self }
    }
}

/// The closed set of motion requests the command source may submit.
///
/// The arguments are part of the variant, so two submissions vote for the
/// same outcome exactly when they are `==`. Adding a variant is a breaking
/// schema change by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "function", content = "args", rename_all = "lowercase")]
pub enum FunctionKind {
    /// Move to a new lattice height.
    Height { z: i64 },
    /// Move to a new lattice xy position.
    Position { x: i64, y: i64 },
    /// Pick up or drop the block below the end-effector.
    Hold,
}

impl std::fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionKind::Height { z } => write!(f, "height({z})"),
            FunctionKind::Position { x, y } => write!(f, "position({x}, {y})"),
            FunctionKind::Hold => write!(f, "hold()"),
        }
    }
}

/// One motion request from one submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub function: FunctionKind,
    /// Stable identifier of the chat user who submitted the request.
    pub submitter: String,
}

/// The winning command of one collection window, with its vote count.
///
/// Computed fresh each cycle from the drained buffer; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCommand {
    pub function: FunctionKind,
    pub votes: u32,
}

/// Global error type spanning vote rejections, kinematic rejections,
/// bridge connection faults, and driver faults.
///
/// The first two groups are recoverable and reported back to the command
/// source; connection faults are recoverable at the bridge level;
/// [`ArmError::PositionUnreadable`] is fatal to actuator initialisation.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArmError {
    #[error("submitter '{0}' already has a pending command this round")]
    DuplicateSubmitter(String),

    #[error("no command was submitted this round")]
    NoCommands,

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("bad arguments for '{function}': {details}")]
    ArgumentMismatch { function: String, details: String },

    #[error("coordinates are already in the {0} frame")]
    AlreadyInFrame(Frame),

    #[error("position ({x:.1}, {y:.1}, {z:.1}) is not in the workspace of the arm")]
    OutOfWorkspace { x: f64, y: f64, z: f64 },

    #[error("wrist angle {angle_deg:.1} deg is outside the servo range [0, 180]")]
    WristOutOfRange { angle_deg: f64 },

    #[error("connection failed - timeout")]
    ConnectTimeout,

    #[error("connection failed - address already in use")]
    AddressInUse,

    #[error("i/o error: {0}")]
    Io(String),

    #[error("malformed message: {0}")]
    Decode(String),

    #[error("arm position not readable")]
    PositionUnreadable,

    #[error("arm has not been homed")]
    NotHomed,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for ArmError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::AddrInUse => ArmError::AddressInUse,
            std::io::ErrorKind::TimedOut => ArmError::ConnectTimeout,
            _ => ArmError::Io(e.to_string()),
        }
    }
}
