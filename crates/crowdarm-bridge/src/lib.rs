//! TCP bridge exposing the arm to external tooling.
//!
//! * [`codec`] – splits the raw byte stream into balanced-brace JSON frames.
//! * [`message`] – validates each frame against the closed operation
//!   allow-list and produces a typed [`BridgeCommand`].
//! * [`server`] – the serial accept/serve loop executing commands against a
//!   shared [`UserFrameController`].
//!
//! [`BridgeCommand`]: message::BridgeCommand
//! [`UserFrameController`]: crowdarm_hal::UserFrameController

pub mod codec;
pub mod message;
pub mod server;

pub use codec::FrameDecoder;
pub use message::{BridgeCommand, BridgeRequest, WIRE_VERSION, parse_request};
pub use server::{BridgeServer, DEFAULT_ACCEPT_TIMEOUT, DEFAULT_BIND_RETRY};
