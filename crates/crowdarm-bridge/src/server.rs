//! TCP front door for the arm.
//!
//! The bridge accepts one client at a time and executes its requests
//! serially; the arm is a single physical resource and interleaving motion
//! from several sockets would corrupt the pose. A client leaves by sending
//! the `{"disconnect": true}` sentinel (or by closing the socket), after
//! which the server goes straight back to `accept` on the same listener.
//!
//! Binding retries on `AddrInUse` instead of failing: after an unclean
//! shutdown the previous socket can linger in `TIME_WAIT`, and the
//! operator-facing behaviour should be "comes up once the port frees", not
//! a crash loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crowdarm_hal::{ArmDriver, UserFrameController, WRIST_JOINT_ID};
use crowdarm_types::ArmError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::codec::FrameDecoder;
use crate::message::{parse_request, BridgeCommand, BridgeRequest};

/// How long one `accept` waits before logging and retrying.
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between bind attempts while the port is still occupied.
pub const DEFAULT_BIND_RETRY: Duration = Duration::from_secs(2);

/// Serial TCP server executing [`BridgeCommand`]s against the controller.
pub struct BridgeServer<D: ArmDriver> {
    controller: Arc<Mutex<UserFrameController<D>>>,
    accept_timeout: Duration,
    bind_retry: Duration,
}

impl<D: ArmDriver> BridgeServer<D> {
    /// Build a server over a shared controller.
    pub fn new(controller: Arc<Mutex<UserFrameController<D>>>) -> Self {
        Self {
            controller,
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
            bind_retry: DEFAULT_BIND_RETRY,
        }
    }

    /// Override the accept timeout.
    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }

    /// Override the bind-retry pause.
    pub fn with_bind_retry(mut self, retry: Duration) -> Self {
        self.bind_retry = retry;
        self
    }

    /// Bind `addr` and serve clients until cancelled.
    ///
    /// # Errors
    ///
    /// Any bind failure other than [`ArmError::AddressInUse`] is fatal and
    /// returned; `AddrInUse` is retried forever.
    pub async fn run(self, addr: SocketAddr) -> Result<(), ArmError> {
        let listener = loop {
            match TcpListener::bind(addr).await {
                Ok(listener) => break listener,
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                    warn!(%addr, retry_in = ?self.bind_retry, "address in use, retrying bind");
                    tokio::time::sleep(self.bind_retry).await;
                }
                Err(e) => return Err(e.into()),
            }
        };
        info!(%addr, "bridge listening");

        loop {
            match tokio::time::timeout(self.accept_timeout, listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    info!(%peer, "client connected");
                    if let Err(e) = self.serve_stream(stream).await {
                        warn!(%peer, error = %e, "client session ended with error");
                    }
                    info!(%peer, "client disconnected");
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "accept failed");
                }
                Err(_) => {
                    warn!(timeout = ?self.accept_timeout, "no client connected within timeout");
                }
            }
        }
    }

    /// Serve one client over any byte stream.
    ///
    /// Runs until the disconnect sentinel, end of stream, or a framing
    /// error. Request-level failures (unknown function, bad arguments,
    /// rejected motion) are reported to the client as `ERR` lines and do
    /// not end the session.
    pub async fn serve_stream<S>(&self, mut stream: S) -> Result<(), ArmError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut decoder = FrameDecoder::new();
        let mut read_buf = [0u8; 4096];

        loop {
            while let Some(frame) = decoder.next_frame()? {
                let status = match parse_request(&frame) {
                    Ok(BridgeRequest::Disconnect) => {
                        stream.write_all(b"OK bye\n").await?;
                        return Ok(());
                    }
                    Ok(BridgeRequest::Invoke(command)) => {
                        match self.dispatch(command).await {
                            Ok(status) => status,
                            Err(e) => format!("ERR: {e}"),
                        }
                    }
                    Err(e) => format!("ERR: {e}"),
                };
                stream.write_all(status.as_bytes()).await?;
                stream.write_all(b"\n").await?;
            }

            let n = stream.read(&mut read_buf).await?;
            if n == 0 {
                if decoder.has_partial() {
                    return Err(ArmError::Decode(
                        "connection closed mid-frame".to_string(),
                    ));
                }
                return Ok(());
            }
            decoder.feed(&read_buf[..n]);
        }
    }

    async fn dispatch(&self, command: BridgeCommand) -> Result<String, ArmError> {
        let mut controller = self.controller.lock().await;
        match command {
            BridgeCommand::Home => {
                controller.home()?;
                Ok("OK".to_string())
            }
            BridgeCommand::MoveTo { x, y, z } => {
                controller.move_device(x, y, z)?;
                Ok("OK".to_string())
            }
            BridgeCommand::SetJointAngle { joint_id, angle_deg } => {
                if joint_id != WRIST_JOINT_ID {
                    return Err(ArmError::ArgumentMismatch {
                        function: "set_joint_angle".to_string(),
                        details: format!(
                            "only the wrist joint ({WRIST_JOINT_ID}) may be commanded directly"
                        ),
                    });
                }
                controller.set_wrist(angle_deg)?;
                Ok("OK".to_string())
            }
            BridgeCommand::SetEndEffector { on } => {
                controller.set_pump(on)?;
                Ok("OK".to_string())
            }
            BridgeCommand::GetPosition => {
                let p = controller.pose().position;
                Ok(format!("OK [{}, {}, {}]", p.x, p.y, p.z))
            }
            BridgeCommand::Height { z } => {
                controller.height(z as f64)?;
                Ok("OK".to_string())
            }
            BridgeCommand::Position { x, y } => {
                controller.position(x as f64, y as f64)?;
                Ok("OK".to_string())
            }
            BridgeCommand::Hold => {
                controller.hold().await?;
                Ok("OK".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowdarm_hal::SimArm;
    use crowdarm_kinematics::{wrist::WristPolicy, WorkspaceEnvelope};
    use tokio::io::duplex;

    fn make_server() -> BridgeServer<SimArm> {
        let controller = UserFrameController::new(
            WorkspaceEnvelope::default(),
            SimArm::new(),
            WristPolicy::AlignedAxis,
        )
        .with_hold_settle(Duration::ZERO);
        BridgeServer::new(Arc::new(Mutex::new(controller)))
    }

    /// Drive a scripted client against `serve_stream` and return the full
    /// response text.
    async fn exchange(server: &BridgeServer<SimArm>, script: &[u8]) -> String {
        let (mut client, service) = duplex(4096);
        let serve = server.serve_stream(service);
        let talk = async {
            client.write_all(script).await.unwrap();
            let mut out = Vec::new();
            client.read_to_end(&mut out).await.unwrap();
            String::from_utf8(out).unwrap()
        };
        let (served, responses) = tokio::join!(serve, talk);
        served.unwrap();
        responses
    }

    #[tokio::test]
    async fn session_runs_until_the_disconnect_sentinel() {
        let server = make_server();
        let script = concat!(
            r#"{"function":"home","args":[]}"#,
            r#"{"function":"position","args":[2,5]}"#,
            r#"{"disconnect":true}"#
        );
        let responses = exchange(&server, script.as_bytes()).await;
        assert_eq!(responses, "OK\nOK\nOK bye\n");
    }

    #[tokio::test]
    async fn concatenated_frames_in_one_read_are_all_answered() {
        let server = make_server();
        let script = concat!(
            r#"{"function":"home","args":[]}"#,
            r#"{"function":"height","args":[20]}"#,
            r#"{"function":"get_position","args":[]}"#,
            r#"{"disconnect":true}"#
        );
        let responses = exchange(&server, script.as_bytes()).await;
        let lines: Vec<&str> = responses.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "OK");
        assert_eq!(lines[1], "OK");
        assert!(lines[2].starts_with("OK ["));
        assert_eq!(lines[3], "OK bye");
    }

    #[tokio::test]
    async fn request_errors_do_not_end_the_session() {
        let server = make_server();
        let script = concat!(
            r#"{"function":"teleport","args":[]}"#,
            r#"{"function":"home","args":[]}"#,
            r#"{"disconnect":true}"#
        );
        let responses = exchange(&server, script.as_bytes()).await;
        let lines: Vec<&str> = responses.lines().collect();
        assert!(lines[0].starts_with("ERR:"));
        assert_eq!(lines[1], "OK");
        assert_eq!(lines[2], "OK bye");
    }

    #[tokio::test]
    async fn motion_before_home_is_refused_but_survivable() {
        let server = make_server();
        let script = concat!(
            r#"{"function":"height","args":[20]}"#,
            r#"{"disconnect":true}"#
        );
        let responses = exchange(&server, script.as_bytes()).await;
        let lines: Vec<&str> = responses.lines().collect();
        assert!(lines[0].starts_with("ERR:"), "got {:?}", lines[0]);
        assert_eq!(lines[1], "OK bye");
    }

    #[tokio::test]
    async fn only_the_wrist_joint_may_be_commanded() {
        let server = make_server();
        let script = concat!(
            r#"{"function":"home","args":[]}"#,
            r#"{"function":"set_joint_angle","args":[1, 45.0]}"#,
            r#"{"function":"set_joint_angle","args":[3, 45.0]}"#,
            r#"{"disconnect":true}"#
        );
        let responses = exchange(&server, script.as_bytes()).await;
        let lines: Vec<&str> = responses.lines().collect();
        assert_eq!(lines[0], "OK");
        assert!(lines[1].starts_with("ERR:"));
        assert_eq!(lines[2], "OK");
    }

    #[tokio::test]
    async fn out_of_workspace_move_to_is_rejected() {
        let server = make_server();
        let script = concat!(
            r#"{"function":"home","args":[]}"#,
            r#"{"function":"move_to","args":[1000.0, 0.0, 100.0]}"#,
            r#"{"disconnect":true}"#
        );
        let responses = exchange(&server, script.as_bytes()).await;
        let lines: Vec<&str> = responses.lines().collect();
        assert_eq!(lines[0], "OK");
        assert!(lines[1].starts_with("ERR:"));
    }

    #[tokio::test]
    async fn clean_eof_without_sentinel_ends_the_session_ok() {
        let server = make_server();
        let (mut client, service) = duplex(4096);
        let serve = server.serve_stream(service);
        let talk = async {
            client
                .write_all(br#"{"function":"home","args":[]}"#)
                .await
                .unwrap();
            // half-close: read the answer then drop the writer
            let mut buf = [0u8; 64];
            let n = client.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"OK\n");
            drop(client);
        };
        let (served, ()) = tokio::join!(serve, talk);
        served.unwrap();
    }

    #[tokio::test]
    async fn eof_mid_frame_is_a_decode_error() {
        let server = make_server();
        let (mut client, service) = duplex(4096);
        let serve = server.serve_stream(service);
        let talk = async {
            client.write_all(br#"{"function":"ho"#).await.unwrap();
            drop(client);
        };
        let (served, ()) = tokio::join!(serve, talk);
        assert!(matches!(served, Err(ArmError::Decode(_))));
    }
}
