//! The voting control loop: collect, elect, execute, report.
//!
//! Each cycle sleeps through one collection window while chat submissions
//! accumulate in the shared [`CommandBuffer`], then drains the buffer,
//! elects a winner by majority vote, and executes it through the
//! [`UserFrameController`]. Every outcome — winner elected, empty round,
//! target rejected by the kinematics — is pushed to the status channel so
//! the chat front-end can echo it back to the audience.
//!
//! # Error policy
//!
//! User mistakes are round outcomes, not faults: an out-of-workspace target
//! or an empty window is reported and the loop moves on. Only hardware
//! faults (a failed position readback, a dead driver link) unwind out of
//! [`ControlLoop::run`], because the logical pose can no longer be trusted.

use std::sync::Arc;
use std::time::Duration;

use crowdarm_hal::{ArmDriver, UserFrameController};
use crowdarm_types::{ArmError, Command};
use crowdarm_vote::{CommandBuffer, select_winner};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

/// Default collection window; observed practice runs 5–30 s.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Cloneable front-end handle: submits one command and reports the
/// acceptance verdict as a chat-ready string.
#[derive(Clone)]
pub struct CommandSubmitter {
    buffer: CommandBuffer,
    status_tx: mpsc::UnboundedSender<String>,
}

impl CommandSubmitter {
    /// Queue `command` for the current window.
    ///
    /// Returns the status string that was also pushed to the status
    /// channel, so callers replying in-line don't need to subscribe.
    pub fn submit(&self, command: Command) -> String {
        let status = match self.buffer.submit(command.clone()) {
            Ok(()) => format!(
                "Command {} added to the queue by {}.",
                command.function, command.submitter
            ),
            Err(ArmError::DuplicateSubmitter(submitter)) => {
                format!("Only one command per round, {submitter}.")
            }
            Err(e) => format!("ERR: {e}"),
        };
        let _ = self.status_tx.send(status.clone());
        status
    }
}

/// Drives the window → drain → elect → execute cycle.
pub struct ControlLoop<D: ArmDriver> {
    buffer: CommandBuffer,
    controller: Arc<Mutex<UserFrameController<D>>>,
    window: Duration,
    status_tx: mpsc::UnboundedSender<String>,
}

impl<D: ArmDriver> ControlLoop<D> {
    /// Build a loop around a shared controller.
    ///
    /// Returns the loop together with the receiving end of the status
    /// channel; the command source drains the receiver and echoes each
    /// string into chat.
    pub fn new(
        controller: Arc<Mutex<UserFrameController<D>>>,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        (
            Self {
                buffer: CommandBuffer::new(),
                controller,
                window: DEFAULT_WINDOW,
                status_tx,
            },
            status_rx,
        )
    }

    /// Override the collection window.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Handle for the command source to submit through.
    pub fn submitter(&self) -> CommandSubmitter {
        CommandSubmitter {
            buffer: self.buffer.clone(),
            status_tx: self.status_tx.clone(),
        }
    }

    fn report(&self, status: impl Into<String>) {
        // A gone receiver means the front-end shut down; the arm keeps
        // running regardless.
        let _ = self.status_tx.send(status.into());
    }

    /// Drain the buffer, elect a winner, execute it, report the outcome.
    ///
    /// Factored out of [`run`] so tests can drive single cycles without
    /// waiting out the window.
    ///
    /// # Errors
    ///
    /// Propagates only hardware faults ([`ArmError::PositionUnreadable`],
    /// [`ArmError::Io`]); everything else is converted into a status
    /// string.
    ///
    /// [`run`]: ControlLoop::run
    pub async fn run_cycle(&self) -> Result<(), ArmError> {
        let commands = self.buffer.drain();
        let winner = match select_winner(&commands) {
            Ok(winner) => winner,
            Err(ArmError::NoCommands) => {
                info!("empty round");
                self.report("No command was submitted this round.");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        info!(function = %winner.function, votes = winner.votes, "winner elected");
        self.report(format!(
            "Executing {} with {} vote(s).",
            winner.function, winner.votes
        ));

        let mut controller = self.controller.lock().await;
        match controller.execute(winner.function).await {
            Ok(()) => {
                self.report(format!("{} done.", winner.function));
                Ok(())
            }
            Err(e @ (ArmError::PositionUnreadable | ArmError::Io(_))) => {
                warn!(error = %e, "hardware fault, stopping the loop");
                Err(e)
            }
            Err(e) => {
                info!(function = %winner.function, error = %e, "winner rejected");
                self.report(format!("Cannot execute {}: {e}", winner.function));
                Ok(())
            }
        }
    }

    /// Run collection rounds until a hardware fault.
    pub async fn run(&self) -> Result<(), ArmError> {
        loop {
            tokio::time::sleep(self.window).await;
            self.run_cycle().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowdarm_hal::SimArm;
    use crowdarm_kinematics::{WorkspaceEnvelope, wrist::WristPolicy};
    use crowdarm_types::FunctionKind;

    fn make_loop() -> (ControlLoop<SimArm>, mpsc::UnboundedReceiver<String>) {
        let mut controller = UserFrameController::new(
            WorkspaceEnvelope::default(),
            SimArm::new(),
            WristPolicy::AlignedAxis,
        )
        .with_hold_settle(Duration::ZERO);
        controller.home().unwrap();
        ControlLoop::new(Arc::new(Mutex::new(controller)))
    }

    fn submit(submitter: &CommandSubmitter, function: FunctionKind, who: &str) {
        submitter.submit(Command {
            function,
            submitter: who.to_string(),
        });
    }

    #[tokio::test]
    async fn majority_winner_is_executed_and_reported() {
        let (control, mut status_rx) = make_loop();
        let submitter = control.submitter();
        submit(&submitter, FunctionKind::Height { z: 20 }, "ada");
        submit(&submitter, FunctionKind::Height { z: 25 }, "grace");
        submit(&submitter, FunctionKind::Height { z: 20 }, "edsger");

        control.run_cycle().await.unwrap();

        // three acceptance messages, then the election, then completion
        for _ in 0..3 {
            assert!(status_rx.recv().await.unwrap().contains("added"));
        }
        let elected = status_rx.recv().await.unwrap();
        assert_eq!(elected, "Executing height(20) with 2 vote(s).");
        assert_eq!(status_rx.recv().await.unwrap(), "height(20) done.");
    }

    #[tokio::test]
    async fn empty_round_is_reported_not_an_error() {
        let (control, mut status_rx) = make_loop();
        control.run_cycle().await.unwrap();
        assert_eq!(
            status_rx.recv().await.unwrap(),
            "No command was submitted this round."
        );
    }

    #[tokio::test]
    async fn duplicate_submitter_is_told_off_and_not_queued() {
        let (control, mut status_rx) = make_loop();
        let submitter = control.submitter();
        submit(&submitter, FunctionKind::Height { z: 20 }, "ada");
        let verdict = submitter.submit(Command {
            function: FunctionKind::Height { z: 25 },
            submitter: "ada".to_string(),
        });
        assert_eq!(verdict, "Only one command per round, ada.");

        control.run_cycle().await.unwrap();
        status_rx.recv().await.unwrap(); // accepted
        status_rx.recv().await.unwrap(); // rejected duplicate
        let elected = status_rx.recv().await.unwrap();
        assert_eq!(elected, "Executing height(20) with 1 vote(s).");
    }

    #[tokio::test]
    async fn out_of_workspace_winner_is_reported_and_the_loop_survives() {
        let (control, mut status_rx) = make_loop();
        let submitter = control.submitter();
        // Far outside the reachable torus.
        submit(&submitter, FunctionKind::Position { x: 50, y: 50 }, "ada");

        control.run_cycle().await.unwrap();

        status_rx.recv().await.unwrap(); // accepted
        status_rx.recv().await.unwrap(); // election
        let outcome = status_rx.recv().await.unwrap();
        assert!(
            outcome.starts_with("Cannot execute position(50, 50):"),
            "got {outcome:?}"
        );

        // Next round runs normally.
        control.run_cycle().await.unwrap();
        let next = status_rx.recv().await.unwrap();
        assert_eq!(next, "No command was submitted this round.");
    }

    #[tokio::test]
    async fn submissions_after_drain_count_for_the_next_round() {
        let (control, mut status_rx) = make_loop();
        let submitter = control.submitter();
        submit(&submitter, FunctionKind::Height { z: 20 }, "ada");
        control.run_cycle().await.unwrap();

        // Same submitter is allowed again once the window has been drained.
        submit(&submitter, FunctionKind::Height { z: 22 }, "ada");
        control.run_cycle().await.unwrap();

        let mut statuses = Vec::new();
        while let Ok(s) = status_rx.try_recv() {
            statuses.push(s);
        }
        assert!(statuses.iter().any(|s| s == "Executing height(20) with 1 vote(s)."));
        assert!(statuses.iter().any(|s| s == "Executing height(22) with 1 vote(s)."));
    }
}
