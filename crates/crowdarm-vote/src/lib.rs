//! Command aggregation: one vote per submitter per window, one winner per
//! window.
//!
//! [`CommandBuffer`] collects submissions from many concurrent producers
//! while the control loop sleeps through the collection window; the loop
//! then [`CommandBuffer::drain`]s an atomic snapshot and feeds it to
//! [`select_winner`].
//!
//! # Concurrency model
//!
//! Single-writer-per-field: `submit` may race with itself (many chat users
//! at once) and is mutually exclusive with `drain`. One `std::sync::Mutex`
//! around the pending `Vec` covers both; `drain` swaps the container out
//! under the lock so no submission can be lost or torn mid-drain.
//! Submissions that arrive after the swap land in the *next* window.

use std::sync::{Arc, Mutex};

use crowdarm_types::{ArmError, Command, RankedCommand};

/// Shared, append-only-within-a-window buffer of pending commands.
///
/// Clones share the same underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    pending: Arc<Mutex<Vec<Command>>>,
}

impl CommandBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Command>> {
        // A panicked submitter cannot leave a Vec of owned commands in a
        // bad state, so poison is recoverable here.
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Append a command for the current window.
    ///
    /// Enforces one pending command per submitter *at append time*: a late
    /// submission from a submitter already present is rejected, not queued.
    ///
    /// # Errors
    ///
    /// [`ArmError::DuplicateSubmitter`] if the submitter already voted this
    /// window.
    pub fn submit(&self, command: Command) -> Result<(), ArmError> {
        let mut pending = self.lock();
        if pending.iter().any(|c| c.submitter == command.submitter) {
            return Err(ArmError::DuplicateSubmitter(command.submitter));
        }
        tracing::debug!(
            submitter = %command.submitter,
            function = %command.function,
            "command queued"
        );
        pending.push(command);
        Ok(())
    }

    /// Atomically empty the buffer and return its prior contents.
    ///
    /// Deliberately separate from [`select_winner`] so the control loop can
    /// report the winner before (or without) wiping state.
    pub fn drain(&self) -> Vec<Command> {
        let mut pending = self.lock();
        std::mem::take(&mut *pending)
    }

    /// Number of pending commands.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no commands are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Select the command with the strictly greatest number of votes.
///
/// Commands vote for the same outcome when their [`FunctionKind`] values are
/// equal (arguments compared by value; the submitter is irrelevant). Ties
/// break to the earliest-submitted distinct command: groups are scanned in
/// insertion order of first occurrence and only a *strictly* greater count
/// displaces the current maximum. This ordering is part of the contract and
/// is relied on by deterministic tests.
///
/// # Errors
///
/// [`ArmError::NoCommands`] on empty input — a normal, user-visible
/// round outcome, not a fault.
///
/// [`FunctionKind`]: crowdarm_types::FunctionKind
pub fn select_winner(commands: &[Command]) -> Result<RankedCommand, ArmError> {
    if commands.is_empty() {
        return Err(ArmError::NoCommands);
    }

    // Group in first-occurrence order. Vote counts are tiny (one entry per
    // chat user per window), so the linear scan beats a hash table and keeps
    // the tie-break order explicit.
    let mut groups: Vec<RankedCommand> = Vec::new();
    for command in commands {
        match groups.iter_mut().find(|g| g.function == command.function) {
            Some(group) => group.votes += 1,
            None => groups.push(RankedCommand {
                function: command.function,
                votes: 1,
            }),
        }
    }

    let mut winner = groups[0].clone();
    for group in &groups[1..] {
        if group.votes > winner.votes {
            winner = group.clone();
        }
    }
    tracing::debug!(function = %winner.function, votes = winner.votes, "winner selected");
    Ok(winner)
}
