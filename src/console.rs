//! Log handoff between the batch worker and whoever renders the log.
//!
//! The worker never touches the output surface directly. It posts
//! [`ConsoleMessage`]s into an unbounded channel and the control side drains
//! them in order.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// One line destined for the user-facing log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleMessage {
    /// Status line produced by this program.
    Status(String),
    /// A line streamed from the translator's output for the given zero-based pair.
    Output { pair: usize, line: String },
}

impl ConsoleMessage {
    pub fn text(&self) -> &str {
        match self {
            Self::Status(text) => text,
            Self::Output { line, .. } => line,
        }
    }
}

/// Sending half of the log channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Console {
    sender: Option<UnboundedSender<ConsoleMessage>>,
}

/// Receiving half, owned by the control side.
#[derive(Debug)]
pub struct ConsoleReceiver {
    receiver: UnboundedReceiver<ConsoleMessage>,
}

impl Console {
    pub fn channel() -> (Console, ConsoleReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Console { sender: Some(sender) },
            ConsoleReceiver { receiver },
        )
    }

    /// A console that only forwards to tracing.
    pub fn detached() -> Self {
        Self { sender: None }
    }

    pub fn status<S: Into<String>>(&self, message: S) {
        let message = message.into();
        debug!(target: "gstrun::console", "{}", message);
        self.send(ConsoleMessage::Status(message));
    }

    pub fn output<S: Into<String>>(&self, pair: usize, line: S) {
        let line = line.into();
        debug!(target: "gstrun::console", pair = pair + 1, "{}", line);
        self.send(ConsoleMessage::Output { pair, line });
    }

    fn send(&self, message: ConsoleMessage) {
        if let Some(sender) = &self.sender {
            // A closed receiver just means nobody is watching any more.
            let _ = sender.send(message);
        }
    }
}

impl ConsoleReceiver {
    pub async fn recv(&mut self) -> Option<ConsoleMessage> {
        self.receiver.recv().await
    }

    /// Take every message already queued without waiting.
    pub fn drain(&mut self) -> Vec<ConsoleMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            messages.push(message);
        }
        messages
    }
}
