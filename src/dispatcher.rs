use crate::completion::CompletionProvider;
use crate::session::Session;
use std::sync::Arc;

/// What became of a submit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A user turn and an assistant turn (reply or error text) were appended.
    Sent,
    /// Whitespace-only input; the session is unchanged.
    EmptyInput,
    /// A prior request is still in flight; the session is unchanged.
    Busy,
}

/// Forwards user text to the completion provider and records the exchange in
/// the session. One request may be in flight at a time; there is no queuing,
/// no cancellation and no retry.
pub struct Dispatcher {
    provider: Arc<dyn CompletionProvider>,
    busy: bool,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            busy: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Submits user input. Never fails: a provider error becomes a visible
    /// assistant turn carrying a human-readable message, and the busy flag
    /// clears on every path.
    pub async fn submit(&mut self, session: &mut Session, input: &str) -> SubmitOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SubmitOutcome::EmptyInput;
        }
        if self.busy {
            log::debug!("Submit ignored: a completion request is already in flight");
            return SubmitOutcome::Busy;
        }

        // Snapshot the prior turns before the new user message lands; the
        // provider trims this to its own context window.
        let history = session.messages().to_vec();
        session.push_user(text);
        self.busy = true;

        match self.provider.complete(text, &history).await {
            Ok(reply) => session.push_assistant(reply),
            Err(err) => {
                log::error!("Completion failed: {}", err);
                session.push_assistant(err.user_message());
            }
        }

        self.busy = false;
        SubmitOutcome::Sent
    }

    #[cfg(test)]
    fn force_busy(&mut self) {
        self.busy = true;
    }
}
