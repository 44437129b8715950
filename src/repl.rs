//! Terminal front-end: the login gate and the interactive chat loop. This
//! is the crate's equivalent of the UI layer; every history action here is
//! an explicit user command, never automatic.

use crate::auth::{AuthGateway, AuthSession};
use crate::dispatcher::{Dispatcher, SubmitOutcome};
use crate::export;
use crate::history::{HistoryStore, DEFAULT_HISTORY_LIMIT};
use crate::models::SavedConversation;
use crate::session::Session;
use anyhow::Result;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Why the chat loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Return to the login prompt.
    Logout,
    /// Leave the application.
    Quit,
}

const HELP: &str = "Commands:\n\
  /save           save the current conversation\n\
  /history        list saved conversations\n\
  /load <n>       load conversation n from the last listing\n\
  /delete <n>     delete conversation n from the last listing\n\
  /clear-history  delete all saved conversations\n\
  /stats          show saved-conversation statistics\n\
  /export         export the transcript to a text file\n\
  /clear          clear the current conversation\n\
  /logout         sign out and return to the login prompt\n\
  /quit           exit\n\
Anything else is sent to Vehi.";

/// Line reader over stdin with a flushed prompt. `None` means end of input.
pub struct LineReader {
    lines: Lines<BufReader<Stdin>>,
}

impl LineReader {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    pub async fn prompt(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Prompts for credentials until sign-in succeeds. Errors are shown inline
/// and the prompt repeats; `None` means the input stream ended.
pub async fn login(auth: &AuthGateway, reader: &mut LineReader) -> Result<Option<AuthSession>> {
    println!("Sign in to continue to Vehi AI.");
    loop {
        let Some(email) = reader.prompt("Email: ").await? else {
            return Ok(None);
        };
        let Some(password) = reader.prompt("Password: ").await? else {
            return Ok(None);
        };

        match auth.sign_in(&email, &password).await {
            Ok(session) => return Ok(Some(session)),
            Err(err) => println!("{}", err),
        }
    }
}

/// One signed-in chat view: the live session, the dispatcher and the
/// history gateway, plus the most recent history listing so `/load` and
/// `/delete` can refer to entries by number.
pub struct ChatApp {
    session: Session,
    dispatcher: Dispatcher,
    history: HistoryStore,
    auth_session: AuthSession,
    listing: Vec<SavedConversation>,
}

impl ChatApp {
    pub fn new(dispatcher: Dispatcher, history: HistoryStore, auth_session: AuthSession) -> Self {
        let session = Session::new(auth_session.user.display_name());
        Self {
            session,
            dispatcher,
            history,
            auth_session,
            listing: Vec::new(),
        }
    }

    pub async fn run(&mut self, reader: &mut LineReader, auth: &AuthGateway) -> Result<LoopExit> {
        println!("\nVehi: {}", self.session.last().content);
        println!("Type /help for commands.\n");

        loop {
            let Some(line) = reader.prompt("> ").await? else {
                return Ok(LoopExit::Quit);
            };
            let line = line.trim().to_string();

            if let Some(command) = line.strip_prefix('/') {
                let mut parts = command.split_whitespace();
                match (parts.next().unwrap_or(""), parts.next()) {
                    ("help", _) => println!("{}", HELP),
                    ("save", _) => self.save().await,
                    ("history", _) => self.show_history().await,
                    ("load", arg) => self.load(arg).await,
                    ("delete", arg) => self.delete(arg).await,
                    ("clear-history", _) => self.clear_history().await,
                    ("stats", _) => self.show_stats().await,
                    ("export", _) => self.export().await,
                    ("clear", _) => {
                        self.session.clear();
                        println!("Vehi: {}", self.session.last().content);
                    }
                    ("logout", _) => {
                        auth.sign_out(self.auth_session.access_token.clone());
                        println!("Signed out.");
                        return Ok(LoopExit::Logout);
                    }
                    ("quit", _) | ("exit", _) => return Ok(LoopExit::Quit),
                    (other, _) => println!("Unknown command: /{} (try /help)", other),
                }
                continue;
            }

            match self.dispatcher.submit(&mut self.session, &line).await {
                SubmitOutcome::Sent => println!("Vehi: {}", self.session.last().content),
                SubmitOutcome::EmptyInput => {}
                SubmitOutcome::Busy => println!("Still waiting for the previous reply."),
            }
        }
    }

    async fn save(&self) {
        match self
            .history
            .save(&self.auth_session.user.id, self.session.messages())
            .await
        {
            Ok(saved) => println!(
                "Conversation saved ({} messages).",
                saved.message_count.unwrap_or(self.session.len() as i64)
            ),
            Err(err) => println!("Save failed: {}", err),
        }
    }

    async fn show_history(&mut self) {
        match self
            .history
            .list(&self.auth_session.user.id, DEFAULT_HISTORY_LIMIT)
            .await
        {
            Ok(conversations) if conversations.is_empty() => {
                self.listing = conversations;
                println!("No saved conversations.");
            }
            Ok(conversations) => {
                for (i, convo) in conversations.iter().enumerate() {
                    println!(
                        "{:>3}. {} ({} messages)",
                        i + 1,
                        convo.created_at.format("%Y-%m-%d %H:%M"),
                        convo.message_count.unwrap_or(0)
                    );
                }
                self.listing = conversations;
            }
            Err(err) => println!("Could not load history: {}", err),
        }
    }

    // Resolves a 1-based /load or /delete argument against the last listing.
    fn pick(&self, arg: Option<&str>) -> Option<&SavedConversation> {
        let index: usize = arg?.parse().ok()?;
        if index == 0 {
            return None;
        }
        self.listing.get(index - 1)
    }

    async fn load(&mut self, arg: Option<&str>) {
        if self.listing.is_empty() {
            println!("Run /history first, then /load <n>.");
            return;
        }
        let Some(convo) = self.pick(arg).cloned() else {
            println!("Usage: /load <n> with n from the last /history listing.");
            return;
        };

        // A payload that fails to decode leaves the live session unchanged.
        match convo.decode_messages() {
            Ok(messages) => match self.session.replace(messages) {
                Ok(()) => println!("Loaded conversation from {}.", convo.created_at.format("%Y-%m-%d %H:%M")),
                Err(err) => println!("Load failed: {}", err),
            },
            Err(err) => println!("Load failed: the saved conversation is corrupted ({}).", err),
        }
    }

    async fn delete(&mut self, arg: Option<&str>) {
        let Some(convo) = self.pick(arg).cloned() else {
            println!("Usage: /delete <n> with n from the last /history listing.");
            return;
        };
        let id = convo.id;

        match self.history.delete_one(id).await {
            Ok(()) => {
                self.listing.retain(|c| c.id != id);
                println!("Deleted.");
            }
            Err(err) => println!("Delete failed: {}", err),
        }
    }

    async fn clear_history(&mut self) {
        match self.history.delete_all(&self.auth_session.user.id).await {
            Ok(()) => {
                self.listing.clear();
                println!("All saved conversations deleted.");
            }
            Err(err) => println!("Delete failed: {}", err),
        }
    }

    async fn show_stats(&self) {
        let stats = self.history.stats(&self.auth_session.user.id).await;
        println!(
            "Saved conversations: {}  total messages: {}  average per chat: {}",
            stats.total_chats, stats.total_messages, stats.average_messages_per_chat
        );
    }

    async fn export(&self) {
        match export::write_transcript(Path::new("."), self.session.messages()).await {
            Ok(path) => println!("Transcript written to {}.", path.display()),
            Err(err) => println!("Export failed: {}", err),
        }
    }
}
