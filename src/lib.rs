// Declare the modules
pub mod auth;
pub mod completion;
pub mod config;
pub mod dispatcher;
pub mod export;
pub mod history;
pub mod models;
pub mod repl;
pub mod session;

use crate::auth::AuthGateway;
use crate::completion::{CompletionProvider, GeminiProvider};
use crate::config::AppConfig;
use crate::dispatcher::Dispatcher;
use crate::history::HistoryStore;
use crate::repl::{ChatApp, LineReader, LoopExit};
use anyhow::Result;
use std::sync::Arc;

/// Starts the application: logging, configuration, the gateways and then
/// the sign-in gate plus chat loop. Logging out returns to the sign-in
/// prompt; quitting or end of input exits.
pub async fn run() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let config = AppConfig::from_env()?;
    let provider: Arc<dyn CompletionProvider> = Arc::new(GeminiProvider::new(
        config.gemini_api_key.clone(),
        config.model.clone(),
    ));
    let auth = AuthGateway::new(&config.supabase_url, &config.supabase_anon_key);
    let mut reader = LineReader::new();

    loop {
        let Some(auth_session) = repl::login(&auth, &mut reader).await? else {
            return Ok(());
        };

        let mut history = HistoryStore::new(&config.supabase_url, &config.supabase_anon_key);
        history.set_access_token(Some(auth_session.access_token.clone()));

        let dispatcher = Dispatcher::new(provider.clone());
        let mut app = ChatApp::new(dispatcher, history, auth_session);

        match app.run(&mut reader, &auth).await? {
            LoopExit::Logout => continue,
            LoopExit::Quit => return Ok(()),
        }
    }
}
