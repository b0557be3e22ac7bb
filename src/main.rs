use std::borrow::Cow;
use std::error::Error;
use std::sync::Arc;

use quizdesk::auth::{AuthBackend, MemoryAuth};
use quizdesk::bot::{schema, session::App, state::ChatState};
use quizdesk::config::Config;
use quizdesk::database::{Connection, DocumentStore, MemoryStore, QuizRepository};
use quizdesk::logging;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::error_handlers::IgnoringErrorHandlerSafe;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Config::from_env()?;
    logging::init(&config.log_level)?;

    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            let connection = Connection::connect(Cow::Borrowed(url.as_str())).await?;
            connection.perform_migration_if_needed().await?;
            Arc::new(connection)
        }
        None => {
            warn!("DATABASE_URL is not set, keeping documents in memory");
            Arc::new(MemoryStore::new())
        }
    };
    let auth: Arc<dyn AuthBackend> = Arc::new(MemoryAuth::new(config.auth_auto_verify));
    let app = Arc::new(App::new(QuizRepository::new(store), auth, config.supersede));
    tokio::spawn(app.clone().sweep_sessions(config.session_idle));

    let bot = Bot::new(&config.teloxide_token);
    info!("Starting bot...");

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![InMemStorage::<ChatState>::new(), app])
        .enable_ctrlc_handler()
        .build();

    match config.webhook {
        Some(webhook) => {
            let listener = webhooks::axum(bot, Options::new(webhook.addr, webhook.url)).await?;
            dispatcher
                .dispatch_with_listener(listener, Arc::new(IgnoringErrorHandlerSafe))
                .await
        }
        None => dispatcher.dispatch().await,
    }
    Ok(())
}
