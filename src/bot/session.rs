use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::Requester;
use teloxide::types::{ChatId, ReplyMarkup};
use teloxide::Bot;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::keyboard::modal_markup;
use crate::auth::{AuthBackend, AuthSession};
use crate::database::QuizRepository;
use crate::modal::{ActiveModal, ModalCoordinator, ModalKind, Severity, SupersedePolicy};
use crate::views::{Notification, Notifier};

pub struct App {
    repository: QuizRepository,
    auth_backend: Arc<dyn AuthBackend>,
    policy: SupersedePolicy,
    sessions: Mutex<HashMap<ChatId, SessionEntry>>,
}

struct SessionEntry {
    session: Arc<ChatSession>,
    last_seen: Instant,
}

pub struct ChatSession {
    pub chat_id: ChatId,
    pub modal: ModalCoordinator,
    pub auth: Arc<AuthSession>,
    pub notifier: Arc<ChatNotifier>,
}

impl App {
    pub fn new(
        repository: QuizRepository,
        auth_backend: Arc<dyn AuthBackend>,
        policy: SupersedePolicy,
    ) -> Self {
        Self {
            repository,
            auth_backend,
            policy,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &QuizRepository {
        &self.repository
    }

    pub fn session(&self, bot: &Bot, chat_id: ChatId) -> Arc<ChatSession> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions.entry(chat_id).or_insert_with(|| {
            info!(%chat_id, "opening chat session");
            let modal = ModalCoordinator::with_policy(self.policy);
            tokio::spawn(render_modals(bot.clone(), chat_id, modal.subscribe()));
            SessionEntry {
                session: Arc::new(ChatSession {
                    chat_id,
                    notifier: Arc::new(ChatNotifier {
                        bot: bot.clone(),
                        chat_id,
                        modal: modal.clone(),
                    }),
                    modal,
                    auth: Arc::new(AuthSession::new(
                        self.auth_backend.clone(),
                        self.repository.clone(),
                    )),
                }),
                last_seen: Instant::now(),
            }
        });
        entry.last_seen = Instant::now();
        entry.session.clone()
    }

    /// Closes sessions untouched for `max_idle` that have no open modal and no
    /// running flow. Dropping a session stops its renderer and auth tasks and
    /// signs its user out. Returns how many were closed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|chat_id, entry| {
            let busy = Arc::strong_count(&entry.session) > 1 || !entry.session.modal.is_idle();
            let keep = busy || entry.last_seen.elapsed() < max_idle;
            if !keep {
                info!(%chat_id, "closing idle chat session");
            }
            keep
        });
        before - sessions.len()
    }

    pub async fn sweep_sessions(self: Arc<Self>, max_idle: Duration) {
        let mut ticker = tokio::time::interval(max_idle.max(Duration::from_secs(1)) / 2);
        loop {
            ticker.tick().await;
            let closed = self.evict_idle(max_idle);
            if closed > 0 {
                debug!(closed, "swept idle chat sessions");
            }
        }
    }

    pub fn has_active_modal(&self, chat_id: ChatId) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chat_id)
            .is_some_and(|entry| !entry.session.modal.is_idle())
    }
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "",
        Severity::Success => "✅ ",
        Severity::Warning => "⚠️ ",
        Severity::Error => "❗ ",
    }
}

pub(crate) fn render_text(active: &ActiveModal) -> String {
    let request = &active.request;
    let mut text = format!("{}{}", severity_marker(request.severity()), request.title());
    match request.kind() {
        ModalKind::Dialog => {
            if let Some(message) = request.message().filter(|m| !m.is_empty()) {
                text.push('\n');
                text.push_str(message);
            }
        }
        ModalKind::Prompt => {
            let label = request.input_label().unwrap_or_default();
            text.push_str(&format!("\n{label}:"));
            if active.input_error.is_some() {
                text.push_str(&format!("\n{label} is required"));
            }
        }
    }
    text
}

#[instrument(level = "debug", skip(bot, state))]
async fn render_modals(bot: Bot, chat_id: ChatId, mut state: watch::Receiver<Option<ActiveModal>>) {
    loop {
        let active = state.borrow_and_update().clone();
        if let Some(active) = active {
            let sent = bot
                .send_message(chat_id, render_text(&active))
                .reply_markup(modal_markup(&active.request))
                .await;
            if let Err(err) = sent {
                warn!(%chat_id, error = %err, "failed to render modal");
            }
        }
        if state.changed().await.is_err() {
            debug!(%chat_id, "modal renderer stopped");
            return;
        }
    }
}

pub struct ChatNotifier {
    bot: Bot,
    chat_id: ChatId,
    modal: ModalCoordinator,
}

#[async_trait]
impl Notifier for ChatNotifier {
    async fn notify(&self, notification: Notification) {
        let text = format!(
            "{}{}",
            severity_marker(notification.severity),
            notification.message
        );
        let mut request = self.bot.send_message(self.chat_id, text);
        // Keep the buttons of an open modal.
        if self.modal.is_idle() {
            request = request.reply_markup(ReplyMarkup::kb_remove());
        }
        if let Err(err) = request.await {
            warn!(chat_id = %self.chat_id, error = %err, "failed to deliver notification");
        }
    }
}
