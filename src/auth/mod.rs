pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::database::{QuizRepository, StoreError, Subscription};

pub use memory::MemoryAuth;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub account: Account,
    pub profile: Option<UserProfile>,
}

impl CurrentUser {
    pub fn uid(&self) -> &str {
        &self.account.uid
    }

    pub fn username(&self) -> &str {
        self.profile
            .as_ref()
            .map(|profile| profile.username.as_str())
            .or(self.account.display_name.as_deref())
            .unwrap_or(&self.account.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("The email address {0} is already in use")]
    EmailInUse(String),
    #[error("Wrong email or password")]
    InvalidCredentials,
    #[error("Password should be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("No account found for {0}")]
    UnknownAccount(String),
    #[error("You are not logged in")]
    NotSignedIn,
    #[error("Could not save profile: {0}")]
    Store(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Store(err.to_string())
    }
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn create_account(&self, email: &str, password: &str) -> Result<Account, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Account, AuthError>;

    async fn account(&self, uid: &str) -> Result<Account, AuthError>;

    async fn update_profile(&self, uid: &str, display_name: &str) -> Result<Account, AuthError>;

    async fn send_email_verification(&self, uid: &str) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    async fn update_password(&self, uid: &str, password: &str) -> Result<(), AuthError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Signup {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A background task turns the signed-in account into a [`CurrentUser`]:
/// unverified accounts count as signed out, verified ones are merged with
/// their `users/{uid}` profile and re-published whenever it changes.
pub struct AuthSession {
    backend: Arc<dyn AuthBackend>,
    repository: QuizRepository,
    auth_state: watch::Sender<Option<Account>>,
    user: watch::Receiver<Option<CurrentUser>>,
    initial: watch::Receiver<Option<Option<CurrentUser>>>,
}

impl AuthSession {
    /// Must be called inside a tokio runtime.
    pub fn new(backend: Arc<dyn AuthBackend>, repository: QuizRepository) -> Self {
        let (auth_state, auth_rx) = watch::channel(None);
        let (user_tx, user) = watch::channel(None);
        let (initial_tx, initial) = watch::channel(None);

        tokio::spawn(propagate(auth_rx, repository.clone(), user_tx, initial_tx));

        Self {
            backend,
            repository,
            auth_state,
            user,
            initial,
        }
    }

    pub fn user(&self) -> Option<CurrentUser> {
        self.user.borrow().clone()
    }

    pub fn watch_user(&self) -> watch::Receiver<Option<CurrentUser>> {
        self.user.clone()
    }

    /// The first user state observed after start-up.
    pub async fn initial_auth_state(&self) -> Option<CurrentUser> {
        let mut initial = self.initial.clone();
        let user = match initial.wait_for(Option::is_some).await {
            Ok(state) => state.clone().flatten(),
            Err(_) => None,
        };
        user
    }

    fn account(&self) -> Option<Account> {
        self.auth_state.borrow().clone()
    }

    #[instrument(level = "info", skip(self, signup), fields(email = %signup.email))]
    pub async fn signup(&self, signup: &Signup) -> Result<Account, AuthError> {
        let account = self
            .backend
            .create_account(&signup.email, &signup.password)
            .await?;
        let account = self
            .backend
            .update_profile(&account.uid, &signup.username)
            .await?;
        self.backend.send_email_verification(&account.uid).await?;
        self.repository
            .write_user_profile(
                &account.uid,
                &UserProfile {
                    username: signup.username.clone(),
                    email: signup.email.clone(),
                },
            )
            .await?;

        info!(uid = %account.uid, "account created");
        self.auth_state.send_replace(Some(account.clone()));
        Ok(account)
    }

    #[instrument(level = "info", skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Account, AuthError> {
        let account = self.backend.sign_in(email, password).await?;
        self.auth_state.send_replace(Some(account.clone()));
        Ok(account)
    }

    pub fn logout(&self) {
        if self.auth_state.send_replace(None).is_some() {
            info!("signed out");
        }
    }

    pub async fn send_password_reset_email(&self, email: &str) -> Result<(), AuthError> {
        self.backend.send_password_reset(email).await
    }

    pub async fn resend_email_verification(&self) -> Result<(), AuthError> {
        let account = self.account().ok_or(AuthError::NotSignedIn)?;
        self.backend.send_email_verification(&account.uid).await
    }

    pub async fn update_password(&self, password: &str) -> Result<(), AuthError> {
        let account = self.account().ok_or(AuthError::NotSignedIn)?;
        self.backend.update_password(&account.uid, password).await
    }

    /// Re-reads the signed-in account, e.g. after the e-mail got verified.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let Some(current) = self.account() else {
            return Ok(());
        };
        let fresh = self.backend.account(&current.uid).await?;
        self.auth_state.send_if_modified(|state| {
            // Skip if the user signed out or switched accounts meanwhile.
            match state {
                Some(account) if account.uid == fresh.uid && *account != fresh => {
                    *account = fresh;
                    true
                }
                _ => false,
            }
        });
        Ok(())
    }
}

async fn propagate(
    mut auth_rx: watch::Receiver<Option<Account>>,
    repository: QuizRepository,
    user_tx: watch::Sender<Option<CurrentUser>>,
    initial_tx: watch::Sender<Option<Option<CurrentUser>>>,
) {
    let publish = |user: Option<CurrentUser>| {
        initial_tx.send_if_modified(|initial| {
            if initial.is_none() {
                *initial = Some(user.clone());
                true
            } else {
                false
            }
        });
        user_tx.send_replace(user);
    };

    loop {
        let account = auth_rx.borrow_and_update().clone();
        match account.filter(|account| account.email_verified) {
            None => {
                publish(None);
                if auth_rx.changed().await.is_err() {
                    return;
                }
            }
            Some(account) => {
                let mut profile: Option<Subscription> =
                    match repository.watch_user_profile(&account.uid).await {
                        Ok(subscription) => Some(subscription),
                        Err(err) => {
                            warn!(uid = %account.uid, error = %err, "profile subscription failed");
                            None
                        }
                    };

                let merge = |value: Option<&serde_json::Value>| CurrentUser {
                    account: account.clone(),
                    profile: value.and_then(|v| serde_json::from_value(v.clone()).ok()),
                };
                publish(Some(merge(profile.as_ref().and_then(Subscription::current))));

                loop {
                    tokio::select! {
                        changed = auth_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            debug!(uid = %account.uid, "auth state changed, dropping profile subscription");
                            break;
                        }
                        update = next_profile(&mut profile) => match update {
                            Some(value) => publish(Some(merge(value.as_ref()))),
                            None => profile = None,
                        }
                    }
                }
            }
        }
    }
}

/// Next profile value; pends forever once there is no subscription.
async fn next_profile(profile: &mut Option<Subscription>) -> Option<Option<serde_json::Value>> {
    match profile {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}
