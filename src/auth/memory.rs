use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use super::{Account, AuthBackend, AuthError, MIN_PASSWORD_LEN};
use crate::database::new_key;

struct Record {
    account: Account,
    password: String,
}

pub struct MemoryAuth {
    auto_verify: bool,
    records: RwLock<HashMap<String, Record>>,
}

impl MemoryAuth {
    /// With `auto_verify` the verification e-mail counts as clicked right away.
    pub fn new(auto_verify: bool) -> Self {
        Self {
            auto_verify,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub async fn verify_email(&self, uid: &str) -> Result<(), AuthError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(uid)
            .ok_or_else(|| AuthError::UnknownAccount(uid.to_owned()))?;
        record.account.email_verified = true;
        Ok(())
    }
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[async_trait]
impl AuthBackend for MemoryAuth {
    #[instrument(level = "debug", skip(self, password))]
    async fn create_account(&self, email: &str, password: &str) -> Result<Account, AuthError> {
        check_password(password)?;
        let mut records = self.records.write().await;
        if records.values().any(|r| same_email(&r.account.email, email)) {
            return Err(AuthError::EmailInUse(email.to_owned()));
        }

        let account = Account {
            uid: new_key(),
            email: email.trim().to_owned(),
            display_name: None,
            email_verified: false,
        };
        records.insert(
            account.uid.clone(),
            Record {
                account: account.clone(),
                password: password.to_owned(),
            },
        );
        Ok(account)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Account, AuthError> {
        self.records
            .read()
            .await
            .values()
            .find(|r| same_email(&r.account.email, email) && r.password == password)
            .map(|r| r.account.clone())
            .ok_or(AuthError::InvalidCredentials)
    }

    async fn account(&self, uid: &str) -> Result<Account, AuthError> {
        self.records
            .read()
            .await
            .get(uid)
            .map(|r| r.account.clone())
            .ok_or_else(|| AuthError::UnknownAccount(uid.to_owned()))
    }

    async fn update_profile(&self, uid: &str, display_name: &str) -> Result<Account, AuthError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(uid)
            .ok_or_else(|| AuthError::UnknownAccount(uid.to_owned()))?;
        record.account.display_name = Some(display_name.to_owned());
        Ok(record.account.clone())
    }

    async fn send_email_verification(&self, uid: &str) -> Result<(), AuthError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(uid)
            .ok_or_else(|| AuthError::UnknownAccount(uid.to_owned()))?;
        info!(email = %record.account.email, "verification email sent");
        if self.auto_verify {
            record.account.email_verified = true;
        }
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let records = self.records.read().await;
        if !records.values().any(|r| same_email(&r.account.email, email)) {
            return Err(AuthError::UnknownAccount(email.to_owned()));
        }
        info!(email, "password reset email sent");
        Ok(())
    }

    async fn update_password(&self, uid: &str, password: &str) -> Result<(), AuthError> {
        check_password(password)?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(uid)
            .ok_or_else(|| AuthError::UnknownAccount(uid.to_owned()))?;
        record.password = password.to_owned();
        Ok(())
    }
}
