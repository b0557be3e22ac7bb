use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use super::{Notification, Notifier, Route, Submission, VALIDATION_FAILED};
use crate::auth::{AuthSession, Signup, MIN_PASSWORD_LEN};
use crate::form::{email, min_length, required, FieldRules, Form, FormResult, Ruleset};
use crate::modal::{ModalAction, ModalCoordinator, ModalError, ModalSpec};

pub fn signup_rules() -> Ruleset {
    FieldRules::new()
        .field("username", required())
        .field("email", vec![required(), email()])
        .field("password", vec![required(), min_length(MIN_PASSWORD_LEN)])
        .into()
}

pub fn login_rules() -> Ruleset {
    FieldRules::new()
        .field("email", vec![required(), email()])
        .field("password", required())
        .into()
}

pub fn verify_email_dialog(email: &str) -> ModalSpec {
    ModalSpec::dialog("Verify your email")
        .message(format!(
            "We sent a verification link to {email}. Follow it, then log in."
        ))
        .actions(vec![ModalAction::confirm("Return to login")])
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

pub struct SignupView {
    auth: Arc<AuthSession>,
    modal: ModalCoordinator,
    notifier: Arc<dyn Notifier>,
    form: Form,
}

impl SignupView {
    pub fn new(auth: Arc<AuthSession>, modal: ModalCoordinator, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            auth,
            modal,
            notifier,
            form: Form::new(signup_rules()),
        }
    }

    pub fn form(&self) -> Option<&FormResult> {
        self.form.form()
    }

    #[instrument(level = "info", skip_all, fields(email = %data.email))]
    pub async fn submit(&mut self, data: &Signup) -> Submission<Route> {
        let result = self.form.validate_fields(data);
        if !result.is_valid() {
            self.notifier
                .notify(Notification::error(VALIDATION_FAILED))
                .await;
            return Submission::Invalid(result);
        }

        if let Err(err) = self.auth.signup(data).await {
            let message = err.to_string();
            self.notifier.notify(Notification::error(message.clone())).await;
            return Submission::Failed(message);
        }

        self.notifier
            .notify(Notification::success(format!(
                "Verification email sent to {}",
                data.email
            )))
            .await;

        // Dismissing the dialog leads to the same place.
        if let Err(err) = self.modal.dialog(verify_email_dialog(&data.email)).await {
            debug!(%err, "verification dialog dismissed");
        }
        Submission::Done(Route::Login)
    }
}

pub struct LoginView {
    auth: Arc<AuthSession>,
    notifier: Arc<dyn Notifier>,
    form: Form,
}

impl LoginView {
    pub fn new(auth: Arc<AuthSession>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            auth,
            notifier,
            form: Form::new(login_rules()),
        }
    }

    pub fn form(&self) -> Option<&FormResult> {
        self.form.form()
    }

    #[instrument(level = "info", skip_all, fields(email = %data.email))]
    pub async fn submit(&mut self, data: &LoginForm) -> Submission<Route> {
        let result = self.form.validate_fields(data);
        if !result.is_valid() {
            self.notifier
                .notify(Notification::error(VALIDATION_FAILED))
                .await;
            return Submission::Invalid(result);
        }

        match self.auth.login(&data.email, &data.password).await {
            Ok(account) if account.email_verified => {
                info!(uid = %account.uid, "logged in");
                Submission::Done(Route::Home)
            }
            Ok(_) => {
                self.notifier
                    .notify(Notification::warning("Please verify your email first"))
                    .await;
                Submission::Done(Route::VerifyEmail)
            }
            Err(err) => {
                let message = err.to_string();
                self.notifier.notify(Notification::error(message.clone())).await;
                Submission::Failed(message)
            }
        }
    }
}

#[instrument(level = "info", skip_all)]
pub async fn reset_password(
    auth: &AuthSession,
    modal: &ModalCoordinator,
    notifier: &dyn Notifier,
) -> Result<Submission<()>, ModalError> {
    let address = modal
        .prompt(ModalSpec::prompt("Reset password", "Email").actions(vec![
            ModalAction::cancel("Cancel"),
            ModalAction::confirm("Send"),
        ]))
        .await?;
    let address = address.trim();

    let result = Form::new(email()).validate(&address.into());
    if !result.is_valid() {
        notifier
            .notify(Notification::error(format!("{address} is not a valid email")))
            .await;
        return Ok(Submission::Invalid(result));
    }

    match auth.send_password_reset_email(address).await {
        Ok(()) => {
            notifier
                .notify(Notification::success(format!(
                    "Password reset email sent to {address}"
                )))
                .await;
            Ok(Submission::Done(()))
        }
        Err(err) => {
            let message = err.to_string();
            notifier.notify(Notification::error(message.clone())).await;
            Ok(Submission::Failed(message))
        }
    }
}

#[instrument(level = "info", skip_all)]
pub async fn change_password(
    auth: &AuthSession,
    modal: &ModalCoordinator,
    notifier: &dyn Notifier,
) -> Result<Submission<()>, ModalError> {
    let password = modal
        .prompt(ModalSpec::prompt("Change password", "New password").actions(vec![
            ModalAction::cancel("Cancel"),
            ModalAction::confirm("Save"),
        ]))
        .await?;

    let result = Form::new(min_length(MIN_PASSWORD_LEN)).validate(&password.as_str().into());
    if !result.is_valid() {
        notifier
            .notify(Notification::error(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )))
            .await;
        return Ok(Submission::Invalid(result));
    }

    match auth.update_password(&password).await {
        Ok(()) => {
            notifier
                .notify(Notification::success("Password updated"))
                .await;
            Ok(Submission::Done(()))
        }
        Err(err) => {
            let message = err.to_string();
            notifier.notify(Notification::error(message.clone())).await;
            Ok(Submission::Failed(message))
        }
    }
}
