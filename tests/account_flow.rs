use std::sync::Arc;
use std::time::Duration;

use quizdesk::auth::{AuthSession, MemoryAuth, Signup};
use quizdesk::database::{MemoryStore, QuizRepository};
use quizdesk::modal::{ActiveModal, CancelReason, ModalCoordinator, ModalKind};
use quizdesk::views::account::{
    change_password, reset_password, LoginForm, LoginView, SignupView,
};
use quizdesk::views::{
    Notification, NotificationLog, Notifier, Route, Submission, VALIDATION_FAILED,
};
use tokio::time::timeout;

struct Fixture {
    auth: Arc<AuthSession>,
    modal: ModalCoordinator,
    log: Arc<NotificationLog>,
}

impl Fixture {
    fn new() -> Self {
        let repository = QuizRepository::new(Arc::new(MemoryStore::new()));
        Self {
            auth: Arc::new(AuthSession::new(Arc::new(MemoryAuth::new(true)), repository)),
            modal: ModalCoordinator::new(),
            log: Arc::new(NotificationLog::new()),
        }
    }

    fn notifier(&self) -> Arc<dyn Notifier> {
        self.log.clone()
    }

    fn signup_view(&self) -> SignupView {
        SignupView::new(self.auth.clone(), self.modal.clone(), self.notifier())
    }
}

fn kim() -> Signup {
    Signup {
        username: "kim".into(),
        email: "kim@quiz.io".into(),
        password: "secret1".into(),
    }
}

async fn next_modal(modal: &ModalCoordinator) -> ActiveModal {
    let mut state = modal.subscribe();
    let active = timeout(Duration::from_secs(1), state.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap()
        .clone();
    active.unwrap()
}

#[tokio::test]
async fn invalid_signup_reports_fields_and_creates_nothing() {
    let fixture = Fixture::new();
    let mut view = fixture.signup_view();
    let data = Signup {
        username: String::new(),
        email: "bad".into(),
        password: "abc".into(),
    };

    let Submission::Invalid(result) = view.submit(&data).await else {
        panic!("signup must not validate");
    };
    assert!(result.failed("username", "required"));
    assert!(result.failed("email", "email"));
    assert!(result.failed("password", "minLength"));
    assert!(fixture.modal.is_idle());
    assert_eq!(
        fixture.log.entries(),
        vec![Notification::error(VALIDATION_FAILED)]
    );
    assert!(fixture.auth.login("bad", "abc").await.is_err());
}

#[tokio::test]
async fn invalid_login_is_reported_without_signing_in() {
    let fixture = Fixture::new();
    let mut login = LoginView::new(fixture.auth.clone(), fixture.notifier());

    let submission = login
        .submit(&LoginForm {
            email: "kim".into(),
            password: String::new(),
        })
        .await;
    assert!(matches!(submission, Submission::Invalid(ref r) if r.failed("password", "required")));
    assert_eq!(fixture.log.last(), Some(Notification::error(VALIDATION_FAILED)));
    assert!(fixture.auth.user().is_none());
}

#[tokio::test]
async fn signup_sends_verification_and_returns_to_login() {
    let fixture = Fixture::new();
    let mut view = fixture.signup_view();
    let flow = tokio::spawn(async move { view.submit(&kim()).await });

    let active = next_modal(&fixture.modal).await;
    assert_eq!(active.request.title(), "Verify your email");
    assert_eq!(active.request.kind(), ModalKind::Dialog);
    let labels: Vec<_> = active.request.actions().iter().map(|a| a.label.as_str()).collect();
    assert_eq!(labels, vec!["Return to login"]);
    assert_eq!(
        fixture.log.entries(),
        vec![Notification::success("Verification email sent to kim@quiz.io")]
    );

    fixture.modal.confirm(active.request.id(), None);
    assert_eq!(flow.await.unwrap(), Submission::Done(Route::Login));
}

#[tokio::test]
async fn dismissing_verification_dialog_still_returns_to_login() {
    let fixture = Fixture::new();
    let mut view = fixture.signup_view();
    let flow = tokio::spawn(async move { view.submit(&kim()).await });

    next_modal(&fixture.modal).await;
    fixture.modal.cancel_active(CancelReason::BackdropClick);
    assert_eq!(flow.await.unwrap(), Submission::Done(Route::Login));
}

#[tokio::test]
async fn duplicate_signup_fails_with_backend_message() {
    let fixture = Fixture::new();
    let mut view = fixture.signup_view();
    let flow = tokio::spawn(async move {
        let first = view.submit(&kim()).await;
        let second = view.submit(&kim()).await;
        (first, second)
    });

    let active = next_modal(&fixture.modal).await;
    fixture.modal.confirm(active.request.id(), None);
    let (first, second) = flow.await.unwrap();
    assert!(first.is_done());
    assert_eq!(
        second,
        Submission::Failed("The email address kim@quiz.io is already in use".into())
    );
}

#[tokio::test]
async fn verified_login_publishes_current_user() {
    let fixture = Fixture::new();
    let mut signup = fixture.signup_view();
    let flow = tokio::spawn(async move { signup.submit(&kim()).await });
    let active = next_modal(&fixture.modal).await;
    fixture.modal.confirm(active.request.id(), None);
    flow.await.unwrap();
    fixture.auth.logout();

    let mut login = LoginView::new(fixture.auth.clone(), fixture.notifier());
    let route = login
        .submit(&LoginForm {
            email: "kim@quiz.io".into(),
            password: "secret1".into(),
        })
        .await;
    assert_eq!(route, Submission::Done(Route::Home));

    let mut user = fixture.auth.watch_user();
    let current = timeout(Duration::from_secs(1), user.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap()
        .clone()
        .unwrap();
    assert_eq!(current.username(), "kim");
}

#[tokio::test]
async fn reset_password_prompts_for_email() {
    let fixture = Fixture::new();
    let auth = fixture.auth.clone();
    let modal = fixture.modal.clone();
    let log = fixture.log.clone();

    let mut signup = fixture.signup_view();
    let flow = tokio::spawn(async move { signup.submit(&kim()).await });
    let active = next_modal(&fixture.modal).await;
    fixture.modal.confirm(active.request.id(), None);
    flow.await.unwrap();

    let reset = tokio::spawn(async move { reset_password(&auth, &modal, &*log).await });
    let active = next_modal(&fixture.modal).await;
    assert_eq!(active.request.input_label(), Some("Email"));
    fixture.modal.confirm(active.request.id(), Some(" kim@quiz.io "));

    assert_eq!(reset.await.unwrap(), Ok(Submission::Done(())));
    assert_eq!(
        fixture.log.last(),
        Some(Notification::success("Password reset email sent to kim@quiz.io"))
    );
}

#[tokio::test]
async fn reset_password_rejects_malformed_email_and_cancellation() {
    let fixture = Fixture::new();

    let (auth, modal, log) = (fixture.auth.clone(), fixture.modal.clone(), fixture.log.clone());
    let reset = tokio::spawn(async move { reset_password(&auth, &modal, &*log).await });
    let active = next_modal(&fixture.modal).await;
    fixture.modal.confirm(active.request.id(), Some("not-an-email"));
    assert!(matches!(reset.await.unwrap(), Ok(Submission::Invalid(_))));

    let (auth, modal, log) = (fixture.auth.clone(), fixture.modal.clone(), fixture.log.clone());
    let reset = tokio::spawn(async move { reset_password(&auth, &modal, &*log).await });
    next_modal(&fixture.modal).await;
    fixture.modal.cancel_active(CancelReason::EscapeKeyDown);
    let err = reset.await.unwrap().unwrap_err();
    assert_eq!(err.reason(), Some(CancelReason::EscapeKeyDown));
}

#[tokio::test]
async fn signed_in_user_changes_password() {
    let fixture = Fixture::new();
    let mut signup = fixture.signup_view();
    let flow = tokio::spawn(async move { signup.submit(&kim()).await });
    let active = next_modal(&fixture.modal).await;
    fixture.modal.confirm(active.request.id(), None);
    flow.await.unwrap();
    fixture.auth.login("kim@quiz.io", "secret1").await.unwrap();

    let (auth, modal, log) = (fixture.auth.clone(), fixture.modal.clone(), fixture.log.clone());
    let change = tokio::spawn(async move { change_password(&auth, &modal, &*log).await });
    let active = next_modal(&fixture.modal).await;
    assert_eq!(active.request.input_label(), Some("New password"));
    fixture.modal.confirm(active.request.id(), Some("letmein2"));
    assert_eq!(change.await.unwrap(), Ok(Submission::Done(())));
    assert_eq!(fixture.log.last(), Some(Notification::success("Password updated")));

    fixture.auth.logout();
    assert!(fixture.auth.login("kim@quiz.io", "secret1").await.is_err());
    assert!(fixture.auth.login("kim@quiz.io", "letmein2").await.is_ok());
}

#[tokio::test]
async fn short_new_password_is_rejected() {
    let fixture = Fixture::new();
    let (auth, modal, log) = (fixture.auth.clone(), fixture.modal.clone(), fixture.log.clone());
    let change = tokio::spawn(async move { change_password(&auth, &modal, &*log).await });
    let active = next_modal(&fixture.modal).await;
    fixture.modal.confirm(active.request.id(), Some("abc"));

    let submission = change.await.unwrap().unwrap();
    assert!(matches!(submission, Submission::Invalid(ref r) if r.failed("", "minLength")));
    assert_eq!(
        fixture.log.last(),
        Some(Notification::error("Password should be at least 6 characters"))
    );
}
