use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModalKind {
    Dialog,
    Prompt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalAction {
    pub kind: ActionType,
    pub label: String,
}

impl ModalAction {
    pub fn confirm(label: impl Into<String>) -> Self {
        Self {
            kind: ActionType::Confirm,
            label: label.into(),
        }
    }

    pub fn cancel(label: impl Into<String>) -> Self {
        Self {
            kind: ActionType::Cancel,
            label: label.into(),
        }
    }
}

pub fn default_actions() -> Vec<ModalAction> {
    vec![ModalAction::cancel("Cancel"), ModalAction::confirm("Confirm")]
}

/// Why a modal was dismissed without being confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CancelReason {
    CancelButtonClick,
    CloseButtonClick,
    BackdropClick,
    EscapeKeyDown,
    UnknownActionType,
    Superseded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CancelReason::CancelButtonClick => "cancelButtonClick",
            CancelReason::CloseButtonClick => "closeButtonClick",
            CancelReason::BackdropClick => "backdropClick",
            CancelReason::EscapeKeyDown => "escapeKeyDown",
            CancelReason::UnknownActionType => "unknownActionType",
            CancelReason::Superseded => "superseded",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModalError {
    #[error("Dialog canceled (reason: {reason})")]
    Cancelled { reason: CancelReason },
    #[error("modal coordinator dropped before the request settled")]
    Detached,
}

impl ModalError {
    pub fn reason(&self) -> Option<CancelReason> {
        match self {
            ModalError::Cancelled { reason } => Some(*reason),
            ModalError::Detached => None,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, ModalError::Cancelled { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalSpec {
    kind: ModalKind,
    severity: Severity,
    title: String,
    body: String,
    actions: Option<Vec<ModalAction>>,
}

impl ModalSpec {
    pub fn dialog(title: impl Into<String>) -> Self {
        Self {
            kind: ModalKind::Dialog,
            severity: Severity::default(),
            title: title.into(),
            body: String::new(),
            actions: None,
        }
    }

    pub fn prompt(title: impl Into<String>, input_label: impl Into<String>) -> Self {
        Self {
            kind: ModalKind::Prompt,
            severity: Severity::default(),
            title: title.into(),
            body: input_label.into(),
            actions: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.body = message.into();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn actions(mut self, actions: Vec<ModalAction>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn kind(&self) -> ModalKind {
        self.kind
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModalId(Uuid);

impl fmt::Display for ModalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A published modal. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalRequest {
    id: ModalId,
    kind: ModalKind,
    severity: Severity,
    title: String,
    body: String,
    actions: Vec<ModalAction>,
}

impl ModalRequest {
    pub(crate) fn from_spec(spec: ModalSpec) -> Self {
        Self {
            id: ModalId(Uuid::new_v4()),
            kind: spec.kind,
            severity: spec.severity,
            title: spec.title,
            body: spec.body,
            actions: spec.actions.unwrap_or_else(default_actions),
        }
    }

    pub fn id(&self) -> ModalId {
        self.id
    }

    pub fn kind(&self) -> ModalKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> Option<&str> {
        match self.kind {
            ModalKind::Dialog => Some(&self.body),
            ModalKind::Prompt => None,
        }
    }

    pub fn input_label(&self) -> Option<&str> {
        match self.kind {
            ModalKind::Prompt => Some(&self.body),
            ModalKind::Dialog => None,
        }
    }

    pub fn actions(&self) -> &[ModalAction] {
        &self.actions
    }

    pub fn action_for_label(&self, label: &str) -> Option<&ModalAction> {
        self.actions.iter().find(|action| action.label == label)
    }
}
