use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::{oneshot, watch};
use tracing::{debug, info, instrument};

use super::request::{
    ActionType, CancelReason, ModalError, ModalId, ModalKind, ModalRequest, ModalSpec,
};
use crate::form::{required, Form, FormResult};

type ModalResult = Result<Option<String>, ModalError>;

/// What happens to a pending request when a new one is published over it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SupersedePolicy {
    /// Reject the previous request with [`CancelReason::Superseded`].
    #[default]
    Reject,
    /// Leave the previous request pending for as long as the coordinator lives.
    Abandon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveModal {
    pub request: Arc<ModalRequest>,
    pub input_error: Option<FormResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Confirmed,
    Cancelled,
    /// Prompt input failed validation; the modal stays open.
    Invalid(FormResult),
    /// The id does not name the active request (already settled or superseded).
    Stale,
}

struct Pending {
    request: Arc<ModalRequest>,
    settle: oneshot::Sender<ModalResult>,
    input: Form,
}

#[derive(Default)]
struct Slot {
    pending: Option<Pending>,
    abandoned: Vec<oneshot::Sender<ModalResult>>,
}

struct Inner {
    slot: Mutex<Slot>,
    state: watch::Sender<Option<ActiveModal>>,
    policy: SupersedePolicy,
}

/// Holds the single active modal of one UI tree and settles it on user action.
#[derive(Clone)]
pub struct ModalCoordinator {
    inner: Arc<Inner>,
}

impl Default for ModalCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModalCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModalCoordinator")
            .field("active", &self.active().map(|m| m.request.id()))
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl ModalCoordinator {
    pub fn new() -> Self {
        Self::with_policy(SupersedePolicy::default())
    }

    pub fn with_policy(policy: SupersedePolicy) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot::default()),
                state,
                policy,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, active: Option<ActiveModal>) {
        self.inner.state.send_replace(active);
    }

    /// Publishes a new modal and returns a future that settles on user action.
    #[instrument(level = "debug", skip(self, spec), fields(kind = ?spec.kind()))]
    pub fn request(&self, spec: ModalSpec) -> PendingModal {
        let request = Arc::new(ModalRequest::from_spec(spec));
        let (settle, rx) = oneshot::channel();

        let mut slot = self.lock();
        if let Some(previous) = slot.pending.take() {
            let previous_id = previous.request.id();
            match self.inner.policy {
                SupersedePolicy::Reject => {
                    debug!(%previous_id, "rejecting superseded modal");
                    let _ = previous.settle.send(Err(ModalError::Cancelled {
                        reason: CancelReason::Superseded,
                    }));
                }
                SupersedePolicy::Abandon => {
                    debug!(%previous_id, "abandoning superseded modal");
                    // Nobody can observe a sender whose future was dropped.
                    slot.abandoned.retain(|settle| !settle.is_closed());
                    slot.abandoned.push(previous.settle);
                }
            }
        }

        info!(id = %request.id(), title = request.title(), "modal requested");
        slot.pending = Some(Pending {
            request: request.clone(),
            settle,
            input: Form::new(required()),
        });
        self.publish(Some(ActiveModal {
            request: request.clone(),
            input_error: None,
        }));

        PendingModal {
            id: request.id(),
            rx,
        }
    }

    pub async fn dialog(&self, spec: ModalSpec) -> Result<(), ModalError> {
        self.request(spec).await.map(|_| ())
    }

    /// Shows an input prompt; resolves with the entered text once confirmed.
    pub async fn prompt(&self, spec: ModalSpec) -> Result<String, ModalError> {
        self.request(spec).await.map(Option::unwrap_or_default)
    }

    pub fn confirm(&self, id: ModalId, input: Option<&str>) -> Settlement {
        let mut slot = self.lock();
        let Some(pending) = slot.pending.as_mut().filter(|p| p.request.id() == id) else {
            debug!(%id, "confirm ignored for stale modal");
            return Settlement::Stale;
        };

        let value = match pending.request.kind() {
            ModalKind::Dialog => None,
            ModalKind::Prompt => {
                let input = input.unwrap_or_default();
                let result = pending.input.validate(&input.into());
                if !result.is_valid() {
                    debug!(%id, "prompt input rejected");
                    let request = pending.request.clone();
                    self.publish(Some(ActiveModal {
                        request,
                        input_error: Some(result.clone()),
                    }));
                    return Settlement::Invalid(result);
                }
                Some(input.to_owned())
            }
        };

        if let Some(pending) = slot.pending.take() {
            self.publish(None);
            info!(%id, "modal confirmed");
            let _ = pending.settle.send(Ok(value));
        }
        Settlement::Confirmed
    }

    pub fn cancel(&self, id: ModalId, reason: CancelReason) -> Settlement {
        let mut slot = self.lock();
        match slot.pending.take() {
            Some(pending) if pending.request.id() == id => {
                self.publish(None);
                info!(%id, %reason, "modal cancelled");
                let _ = pending.settle.send(Err(ModalError::Cancelled { reason }));
                Settlement::Cancelled
            }
            other => {
                slot.pending = other;
                debug!(%id, "cancel ignored for stale modal");
                Settlement::Stale
            }
        }
    }

    /// Dismisses whatever modal is open (close icon, escape, outside click).
    pub fn cancel_active(&self, reason: CancelReason) -> Settlement {
        match self.active() {
            Some(active) => self.cancel(active.request.id(), reason),
            None => Settlement::Stale,
        }
    }

    pub fn act(&self, id: ModalId, action: ActionType, input: Option<&str>) -> Settlement {
        match action {
            ActionType::Confirm => self.confirm(id, input),
            ActionType::Cancel => self.cancel(id, CancelReason::CancelButtonClick),
        }
    }

    pub fn active(&self) -> Option<ActiveModal> {
        self.inner.state.borrow().clone()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.state.borrow().is_none()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ActiveModal>> {
        self.inner.state.subscribe()
    }
}

#[must_use = "a modal does nothing unless its outcome is awaited"]
#[derive(Debug)]
pub struct PendingModal {
    id: ModalId,
    rx: oneshot::Receiver<ModalResult>,
}

impl PendingModal {
    pub fn id(&self) -> ModalId {
        self.id
    }
}

impl Future for PendingModal {
    type Output = ModalResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|settled| settled.unwrap_or(Err(ModalError::Detached)))
    }
}
