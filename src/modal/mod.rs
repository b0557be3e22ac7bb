//! Promise-style dialogs and prompts.
//!
//! A view calls [`ModalCoordinator::request`] and awaits the returned future.
//! A rendering container watches [`ModalCoordinator::subscribe`] and feeds the
//! user's choice back through `confirm` / `cancel`.

pub mod coordinator;
pub mod request;

pub use coordinator::{ActiveModal, ModalCoordinator, PendingModal, Settlement, SupersedePolicy};
pub use request::{
    default_actions, ActionType, CancelReason, ModalAction, ModalError, ModalId, ModalKind,
    ModalRequest, ModalSpec, Severity,
};
