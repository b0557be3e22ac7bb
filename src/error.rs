use teloxide::dispatching::dialogue::InMemStorageError;

use crate::auth::AuthError;
use crate::database::StoreError;
use crate::modal::ModalError;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Modal(#[from] ModalError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),
    #[error("dialogue storage failed: {0}")]
    Dialogue(#[from] InMemStorageError),
}

impl FlowError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FlowError::Modal(err) if err.is_cancellation())
    }
}
