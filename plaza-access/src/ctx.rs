//! Per-operation context threaded through the facade and hooks.

use std::sync::Arc;

use plaza_core::{Localizer, RecordId};
use plaza_storage::TxToken;

/// Carries the transaction handle, the acting user and the boundary's
/// localizer through one logical operation. Cheap to clone.
#[derive(Clone, Default)]
pub struct OpCtx {
    /// Transaction handle, if the caller opened one via
    /// `run_in_transaction`. Calls without it auto-commit independently.
    pub tx: Option<TxToken>,
    /// Id of the acting user, for hooks that stamp ownership.
    pub actor_id: Option<RecordId>,
    /// Message renderer supplied by the boundary; hooks may use it for
    /// entity-specific validation messages.
    pub localizer: Option<Arc<dyn Localizer>>,
}

impl OpCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_tx(tx: TxToken) -> Self {
        Self {
            tx: Some(tx),
            ..Self::default()
        }
    }

    pub fn with_actor(mut self, actor_id: RecordId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = Some(localizer);
        self
    }
}

impl std::fmt::Debug for OpCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpCtx")
            .field("tx", &self.tx)
            .field("actor_id", &self.actor_id)
            .field("localizer", &self.localizer.is_some())
            .finish()
    }
}
