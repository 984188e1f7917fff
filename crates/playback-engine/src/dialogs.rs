//! Operator prompts. They may stay open for as long as the operator likes.

use cuegrid_show_model::{SlotContent, SlotKey};

use crate::orchestrator::Target;

/// Prompts shown to the operator. Only invoked on cold start of an empty
/// slot and when confirming a delete.
#[async_trait::async_trait]
pub trait Dialogs: Send + Sync {
    /// Ask for an asset for `key`. `None` when the operator cancels.
    async fn pick_asset(&self, key: SlotKey) -> Option<SlotContent>;

    async fn confirm_delete(&self, target: Target) -> bool;
}

/// Prompts for unattended runs: never assigns, always confirms.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

#[async_trait::async_trait]
impl Dialogs for Unattended {
    async fn pick_asset(&self, key: SlotKey) -> Option<SlotContent> {
        tracing::debug!(slot = %key, "No operator to pick an asset");
        None
    }

    async fn confirm_delete(&self, _target: Target) -> bool {
        true
    }
}
