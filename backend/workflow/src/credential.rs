use anyhow::Result;
use async_trait::async_trait;

use sketchnote_core::{ApiKeySlot, CredentialProvider};

/// Credential provider backed by an [`ApiKeySlot`].
///
/// The key itself arrives out of band (an HTTP request, a config file), so
/// opening the selector has nothing left to do.
#[derive(Debug, Clone)]
pub struct KeySlotCredentials {
    slot: ApiKeySlot,
}

impl KeySlotCredentials {
    pub fn new(slot: ApiKeySlot) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> &ApiKeySlot {
        &self.slot
    }
}

#[async_trait]
impl CredentialProvider for KeySlotCredentials {
    async fn has_selected_credential(&self) -> bool {
        self.slot.is_set().await
    }

    async fn open_selector(&self) -> Result<()> {
        Ok(())
    }
}
