use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Shared holder for the provider key selected for one workflow.
///
/// The selector writes into it and the model client reads it at call time,
/// so a key chosen after the client was built is picked up on the next call.
#[derive(Clone, Default)]
pub struct ApiKeySlot {
    inner: Arc<RwLock<Option<String>>>,
}

impl ApiKeySlot {
    pub fn new(initial: Option<String>) -> Self {
        let initial = initial.filter(|k| !k.trim().is_empty());
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn set(&self, key: impl Into<String>) {
        let key = key.into();
        let mut guard = self.inner.write().await;
        *guard = if key.trim().is_empty() { None } else { Some(key) };
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    pub async fn get(&self) -> Option<String> {
        self.inner.read().await.clone()
    }

    pub async fn is_set(&self) -> bool {
        self.inner.read().await.is_some()
    }
}

impl fmt::Debug for ApiKeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeySlot").finish_non_exhaustive()
    }
}
