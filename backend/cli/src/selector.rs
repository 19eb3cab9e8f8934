use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use sketchnote_core::{ApiKeySlot, CredentialProvider};

/// Terminal key picker: asks for the provider key on stdin.
pub struct StdinKeySelector<R> {
    slot: ApiKeySlot,
    input: Mutex<R>,
}

impl StdinKeySelector<BufReader<tokio::io::Stdin>> {
    pub fn new(slot: ApiKeySlot) -> Self {
        Self::with_input(slot, BufReader::new(tokio::io::stdin()))
    }
}

impl<R> StdinKeySelector<R> {
    pub fn with_input(slot: ApiKeySlot, input: R) -> Self {
        Self {
            slot,
            input: Mutex::new(input),
        }
    }
}

#[async_trait]
impl<R> CredentialProvider for StdinKeySelector<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn has_selected_credential(&self) -> bool {
        self.slot.is_set().await
    }

    async fn open_selector(&self) -> Result<()> {
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(b"Gemini API key (from a paid Google Cloud project): ")
            .await?;
        stderr.flush().await?;

        let mut line = String::new();
        self.input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .context("Failed to read API key")?;

        let key = line.trim();
        if key.is_empty() {
            bail!("no API key entered");
        }
        self.slot.set(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entered_key_lands_in_the_slot() {
        let slot = ApiKeySlot::default();
        let selector = StdinKeySelector::with_input(slot.clone(), &b"  AIza-entered \n"[..]);

        assert!(!selector.has_selected_credential().await);
        selector.open_selector().await.unwrap();
        assert_eq!(slot.get().await.as_deref(), Some("AIza-entered"));
        assert!(selector.has_selected_credential().await);
    }

    #[tokio::test]
    async fn blank_input_is_an_error() {
        let slot = ApiKeySlot::default();
        let selector = StdinKeySelector::with_input(slot.clone(), &b"\n"[..]);

        assert!(selector.open_selector().await.is_err());
        assert!(!slot.is_set().await);
    }
}
