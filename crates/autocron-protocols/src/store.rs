//! Durable text storage protocol.

use async_trait::async_trait;

use crate::error::StoreError;

/// A single durable text blob. Writes replace the whole content.
#[async_trait]
pub trait TextStore: Send + Sync {
    /// Read the content. `None` when nothing was ever written.
    async fn read(&self) -> Result<Option<String>, StoreError>;

    /// Replace the content.
    async fn write(&self, content: &str) -> Result<(), StoreError>;

    /// Human-readable location, used in logs and errors.
    fn location(&self) -> String;
}
