// src/connectors/traits.rs
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Connects, subscribes to `channel` and forwards every text frame to `sender`
    /// from a background task. A connection or handshake failure is returned
    /// here; a later disconnect closes `sender`.
    async fn subscribe_trades(&mut self, channel: &str, sender: mpsc::Sender<String>)
        -> Result<()>;
}
