// src/connectors/coincheck.rs
use crate::connectors::messages::SubscribeRequest;
use crate::connectors::traits::StreamClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};
use url::Url;

/// Public trade stream of Coincheck. No credentials needed.
pub struct CoincheckClient {
    ws_url: String,
}

impl CoincheckClient {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }
}

#[async_trait]
impl StreamClient for CoincheckClient {
    async fn subscribe_trades(
        &mut self,
        channel: &str,
        sender: mpsc::Sender<String>,
    ) -> Result<()> {
        let url = Url::parse(&self.ws_url)
            .with_context(|| format!("Invalid websocket url {}", self.ws_url))?;

        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {}", self.ws_url))?;
        let (mut write, mut read) = ws_stream.split();

        let handshake = serde_json::to_string(&SubscribeRequest::new(channel))?;
        write
            .send(Message::Text(handshake))
            .await
            .context("Failed to send subscribe request")?;
        info!("WebSocket connected, subscribed to {}", channel);

        let channel = channel.to_string();
        tokio::spawn(async move {
            // Keep the write half alive so the connection is not half-closed.
            let _write = write;
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if sender.send(text).await.is_err() {
                            debug!("Feed receiver dropped, stopping reader for {}", channel);
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        info!("WebSocket closed by server for {}: {:?}", channel, frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("WebSocket Error for {}: {}", channel, e);
                        break;
                    }
                }
            }
            info!("WebSocket task finished for {}", channel);
        });

        Ok(())
    }
}
