//! Inbound write listener.
//!
//! Every key handed to [`SetListener::listen`] gets a Zenoh subscriber and a
//! queryable. Puts are forwarded fire-and-forget; queries carry their payload
//! and receive a reply once the bridge has handled the write, which is how a
//! caller learns that a malformed value was refused.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use zenoh::Session;
use zenoh::sample::SampleKind;

use crate::error::{BridgeError, Result};

/// Reply payload sent to a query when the write was accepted.
pub const ACK_OK: &str = "ok";

/// A write request received from the messaging side.
#[derive(Debug)]
pub struct InboundWrite {
    /// Full key the request arrived on.
    pub key: String,
    /// Payload decoded as UTF-8 (lossy).
    pub payload: String,
    reply: Option<oneshot::Sender<std::result::Result<(), String>>>,
}

impl InboundWrite {
    /// Create a request that expects no acknowledgment.
    pub fn new(key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            reply: None,
        }
    }

    /// Create a request whose outcome is reported on the returned receiver.
    pub fn with_reply(
        key: impl Into<String>,
        payload: impl Into<String>,
    ) -> (Self, oneshot::Receiver<std::result::Result<(), String>>) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            key: key.into(),
            payload: payload.into(),
            reply: Some(tx),
        };
        (request, rx)
    }

    /// Whether the sender is waiting for an acknowledgment.
    pub fn expects_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Report the outcome to the sender, if it asked for one.
    pub fn respond(self, outcome: std::result::Result<(), String>) {
        if let Some(reply) = self.reply {
            // Receiver gone means the query timed out on the other side.
            let _ = reply.send(outcome);
        }
    }
}

/// Declares subscribers and queryables for set keys and funnels them into one channel.
pub struct SetListener {
    session: Arc<Session>,
    tx: mpsc::Sender<InboundWrite>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SetListener {
    /// Create a listener and the receiving end of its request channel.
    pub fn new(session: Arc<Session>, capacity: usize) -> (Self, mpsc::Receiver<InboundWrite>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let listener = Self {
            session,
            tx,
            tasks: Mutex::new(Vec::new()),
        };
        (listener, rx)
    }

    /// Start listening for writes on `key_expr`.
    pub async fn listen(&self, key_expr: &str) -> Result<()> {
        let subscriber = self
            .session
            .declare_subscriber(key_expr.to_string())
            .await
            .map_err(|e| subscribe_error(key_expr, e))?;

        let queryable = self
            .session
            .declare_queryable(key_expr.to_string())
            .await
            .map_err(|e| subscribe_error(key_expr, e))?;

        tracing::debug!(key = %key_expr, "Listening for writes");

        let tx = self.tx.clone();
        let puts = tokio::spawn(async move {
            while let Ok(sample) = subscriber.recv_async().await {
                if sample.kind() == SampleKind::Delete {
                    continue;
                }
                let payload = String::from_utf8_lossy(&sample.payload().to_bytes()).into_owned();
                let request = InboundWrite::new(sample.key_expr().as_str(), payload);
                if tx.send(request).await.is_err() {
                    break;
                }
            }
        });

        let tx = self.tx.clone();
        let queries = tokio::spawn(async move {
            while let Ok(query) = queryable.recv_async().await {
                let payload = query
                    .payload()
                    .map(|p| String::from_utf8_lossy(&p.to_bytes()).into_owned())
                    .unwrap_or_default();
                let (request, outcome) = InboundWrite::with_reply(query.key_expr().as_str(), payload);
                if tx.send(request).await.is_err() {
                    break;
                }

                let result = match outcome.await {
                    Ok(Ok(())) => query.reply(query.key_expr().clone(), ACK_OK).await,
                    Ok(Err(message)) => query.reply_err(message).await,
                    Err(_) => query.reply_err("write was not handled").await,
                };
                if let Err(e) = result {
                    tracing::warn!(key = %query.key_expr(), error = %e, "Failed to acknowledge write");
                }
            }
        });

        let mut tasks = self.tasks.lock().await;
        tasks.push(puts);
        tasks.push(queries);
        Ok(())
    }

    /// Stop all forwarding tasks.
    pub async fn shutdown(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }
}

fn subscribe_error(key: &str, err: impl std::fmt::Display) -> BridgeError {
    BridgeError::Subscribe {
        key: key.to_string(),
        message: err.to_string(),
    }
}
