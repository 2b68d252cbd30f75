//! Text publisher for Zenoh topics.
//!
//! Zenoh has no broker-side retained messages. Topics published with
//! `retain = true` go through a zenoh-ext [`AdvancedPublisher`] with a
//! one-sample cache, so subscribers that join later (and ask for history)
//! still receive the last value. Everything else is a plain `put`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use zenoh::Session;
use zenoh::key_expr::KeyExpr;
use zenoh_ext::{AdvancedPublisher, AdvancedPublisherBuilderExt, CacheConfig};

use crate::error::{BridgeError, Result};

/// Samples kept per retained topic.
const RETAINED_SAMPLES: usize = 1;

/// Publisher for text payloads, shared by clone.
#[derive(Clone)]
pub struct Publisher {
    session: Arc<Session>,
    key_prefix: String,
    retained: Arc<RwLock<HashMap<String, AdvancedPublisher<'static>>>>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(session: Arc<Session>, key_prefix: impl Into<String>) -> Self {
        Self {
            session,
            key_prefix: key_prefix.into(),
            retained: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the key prefix.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Get a reference to the Zenoh session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Build a full key expression from a suffix.
    pub fn build_key(&self, suffix: &str) -> String {
        join_key(&self.key_prefix, suffix)
    }

    /// Publish a text payload to a full key.
    pub async fn publish(&self, key: &str, payload: &str, retain: bool) -> Result<()> {
        if retain {
            self.publish_retained(key, payload).await
        } else {
            self.session
                .put(key, payload.to_string())
                .await
                .map_err(|e| publish_error(key, e))
        }
    }

    /// Publish a JSON value to a full key.
    pub async fn publish_json<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        retain: bool,
    ) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        self.publish(key, &payload, retain).await
    }

    async fn publish_retained(&self, key: &str, payload: &str) -> Result<()> {
        {
            let retained = self.retained.read().await;
            if let Some(publisher) = retained.get(key) {
                return publisher
                    .put(payload.to_string())
                    .await
                    .map_err(|e| publish_error(key, e));
            }
        }

        let key_expr: KeyExpr<'static> =
            KeyExpr::try_from(key.to_string()).map_err(|e| publish_error(key, e))?;
        let publisher = self
            .session
            .declare_publisher(key_expr)
            .cache(CacheConfig::default().max_samples(RETAINED_SAMPLES))
            .publisher_detection()
            .await
            .map_err(|e| BridgeError::Publish {
                key: key.to_string(),
                message: format!("Failed to declare retained publisher: {}", e),
            })?;

        tracing::debug!(key = %key, "Declared retained publisher");

        publisher
            .put(payload.to_string())
            .await
            .map_err(|e| publish_error(key, e))?;

        self.retained.write().await.insert(key.to_string(), publisher);
        Ok(())
    }
}

fn publish_error(key: &str, err: impl std::fmt::Display) -> BridgeError {
    BridgeError::Publish {
        key: key.to_string(),
        message: err.to_string(),
    }
}

/// Join a prefix and a suffix with a `/`, tolerating empty parts.
pub fn join_key(prefix: &str, suffix: &str) -> String {
    match (prefix.is_empty(), suffix.is_empty()) {
        (_, true) => prefix.to_string(),
        (true, false) => suffix.to_string(),
        (false, false) => format!("{}/{}", prefix.trim_end_matches('/'), suffix),
    }
}
