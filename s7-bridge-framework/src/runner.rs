//! Bridge runner for lifecycle management.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinHandle;

use crate::BridgeArgs;
use crate::config::{BridgeConfig, LoggingConfig};
use crate::error::{BridgeError, Result};
use crate::init_tracing;
use crate::publisher::Publisher;
use crate::session::connect;
use crate::status::StatusPublisher;

type ShutdownHook = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Owns the pieces every bridge needs: logging, the Zenoh session, the
/// publisher, worker tasks and the Ctrl+C driven shutdown sequence.
pub struct BridgeRunner<C: BridgeConfig> {
    name: String,
    version: String,
    config: C,
    session: Arc<zenoh::Session>,
    publisher: Publisher,
    status_publisher: Option<StatusPublisher>,
    tasks: Vec<JoinHandle<()>>,
    shutdown_hooks: Vec<ShutdownHook>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Initialize logging (CLI level wins over config), then connect to Zenoh.
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                format: config.logging().format,
            },
            None => config.logging().clone(),
        };
        init_tracing(&log_config)?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let session = Arc::new(connect(config.zenoh()).await?);
        let publisher = Publisher::new(session.clone(), config.key_prefix());

        Ok(Self {
            name,
            version,
            config,
            session,
            publisher,
            status_publisher: None,
            tasks: Vec::new(),
            shutdown_hooks: Vec::new(),
        })
    }

    /// Publish "running"/"offline" status documents around [`run`](Self::run).
    pub fn with_status_publishing(mut self) -> Self {
        self.status_publisher = Some(StatusPublisher::new(
            self.publisher.clone(),
            &self.name,
            &self.version,
        ));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Spawn a worker task; it is aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(future));
    }

    /// Run `hook` after workers are stopped and before the session closes.
    pub fn on_shutdown<F>(&mut self, hook: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shutdown_hooks.push(Box::pin(hook));
    }

    /// Run until Ctrl+C, with extra fields in the "running" status.
    pub async fn run_with_metadata(self, metadata: Option<serde_json::Value>) -> Result<()> {
        if let Some(ref status_pub) = self.status_publisher {
            if let Err(e) = status_pub.publish_running(metadata).await {
                tracing::warn!(error = %e, "Failed to publish running status");
            }
        }

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        signal::ctrl_c().await.map_err(BridgeError::Io)?;

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        for task in &self.tasks {
            task.abort();
        }

        for hook in self.shutdown_hooks {
            hook.await;
        }

        if let Some(ref status_pub) = self.status_publisher {
            if let Err(e) = status_pub.publish_offline().await {
                tracing::warn!(error = %e, "Failed to publish offline status");
            }
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }

        tracing::info!(bridge = %self.name, "Bridge stopped");

        Ok(())
    }
}
