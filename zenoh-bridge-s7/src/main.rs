//! Zenoh bridge for Siemens S7 data blocks.
//!
//! Polls configured data block addresses, publishes changed values to Zenoh
//! and writes values received on `/set` keys back to the controller.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use s7_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner, SetListener};

use zenoh_bridge_s7::config::S7BridgeConfig;
use zenoh_bridge_s7::discovery::{self, OFFLINE, ONLINE};
use zenoh_bridge_s7::dispatch::Dispatcher;
use zenoh_bridge_s7::factory::build_registry;
use zenoh_bridge_s7::plc::{MemoryDataBlocks, PlcClient};
use zenoh_bridge_s7::poller::Poller;
use zenoh_bridge_s7::topic::TopicLayout;
use zenoh_bridge_s7::transport::StatePublisher;
use zenoh_bridge_s7::zenoh_io::serve_writes;

/// Pending inbound writes before the listener applies backpressure.
const WRITE_QUEUE: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("s7.json5");

    let config = S7BridgeConfig::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;

    let runner = BridgeRunner::new_with_args("s7", config, Some(&args))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let mut runner = runner.with_status_publishing();

    let s7_config = runner.config().s7.clone();
    let plc_config = runner.config().plc.clone();
    let discovery_config = runner.config().discovery.clone();

    let layout = TopicLayout::new(s7_config.key_prefix.clone());
    let registry = Arc::new(build_registry(&s7_config, &layout));

    let memory = Arc::new(MemoryDataBlocks::new());
    for block in &plc_config.data_blocks {
        memory.add_block(block.number, block.size);
    }
    let plc = Arc::new(PlcClient::new(memory));
    for device in registry.iter() {
        plc.register_device(device);
    }

    let publisher: Arc<dyn StatePublisher> = Arc::new(runner.publisher());
    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        layout.clone(),
        publisher.clone(),
        plc.clone(),
    ));

    let (listener, requests) = SetListener::new(runner.session().clone(), WRITE_QUEUE);
    let listener = Arc::new(listener);
    let subscribed = dispatcher.subscribe_all(listener.as_ref()).await;

    discovery::publish_availability(&registry, &layout, publisher.as_ref(), ONLINE).await;
    discovery::announce(&registry, &layout, &discovery_config, publisher.as_ref()).await;

    tracing::info!(
        prefix = %s7_config.key_prefix,
        devices = registry.len(),
        items = plc.len(),
        set_topics = subscribed,
        interval_ms = plc_config.poll_interval_ms,
        "S7 bridge running"
    );

    let poller = Poller::new(
        plc.clone(),
        dispatcher.clone(),
        Duration::from_millis(plc_config.poll_interval_ms),
    );
    runner.spawn(poller.run());
    runner.spawn(serve_writes(dispatcher, requests));

    {
        let registry = registry.clone();
        let layout = layout.clone();
        runner.on_shutdown(async move {
            listener.shutdown().await;
            discovery::publish_availability(&registry, &layout, publisher.as_ref(), OFFLINE).await;
        });
    }

    let metadata = serde_json::json!({
        "key_prefix": s7_config.key_prefix,
        "devices": registry.names(),
        "poll_interval_ms": plc_config.poll_interval_ms,
        "set_topics": subscribed,
        "discovery": discovery_config.enabled,
    });

    runner
        .run_with_metadata(Some(metadata))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))
}
