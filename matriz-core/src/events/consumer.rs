//! Queue Consumer: feeds queue messages into the broadcast hub.
//!
//! Deliveries are auto-acknowledged, so a message counts as handled as soon
//! as it reaches this process.

use super::{QueueConfig, declare_queue};
use crate::hub::{HubClosed, HubHandle};
use futures_util::{Stream, StreamExt};
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error(transparent)]
    HubClosed(#[from] HubClosed),
}

pub struct QueueConsumer {
    connection: Connection,
    channel: Channel,
    consumer: Consumer,
    queue: String,
}

impl QueueConsumer {
    /// Connect, declare the queue and start consuming with auto-ack.
    pub async fn connect(config: &QueueConfig) -> Result<Self, ConsumerError> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        declare_queue(&channel, &config.queue).await?;
        let consumer = channel
            .basic_consume(
                &config.queue,
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        info!(queue = %config.queue, "AMQP consumer started");
        Ok(Self {
            connection,
            channel,
            consumer,
            queue: config.queue.clone(),
        })
    }

    /// Forward deliveries to `hub` until the stream ends or `shutdown_rx`
    /// turns true, then close the channel and connection.
    pub async fn run(
        self,
        hub: HubHandle,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<u64, ConsumerError> {
        let Self {
            connection,
            channel,
            consumer,
            queue,
        } = self;
        let shutdown = async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        };
        let bodies = consumer
            .map(|delivery| delivery.map(|d| d.data))
            .take_until(shutdown);
        let result = forward_deliveries(bodies, &hub).await;

        match &result {
            Ok(count) => info!(%queue, forwarded = count, "AMQP consumer stream ended"),
            Err(e) => warn!(%queue, error = %e, "AMQP consumer stopped"),
        }
        let _ = channel.close(200, "shutdown").await;
        let _ = connection.close(200, "shutdown").await;
        result
    }
}

/// Broadcast each body unchanged. Returns how many were forwarded.
pub async fn forward_deliveries<S, E>(deliveries: S, hub: &HubHandle) -> Result<u64, ConsumerError>
where
    S: Stream<Item = Result<Vec<u8>, E>>,
    ConsumerError: From<E>,
{
    let mut deliveries = std::pin::pin!(deliveries);
    let mut forwarded = 0;
    while let Some(delivery) = deliveries.next().await {
        hub.broadcast(delivery?).await?;
        forwarded += 1;
    }
    Ok(forwarded)
}
