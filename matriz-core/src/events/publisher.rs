//! Event Publisher: durable, best-effort notifications over AMQP.

use super::types::EmpresaEvent;
use super::{QueueConfig, declare_queue};
use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Bound for a single publish including the broker confirm.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// AMQP delivery mode that survives a broker restart.
const PERSISTENT: u8 = 2;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("publish timed out")]
    Timeout,

    #[error("broker rejected the message")]
    Nacked,
}

/// Anything that can enqueue a text notification.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: &str) -> Result<(), PublishError>;
}

/// Publisher over a single AMQP connection and channel.
///
/// The channel is shared by concurrent requests; lapin serialises frames
/// internally.
pub struct AmqpPublisher {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl AmqpPublisher {
    /// Connect, open a channel in confirm mode and declare the queue.
    pub async fn connect(config: &QueueConfig) -> Result<Self, PublishError> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default()).await?;
        let channel = match Self::open_channel(&connection, &config.queue).await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = connection.close(200, "setup failed").await;
                return Err(e.into());
            }
        };
        info!(queue = %config.queue, "AMQP publisher connected");
        Ok(Self {
            connection,
            channel,
            queue: config.queue.clone(),
        })
    }

    async fn open_channel(connection: &Connection, queue: &str) -> Result<Channel, lapin::Error> {
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        if let Err(e) = declare_queue(&channel, queue).await {
            let _ = channel.close(200, "setup failed").await;
            return Err(e);
        }
        Ok(channel)
    }

    /// Close the channel, then the connection. Errors are logged only.
    pub async fn close(&self) {
        if let Err(e) = self.channel.close(200, "shutdown").await {
            warn!(error = %e, "AMQP channel close error");
        }
        if let Err(e) = self.connection.close(200, "shutdown").await {
            warn!(error = %e, "AMQP connection close error");
        }
    }

    async fn publish_confirmed(&self, message: &str) -> Result<(), PublishError> {
        let properties = BasicProperties::default()
            .with_content_type("text/plain".into())
            .with_delivery_mode(PERSISTENT);
        let confirmation = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                message.as_bytes(),
                properties,
            )
            .await?
            .await?;
        if confirmation.is_nack() {
            return Err(PublishError::Nacked);
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for AmqpPublisher {
    async fn publish(&self, message: &str) -> Result<(), PublishError> {
        tokio::time::timeout(PUBLISH_TIMEOUT, self.publish_confirmed(message))
            .await
            .map_err(|_| PublishError::Timeout)?
    }
}

/// What happened to a notification. Request flows drop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    /// No publisher configured.
    Skipped,
    /// The publisher errored; already logged.
    Failed,
}

/// Best-effort front for an optional [`EventPublisher`].
#[derive(Clone, Default)]
pub struct Notifier {
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl Notifier {
    pub fn new(publisher: Option<Arc<dyn EventPublisher>>) -> Self {
        Self { publisher }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.publisher.is_some()
    }

    pub async fn notify(&self, event: &EmpresaEvent) -> NotifyOutcome {
        let Some(publisher) = &self.publisher else {
            debug!(%event, "No publisher configured, skipping notification");
            return NotifyOutcome::Skipped;
        };
        match publisher.publish(&event.to_string()).await {
            Ok(()) => NotifyOutcome::Delivered,
            Err(e) => {
                warn!(error = %e, %event, "Failed to publish notification");
                NotifyOutcome::Failed
            }
        }
    }
}
