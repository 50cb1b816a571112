//! Event notifications about empresa records.
//!
//! # Event Flow
//!
//! 1. The CRUD processors emit an [`EmpresaEvent`] through a [`Notifier`]
//! 2. [`AmqpPublisher`] enqueues its text on the durable queue
//! 3. [`QueueConsumer`] reads the queue and feeds the broadcast hub
//! 4. The hub pushes the text to every live subscriber
//!
//! Publishing is best-effort: a missing or failing publisher never fails
//! the request that triggered the event.

pub mod consumer;
pub mod publisher;
pub mod types;

use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::{Channel, Queue};

pub use consumer::{ConsumerError, QueueConsumer, forward_deliveries};
pub use publisher::{AmqpPublisher, EventPublisher, Notifier, NotifyOutcome, PublishError};
pub use types::EmpresaEvent;

/// Queue used when none is configured.
pub const DEFAULT_QUEUE: &str = "logs.empresas";

/// Broker location and queue name shared by producer and consumer.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub url: String,
    pub queue: String,
}

/// Declare the durable queue. Both sides call this so whichever starts
/// first creates it.
pub(crate) async fn declare_queue(channel: &Channel, name: &str) -> Result<Queue, lapin::Error> {
    channel
        .queue_declare(
            name,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
}
