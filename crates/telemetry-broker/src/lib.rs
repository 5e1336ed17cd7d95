//! Broker Adapter (spec §4.8): topic formatting, server-selection TTL cache,
//! and fire-and-forget publish, plus the bit-exact JSON payload shapes
//! (spec §6) used by the engines that publish through it.
//!
//! The broker itself is an external collaborator (spec §1/§6); this crate
//! owns the trait boundary and the pure formatting/rendering logic around it.

pub mod fake;
pub mod payload;
pub mod server;
pub mod topic;

use async_trait::async_trait;
use thiserror::Error;

pub use server::{ServerCache, ServerDirectory, DEFAULT_SERVER};
pub use topic::topic_for;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker publish to {server}/{topic} unavailable: {message}")]
    Unavailable { server: String, topic: String, message: String },
}

/// `publish(server, topic, payload, qos, retain)` (spec §6). Fire-and-forget:
/// callers never block a tick on broker acknowledgement, and a failed
/// publish is logged and dropped — the next tick re-publishes open rows
/// (spec §7 `BrokerUnavailable`).
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, server: &str, topic: &str, payload: Vec<u8>, qos: u8, retain: bool) -> Result<(), BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::fake::RecordingBroker;
    use super::*;

    #[tokio::test]
    async fn publish_records_the_call() {
        let broker = RecordingBroker::default();
        broker.publish("Local Broker", "m/NA/P1/A/B/line/L1/Status", b"{}".to_vec(), 0, true).await.unwrap();
        let published = broker.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "Local Broker");
    }
}
