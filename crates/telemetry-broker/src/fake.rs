//! In-memory `Broker`/`ServerDirectory` fakes used by tests and local/dev
//! runs.

use crate::server::ServerDirectory;
use crate::{Broker, BrokerError};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingBroker {
    pub published: Mutex<Vec<(String, String, Vec<u8>, u8, bool)>>,
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn publish(&self, server: &str, topic: &str, payload: Vec<u8>, qos: u8, retain: bool) -> Result<(), BrokerError> {
        self.published.lock().unwrap().push((server.to_string(), topic.to_string(), payload, qos, retain));
        Ok(())
    }
}

/// Fixed `ServerDirectory`: no `BrokerName` tag, one enumerated server. Used
/// where no real tag source for server selection exists (spec §4.8 falls
/// back to the first enumerated server).
pub struct StaticServerDirectory {
    pub servers: Vec<String>,
}

impl StaticServerDirectory {
    pub fn new(servers: Vec<String>) -> Self {
        Self { servers }
    }
}

#[async_trait]
impl ServerDirectory for StaticServerDirectory {
    async fn read_broker_name_tag(&self) -> Option<String> {
        None
    }
    async fn enumerated_servers(&self) -> Vec<String> {
        self.servers.clone()
    }
}
