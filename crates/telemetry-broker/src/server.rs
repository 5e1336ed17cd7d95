//! Server-selection TTL cache (spec §4.8): read the well-known `BrokerName`
//! tag, cache 60 s, fall back to the first enumerated server, ultimate
//! default `"Local Broker"`.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub const DEFAULT_SERVER: &str = "Local Broker";

#[async_trait]
pub trait ServerDirectory: Send + Sync {
    async fn read_broker_name_tag(&self) -> Option<String>;
    async fn enumerated_servers(&self) -> Vec<String>;
}

pub struct ServerCache {
    ttl: Duration,
    cached: RwLock<Option<(String, Instant)>>,
}

impl ServerCache {
    pub fn new() -> Self {
        Self { ttl: Duration::from_secs(60), cached: RwLock::new(None) }
    }

    pub async fn resolve(&self, directory: &dyn ServerDirectory) -> String {
        if let Some((name, fetched_at)) = self.cached.read().await.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return name.clone();
            }
        }
        let resolved = match directory.read_broker_name_tag().await {
            Some(name) => name,
            None => directory
                .enumerated_servers()
                .await
                .into_iter()
                .next()
                .unwrap_or_else(|| DEFAULT_SERVER.to_string()),
        };
        *self.cached.write().await = Some((resolved.clone(), Instant::now()));
        resolved
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

impl Default for ServerCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Fixed {
        tag: Option<String>,
        servers: Vec<String>,
        reads: AtomicU32,
    }

    #[async_trait]
    impl ServerDirectory for Fixed {
        async fn read_broker_name_tag(&self) -> Option<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.tag.clone()
        }
        async fn enumerated_servers(&self) -> Vec<String> {
            self.servers.clone()
        }
    }

    #[tokio::test]
    async fn prefers_broker_name_tag() {
        let dir = Fixed { tag: Some("MQTT-Primary".into()), servers: vec!["Fallback".into()], reads: AtomicU32::new(0) };
        let cache = ServerCache::new();
        assert_eq!(cache.resolve(&dir).await, "MQTT-Primary");
    }

    #[tokio::test]
    async fn falls_back_to_first_enumerated_server() {
        let dir = Fixed { tag: None, servers: vec!["Secondary".into(), "Tertiary".into()], reads: AtomicU32::new(0) };
        let cache = ServerCache::new();
        assert_eq!(cache.resolve(&dir).await, "Secondary");
    }

    #[tokio::test]
    async fn ultimate_default_when_nothing_resolves() {
        let dir = Fixed { tag: None, servers: vec![], reads: AtomicU32::new(0) };
        let cache = ServerCache::new();
        assert_eq!(cache.resolve(&dir).await, DEFAULT_SERVER);
    }

    #[tokio::test]
    async fn caches_resolution_without_re_reading_tag() {
        let dir = Fixed { tag: Some("X".into()), servers: vec![], reads: AtomicU32::new(0) };
        let cache = ServerCache::new();
        cache.resolve(&dir).await;
        cache.resolve(&dir).await;
        assert_eq!(dir.reads.load(Ordering::SeqCst), 1);
    }
}
