//! Message publisher boundary.
//!
//! The resilience loop only needs a `publish(channel, payload)` contract;
//! the Redis implementation behind it is plain pub/sub with best-effort
//! delivery and no acknowledgment beyond the command reply.

use crate::config::RedisConfig;
use crate::error::StreamError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

/// Delivers serialized snapshots to zero-or-more subscribers.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StreamError>;
}

/// Redis pub/sub publisher.
pub struct RedisPublisher {
    conn: ConnectionManager,
}

impl RedisPublisher {
    /// Connect to Redis and verify the connection with a PING.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StreamError> {
        let client = redis::Client::open(config.url())
            .map_err(|e| StreamError::Config(format!("invalid redis connection config: {e}")))?;
        let mut conn = client.get_connection_manager().await?;

        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("connected to redis at {}:{}", config.host, config.port);

        Ok(Self { conn })
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StreamError> {
        // ConnectionManager is a cheap clone over one multiplexed connection.
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(channel, payload).await?;
        debug!("published to {channel} ({receivers} subscriber(s))");
        Ok(())
    }
}
