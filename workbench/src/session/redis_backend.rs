//! Redis session backend
//!
//! Sessions are plain string keys, so several workbench processes pointed at the
//! same Redis share them. A failed command reconnects once and retries; a second
//! failure is reported to the session store, which degrades to memory.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::backend::{SessionBackend, StoreError};

pub struct RedisBackend {
    client: redis::Client,
    conn: Mutex<MultiplexedConnection>,
}

impl RedisBackend {
    /// Connect to Redis. No retry loop: a workbench without Redis keeps working from memory.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            client,
            conn: Mutex::new(conn),
        })
    }

    async fn connection(&self) -> MultiplexedConnection {
        self.conn.lock().await.clone()
    }

    /// Reconnect to Redis
    async fn reconnect(&self) -> Result<MultiplexedConnection, StoreError> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        *self.conn.lock().await = conn.clone();
        Ok(conn)
    }
}

#[async_trait]
impl SessionBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("Redis GET failed: {}. Reconnecting...", e);
                let mut conn = self.reconnect().await?;
                Ok(conn.get::<_, Option<String>>(key).await?)
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await;
        if let Err(e) = conn.set::<_, _, ()>(key, value).await {
            warn!("Redis SET failed: {}. Reconnecting...", e);
            let mut conn = self.reconnect().await?;
            conn.set::<_, _, ()>(key, value).await?;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await;
        if let Err(e) = conn.del::<_, ()>(key).await {
            warn!("Redis DEL failed: {}. Reconnecting...", e);
            let mut conn = self.reconnect().await?;
            conn.del::<_, ()>(key).await?;
        }
        Ok(())
    }
}
