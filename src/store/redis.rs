//! Redis-backed store.
//!
//! Uses a multiplexed connection manager so every pipeline task can hold
//! a cheap clone. Multi-key property updates run inside MULTI/EXEC as a
//! best-effort compound; a torn write is repaired by the next ingest
//! from the same source.

use super::{keys, Store};
use crate::config::{LogLengths, RedisServerConfig};
use crate::error::Result;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::info;

/// Applied to both connect and per-command responses
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// The concrete store used by every bridge
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
    lengths: LogLengths,
}

impl RedisStore {
    /// Connect to the configured Redis server
    pub async fn open(cfg: &RedisServerConfig, lengths: LogLengths) -> Result<Self> {
        cfg.validate()?;
        let client = redis::Client::open(cfg.url())?;
        let manager_cfg = ConnectionManagerConfig::new()
            .set_connection_timeout(IO_TIMEOUT)
            .set_response_timeout(IO_TIMEOUT);
        let conn = ConnectionManager::new_with_config(client, manager_cfg).await?;
        info!(host = %cfg.host, port = cfg.port, "connected to redis");
        Ok(Self {
            conn,
            prefix: cfg.key_prefix.clone(),
            lengths,
        })
    }

    /// The configured key prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    async fn delete_matching(&self, pattern: &str) -> Result<()> {
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                let _: () = conn.del(keys).await?;
            }
            if next == 0 {
                return Ok(());
            }
            cursor = next;
        }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn add_device(&self, device: &str) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn.sadd(keys::devices(&self.prefix), device).await?;
        Ok(())
    }

    async fn devices(&self) -> Result<HashSet<String>> {
        let mut conn = self.conn();
        Ok(conn.smembers(keys::devices(&self.prefix)).await?)
    }

    async fn has_device(&self, device: &str) -> Result<bool> {
        let mut conn = self.conn();
        Ok(conn.sismember(keys::devices(&self.prefix), device).await?)
    }

    async fn remove_device(&self, device: &str) -> Result<()> {
        let mut conn = self.conn();
        let _: () = redis::pipe()
            .atomic()
            .srem(keys::devices(&self.prefix), device)
            .del(keys::device_messages(&self.prefix, device))
            .del(keys::properties(&self.prefix, device))
            .del(keys::logdata(&self.prefix, &[device]))
            .query_async(&mut conn)
            .await?;
        // per-property change logs end with ":<device>"
        self.delete_matching(&format!("{}:*:{}", keys::logdata(&self.prefix, &[]), device))
            .await
    }

    async fn add_property(&self, device: &str, name: &str) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn
            .sadd(keys::properties(&self.prefix, device), name)
            .await?;
        Ok(())
    }

    async fn properties(&self, device: &str) -> Result<HashSet<String>> {
        let mut conn = self.conn();
        Ok(conn.smembers(keys::properties(&self.prefix, device)).await?)
    }

    async fn has_property(&self, device: &str, name: &str) -> Result<bool> {
        let mut conn = self.conn();
        Ok(conn
            .sismember(keys::properties(&self.prefix, device), name)
            .await?)
    }

    async fn remove_property(&self, device: &str, name: &str) -> Result<()> {
        let mut conn = self.conn();
        let _: () = redis::pipe()
            .atomic()
            .del(keys::attributes(&self.prefix, name, device))
            .del(keys::elements(&self.prefix, name, device))
            .del(keys::logdata(&self.prefix, &[name, device]))
            .srem(keys::properties(&self.prefix, device), name)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_attributes(
        &self,
        device: &str,
        name: &str,
        attrs: &[(String, String)],
    ) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn
            .hset_multiple(keys::attributes(&self.prefix, name, device), attrs)
            .await?;
        Ok(())
    }

    async fn attributes(&self, device: &str, name: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn();
        Ok(conn
            .hgetall(keys::attributes(&self.prefix, name, device))
            .await?)
    }

    async fn set_attribute(
        &self,
        device: &str,
        name: &str,
        field: &str,
        value: &str,
    ) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn
            .hset(keys::attributes(&self.prefix, name, device), field, value)
            .await?;
        Ok(())
    }

    async fn add_element(&self, device: &str, name: &str, element: &str) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn
            .sadd(keys::elements(&self.prefix, name, device), element)
            .await?;
        Ok(())
    }

    async fn elements(&self, device: &str, name: &str) -> Result<HashSet<String>> {
        let mut conn = self.conn();
        Ok(conn
            .smembers(keys::elements(&self.prefix, name, device))
            .await?)
    }

    async fn set_element(
        &self,
        device: &str,
        name: &str,
        element: &str,
        fields: &[(String, Vec<u8>)],
    ) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn
            .hset_multiple(
                keys::element_attributes(&self.prefix, element, name, device),
                fields,
            )
            .await?;
        Ok(())
    }

    async fn element(
        &self,
        device: &str,
        name: &str,
        element: &str,
    ) -> Result<HashMap<String, Vec<u8>>> {
        let mut conn = self.conn();
        Ok(conn
            .hgetall(keys::element_attributes(&self.prefix, element, name, device))
            .await?)
    }

    async fn remove_element(&self, device: &str, name: &str, element: &str) -> Result<()> {
        let mut conn = self.conn();
        let _: () = redis::pipe()
            .atomic()
            .del(keys::element_attributes(&self.prefix, element, name, device))
            .srem(keys::elements(&self.prefix, name, device), element)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn append_message<'a>(
        &self,
        device: Option<&'a str>,
        timestamp: &'a str,
        text: &'a str,
    ) -> Result<()> {
        let key = match device {
            Some(device) => keys::device_messages(&self.prefix, device),
            None => keys::messages(&self.prefix),
        };
        let entry = format!("{} {}", timestamp, text);
        let mut conn = self.conn();
        let _: () = redis::pipe()
            .atomic()
            .lpush(&key, entry)
            .ltrim(&key, 0, self.lengths.messages as isize - 1)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn log_snapshot(
        &self,
        key: &str,
        timestamp: &str,
        json_value: &str,
        max_len: usize,
    ) -> Result<()> {
        let mut conn = self.conn();
        let head: Option<String> = conn.lindex(key, 0).await?;
        if let Some(head) = head {
            if head.split_once(' ').map(|(_, value)| value) == Some(json_value) {
                return Ok(());
            }
        }
        let entry = format!("{} {}", timestamp, json_value);
        let _: () = redis::pipe()
            .atomic()
            .lpush(key, entry)
            .ltrim(key, 0, max_len as isize - 1)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn take_list(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let (items, _): (Vec<String>, i64) = redis::pipe()
            .atomic()
            .lrange(key, 0, -1)
            .del(key)
            .query_async(&mut conn)
            .await?;
        Ok(items)
    }

    async fn take_hash(&self, key: &str) -> Result<HashMap<String, Vec<u8>>> {
        let mut conn = self.conn();
        let (fields, _): (HashMap<String, Vec<u8>>, i64) = redis::pipe()
            .atomic()
            .hgetall(key)
            .del(key)
            .query_async(&mut conn)
            .await?;
        Ok(fields)
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        // with an empty prefix the gateway owns the whole keyspace
        self.delete_matching(&format!("{}*", self.prefix)).await
    }
}
