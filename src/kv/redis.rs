//! Redis backend.
//!
//! Primitive operations go through `AsyncCommands` on a shared
//! `ConnectionManager`; the composite operations run the embedded Lua
//! scripts from [`super::scripts`]. `redis::Script` drives EVALSHA by
//! cached hash with an automatic EVAL fallback on NOSCRIPT.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use crate::error::Result;

use super::{scripts, Kv, PopKeys, PromoteKeys, PushKeys};

pub struct RedisKv {
    conn: ConnectionManager,
    push: Script,
    pop_with_cap: Script,
    reap_and_count: Script,
    acquire_with_reap: Script,
    promote_due: Script,
}

impl RedisKv {
    /// Connect to `url` (any form `redis::Client::open` accepts).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::with_connection(conn))
    }

    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            push: Script::new(scripts::PUSH),
            pop_with_cap: Script::new(scripts::POP_WITH_CAP),
            reap_and_count: Script::new(scripts::REAP_AND_COUNT),
            acquire_with_reap: Script::new(scripts::ACQUIRE_WITH_REAP),
            promote_due: Script::new(scripts::PROMOTE_DUE),
        }
    }

    fn conn(&self) -> ConnectionManager {
        // ConnectionManager is a cheap handle over one multiplexed
        // connection; cloning per call keeps &self methods borrow-free.
        self.conn.clone()
    }
}

#[async_trait]
impl Kv for RedisKv {
    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let added: u64 = self.conn().sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let removed: u64 = self.conn().srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.conn().smembers(key).await?)
    }

    async fn srandmember(&self, key: &str) -> Result<Option<String>> {
        Ok(self.conn().srandmember(key).await?)
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64> {
        Ok(self.conn().rpush(key, value).await?)
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>> {
        Ok(self.conn().lpop(key, None).await?)
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        Ok(self.conn().llen(key).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let _: () = self.conn().hset(key, field, value).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self.conn().hget(key, field).await?)
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        let removed: u64 = self.conn().hdel(key, field).await?;
        Ok(removed > 0)
    }

    async fn hincr(&self, key: &str, field: &str, by: i64) -> Result<i64> {
        Ok(self.conn().hincr(key, field, by).await?)
    }

    async fn hlen(&self, key: &str) -> Result<u64> {
        Ok(self.conn().hlen(key).await?)
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        Ok(self.conn().hgetall(key).await?)
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        let _: () = self.conn().zadd(key, member, score).await?;
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        Ok(self.conn().zcard(key).await?)
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        Ok(self.conn().incr(key, 1i64).await?)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let _: () = self.conn().del(key).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let _: () = self.conn().expire(key, ttl_secs as i64).await?;
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<String> = conn.scan_match(pattern).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn push_job(
        &self,
        keys: &PushKeys<'_>,
        payload: &str,
        partition: &str,
        now: u64,
    ) -> Result<u64> {
        let mut conn = self.conn();
        let len: u64 = self
            .push
            .key(keys.partitions)
            .key(keys.queue)
            .key(keys.metrics)
            .arg(payload)
            .arg(partition)
            .arg(now)
            .invoke_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn pop_with_cap(
        &self,
        keys: &PopKeys<'_>,
        partition: &str,
        id: &str,
        cap: u64,
        ttl_secs: u64,
        now: u64,
    ) -> Result<Option<String>> {
        let mut conn = self.conn();
        let payload: Option<String> = self
            .pop_with_cap
            .key(keys.queue)
            .key(keys.partitions)
            .key(keys.active)
            .key(keys.metrics)
            .arg(partition)
            .arg(id)
            .arg(cap)
            .arg(ttl_secs)
            .arg(now)
            .invoke_async(&mut conn)
            .await?;
        Ok(payload)
    }

    async fn reap_and_count(&self, active_key: &str, threshold: u64) -> Result<u64> {
        let mut conn = self.conn();
        let count: u64 = self
            .reap_and_count
            .key(active_key)
            .arg(threshold)
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn acquire_with_reap(
        &self,
        active_key: &str,
        id: &str,
        cap: u64,
        ttl_secs: u64,
        now: u64,
        threshold: u64,
    ) -> Result<bool> {
        let mut conn = self.conn();
        let acquired: u64 = self
            .acquire_with_reap
            .key(active_key)
            .arg(id)
            .arg(cap)
            .arg(ttl_secs)
            .arg(now)
            .arg(threshold)
            .invoke_async(&mut conn)
            .await?;
        Ok(acquired == 1)
    }

    async fn promote_due(&self, keys: &PromoteKeys<'_>, partition: &str, now: u64) -> Result<u64> {
        let mut conn = self.conn();
        let promoted: u64 = self
            .promote_due
            .key(keys.delayed)
            .key(keys.queue)
            .key(keys.partitions)
            .key(keys.metrics)
            .arg(partition)
            .arg(now)
            .invoke_async(&mut conn)
            .await?;
        Ok(promoted)
    }
}
