//! In-process KV backend.
//!
//! The whole keyspace lives under one mutex, so each composite operation
//! is exactly as atomic as its Lua counterpart on a real server. Intended
//! for tests and embedded/dev use; production deployments point the
//! broker at Redis.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;

use crate::error::{Error, Result};

use super::{Kv, PopKeys, PromoteKeys, PushKeys};

#[derive(Debug, Clone)]
enum Entry {
    List(VecDeque<String>),
    /// Insertion-ordered, mirroring what a small Redis set reports.
    Set(Vec<String>),
    /// Insertion-ordered field list. Partition hashes stay small, so the
    /// linear scans never matter.
    Hash(Vec<(String, String)>),
    Sorted(Vec<(f64, String)>),
    Counter(i64),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::List(_) => "list",
            Entry::Set(_) => "set",
            Entry::Hash(_) => "hash",
            Entry::Sorted(_) => "zset",
            Entry::Counter(_) => "string",
        }
    }
}

#[derive(Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
    expirations: HashMap<String, Instant>,
}

impl Keyspace {
    /// Lazy expiry: a key past its deadline is gone before any access.
    fn evict_expired(&mut self, key: &str) {
        if let Some(deadline) = self.expirations.get(key) {
            if Instant::now() >= *deadline {
                self.entries.remove(key);
                self.expirations.remove(key);
            }
        }
    }

    fn get(&mut self, key: &str) -> Option<&Entry> {
        self.evict_expired(key);
        self.entries.get(key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.evict_expired(key);
        self.entries.get_mut(key)
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.expirations.remove(key);
    }

    fn list_mut(&mut self, key: &str) -> Result<&mut VecDeque<String>> {
        self.evict_expired(key);
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()))
        {
            Entry::List(l) => Ok(l),
            other => Err(wrong_type(key, other.kind())),
        }
    }

    fn set_mut(&mut self, key: &str) -> Result<&mut Vec<String>> {
        self.evict_expired(key);
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(Vec::new()))
        {
            Entry::Set(s) => Ok(s),
            other => Err(wrong_type(key, other.kind())),
        }
    }

    fn hash_mut(&mut self, key: &str) -> Result<&mut Vec<(String, String)>> {
        self.evict_expired(key);
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(Vec::new()))
        {
            Entry::Hash(h) => Ok(h),
            other => Err(wrong_type(key, other.kind())),
        }
    }

    fn sorted_mut(&mut self, key: &str) -> Result<&mut Vec<(f64, String)>> {
        self.evict_expired(key);
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Sorted(Vec::new()))
        {
            Entry::Sorted(z) => Ok(z),
            other => Err(wrong_type(key, other.kind())),
        }
    }

    /// Drop empty collections the way Redis drops empty keys.
    fn drop_if_empty(&mut self, key: &str) {
        let empty = match self.entries.get(key) {
            Some(Entry::List(l)) => l.is_empty(),
            Some(Entry::Set(s)) => s.is_empty(),
            Some(Entry::Hash(h)) => h.is_empty(),
            Some(Entry::Sorted(z)) => z.is_empty(),
            _ => false,
        };
        if empty {
            self.remove(key);
        }
    }

    fn hash_len(&mut self, key: &str) -> u64 {
        match self.get(key) {
            Some(Entry::Hash(h)) => h.len() as u64,
            _ => 0,
        }
    }

    fn hash_set(&mut self, key: &str, field: &str, value: &str) -> Result<()> {
        let hash = self.hash_mut(key)?;
        if let Some(slot) = hash.iter_mut().find(|(f, _)| f == field) {
            slot.1 = value.to_string();
        } else {
            hash.push((field.to_string(), value.to_string()));
        }
        Ok(())
    }

    fn hash_del(&mut self, key: &str, field: &str) -> bool {
        let removed = match self.get_mut(key) {
            Some(Entry::Hash(h)) => {
                let before = h.len();
                h.retain(|(f, _)| f != field);
                h.len() != before
            }
            _ => false,
        };
        self.drop_if_empty(key);
        removed
    }

    fn reap(&mut self, active_key: &str, threshold: u64) -> u64 {
        if let Some(Entry::Hash(h)) = self.get_mut(active_key) {
            h.retain(|(_, ts)| ts.parse::<u64>().map_or(true, |t| t >= threshold));
        }
        self.drop_if_empty(active_key);
        self.hash_len(active_key)
    }

    fn set_expiry(&mut self, key: &str, ttl_secs: u64) {
        if self.entries.contains_key(key) {
            self.expirations
                .insert(key.to_string(), Instant::now() + Duration::from_secs(ttl_secs));
        }
    }
}

fn wrong_type(key: &str, kind: &str) -> Error {
    Error::Kv(format!("key '{}' holds a {}", key, kind))
}

/// Minimal glob: only `*` wildcards, which is all the key layout needs.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == candidate;
    }
    let mut rest = candidate;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    // Pattern ends with '*': anything left matches.
    parts.last().map_or(true, |p| p.is_empty()) || rest.is_empty()
}

pub struct MemoryKv {
    state: Mutex<Keyspace>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Keyspace::default()),
        }
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Kv for MemoryKv {
    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let mut state = self.state.lock();
        let set = state.set_mut(key)?;
        if set.iter().any(|m| m == member) {
            Ok(false)
        } else {
            set.push(member.to_string());
            Ok(true)
        }
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let mut state = self.state.lock();
        let removed = match state.get_mut(key) {
            Some(Entry::Set(s)) => {
                let before = s.len();
                s.retain(|m| m != member);
                s.len() != before
            }
            _ => false,
        };
        state.drop_if_empty(key);
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        Ok(match state.get(key) {
            Some(Entry::Set(s)) => s.clone(),
            _ => Vec::new(),
        })
    }

    async fn srandmember(&self, key: &str) -> Result<Option<String>> {
        let mut state = self.state.lock();
        Ok(match state.get(key) {
            Some(Entry::Set(s)) if !s.is_empty() => {
                let idx = rand::thread_rng().gen_range(0..s.len());
                Some(s[idx].clone())
            }
            _ => None,
        })
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64> {
        let mut state = self.state.lock();
        let list = state.list_mut(key)?;
        list.push_back(value.to_string());
        Ok(list.len() as u64)
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>> {
        let mut state = self.state.lock();
        let popped = match state.get_mut(key) {
            Some(Entry::List(l)) => l.pop_front(),
            _ => None,
        };
        state.drop_if_empty(key);
        Ok(popped)
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        let mut state = self.state.lock();
        Ok(match state.get(key) {
            Some(Entry::List(l)) => l.len() as u64,
            _ => 0,
        })
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.state.lock().hash_set(key, field, value)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut state = self.state.lock();
        Ok(match state.get(key) {
            Some(Entry::Hash(h)) => h
                .iter()
                .find(|(f, _)| f == field)
                .map(|(_, v)| v.clone()),
            _ => None,
        })
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        Ok(self.state.lock().hash_del(key, field))
    }

    async fn hincr(&self, key: &str, field: &str, by: i64) -> Result<i64> {
        let mut state = self.state.lock();
        let hash = state.hash_mut(key)?;
        if let Some(slot) = hash.iter_mut().find(|(f, _)| f == field) {
            let current: i64 = slot
                .1
                .parse()
                .map_err(|_| Error::Kv(format!("hash field '{}' is not an integer", field)))?;
            let next = current + by;
            slot.1 = next.to_string();
            Ok(next)
        } else {
            hash.push((field.to_string(), by.to_string()));
            Ok(by)
        }
    }

    async fn hlen(&self, key: &str) -> Result<u64> {
        Ok(self.state.lock().hash_len(key))
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        let mut state = self.state.lock();
        Ok(match state.get(key) {
            Some(Entry::Hash(h)) => h.clone(),
            _ => Vec::new(),
        })
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        let mut state = self.state.lock();
        let zset = state.sorted_mut(key)?;
        zset.retain(|(_, m)| m != member);
        zset.push((score, member.to_string()));
        zset.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut state = self.state.lock();
        Ok(match state.get(key) {
            Some(Entry::Sorted(z)) => z.len() as u64,
            _ => 0,
        })
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut state = self.state.lock();
        state.evict_expired(key);
        match state
            .entries
            .entry(key.to_string())
            .or_insert(Entry::Counter(0))
        {
            Entry::Counter(n) => {
                *n += 1;
                Ok(*n)
            }
            other => Err(wrong_type(key, other.kind())),
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.state.lock().remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        self.state.lock().set_expiry(key, ttl_secs);
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let state = self.state.lock();
        Ok(state
            .entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect())
    }

    async fn push_job(
        &self,
        keys: &PushKeys<'_>,
        payload: &str,
        partition: &str,
        now: u64,
    ) -> Result<u64> {
        let mut state = self.state.lock();
        let set = state.set_mut(keys.partitions)?;
        if !set.iter().any(|m| m == partition) {
            set.push(partition.to_string());
        }
        let list = state.list_mut(keys.queue)?;
        list.push_back(payload.to_string());
        let len = list.len() as u64;
        let metrics = state.hash_mut(keys.metrics)?;
        if !metrics.iter().any(|(f, _)| f == super::keys::FIELD_FIRST_JOB_TIME) {
            metrics.push((
                super::keys::FIELD_FIRST_JOB_TIME.to_string(),
                now.to_string(),
            ));
        }
        match metrics
            .iter_mut()
            .find(|(f, _)| f == super::keys::FIELD_TOTAL_PUSHED)
        {
            Some(slot) => {
                let n: i64 = slot.1.parse().unwrap_or(0);
                slot.1 = (n + 1).to_string();
            }
            None => metrics.push((super::keys::FIELD_TOTAL_PUSHED.to_string(), "1".into())),
        }
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
        let mut state = self.state.lock();
        if state.hash_len(keys.active) >= cap {
            return Ok(None);
        }
        let payload = match state.get_mut(keys.queue) {
            Some(Entry::List(l)) => l.pop_front(),
            _ => None,
        };
        let Some(payload) = payload else {
            return Ok(None);
        };
        state.hash_set(keys.active, id, &now.to_string())?;
        state.set_expiry(keys.active, ttl_secs);
        {
            let metrics = state.hash_mut(keys.metrics)?;
            let popped = metrics
                .iter_mut()
                .find(|(f, _)| f == super::keys::FIELD_TOTAL_POPPED);
            match popped {
                Some(slot) => {
                    let n: i64 = slot.1.parse().unwrap_or(0);
                    slot.1 = (n + 1).to_string();
                }
                None => metrics.push((super::keys::FIELD_TOTAL_POPPED.to_string(), "1".into())),
            }
        }
        let emptied = match state.get(keys.queue) {
            Some(Entry::List(l)) => l.is_empty(),
            None => true,
            _ => false,
        };
        if emptied {
            state.remove(keys.queue);
            if let Some(Entry::Set(s)) = state.get_mut(keys.partitions) {
                s.retain(|m| m != partition);
            }
            state.drop_if_empty(keys.partitions);
            state.hash_del(keys.metrics, super::keys::FIELD_FIRST_JOB_TIME);
        }
        Ok(Some(payload))
    }

    async fn reap_and_count(&self, active_key: &str, threshold: u64) -> Result<u64> {
        Ok(self.state.lock().reap(active_key, threshold))
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
        let mut state = self.state.lock();
        if state.reap(active_key, threshold) < cap {
            state.hash_set(active_key, id, &now.to_string())?;
            state.set_expiry(active_key, ttl_secs);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn promote_due(&self, keys: &PromoteKeys<'_>, partition: &str, now: u64) -> Result<u64> {
        let mut state = self.state.lock();
        let due: Vec<String> = match state.get_mut(keys.delayed) {
            Some(Entry::Sorted(z)) => {
                let (ready, later): (Vec<_>, Vec<_>) =
                    z.drain(..).partition(|(score, _)| *score <= now as f64);
                *z = later;
                ready.into_iter().map(|(_, m)| m).collect()
            }
            _ => Vec::new(),
        };
        state.drop_if_empty(keys.delayed);
        if due.is_empty() {
            return Ok(0);
        }
        let count = due.len() as u64;
        let list = state.list_mut(keys.queue)?;
        for payload in due {
            list.push_back(payload);
        }
        let set = state.set_mut(keys.partitions)?;
        if !set.iter().any(|m| m == partition) {
            set.push(partition.to_string());
        }
        let metrics = state.hash_mut(keys.metrics)?;
        if !metrics.iter().any(|(f, _)| f == super::keys::FIELD_FIRST_JOB_TIME) {
            metrics.push((
                super::keys::FIELD_FIRST_JOB_TIME.to_string(),
                now.to_string(),
            ));
        }
        match metrics
            .iter_mut()
            .find(|(f, _)| f == super::keys::FIELD_TOTAL_PUSHED)
        {
            Some(slot) => {
                let n: i64 = slot.1.parse().unwrap_or(0);
                slot.1 = (n + count as i64).to_string();
            }
            None => metrics.push((
                super::keys::FIELD_TOTAL_PUSHED.to_string(),
                count.to_string(),
            )),
        }
        Ok(count)
    }
}
