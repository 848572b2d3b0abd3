//! Server-side Lua scripts.
//!
//! Every operation that mutates more than one key runs as a single script
//! so concurrent producers and workers only ever observe committed state.
//! The text lives here as compile-time constants; `redis::Script` hashes
//! them once and drives EVALSHA with an EVAL fallback.

/// KEYS: partitions set, partition queue list, partition metrics hash.
/// ARGV: payload, partition, now.
/// Returns the new queue length.
pub const PUSH: &str = r#"
redis.call('SADD', KEYS[1], ARGV[2])
local len = redis.call('RPUSH', KEYS[2], ARGV[1])
if redis.call('HEXISTS', KEYS[3], 'first_job_time') == 0 then
    redis.call('HSET', KEYS[3], 'first_job_time', ARGV[3])
end
redis.call('HINCRBY', KEYS[3], 'total_pushed', 1)
return len
"#;

/// KEYS: partition queue list, partitions set, active hash, metrics hash.
/// ARGV: partition, reservation id, cap, lock ttl (secs), now.
/// Returns the popped payload, or false when at cap or empty.
///
/// Compares against the raw active-set size; the caller reaps stale
/// reservations while choosing the partition.
pub const POP_WITH_CAP: &str = r#"
if redis.call('HLEN', KEYS[3]) >= tonumber(ARGV[3]) then
    return false
end
local payload = redis.call('LPOP', KEYS[1])
if not payload then
    return false
end
redis.call('HSET', KEYS[3], ARGV[2], ARGV[5])
redis.call('EXPIRE', KEYS[3], ARGV[4])
redis.call('HINCRBY', KEYS[4], 'total_popped', 1)
if redis.call('LLEN', KEYS[1]) == 0 then
    redis.call('SREM', KEYS[2], ARGV[1])
    redis.call('HDEL', KEYS[4], 'first_job_time')
end
return payload
"#;

/// KEYS: active hash. ARGV: staleness threshold.
/// Deletes reservations acquired before the threshold, returns the
/// post-reap size.
pub const REAP_AND_COUNT: &str = r#"
local entries = redis.call('HGETALL', KEYS[1])
for i = 1, #entries, 2 do
    if tonumber(entries[i + 1]) < tonumber(ARGV[1]) then
        redis.call('HDEL', KEYS[1], entries[i])
    end
end
return redis.call('HLEN', KEYS[1])
"#;

/// KEYS: active hash. ARGV: reservation id, cap, lock ttl (secs), now,
/// staleness threshold.
/// Reaps, then records the reservation iff the post-reap size is below
/// the cap. Returns 1 on acquire, 0 otherwise.
pub const ACQUIRE_WITH_REAP: &str = r#"
local entries = redis.call('HGETALL', KEYS[1])
for i = 1, #entries, 2 do
    if tonumber(entries[i + 1]) < tonumber(ARGV[5]) then
        redis.call('HDEL', KEYS[1], entries[i])
    end
end
if redis.call('HLEN', KEYS[1]) < tonumber(ARGV[2]) then
    redis.call('HSET', KEYS[1], ARGV[1], ARGV[4])
    redis.call('EXPIRE', KEYS[1], ARGV[3])
    return 1
end
return 0
"#;

/// KEYS: delayed zset, partition queue list, partitions set, metrics hash.
/// ARGV: partition, now.
/// Moves every due entry back onto the queue tail with push semantics and
/// returns how many were promoted.
pub const PROMOTE_DUE: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[2])
if #due == 0 then
    return 0
end
for i = 1, #due do
    redis.call('RPUSH', KEYS[2], due[i])
end
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', ARGV[2])
redis.call('SADD', KEYS[3], ARGV[1])
if redis.call('HEXISTS', KEYS[4], 'first_job_time') == 0 then
    redis.call('HSET', KEYS[4], 'first_job_time', ARGV[2])
end
redis.call('HINCRBY', KEYS[4], 'total_pushed', #due)
return #due
"#;
