//! Low-level Redis commands shared by every topology
//!
//! Each helper is generic over the async connection type so standalone,
//! cluster and shard connections run the exact same command sequences.

use redis::aio::ConnectionLike;
use redis::{FromRedisValue, RedisResult};

/// Keys fetched per SCAN page
pub const SCAN_PAGE_SIZE: usize = 100;

/// How one SCAN page of keys is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDelete {
    /// One multi-key `DEL`
    Atomic,
    /// One pipelined round trip of single-key `DEL`s, for nodes that reject
    /// multi-key commands spanning hash slots
    Pipelined,
}

pub async fn get<C, T>(conn: &mut C, key: &str) -> RedisResult<Option<T>>
where
    C: ConnectionLike + Send,
    T: FromRedisValue,
{
    redis::cmd("GET").arg(key).query_async(conn).await
}

/// `SET` with an `EX` only for positive timeouts
pub async fn set<C>(conn: &mut C, key: &str, value: &[u8], timeout: i64) -> RedisResult<()>
where
    C: ConnectionLike + Send,
{
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if timeout > 0 {
        cmd.arg("EX").arg(timeout);
    }
    cmd.query_async(conn).await
}

/// Overwrite an existing key, keeping its TTL; missing keys are left alone
pub async fn update<C>(conn: &mut C, key: &str, value: &[u8]) -> RedisResult<()>
where
    C: ConnectionLike + Send,
{
    redis::cmd("SET")
        .arg(key)
        .arg(value)
        .arg("XX")
        .arg("KEEPTTL")
        .query_async(conn)
        .await
}

pub async fn del<C>(conn: &mut C, key: &str) -> RedisResult<()>
where
    C: ConnectionLike + Send,
{
    let _: i64 = redis::cmd("DEL").arg(key).query_async(conn).await?;
    Ok(())
}

/// Remaining seconds, `-1` without expiry, `-2` when missing
pub async fn ttl<C>(conn: &mut C, key: &str) -> RedisResult<i64>
where
    C: ConnectionLike + Send,
{
    redis::cmd("TTL").arg(key).query_async(conn).await
}

/// Negative timeouts remove the expiry
pub async fn expire<C>(conn: &mut C, key: &str, timeout: i64) -> RedisResult<()>
where
    C: ConnectionLike + Send,
{
    let _: i64 = if timeout < 0 {
        redis::cmd("PERSIST").arg(key).query_async(conn).await?
    } else {
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(timeout)
            .query_async(conn)
            .await?
    };
    Ok(())
}

pub async fn ping<C>(conn: &mut C) -> RedisResult<bool>
where
    C: ConnectionLike + Send,
{
    let pong: String = redis::cmd("PING").query_async(conn).await?;
    Ok(pong == "PONG")
}

/// Delete every key matching `prefix*` on one node, page by page
///
/// A single cursor is carried across iterations so every page of the
/// keyspace is visited; the loop stops once the cursor wraps back to 0.
pub async fn scan_delete<C>(conn: &mut C, prefix: &str, batch: BatchDelete) -> RedisResult<usize>
where
    C: ConnectionLike + Send,
{
    let pattern = scan_pattern(prefix);
    let mut cursor: u64 = 0;
    let mut deleted = 0;
    loop {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&pattern)
            .arg("COUNT")
            .arg(SCAN_PAGE_SIZE)
            .query_async(conn)
            .await?;

        if !keys.is_empty() {
            delete_page(conn, &keys, batch).await?;
            deleted += keys.len();
        }

        if next == 0 {
            break;
        }
        cursor = next;
    }
    Ok(deleted)
}

/// Count keys matching `prefix*` on one node with the same incremental scan
pub async fn scan_count<C>(conn: &mut C, prefix: &str) -> RedisResult<usize>
where
    C: ConnectionLike + Send,
{
    let pattern = scan_pattern(prefix);
    let mut cursor: u64 = 0;
    let mut count = 0;
    loop {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&pattern)
            .arg("COUNT")
            .arg(SCAN_PAGE_SIZE)
            .query_async(conn)
            .await?;
        count += keys.len();
        if next == 0 {
            break;
        }
        cursor = next;
    }
    Ok(count)
}

async fn delete_page<C>(conn: &mut C, keys: &[String], batch: BatchDelete) -> RedisResult<()>
where
    C: ConnectionLike + Send,
{
    match batch {
        BatchDelete::Atomic => {
            let _: i64 = redis::cmd("DEL").arg(keys).query_async(conn).await?;
        }
        BatchDelete::Pipelined => {
            let mut pipe = redis::pipe();
            for key in keys {
                pipe.cmd("DEL").arg(key).ignore();
            }
            let _: () = pipe.query_async(conn).await?;
        }
    }
    Ok(())
}

/// Glob pattern matching keys that literally start with `prefix`
pub fn scan_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}
