use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;

use crate::errors::AppError;
use crate::rate_limit::{RateLimitStore, WindowState};

// Window reset and increment run as one script so concurrent replicas cannot
// lose updates. The key expires when its window ends.
const HIT_SCRIPT: &str = r#"
local count = tonumber(redis.call('HGET', KEYS[1], 'count') or '0')
local window_end = tonumber(redis.call('HGET', KEYS[1], 'window_end') or '0')
local now = tonumber(ARGV[1])
if count == 0 or now >= window_end then
  count = 1
  window_end = now + tonumber(ARGV[2])
else
  count = count + 1
end
redis.call('HSET', KEYS[1], 'count', count, 'window_end', window_end)
redis.call('PEXPIREAT', KEYS[1], window_end)
return {count, window_end}
"#;

const KEY_PREFIX: &str = "folio:ratelimit:";

/// Counters shared across replicas through Redis.
///
/// Holds one multiplexed connection; each hit works on a cheap clone of it.
pub struct RedisRateLimitStore {
    conn: MultiplexedConnection,
    script: Script,
}

impl RedisRateLimitStore {
    /// Connects up front so a bad `REDIS_URL` fails startup.
    pub async fn connect(client: &redis::Client) -> Result<Self, redis::RedisError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            script: Script::new(HIT_SCRIPT),
        })
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn hit(&self, key: &str, now_ms: i64, window_ms: i64) -> Result<WindowState, AppError> {
        let mut conn = self.conn.clone();
        let (count, window_end_ms): (i64, i64) = self
            .script
            .key(format!("{KEY_PREFIX}{key}"))
            .arg(now_ms)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await?;

        Ok(WindowState {
            count: u32::try_from(count).unwrap_or(u32::MAX),
            window_end_ms,
        })
    }
}
