//! Per-project build rate limiting backed by shared Redis counters.
//!
//! Three counters guard each project: concurrent builds (no TTL), builds
//! this hour (1 h TTL) and builds this day (24 h TTL). A reservation
//! checks and increments all three inside a single server-side script, so
//! a denied reservation never leaves a partial increment behind.

use crate::error::RateLimitDenial;
use crate::model::QuotaEnvelope;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::warn;

const HOUR_TTL_SECS: u32 = 3600;
const DAY_TTL_SECS: u32 = 86_400;

/// Checks all three caps, then increments all three counters. Returns the
/// name of the first cap that is already full, or "ok".
const RESERVE_SCRIPT: &str = r#"
local concurrent = tonumber(redis.call('GET', KEYS[1]) or '0')
if concurrent >= tonumber(ARGV[1]) then return 'concurrent' end
local hourly = tonumber(redis.call('GET', KEYS[2]) or '0')
if hourly >= tonumber(ARGV[2]) then return 'hourly' end
local daily = tonumber(redis.call('GET', KEYS[3]) or '0')
if daily >= tonumber(ARGV[3]) then return 'daily' end
redis.call('INCR', KEYS[1])
if redis.call('INCR', KEYS[2]) == 1 then redis.call('EXPIRE', KEYS[2], ARGV[4]) end
if redis.call('INCR', KEYS[3]) == 1 then redis.call('EXPIRE', KEYS[3], ARGV[5]) end
return 'ok'
"#;

/// Decrements the concurrency counter, clamping at zero so a double
/// release can never wedge a project.
const RELEASE_SCRIPT: &str = r#"
if tonumber(redis.call('GET', KEYS[1]) or '0') > 0 then
  return redis.call('DECR', KEYS[1])
end
return 0
"#;

#[derive(Clone)]
pub struct RateLimiter {
    conn: ConnectionManager,
    reserve: Script,
    release: Script,
}

impl RateLimiter {
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::with_connection(conn))
    }

    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            reserve: Script::new(RESERVE_SCRIPT),
            release: Script::new(RELEASE_SCRIPT),
        }
    }

    /// Reserves one build slot for `project_id` under the given quota.
    ///
    /// On `Ok(Err(denial))` the caps were intact and nothing was counted.
    /// The outer error is an infrastructure failure talking to Redis.
    pub async fn reserve(
        &self,
        project_id: &str,
        quota: &QuotaEnvelope,
    ) -> Result<Result<(), RateLimitDenial>, redis::RedisError> {
        let mut conn = self.conn.clone();
        let verdict: String = self
            .reserve
            .key(concurrent_key(project_id))
            .key(hourly_key(project_id))
            .key(daily_key(project_id))
            .arg(quota.max_concurrent_builds)
            .arg(quota.max_builds_per_hour)
            .arg(quota.max_builds_per_day)
            .arg(HOUR_TTL_SECS)
            .arg(DAY_TTL_SECS)
            .invoke_async(&mut conn)
            .await?;

        Ok(match verdict.as_str() {
            "ok" => Ok(()),
            "concurrent" => Err(RateLimitDenial::Concurrent(quota.max_concurrent_builds)),
            "hourly" => Err(RateLimitDenial::Hourly(quota.max_builds_per_hour)),
            _ => Err(RateLimitDenial::Daily(quota.max_builds_per_day)),
        })
    }

    /// Releases the concurrency slot taken by [`reserve`]. Window counters
    /// are left alone; they expire on their own.
    pub async fn release(&self, project_id: &str) {
        let mut conn = self.conn.clone();
        let result: Result<i64, _> = self
            .release
            .key(concurrent_key(project_id))
            .invoke_async(&mut conn)
            .await;
        if let Err(e) = result {
            warn!(project_id, error = %e, "failed to release concurrency slot");
        }
    }

    /// Current concurrent-build count for a project.
    pub async fn concurrent_count(&self, project_id: &str) -> Result<u32, redis::RedisError> {
        let mut conn = self.conn.clone();
        let value: Option<u32> = redis::cmd("GET")
            .arg(concurrent_key(project_id))
            .query_async(&mut conn)
            .await?;
        Ok(value.unwrap_or(0))
    }
}

fn concurrent_key(project_id: &str) -> String {
    format!("builds:concurrent:{}", project_id)
}

fn hourly_key(project_id: &str) -> String {
    format!("builds:hourly:{}", project_id)
}

fn daily_key(project_id: &str) -> String {
    format!("builds:daily:{}", project_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_project() {
        assert_eq!(concurrent_key("p1"), "builds:concurrent:p1");
        assert_eq!(hourly_key("p1"), "builds:hourly:p1");
        assert_eq!(daily_key("p1"), "builds:daily:p1");
        assert_ne!(concurrent_key("p1"), concurrent_key("p2"));
    }

    #[test]
    fn reserve_script_checks_before_any_increment() {
        // The script must do all three reads before the first INCR, so a
        // denial can return without needing a revert.
        let first_incr = RESERVE_SCRIPT.find("INCR").unwrap();
        for cap in ["'concurrent'", "'hourly'", "'daily'"] {
            assert!(RESERVE_SCRIPT.find(cap).unwrap() < first_incr);
        }
    }

    #[test]
    fn release_script_clamps_at_zero() {
        assert!(RELEASE_SCRIPT.contains("> 0"));
        assert!(RELEASE_SCRIPT.contains("DECR"));
    }
}
