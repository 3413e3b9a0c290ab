//! Redis-backed [`KvStore`] and the store factory.

use std::time::Duration;

use async_trait::async_trait;
use brix_store::{
    Command, DynClock, DynKvStore, KvStore, MemoryInfo, Reply, ScanPage, ScoreBound, StoreError,
    StoreResult, TimeoutStore, Transaction, Ttl,
};
use deadpool_redis::{Connection, Pool};
use redis::{RedisError, Value};

use crate::config::RedisConfig;

/// Shared store on a pooled Redis connection.
///
/// Transactions run as `MULTI`/`EXEC` pipelines.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool from `config` and checks that a connection can be made.
    pub async fn connect(config: &RedisConfig) -> StoreResult<Self> {
        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        let timeout = Duration::from_millis(config.timeout_ms);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| StoreError::connection(e.to_string()))?;

        let store = Self::new(pool);
        store.ping().await?;
        Ok(store)
    }

    async fn conn(&self) -> StoreResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::connection(e.to_string()))
    }
}

fn redis_error(command: &str, e: RedisError) -> StoreError {
    if e.is_timeout() || e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        StoreError::connection(e.to_string())
    } else {
        StoreError::command(command, e.to_string())
    }
}

fn to_reply(value: Value) -> StoreResult<Reply> {
    match value {
        Value::Nil => Ok(Reply::Nil),
        Value::Int(n) => Ok(Reply::Int(n)),
        Value::Okay => Ok(Reply::Ok),
        Value::SimpleString(s) if s == "OK" => Ok(Reply::Ok),
        Value::SimpleString(s) => Ok(Reply::Bytes(s.into_bytes())),
        Value::BulkString(bytes) => Ok(Reply::Bytes(bytes)),
        Value::Boolean(flag) => Ok(Reply::Int(i64::from(flag))),
        other => Err(StoreError::unexpected_reply(format!("{other:?}"))),
    }
}

fn queue(pipe: &mut redis::Pipeline, command: &Command) {
    match command {
        Command::SetPx { key, value, ttl_ms } => {
            pipe.cmd("SET").arg(key).arg(value.as_slice()).arg("PX").arg(*ttl_ms);
        }
        Command::SAdd { key, members } => {
            pipe.cmd("SADD").arg(key).arg(members);
        }
        Command::SRem { key, members } => {
            pipe.cmd("SREM").arg(key).arg(members);
        }
        Command::PExpire {
            key,
            ttl_ms,
            condition,
        } => {
            pipe.cmd("PEXPIRE").arg(key).arg(*ttl_ms);
            if let Some(option) = condition.redis_arg() {
                pipe.arg(option);
            }
        }
        Command::ZAdd { key, score, member } => {
            pipe.cmd("ZADD").arg(key).arg(*score).arg(member);
        }
        Command::ZRemRangeByScore { key, min, max } => {
            pipe.cmd("ZREMRANGEBYSCORE")
                .arg(key)
                .arg(min.to_redis_arg())
                .arg(max.to_redis_arg());
        }
        Command::ZCard { key } => {
            pipe.cmd("ZCARD").arg(key);
        }
        Command::ZCount { key, min, max } => {
            pipe.cmd("ZCOUNT")
                .arg(key)
                .arg(min.to_redis_arg())
                .arg(max.to_redis_arg());
        }
        Command::Del { keys } => {
            pipe.cmd("DEL").arg(keys);
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("PING", e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("GET", e))?;
        Ok(value)
    }

    async fn set_px(&self, key: &str, value: &[u8], ttl_ms: u64) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("SET", e))?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let removed: u64 = redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("DEL", e))?;
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("SMEMBERS", e))?;
        Ok(members)
    }

    async fn srem(&self, key: &str, members: &[String]) -> StoreResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let removed: u64 = redis::cmd("SREM")
            .arg(key)
            .arg(members)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("SREM", e))?;
        Ok(removed)
    }

    async fn scard(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn().await?;
        let size: u64 = redis::cmd("SCARD")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("SCARD", e))?;
        Ok(size)
    }

    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<u64> {
        let mut conn = self.conn().await?;
        let count: u64 = redis::cmd("ZCOUNT")
            .arg(key)
            .arg(min.to_redis_arg())
            .arg(max.to_redis_arg())
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("ZCOUNT", e))?;
        Ok(count)
    }

    async fn pttl(&self, key: &str) -> StoreResult<Ttl> {
        let mut conn = self.conn().await?;
        let raw: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("PTTL", e))?;
        Ok(Ttl::from_pttl(raw))
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanPage> {
        let mut conn = self.conn().await?;
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("SCAN", e))?;
        Ok(ScanPage { cursor, keys })
    }

    async fn exec(&self, tx: Transaction) -> StoreResult<Vec<Reply>> {
        if tx.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in tx.commands() {
            queue(&mut pipe, command);
        }

        let mut conn = self.conn().await?;
        let values: Vec<Value> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("EXEC", e))?;

        if values.len() != tx.len() {
            return Err(StoreError::unexpected_reply(format!(
                "EXEC returned {} replies for {} commands",
                values.len(),
                tx.len()
            )));
        }
        values.into_iter().map(to_reply).collect()
    }

    async fn memory_info(&self) -> StoreResult<MemoryInfo> {
        let mut conn = self.conn().await?;
        let info: String = redis::cmd("INFO")
            .arg("memory")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("INFO", e))?;
        Ok(parse_memory_info(&info))
    }
}

/// Extracts memory figures from an `INFO memory` reply.
pub fn parse_memory_info(info: &str) -> MemoryInfo {
    let mut memory = MemoryInfo::default();
    for line in info.lines() {
        let Some((field, value)) = line.trim().split_once(':') else {
            continue;
        };
        match field {
            "used_memory" => memory.used_bytes = value.parse().ok(),
            "used_memory_human" => memory.used_human = Some(value.to_string()),
            "used_memory_peak_human" => memory.peak_human = Some(value.to_string()),
            "mem_fragmentation_ratio" => memory.fragmentation_ratio = value.parse().ok(),
            _ => {}
        }
    }
    memory
}

/// Create the shared store based on configuration.
///
/// Falls back to an in-process store if Redis is disabled or unreachable, in
/// which case nothing is shared between instances. Redis calls get the
/// configured per-call deadline.
pub async fn create_store(config: &RedisConfig, clock: DynClock) -> DynKvStore {
    if !config.enabled {
        tracing::info!("Redis disabled, using in-memory store");
        return brix_store_memory::create_memory_store(clock);
    }

    tracing::info!(url = %config.url, "Connecting to Redis");
    match RedisStore::connect(config).await {
        Ok(store) => {
            tracing::info!("Connected to Redis");
            match config.operation_timeout() {
                Some(timeout) => std::sync::Arc::new(TimeoutStore::new(store, timeout)),
                None => std::sync::Arc::new(store),
            }
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to in-memory store."
            );
            brix_store_memory::create_memory_store(clock)
        }
    }
}
