//! Value types exchanged with a [`KvStore`](crate::KvStore).

use serde::{Deserialize, Serialize};

/// One bound of a sorted-set score range.
///
/// Scores are millisecond timestamps, so they are carried as `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBound {
    /// Unbounded below.
    NegInf,
    /// Unbounded above.
    PosInf,
    /// Includes the given score.
    Inclusive(i64),
    /// Excludes the given score.
    Exclusive(i64),
}

impl ScoreBound {
    /// Renders the bound in Redis range syntax (`-inf`, `+inf`, `42`, `(42`).
    pub fn to_redis_arg(self) -> String {
        match self {
            ScoreBound::NegInf => "-inf".to_string(),
            ScoreBound::PosInf => "+inf".to_string(),
            ScoreBound::Inclusive(score) => score.to_string(),
            ScoreBound::Exclusive(score) => format!("({score}"),
        }
    }

    /// Whether `score` satisfies this bound used as a range minimum.
    pub fn admits_from_below(self, score: i64) -> bool {
        match self {
            ScoreBound::NegInf => true,
            ScoreBound::PosInf => false,
            ScoreBound::Inclusive(min) => score >= min,
            ScoreBound::Exclusive(min) => score > min,
        }
    }

    /// Whether `score` satisfies this bound used as a range maximum.
    pub fn admits_from_above(self, score: i64) -> bool {
        match self {
            ScoreBound::NegInf => false,
            ScoreBound::PosInf => true,
            ScoreBound::Inclusive(max) => score <= max,
            ScoreBound::Exclusive(max) => score < max,
        }
    }

    /// Whether `score` lies within `[min, max]` honouring exclusivity.
    pub fn contains(min: ScoreBound, max: ScoreBound, score: i64) -> bool {
        min.admits_from_below(score) && max.admits_from_above(score)
    }
}

/// When a `PEXPIRE` is allowed to change the expiry of an existing key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpireCondition {
    /// Always replace the expiry.
    #[default]
    Always,
    /// Only when the key has no expiry (`NX`).
    NoExpiry,
    /// Only when the new expiry is later than the current one (`GT`). A key
    /// without an expiry counts as never expiring and is left alone.
    Later,
}

impl ExpireCondition {
    /// The Redis option token, if any.
    pub fn redis_arg(self) -> Option<&'static str> {
        match self {
            ExpireCondition::Always => None,
            ExpireCondition::NoExpiry => Some("NX"),
            ExpireCondition::Later => Some("GT"),
        }
    }

    /// Whether an expiry may be replaced, given the current one and the
    /// candidate (both absolute).
    pub fn permits(self, current: Option<i64>, candidate: i64) -> bool {
        match self {
            ExpireCondition::Always => true,
            ExpireCondition::NoExpiry => current.is_none(),
            ExpireCondition::Later => current.is_some_and(|at| candidate > at),
        }
    }
}

/// A single command queued inside a [`Transaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `SET key value PX ttl_ms`
    SetPx {
        key: String,
        value: Vec<u8>,
        ttl_ms: u64,
    },
    /// `SADD key member...`
    SAdd { key: String, members: Vec<String> },
    /// `SREM key member...`
    SRem { key: String, members: Vec<String> },
    /// `PEXPIRE key ttl_ms [NX|GT]`
    PExpire {
        key: String,
        ttl_ms: u64,
        condition: ExpireCondition,
    },
    /// `ZADD key score member`
    ZAdd {
        key: String,
        score: i64,
        member: String,
    },
    /// `ZREMRANGEBYSCORE key min max`
    ZRemRangeByScore {
        key: String,
        min: ScoreBound,
        max: ScoreBound,
    },
    /// `ZCARD key`
    ZCard { key: String },
    /// `ZCOUNT key min max`
    ZCount {
        key: String,
        min: ScoreBound,
        max: ScoreBound,
    },
    /// `DEL key...`
    Del { keys: Vec<String> },
}

impl Command {
    /// The wire name of the command, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetPx { .. } => "SET",
            Command::SAdd { .. } => "SADD",
            Command::SRem { .. } => "SREM",
            Command::PExpire { .. } => "PEXPIRE",
            Command::ZAdd { .. } => "ZADD",
            Command::ZRemRangeByScore { .. } => "ZREMRANGEBYSCORE",
            Command::ZCard { .. } => "ZCARD",
            Command::ZCount { .. } => "ZCOUNT",
            Command::Del { .. } => "DEL",
        }
    }
}

/// An ordered batch of commands executed atomically by [`KvStore::exec`].
///
/// Replies come back in the order the commands were queued.
///
/// ```ignore
/// let mut tx = Transaction::new();
/// tx.zadd("rl:user", now, member)
///     .zrem_range_by_score("rl:user", ScoreBound::NegInf, ScoreBound::Inclusive(now - window))
///     .zcard("rl:user");
/// let replies = store.exec(tx).await?;
/// ```
///
/// [`KvStore::exec`]: crate::KvStore::exec
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_px(&mut self, key: impl Into<String>, value: Vec<u8>, ttl_ms: u64) -> &mut Self {
        self.push(Command::SetPx {
            key: key.into(),
            value,
            ttl_ms,
        })
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::SAdd {
            key: key.into(),
            members: vec![member.into()],
        })
    }

    pub fn srem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::SRem {
            key: key.into(),
            members: vec![member.into()],
        })
    }

    pub fn pexpire(&mut self, key: impl Into<String>, ttl_ms: u64) -> &mut Self {
        self.pexpire_if(key, ttl_ms, ExpireCondition::Always)
    }

    pub fn pexpire_if(
        &mut self,
        key: impl Into<String>,
        ttl_ms: u64,
        condition: ExpireCondition,
    ) -> &mut Self {
        self.push(Command::PExpire {
            key: key.into(),
            ttl_ms,
            condition,
        })
    }

    /// Gives `key` an expiry of at least `ttl_ms` without ever shortening it.
    ///
    /// Queues `PEXPIRE NX` (keys without an expiry) followed by `PEXPIRE GT`
    /// (keys expiring sooner), so it adds two replies.
    pub fn pexpire_extend(&mut self, key: impl Into<String>, ttl_ms: u64) -> &mut Self {
        let key = key.into();
        self.pexpire_if(key.clone(), ttl_ms, ExpireCondition::NoExpiry)
            .pexpire_if(key, ttl_ms, ExpireCondition::Later)
    }

    pub fn zadd(&mut self, key: impl Into<String>, score: i64, member: impl Into<String>) -> &mut Self {
        self.push(Command::ZAdd {
            key: key.into(),
            score,
            member: member.into(),
        })
    }

    pub fn zrem_range_by_score(
        &mut self,
        key: impl Into<String>,
        min: ScoreBound,
        max: ScoreBound,
    ) -> &mut Self {
        self.push(Command::ZRemRangeByScore {
            key: key.into(),
            min,
            max,
        })
    }

    pub fn zcard(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::ZCard { key: key.into() })
    }

    pub fn zcount(&mut self, key: impl Into<String>, min: ScoreBound, max: ScoreBound) -> &mut Self {
        self.push(Command::ZCount {
            key: key.into(),
            min,
            max,
        })
    }

    pub fn del(&mut self, keys: Vec<String>) -> &mut Self {
        self.push(Command::Del { keys })
    }

    /// The queued commands, in execution order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }
}

/// The reply to one command of a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Status reply (`OK`).
    Ok,
    /// Integer reply (counts, cardinalities, flags).
    Int(i64),
    /// Null reply.
    Nil,
    /// Bulk string reply.
    Bytes(Vec<u8>),
}

impl Reply {
    /// Returns the integer payload, if this is an integer reply.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Int(value) => Some(*value),
            _ => None,
        }
    }
}

/// Result of a `PTTL` probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist (already expired or never written).
    Missing,
    /// The key exists without an expiry.
    Persistent,
    /// The key expires after the given number of milliseconds.
    Remaining(u64),
}

impl Ttl {
    /// Maps a raw `PTTL` integer reply (`-2`, `-1`, or milliseconds).
    pub fn from_pttl(raw: i64) -> Self {
        match raw {
            -2 => Ttl::Missing,
            -1 => Ttl::Persistent,
            ms if ms < 0 => Ttl::Missing,
            ms => Ttl::Remaining(ms as u64),
        }
    }

    /// `true` when nothing is left to live for: missing or zero remaining.
    pub fn is_exhausted(self) -> bool {
        matches!(self, Ttl::Missing | Ttl::Remaining(0))
    }
}

/// One page of a cursor-based key scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` when iteration is complete.
    pub cursor: u64,
    pub keys: Vec<String>,
}

impl ScanPage {
    pub fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

/// Backend memory usage, as far as the backend reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_human: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_human: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragmentation_ratio: Option<f64>,
}
