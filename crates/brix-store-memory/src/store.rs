use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use brix_store::{
    Command, DynClock, ExpireCondition, KvStore, MemoryInfo, Reply, ScanPage, ScoreBound, StoreError, StoreResult,
    Transaction, Ttl,
};
use parking_lot::Mutex;

use crate::glob::glob_match;

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug, Clone)]
enum Value {
    Str(Vec<u8>),
    Set(BTreeSet<String>),
    /// member -> score
    ZSet(HashMap<String, i64>),
}

impl Value {
    fn approx_size(&self) -> usize {
        match self {
            Value::Str(bytes) => bytes.len(),
            Value::Set(members) => members.iter().map(String::len).sum(),
            Value::ZSet(members) => members.keys().map(|m| m.len() + 8).sum(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    /// Absolute expiry in epoch milliseconds.
    expires_at: Option<i64>,
    /// Creation sequence; doubles as the scan cursor.
    seq: u64,
}

impl Slot {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug)]
struct Keyspace {
    slots: HashMap<String, Slot>,
    next_seq: u64,
}

impl Keyspace {
    fn new() -> Self {
        Self {
            slots: HashMap::new(),
            next_seq: 1,
        }
    }

    /// Returns the live slot for `key`, reaping it first if it has expired.
    fn live(&mut self, key: &str, now: i64) -> Option<&mut Slot> {
        if self.slots.get(key).is_some_and(|slot| slot.is_expired(now)) {
            self.slots.remove(key);
        }
        self.slots.get_mut(key)
    }

    fn reap(&mut self, now: i64) {
        self.slots.retain(|_, slot| !slot.is_expired(now));
    }

    fn insert(&mut self, key: &str, value: Value, expires_at: Option<i64>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(
            key.to_string(),
            Slot {
                value,
                expires_at,
                seq,
            },
        );
    }

    fn set_px(&mut self, key: &str, value: &[u8], ttl_ms: u64, now: i64) -> StoreResult<Reply> {
        if ttl_ms == 0 {
            return Err(StoreError::command("SET", "invalid expire time in 'set' command"));
        }
        let expires_at = Some(deadline(now, ttl_ms));
        match self.live(key, now) {
            Some(slot) => {
                slot.value = Value::Str(value.to_vec());
                slot.expires_at = expires_at;
            }
            None => self.insert(key, Value::Str(value.to_vec()), expires_at),
        }
        Ok(Reply::Ok)
    }

    fn sadd(&mut self, key: &str, members: &[String], now: i64) -> StoreResult<Reply> {
        if self.live(key, now).is_none() {
            self.insert(key, Value::Set(BTreeSet::new()), None);
        }
        match self.slots.get_mut(key).map(|slot| &mut slot.value) {
            Some(Value::Set(set)) => {
                let added = members.iter().filter(|m| set.insert((*m).clone())).count();
                Ok(Reply::Int(added as i64))
            }
            _ => Err(StoreError::command("SADD", WRONGTYPE)),
        }
    }

    fn srem(&mut self, key: &str, members: &[String], now: i64) -> StoreResult<Reply> {
        let (removed, now_empty) = match self.live(key, now).map(|slot| &mut slot.value) {
            None => return Ok(Reply::Int(0)),
            Some(Value::Set(set)) => {
                let removed = members.iter().filter(|m| set.remove(m.as_str())).count();
                (removed, set.is_empty())
            }
            Some(_) => return Err(StoreError::command("SREM", WRONGTYPE)),
        };
        if now_empty {
            self.slots.remove(key);
        }
        Ok(Reply::Int(removed as i64))
    }

    fn pexpire(&mut self, key: &str, ttl_ms: u64, condition: ExpireCondition, now: i64) -> Reply {
        let candidate = deadline(now, ttl_ms);
        match self.live(key, now) {
            Some(slot) if condition.permits(slot.expires_at, candidate) => {
                slot.expires_at = Some(candidate);
                Reply::Int(1)
            }
            _ => Reply::Int(0),
        }
    }

    fn zadd(&mut self, key: &str, score: i64, member: &str, now: i64) -> StoreResult<Reply> {
        if self.live(key, now).is_none() {
            self.insert(key, Value::ZSet(HashMap::new()), None);
        }
        match self.slots.get_mut(key).map(|slot| &mut slot.value) {
            Some(Value::ZSet(zset)) => {
                let added = zset.insert(member.to_string(), score).is_none();
                Ok(Reply::Int(i64::from(added)))
            }
            _ => Err(StoreError::command("ZADD", WRONGTYPE)),
        }
    }

    fn zrem_range_by_score(
        &mut self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
        now: i64,
    ) -> StoreResult<Reply> {
        let (removed, now_empty) = match self.live(key, now).map(|slot| &mut slot.value) {
            None => return Ok(Reply::Int(0)),
            Some(Value::ZSet(zset)) => {
                let before = zset.len();
                zset.retain(|_, score| !ScoreBound::contains(min, max, *score));
                (before - zset.len(), zset.is_empty())
            }
            Some(_) => return Err(StoreError::command("ZREMRANGEBYSCORE", WRONGTYPE)),
        };
        if now_empty {
            self.slots.remove(key);
        }
        Ok(Reply::Int(removed as i64))
    }

    fn zcount(&mut self, key: &str, min: ScoreBound, max: ScoreBound, now: i64) -> StoreResult<u64> {
        match self.live(key, now).map(|slot| &slot.value) {
            None => Ok(0),
            Some(Value::ZSet(zset)) => Ok(zset
                .values()
                .filter(|score| ScoreBound::contains(min, max, **score))
                .count() as u64),
            Some(_) => Err(StoreError::command("ZCOUNT", WRONGTYPE)),
        }
    }

    fn zcard(&mut self, key: &str, now: i64) -> StoreResult<u64> {
        self.zcount(key, ScoreBound::NegInf, ScoreBound::PosInf, now)
            .map_err(|_| StoreError::command("ZCARD", WRONGTYPE))
    }

    fn del(&mut self, keys: &[String], now: i64) -> u64 {
        let unique: HashSet<&String> = keys.iter().collect();
        unique
            .into_iter()
            .filter(|key| {
                let existed = self.live(key, now).is_some();
                self.slots.remove(key.as_str());
                existed
            })
            .count() as u64
    }

    fn apply(&mut self, command: &Command, now: i64) -> StoreResult<Reply> {
        match command {
            Command::SetPx { key, value, ttl_ms } => self.set_px(key, value, *ttl_ms, now),
            Command::SAdd { key, members } => self.sadd(key, members, now),
            Command::SRem { key, members } => self.srem(key, members, now),
            Command::PExpire {
                key,
                ttl_ms,
                condition,
            } => Ok(self.pexpire(key, *ttl_ms, *condition, now)),
            Command::ZAdd { key, score, member } => self.zadd(key, *score, member, now),
            Command::ZRemRangeByScore { key, min, max } => {
                self.zrem_range_by_score(key, *min, *max, now)
            }
            Command::ZCard { key } => self.zcard(key, now).map(|n| Reply::Int(n as i64)),
            Command::ZCount { key, min, max } => {
                self.zcount(key, *min, *max, now).map(|n| Reply::Int(n as i64))
            }
            Command::Del { keys } => Ok(Reply::Int(self.del(keys, now) as i64)),
        }
    }
}

/// Absolute expiry `ttl_ms` after `now`, clamped to the far future.
fn deadline(now: i64, ttl_ms: u64) -> i64 {
    now.saturating_add(i64::try_from(ttl_ms).unwrap_or(i64::MAX))
}

fn touched_keys(command: &Command) -> Vec<&str> {
    match command {
        Command::SetPx { key, .. }
        | Command::SAdd { key, .. }
        | Command::SRem { key, .. }
        | Command::PExpire { key, .. }
        | Command::ZAdd { key, .. }
        | Command::ZRemRangeByScore { key, .. }
        | Command::ZCard { key }
        | Command::ZCount { key, .. } => vec![key.as_str()],
        Command::Del { keys } => keys.iter().map(String::as_str).collect(),
    }
}

/// Renders a byte count the way Redis `INFO` does (`1.50K`, `2.00M`).
fn human_bytes(bytes: u64) -> String {
    const UNITS: [(&str, f64); 3] = [("G", 1_073_741_824.0), ("M", 1_048_576.0), ("K", 1024.0)];
    for (suffix, size) in UNITS {
        if bytes as f64 >= size {
            return format!("{:.2}{suffix}", bytes as f64 / size);
        }
    }
    format!("{bytes}B")
}

/// Process-local [`KvStore`] with store-side TTL driven by an injected clock.
///
/// The whole keyspace sits behind one mutex, so a [`Transaction`] is applied
/// under a single lock acquisition and is all-or-nothing: if any command fails
/// the touched keys are restored to their previous state.
///
/// Useful for tests (pair it with [`brix_store::ManualClock`]) and as the
/// single-instance fallback when Redis is disabled or unreachable.
#[derive(Debug)]
pub struct InMemoryStore {
    keyspace: Mutex<Keyspace>,
    clock: DynClock,
}

impl InMemoryStore {
    pub fn new(clock: DynClock) -> Self {
        Self {
            keyspace: Mutex::new(Keyspace::new()),
            clock,
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock();
        keyspace.reap(now);
        keyspace.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn now(&self) -> i64 {
        self.clock.now_ms()
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = self.now();
        let mut keyspace = self.keyspace.lock();
        match keyspace.live(key, now).map(|slot| &slot.value) {
            None => Ok(None),
            Some(Value::Str(bytes)) => Ok(Some(bytes.clone())),
            Some(_) => Err(StoreError::command("GET", WRONGTYPE)),
        }
    }

    async fn set_px(&self, key: &str, value: &[u8], ttl_ms: u64) -> StoreResult<()> {
        let now = self.now();
        self.keyspace.lock().set_px(key, value, ttl_ms, now)?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        let now = self.now();
        Ok(self.keyspace.lock().del(keys, now))
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let now = self.now();
        let mut keyspace = self.keyspace.lock();
        match keyspace.live(key, now).map(|slot| &slot.value) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StoreError::command("SMEMBERS", WRONGTYPE)),
        }
    }

    async fn srem(&self, key: &str, members: &[String]) -> StoreResult<u64> {
        let now = self.now();
        let reply = self.keyspace.lock().srem(key, members, now)?;
        Ok(reply.as_int().unwrap_or(0) as u64)
    }

    async fn scard(&self, key: &str) -> StoreResult<u64> {
        let now = self.now();
        let mut keyspace = self.keyspace.lock();
        match keyspace.live(key, now).map(|slot| &slot.value) {
            None => Ok(0),
            Some(Value::Set(set)) => Ok(set.len() as u64),
            Some(_) => Err(StoreError::command("SCARD", WRONGTYPE)),
        }
    }

    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<u64> {
        let now = self.now();
        self.keyspace.lock().zcount(key, min, max, now)
    }

    async fn pttl(&self, key: &str) -> StoreResult<Ttl> {
        let now = self.now();
        let mut keyspace = self.keyspace.lock();
        Ok(match keyspace.live(key, now) {
            None => Ttl::Missing,
            Some(Slot {
                expires_at: None, ..
            }) => Ttl::Persistent,
            Some(Slot {
                expires_at: Some(at),
                ..
            }) => Ttl::Remaining((*at - now).max(0) as u64),
        })
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanPage> {
        let now = self.now();
        let mut keyspace = self.keyspace.lock();
        keyspace.reap(now);

        let mut candidates: Vec<(u64, &String)> = keyspace
            .slots
            .iter()
            .filter(|(_, slot)| slot.seq >= cursor)
            .map(|(key, slot)| (slot.seq, key))
            .collect();
        candidates.sort_unstable_by_key(|(seq, _)| *seq);

        let page_size = count.max(1);
        let next_cursor = if candidates.len() > page_size {
            candidates[page_size - 1].0 + 1
        } else {
            0
        };
        let keys = candidates
            .into_iter()
            .take(page_size)
            .filter(|(_, key)| glob_match(pattern, key))
            .map(|(_, key)| key.clone())
            .collect();

        Ok(ScanPage {
            cursor: next_cursor,
            keys,
        })
    }

    async fn exec(&self, tx: Transaction) -> StoreResult<Vec<Reply>> {
        let now = self.now();
        let mut keyspace = self.keyspace.lock();

        let mut snapshot: HashMap<String, Option<Slot>> = HashMap::new();
        for command in tx.commands() {
            for key in touched_keys(command) {
                snapshot
                    .entry(key.to_string())
                    .or_insert_with(|| keyspace.slots.get(key).cloned());
            }
        }

        let mut replies = Vec::with_capacity(tx.len());
        for command in tx.commands() {
            match keyspace.apply(command, now) {
                Ok(reply) => replies.push(reply),
                Err(e) => {
                    for (key, previous) in snapshot {
                        match previous {
                            Some(slot) => keyspace.slots.insert(key, slot),
                            None => keyspace.slots.remove(&key),
                        };
                    }
                    tracing::debug!(command = command.name(), error = %e, "transaction rolled back");
                    return Err(e);
                }
            }
        }
        Ok(replies)
    }

    async fn memory_info(&self) -> StoreResult<MemoryInfo> {
        let now = self.now();
        let mut keyspace = self.keyspace.lock();
        keyspace.reap(now);
        let used: usize = keyspace
            .slots
            .iter()
            .map(|(key, slot)| key.len() + slot.value.approx_size())
            .sum();
        Ok(MemoryInfo {
            used_bytes: Some(used as u64),
            used_human: Some(human_bytes(used as u64)),
            peak_human: None,
            fragmentation_ratio: None,
        })
    }
}
