//! Sharded In-Memory Store
//!
//! Backing storage for the in-process client. Keys are spread over
//! [`NUM_SHARDS`] shards, each behind its own `RwLock`, so unrelated keys do
//! not contend. Strings and lists share one key space; using a key with the
//! wrong kind of operation yields [`StoreError::WrongType`].
//!
//! Expiry is lazy: an expired entry is treated as absent and removed the next
//! time a writer touches it.

use bytes::Bytes;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Number of shards.
const NUM_SHARDS: usize = 64;

/// Errors reported by store operations, worded as the server would reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR no such key")]
    NoSuchKey,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The value held under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    Str(Bytes),
    List(VecDeque<Bytes>),
}

impl Data {
    fn type_name(&self) -> &'static str {
        match self {
            Data::Str(_) => "string",
            Data::List(_) => "list",
        }
    }
}

/// A stored value with optional expiry.
#[derive(Debug, Clone)]
pub struct Entry {
    pub data: Data,
    pub expires_at: Option<Instant>,
}

impl Entry {
    pub fn new(data: Data) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

/// Condition attached to a `SET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    Always,
    /// `NX`
    IfAbsent,
    /// `XX`
    IfPresent,
}

/// Which end of a list to operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Front,
    Back,
}

type Map = HashMap<Bytes, Entry>;

#[derive(Debug, Default)]
struct Shard {
    entries: RwLock<Map>,
}

/// A thread-safe key-value store with string and list values.
#[derive(Debug)]
pub struct Store {
    shards: Vec<Shard>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// The instant `ttl` from now, or `None` if `Instant` cannot represent it.
///
/// Callers that accept client-supplied expiries should reject `None` up
/// front; the store itself treats it as "no expiry".
pub fn deadline(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

fn live<'a>(map: &'a Map, key: &Bytes) -> Option<&'a Entry> {
    map.get(key).filter(|entry| !entry.is_expired())
}

/// Drops `key` if it has expired, then returns the live entry if any.
fn live_mut<'a>(map: &'a mut Map, key: &Bytes) -> Option<&'a mut Entry> {
    if map.get(key).map(Entry::is_expired).unwrap_or(false) {
        map.remove(key);
    }
    map.get_mut(key)
}

impl Store {
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
        }
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    fn read<T>(&self, key: &Bytes, f: impl FnOnce(Option<&Entry>) -> T) -> T {
        let map = self.shard(key).entries.read().unwrap();
        f(live(&map, key))
    }

    fn write<T>(&self, key: &Bytes, f: impl FnOnce(&mut Map) -> T) -> T {
        let mut map = self.shard(key).entries.write().unwrap();
        f(&mut map)
    }

    // ========================================================================
    // Strings
    // ========================================================================

    /// Sets a string value, dropping any previous expiry.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.set_if(key, value, None, SetCondition::Always);
    }

    /// Sets a string value that expires after `ttl`.
    pub fn set_with_ttl(&self, key: Bytes, value: Bytes, ttl: Duration) {
        self.set_if(key, value, Some(ttl), SetCondition::Always);
    }

    /// Sets a string value if `condition` holds. Returns whether it was set.
    pub fn set_if(
        &self,
        key: Bytes,
        value: Bytes,
        ttl: Option<Duration>,
        condition: SetCondition,
    ) -> bool {
        self.write(&key.clone(), |map| {
            let present = live_mut(map, &key).is_some();
            let allowed = match condition {
                SetCondition::Always => true,
                SetCondition::IfAbsent => !present,
                SetCondition::IfPresent => present,
            };
            if allowed {
                let mut entry = Entry::new(Data::Str(value));
                entry.expires_at = ttl.and_then(deadline);
                map.insert(key, entry);
            }
            allowed
        })
    }

    pub fn get(&self, key: &Bytes) -> StoreResult<Option<Bytes>> {
        self.read(key, |entry| match entry.map(|e| &e.data) {
            None => Ok(None),
            Some(Data::Str(value)) => Ok(Some(value.clone())),
            Some(Data::List(_)) => Err(StoreError::WrongType),
        })
    }

    /// Sets a new value and returns the previous one.
    pub fn getset(&self, key: Bytes, value: Bytes) -> StoreResult<Option<Bytes>> {
        self.write(&key.clone(), |map| {
            let previous = match live_mut(map, &key).map(|e| &e.data) {
                None => None,
                Some(Data::Str(old)) => Some(old.clone()),
                Some(Data::List(_)) => return Err(StoreError::WrongType),
            };
            map.insert(key, Entry::new(Data::Str(value)));
            Ok(previous)
        })
    }

    /// Adds `delta` to an integer value, treating a missing key as 0.
    pub fn incr_by(&self, key: &Bytes, delta: i64) -> StoreResult<i64> {
        self.write(key, |map| {
            let (current, expires_at) = match live_mut(map, key) {
                None => (0, None),
                Some(Entry {
                    data: Data::Str(value),
                    expires_at,
                }) => {
                    let current = std::str::from_utf8(value)
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok())
                        .ok_or(StoreError::NotAnInteger)?;
                    (current, *expires_at)
                }
                Some(_) => return Err(StoreError::WrongType),
            };

            let next = current.checked_add(delta).ok_or(StoreError::Overflow)?;
            map.insert(
                key.clone(),
                Entry {
                    data: Data::Str(Bytes::from(next.to_string())),
                    expires_at,
                },
            );
            Ok(next)
        })
    }

    /// Appends to a string value. Returns the new length.
    pub fn append(&self, key: &Bytes, suffix: &[u8]) -> StoreResult<usize> {
        self.write(key, |map| match live_mut(map, key) {
            None => {
                map.insert(key.clone(), Entry::new(Data::Str(Bytes::copy_from_slice(suffix))));
                Ok(suffix.len())
            }
            Some(Entry {
                data: Data::Str(value),
                ..
            }) => {
                let mut joined = Vec::with_capacity(value.len() + suffix.len());
                joined.extend_from_slice(value);
                joined.extend_from_slice(suffix);
                let len = joined.len();
                *value = Bytes::from(joined);
                Ok(len)
            }
            Some(_) => Err(StoreError::WrongType),
        })
    }

    pub fn strlen(&self, key: &Bytes) -> StoreResult<usize> {
        Ok(self.get(key)?.map(|v| v.len()).unwrap_or(0))
    }

    // ========================================================================
    // Lists
    // ========================================================================

    /// Pushes values one by one onto `end`. Returns the new length.
    pub fn push(&self, key: &Bytes, values: Vec<Bytes>, end: End) -> StoreResult<usize> {
        self.write(key, |map| {
            if live_mut(map, key).is_none() {
                map.insert(key.clone(), Entry::new(Data::List(VecDeque::new())));
            }
            match map.get_mut(key).map(|e| &mut e.data) {
                Some(Data::List(list)) => {
                    for value in values {
                        match end {
                            End::Front => list.push_front(value),
                            End::Back => list.push_back(value),
                        }
                    }
                    Ok(list.len())
                }
                _ => Err(StoreError::WrongType),
            }
        })
    }

    /// Pops one value from `end`. An emptied list is removed.
    pub fn pop(&self, key: &Bytes, end: End) -> StoreResult<Option<Bytes>> {
        self.write(key, |map| {
            let (popped, now_empty) = match live_mut(map, key).map(|e| &mut e.data) {
                None => return Ok(None),
                Some(Data::List(list)) => {
                    let popped = match end {
                        End::Front => list.pop_front(),
                        End::Back => list.pop_back(),
                    };
                    (popped, list.is_empty())
                }
                Some(_) => return Err(StoreError::WrongType),
            };
            if now_empty {
                map.remove(key);
            }
            Ok(popped)
        })
    }

    pub fn llen(&self, key: &Bytes) -> StoreResult<usize> {
        self.read(key, |entry| match entry.map(|e| &e.data) {
            None => Ok(0),
            Some(Data::List(list)) => Ok(list.len()),
            Some(_) => Err(StoreError::WrongType),
        })
    }

    /// Returns the inclusive range `start..=stop`; negative indexes count from the end.
    pub fn lrange(&self, key: &Bytes, start: i64, stop: i64) -> StoreResult<Vec<Bytes>> {
        self.read(key, |entry| {
            let list = match entry.map(|e| &e.data) {
                None => return Ok(Vec::new()),
                Some(Data::List(list)) => list,
                Some(_) => return Err(StoreError::WrongType),
            };

            let len = list.len() as i64;
            let resolve = |i: i64| if i < 0 { (len + i).max(0) } else { i };
            let (start, stop) = (resolve(start), resolve(stop).min(len - 1));
            if len == 0 || start > stop {
                return Ok(Vec::new());
            }
            Ok(list
                .iter()
                .skip(start as usize)
                .take((stop - start + 1) as usize)
                .cloned()
                .collect())
        })
    }

    // ========================================================================
    // Keys
    // ========================================================================

    pub fn delete(&self, key: &Bytes) -> bool {
        self.write(key, |map| match map.remove(key) {
            Some(entry) => !entry.is_expired(),
            None => false,
        })
    }

    pub fn exists(&self, key: &Bytes) -> bool {
        self.read(key, |entry| entry.is_some())
    }

    /// Sets a TTL on an existing key. An unrepresentable `ttl` clears it.
    pub fn expire(&self, key: &Bytes, ttl: Duration) -> bool {
        self.write(key, |map| match live_mut(map, key) {
            Some(entry) => {
                entry.expires_at = deadline(ttl);
                true
            }
            None => false,
        })
    }

    /// Removes the TTL from a key. Returns false if there was none.
    pub fn persist(&self, key: &Bytes) -> bool {
        self.write(key, |map| match live_mut(map, key) {
            Some(entry) => entry.expires_at.take().is_some(),
            None => false,
        })
    }

    /// Remaining TTL in seconds; `-2` for a missing key, `-1` for no expiry.
    pub fn ttl(&self, key: &Bytes) -> i64 {
        self.read(key, |entry| match entry {
            None => -2,
            Some(Entry {
                expires_at: None, ..
            }) => -1,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => at.saturating_duration_since(Instant::now()).as_secs() as i64,
        })
    }

    pub fn key_type(&self, key: &Bytes) -> &'static str {
        self.read(key, |entry| entry.map(|e| e.data.type_name()).unwrap_or("none"))
    }

    /// Moves the value (and TTL) of `from` to `to`, replacing whatever was there.
    pub fn rename(&self, from: &Bytes, to: Bytes) -> StoreResult<()> {
        let entry = self
            .write(from, |map| {
                let entry = map.remove(from)?;
                (!entry.is_expired()).then_some(entry)
            })
            .ok_or(StoreError::NoSuchKey)?;
        self.write(&to.clone(), |map| map.insert(to, entry));
        Ok(())
    }

    /// Returns the live keys matching a glob pattern, sorted.
    pub fn keys(&self, pattern: &str) -> Vec<Bytes> {
        let mut found: Vec<Bytes> = self
            .shards
            .iter()
            .flat_map(|shard| {
                let map = shard.entries.read().unwrap();
                map.iter()
                    .filter(|(key, entry)| !entry.is_expired() && glob_match(pattern.as_bytes(), key))
                    .map(|(key, _)| key.clone())
                    .collect::<Vec<_>>()
            })
            .collect();
        found.sort();
        found
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let map = shard.entries.read().unwrap();
                map.values().filter(|entry| !entry.is_expired()).count()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush(&self) {
        for shard in &self.shards {
            shard.entries.write().unwrap().clear();
        }
    }
}

/// Glob matching with `*`, `?`, `[abc]`, `[^a-z]` and `\` escapes.
///
/// An unclosed `[` matches itself. Runs of `*` behave as one, and only the
/// most recent `*` is ever retried, so matching stays linear in practice.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Pattern position after the last `*`, and the text position it resumes from.
    let mut retry: Option<(usize, usize)> = None;

    while p < pattern.len() || t < text.len() {
        if p < pattern.len() {
            if pattern[p] == b'*' {
                while p < pattern.len() && pattern[p] == b'*' {
                    p += 1;
                }
                retry = Some((p, t));
                continue;
            }
            if t < text.len() {
                if let Some(width) = match_one(&pattern[p..], text[t]) {
                    p += width;
                    t += 1;
                    continue;
                }
            }
        }
        match retry {
            Some((star_p, star_t)) if star_t < text.len() => {
                retry = Some((star_p, star_t + 1));
                p = star_p;
                t = star_t + 1;
            }
            _ => return false,
        }
    }

    true
}

/// Matches the token at the start of `pattern` against `c`.
///
/// Returns the token's width in the pattern on a match.
fn match_one(pattern: &[u8], c: u8) -> Option<usize> {
    match pattern[0] {
        b'?' => Some(1),
        b'[' => {
            let Some(close) = pattern[1..].iter().position(|&b| b == b']') else {
                return (c == b'[').then_some(1);
            };
            let mut class = &pattern[1..close + 1];
            let negate = class.first() == Some(&b'^');
            if negate {
                class = &class[1..];
            }

            let mut matched = false;
            let mut i = 0;
            while i < class.len() {
                if i + 2 < class.len() && class[i + 1] == b'-' {
                    matched |= class[i] <= c && c <= class[i + 2];
                    i += 3;
                } else {
                    matched |= class[i] == c;
                    i += 1;
                }
            }

            (matched != negate).then_some(close + 2)
        }
        b'\\' if pattern.len() > 1 => (pattern[1] == c).then_some(2),
        literal => (literal == c).then_some(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_set_and_get() {
        let store = Store::new();
        store.set(b("key"), b("value"));
        assert_eq!(store.get(&b("key")), Ok(Some(b("value"))));
        assert_eq!(store.get(&b("missing")), Ok(None));
    }

    #[test]
    fn test_set_conditions() {
        let store = Store::new();
        assert!(!store.set_if(b("k"), b("1"), None, SetCondition::IfPresent));
        assert!(store.set_if(b("k"), b("1"), None, SetCondition::IfAbsent));
        assert!(!store.set_if(b("k"), b("2"), None, SetCondition::IfAbsent));
        assert!(store.set_if(b("k"), b("3"), None, SetCondition::IfPresent));
        assert_eq!(store.get(&b("k")), Ok(Some(b("3"))));
    }

    #[test]
    fn test_expiry_is_lazy() {
        let store = Store::new();
        store.set_with_ttl(b("key"), b("value"), Duration::from_millis(30));
        assert!(store.exists(&b("key")));

        std::thread::sleep(Duration::from_millis(60));

        assert_eq!(store.get(&b("key")), Ok(None));
        assert!(!store.exists(&b("key")));
        assert_eq!(store.ttl(&b("key")), -2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_ttl_and_persist() {
        let store = Store::new();
        store.set(b("key"), b("value"));
        assert_eq!(store.ttl(&b("key")), -1);
        assert!(store.expire(&b("key"), Duration::from_secs(100)));
        assert!(store.ttl(&b("key")) > 90);
        assert!(store.persist(&b("key")));
        assert!(!store.persist(&b("key")));
        assert_eq!(store.ttl(&b("key")), -1);
    }

    #[test]
    fn test_incr_by() {
        let store = Store::new();
        assert_eq!(store.incr_by(&b("n"), 5), Ok(5));
        assert_eq!(store.incr_by(&b("n"), -7), Ok(-2));

        store.set(b("s"), b("abc"));
        assert_eq!(store.incr_by(&b("s"), 1), Err(StoreError::NotAnInteger));

        store.set(b("max"), b(&i64::MAX.to_string()));
        assert_eq!(store.incr_by(&b("max"), 1), Err(StoreError::Overflow));
    }

    #[test]
    fn test_incr_keeps_ttl() {
        let store = Store::new();
        store.set_with_ttl(b("n"), b("1"), Duration::from_secs(100));
        store.incr_by(&b("n"), 1).unwrap();
        assert!(store.ttl(&b("n")) > 0);
    }

    #[test]
    fn test_append_and_strlen() {
        let store = Store::new();
        assert_eq!(store.append(&b("k"), b"Hello"), Ok(5));
        assert_eq!(store.append(&b("k"), b" World"), Ok(11));
        assert_eq!(store.strlen(&b("k")), Ok(11));
        assert_eq!(store.strlen(&b("missing")), Ok(0));
    }

    #[test]
    fn test_getset() {
        let store = Store::new();
        assert_eq!(store.getset(b("k"), b("a")), Ok(None));
        assert_eq!(store.getset(b("k"), b("b")), Ok(Some(b("a"))));
    }

    #[test]
    fn test_list_operations() {
        let store = Store::new();
        assert_eq!(store.push(&b("l"), vec![b("a"), b("b")], End::Back), Ok(2));
        assert_eq!(store.push(&b("l"), vec![b("z")], End::Front), Ok(3));
        assert_eq!(store.llen(&b("l")), Ok(3));
        assert_eq!(store.lrange(&b("l"), 0, -1), Ok(vec![b("z"), b("a"), b("b")]));
        assert_eq!(store.lrange(&b("l"), -2, 10), Ok(vec![b("a"), b("b")]));
        assert_eq!(store.lrange(&b("l"), 2, 1), Ok(vec![]));
        assert_eq!(store.pop(&b("l"), End::Front), Ok(Some(b("z"))));
        assert_eq!(store.pop(&b("l"), End::Back), Ok(Some(b("b"))));
        assert_eq!(store.pop(&b("l"), End::Back), Ok(Some(b("a"))));
        assert_eq!(store.key_type(&b("l")), "none");
    }

    #[test]
    fn test_wrong_type() {
        let store = Store::new();
        store.push(&b("l"), vec![b("a")], End::Back).unwrap();
        store.set(b("s"), b("x"));

        assert_eq!(store.get(&b("l")), Err(StoreError::WrongType));
        assert_eq!(store.llen(&b("s")), Err(StoreError::WrongType));
        assert_eq!(
            store.push(&b("s"), vec![b("a")], End::Back),
            Err(StoreError::WrongType)
        );
        assert_eq!(store.key_type(&b("l")), "list");
        assert_eq!(store.key_type(&b("s")), "string");
    }

    #[test]
    fn test_rename() {
        let store = Store::new();
        store.set(b("old"), b("v"));
        store.rename(&b("old"), b("new")).unwrap();
        assert_eq!(store.get(&b("new")), Ok(Some(b("v"))));
        assert!(!store.exists(&b("old")));
        assert_eq!(store.rename(&b("old"), b("x")), Err(StoreError::NoSuchKey));
    }

    #[test]
    fn test_keys_and_flush() {
        let store = Store::new();
        store.set(b("user:1"), b("a"));
        store.set(b("user:2"), b("b"));
        store.set(b("other"), b("c"));

        assert_eq!(store.keys("user:*"), vec![b("user:1"), b("user:2")]);
        assert_eq!(store.keys("*").len(), 3);
        assert_eq!(store.len(), 3);

        store.flush();
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete() {
        let store = Store::new();
        store.set(b("k"), b("v"));
        assert!(store.delete(&b("k")));
        assert!(!store.delete(&b("k")));
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match(b"*", b"anything"));
        assert!(glob_match(b"h?llo", b"hello"));
        assert!(!glob_match(b"h?llo", b"hllo"));
        assert!(glob_match(b"h[ae]llo", b"hallo"));
        assert!(!glob_match(b"h[ae]llo", b"hillo"));
        assert!(glob_match(b"h[^e]llo", b"hallo"));
        assert!(!glob_match(b"h[^e]llo", b"hello"));
        assert!(glob_match(b"key[0-9]", b"key7"));
        assert!(glob_match(b"a\\*", b"a*"));
        assert!(!glob_match(b"a\\*", b"ab"));
        assert!(!glob_match(b"abc", b"ab"));
    }

    #[test]
    fn test_glob_unclosed_bracket_is_literal() {
        assert!(glob_match(b"a[b", b"a[b"));
        assert!(!glob_match(b"a[b", b"ab"));
        assert!(glob_match(b"[*", b"[xyz"));
    }

    #[test]
    fn test_glob_star_runs_and_backtracking() {
        assert!(glob_match(b"a**b", b"axxb"));
        assert!(glob_match(b"*a*b", b"xaxxab"));
        assert!(!glob_match(b"*a*b", b"xaxxa"));
        assert!(glob_match(b"**", b""));

        let text = vec![b'a'; 64];
        assert!(!glob_match(b"*a*a*a*a*a*a*a*a*b", &text));
    }

    #[test]
    fn test_unrepresentable_ttl_never_panics() {
        assert!(deadline(Duration::MAX).is_none());
        assert!(deadline(Duration::from_secs(60)).is_some());

        let store = Store::new();
        store.set_with_ttl(b("k"), b("v"), Duration::MAX);
        assert_eq!(store.ttl(&b("k")), -1);
        assert!(store.expire(&b("k"), Duration::from_secs(i64::MAX as u64)));
        assert_eq!(store.get(&b("k")), Ok(Some(b("v"))));
    }
}
