//! # Content Cache
//! One in-memory slot per source URL, replaced wholesale on every successful
//! fetch. Freshness is decided lazily at read time; stale entries are kept
//! as a fallback and are only ever overwritten, never evicted by age.
//!
//! Each entry also carries a word-frequency index. It is exposed for
//! inspection (`word_index`, `top_words`, `stats`) and not used by ranking.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\w+").expect("word regex"));

/// Time source, injectable so TTL behavior can be tested without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut g = self.now.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(next) = ChronoDuration::from_std(by)
            .ok()
            .and_then(|d| g.checked_add_signed(d))
        {
            *g = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub content: String,
    pub fetched_at: DateTime<Utc>,
    pub word_index: HashMap<String, usize>,
}

/// Fresh while `now - fetched_at <= ttl`.
pub fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>, ttl: Duration) -> bool {
    let age = now.signed_duration_since(entry.fetched_at);
    match age.to_std() {
        Ok(age) => age <= ttl,
        // fetched "in the future" (clock skew): treat as fresh
        Err(_) => true,
    }
}

/// Lowercased word counts, ignoring tokens of two characters or fewer.
pub fn build_word_index(content: &str) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for m in RE_WORD.find_iter(content) {
        let word = m.as_str().to_lowercase();
        if word.chars().count() <= 2 {
            continue;
        }
        *index.entry(word).or_insert(0) += 1;
    }
    index
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh: usize,
    pub stale: usize,
    pub indexed_words: usize,
}

/// Key→entry store owned by one engine instance.
pub struct ContentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ContentCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Content if an entry exists and is within the TTL.
    pub fn get_fresh(&self, url: &str) -> Option<String> {
        let now = self.clock.now();
        let guard = self.entries.read().unwrap_or_else(|p| p.into_inner());
        guard
            .get(url)
            .filter(|e| is_fresh(e, now, self.ttl))
            .map(|e| e.content.clone())
    }

    /// Content of any entry for `url`, fresh or stale.
    pub fn get_any(&self, url: &str) -> Option<String> {
        let guard = self.entries.read().unwrap_or_else(|p| p.into_inner());
        guard.get(url).map(|e| e.content.clone())
    }

    pub fn get_entry(&self, url: &str) -> Option<CacheEntry> {
        let guard = self.entries.read().unwrap_or_else(|p| p.into_inner());
        guard.get(url).cloned()
    }

    /// Replace the slot for `url` with fresh content and a new index.
    pub fn put(&self, url: &str, content: String) {
        let entry = CacheEntry {
            word_index: build_word_index(&content),
            content,
            fetched_at: self.clock.now(),
        };
        debug!(
            target: "cache",
            url,
            words = entry.word_index.len(),
            "cache entry replaced"
        );
        let mut guard = self.entries.write().unwrap_or_else(|p| p.into_inner());
        guard.insert(url.to_string(), entry);
    }

    pub fn word_index(&self, url: &str) -> Option<HashMap<String, usize>> {
        let guard = self.entries.read().unwrap_or_else(|p| p.into_inner());
        guard.get(url).map(|e| e.word_index.clone())
    }

    /// Most frequent indexed words for `url`, ties broken alphabetically.
    pub fn top_words(&self, url: &str, n: usize) -> Vec<(String, usize)> {
        let Some(index) = self.word_index(url) else {
            return Vec::new();
        };
        let mut words: Vec<(String, usize)> = index.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(n);
        words
    }

    pub fn invalidate(&self, url: &str) -> bool {
        let mut guard = self.entries.write().unwrap_or_else(|p| p.into_inner());
        guard.remove(url).is_some()
    }

    pub fn clear(&self) {
        let mut guard = self.entries.write().unwrap_or_else(|p| p.into_inner());
        guard.clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let guard = self.entries.read().unwrap_or_else(|p| p.into_inner());
        let mut stats = CacheStats {
            entries: guard.len(),
            ..CacheStats::default()
        };
        for e in guard.values() {
            if is_fresh(e, now, self.ttl) {
                stats.fresh += 1;
            } else {
                stats.stale += 1;
            }
            stats.indexed_words += e.word_index.len();
        }
        stats
    }
}
