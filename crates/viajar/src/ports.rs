//! Named infrastructure ports.
//!
//! Collaborators around the application under test (cache, mail,
//! search, queue, clock) are reached through small trait "ports" so
//! tests can swap real adapters for in-memory ones. A stateful port
//! joins branch isolation by implementing
//! [`Restorable`](crate::checkpoint::Restorable); stateless ports like
//! a clock need not.

use crate::checkpoint::Restorable;
use crate::result::{ViajarError, ViajarResult};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Default polling interval for wait-style port operations.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Key/value cache port.
pub trait CachePort: Send {
    /// Fetch a value.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store a value.
    fn set(&mut self, key: &str, value: Value);

    /// Remove a value, returning whether it was present.
    fn delete(&mut self, key: &str) -> bool;
}

/// Captured outbound mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

/// Outbound mail port.
pub trait MailPort: Send {
    /// Record a delivery.
    fn deliver(&mut self, message: MailMessage);

    /// All deliveries to an address, in order.
    fn inbox(&self, to: &str) -> Vec<MailMessage>;

    /// Poll until a delivery to `to` with `subject` arrives.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if nothing matching arrives in time.
    fn wait_for(&self, to: &str, subject: &str, timeout: Duration) -> ViajarResult<MailMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self
                .inbox(to)
                .into_iter()
                .find(|m| m.subject == subject)
            {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(ViajarError::Timeout {
                    ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
            std::thread::sleep(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
        }
    }
}

/// Search index port.
pub trait SearchPort: Send {
    /// Index a document under an id.
    fn index(&mut self, id: &str, document: Value);

    /// Ids of documents whose serialized form contains the query.
    fn query(&self, query: &str) -> Vec<String>;
}

/// FIFO queue port.
pub trait QueuePort: Send {
    /// Push a message.
    fn push(&mut self, message: Value);

    /// Pop the oldest message.
    fn pop(&mut self) -> Option<Value>;

    /// Pending message count.
    fn len(&self) -> usize;

    /// Whether the queue is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Time source port. Stateless from the runner's point of view.
pub trait ClockPort: Send + Sync {
    /// Milliseconds since an arbitrary epoch.
    fn now_ms(&self) -> u64;
}

/// In-memory cache with named save-points for branch isolation.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    data: BTreeMap<String, Value>,
    savepoints: HashMap<String, BTreeMap<String, Value>>,
}

impl InMemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CachePort for InMemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }

    fn delete(&mut self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }
}

impl Restorable for InMemoryCache {
    fn system_name(&self) -> &str {
        "cache"
    }

    fn checkpoint(&mut self, name: &str) -> ViajarResult<()> {
        self.savepoints.insert(name.to_string(), self.data.clone());
        Ok(())
    }

    fn rollback(&mut self, name: &str) -> ViajarResult<()> {
        let saved = self
            .savepoints
            .get(name)
            .ok_or_else(|| ViajarError::CheckpointNotFound {
                name: name.to_string(),
            })?;
        self.data = saved.clone();
        Ok(())
    }

    fn release(&mut self, name: &str) -> ViajarResult<()> {
        self.savepoints
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ViajarError::CheckpointNotFound {
                name: name.to_string(),
            })
    }
}

/// In-memory mail sink.
#[derive(Debug, Default)]
pub struct InMemoryMail {
    deliveries: Vec<MailMessage>,
}

impl InMemoryMail {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total deliveries recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    /// Whether nothing has been delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }
}

impl MailPort for InMemoryMail {
    fn deliver(&mut self, message: MailMessage) {
        self.deliveries.push(message);
    }

    fn inbox(&self, to: &str) -> Vec<MailMessage> {
        self.deliveries
            .iter()
            .filter(|m| m.to == to)
            .cloned()
            .collect()
    }
}

/// In-memory substring search index.
#[derive(Debug, Default)]
pub struct InMemorySearch {
    documents: BTreeMap<String, String>,
}

impl InMemorySearch {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchPort for InMemorySearch {
    fn index(&mut self, id: &str, document: Value) {
        self.documents.insert(id.to_string(), document.to_string());
    }

    fn query(&self, query: &str) -> Vec<String> {
        self.documents
            .iter()
            .filter(|(_, doc)| doc.contains(query))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// In-memory FIFO queue.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    messages: VecDeque<Value>,
}

impl InMemoryQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueuePort for InMemoryQueue {
    fn push(&mut self, message: Value) {
        self.messages.push_back(message);
    }

    fn pop(&mut self) -> Option<Value> {
        self.messages.pop_front()
    }

    fn len(&self) -> usize {
        self.messages.len()
    }
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Manually advanced clock for tests.
#[derive(Debug, Default)]
pub struct MockClock {
    now_ms: std::sync::atomic::AtomicU64,
}

impl MockClock {
    /// Create a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock.
    pub fn advance(&self, by: Duration) {
        self.now_ms.fetch_add(
            u64::try_from(by.as_millis()).unwrap_or(u64::MAX),
            std::sync::atomic::Ordering::SeqCst,
        );
    }
}

impl ClockPort for MockClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    mod cache_tests {
        use super::*;

        #[test]
        fn test_cache_basic_ops() {
            let mut cache = InMemoryCache::new();
            cache.set("k", json!(1));
            assert_eq!(cache.get("k"), Some(json!(1)));
            assert!(cache.delete("k"));
            assert!(!cache.delete("k"));
        }

        #[test]
        fn test_cache_savepoint_round_trip() {
            let mut cache = InMemoryCache::new();
            cache.set("k", json!(1));
            cache.checkpoint("cp").unwrap();

            cache.set("k", json!(2));
            cache.set("extra", json!(3));
            cache.rollback("cp").unwrap();

            assert_eq!(cache.get("k"), Some(json!(1)));
            assert_eq!(cache.get("extra"), None);

            // Savepoint survives rollback until released
            cache.rollback("cp").unwrap();
            cache.release("cp").unwrap();
            assert!(cache.rollback("cp").is_err());
        }
    }

    mod mail_tests {
        use super::*;

        #[test]
        fn test_inbox_filters_by_recipient() {
            let mut mail = InMemoryMail::new();
            mail.deliver(MailMessage {
                to: "a@example.com".to_string(),
                subject: "Welcome".to_string(),
                body: String::new(),
            });
            mail.deliver(MailMessage {
                to: "b@example.com".to_string(),
                subject: "Welcome".to_string(),
                body: String::new(),
            });
            assert_eq!(mail.inbox("a@example.com").len(), 1);
        }

        #[test]
        fn test_wait_for_finds_existing() {
            let mut mail = InMemoryMail::new();
            mail.deliver(MailMessage {
                to: "a@example.com".to_string(),
                subject: "Reset".to_string(),
                body: String::new(),
            });
            let found = mail
                .wait_for("a@example.com", "Reset", Duration::from_millis(10))
                .unwrap();
            assert_eq!(found.subject, "Reset");
        }

        #[test]
        fn test_wait_for_times_out() {
            let mail = InMemoryMail::new();
            let err = mail
                .wait_for("a@example.com", "Never", Duration::from_millis(1))
                .unwrap_err();
            assert!(matches!(err, ViajarError::Timeout { .. }));
        }
    }

    mod queue_tests {
        use super::*;

        #[test]
        fn test_fifo_order() {
            let mut queue = InMemoryQueue::new();
            queue.push(json!(1));
            queue.push(json!(2));
            assert_eq!(queue.pop(), Some(json!(1)));
            assert_eq!(queue.pop(), Some(json!(2)));
            assert!(queue.is_empty());
        }
    }

    mod search_tests {
        use super::*;

        #[test]
        fn test_query_matches_substring() {
            let mut search = InMemorySearch::new();
            search.index("d1", json!({"title": "checkpoint rollback"}));
            search.index("d2", json!({"title": "other"}));
            assert_eq!(search.query("rollback"), vec!["d1"]);
            assert!(search.query("missing").is_empty());
        }
    }

    mod clock_tests {
        use super::*;

        #[test]
        fn test_mock_clock_advances() {
            let clock = MockClock::new();
            assert_eq!(clock.now_ms(), 0);
            clock.advance(Duration::from_millis(250));
            assert_eq!(clock.now_ms(), 250);
        }
    }
}
