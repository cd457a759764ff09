//! Cross-protocol message identity.
//!
//! Every successful relay records an (IRC message id, Discord message id)
//! pair. One IRC message may fan out into several Discord messages and a
//! Discord message with attachments becomes several IRC lines, so both
//! directions are multimaps. Lookups return ids in the order they were
//! recorded.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

/// Default number of pairs kept before the oldest are evicted.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct Inner {
    by_source: HashMap<String, Vec<String>>,
    by_target: HashMap<String, Vec<String>>,
    order: VecDeque<(String, String)>,
}

/// Bidirectional IRC id ⇄ Discord id multimap.
#[derive(Debug)]
pub struct CorrelationStore {
    inner: Mutex<Inner>,
    /// Maximum number of pairs; `0` keeps everything.
    capacity: usize,
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CorrelationStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
        }
    }

    /// Record that IRC message `source` corresponds to Discord message
    /// `target`. Recording the same pair twice stores it twice.
    pub fn record_pair(&self, source: &str, target: &str) {
        let mut inner = self.inner.lock();
        inner
            .by_source
            .entry(source.to_owned())
            .or_default()
            .push(target.to_owned());
        inner
            .by_target
            .entry(target.to_owned())
            .or_default()
            .push(source.to_owned());
        inner.order.push_back((source.to_owned(), target.to_owned()));

        if self.capacity > 0 {
            while inner.order.len() > self.capacity {
                let Some((old_source, old_target)) = inner.order.pop_front() else {
                    break;
                };
                remove_first(&mut inner.by_source, &old_source, &old_target);
                remove_first(&mut inner.by_target, &old_target, &old_source);
            }
        }
    }

    /// Discord ids recorded for an IRC id, oldest first.
    pub fn lookup_by_source(&self, source: &str) -> Vec<String> {
        self.inner
            .lock()
            .by_source
            .get(source)
            .cloned()
            .unwrap_or_default()
    }

    /// IRC ids recorded for a Discord id, oldest first.
    pub fn lookup_by_target(&self, target: &str) -> Vec<String> {
        self.inner
            .lock()
            .by_target
            .get(target)
            .cloned()
            .unwrap_or_default()
    }

    /// Most recent Discord id for an IRC id; replies toward Discord
    /// thread onto this one.
    pub fn latest_target(&self, source: &str) -> Option<String> {
        self.inner
            .lock()
            .by_source
            .get(source)
            .and_then(|ids| ids.last().cloned())
    }

    /// Earliest IRC id for a Discord id; replies and reactions toward
    /// IRC reference this one.
    pub fn first_source(&self, target: &str) -> Option<String> {
        self.inner
            .lock()
            .by_target
            .get(target)
            .and_then(|ids| ids.first().cloned())
    }

    /// Number of recorded pairs.
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn remove_first(map: &mut HashMap<String, Vec<String>>, key: &str, value: &str) {
    if let Some(values) = map.get_mut(key) {
        if let Some(pos) = values.iter().position(|v| v == value) {
            values.remove(pos);
        }
        if values.is_empty() {
            map.remove(key);
        }
    }
}
