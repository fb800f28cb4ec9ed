use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use tracing::debug;

/// How the exact tier bounds its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Grow without limit.
    #[default]
    Unbounded,
    /// Keep at most N entries; the oldest insertion goes first.
    MaxEntries(NonZeroUsize),
}

impl EvictionPolicy {
    pub fn from_limit(limit: Option<usize>) -> Self {
        limit
            .and_then(NonZeroUsize::new)
            .map(EvictionPolicy::MaxEntries)
            .unwrap_or_default()
    }
}

/// Canonical key form: trimmed, with runs of whitespace collapsed.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Default)]
struct Inner {
    map: HashMap<String, String>,
    /// Insertion order, used only by `MaxEntries`.
    order: VecDeque<String>,
}

/// Process-scoped query -> response map checked before the semantic tier.
#[derive(Default)]
pub struct ExactCache {
    inner: Mutex<Inner>,
    policy: EvictionPolicy,
}

impl ExactCache {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            policy,
        }
    }

    pub fn get(&self, query: &str) -> Option<String> {
        self.inner.lock().map.get(&normalize_query(query)).cloned()
    }

    /// Insert or overwrite. Overwriting does not refresh the insertion age.
    pub fn insert(&self, query: &str, response: &str) {
        let key = normalize_query(query);
        let mut inner = self.inner.lock();

        let is_new = inner.map.insert(key.clone(), response.to_string()).is_none();
        if !is_new {
            return;
        }

        if let EvictionPolicy::MaxEntries(limit) = self.policy {
            inner.order.push_back(key);
            while inner.map.len() > limit.get() {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.map.remove(&oldest);
                        debug!("Evicted exact-cache entry {:?}", oldest);
                    }
                    None => break,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }
}
