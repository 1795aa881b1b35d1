//! LRU resource cache.
//!
//! Bounds memory usage by evicting the least-recently-used responses when
//! the total cached body size exceeds a configurable limit.

use std::collections::{HashMap, VecDeque};

use super::ResourceResponse;

/// LRU resource cache with bounded size (measured in body bytes).
pub struct ResourceCache {
    entries: HashMap<String, ResourceResponse>,
    /// Front = most recently used, back = least recently used.
    order: VecDeque<String>,
    current_size: usize,
    max_size: usize,
}

impl ResourceCache {
    /// Create a new cache with the given maximum size in bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            current_size: 0,
            max_size,
        }
    }

    /// Look up a cached response by URL, promoting it to the
    /// most-recently-used position.
    pub fn get(&mut self, url: &str) -> Option<&ResourceResponse> {
        if self.entries.contains_key(url) {
            self.order.retain(|u| u != url);
            self.order.push_front(url.to_string());
            self.entries.get(url)
        } else {
            None
        }
    }

    /// Insert a response, evicting least-recently-used entries as needed
    /// to stay within the size limit.
    ///
    /// Responses larger than `max_size` are never cached.
    pub fn insert(&mut self, url: String, response: ResourceResponse) {
        let entry_size = response.body.len();

        if entry_size > self.max_size {
            log::debug!("Not caching {url}: {entry_size} bytes exceeds the cache");
            return;
        }

        if let Some(old) = self.entries.remove(&url) {
            self.current_size -= old.body.len();
            self.order.retain(|u| u != &url);
        }

        while self.current_size + entry_size > self.max_size {
            let Some(evicted_url) = self.order.pop_back() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&evicted_url) {
                self.current_size -= evicted.body.len();
                log::debug!("Evicted {evicted_url} from cache");
            }
        }

        self.current_size += entry_size;
        self.order.push_front(url.clone());
        self.entries.insert(url, response);
    }

    /// Check whether `url` is cached (without promoting it).
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Drop all cached entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.current_size = 0;
    }

    /// Current total body size in bytes.
    pub fn size(&self) -> usize {
        self.current_size
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
