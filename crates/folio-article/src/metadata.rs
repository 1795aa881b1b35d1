//! Per-article metadata records.
//!
//! A record carries the saved-for-later flag and the lead image source
//! known for the article. Records are shared: the orchestrator and the
//! rest of the host hold the same [`SharedMetadata`] handle, and changes
//! made elsewhere are announced through subscriptions keyed by
//! [`ArticleKey`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};

use folio_types::error::{FolioError, Result};

use crate::address::ArticleKey;

/// Metadata the orchestrator reads and writes for one article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleMetadata {
    pub is_saved: bool,
    /// Lead image source as the article reported it, if known.
    pub lead_image_source: Option<String>,
    /// Original pixel width of the lead image, if known.
    pub lead_image_original_width: Option<u32>,
}

pub type SharedMetadata = Rc<RefCell<ArticleMetadata>>;

/// A live registration for "metadata updated" notifications on one key.
#[derive(Debug)]
pub struct MetadataSubscription {
    id: u64,
    key: ArticleKey,
    receiver: Receiver<ArticleKey>,
}

impl MetadataSubscription {
    pub fn key(&self) -> &ArticleKey {
        &self.key
    }

    /// Consume pending notifications, returning how many there were.
    pub fn drain(&self) -> usize {
        self.receiver.try_iter().count()
    }
}

/// Source of metadata records.
pub trait MetadataStore {
    /// The record for `key`, created empty if needed. `None` when no
    /// record can be obtained.
    fn fetch_or_create(&self, key: &ArticleKey) -> Option<SharedMetadata>;

    /// Persist the record for `key` and notify its subscribers.
    fn persist(&self, key: &ArticleKey) -> Result<()>;

    fn subscribe(&self, key: &ArticleKey) -> MetadataSubscription;
    fn unsubscribe(&self, subscription: MetadataSubscription);
}

/// The save-for-later toggle shown with the article.
pub trait SaveAffordance {
    fn set_saved(&mut self, is_saved: bool);
}

// -----------------------------------------------------------------------
// MemoryMetadataStore
// -----------------------------------------------------------------------

/// In-memory [`MetadataStore`].
///
/// `persist` snapshots the live record; [`MemoryMetadataStore::persisted`]
/// returns that snapshot.
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: RefCell<HashMap<ArticleKey, SharedMetadata>>,
    persisted: RefCell<HashMap<ArticleKey, ArticleMetadata>>,
    subscribers: RefCell<Vec<(u64, ArticleKey, Sender<ArticleKey>)>>,
    next_subscription: Cell<u64>,
    capacity: Option<usize>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses to create records beyond `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Change a record from outside an article view and announce it.
    pub fn update(&self, key: &ArticleKey, change: impl FnOnce(&mut ArticleMetadata)) {
        let Some(record) = self.fetch_or_create(key) else {
            log::warn!("No metadata record for {key}; update dropped");
            return;
        };
        change(&mut *record.borrow_mut());
        self.notify(key);
    }

    /// Last persisted snapshot for `key`.
    pub fn persisted(&self, key: &ArticleKey) -> Option<ArticleMetadata> {
        self.persisted.borrow().get(key).cloned()
    }

    pub fn subscriber_count(&self, key: &ArticleKey) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|(_, k, _)| k == key)
            .count()
    }

    fn notify(&self, key: &ArticleKey) {
        // Subscribers whose receiver is gone are pruned.
        self.subscribers
            .borrow_mut()
            .retain(|(_, k, tx)| k != key || tx.send(key.clone()).is_ok());
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn fetch_or_create(&self, key: &ArticleKey) -> Option<SharedMetadata> {
        let mut records = self.records.borrow_mut();
        if let Some(record) = records.get(key) {
            return Some(Rc::clone(record));
        }
        if self.capacity.is_some_and(|cap| records.len() >= cap) {
            log::warn!("Metadata store full; cannot create record for {key}");
            return None;
        }
        let record = SharedMetadata::default();
        records.insert(key.clone(), Rc::clone(&record));
        Some(record)
    }

    fn persist(&self, key: &ArticleKey) -> Result<()> {
        let snapshot = self
            .records
            .borrow()
            .get(key)
            .map(|r| r.borrow().clone())
            .ok_or_else(|| FolioError::Persistence(format!("no record for {key}")))?;
        self.persisted.borrow_mut().insert(key.clone(), snapshot);
        self.notify(key);
        Ok(())
    }

    fn subscribe(&self, key: &ArticleKey) -> MetadataSubscription {
        let id = self.next_subscription.get() + 1;
        self.next_subscription.set(id);
        let (tx, rx) = mpsc::channel();
        self.subscribers.borrow_mut().push((id, key.clone(), tx));
        MetadataSubscription {
            id,
            key: key.clone(),
            receiver: rx,
        }
    }

    fn unsubscribe(&self, subscription: MetadataSubscription) {
        self.subscribers
            .borrow_mut()
            .retain(|(id, _, _)| *id != subscription.id);
    }
}
