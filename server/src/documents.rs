//! Realtime document feeds.
//!
//! A [`DocumentFeed`] pushes snapshots of a single document to a callback until the
//! returned [`Subscription`] is dropped. `None` means the document does not exist
//! (never created, or deleted).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::store::{Readable, Setter};
use crate::subscription::Subscription;

pub type Snapshot = Option<serde_json::Value>;
pub type SnapshotCallback = Box<dyn Fn(Snapshot) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentPathError {
    #[error("Document path is empty")]
    Empty,
    #[error("Document path {0:?} contains an empty segment")]
    EmptySegment(String),
    #[error("Document path {0:?} does not point at a document")]
    NotADocument(String),
}

/// Slash separated path of a document, made of collection/document pairs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    pub fn parse(path: &str) -> Result<Self, DocumentPathError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(DocumentPathError::Empty);
        }

        let segments: Vec<String> = trimmed.split('/').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(DocumentPathError::EmptySegment(path.to_owned()));
        }
        if segments.len() % 2 != 0 {
            return Err(DocumentPathError::NotADocument(path.to_owned()));
        }

        Ok(Self { segments })
    }

    /// Path of the profile document belonging to `uid`
    pub fn for_user(uid: &str) -> Self {
        Self {
            segments: vec!["users".to_owned(), uid.to_owned()],
        }
    }

    /// The document's own id, the last path segment
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for DocumentPath {
    type Err = DocumentPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

pub trait DocumentFeed: Send + Sync {
    /// Watch `path`. Snapshots for one subscription arrive in the order they were
    /// produced, starting with the current state of the document.
    fn subscribe(&self, path: &DocumentPath, on_snapshot: SnapshotCallback) -> Subscription;
}

type Watcher = Arc<dyn Fn(Snapshot) + Send + Sync>;

#[derive(Default)]
struct Documents {
    documents: HashMap<DocumentPath, serde_json::Value>,
    watchers: HashMap<DocumentPath, Vec<(u64, Watcher)>>,
    next_id: u64,
}

impl Documents {
    fn watchers_of(&self, path: &DocumentPath) -> Vec<Watcher> {
        self.watchers
            .get(path)
            .map(|list| list.iter().map(|(_, w)| w.clone()).collect())
            .unwrap_or_default()
    }
}

/// In-process realtime document store
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Documents>>,
    /// Serializes deliveries so every watcher sees changes in write order. Reentrant
    /// so a watcher may write from inside its callback.
    delivery: Arc<ReentrantMutex<()>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_document<T: Serialize>(
        &self,
        path: &DocumentPath,
        document: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(document)?;

        let _delivery = self.delivery.lock();
        let watchers = {
            let mut docs = self.inner.lock();
            docs.documents.insert(path.clone(), value.clone());
            docs.watchers_of(path)
        };

        debug!(%path, watchers = watchers.len(), "Document written");
        for watcher in watchers {
            watcher(Some(value.clone()));
        }

        Ok(())
    }

    /// Remove a document. Returns whether it existed.
    pub fn delete_document(&self, path: &DocumentPath) -> bool {
        let _delivery = self.delivery.lock();
        let (existed, watchers) = {
            let mut docs = self.inner.lock();
            let existed = docs.documents.remove(path).is_some();
            (existed, docs.watchers_of(path))
        };

        if existed {
            debug!(%path, watchers = watchers.len(), "Document deleted");
            for watcher in watchers {
                watcher(None);
            }
        }

        existed
    }

    pub fn document(&self, path: &DocumentPath) -> Option<serde_json::Value> {
        self.inner.lock().documents.get(path).cloned()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner.lock().watchers.values().map(Vec::len).sum()
    }

    pub fn subscriptions_for(&self, path: &DocumentPath) -> usize {
        self.inner.lock().watchers.get(path).map_or(0, Vec::len)
    }
}

impl DocumentFeed for MemoryDocumentStore {
    fn subscribe(&self, path: &DocumentPath, on_snapshot: SnapshotCallback) -> Subscription {
        let watcher: Watcher = Arc::from(on_snapshot);

        let _delivery = self.delivery.lock();
        let (id, current) = {
            let mut docs = self.inner.lock();
            let id = docs.next_id;
            docs.next_id += 1;
            docs.watchers
                .entry(path.clone())
                .or_default()
                .push((id, watcher.clone()));
            (id, docs.documents.get(path).cloned())
        };

        watcher(current);

        let inner = self.inner.clone();
        let path = path.clone();
        Subscription::new(move || {
            let mut docs = inner.lock();
            if let Some(list) = docs.watchers.get_mut(&path) {
                list.retain(|(watcher_id, _)| *watcher_id != id);
                if list.is_empty() {
                    docs.watchers.remove(&path);
                }
            }
        })
    }
}

/// Turn a raw snapshot into a typed document.
///
/// A document that exists but cannot be decoded is reported and treated as missing.
pub fn decode_snapshot<T: DeserializeOwned>(path: &DocumentPath, snapshot: Snapshot) -> Option<T> {
    let value = snapshot.filter(|value| !value.is_null())?;

    match serde_json::from_value(value) {
        Ok(document) => Some(document),
        Err(err) => {
            warn!(%path, error = %err, "Document does not have the expected shape");
            None
        }
    }
}

/// A store holding the latest contents of one document
pub struct DocStore<T> {
    path: DocumentPath,
    store: Readable<Option<T>>,
}

impl<T: Clone + Send + Sync + 'static> DocStore<T> {
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn get(&self) -> Option<T> {
        self.store.get()
    }

    pub fn subscribe(&self, listener: impl Fn(&Option<T>) + Send + Sync + 'static) -> Subscription {
        self.store.subscribe(listener)
    }
}

/// Build a store that follows the document at `path` while it has listeners
pub fn doc_store<T>(feed: Arc<dyn DocumentFeed>, path: DocumentPath) -> DocStore<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let watched = path.clone();
    let store = Readable::new(None, move |set: Setter<Option<T>>| {
        let snapshot_path = watched.clone();
        feed.subscribe(
            &watched,
            Box::new(move |snapshot| set.set(decode_snapshot(&snapshot_path, snapshot))),
        )
    });

    DocStore { path, store }
}
