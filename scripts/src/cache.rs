//! The durable key-value cache holding a release's in-progress state
//!
//! A cache is scoped to one network and one release. Every operation on a
//! cache instance funnels through a single fair lock, so operations complete in
//! the order they were issued and a newer write is never overwritten by an
//! older one. The backing store has no concurrency control of its own; sharing
//! one backing file between processes is unsupported.

use std::{
    collections::HashMap,
    future::Future,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::{
    errors::ReleaseError,
    utils::{read_json_file, write_json_file},
};

/// The entries of one cache namespace
pub type Entries = Map<String, Value>;

/// A durable backing engine for a cache namespace
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Load all entries of the namespace
    async fn load(&self) -> Result<Entries, ReleaseError>;

    /// Durably replace all entries of the namespace
    async fn persist(&self, entries: &Entries) -> Result<(), ReleaseError>;
}

/// A store keeping one JSON document per network, with one object per release
///
/// ```json
/// { "<release>": { "<key>": <value>, ... }, ... }
/// ```
pub struct FileStore {
    /// The network's cache document
    path: PathBuf,
    /// The release namespace within the document
    namespace: String,
}

impl FileStore {
    /// A store for the given namespace of the document at `path`
    pub fn new(path: PathBuf, namespace: &str) -> Self {
        Self {
            path,
            namespace: namespace.to_string(),
        }
    }

    /// Read the whole document, across namespaces
    async fn read_document(&self) -> Result<Entries, ReleaseError> {
        Ok(read_json_file::<Entries>(&self.path).await?.unwrap_or_default())
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn load(&self) -> Result<Entries, ReleaseError> {
        let mut document = self.read_document().await?;
        match document.remove(&self.namespace) {
            None => Ok(Entries::new()),
            Some(Value::Object(entries)) => Ok(entries),
            Some(other) => Err(ReleaseError::Store(format!(
                "namespace {} in {} is not an object: {other}",
                self.namespace,
                self.path.display()
            ))),
        }
    }

    async fn persist(&self, entries: &Entries) -> Result<(), ReleaseError> {
        let mut document = self.read_document().await?;
        document.insert(self.namespace.clone(), Value::Object(entries.clone()));
        write_json_file(&self.path, &document).await
    }
}

/// An in-memory store, counting how many times it was persisted to
#[derive(Default)]
pub struct MemoryStore {
    /// The persisted entries
    entries: Mutex<Entries>,
    /// The number of persists performed
    persists: AtomicUsize,
}

impl MemoryStore {
    /// A store pre-populated with the given entries
    pub fn with_entries(entries: Entries) -> Self {
        Self {
            entries: Mutex::new(entries),
            persists: AtomicUsize::new(0),
        }
    }

    /// The number of persists performed so far
    pub fn persist_count(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self) -> Result<Entries, ReleaseError> {
        Ok(self.entries.lock().await.clone())
    }

    async fn persist(&self, entries: &Entries) -> Result<(), ReleaseError> {
        *self.entries.lock().await = entries.clone();
        self.persists.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    async fn load(&self) -> Result<Entries, ReleaseError> {
        (**self).load().await
    }

    async fn persist(&self, entries: &Entries) -> Result<(), ReleaseError> {
        (**self).persist(entries).await
    }
}

/// A handle to a release cache, cheap to clone and passed explicitly to every
/// component that reads or records release state
#[derive(Clone)]
pub struct Cache {
    /// The shared cache state
    inner: Arc<CacheInner>,
}

/// The state shared by all handles to one cache
struct CacheInner {
    /// The backing store
    store: Box<dyn CacheStore>,
    /// The in-memory mirror of the store; its lock is the cache's ordering lock
    entries: Mutex<Entries>,
    /// Per-key guards ensuring at most one computation per key
    compute_guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Cache {
    /// Open a cache over the given store, loading its current entries
    pub async fn open(store: impl CacheStore + 'static) -> Result<Self, ReleaseError> {
        let entries = store.load().await?;
        Ok(Self {
            inner: Arc::new(CacheInner {
                store: Box::new(store),
                entries: Mutex::new(entries),
                compute_guards: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Get the value stored under `key`
    pub async fn get(&self, key: &str) -> Result<Option<Value>, ReleaseError> {
        Ok(self.inner.entries.lock().await.get(key).cloned())
    }

    /// Store `value` under `key`, durably
    pub async fn set(&self, key: &str, value: Value) -> Result<(), ReleaseError> {
        let mut entries = self.inner.entries.lock().await;
        let previous = entries.insert(key.to_string(), value);

        if let Err(e) = self.inner.store.persist(&entries).await {
            // Keep the mirror in step with what is actually durable
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(e);
        }

        Ok(())
    }

    /// Remove the value stored under `key`, returning it
    pub async fn remove(&self, key: &str) -> Result<Option<Value>, ReleaseError> {
        let mut entries = self.inner.entries.lock().await;
        let Some(previous) = entries.remove(key) else {
            return Ok(None);
        };

        if let Err(e) = self.inner.store.persist(&entries).await {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }

        Ok(Some(previous))
    }

    /// Get the value stored under `key`, deserialized
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ReleaseError> {
        self.get(key)
            .await?
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| ReleaseError::Store(format!("malformed value under {key}: {e}")))
            })
            .transpose()
    }

    /// Serialize `value` and store it under `key`
    pub async fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ReleaseError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ReleaseError::Store(format!("unserializable value for {key}: {e}")))?;
        self.set(key, value).await
    }

    /// Return the value stored under `key`, or compute, store, and return it
    ///
    /// Within one process the factory runs at most once per key: concurrent
    /// callers for the same key wait for the first computation. The ordering
    /// lock is not held while the factory runs, so other keys make progress.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, factory: F) -> Result<Value, ReleaseError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ReleaseError>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let guard = self.compute_guard(key).await;
        let _computing = guard.lock().await;

        // Another caller may have finished computing while we waited
        let res = match self.get(key).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => match factory().await {
                Ok(value) => self.set(key, value.clone()).await.map(|_| value),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        self.release_compute_guard(key, &guard).await;
        res
    }

    /// Record `value` under `key`, or check it against the recorded value
    ///
    /// This is the sanity check used wherever a recomputed value must match a
    /// previously recorded one; a mismatch is fatal.
    pub async fn expect_equals(&self, key: &str, value: Value) -> Result<(), ReleaseError> {
        let mut entries = self.inner.entries.lock().await;
        match entries.get(key) {
            Some(recorded) if *recorded == value => Ok(()),
            Some(recorded) => Err(ReleaseError::Consistency(format!(
                "{key}: recorded {recorded}, computed {value}"
            ))),
            None => {
                entries.insert(key.to_string(), value);
                if let Err(e) = self.inner.store.persist(&entries).await {
                    entries.remove(key);
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    /// A copy of all entries, for inspection
    pub async fn entries(&self) -> Entries {
        self.inner.entries.lock().await.clone()
    }

    /// Drop the guard of `key` once its computation has settled, unless a newer
    /// guard has replaced it
    async fn release_compute_guard(&self, key: &str, guard: &Arc<Mutex<()>>) {
        let mut guards = self.inner.compute_guards.lock().await;
        if guards.get(key).is_some_and(|current| Arc::ptr_eq(current, guard)) {
            guards.remove(key);
        }
    }

    /// The number of computations in progress or awaited
    pub async fn pending_computations(&self) -> usize {
        self.inner.compute_guards.lock().await.len()
    }

    /// The guard serializing computations of `key`
    async fn compute_guard(&self, key: &str) -> Arc<Mutex<()>> {
        self.inner
            .compute_guards
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }
}
