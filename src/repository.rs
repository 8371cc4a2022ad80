use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    models::{Ad, CommentThread, LogEntry, PendingDeletion, PendingUser, Post, PostSubmission, User},
    storage::{Change, Collection, StoreError, StoreState},
};

/// Document Trait
///
/// Binds a model type to the collection it lives in and the field that identifies
/// it there. Most documents are keyed by `id`; posts and comment threads by `slug`.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
    const KEY_FIELD: &'static str = "id";

    fn key(&self) -> String;
}

impl Document for User {
    const COLLECTION: Collection = Collection::Users;
    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Document for PendingUser {
    const COLLECTION: Collection = Collection::PendingUsers;
    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Document for PendingDeletion {
    const COLLECTION: Collection = Collection::PendingDeletions;
    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Document for Post {
    const COLLECTION: Collection = Collection::Posts;
    const KEY_FIELD: &'static str = "slug";
    fn key(&self) -> String {
        self.slug.clone()
    }
}

impl Document for PostSubmission {
    const COLLECTION: Collection = Collection::PostSubmissions;
    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Document for Ad {
    const COLLECTION: Collection = Collection::Ads;
    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Document for CommentThread {
    const COLLECTION: Collection = Collection::Comments;
    const KEY_FIELD: &'static str = "slug";
    fn key(&self) -> String {
        self.slug.clone()
    }
}

impl Document for LogEntry {
    const COLLECTION: Collection = Collection::Logs;
    fn key(&self) -> String {
        self.id.to_string()
    }
}

fn decode<T: Document>(value: Value) -> AppResult<T> {
    serde_json::from_value(value).map_err(|source| {
        AppError::Store(StoreError::Malformed {
            collection: T::COLLECTION,
            source,
        })
    })
}

fn encode<T: Document>(doc: &T) -> AppResult<Value> {
    serde_json::to_value(doc).map_err(|source| {
        AppError::Store(StoreError::Malformed {
            collection: T::COLLECTION,
            source,
        })
    })
}

fn key_of<T: Document>(value: &Value) -> Option<&str> {
    value.get(T::KEY_FIELD).and_then(Value::as_str)
}

/// Repository
///
/// Typed access to the document store. Reads go straight to the store; every
/// mutation goes through `transaction`, which holds the store-wide write lock for
/// the whole read-modify-commit sequence.
#[derive(Clone)]
pub struct Repository {
    store: StoreState,
}

impl Repository {
    pub fn new(store: StoreState) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StoreState {
        &self.store
    }

    /// All documents of a collection, in stored order.
    pub async fn all<T: Document>(&self) -> AppResult<Vec<T>> {
        let values = self.store.read(T::COLLECTION).await?;
        values.into_iter().map(decode::<T>).collect()
    }

    pub async fn find<T: Document>(&self, key: &str) -> AppResult<Option<T>> {
        let values = self.store.read(T::COLLECTION).await?;
        values
            .into_iter()
            .find(|value| key_of::<T>(value) == Some(key))
            .map(decode::<T>)
            .transpose()
    }

    /// transaction
    ///
    /// Stages the listed collections, runs `f` against them and commits every
    /// collection `f` modified as a single store commit. If `f` fails nothing is
    /// written. Touching a collection that was not listed is an internal error.
    pub async fn transaction<R, F>(&self, collections: &[Collection], f: F) -> AppResult<R>
    where
        F: FnOnce(&mut Transaction) -> AppResult<R> + Send,
        R: Send,
    {
        let _guard = self.store.write_lock().await;

        let mut tx = Transaction { staged: Vec::with_capacity(collections.len()) };
        for &collection in collections {
            let documents = self.store.read(collection).await?;
            tx.staged.push(Staged { collection, documents, dirty: false });
        }

        let result = f(&mut tx)?;

        let changes = tx.into_changes();
        if !changes.is_empty() {
            self.store.commit(changes).await?;
        }
        Ok(result)
    }
}

struct Staged {
    collection: Collection,
    documents: Vec<Value>,
    dirty: bool,
}

/// Transaction
///
/// In-memory working copy of the staged collections. Mutations mark their
/// collection dirty; only dirty collections are committed.
pub struct Transaction {
    staged: Vec<Staged>,
}

impl Transaction {
    fn slot(&self, collection: Collection) -> AppResult<&Staged> {
        self.staged
            .iter()
            .find(|s| s.collection == collection)
            .ok_or_else(|| AppError::Internal(format!("{collection:?} not staged in transaction")))
    }

    fn slot_mut(&mut self, collection: Collection) -> AppResult<&mut Staged> {
        let slot = self
            .staged
            .iter_mut()
            .find(|s| s.collection == collection)
            .ok_or_else(|| AppError::Internal(format!("{collection:?} not staged in transaction")))?;
        slot.dirty = true;
        Ok(slot)
    }

    fn into_changes(self) -> Vec<Change> {
        self.staged
            .into_iter()
            .filter(|s| s.dirty)
            .map(|s| (s.collection, s.documents))
            .collect()
    }

    pub fn list<T: Document>(&self) -> AppResult<Vec<T>> {
        self.slot(T::COLLECTION)?
            .documents
            .iter()
            .cloned()
            .map(decode::<T>)
            .collect()
    }

    pub fn get<T: Document>(&self, key: &str) -> AppResult<Option<T>> {
        self.slot(T::COLLECTION)?
            .documents
            .iter()
            .find(|value| key_of::<T>(value) == Some(key))
            .cloned()
            .map(decode::<T>)
            .transpose()
    }

    pub fn contains<T: Document>(&self, key: &str) -> AppResult<bool> {
        Ok(self
            .slot(T::COLLECTION)?
            .documents
            .iter()
            .any(|value| key_of::<T>(value) == Some(key)))
    }

    /// Appends `doc`. Fails with `Conflict` if its key is already taken.
    pub fn insert<T: Document>(&mut self, doc: &T) -> AppResult<()> {
        let key = doc.key();
        if self.contains::<T>(&key)? {
            return Err(AppError::Conflict(format!("{} already exists", T::KEY_FIELD)));
        }
        let value = encode(doc)?;
        self.slot_mut(T::COLLECTION)?.documents.push(value);
        Ok(())
    }

    /// Inserts `doc` at the front of the collection.
    pub fn prepend<T: Document>(&mut self, doc: &T) -> AppResult<()> {
        let value = encode(doc)?;
        self.slot_mut(T::COLLECTION)?.documents.insert(0, value);
        Ok(())
    }

    /// Replaces the document stored under `key` in place. `doc` may carry a new key
    /// (a renamed slug); the caller checks that the new key is free. Returns
    /// `false` if nothing was stored under `key`.
    pub fn replace<T: Document>(&mut self, key: &str, doc: &T) -> AppResult<bool> {
        let value = encode(doc)?;
        let slot = self.slot_mut(T::COLLECTION)?;
        match slot.documents.iter_mut().find(|v| key_of::<T>(v) == Some(key)) {
            Some(existing) => {
                *existing = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn replace_all<T: Document>(&mut self, docs: &[T]) -> AppResult<()> {
        let values = docs.iter().map(encode).collect::<AppResult<Vec<_>>>()?;
        self.slot_mut(T::COLLECTION)?.documents = values;
        Ok(())
    }

    /// Removes and returns the document stored under `key`, if any.
    pub fn remove<T: Document>(&mut self, key: &str) -> AppResult<Option<T>> {
        let position = self
            .slot(T::COLLECTION)?
            .documents
            .iter()
            .position(|value| key_of::<T>(value) == Some(key));

        match position {
            Some(index) => {
                let value = self.slot_mut(T::COLLECTION)?.documents.remove(index);
                decode::<T>(value).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Keeps the first `len` documents and drops the rest. Returns how many went.
    pub fn truncate<T: Document>(&mut self, len: usize) -> AppResult<usize> {
        let slot = self.slot(T::COLLECTION)?;
        if slot.documents.len() <= len {
            return Ok(0);
        }
        let slot = self.slot_mut(T::COLLECTION)?;
        let dropped = slot.documents.len() - len;
        slot.documents.truncate(len);
        Ok(dropped)
    }

    pub fn clear<T: Document>(&mut self) -> AppResult<usize> {
        let slot = self.slot_mut(T::COLLECTION)?;
        let removed = slot.documents.len();
        slot.documents.clear();
        Ok(removed)
    }
}
