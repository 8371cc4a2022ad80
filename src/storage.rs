use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Collection
///
/// The named document collections the CMS persists. Each maps to one JSON array
/// file in the flat-file store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Users,
    PendingUsers,
    PendingDeletions,
    Posts,
    PostSubmissions,
    Ads,
    Comments,
    Logs,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Users,
        Collection::PendingUsers,
        Collection::PendingDeletions,
        Collection::Posts,
        Collection::PostSubmissions,
        Collection::Ads,
        Collection::Comments,
        Collection::Logs,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Collection::Users => "users.json",
            Collection::PendingUsers => "pendingUsers.json",
            Collection::PendingDeletions => "pendingDeletions.json",
            Collection::Posts => "posts.json",
            Collection::PostSubmissions => "postSubmissions.json",
            Collection::Ads => "ads.json",
            Collection::Comments => "comments.json",
            Collection::Logs => "logs.json",
        }
    }
}

/// StoreError
///
/// Failures of the persistence layer. These are never shown to clients verbatim;
/// `AppError` maps them to a generic 500.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed data in {collection:?}: {source}")]
    Malformed {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Full replacement contents for one collection, staged by a transaction.
pub type Change = (Collection, Vec<Value>);

// 1. DocumentStore Contract
/// DocumentStore
///
/// The abstract contract for the persistence adapter. Implementations store each
/// collection as an ordered array of JSON documents.
///
/// Writers must hold the guard returned by `write_lock` for the whole
/// read-modify-commit sequence. That single-writer rule is what keeps two
/// concurrent requests from overwriting each other's changes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads every document of a collection, in stored order. A collection that
    /// was never written reads as empty.
    async fn read(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;

    /// Acquires the store-wide write lock.
    async fn write_lock(&self) -> OwnedMutexGuard<()>;

    /// Replaces the listed collections as one unit. When more than one collection
    /// is touched, the implementation must make the write recoverable as a whole.
    async fn commit(&self, changes: Vec<Change>) -> Result<(), StoreError>;

    /// Finishes any multi-collection commit interrupted by a crash. Returns the
    /// number of collections that were rewritten.
    async fn recover(&self) -> Result<usize, StoreError>;
}

/// StoreState
///
/// The concrete type used to share the persistence adapter across the application state.
pub type StoreState = Arc<dyn DocumentStore>;

// 2. The Real Implementation (flat JSON files)
/// JournalEntry
///
/// One collection's new contents as recorded in the commit journal.
#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
    collection: Collection,
    documents: Vec<Value>,
}

const JOURNAL_FILE: &str = "journal.json";

/// JsonFileStore
///
/// One pretty-printed JSON array file per collection under a data directory.
///
/// Every file is replaced atomically (write a sibling temp file, fsync, rename),
/// so readers see either the old or the new array, never a torn one. Commits that
/// span several collections first write `journal.json` holding all new contents;
/// the journal is removed once every collection file is in place, and replayed
/// by `recover` if the process died in between.
///
/// A commit that fails halfway restores the collections it already replaced. If
/// that restore fails too, the store is marked degraded: reads and commits are
/// refused until the journal has been replayed, which the next writer to take
/// the lock attempts first.
pub struct JsonFileStore {
    root: PathBuf,
    lock: Arc<Mutex<()>>,
    degraded: AtomicBool,
}

impl JsonFileStore {
    /// open
    ///
    /// Creates the data directory if needed and replays a leftover journal.
    /// A failure here is fatal for the server: it cannot serve without its store.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;

        let store = Self {
            root,
            lock: Arc::new(Mutex::new(())),
            degraded: AtomicBool::new(false),
        };

        let replayed = store.recover().await?;
        if replayed > 0 {
            tracing::warn!(collections = replayed, "replayed interrupted commit from journal");
        }
        tracing::info!(root = %store.root.display(), "json file store opened");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_path(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.file_name())
    }

    pub fn journal_path(&self) -> PathBuf {
        self.root.join(JOURNAL_FILE)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn ensure_healthy(&self) -> Result<(), StoreError> {
        if self.is_degraded() {
            return Err(StoreError::Unavailable(
                "store is degraded after a failed commit; journal replay pending".to_string(),
            ));
        }
        Ok(())
    }

    async fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        let tmp = path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp).await.map_err(io_err)?;
        file.write_all(bytes).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        drop(file);

        fs::rename(&tmp, path).await.map_err(io_err)
    }

    async fn write_collection(&self, collection: Collection, documents: &[Value]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(documents)
            .map_err(|source| StoreError::Malformed { collection, source })?;
        Self::replace_file(&self.collection_path(collection), &bytes).await
    }

    async fn write_journal(&self, changes: &[Change]) -> Result<(), StoreError> {
        let entries: Vec<JournalEntry> = changes
            .iter()
            .map(|(collection, documents)| JournalEntry {
                collection: *collection,
                documents: documents.clone(),
            })
            .collect();
        let bytes = serde_json::to_vec(&entries).map_err(|e| StoreError::Journal(e.to_string()))?;
        Self::replace_file(&self.journal_path(), &bytes).await
    }

    async fn remove_journal(&self) -> Result<(), StoreError> {
        let journal = self.journal_path();
        fs::remove_file(&journal)
            .await
            .map_err(|source| StoreError::Io { path: journal, source })
    }

    /// Rewrites every collection held in the journal, then removes it. Caller
    /// must hold the write lock.
    async fn replay_journal(&self) -> Result<usize, StoreError> {
        // A temp journal means the crash happened before the commit point.
        let stray = self.journal_path().with_extension("json.tmp");
        if fs::try_exists(&stray).await.unwrap_or(false) {
            let _ = fs::remove_file(&stray).await;
        }

        let journal = self.journal_path();
        let raw = match fs::read(&journal).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.degraded.store(false, Ordering::SeqCst);
                return Ok(0);
            }
            Err(source) => return Err(StoreError::Io { path: journal, source }),
        };

        let entries: Vec<JournalEntry> =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Journal(e.to_string()))?;

        for entry in &entries {
            self.write_collection(entry.collection, &entry.documents).await?;
        }
        self.remove_journal().await?;

        self.degraded.store(false, Ordering::SeqCst);
        Ok(entries.len())
    }

    /// Puts back the pre-commit contents of the collections a failed commit had
    /// already replaced. Caller must hold the write lock.
    async fn roll_back(&self, replaced: &[Change]) {
        let mut restored = true;
        for (collection, documents) in replaced {
            if let Err(e) = self.write_collection(*collection, documents).await {
                tracing::error!(collection = ?collection, error = %e, "rollback of failed commit failed");
                restored = false;
            }
        }

        if restored {
            match self.remove_journal().await {
                Ok(()) => {
                    tracing::warn!(collections = replaced.len(), "failed commit rolled back");
                    return;
                }
                Err(e) => tracing::error!(error = %e, "could not remove journal after rollback"),
            }
        }

        // The journal still holds the full commit; replaying it rolls forward.
        self.degraded.store(true, Ordering::SeqCst);
        tracing::error!("store degraded: commits refused until the journal is replayed");
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn read(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        self.ensure_healthy()?;
        let path = self.collection_path(collection);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).map_err(|source| StoreError::Malformed { collection, source })
    }

    async fn write_lock(&self) -> OwnedMutexGuard<()> {
        let guard = self.lock.clone().lock_owned().await;
        if self.is_degraded() {
            match self.replay_journal().await {
                Ok(replayed) => tracing::warn!(collections = replayed, "store recovered from journal"),
                Err(e) => tracing::error!(error = %e, "journal replay failed; store stays degraded"),
            }
        }
        guard
    }

    async fn commit(&self, changes: Vec<Change>) -> Result<(), StoreError> {
        self.ensure_healthy()?;

        if changes.len() <= 1 {
            for (collection, documents) in &changes {
                self.write_collection(*collection, documents).await?;
            }
            tracing::debug!(collections = changes.len(), journaled = false, "commit applied");
            return Ok(());
        }

        let mut previous: Vec<Change> = Vec::with_capacity(changes.len());
        for (collection, _) in &changes {
            previous.push((*collection, self.read(*collection).await?));
        }

        self.write_journal(&changes).await?;

        for (written, (collection, documents)) in changes.iter().enumerate() {
            if let Err(e) = self.write_collection(*collection, documents).await {
                // The failing file was never renamed into place; only earlier ones need restoring.
                self.roll_back(&previous[..written]).await;
                return Err(e);
            }
        }

        if let Err(e) = self.remove_journal().await {
            // Every file is in place, but a stale journal must not outlive later commits.
            tracing::error!(error = %e, "could not remove journal after commit");
            self.degraded.store(true, Ordering::SeqCst);
        }

        tracing::debug!(collections = changes.len(), journaled = true, "commit applied");
        Ok(())
    }

    async fn recover(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.clone().lock_owned().await;
        self.replay_journal().await
    }
}

// 3. The In-Memory Implementation (for tests)
/// MemoryStore
///
/// A `DocumentStore` held entirely in memory, used by handler and workflow tests
/// so they run without touching the filesystem. `new_failing` builds a store whose
/// every operation errors, for exercising the internal-error paths.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Value>>>,
    lock: Arc<Mutex<()>>,
    /// When true, all reads and commits return a simulated failure.
    pub should_fail: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.should_fail {
            return Err(StoreError::Unavailable(
                "Mock store error: simulation requested".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        self.check()?;
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn write_lock(&self) -> OwnedMutexGuard<()> {
        self.lock.clone().lock_owned().await
    }

    async fn commit(&self, changes: Vec<Change>) -> Result<(), StoreError> {
        self.check()?;
        let mut collections = self.collections.write().await;
        for (collection, documents) in changes {
            collections.insert(collection, documents);
        }
        Ok(())
    }

    async fn recover(&self) -> Result<usize, StoreError> {
        self.check()?;
        Ok(0)
    }
}
