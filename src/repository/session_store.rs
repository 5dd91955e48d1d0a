//! Client-side persistence of the librarian's bearer token

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use notify_debouncer_mini::{
    new_debouncer,
    notify::{RecursiveMode, Watcher},
    DebounceEventResult,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{
    error::{AppError, AppResult},
    models::Token,
};

const WATCH_DEBOUNCE: Duration = Duration::from_millis(100);

/// Called when persisted state may have been changed by someone else
pub type ChangeHook = Box<dyn Fn() + Send + Sync>;

/// Keeps a storage watch running. Dropping it stops the watch.
pub struct StorageWatch(#[allow(dead_code)] Box<dyn Send>);

impl StorageWatch {
    pub fn new(guard: impl Send + 'static) -> Self {
        Self(Box::new(guard))
    }
}

/// Where the token physically lives
pub trait TokenStorage: Send + Sync {
    /// Whether anything is persisted at all, readable or not
    fn has_state(&self) -> bool;
    fn load(&self) -> AppResult<Option<Token>>;
    fn save(&self, token: &Token) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;

    /// Report changes made from outside this store. Storage nobody else can
    /// write to has nothing to watch.
    fn watch(&self, _on_change: ChangeHook) -> AppResult<Option<StorageWatch>> {
        Ok(None)
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
    token: Token,
}

/// JSON file on disk, survives restarts and is shared by every process using it
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

impl TokenStorage for FileTokenStorage {
    fn has_state(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> AppResult<Option<Token>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<PersistedSession>(&raw) {
            Ok(session) => Ok(Some(session.token)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    /// Written to a sibling file and renamed, so watchers never read a half-written token
    fn save(&self, token: &Token) -> AppResult<()> {
        fs::create_dir_all(self.dir())?;
        let body = serde_json::to_string(&PersistedSession { token: token.clone() })?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, body)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Watch the containing directory; the file itself may not exist yet
    fn watch(&self, on_change: ChangeHook) -> AppResult<Option<StorageWatch>> {
        let Some(file_name) = self.path.file_name().map(|n| n.to_os_string()) else {
            return Ok(None);
        };
        let dir = self.dir().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut debouncer = new_debouncer(WATCH_DEBOUNCE, move |result: DebounceEventResult| match result {
            Ok(events) => {
                if events.iter().any(|e| e.path.file_name() == Some(file_name.as_os_str())) {
                    on_change();
                }
            }
            Err(e) => tracing::warn!("Session file watch failed: {:?}", e),
        })
        .map_err(|e| AppError::Internal(format!("Cannot watch session file: {}", e)))?;
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| AppError::Internal(format!("Cannot watch {}: {}", dir.display(), e)))?;

        tracing::debug!("Watching {} for session changes", self.path.display());
        Ok(Some(StorageWatch::new(debouncer)))
    }
}

/// Process-local storage, used by tests and one-shot tools
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<Token>>,
}

impl TokenStorage for MemoryTokenStorage {
    fn has_state(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn load(&self) -> AppResult<Option<Token>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, token: &Token) -> AppResult<()> {
        *self.slot.lock() = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// Published on every change so other open views can re-check validity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    Cleared,
}

struct Shared {
    storage: Box<dyn TokenStorage>,
    events: broadcast::Sender<SessionEvent>,
    /// Token as this store last saw it; tells outside changes from our own writes
    seen: Mutex<Option<Token>>,
}

impl Shared {
    fn load(&self) -> Option<Token> {
        match self.storage.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Failed to read session storage: {}", e);
                None
            }
        }
    }

    /// Re-read storage after an outside change and publish if the token moved
    fn reload(&self) {
        let mut seen = self.seen.lock();
        let current = self.load();
        if *seen == current {
            return;
        }
        let event = match current {
            Some(_) => SessionEvent::SignedIn,
            None => SessionEvent::Cleared,
        };
        tracing::info!("Session changed by another view: {:?}", event);
        *seen = current;
        let _ = self.events.send(event);
    }
}

/// The single owner of persisted session state
pub struct SessionStore {
    shared: Arc<Shared>,
    _watch: Mutex<Option<StorageWatch>>,
}

impl SessionStore {
    pub fn new(storage: impl TokenStorage + 'static) -> Self {
        let (events, _) = broadcast::channel(16);
        let shared = Arc::new(Shared {
            storage: Box::new(storage),
            events,
            seen: Mutex::new(None),
        });
        *shared.seen.lock() = shared.load();

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let hook: ChangeHook = Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.reload();
            }
        });
        let watch = shared.storage.watch(hook).unwrap_or_else(|e| {
            tracing::warn!("Session changes from other views will not be seen: {}", e);
            None
        });

        Self {
            shared,
            _watch: Mutex::new(watch),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryTokenStorage::default())
    }

    /// Persisted token, if any. Read from storage on every call; failures read as "no token".
    pub fn token(&self) -> Option<Token> {
        self.shared.load()
    }

    pub fn has_state(&self) -> bool {
        self.shared.storage.has_state()
    }

    pub fn set_token(&self, token: Token) -> AppResult<()> {
        let mut seen = self.shared.seen.lock();
        self.shared.storage.save(&token)?;
        *seen = Some(token);
        let _ = self.shared.events.send(SessionEvent::SignedIn);
        Ok(())
    }

    pub fn clear(&self) -> AppResult<()> {
        let mut seen = self.shared.seen.lock();
        self.shared.storage.clear()?;
        *seen = None;
        let _ = self.shared.events.send(SessionEvent::Cleared);
        Ok(())
    }

    /// Own changes and, for shared storage, changes made by other stores
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }
}
