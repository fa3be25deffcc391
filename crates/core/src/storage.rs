//! Durable storage backends for the session store

use crate::error::CoreResult;
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Namespace key the session is persisted under
pub const STORAGE_KEY: &str = "auth-storage";

/// Current layout version of the persisted envelope
const STORAGE_VERSION: u32 = 0;

/// Pluggable persistence hook invoked by [`crate::SessionStore`] on every mutation
#[cfg_attr(test, mockall::automock)]
pub trait SessionStorage: Send + Sync {
    /// Load the last persisted session, `None` when nothing was stored yet
    fn load(&self) -> CoreResult<Option<Session>>;

    /// Persist the given session, replacing whatever was stored before
    fn save(&self, session: &Session) -> CoreResult<()>;
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    state: Session,
    version: u32,
}

/// Stores the session as a JSON file named after [`STORAGE_KEY`]
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    /// Create a storage backend writing into `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    /// Location of the persisted file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> CoreResult<Option<Session>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = serde_json::from_str(&content)?;
        debug!(
            "Loaded session from {} (version {})",
            self.path.display(),
            envelope.version
        );
        Ok(Some(envelope.state))
    }

    fn save(&self, session: &Session) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let envelope = Envelope {
            state: session.clone(),
            version: STORAGE_VERSION,
        };
        let content = serde_json::to_string_pretty(&envelope)?;

        // Write then rename so a crash never leaves a truncated file behind
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Process-local storage, forgotten on exit
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    stored: Mutex<Option<Session>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> CoreResult<Option<Session>> {
        Ok(self
            .stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &Session) -> CoreResult<()> {
        *self.stored.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }
}
