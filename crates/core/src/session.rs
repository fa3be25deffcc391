//! Persisted authentication state
//!
//! [`SessionStore`] is the single owner of the client's session. Readers get
//! consistent snapshots without locking; the three mutations (`set_auth`,
//! `update_tokens`, `logout`) are serialized, written through the configured
//! [`SessionStorage`] and broadcast to subscribers.

use crate::storage::{MemorySessionStorage, SessionStorage};
use crate::types::{AuthTokens, User};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Current user identity and credentials.
///
/// A session either carries both a user and a token pair or neither of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SessionRecord", into = "SessionRecord")]
pub struct Session {
    user: Option<User>,
    tokens: Option<AuthTokens>,
}

impl Session {
    /// Session with no user signed in
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Session for a signed-in user
    pub fn authenticated(user: User, tokens: AuthTokens) -> Self {
        Self {
            user: Some(user),
            tokens: Some(tokens),
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn tokens(&self) -> Option<&AuthTokens> {
        self.tokens.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.tokens.is_some()
    }

    /// Same user with a replaced token pair, `None` for an anonymous session
    fn with_tokens(&self, tokens: AuthTokens) -> Option<Self> {
        self.user.as_ref().map(|user| Self {
            user: Some(user.clone()),
            tokens: Some(tokens),
        })
    }
}

/// Wire form of a session: `{user, tokens, isAuthenticated}`
#[derive(Serialize, Deserialize)]
struct SessionRecord {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    tokens: Option<AuthTokens>,
    #[serde(rename = "isAuthenticated", default)]
    is_authenticated: bool,
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        match (record.user, record.tokens, record.is_authenticated) {
            (Some(user), Some(tokens), true) => Self::authenticated(user, tokens),
            _ => Self::anonymous(),
        }
    }
}

impl From<Session> for SessionRecord {
    fn from(session: Session) -> Self {
        let is_authenticated = session.is_authenticated();
        Self {
            user: session.user,
            tokens: session.tokens,
            is_authenticated,
        }
    }
}

/// Single source of truth for session state, durable across restarts
pub struct SessionStore {
    current: ArcSwap<Session>,
    changes: watch::Sender<Arc<Session>>,
    write_lock: Mutex<()>,
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    /// Create a store backed by `storage`, hydrating from whatever it holds.
    ///
    /// Unreadable storage is logged and treated as an anonymous session.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let initial = match storage.load() {
            Ok(Some(session)) => {
                if session.is_authenticated() {
                    info!("Restored persisted session");
                }
                session
            }
            Ok(None) => Session::anonymous(),
            Err(e) => {
                warn!("Ignoring unreadable persisted session: {e}");
                Session::anonymous()
            }
        };

        let initial = Arc::new(initial);
        let (changes, _) = watch::channel(Arc::clone(&initial));

        Self {
            current: ArcSwap::new(initial),
            changes,
            write_lock: Mutex::new(()),
            storage,
        }
    }

    /// Create a store that only lives as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStorage::new()))
    }

    /// Consistent snapshot of the whole session
    pub fn snapshot(&self) -> Arc<Session> {
        self.current.load_full()
    }

    /// Current token pair, if signed in
    pub fn tokens(&self) -> Option<AuthTokens> {
        self.current.load().tokens().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.load().is_authenticated()
    }

    /// Observe every committed session
    pub fn subscribe(&self) -> watch::Receiver<Arc<Session>> {
        self.changes.subscribe()
    }

    /// Replace the session with a signed-in user
    pub fn set_auth(&self, user: User, tokens: AuthTokens) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(user_id = user.id, role = %user.role, "Setting session");
        self.commit(Session::authenticated(user, tokens));
    }

    /// Replace only the token pair, leaving the user untouched.
    ///
    /// Does nothing when no one is signed in.
    pub fn update_tokens(&self, tokens: AuthTokens) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(next) = self.current.load().with_tokens(tokens) else {
            warn!("Ignoring token update without an active session");
            return;
        };
        debug!("Updating session tokens");
        self.commit(next);
    }

    /// Clear the session. Safe to call when already signed out.
    pub fn logout(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("Clearing session");
        self.commit(Session::anonymous());
    }

    // Callers hold `write_lock`.
    fn commit(&self, session: Session) {
        if let Err(e) = self.storage.save(&session) {
            warn!("Failed to persist session: {e}");
        }
        let session = Arc::new(session);
        self.current.store(Arc::clone(&session));
        self.changes.send_replace(session);
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}
