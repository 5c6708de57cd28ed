use std::sync::Mutex;

use crate::common::UserId;
use crate::error::{ClientError, Result};
use crate::storage::{SessionDatabase, StoredSession};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveSession {
    token: String,
    user: UserId,
}

/// Explicit login state owned by the network worker.
///
/// `init` and `teardown` are the only ways in and out of an authenticated
/// session; both keep the persisted token in step.
pub struct SessionContext {
    active: Option<ActiveSession>,
    // Mutex keeps the context `Sync` so worker futures stay `Send`.
    storage: Option<Mutex<SessionDatabase>>,
}

impl SessionContext {
    pub fn new(storage: Option<SessionDatabase>) -> Self {
        Self {
            active: None,
            storage: storage.map(Mutex::new),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn init(&mut self, token: String, user: UserId) -> Result<()> {
        if let Some(storage) = &self.storage {
            let db = storage
                .lock()
                .map_err(|_| ClientError::Storage("session storage poisoned".to_string()))?;
            db.save(&token, Some(user.as_str()))?;
        }
        log::info!("Session started for {user}");
        self.active = Some(ActiveSession { token, user });
        Ok(())
    }

    /// Drop the in-memory session and the persisted token.
    pub fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            log::info!("Session ended for {}", active.user);
        }
        if let Some(storage) = &self.storage {
            match storage.lock() {
                Ok(db) => {
                    if let Err(err) = db.clear() {
                        log::warn!("Failed to clear persisted session: {err}");
                    }
                }
                Err(_) => log::warn!("Session storage poisoned; persisted token kept"),
            }
        }
    }

    /// Token left behind by a previous run, if any.
    pub fn persisted(&self) -> Option<StoredSession> {
        let storage = self.storage.as_ref()?;
        let db = storage.lock().ok()?;
        match db.load() {
            Ok(session) => session,
            Err(err) => {
                log::warn!("Failed to read persisted session: {err}");
                None
            }
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.token.as_str())
    }

    pub fn user(&self) -> Option<&UserId> {
        self.active.as_ref().map(|active| &active.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.active.is_some()
    }

    pub fn require_token(&self) -> Result<String> {
        self.token()
            .map(str::to_string)
            .ok_or_else(|| ClientError::Auth("not logged in".to_string()))
    }
}
