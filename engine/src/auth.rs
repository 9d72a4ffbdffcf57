//! Bearer-token persistence and the signed-in user.

use crate::gateway::InitialData;
use crate::storage::{KeyValueStore, AUTH_TOKEN_KEY};
use std::rc::Rc;

/// Persists the bearer token under its own key.
///
/// Storage failures are logged and treated as "no token".
#[derive(Clone)]
pub struct TokenStore {
    storage: Rc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(storage: Rc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    pub fn load(&self) -> Option<String> {
        match self.storage.get(AUTH_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "could not read stored token");
                None
            }
        }
    }

    /// Store `token`, or remove the key when it is empty.
    pub fn store(&self, token: &str) {
        let result = if token.is_empty() {
            self.storage.remove(AUTH_TOKEN_KEY)
        } else {
            self.storage.set(AUTH_TOKEN_KEY, token)
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "could not persist token");
        }
    }

    pub fn clear(&self) {
        self.store("");
    }
}

/// Who is signed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user_email: Option<String>,
    pub is_admin: bool,
    pub rooms: Vec<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Adopt the user data returned at sign-in.
    pub fn apply(&mut self, data: &InitialData) {
        self.user_email = data.user_email.clone().filter(|e| !e.is_empty());
        self.is_admin = data.is_admin;
        self.rooms = data.rooms.clone();
    }

    /// Forget token and user data.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
