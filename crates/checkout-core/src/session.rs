//! Merchant Sessions
//!
//! Merchant API credentials live in an explicit store handed to whoever needs
//! them, never in ambient global state. Nothing here outlives the process.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CheckoutError, Result};

/// Merchant session identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for SessionId {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| CheckoutError::InvalidState(format!("malformed session id {s:?}: {e}")))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Merchant API key pair, sent as `X-Api-Key` / `X-Api-Secret`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl MerchantCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Read `CHECKOUT_API_KEY` / `CHECKOUT_API_SECRET`, if both are set
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("CHECKOUT_API_KEY").ok()?;
        let api_secret = std::env::var("CHECKOUT_API_SECRET").ok()?;
        Some(Self::new(api_key, api_secret))
    }
}

impl fmt::Debug for MerchantCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

/// A signed-in merchant
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MerchantSession {
    pub id: SessionId,
    pub credentials: MerchantCredentials,
    #[serde(rename = "started_at")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "last_seen_at")]
    pub updated_at: DateTime<Utc>,
    pub active: bool,
}

impl MerchantSession {
    pub fn new(credentials: MerchantCredentials) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::generate(),
            credentials,
            created_at: now,
            updated_at: now,
            active: true,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Sign out
    pub fn end(&mut self) {
        self.active = false;
        self.touch();
    }
}

/// Session store capability
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &MerchantSession) -> Result<()>;

    fn load(&self, id: &SessionId) -> Result<Option<MerchantSession>>;

    fn delete(&self, id: &SessionId) -> Result<()>;

    /// Most recently updated active session
    fn current(&self) -> Result<Option<MerchantSession>>;
}

/// In-memory session store, scoped to the process
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, MerchantSession>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &MerchantSession) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session.id, session.clone());
        tracing::debug!(session = %session.id, active = session.active, "Merchant session saved");
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<MerchantSession>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.get(id).cloned())
    }

    fn delete(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.remove(id).is_some() {
            tracing::debug!(session = %id, "Merchant session deleted");
        }
        Ok(())
    }

    fn current(&self) -> Result<Option<MerchantSession>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions
            .values()
            .filter(|s| s.active)
            .max_by_key(|s| s.updated_at)
            .cloned())
    }
}
