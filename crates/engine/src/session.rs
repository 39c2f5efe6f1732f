//! Shopper session: the credential that selects the engine's mode.
//!
//! A [`Session`] is injected into every engine and coordinator. Engines read
//! it at the start of each call, so a login or logout between two calls is
//! honored on the very next one. Only presence of the credential matters; an
//! expired credential surfaces as a failed remote call.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::SecretString;
use tracing::warn;

use crate::error::SyncError;
use crate::storage::Storage;

/// Storage key holding the shopper's bearer credential, saved as a JSON
/// string like every other stored value.
pub const CREDENTIAL_KEY: &str = "auth_token";

/// Which store is authoritative for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// No credential: the guest snapshot is authoritative.
    Guest,
    /// Credential present: the collection service is authoritative.
    Authenticated,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Guest => write!(f, "guest"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Shared, cheaply cloneable session handle.
#[derive(Clone, Default)]
pub struct Session {
    credential: Arc<RwLock<Option<SecretString>>>,
    storage: Option<Arc<dyn Storage>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode())
            .field("credential", &"[REDACTED]")
            .field("persistent", &self.storage.is_some())
            .finish()
    }
}

impl Session {
    /// A guest session that lives only in memory.
    #[must_use]
    pub fn guest() -> Self {
        Self::default()
    }

    /// An authenticated session that lives only in memory.
    #[must_use]
    pub fn authenticated(credential: SecretString) -> Self {
        Self {
            credential: Arc::new(RwLock::new(Some(credential))),
            storage: None,
        }
    }

    /// A session persisted under [`CREDENTIAL_KEY`] in `storage`.
    ///
    /// Picks up a credential saved by an earlier process.
    #[must_use]
    pub fn persistent(storage: Arc<dyn Storage>) -> Self {
        let credential = match storage.get(CREDENTIAL_KEY) {
            Ok(value) => value
                .and_then(|raw| {
                    serde_json::from_str::<String>(&raw)
                        .inspect_err(|e| {
                            warn!(error = %e, "Stored credential is malformed, starting as guest");
                        })
                        .ok()
                })
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty())
                .map(SecretString::from),
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential, starting as guest");
                None
            }
        };

        Self {
            credential: Arc::new(RwLock::new(credential)),
            storage: Some(storage),
        }
    }

    /// Current credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<SecretString> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mode selected by the current credential.
    #[must_use]
    pub fn mode(&self) -> Mode {
        if self
            .credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
        {
            Mode::Authenticated
        } else {
            Mode::Guest
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.mode() == Mode::Authenticated
    }

    /// Store `credential`. Subsequent engine calls use the remote path.
    pub fn login(&self, credential: SecretString) {
        if let Some(storage) = &self.storage {
            use secrecy::ExposeSecret;
            let saved = serde_json::to_string(credential.expose_secret())
                .map_err(SyncError::from)
                .and_then(|raw| storage.set(CREDENTIAL_KEY, &raw).map_err(SyncError::from));
            if let Err(e) = saved {
                warn!(error = %e, "Failed to persist credential");
            }
        }
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    /// Drop the credential. Subsequent engine calls use the guest path.
    pub fn logout(&self) {
        if let Some(storage) = &self.storage
            && let Err(e) = storage.remove(CREDENTIAL_KEY)
        {
            warn!(error = %e, "Failed to remove persisted credential");
        }
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}
