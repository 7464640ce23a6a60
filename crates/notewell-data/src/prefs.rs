//! User preferences with live fan-out.
//!
//! Preferences are persisted in the key/value store and distributed over a
//! `tokio::sync::watch` channel so every live draft controller picks up a
//! change (autosave toggle, interval) in the same session without reload.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use notewell_core::{Preferences, Result};

use crate::kv::{keys, KvStore};

/// Shared preferences hub. Cheap to clone.
#[derive(Clone)]
pub struct PreferencesHub {
    kv: Arc<KvStore>,
    tx: Arc<watch::Sender<Preferences>>,
}

impl PreferencesHub {
    /// Load persisted preferences (or defaults) and start the watch channel.
    pub fn open(kv: Arc<KvStore>) -> Result<Self> {
        let initial = kv
            .get::<Preferences>(keys::APP_PREFERENCES)?
            .unwrap_or_default()
            .normalized();
        let (tx, _) = watch::channel(initial);
        Ok(Self { kv, tx: Arc::new(tx) })
    }

    /// Current preferences value.
    pub fn current(&self) -> Preferences {
        self.tx.borrow().clone()
    }

    /// Persist new preferences and broadcast them to every subscriber.
    pub fn update(&self, prefs: Preferences) -> Result<()> {
        let prefs = prefs.normalized();
        self.kv.set(keys::APP_PREFERENCES, &prefs)?;
        info!(
            autosave_enabled = prefs.autosave_enabled,
            autosave_interval_ms = prefs.autosave_interval_ms,
            "preferences updated"
        );
        self.tx.send_replace(prefs);
        Ok(())
    }

    /// Subscribe to preference changes. The receiver always starts at the
    /// current value.
    pub fn watch(&self) -> watch::Receiver<Preferences> {
        self.tx.subscribe()
    }
}
