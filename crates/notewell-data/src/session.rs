//! Session mode selection and the mode-gated data router.
//!
//! Exactly one of three modes holds at any time: an authenticated session,
//! fallback (demo) mode, or neither. The mode is computed from persisted
//! state once at startup and again on explicit mode-change events (sign-in,
//! sign-out, entering fallback) — never polled ad hoc. Views that need data
//! ask the [`Workspace`] for a service; in the unauthenticated mode that is
//! an error the shell maps to a redirect to the sign-in surface.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use notewell_core::{defaults, DataService, Error, Result, UserIdentity};

use crate::fallback;
use crate::kv::{keys, KvStore};

/// The session's current operating mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// A signed-in identity; reads and writes go to the remote backend.
    Authenticated(UserIdentity),
    /// No identity; reads and writes go to the local fallback dataset.
    Fallback,
    /// Neither a session nor fallback mode. Data views must redirect.
    Unauthenticated,
}

impl SessionMode {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionMode::Authenticated(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SessionMode::Fallback)
    }

    /// The identity the mode operates as, if any.
    pub fn identity(&self) -> Option<UserIdentity> {
        match self {
            SessionMode::Authenticated(id) => Some(id.clone()),
            SessionMode::Fallback => Some(UserIdentity::fallback()),
            SessionMode::Unauthenticated => None,
        }
    }
}

/// Reads and transitions the persisted session state.
pub struct Session {
    kv: Arc<KvStore>,
}

impl Session {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    /// Compute the current mode from persisted state.
    pub fn detect(&self) -> SessionMode {
        if let Ok(Some(identity)) = self.kv.get::<UserIdentity>(keys::SESSION_USER) {
            return SessionMode::Authenticated(identity);
        }
        if fallback::is_enabled(&self.kv) {
            return SessionMode::Fallback;
        }
        SessionMode::Unauthenticated
    }

    /// Reset a stale fallback dataset on startup.
    ///
    /// Called once per launch. Idempotent: no effect unless fallback mode is
    /// active and its seed marker is missing or older than the reset TTL.
    /// Returns whether a reset happened.
    pub fn maybe_auto_reset_fallback(&self) -> Result<bool> {
        if !fallback::is_enabled(&self.kv) {
            return Ok(false);
        }
        let stale = match fallback::started_at(&self.kv) {
            Some(started) => {
                Utc::now() - started > Duration::seconds(defaults::FALLBACK_RESET_TTL_SECS)
            }
            None => true,
        };
        if !stale {
            return Ok(false);
        }
        info!("fallback dataset stale, reseeding");
        fallback::clear(&self.kv)?;
        fallback::initialize(&self.kv)?;
        Ok(true)
    }

    /// Enter fallback mode, seeding the dataset if needed.
    pub fn enter_fallback(&self) -> Result<SessionMode> {
        fallback::initialize(&self.kv)?;
        Ok(SessionMode::Fallback)
    }

    /// Record an authenticated identity. Clears the fallback flag so the
    /// modes stay mutually exclusive.
    pub fn sign_in(&self, identity: UserIdentity) -> Result<SessionMode> {
        self.kv.set(keys::SESSION_USER, &identity)?;
        self.kv.remove(keys::DEMO_MODE)?;
        info!(user_id = %identity.id, "signed in");
        Ok(SessionMode::Authenticated(identity))
    }

    /// Clear the session identity and the fallback flag. The resulting mode
    /// is always `Unauthenticated`; data views redirect.
    pub fn sign_out(&self) -> Result<SessionMode> {
        self.kv.remove(keys::SESSION_USER)?;
        self.kv.remove(keys::DEMO_MODE)?;
        info!("signed out");
        Ok(SessionMode::Unauthenticated)
    }
}

/// Routes every data operation to the mode-appropriate service.
///
/// Holds the mode as an explicit value, re-read via [`Workspace::refresh`]
/// on mode-change events. Components receive the workspace through
/// dependency injection and never consult a global flag.
pub struct Workspace {
    mode: SessionMode,
    remote: Option<Arc<dyn DataService>>,
    fallback: Arc<dyn DataService>,
}

impl Workspace {
    pub fn new(
        session: &Session,
        remote: Option<Arc<dyn DataService>>,
        fallback: Arc<dyn DataService>,
    ) -> Self {
        Self {
            mode: session.detect(),
            remote,
            fallback,
        }
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    /// Re-read the mode after an explicit mode-change event.
    pub fn refresh(&mut self, session: &Session) {
        self.mode = session.detect();
    }

    /// The data service for the current mode.
    ///
    /// `Unauthenticated` yields [`Error::Unauthorized`]; the caller redirects
    /// to the sign-in surface rather than rendering stale data.
    pub fn service(&self) -> Result<Arc<dyn DataService>> {
        match &self.mode {
            SessionMode::Authenticated(_) => self
                .remote
                .clone()
                .ok_or_else(|| Error::Config("no remote data service configured".into())),
            SessionMode::Fallback => Ok(self.fallback.clone()),
            SessionMode::Unauthenticated => {
                Err(Error::Unauthorized("sign in or open the demo".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackService;
    use crate::memory::MemoryService;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> (Arc<KvStore>, Session) {
        let kv = Arc::new(KvStore::open(dir.path()).unwrap());
        (kv.clone(), Session::new(kv))
    }

    fn identity() -> UserIdentity {
        UserIdentity {
            id: "user-1".into(),
            email: "user@example.com".into(),
            name: None,
        }
    }

    #[test]
    fn test_detect_unauthenticated_by_default() {
        let dir = TempDir::new().unwrap();
        let (_kv, session) = session(&dir);
        assert_eq!(session.detect(), SessionMode::Unauthenticated);
    }

    #[test]
    fn test_modes_are_mutually_exclusive() {
        let dir = TempDir::new().unwrap();
        let (_kv, session) = session(&dir);

        session.enter_fallback().unwrap();
        assert!(session.detect().is_fallback());

        // Signing in clears the fallback flag
        session.sign_in(identity()).unwrap();
        assert!(session.detect().is_authenticated());

        session.sign_out().unwrap();
        assert_eq!(session.detect(), SessionMode::Unauthenticated);
    }

    #[test]
    fn test_auto_reset_noop_when_not_in_fallback() {
        let dir = TempDir::new().unwrap();
        let (_kv, session) = session(&dir);
        assert!(!session.maybe_auto_reset_fallback().unwrap());
    }

    #[test]
    fn test_auto_reset_noop_when_fresh() {
        let dir = TempDir::new().unwrap();
        let (_kv, session) = session(&dir);
        session.enter_fallback().unwrap();
        assert!(!session.maybe_auto_reset_fallback().unwrap());
    }

    #[test]
    fn test_auto_reset_reseeds_stale_dataset() {
        let dir = TempDir::new().unwrap();
        let (kv, session) = session(&dir);
        session.enter_fallback().unwrap();

        // Age the marker past the TTL and drop a local edit marker
        let old = Utc::now() - Duration::seconds(defaults::FALLBACK_RESET_TTL_SECS + 60);
        kv.set(keys::DEMO_STARTED_AT, &old).unwrap();
        kv.set(keys::DEMO_NOTES, &Vec::<notewell_core::Note>::new()).unwrap();

        assert!(session.maybe_auto_reset_fallback().unwrap());
        let notes: Vec<notewell_core::Note> = kv.get(keys::DEMO_NOTES).unwrap().unwrap();
        assert_eq!(notes.len(), 3);

        // Second call right after is a no-op
        assert!(!session.maybe_auto_reset_fallback().unwrap());
    }

    #[test]
    fn test_workspace_routes_by_mode() {
        let dir = TempDir::new().unwrap();
        let (kv, session) = session(&dir);
        let remote: Arc<dyn DataService> = Arc::new(MemoryService::new("user-1"));
        let local: Arc<dyn DataService> = Arc::new(FallbackService::new(kv));

        let mut ws = Workspace::new(&session, Some(remote), local);
        assert!(matches!(ws.service(), Err(Error::Unauthorized(_))));

        session.enter_fallback().unwrap();
        ws.refresh(&session);
        assert!(ws.mode().is_fallback());
        assert!(!ws.service().unwrap().supports_history());

        session.sign_in(identity()).unwrap();
        ws.refresh(&session);
        assert!(ws.service().unwrap().supports_history());

        // Session cleared, flag cleared: views must redirect, not render
        // stale fallback data.
        session.sign_out().unwrap();
        ws.refresh(&session);
        assert!(matches!(ws.service(), Err(Error::Unauthorized(_))));
    }
}
