use crate::api::{ApiError, AuthGrant, AuthService, Credentials, Profile, User};
use crate::observer::{SubscriptionId, Subscribers};
use crate::session::state::{AuthKind, PendingAuth, Session, SessionStatus};
use metrics::counter;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors rejected synchronously, before any state transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{field} is required")]
    Validation { field: &'static str },

    #[error("An authentication request is already in progress")]
    ConcurrentAuth,
}

struct Inner {
    session: Session,
    next_attempt: u64,
}

/// Session manager: single source of truth for the current user
///
/// Collaborator failures never escape `login`/`register`; they land in the
/// `AuthFailed` state and are delivered to subscribers.
pub struct SessionManager {
    auth: Arc<dyn AuthService>,
    inner: Mutex<Inner>,
    subscribers: Subscribers<Session>,
}

impl SessionManager {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        Self {
            auth,
            inner: Mutex::new(Inner {
                session: Session::anonymous(),
                next_attempt: 1,
            }),
            subscribers: Subscribers::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current session snapshot
    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().session.status
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().session.is_authenticated()
    }

    pub fn current_user(&self) -> Option<User> {
        self.lock().session.user.clone()
    }

    /// Subscribe to session transitions; every transition delivers the full snapshot
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Log in with email and password
    ///
    /// Returns the session snapshot after the attempt settled, which is either
    /// `Authenticated` or `AuthFailed` (or `Anonymous` if a logout raced it).
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        require("email", email)?;
        require("password", password)?;

        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };

        let mut attempt = self.begin(AuthKind::Login)?;
        let result = self.auth.login(&credentials).await;
        Ok(self.finish(&mut attempt, result).await)
    }

    /// Register a new account; on success the session looks exactly like a login session
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Session, AuthError> {
        require("name", name)?;
        require("email", email)?;
        require("password", password)?;

        let profile = Profile {
            email: email.trim().to_string(),
            password: password.to_string(),
            name: name.trim().to_string(),
        };

        let mut attempt = self.begin(AuthKind::Register)?;
        let result = self.auth.register(&profile).await;
        Ok(self.finish(&mut attempt, result).await)
    }

    /// Log out, whatever the current state
    ///
    /// A no-op while already anonymous. Otherwise the local session is cleared first
    /// and the remote logout is attempted afterwards; its failure is only logged.
    pub async fn logout(&self) -> Session {
        let snapshot = {
            let mut inner = self.lock();
            if inner.session.status == SessionStatus::Anonymous {
                return inner.session.clone();
            }
            if let Some(pending) = inner.session.credentials_in_flight {
                debug!(
                    "Abandoning {} attempt {} on logout",
                    pending.kind.as_str(),
                    pending.attempt
                );
            }
            inner.session.reset();
            inner.session.clone()
        };

        info!("Logged out");
        counter!("storefront_logouts_total").increment(1);
        self.subscribers.notify(snapshot.rev, snapshot.clone());

        if let Err(e) = self.auth.logout().await {
            warn!("Remote logout failed: {}", e);
        }

        snapshot
    }

    /// Acknowledge a failed attempt, returning to `Anonymous`
    pub fn acknowledge_failure(&self) -> Session {
        let snapshot = {
            let mut inner = self.lock();
            if inner.session.status != SessionStatus::AuthFailed {
                return inner.session.clone();
            }
            inner.session.reset();
            inner.session.clone()
        };

        self.subscribers.notify(snapshot.rev, snapshot.clone());
        snapshot
    }

    fn begin(&self, kind: AuthKind) -> Result<InFlight<'_>, AuthError> {
        let (snapshot, attempt) = {
            let mut inner = self.lock();
            if inner.session.is_authenticating() {
                debug!("Rejecting {}: another attempt is in flight", kind.as_str());
                return Err(AuthError::ConcurrentAuth);
            }

            let attempt = inner.next_attempt;
            inner.next_attempt += 1;
            inner.session.begin(PendingAuth { attempt, kind });
            (inner.session.clone(), attempt)
        };

        counter!("storefront_auth_attempts_total", "kind" => kind.as_str()).increment(1);
        debug!("Started {} attempt {}", kind.as_str(), attempt);
        self.subscribers.notify(snapshot.rev, snapshot);

        Ok(InFlight {
            manager: self,
            attempt,
            kind,
            settled: false,
        })
    }

    /// Settle an attempt; a grant that arrives after the attempt was superseded is
    /// revoked remotely, since the collaborator already holds its token
    async fn finish(
        &self,
        attempt: &mut InFlight<'_>,
        result: Result<AuthGrant, ApiError>,
    ) -> Session {
        let granted = result.is_ok();
        let (session, superseded) = attempt.settle(result);

        if superseded && granted && session.status == SessionStatus::Anonymous {
            info!("Revoking late {} grant", attempt.kind.as_str());
            if let Err(e) = self.auth.logout().await {
                warn!("Revoking late grant failed: {}", e);
            }
        }
        session
    }

    /// Apply the outcome of `attempt`, unless it was superseded (e.g. by logout)
    ///
    /// Returns the resulting snapshot and whether the outcome was discarded.
    fn settle(
        &self,
        attempt: u64,
        kind: AuthKind,
        result: Result<AuthGrant, ApiError>,
    ) -> (Session, bool) {
        let snapshot = {
            let mut inner = self.lock();
            if inner.session.pending_attempt() != Some(attempt) {
                debug!(
                    "Discarding {} attempt {}: no longer current",
                    kind.as_str(),
                    attempt
                );
                return (inner.session.clone(), true);
            }

            match result {
                Ok(grant) => {
                    info!("{} succeeded for {}", kind.as_str(), grant.user.email);
                    inner.session.succeed(grant.user);
                }
                Err(e) => {
                    warn!("{} failed: {}", kind.as_str(), e);
                    counter!("storefront_auth_failures_total", "kind" => kind.as_str())
                        .increment(1);
                    inner.session.fail(e.user_message());
                }
            }
            inner.session.clone()
        };

        self.subscribers.notify(snapshot.rev, snapshot.clone());
        (snapshot, false)
    }

    /// The caller's future was dropped mid-request; release the in-flight slot
    fn abandon(&self, attempt: u64, kind: AuthKind) {
        let snapshot = {
            let mut inner = self.lock();
            if inner.session.pending_attempt() != Some(attempt) {
                return;
            }
            warn!("{} attempt {} cancelled by caller", kind.as_str(), attempt);
            inner.session.reset();
            inner.session.clone()
        };

        self.subscribers.notify(snapshot.rev, snapshot);
    }
}

/// Guard for an auth attempt; dropping it unsettled frees the session for a retry
struct InFlight<'a> {
    manager: &'a SessionManager,
    attempt: u64,
    kind: AuthKind,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(&mut self, result: Result<AuthGrant, ApiError>) -> (Session, bool) {
        self.settled = true;
        self.manager.settle(self.attempt, self.kind, result)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.manager.abandon(self.attempt, self.kind);
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::Validation { field });
    }
    Ok(())
}
