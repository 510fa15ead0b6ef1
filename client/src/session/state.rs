use crate::api::User;

/// Authentication status of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Authenticating,
    Authenticated,
    AuthFailed,
}

/// Which collaborator call an auth attempt goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Login,
    Register,
}

impl AuthKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthKind::Login => "login",
            AuthKind::Register => "register",
        }
    }
}

/// Handle on the auth request currently in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAuth {
    pub attempt: u64,
    pub kind: AuthKind,
}

/// Snapshot of the client's authentication session
///
/// `user` is `Some` if and only if `status == Authenticated`, `credentials_in_flight`
/// only while `Authenticating`, `error` only while `AuthFailed`. The fields are public
/// for reading; transitions go through the methods below, which keep them consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub status: SessionStatus,
    pub user: Option<User>,
    pub credentials_in_flight: Option<PendingAuth>,
    /// Human-readable reason for the last failure
    pub error: Option<String>,
    /// Incremented on every transition
    pub rev: u64,
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            status: SessionStatus::Anonymous,
            user: None,
            credentials_in_flight: None,
            error: None,
            rev: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn is_authenticating(&self) -> bool {
        self.status == SessionStatus::Authenticating
    }

    /// Attempt id of the request in flight, if any
    pub fn pending_attempt(&self) -> Option<u64> {
        self.credentials_in_flight.map(|p| p.attempt)
    }

    pub(crate) fn begin(&mut self, pending: PendingAuth) {
        self.status = SessionStatus::Authenticating;
        self.user = None;
        self.credentials_in_flight = Some(pending);
        self.error = None;
        self.rev += 1;
    }

    pub(crate) fn succeed(&mut self, user: User) {
        self.status = SessionStatus::Authenticated;
        self.user = Some(user);
        self.credentials_in_flight = None;
        self.error = None;
        self.rev += 1;
    }

    pub(crate) fn fail(&mut self, reason: String) {
        self.status = SessionStatus::AuthFailed;
        self.user = None;
        self.credentials_in_flight = None;
        self.error = Some(reason);
        self.rev += 1;
    }

    pub(crate) fn reset(&mut self) {
        self.status = SessionStatus::Anonymous;
        self.user = None;
        self.credentials_in_flight = None;
        self.error = None;
        self.rev += 1;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}
