//! Authentication session management

pub mod manager;
pub mod state;

pub use manager::{AuthError, SessionManager};
pub use state::{AuthKind, PendingAuth, Session, SessionStatus};
