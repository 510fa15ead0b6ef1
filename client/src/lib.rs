//! Storefront Client Library
//!
//! Coordination core of the storefront front-end: the authentication session and the
//! product search stream, independent of any UI toolkit.

pub mod api;
pub mod config;
pub mod observer;
pub mod search;
pub mod session;

mod test_utils;

// Re-export commonly used types
pub use api::{ApiError, HttpStorefrontApi, Product, User};
pub use config::Config;
pub use observer::SubscriptionId;
pub use search::{SearchCoordinator, SearchView, TokioScheduler};
pub use session::{AuthError, Session, SessionManager, SessionStatus};
