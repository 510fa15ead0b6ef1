//! Collaborator traits for the remote storefront API

use async_trait::async_trait;

use super::types::{ApiError, AuthGrant, Credentials, Product, Profile};

/// Product search backend
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Free-text product search. No pagination; may fail with a transport error.
    async fn search_products(&self, query: &str) -> Result<Vec<Product>, ApiError>;
}

/// Authentication backend
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<AuthGrant, ApiError>;

    async fn register(&self, profile: &Profile) -> Result<AuthGrant, ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;
}
