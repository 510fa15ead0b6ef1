//! Storefront API module
//!
//! This module provides:
//! - Domain types shared with the remote API (`Product`, `User`, ...)
//! - `ProductCatalog` and `AuthService` collaborator traits
//! - `HttpStorefrontApi`, the reqwest implementation of both traits

mod http;
mod service;
mod types;

pub use http::HttpStorefrontApi;
pub use service::{AuthService, ProductCatalog};
pub use types::{ApiError, AuthGrant, Credentials, ErrorBody, Product, Profile, User};
