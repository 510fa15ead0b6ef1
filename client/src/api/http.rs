//! reqwest-backed storefront API client

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::service::{AuthService, ProductCatalog};
use super::types::{ApiError, AuthGrant, Credentials, ErrorBody, Product, Profile};
use crate::config::ApiConfig;

/// HTTP implementation of [`ProductCatalog`] and [`AuthService`]
pub struct HttpStorefrontApi {
    base_url: String,
    client: reqwest::Client,
    /// Bearer token from the last successful login/register
    token: RwLock<Option<String>>,
}

impl HttpStorefrontApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Whether a bearer token is currently held
    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    async fn authenticate<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AuthGrant, ApiError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let grant: AuthGrant = decode(response).await?;

        *self.token.write().await = grant.token.clone();
        Ok(grant)
    }
}

#[async_trait]
impl ProductCatalog for HttpStorefrontApi {
    async fn search_products(&self, query: &str) -> Result<Vec<Product>, ApiError> {
        debug!("GET /products/search q={:?}", query);
        let response = self
            .client
            .get(self.url("/products/search"))
            .query(&[("q", query)])
            .send()
            .await?;

        decode(response).await
    }
}

#[async_trait]
impl AuthService for HttpStorefrontApi {
    async fn login(&self, credentials: &Credentials) -> Result<AuthGrant, ApiError> {
        self.authenticate("/auth/login", credentials).await
    }

    async fn register(&self, profile: &Profile) -> Result<AuthGrant, ApiError> {
        self.authenticate("/auth/register", profile).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let token = self.token.write().await.take();

        let mut request = self.client.post(self.url("/auth/logout"));
        if let Some(ref token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Logout returned {}", status);
            return Err(rejection(response).await);
        }
        Ok(())
    }
}

/// Decode a successful JSON body, or map a non-2xx response to [`ApiError::Rejected`]
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    if !response.status().is_success() {
        return Err(rejection(response).await);
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

async fn rejection(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string(),
    };

    ApiError::Rejected {
        status: status.as_u16(),
        message,
    }
}
