//! Common Test Utilities for Integration Tests
//!
//! A mock storefront API served by axum on an ephemeral port.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storefront_client::api::{AuthGrant, Credentials, ErrorBody, Product, Profile, User};
use storefront_client::config::ApiConfig;
use uuid::Uuid;

#[derive(Default)]
struct MockData {
    products: Vec<Product>,
    /// email -> (password, user)
    accounts: HashMap<String, (String, User)>,
    search_queries: Vec<String>,
    /// Authorization header of each logout call
    logouts: Vec<Option<String>>,
    fail_search: bool,
    /// Time the login route takes to answer
    login_delay: Duration,
}

/// Shared handle on the mock API's data, for seeding and inspection
#[derive(Clone, Default)]
pub struct MockApi {
    data: Arc<Mutex<MockData>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(self, products: Vec<Product>) -> Self {
        self.data.lock().unwrap().products = products;
        self
    }

    pub fn with_account(self, email: &str, password: &str, name: &str) -> Self {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.to_string(),
        };
        self.data
            .lock()
            .unwrap()
            .accounts
            .insert(email.to_string(), (password.to_string(), user));
        self
    }

    pub fn with_login_delay(self, delay: Duration) -> Self {
        self.data.lock().unwrap().login_delay = delay;
        self
    }

    pub fn fail_search(&self, fail: bool) {
        self.data.lock().unwrap().fail_search = fail;
    }

    pub fn search_queries(&self) -> Vec<String> {
        self.data.lock().unwrap().search_queries.clone()
    }

    pub fn logouts(&self) -> Vec<Option<String>> {
        self.data.lock().unwrap().logouts.clone()
    }

    /// Start serving on 127.0.0.1 and return an [`ApiConfig`] pointing at `/api`
    pub async fn spawn(self) -> ApiConfig {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock api");
        let addr = listener.local_addr().expect("mock api addr");

        let app = router(self);
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock api server");
        });

        ApiConfig {
            base_url: format!("http://{}/api", addr),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Build `count` products titled "Slim Fit Shirt N", ids p1..pN
pub fn shirts(count: usize) -> Vec<Product> {
    (1..=count)
        .map(|i| Product {
            id: format!("p{}", i),
            title: format!("Slim Fit Shirt {}", i),
            brand: "Roadster".to_string(),
            price: 599.0 + i as f64,
            image: format!("https://img.example.com/p{}.jpg", i),
        })
        .collect()
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            message: message.to_string(),
        }),
    )
        .into_response()
}

fn grant(user: User) -> AuthGrant {
    AuthGrant {
        user,
        token: Some(Uuid::new_v4().to_string()),
    }
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
}

async fn search(State(api): State<MockApi>, Query(params): Query<SearchParams>) -> Response {
    let mut data = api.data.lock().unwrap();
    data.search_queries.push(params.q.clone());

    if data.fail_search {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "catalog unavailable");
    }

    let needle = params.q.to_lowercase();
    let found: Vec<Product> = data
        .products
        .iter()
        .filter(|p| p.title.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    Json(found).into_response()
}

async fn garbled_search() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        "<html>maintenance</html>",
    )
}

async fn login(State(api): State<MockApi>, Json(credentials): Json<Credentials>) -> Response {
    let delay = api.data.lock().unwrap().login_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let data = api.data.lock().unwrap();
    match data.accounts.get(&credentials.email) {
        Some((password, user)) if *password == credentials.password => {
            Json(grant(user.clone())).into_response()
        }
        _ => error(StatusCode::UNAUTHORIZED, "Invalid email or password"),
    }
}

async fn register(State(api): State<MockApi>, Json(profile): Json<Profile>) -> Response {
    let mut data = api.data.lock().unwrap();
    if data.accounts.contains_key(&profile.email) {
        return error(StatusCode::CONFLICT, "Email already registered");
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        email: profile.email.clone(),
        name: profile.name.clone(),
    };
    data.accounts
        .insert(profile.email.clone(), (profile.password, user.clone()));
    (StatusCode::CREATED, Json(grant(user))).into_response()
}

async fn logout(State(api): State<MockApi>, headers: HeaderMap) -> StatusCode {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    api.data.lock().unwrap().logouts.push(auth);
    StatusCode::NO_CONTENT
}

fn router(api: MockApi) -> Router {
    Router::new()
        .route("/api/products/search", get(search))
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/logout", post(logout))
        .route("/garbled/products/search", get(garbled_search))
        .with_state(api)
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Await `future`, failing the test if it takes longer than a few seconds
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation timed out")
}

/// Initialize test logging for detailed output
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
