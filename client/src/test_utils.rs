//! Test Utilities Module
//!
//! Deterministic fakes for the API collaborators and the scheduler.
//! This module is only compiled when running tests.

#![cfg(test)]

use crate::api::{ApiError, AuthGrant, AuthService, Credentials, Product, ProductCatalog, Profile, User};
use crate::observer::SubscriptionId;
use crate::search::{Scheduler, Task, TimerCallback, TimerHandle};
use crate::session::{Session, SessionManager, SessionStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Let spawned tasks run to their next suspension point
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Scheduler
// ============================================================================

struct ManualTimer {
    callback: Option<TimerCallback>,
    cancelled: Arc<AtomicBool>,
}

/// Scheduler whose timers only fire when the test says so
///
/// Tasks are spawned on the ambient tokio runtime.
pub struct ManualScheduler {
    timers: Mutex<Vec<ManualTimer>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            timers: Mutex::new(Vec::new()),
        }
    }

    /// Total timers ever scheduled
    pub fn scheduled(&self) -> usize {
        self.timers.lock().unwrap().len()
    }

    /// Timers neither fired nor cancelled
    pub fn pending(&self) -> usize {
        self.timers
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.callback.is_some() && !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Fire every pending timer, as if its delay elapsed. Returns how many fired.
    pub fn fire_all(&self) -> usize {
        let callbacks: Vec<TimerCallback> = {
            let mut timers = self.timers.lock().unwrap();
            timers
                .iter_mut()
                .filter(|t| !t.cancelled.load(Ordering::SeqCst))
                .filter_map(|t| t.callback.take())
                .collect()
        };

        let fired = callbacks.len();
        for callback in callbacks {
            callback();
        }
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_after(&self, _delay: Duration, callback: TimerCallback) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.timers.lock().unwrap().push(ManualTimer {
            callback: Some(callback),
            cancelled: cancelled.clone(),
        });
        TimerHandle::new(move || cancelled.store(true, Ordering::SeqCst))
    }

    fn spawn(&self, task: Task) {
        tokio::spawn(task);
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// In-memory catalog matching on title/brand substrings, in inventory order
pub struct ScriptedCatalog {
    products: Vec<Product>,
    queries: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failing: AtomicBool,
}

impl ScriptedCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            queries: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// `count` products titled "Shirt N" with ids p1..pN
    pub fn with_shirts(count: usize) -> Self {
        Self::new(
            (1..=count)
                .map(|i| Self::product(&format!("p{}", i), &format!("Shirt {}", i), "Roadster"))
                .collect(),
        )
    }

    pub fn product(id: &str, title: &str, brand: &str) -> Product {
        Product {
            id: id.to_string(),
            title: title.to_string(),
            brand: brand.to_string(),
            price: 799.0,
            image: format!("https://img.example.com/{}.jpg", id),
        }
    }

    /// Queries received, in arrival order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Park responses for `query` until [`ScriptedCatalog::release`]
    pub fn hold(&self, query: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(query.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, query: &str) {
        if let Some(gate) = self.gates.lock().unwrap().remove(query) {
            gate.notify_one();
        }
    }

    pub fn fail_searches(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProductCatalog for ScriptedCatalog {
    async fn search_products(&self, query: &str) -> Result<Vec<Product>, ApiError> {
        self.queries.lock().unwrap().push(query.to_string());

        let gate = self.gates.lock().unwrap().get(query).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection reset".to_string()));
        }

        let needle = query.to_lowercase();
        Ok(self
            .products
            .iter()
            .filter(|p| {
                p.title.to_lowercase().contains(&needle) || p.brand.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}

// ============================================================================
// Auth
// ============================================================================

/// In-memory account store; `hold` parks every auth call until `release`
pub struct ScriptedAuth {
    accounts: Mutex<HashMap<String, (String, User)>>,
    held: AtomicBool,
    gate: Notify,
    logout_fails: AtomicBool,
    login_calls: AtomicUsize,
    register_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl ScriptedAuth {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            held: AtomicBool::new(false),
            gate: Notify::new(),
            logout_fails: AtomicBool::new(false),
            login_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_account(self, email: &str, password: &str, name: &str) -> Self {
        let user = User {
            id: format!("user-{}", name.to_lowercase()),
            email: email.to_string(),
            name: name.to_string(),
        };
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), user));
        self
    }

    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.notify_one();
    }

    pub fn fail_logout(&self) {
        self.logout_fails.store(true, Ordering::SeqCst);
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    async fn wait_if_held(&self) {
        if self.held.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
    }

    fn grant(user: User) -> AuthGrant {
        AuthGrant {
            token: Some(format!("token-{}", user.id)),
            user,
        }
    }
}

#[async_trait]
impl AuthService for ScriptedAuth {
    async fn login(&self, credentials: &Credentials) -> Result<AuthGrant, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held().await;

        let accounts = self.accounts.lock().unwrap();
        match accounts.get(&credentials.email) {
            Some((password, user)) if *password == credentials.password => {
                Ok(Self::grant(user.clone()))
            }
            _ => Err(ApiError::Rejected {
                status: 401,
                message: "Invalid email or password".to_string(),
            }),
        }
    }

    async fn register(&self, profile: &Profile) -> Result<AuthGrant, ApiError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held().await;

        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&profile.email) {
            return Err(ApiError::Rejected {
                status: 409,
                message: "Email already registered".to_string(),
            });
        }

        let user = User {
            id: format!("user-{}", accounts.len() + 1),
            email: profile.email.clone(),
            name: profile.name.clone(),
        };
        accounts.insert(
            profile.email.clone(),
            (profile.password.clone(), user.clone()),
        );
        Ok(Self::grant(user))
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_fails.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Observers
// ============================================================================

/// Records every session snapshot a manager publishes
pub struct SessionRecorder {
    id: SubscriptionId,
    events: Arc<Mutex<Vec<Session>>>,
}

impl SessionRecorder {
    pub fn attach(manager: &SessionManager) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let id = manager.subscribe(move |session| sink.lock().unwrap().push(session.clone()));
        Self { id, events }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn statuses(&self) -> Vec<SessionStatus> {
        self.events.lock().unwrap().iter().map(|s| s.status).collect()
    }
}
