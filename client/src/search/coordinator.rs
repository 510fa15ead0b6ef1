use crate::api::{ApiError, Product, ProductCatalog};
use crate::config::SearchConfig;
use crate::observer::{SubscriptionId, Subscribers};
use crate::search::scheduler::{Scheduler, TimerHandle};
use metrics::{counter, histogram};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use tracing::{debug, info, warn};

/// What the search UI renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchView {
    /// Latest text entered
    pub raw_text: String,
    /// Text of the most recently issued request
    pub settled_text: String,
    /// Generation of the most recently issued request (0 = none yet)
    pub generation: u64,
    pub results: Vec<Product>,
    pub visible: bool,
    /// A request for the current generation is outstanding
    pub searching: bool,
    /// Incremented on every published change
    pub rev: u64,
}

struct SearchState {
    raw_text: String,
    settled_text: String,
    /// Highest generation issued
    generation: u64,
    /// Generation whose response may still be applied; `None` after clearing
    current: Option<u64>,
    results: Vec<Product>,
    visible: bool,
    searching: bool,
    /// Bumped on every arm/cancel so a timer that already fired is recognisable as stale
    debounce_seq: u64,
    timer: Option<TimerHandle>,
    rev: u64,
}

impl SearchState {
    fn new() -> Self {
        Self {
            raw_text: String::new(),
            settled_text: String::new(),
            generation: 0,
            current: None,
            results: Vec::new(),
            visible: false,
            searching: false,
            debounce_seq: 0,
            timer: None,
            rev: 0,
        }
    }

    fn cancel_timer(&mut self) {
        self.debounce_seq += 1;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// Stop caring about the outstanding request, if any
    fn invalidate(&mut self) {
        self.current = None;
        self.searching = false;
    }

    fn view(&self) -> SearchView {
        SearchView {
            raw_text: self.raw_text.clone(),
            settled_text: self.settled_text.clone(),
            generation: self.generation,
            results: self.results.clone(),
            visible: self.visible,
            searching: self.searching,
            rev: self.rev,
        }
    }

    /// Stamp a new revision and snapshot it for subscribers
    fn publish(&mut self) -> SearchView {
        self.rev += 1;
        self.view()
    }
}

struct Shared {
    catalog: Arc<dyn ProductCatalog>,
    scheduler: Arc<dyn Scheduler>,
    config: SearchConfig,
    state: Mutex<SearchState>,
    subscribers: Subscribers<SearchView>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_searchable(&self, text: &str) -> bool {
        text.chars().count() >= self.config.min_query_len
    }

    /// Debounce timer elapsed: settle the query and issue a request
    fn fire(self: &Arc<Self>, seq: u64) {
        let (query, generation, view) = {
            let mut state = self.lock();
            if state.debounce_seq != seq || state.timer.is_none() {
                debug!("Ignoring superseded debounce timer {}", seq);
                return;
            }
            state.timer = None;
            if !self.is_searchable(&state.raw_text) {
                return;
            }

            state.settled_text = state.raw_text.clone();
            state.generation += 1;
            state.current = Some(state.generation);
            state.searching = true;
            (state.settled_text.clone(), state.generation, state.publish())
        };

        info!("Issuing search {} for {:?}", generation, query);
        counter!("storefront_search_requests_total").increment(1);
        self.subscribers.notify(view.rev, view);

        let shared = Arc::clone(self);
        self.scheduler.spawn(Box::pin(async move {
            let started = Instant::now();
            let result = shared.catalog.search_products(&query).await;
            histogram!("storefront_search_duration_seconds").record(started.elapsed());
            shared.resolve(generation, result);
        }));
    }

    /// Apply a response if it belongs to the current generation; drop it otherwise
    fn resolve(&self, generation: u64, result: Result<Vec<Product>, ApiError>) {
        let view = {
            let mut state = self.lock();
            if state.current != Some(generation) {
                debug!(
                    "Discarding stale search response {} (current {:?})",
                    generation, state.current
                );
                counter!("storefront_search_stale_responses_total").increment(1);
                return;
            }

            match result {
                Ok(products) => {
                    debug!("Search {} returned {} products", generation, products.len());
                    state.results = products
                        .into_iter()
                        .take(self.config.max_results)
                        .collect();
                }
                Err(e) => {
                    // Shown the same way as "no matches"
                    warn!("Search {} failed: {}", generation, e);
                    counter!("storefront_search_failures_total").increment(1);
                    state.results.clear();
                }
            }
            state.visible = true;
            state.searching = false;
            state.publish()
        };

        self.subscribers.notify(view.rev, view);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
    }
}

/// Turns a keystroke stream into debounced, generation-stamped product searches
///
/// Cloning yields another handle to the same coordinator.
#[derive(Clone)]
pub struct SearchCoordinator {
    shared: Arc<Shared>,
}

impl SearchCoordinator {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        scheduler: Arc<dyn Scheduler>,
        config: SearchConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                catalog,
                scheduler,
                config,
                state: Mutex::new(SearchState::new()),
                subscribers: Subscribers::new(),
            }),
        }
    }

    /// Record a keystroke: the full current contents of the search input
    pub fn set_query(&self, text: impl Into<String>) {
        let text = text.into();
        let shared = &self.shared;

        let view = {
            let mut state = shared.lock();
            if state.raw_text == text {
                return;
            }
            state.raw_text = text;
            state.cancel_timer();

            if shared.is_searchable(&state.raw_text) {
                let seq = state.debounce_seq;
                let weak: Weak<Shared> = Arc::downgrade(shared);
                let timer = shared.scheduler.schedule_after(
                    shared.config.debounce,
                    Box::new(move || {
                        if let Some(shared) = weak.upgrade() {
                            shared.fire(seq);
                        }
                    }),
                );
                state.timer = Some(timer);
                debug!("Debouncing {:?}", state.raw_text);
            } else {
                state.invalidate();
                state.results.clear();
                state.visible = false;
            }
            state.publish()
        };

        shared.subscribers.notify(view.rev, view);
    }

    /// Input regained focus: show the existing results again without re-fetching
    pub fn focus(&self) {
        let view = {
            let mut state = self.shared.lock();
            if state.visible
                || state.results.is_empty()
                || !self.shared.is_searchable(&state.raw_text)
            {
                return;
            }
            state.visible = true;
            state.publish()
        };

        self.shared.subscribers.notify(view.rev, view);
    }

    /// Hide results without touching the query (e.g. click outside the dropdown)
    pub fn dismiss(&self) {
        let view = {
            let mut state = self.shared.lock();
            if !state.visible {
                return;
            }
            state.visible = false;
            state.publish()
        };

        self.shared.subscribers.notify(view.rev, view);
    }

    /// A result was picked: clear the query and hide the dropdown
    ///
    /// Returns the picked product if it is among the current results. The results
    /// themselves are kept (hidden) until the next query change.
    pub fn select_result(&self, product_id: &str) -> Option<Product> {
        let (selected, view) = {
            let mut state = self.shared.lock();
            let selected = state.results.iter().find(|p| p.id == product_id).cloned();

            state.raw_text.clear();
            state.cancel_timer();
            state.invalidate();
            state.visible = false;
            (selected, state.publish())
        };

        self.shared.subscribers.notify(view.rev, view);
        selected
    }

    pub fn view(&self) -> SearchView {
        self.shared.lock().view()
    }

    pub fn results(&self) -> Vec<Product> {
        self.shared.lock().results.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.shared.lock().visible
    }

    /// Subscribe to view changes; every change delivers the full view
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SearchView) + Send + Sync + 'static,
    {
        self.shared.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.subscribers.unsubscribe(id)
    }
}
