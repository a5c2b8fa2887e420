//! Shared work queue and visited set for the crawl worker pool.
//!
//! The frontier tracks how many URLs are currently being worked on so that
//! idle workers can tell "empty for now" apart from "crawl finished": the
//! crawl is over only when the queue is empty and nothing is in flight.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tokio::sync::{Mutex, Notify};

/// Order in which queued URLs are handed to workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraversalOrder {
    /// FIFO queue.
    #[default]
    BreadthFirst,
    /// LIFO stack.
    DepthFirst,
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<String>,
    in_flight: usize,
}

#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    notify: Notify,
    order: TraversalOrder,
}

impl Frontier {
    pub fn new(order: TraversalOrder) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            notify: Notify::new(),
            order,
        }
    }

    pub async fn push(&self, url: String) {
        self.extend(std::iter::once(url)).await;
    }

    pub async fn extend<I: IntoIterator<Item = String>>(&self, urls: I) {
        let mut state = self.state.lock().await;
        let before = state.queue.len();
        state.queue.extend(urls);
        let added = state.queue.len() > before;
        drop(state);

        if added {
            self.notify.notify_waiters();
        }
    }

    /// Take the next URL, waiting while other workers may still add work.
    ///
    /// Returns `None` once the queue is empty and no taken URL is still
    /// outstanding. Every `Some` must be paired with a call to
    /// [`Frontier::complete`].
    pub async fn next(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Registered before the lock is released so a push or the final
            // completion between unlock and await still wakes us.
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                let next = match self.order {
                    TraversalOrder::BreadthFirst => state.queue.pop_front(),
                    TraversalOrder::DepthFirst => state.queue.pop_back(),
                };
                if let Some(url) = next {
                    state.in_flight += 1;
                    return Some(url);
                }
                if state.in_flight == 0 {
                    drop(state);
                    self.notify.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Mark a URL returned by [`Frontier::next`] as fully processed.
    pub async fn complete(&self) {
        let mut state = self.state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        let finished = state.in_flight == 0 && state.queue.is_empty();
        drop(state);

        if finished {
            self.notify.notify_waiters();
        }
    }
}

/// Result of trying to claim a URL for fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Claimed,
    AlreadyVisited,
    BudgetExhausted,
}

/// Every URL that has been claimed for a fetch attempt, successful or not.
#[derive(Debug)]
pub struct VisitedSet {
    urls: Mutex<HashSet<String>>,
    max_pages: Option<usize>,
}

impl VisitedSet {
    pub fn new(max_pages: Option<usize>) -> Self {
        Self {
            urls: Mutex::new(HashSet::new()),
            max_pages,
        }
    }

    /// Atomically check and mark `url`. Must happen before the network call.
    pub async fn claim(&self, url: &str) -> Claim {
        let mut urls = self.urls.lock().await;
        if urls.contains(url) {
            return Claim::AlreadyVisited;
        }
        if self.max_pages.is_some_and(|max| urls.len() >= max) {
            return Claim::BudgetExhausted;
        }
        urls.insert(url.to_string());
        Claim::Claimed
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.urls.lock().await.contains(url)
    }

    /// Keep only the URLs that have not been claimed yet.
    pub async fn retain_unvisited(&self, urls: Vec<String>) -> Vec<String> {
        let visited = self.urls.lock().await;
        urls.into_iter().filter(|url| !visited.contains(url)).collect()
    }

    pub async fn len(&self) -> usize {
        self.urls.lock().await.len()
    }
}
