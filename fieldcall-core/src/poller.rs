//! Reconciliation Poller.
//!
//! Re-fetches server lists on a fixed cadence and hands each result to a
//! callback as a [`PollFact`]. It holds no session state and never decides
//! transitions; the controller starts and stops it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::directory::DirectoryClient;
use crate::models::{ActiveCall, Role, VideoRequest};

/// One result of a poll, already scoped to the viewer's role.
#[derive(Debug, Clone, PartialEq)]
pub enum PollFact {
    /// Responder view: requests waiting for this responder.
    PendingRequests(Vec<VideoRequest>),
    /// Requester view: requests this requester created.
    OwnRequests(Vec<VideoRequest>),
    /// Responder view: calls currently marked active.
    ActiveCalls(Vec<ActiveCall>),
}

impl PollFact {
    pub fn label(&self) -> &'static str {
        match self {
            PollFact::PendingRequests(_) => "pending_requests",
            PollFact::OwnRequests(_) => "own_requests",
            PollFact::ActiveCalls(_) => "active_calls",
        }
    }
}

pub type PollFactCallback = Arc<dyn Fn(PollFact) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct PollerStatus {
    pub is_running: bool,
    pub polls: u64,
    pub failures: u64,
    pub last_poll: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Clone)]
pub struct ReconciliationPoller {
    directory: Arc<dyn DirectoryClient>,
    role: Role,
    interval: Duration,
    on_fact: PollFactCallback,
    status: Arc<RwLock<PollerStatus>>,
    running: Arc<RwLock<bool>>,
    shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl ReconciliationPoller {
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        role: Role,
        interval: Duration,
        on_fact: PollFactCallback,
    ) -> Self {
        Self {
            directory,
            role,
            interval,
            on_fact,
            status: Arc::new(RwLock::new(PollerStatus::default())),
            running: Arc::new(RwLock::new(false)),
            shutdown_tx: Arc::new(Mutex::new(None)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn status(&self) -> PollerStatus {
        self.status.read().await.clone()
    }

    /// Starts the loop. The first poll happens immediately. Returns false
    /// when the poller was already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.write().await;
        if *running {
            return false;
        }
        *running = true;
        drop(running);

        self.status.write().await.is_running = true;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.shutdown_tx.lock().await = Some(shutdown_tx);

        let poller = self.clone();
        tokio::spawn(async move {
            poller.background_loop(shutdown_rx).await;
        });

        info!(
            role = %self.role,
            interval_secs = self.interval.as_secs(),
            "Reconciliation poller started"
        );
        true
    }

    /// Stops the loop. No fact is delivered after this returns.
    pub async fn stop(&self) -> bool {
        let mut running = self.running.write().await;
        let was_running = *running;
        *running = false;
        drop(running);

        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }
        self.status.write().await.is_running = false;

        if was_running {
            info!(role = %self.role, "Reconciliation poller stopped");
        }
        was_running
    }

    /// Runs one round of fetches and returns the facts it produced,
    /// without delivering them.
    pub async fn poll_once(&self) -> Vec<PollFact> {
        let mut facts = Vec::new();
        let mut error = None;

        match self.role {
            Role::Responder => {
                match self.directory.list_pending_requests().await {
                    Ok(requests) => facts.push(PollFact::PendingRequests(requests)),
                    Err(e) => {
                        warn!(
                            error_code = e.error_code(),
                            "Polling pending requests failed: {}",
                            e
                        );
                        error = Some(e.to_string());
                    }
                }
                match self.directory.list_active_calls().await {
                    Ok(calls) => facts.push(PollFact::ActiveCalls(calls)),
                    Err(e) => {
                        warn!(error_code = e.error_code(), "Polling active calls failed: {}", e);
                        error = Some(e.to_string());
                    }
                }
            }
            Role::Requester => match self.directory.list_own_requests().await {
                Ok(requests) => facts.push(PollFact::OwnRequests(requests)),
                Err(e) => {
                    warn!(error_code = e.error_code(), "Polling own requests failed: {}", e);
                    error = Some(e.to_string());
                }
            },
        }

        let mut status = self.status.write().await;
        status.polls += 1;
        status.last_poll = Some(Utc::now());
        if error.is_some() {
            status.failures += 1;
            status.last_error = error;
        }

        facts
    }

    async fn background_loop(self, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let facts = self.poll_once().await;
                    if !*self.running.read().await {
                        break;
                    }
                    for fact in facts {
                        debug!(fact = fact.label(), "Poll fact");
                        (self.on_fact)(fact);
                    }
                }
                _ = &mut shutdown_rx => {
                    debug!("Reconciliation poller shutting down");
                    break;
                }
            }
        }
    }
}
