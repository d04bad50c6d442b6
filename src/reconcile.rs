//! Network drift reconciliation
//!
//! The reconciler polls the host's local address and compares it with the
//! address embedded in the containers' debug configuration. On a mismatch it
//! runs one regeneration pass and goes back to waiting.

use crate::debug::DebugAddressSource;
use crate::error::DevenvError;
use crate::manager::Environment;
use crate::network::AddressProbe;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Reconciler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReconcileState {
    /// Waiting for the next poll
    Stable,
    /// Regenerating debug configuration
    Reconciling,
}

/// A service operation that failed during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceFailure {
    pub service: String,
    pub error: String,
}

impl ServiceFailure {
    pub fn new(service: &str, error: DevenvError) -> Self {
        Self {
            service: service.to_string(),
            error: error.to_string(),
        }
    }
}

/// What one regeneration pass did
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// Address written into debug configuration
    pub address: String,
    /// Address found before the pass, if any
    pub previous: Option<String>,
    /// Services whose debug configuration was rewritten
    pub configured: Vec<String>,
    /// Services restarted, in restart order
    pub restarted: Vec<String>,
    /// Services whose configuration or restart failed
    pub failed: Vec<ServiceFailure>,
    /// Whether the environment store now records `address`
    pub env_updated: bool,
    /// Why the environment store could not be written
    pub env_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReconcileReport {
    pub(crate) fn new(address: &str, previous: Option<&str>) -> Self {
        Self {
            address: address.to_string(),
            previous: previous.map(str::to_string),
            configured: Vec::new(),
            restarted: Vec::new(),
            failed: Vec::new(),
            env_updated: false,
            env_error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.completed_at = Some(Utc::now());
        self
    }

    /// Whether every operation of the pass succeeded
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.env_error.is_none()
    }
}

/// Result of one poll
#[derive(Debug)]
pub enum PollOutcome {
    /// No interface address qualified
    NoLocalAddress,
    /// No debug address recorded yet, nothing to reconcile
    NoMarker,
    /// Addresses match
    InSync,
    /// Drift was found and a pass ran
    Reconciled(ReconcileReport),
}

/// Polls for address drift and repairs it
pub struct Reconciler {
    environment: Arc<Environment>,
    probe: Arc<dyn AddressProbe>,
    marker: Arc<dyn DebugAddressSource>,
    interval: Duration,
    state: ReconcileState,
    transitions: u64,
}

impl Reconciler {
    /// Reconciler polling at the interval configured for `environment`
    pub fn new(
        environment: Arc<Environment>,
        probe: Arc<dyn AddressProbe>,
        marker: Arc<dyn DebugAddressSource>,
    ) -> Self {
        let interval = environment.settings().poll_interval();
        Self {
            environment,
            probe,
            marker,
            interval,
            state: ReconcileState::Stable,
            transitions: 0,
        }
    }

    /// Override the poll interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Current state
    pub fn state(&self) -> ReconcileState {
        self.state
    }

    /// Number of Stable to Reconciling transitions so far
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Check for drift once and reconcile if needed
    pub async fn poll_once(&mut self) -> PollOutcome {
        let Some(local) = self.probe.local_address() else {
            debug!("No qualifying local address");
            return PollOutcome::NoLocalAddress;
        };

        let embedded = match self.marker.current_address().await {
            Ok(address) => address,
            Err(e) => {
                debug!("No debug address recorded: {}", e);
                return PollOutcome::NoMarker;
            }
        };

        if embedded == local.to_string() {
            return PollOutcome::InSync;
        }

        info!("Local address changed from {} to {}", embedded, local);
        self.state = ReconcileState::Reconciling;
        self.transitions += 1;

        let report = self
            .environment
            .regenerate_debug_config(local, Some(&embedded))
            .await;
        if report.is_clean() {
            info!(
                "Reconfigured {} services, restarted {}",
                report.configured.len(),
                report.restarted.len()
            );
        } else {
            error!(
                "Reconciliation finished with {} failures",
                report.failed.len() + usize::from(report.env_error.is_some())
            );
        }

        self.state = ReconcileState::Stable;
        PollOutcome::Reconciled(report)
    }

    /// Poll until `shutdown` becomes true or its sender is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Self {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Watching for address drift every {:?}", self.interval);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Drift watcher stopped");
        self
    }

    /// Run on a background task
    pub fn spawn(self) -> ReconcilerHandle {
        let (shutdown, receiver) = watch::channel(false);
        let task = tokio::spawn(self.run(receiver));
        ReconcilerHandle { shutdown, task }
    }
}

/// Handle to a reconciler running in the background
pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Reconciler>,
}

impl ReconcilerHandle {
    /// Ask the reconciler to stop and wait for it
    pub async fn stop(self) -> Option<Reconciler> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(reconciler) => Some(reconciler),
            Err(e) => {
                error!("Drift watcher task failed: {}", e);
                None
            }
        }
    }
}
