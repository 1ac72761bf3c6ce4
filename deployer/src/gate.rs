//! Single-slot admission gate for deploy and reset.
//!
//! At most one operation body runs at a time. A caller that finds the slot
//! taken is turned away immediately; nothing is queued. Once admitted, the
//! body runs on its own tokio task that owns the permit, so the slot is
//! free again only after the body has finished or been dropped. The caller
//! holds the task through an abort-on-drop handle: if the caller goes away
//! (a client disconnect drops the handler future) the body is aborted
//! rather than left running without a bound.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use shared_types::OperationKind;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::DeployError;

/// Why an attempt was turned away without running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Another deploy or reset holds the slot.
    Busy,
    /// The same operation succeeded less than the configured cooldown ago.
    CoolingDown { retry_after: Duration },
}

/// Result of one `try_run` call.
#[derive(Debug)]
pub enum GateOutcome<T> {
    Success(T),
    Rejected(Rejection),
    /// The body exceeded the given limit and was abandoned.
    TimedOut(Duration),
    Failed(DeployError),
}

pub struct OperationGate {
    slot: Arc<Slot>,
}

struct Slot {
    busy: AtomicBool,
    cooldown: Duration,
    last_success: Mutex<HashMap<OperationKind, Instant>>,
}

impl Slot {
    fn record_success(&self, kind: OperationKind) {
        self.last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, Instant::now());
    }
}

/// Held by whoever runs the body; frees the slot on drop.
struct GatePermit {
    slot: Arc<Slot>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

/// Aborts the body task when the waiting caller is dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl OperationGate {
    /// A gate with no cooldown between successful runs.
    pub fn new() -> Self {
        Self::with_cooldown(Duration::ZERO)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            slot: Arc::new(Slot {
                busy: AtomicBool::new(false),
                cooldown,
                last_success: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Whether an operation currently holds the slot.
    pub fn is_busy(&self) -> bool {
        self.slot.busy.load(Ordering::Acquire)
    }

    /// Run `operation` if the slot is free, bounded by `timeout`.
    ///
    /// Never waits for the slot. The body is spawned onto the runtime; on
    /// timeout, or when this future is dropped, its task is aborted. That
    /// stops any further steps but does not by itself terminate an external
    /// process or a blocking unpack the body already started.
    pub async fn try_run<F, Fut, T>(
        &self,
        kind: OperationKind,
        timeout: Duration,
        operation: F,
    ) -> GateOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DeployError>> + Send + 'static,
        T: Send + 'static,
    {
        let Some(permit) = self.try_acquire() else {
            warn!(%kind, "rejected: another operation holds the gate");
            return GateOutcome::Rejected(Rejection::Busy);
        };

        if let Some(retry_after) = self.cooldown_remaining(kind) {
            warn!(%kind, retry_after_secs = retry_after.as_secs(), "rejected: cooling down");
            return GateOutcome::Rejected(Rejection::CoolingDown { retry_after });
        }

        info!(%kind, timeout_secs = timeout.as_secs(), "operation admitted");
        let started = Instant::now();
        let body = operation();
        let mut handle = AbortOnDrop(tokio::spawn(async move {
            let result = body.await;
            if result.is_ok() {
                permit.slot.record_success(kind);
            }
            drop(permit);
            result
        }));

        match tokio::time::timeout(timeout, &mut handle.0).await {
            Ok(Ok(Ok(value))) => {
                info!(%kind, elapsed_ms = started.elapsed().as_millis() as u64, "operation succeeded");
                GateOutcome::Success(value)
            }
            Ok(Ok(Err(e))) => {
                error!(%kind, error = %e, "operation failed");
                GateOutcome::Failed(e)
            }
            Ok(Err(join_err)) => {
                let message = if join_err.is_panic() {
                    format!("{kind} panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    format!("{kind} task was cancelled")
                };
                error!(%kind, "{message}");
                GateOutcome::Failed(DeployError::Unexpected(message))
            }
            Err(_) => {
                handle.0.abort();
                // The permit lives in the task; wait until it is dropped.
                let _ = (&mut handle.0).await;
                warn!(%kind, timeout_secs = timeout.as_secs(), "operation timed out, abandoning");
                GateOutcome::TimedOut(timeout)
            }
        }
    }

    fn try_acquire(&self) -> Option<GatePermit> {
        self.slot
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GatePermit {
                slot: Arc::clone(&self.slot),
            })
    }

    fn cooldown_remaining(&self, kind: OperationKind) -> Option<Duration> {
        if self.slot.cooldown.is_zero() {
            return None;
        }
        let last = self
            .slot
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .copied()?;
        self.slot
            .cooldown
            .checked_sub(last.elapsed())
            .filter(|remaining| !remaining.is_zero())
    }
}

impl Default for OperationGate {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
