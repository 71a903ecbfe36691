// ── Dispatch engine ──
//
// Single-consumer drain loop over the pending SMS queue. At most one
// loop runs at a time (atomic guard); gateways rotate round-robin once
// per iteration; failures retry up to the ceiling with front-of-queue
// reinsertion so a degraded device's message recovers before the
// backlog moves.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rutly_api::{Error as ApiError, GatewayClient};

use crate::log::{LogEntry, SendLog, SendStatus};
use crate::registry::{Gateway, GatewayRegistry};

/// Maximum number of re-attempts before a message is permanently dropped.
pub const RETRY_CEILING: u32 = 3;

/// Default pause between consecutive send iterations.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(3000);

/// A message waiting in the pending queue.
#[derive(Debug, Clone)]
pub struct QueuedSms {
    pub to: String,
    pub message: String,
    pub retry_count: u32,
}

/// The dispatch engine.
///
/// Cheaply cloneable via `Arc`; every clone shares the same queue, log,
/// and rotation state. Collaborators use only [`enqueue`](Self::enqueue),
/// [`drain_if_idle`](Self::drain_if_idle), [`snapshot_log`](Self::snapshot_log),
/// and [`clear_log`](Self::clear_log) — the single-writer invariant on the
/// queue and rotation index lives entirely inside the drain loop.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Debug)]
struct DispatcherInner {
    registry: GatewayRegistry,
    client: GatewayClient,
    queue: Mutex<VecDeque<QueuedSms>>,
    log: SendLog,
    /// Always in `[0, registry.len())`. Written only by the drain loop.
    rotation: AtomicUsize,
    /// The sole concurrency guard: set via compare-and-swap by whichever
    /// caller wins the race to start a loop.
    draining: AtomicBool,
    send_delay: Duration,
}

impl Dispatcher {
    pub fn new(registry: GatewayRegistry, client: GatewayClient, send_delay: Duration) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                client,
                queue: Mutex::new(VecDeque::new()),
                log: SendLog::new(),
                rotation: AtomicUsize::new(0),
                draining: AtomicBool::new(false),
                send_delay,
            }),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<QueuedSms>> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Intake boundary ──────────────────────────────────────────

    /// Append a message to the back of the pending queue.
    ///
    /// Does not start the drain loop; callers follow up with
    /// [`drain_if_idle`](Self::drain_if_idle).
    pub fn enqueue(&self, to: impl Into<String>, message: impl Into<String>) {
        let mut queue = self.queue();
        queue.push_back(QueuedSms {
            to: to.into(),
            message: message.into(),
            retry_count: 0,
        });
        debug!(queue_len = queue.len(), "message queued");
    }

    /// Start a drain loop unless one is already running.
    ///
    /// Returns the handle of the loop that was started, or `None` when an
    /// active loop already owns the queue.
    pub fn drain_if_idle(&self) -> Option<JoinHandle<()>> {
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            debug!("starting drain loop");
            Some(tokio::spawn(self.clone().drain()))
        } else {
            None
        }
    }

    // ── Presentation boundary ────────────────────────────────────

    /// Snapshot of the send log, newest first.
    pub fn snapshot_log(&self) -> Vec<LogEntry> {
        self.inner.log.snapshot_desc()
    }

    /// Clear the send log. Pending queue and rotation are unaffected.
    pub fn clear_log(&self) {
        self.inner.log.clear();
        info!("send log cleared");
    }

    pub fn queue_len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::SeqCst)
    }

    pub fn rotation_index(&self) -> usize {
        self.inner.rotation.load(Ordering::SeqCst)
    }

    pub fn gateway_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Access the gateway registry (read-only).
    pub fn registry(&self) -> &GatewayRegistry {
        &self.inner.registry
    }

    // ── Drain loop ───────────────────────────────────────────────

    async fn drain(self) {
        loop {
            let popped = self.queue().pop_front();
            let Some(mut sms) = popped else {
                self.inner.draining.store(false, Ordering::SeqCst);
                // An enqueue may have landed between the empty pop and the
                // flag clear; reclaim the loop if nobody else has.
                if self.queue().is_empty()
                    || self
                        .inner
                        .draining
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                        .is_err()
                {
                    debug!("queue empty, drain loop going idle");
                    return;
                }
                continue;
            };

            let index = self.inner.rotation.load(Ordering::SeqCst);
            let display_index = index + 1;
            let Some(gateway) = self.inner.registry.get(index) else {
                // Unreachable while the rotation invariant holds.
                warn!(index, "rotation index out of range, stopping drain loop");
                self.inner.draining.store(false, Ordering::SeqCst);
                return;
            };

            info!(
                to = %sms.to,
                gateway = display_index,
                retry = sms.retry_count,
                "dispatching SMS"
            );

            match self.attempt(gateway, &sms).await {
                Ok(response) => {
                    debug!(gateway = display_index, %response, "gateway accepted message");
                    self.inner.log.append(LogEntry {
                        timestamp: Utc::now(),
                        to: sms.to,
                        message: sms.message,
                        status: SendStatus::Sent,
                        response: response.to_string(),
                        gateway: display_index,
                    });
                }
                Err(err) => {
                    warn!(gateway = display_index, error = %err, "send attempt failed");
                    self.inner.log.append(LogEntry {
                        timestamp: Utc::now(),
                        to: sms.to.clone(),
                        message: sms.message.clone(),
                        status: SendStatus::Error {
                            retry: sms.retry_count,
                        },
                        response: err.to_string(),
                        gateway: display_index,
                    });

                    if sms.retry_count < RETRY_CEILING {
                        sms.retry_count += 1;
                        // Front of the queue: the retry runs on the very
                        // next iteration, ahead of the backlog.
                        self.queue().push_front(sms);
                    } else {
                        warn!(to = %sms.to, "retry ceiling reached, dropping message");
                    }
                }
            }

            // Rotation advances once per iteration — success, failure,
            // or drop alike.
            self.inner
                .rotation
                .store((index + 1) % self.inner.registry.len(), Ordering::SeqCst);

            // Throttle outbound traffic; no pause after the final message.
            if !self.queue().is_empty() {
                tokio::time::sleep(self.inner.send_delay).await;
            }
        }
    }

    /// Authenticate against the gateway, then submit the message.
    ///
    /// A fresh token is requested for every attempt; the token cached on
    /// the gateway record is written on success but never read back.
    /// Authentication failure short-circuits — no send is attempted and
    /// the retry policy treats it exactly like a send failure.
    async fn attempt(
        &self,
        gateway: &Gateway,
        sms: &QueuedSms,
    ) -> Result<serde_json::Value, ApiError> {
        let auth = self
            .inner
            .client
            .login(gateway.url(), gateway.username(), gateway.password())
            .await?;
        gateway.store_token(auth.token.clone(), auth.expires);

        self.inner
            .client
            .send_sms(
                gateway.url(),
                &auth.token,
                &sms.to,
                &sms.message,
                gateway.modem(),
            )
            .await
    }
}
