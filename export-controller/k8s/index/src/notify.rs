use crate::{metrics::PushMetrics, registry::EndpointRegistry};
use ahash::AHashMap as HashMap;
use linkerd_export_controller_core::{Endpoint, ServiceRef};
use parking_lot::Mutex;
use std::{fmt, sync::Arc};
use tokio::sync::{mpsc, Notify};

/// Instructs the push pipeline to recompute and redeliver a service's endpoints to every
/// interested proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushSignal {
    pub service: ServiceRef,
    pub hostname: String,

    /// The service's full endpoint set. Per-proxy visibility is applied by the pipeline.
    pub endpoints: Vec<Endpoint>,

    /// The export state at the time the signal was built.
    pub exported: bool,
}

/// Receives push signals. Delivery is the sink's responsibility.
pub trait PushSink: Send + Sync {
    fn push(&self, signal: PushSignal);
}

/// Turns export transitions into push signals.
///
/// Each service has at most one pending notification. A transition that arrives while one is
/// pending overwrites it, so that a burst of transitions yields a single signal carrying the
/// settled state.
pub struct Notifier {
    registry: Arc<dyn EndpointRegistry>,
    sink: Arc<dyn PushSink>,
    pending: Mutex<HashMap<ServiceRef, bool>>,
    wake: Notify,
    metrics: PushMetrics,
}

// === impl Notifier ===

impl Notifier {
    pub fn new(
        registry: Arc<dyn EndpointRegistry>,
        sink: Arc<dyn PushSink>,
        metrics: PushMetrics,
    ) -> Self {
        Self {
            registry,
            sink,
            pending: Mutex::new(HashMap::new()),
            wake: Notify::new(),
            metrics,
        }
    }

    /// Records that a service's exported flag changed. Never blocks on the registry or the sink.
    pub fn on_export_change(&self, service: ServiceRef, exported: bool) {
        let queued = self.enqueue(service.clone(), exported);
        self.enqueued(&service, exported, queued);
    }

    /// Writes the pending slot for a service, returning true if no notification was pending.
    ///
    /// Only the pending map is locked, so this may be called while the export record is held.
    pub(crate) fn enqueue(&self, service: ServiceRef, exported: bool) -> bool {
        self.pending.lock().insert(service, exported).is_none()
    }

    /// Completes a [`Notifier::enqueue`] by waking the dispatcher, or by recording that the
    /// transition was folded into an already pending notification.
    pub(crate) fn enqueued(&self, service: &ServiceRef, exported: bool, queued: bool) {
        if !queued {
            tracing::debug!(%service, exported, "coalescing pending push");
            self.metrics.coalesced.inc();
            return;
        }
        self.wake.notify_one();
    }

    /// Returns the number of services with an undispatched notification.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns the pending export state for a service, if a notification is queued.
    pub fn pending_state(&self, service: &ServiceRef) -> Option<bool> {
        self.pending.lock().get(service).copied()
    }

    /// Builds and emits a signal for every pending notification, returning the number of signals
    /// emitted.
    ///
    /// The pending set is detached before the registry is consulted so that transitions observed
    /// during dispatch are queued for the next round.
    pub fn dispatch_pending(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut sent = 0;
        for (service, exported) in pending {
            let endpoints = match self.registry.endpoints(&service) {
                Ok(endpoints) => endpoints,
                Err(error) => {
                    tracing::warn!(%service, %error, "Failed to resolve endpoints; skipping push");
                    self.metrics.resolve_errors.inc();
                    continue;
                }
            };
            let hostname = self.registry.hostname(&service);
            tracing::debug!(%service, %hostname, endpoints = endpoints.len(), exported, "pushing");
            self.sink.push(PushSignal {
                service,
                hostname,
                endpoints,
                exported,
            });
            self.metrics.signals.inc();
            sent += 1;
        }
        sent
    }

    /// Dispatches pending notifications as they are recorded. Runs for the lifetime of the process.
    pub async fn run(self: Arc<Self>) {
        loop {
            self.wake.notified().await;
            let sent = self.dispatch_pending();
            tracing::trace!(sent, "dispatched pending pushes");
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

// === impl PushSink ===

impl PushSink for mpsc::UnboundedSender<PushSignal> {
    fn push(&self, signal: PushSignal) {
        if let Err(mpsc::error::SendError(signal)) = self.send(signal) {
            tracing::error!(service = %signal.service, "Push pipeline closed; dropping signal");
        }
    }
}
