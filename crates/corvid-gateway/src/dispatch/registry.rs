//! Handler registry
//!
//! Handlers are indexed by [`EventKind`]. Each registration owns a FIFO worker
//! task, so a slow handler never blocks the read loop and one registration
//! sees events in the order they were dispatched. Different registrations run
//! concurrently.

use corvid_core::{Event, EventKind, EventPayload};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error};

use super::Context;

type Job = BoxFuture<'static, ()>;
type BoxedHandler = Box<dyn Fn(Context, &Event) -> Option<Job> + Send + Sync>;

/// Returned by registration; pass to [`HandlerRegistry::unregister`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerToken(u64);

struct Registration {
    id: u64,
    kind: Option<EventKind>,
    once: bool,
    fired: AtomicBool,
    handler: BoxedHandler,
    worker: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl Registration {
    fn enqueue(&self, job: Job) {
        let mut worker = self.worker.lock();
        let job = match worker.as_ref() {
            Some(tx) => match tx.send(job) {
                Ok(()) => return,
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(self.id, rx));
        // fresh channel with a live receiver
        let _ = tx.send(job);
        *worker = Some(tx);
    }
}

async fn run_worker(id: u64, mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            error!(handler = id, "Event handler panicked");
        }
    }
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn new(inflight: &Arc<InFlight>) -> Self {
        inflight.count.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(inflight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Event-kind indexed handler lists plus catch-all handlers
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: AtomicU64,
    by_kind: RwLock<HashMap<EventKind, Vec<Arc<Registration>>>>,
    any: RwLock<Vec<Arc<Registration>>>,
    inflight: Arc<InFlight>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` for every event with payload type `E`
    pub fn on<E, F, Fut>(&self, handler: F) -> HandlerToken
    where
        E: EventPayload,
        F: Fn(Context, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register_typed(handler, false)
    }

    /// Like [`on`](Self::on), removed after the first matching event
    pub fn once<E, F, Fut>(&self, handler: F) -> HandlerToken
    where
        E: EventPayload,
        F: Fn(Context, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register_typed(handler, true)
    }

    /// Run `handler` for every event, including ones without a typed payload
    pub fn on_any<F, Fut>(&self, handler: F) -> HandlerToken
    where
        F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: BoxedHandler =
            Box::new(move |ctx, event| Some(handler(ctx, event.clone()).boxed()));
        let registration = self.registration(None, false, boxed);
        let token = HandlerToken(registration.id);
        self.any.write().push(registration);
        token
    }

    fn register_typed<E, F, Fut>(&self, handler: F, once: bool) -> HandlerToken
    where
        E: EventPayload,
        F: Fn(Context, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: BoxedHandler = Box::new(move |ctx, event| {
            E::from_event(event).map(|payload| handler(ctx, payload.clone()).boxed())
        });
        let registration = self.registration(Some(E::KIND), once, boxed);
        let token = HandlerToken(registration.id);
        debug!(kind = %E::KIND, handler = token.0, once, "Handler registered");
        self.by_kind
            .write()
            .entry(E::KIND)
            .or_default()
            .push(registration);
        token
    }

    fn registration(
        &self,
        kind: Option<EventKind>,
        once: bool,
        handler: BoxedHandler,
    ) -> Arc<Registration> {
        Arc::new(Registration {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            once,
            fired: AtomicBool::new(false),
            handler,
            worker: Mutex::new(None),
        })
    }

    /// Remove a handler; false if it was already gone
    pub fn unregister(&self, token: HandlerToken) -> bool {
        let mut removed = false;
        {
            let mut by_kind = self.by_kind.write();
            for handlers in by_kind.values_mut() {
                let before = handlers.len();
                handlers.retain(|r| r.id != token.0);
                removed |= handlers.len() != before;
            }
            by_kind.retain(|_, handlers| !handlers.is_empty());
        }
        if !removed {
            let mut any = self.any.write();
            let before = any.len();
            any.retain(|r| r.id != token.0);
            removed = any.len() != before;
        }
        removed
    }

    /// Number of handlers registered for `kind`, not counting catch-alls
    pub fn count(&self, kind: EventKind) -> usize {
        self.by_kind.read().get(&kind).map_or(0, Vec::len)
    }

    /// Queue `event` on every matching handler, typed handlers first
    pub fn fan_out(&self, ctx: &Context, event: &Event) {
        let typed = self
            .by_kind
            .read()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        let any = self.any.read().clone();

        for registration in typed.iter().chain(any.iter()) {
            if registration.once {
                if registration.fired.swap(true, Ordering::AcqRel) {
                    continue;
                }
                self.remove_once(registration);
            }
            if let Some(job) = (registration.handler)(ctx.clone(), event) {
                let guard = InFlightGuard::new(&self.inflight);
                registration.enqueue(
                    async move {
                        let _guard = guard;
                        job.await;
                    }
                    .boxed(),
                );
            }
        }
    }

    fn remove_once(&self, registration: &Registration) {
        if let Some(kind) = registration.kind {
            if let Some(handlers) = self.by_kind.write().get_mut(&kind) {
                handlers.retain(|r| r.id != registration.id);
            }
        }
    }

    /// Handlers queued or running
    pub fn in_flight(&self) -> usize {
        self.inflight.count.load(Ordering::Acquire)
    }

    /// Wait until no handler is queued or running; false on timeout
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let idle = async {
            loop {
                let notified = self.inflight.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, idle).await.is_ok()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.by_kind.read().len())
            .field("any", &self.any.read().len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
