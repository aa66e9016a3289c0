//! The reactive layer.
//!
//! A `Reactor` owns the current published store and turns the pure engine
//! into a live data-flow system: writes queue change notifications for an
//! explicit `flush`, subscribers attach to expressions, and asynchronous
//! effects feed their resolutions back into the store on the reactor's
//! single-threaded executor.
//!
//! Everything runs on one logical task. The only suspension points are the
//! futures handed out by the result-promise operations and the effect
//! continuations parked in the local pool.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{LocalBoxFuture, Shared};
use futures::task::LocalSpawnExt;

use lattice_engine::{Evaluator, Registry};
use lattice_foundation::{Error, ErrorKind, Expr, FnId, LatSet, Result, TagId, Term, Value};
use lattice_store::{ResultCell, Store};

use crate::bridge::AsyncBridge;

/// A memoised asynchronous effect run.
///
/// Cloning shares the underlying future: every waiter observes the single
/// resolution of the one invocation.
pub type SharedRun = Shared<LocalBoxFuture<'static, Result<Value>>>;

type Callback = Rc<dyn Fn()>;

/// The live layer over a store: subscriptions, deferred notifications, and
/// async effect integration.
///
/// Cloning returns a handle to the same reactor.
#[derive(Clone)]
pub struct Reactor {
    inner: Rc<RefCell<Inner>>,
    pool: Rc<RefCell<LocalPool>>,
    spawner: LocalSpawner,
}

struct Inner {
    /// The current published store.
    db: Store,
    registry: Rc<Registry>,
    bridge: AsyncBridge,
    subscribers: HashMap<Expr, Vec<(u64, Callback)>>,
    /// Expressions whose subscribers are owed a notification.
    pending: LatSet<Expr>,
    /// Memoised effect runs keyed by their `(async/promise, fn, args…)`
    /// expression.
    runs: HashMap<Expr, SharedRun>,
    next_subscription: u64,
}

/// Handle returned by [`Reactor::subscribe`]; removes exactly the callback
/// it was created for.
#[derive(Debug)]
pub struct Subscription {
    inner: Weak<RefCell<Inner>>,
    expr: Expr,
    id: u64,
}

impl Subscription {
    /// Detaches the callback. Dropping the handle without calling this
    /// leaves the subscription active.
    pub fn unsubscribe(self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut guard = inner.borrow_mut();
        if let Some(bucket) = guard.subscribers.get_mut(&self.expr) {
            bucket.retain(|(id, _)| *id != self.id);
            if bucket.is_empty() {
                guard.subscribers.remove(&self.expr);
            }
        }
    }
}

impl Reactor {
    /// Creates a reactor over the given registry, installing the async
    /// bridge predicates into it.
    ///
    /// # Errors
    ///
    /// Returns an error if a bridge predicate name is already registered.
    pub fn new(mut registry: Registry) -> Result<Self> {
        let bridge = AsyncBridge::install(&mut registry)?;
        let pool = LocalPool::new();
        let spawner = pool.spawner();

        Ok(Self {
            inner: Rc::new(RefCell::new(Inner {
                db: Store::new(),
                registry: Rc::new(registry),
                bridge,
                subscribers: HashMap::new(),
                pending: LatSet::new(),
                runs: HashMap::new(),
                next_subscription: 0,
            })),
            pool: Rc::new(RefCell::new(pool)),
            spawner,
        })
    }

    /// Returns the installed bridge ids.
    #[must_use]
    pub fn bridge(&self) -> AsyncBridge {
        self.inner.borrow().bridge
    }

    /// Returns a snapshot of the current published store.
    #[must_use]
    pub fn store(&self) -> Store {
        self.inner.borrow().db.clone()
    }

    /// Writes a value, queuing notifications for the whole affected set
    /// (cascade consequences included).
    ///
    /// # Errors
    ///
    /// Propagates a cascade setter failure; writes completed before the
    /// failure remain committed.
    pub fn set(&self, expr: impl Into<Expr>, value: impl Into<Value>) -> Result<()> {
        Self::write(&self.inner, &expr.into(), value.into())
    }

    /// Applies a function to an expression's current value and writes the
    /// result back, queuing notifications like [`Reactor::set`].
    ///
    /// # Errors
    ///
    /// Propagates a failed read of the current value or a failed write.
    pub fn modify(&self, expr: impl Into<Expr>, f: impl FnOnce(Value) -> Value) -> Result<()> {
        let expr = expr.into();
        let (registry, db) = Self::snapshot(&self.inner);
        let mut ev = Evaluator::new(db, &registry);
        let outcome = ev.modify(&expr, f);
        Self::commit(&self.inner, ev, true);
        outcome
    }

    /// Resolves an expression against the current store, publishing any
    /// cache fills the evaluation produced.
    ///
    /// # Errors
    ///
    /// Same contract as [`Evaluator::get`].
    pub fn get(&self, expr: impl Into<Expr>) -> Result<Value> {
        Self::read(&self.inner, &expr.into())
    }

    /// Attaches a callback to an expression.
    ///
    /// The expression is evaluated once to seed its dependency edges; the
    /// value, and any failure, are deliberately discarded. The callback
    /// fires on every [`Reactor::flush`] whose pending set contains the
    /// expression.
    pub fn subscribe(&self, expr: impl Into<Expr>, callback: impl Fn() + 'static) -> Subscription {
        let expr = expr.into();
        let _ = Self::read(&self.inner, &expr);

        let mut guard = self.inner.borrow_mut();
        let id = guard.next_subscription;
        guard.next_subscription += 1;
        guard
            .subscribers
            .entry(expr.clone())
            .or_default()
            .push((id, Rc::new(callback)));

        Subscription {
            inner: Rc::downgrade(&self.inner),
            expr,
            id,
        }
    }

    /// Delivers the notifications queued since the last flush.
    ///
    /// Each subscribed callback is invoked at most once per flush; delivery
    /// order is unspecified.
    pub fn flush(&self) {
        Self::run_flush(&self.inner);
    }

    /// Starts an asynchronous effect call, or returns the already-memoised
    /// run for the same `(fn, args…)`.
    ///
    /// On first call the status cell is written to `async/executing` and
    /// the effect invoked; when its future resolves, the result and the
    /// `async/complete` status are written back and a flush is delivered.
    ///
    /// # Errors
    ///
    /// Returns `NotAsync` when the function is not a registered effect.
    pub fn ensure_async_run(&self, f: FnId, args: &[Term]) -> Result<SharedRun> {
        Self::start_run(&self.inner, &self.spawner, f, args)
    }

    /// Returns a future for an expression's value, resolving when the
    /// expression is ready.
    ///
    /// If the expression is ready now the future is already resolved (or
    /// already rejected, routing captured failures to rejection). If the
    /// readiness probe itself fails, the future is already rejected.
    /// Otherwise the reactor subscribes to the probe and completes the
    /// future on the flush that reports readiness, detaching afterwards.
    #[must_use]
    pub fn result_promise(&self, expr: impl Into<Expr>) -> LocalBoxFuture<'static, Result<Value>> {
        self.promise_for(&expr.into(), false)
    }

    /// Like [`Reactor::result_promise`], but also starts every async
    /// effect call the expression transitively waits on, now and on each
    /// later readiness check.
    #[must_use]
    pub fn ensured_result_promise(
        &self,
        expr: impl Into<Expr>,
    ) -> LocalBoxFuture<'static, Result<Value>> {
        self.promise_for(&expr.into(), true)
    }

    /// Drives parked effect continuations until no more progress can be
    /// made without external resolution.
    pub fn run_until_stalled(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn snapshot(inner: &Rc<RefCell<Inner>>) -> (Rc<Registry>, Store) {
        let guard = inner.borrow();
        (Rc::clone(&guard.registry), guard.db.clone())
    }

    /// Publishes an evaluator's store; a write additionally queues its
    /// affected set for notification.
    fn commit(inner: &Rc<RefCell<Inner>>, ev: Evaluator<'_>, notify: bool) {
        let (store, affected) = ev.finish();
        let mut guard = inner.borrow_mut();
        guard.db = store;
        if notify {
            guard.pending = guard.pending.union(&affected);
        }
    }

    fn write(inner: &Rc<RefCell<Inner>>, expr: &Expr, value: Value) -> Result<()> {
        let (registry, db) = Self::snapshot(inner);
        let mut ev = Evaluator::new(db, &registry);
        let outcome = ev.set(expr, value);
        Self::commit(inner, ev, true);
        outcome
    }

    /// Direct cell write for bridge bookkeeping: no cascade can apply to a
    /// tag-headed expression, so this skips the evaluator.
    fn write_cell(inner: &Rc<RefCell<Inner>>, expr: &Expr, cell: ResultCell) {
        let mut guard = inner.borrow_mut();
        let (store, affected) = guard.db.with_result(expr, cell);
        guard.db = store;
        guard.pending = guard.pending.union(&affected);
    }

    fn read(inner: &Rc<RefCell<Inner>>, expr: &Expr) -> Result<Value> {
        let (registry, db) = Self::snapshot(inner);
        let mut ev = Evaluator::new(db, &registry);
        let outcome = ev.get(expr);
        Self::commit(inner, ev, false);
        outcome
    }

    fn run_flush(inner: &Rc<RefCell<Inner>>) {
        let callbacks: Vec<Callback> = {
            let mut guard = inner.borrow_mut();
            let pending = std::mem::take(&mut guard.pending);
            let mut callbacks = Vec::new();
            for expr in pending.iter() {
                if let Some(bucket) = guard.subscribers.get(expr) {
                    callbacks.extend(bucket.iter().map(|(_, cb)| Rc::clone(cb)));
                }
            }
            callbacks
        };

        tracing::debug!(delivering = callbacks.len(), "flush");
        // The borrow is released: callbacks may re-enter the reactor.
        for callback in callbacks {
            callback();
        }
    }

    fn start_run(
        inner: &Rc<RefCell<Inner>>,
        spawner: &LocalSpawner,
        f: FnId,
        args: &[Term],
    ) -> Result<SharedRun> {
        let promise_key = AsyncBridge::promise_expr(f, args);
        {
            let guard = inner.borrow();
            if let Some(run) = guard.runs.get(&promise_key) {
                return Ok(run.clone());
            }
        }

        let effect = inner.borrow().registry.effect(f)?;
        let status_e = AsyncBridge::status_expr(f, args);
        Self::write_cell(
            inner,
            &status_e,
            ResultCell::Value(Value::Tag(TagId::EXECUTING)),
        );
        tracing::debug!(call = %AsyncBridge::call_expr(f, args), "effect started");

        let shared: SharedRun = effect(args).shared();
        inner
            .borrow_mut()
            .runs
            .insert(promise_key, shared.clone());

        let weak = Rc::downgrade(inner);
        let run = shared.clone();
        let result_e = AsyncBridge::result_expr(f, args);
        let continuation = async move {
            let outcome = run.await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let cell = match outcome {
                Ok(value) => ResultCell::Value(value),
                Err(err) => ResultCell::Thrown(err),
            };
            Self::write_cell(&inner, &result_e, cell);
            Self::write_cell(
                &inner,
                &status_e,
                ResultCell::Value(Value::Tag(TagId::COMPLETE)),
            );
            Self::run_flush(&inner);
        };
        spawner
            .spawn_local(continuation)
            .map_err(|e| Error::internal(format!("failed to spawn effect continuation: {e}")))?;

        Ok(shared)
    }

    /// Starts every async call the expression synchronously runs into,
    /// until a read stops surfacing calls that have not been started yet.
    fn ensure_transitive(inner: &Rc<RefCell<Inner>>, spawner: &LocalSpawner, expr: &Expr) {
        let mut seen: HashSet<Expr> = HashSet::new();
        loop {
            match Self::read(inner, expr) {
                Err(Error {
                    kind: ErrorKind::AsyncIncomplete(call),
                }) => {
                    if !seen.insert(call.clone()) {
                        // Already started: the call is executing and can
                        // only finish asynchronously.
                        break;
                    }
                    let Some(f) = call.head().and_then(Term::as_fn) else {
                        break;
                    };
                    let args: Vec<Term> = call.args().cloned().collect();
                    if Self::start_run(inner, spawner, f, &args).is_err() {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn promise_for(&self, expr: &Expr, ensure: bool) -> LocalBoxFuture<'static, Result<Value>> {
        let ready_e = self.inner.borrow().bridge.readiness_expr(expr);

        if ensure {
            Self::ensure_transitive(&self.inner, &self.spawner, expr);
        }

        match Self::read(&self.inner, &ready_e) {
            Err(err) => return futures::future::ready(Err(err)).boxed_local(),
            Ok(ready) if ready.is_truthy() => {
                let result = Self::read(&self.inner, expr);
                return futures::future::ready(result).boxed_local();
            }
            Ok(_) => {}
        }

        let (tx, rx) = oneshot::channel::<Result<Value>>();
        let tx = Rc::new(RefCell::new(Some(tx)));
        let sub_slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let weak = Rc::downgrade(&self.inner);
        let spawner = self.spawner.clone();
        let target = expr.clone();
        let probe = ready_e.clone();
        let tx_cb = Rc::clone(&tx);
        let slot_cb = Rc::clone(&sub_slot);

        let subscription = self.subscribe(ready_e, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if ensure {
                Self::ensure_transitive(&inner, &spawner, &target);
            }
            match Self::read(&inner, &probe) {
                Ok(ready) if ready.is_truthy() => {
                    let result = Self::read(&inner, &target);
                    if let Some(tx) = tx_cb.borrow_mut().take() {
                        let _ = tx.send(result);
                    }
                    if let Some(sub) = slot_cb.borrow_mut().take() {
                        sub.unsubscribe();
                    }
                }
                _ => {}
            }
        });
        *sub_slot.borrow_mut() = Some(subscription);

        rx.map(|received| match received {
            Ok(result) => result,
            Err(oneshot::Canceled) => {
                Err(Error::internal("reactor dropped before the result was ready"))
            }
        })
        .boxed_local()
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.inner.borrow();
        f.debug_struct("Reactor")
            .field("cached", &guard.db.len())
            .field("subscriptions", &guard.subscribers.len())
            .field("pending", &guard.pending.len())
            .field("runs", &guard.runs.len())
            .finish()
    }
}
