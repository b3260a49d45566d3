//! The event reactor: dispatch loop, handler resolution, timer wheel and
//! selectable set (§4). See `SPEC_FULL.md` at the workspace root for the
//! full design this module implements.

pub mod attachments;
pub mod collector;
pub mod controller;
pub mod entity;
pub mod event;
pub mod handle;
pub mod handler;
pub mod selectable;
pub mod selector;
pub mod timer;

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use collector::Collector;
use entity::{Connection, Task};
use event::{Context, Event, EventType};
use handler::Handler;
use selectable::{SelectableHooks, SelectableRef};
use timer::Timer;

/// Default `work()` timeout when nothing nearer is scheduled: a
/// long-but-bounded wait rather than an unbounded block.
const DEFAULT_TIMEOUT_MS: u64 = 60 * 60 * 1000;

/// Constructor parameters for a [`Reactor`]. Configuration flows through
/// constructor parameters and a caller-supplied handler rather than
/// on-disk config (§6: "No CLI, no env vars, no on-disk state").
#[derive(Clone, Debug)]
pub struct ReactorConfig {
    /// Initial capacity hint for the selectable set (children list).
    pub selectable_capacity: usize,
    /// Default timeout, in milliseconds, `run()` passes to each `work()`
    /// call. Individual `work(timeout_ms)` calls may override it.
    pub default_timeout_ms: u64,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        ReactorConfig {
            selectable_capacity: 16,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// A callback invoked after user handlers see `CONNECTION_FINAL`, exactly
/// once per connection (§4.2). The dispatch loop guarantees the call; what
/// it does (release transport selectables, detach from children) is up to
/// the host.
pub type ConnectionFinalHook = Box<dyn Fn(&Connection)>;

/// The root aggregate's mutable loop state plus owned collaborators (§3).
pub struct ReactorInner {
    collector: Collector,
    timer: Timer,
    global_handler: Option<Rc<RefCell<dyn Handler>>>,
    root_handler: Option<Rc<RefCell<dyn Handler>>>,
    children: Vec<SelectableRef>,
    connection_final_hook: Option<ConnectionFinalHook>,

    now: Instant,
    previous: Option<EventType>,
    selectables: usize,
    timeout_ms: u64,
    yield_flag: bool,
    timer_selectable: Option<SelectableRef>,
    explicit_now: bool,
    startup_quiesce_pending: bool,
}

/// The event reactor. Cheap to clone (an `Rc` to shared loop state); a
/// clone and the original refer to the same reactor, matching the "weak
/// back-reference" ownership model entities use to point back at it.
#[derive(Clone)]
pub struct Reactor(Rc<RefCell<ReactorInner>>);

struct TimerHooks;

impl SelectableHooks for TimerHooks {
    fn expired(&mut self, selectable: &SelectableRef) {
        let Some(reactor) = selectable.reactor().and_then(|weak| weak.upgrade()) else {
            return;
        };
        let reactor = Reactor::from_inner(reactor);

        let now = reactor.now();
        let fired = reactor.0.borrow_mut().timer.tick(now);
        for task in fired {
            reactor.put(EventType::TimerTask, Context::Task(task));
        }
        let deadline = reactor.0.borrow().timer.deadline();
        selectable.set_deadline(deadline);
        reactor.update(selectable);
    }
}

impl Reactor {
    pub fn new(config: ReactorConfig) -> Self {
        Reactor(Rc::new(RefCell::new(ReactorInner {
            collector: Collector::new(),
            timer: Timer::new(),
            global_handler: None,
            root_handler: None,
            children: Vec::with_capacity(config.selectable_capacity),
            connection_final_hook: None,
            now: Instant::now(),
            previous: None,
            selectables: 0,
            timeout_ms: config.default_timeout_ms,
            yield_flag: false,
            timer_selectable: None,
            explicit_now: false,
            startup_quiesce_pending: true,
        })))
    }

    pub(crate) fn from_inner(inner: Rc<RefCell<ReactorInner>>) -> Self {
        Reactor(inner)
    }

    pub fn downgrade(&self) -> Weak<RefCell<ReactorInner>> {
        Rc::downgrade(&self.0)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn set_global_handler(&self, handler: Rc<RefCell<dyn Handler>>) {
        self.0.borrow_mut().global_handler = Some(handler);
    }

    pub fn set_root_handler(&self, handler: Rc<RefCell<dyn Handler>>) {
        self.0.borrow_mut().root_handler = Some(handler);
    }

    pub fn set_connection_final_hook(&self, hook: ConnectionFinalHook) {
        self.0.borrow_mut().connection_final_hook = Some(hook);
    }

    pub fn now(&self) -> Instant {
        self.0.borrow().now
    }

    pub fn previous(&self) -> Option<EventType> {
        self.0.borrow().previous
    }

    pub fn timeout(&self) -> u64 {
        self.0.borrow().timeout_ms
    }

    pub fn pending(&self) -> usize {
        self.0.borrow().collector.len()
    }

    /// Refresh `now` from the monotonic clock (§4.6).
    pub fn mark(&self) {
        self.0.borrow_mut().now = Instant::now();
    }

    /// Test-only: set `now` directly, so scenario tests can advance a fake
    /// clock deterministically instead of racing the real one. The next
    /// `process()` call honors this value instead of overwriting it with
    /// the real clock, so a matured deadline is actually observed.
    #[cfg(any(test, feature = "test"))]
    pub fn mark_at(&self, instant: Instant) {
        let mut inner = self.0.borrow_mut();
        inner.now = instant;
        inner.explicit_now = true;
    }

    /// Request cooperative cancellation. Honored only when there is a next
    /// event to dispatch (§4.1).
    pub fn yield_now(&self) {
        self.0.borrow_mut().yield_flag = true;
    }

    fn put(&self, event_type: EventType, context: Context) {
        self.0
            .borrow_mut()
            .collector
            .put(Event::new(event_type, context));
    }

    /// Publish an event into the collector (§6 Collector contract: `put`).
    /// This is the entry point an external collaborator — the AMQP
    /// transport/protocol layer, or any other pass-through event producer —
    /// uses to feed the dispatch loop, e.g. a freshly-constructed
    /// connection's `CONNECTION_INIT`.
    pub fn put_event(&self, event_type: EventType, context: Context) {
        self.put(event_type, context);
    }

    /// `pni_reactor_more()`: is there still work (pending timers, or any
    /// selectable besides the always-present timer selectable)? Monotone
    /// (§8.3): once it returns `false` it stays `false` until a new
    /// selectable is registered or a new task scheduled.
    ///
    /// A freshly started reactor with nothing registered beyond the timer
    /// still owes the host exactly one `REACTOR_QUIESCED` before it can
    /// report itself fully drained — `startup_quiesce_pending` covers that
    /// one-time grace window between `start()` and the first quiesce.
    pub fn more(&self) -> bool {
        let inner = self.0.borrow();
        inner.timer.tasks() > 0 || inner.selectables > 1 || inner.startup_quiesce_pending
    }

    /// Register a new selectable, publish `SELECTABLE_INIT`, and add it to
    /// the children list (§4.4).
    pub fn register_selectable(
        &self,
        hooks: Rc<RefCell<dyn SelectableHooks>>,
    ) -> SelectableRef {
        let selectable = SelectableRef::create(hooks);
        selectable.set_reactor(self.downgrade());
        self.put(EventType::SelectableInit, Context::Selectable(selectable.clone()));
        {
            let mut inner = self.0.borrow_mut();
            inner.children.push(selectable.clone());
            inner.selectables += 1;
        }
        log::debug!(target: "reactor::selectable", "registered selectable");
        selectable
    }

    /// Notify the reactor that a selectable's state may have changed
    /// (§4.4). Idempotent past the first terminal transition.
    pub fn update(&self, selectable: &SelectableRef) {
        if selectable.already_finalized() {
            return;
        }
        if selectable.is_terminal() {
            selectable.mark_finalized();
            log::debug!(target: "reactor::selectable", "selectable became terminal");
            self.put(EventType::SelectableFinal, Context::Selectable(selectable.clone()));
        } else {
            self.put(EventType::SelectableUpdated, Context::Selectable(selectable.clone()));
        }
    }

    /// Actually remove a selectable from the children list and run its
    /// release hook. Only ever called once per selectable, from
    /// `post_dispatch` right after handlers have observed
    /// `SELECTABLE_FINAL` (§4.4: "must precede actual release").
    fn release_selectable(&self, selectable: &SelectableRef) {
        let mut inner = self.0.borrow_mut();
        let before = inner.children.len();
        inner.children.retain(|s| !s.ptr_eq(selectable));
        if inner.children.len() < before {
            inner.selectables -= 1;
        }
        drop(inner);
        selectable.release();
    }

    /// Schedule `handler` to run after `delay_ms` (§4.5). Returns the task
    /// handle; its deadline is `reactor.now() + delay_ms`, computed from
    /// the single `now` snapshot taken at the last `mark()`/`process()`
    /// entry, per the ordering-reproducibility rule in §4.5.
    pub fn schedule(&self, delay_ms: u64, handler: Rc<RefCell<dyn Handler>>) -> Task {
        let task = Task::new();
        task.set_handler(handler);
        task.set_reactor(self.downgrade());

        let deadline = {
            let mut inner = self.0.borrow_mut();
            let deadline = inner.now + Duration::from_millis(delay_ms);
            inner.timer.schedule(deadline, task.clone());
            deadline
        };
        log::trace!(target: "reactor::timer", "scheduled task for {:?}", deadline);

        let timer_selectable = self.0.borrow().timer_selectable.clone();
        let selectable = match timer_selectable {
            Some(selectable) => selectable,
            None => {
                // The timer selectable was already reaped by a prior idle
                // drain; re-register it so this task's deadline can still
                // be observed by `check_timer_expiry`.
                let hooks: Rc<RefCell<dyn SelectableHooks>> = Rc::new(RefCell::new(TimerHooks));
                let selectable = self.register_selectable(hooks);
                self.0.borrow_mut().timer_selectable = Some(selectable.clone());
                selectable
            }
        };
        let next = self.0.borrow().timer.deadline();
        selectable.set_deadline(next);
        self.update(&selectable);
        task
    }

    /// `start()`: enqueue `REACTOR_INIT` and register the always-present
    /// timer selectable (§4.6).
    pub fn start(&self) {
        log::info!(target: "reactor", "starting");
        self.put(EventType::ReactorInit, Context::Reactor(self.downgrade()));

        let hooks: Rc<RefCell<dyn SelectableHooks>> = Rc::new(RefCell::new(TimerHooks));
        let selectable = self.register_selectable(hooks);
        let deadline = self.0.borrow().timer.deadline();
        selectable.set_deadline(deadline);
        self.0.borrow_mut().timer_selectable = Some(selectable);
    }

    /// `work(timeout_ms)`: store the timeout and run `process()`.
    pub fn work(&self, timeout_ms: u64) -> bool {
        self.0.borrow_mut().timeout_ms = timeout_ms;
        self.process()
    }

    /// `start(); while work(1000) {}; stop();`
    pub fn run(&self) {
        self.start();
        while self.work(1000) {}
        self.stop();
    }

    /// `stop()`: enqueue `REACTOR_FINAL`, drain via `process()`, then
    /// release the collector. Idempotent (§7): after the first drain the
    /// collector is released and repeat calls are no-ops.
    pub fn stop(&self) -> bool {
        if self.0.borrow().collector.is_empty() && self.0.borrow().previous == Some(EventType::ReactorFinal) {
            return false;
        }
        log::info!(target: "reactor", "stopping");
        self.put(EventType::ReactorFinal, Context::Reactor(self.downgrade()));
        let mut more_work = true;
        while more_work {
            more_work = self.process();
            if self.0.borrow().previous == Some(EventType::ReactorFinal) {
                break;
            }
        }
        self.0.borrow_mut().collector.release();
        true
    }

    fn pre_dispatch(&self, event: &Event) {
        if event.event_type() == EventType::ConnectionInit {
            if let Context::Connection(connection) = event.context() {
                connection.set_reactor(self.downgrade());
                log::trace!(target: "reactor", "bound connection to reactor on CONNECTION_INIT");
            }
        }
    }

    fn post_dispatch(&self, event: &Event) {
        match event.event_type() {
            EventType::ConnectionFinal => {
                if let Context::Connection(connection) = event.context() {
                    let inner = self.0.borrow();
                    if let Some(hook) = inner.connection_final_hook.as_ref() {
                        hook(connection);
                    }
                }
            }
            EventType::SelectableFinal => {
                if let Context::Selectable(selectable) = event.context() {
                    self.release_selectable(selectable);
                }
            }
            _ => {}
        }
    }

    /// Fire the timer selectable's `expired` hook if its nearest deadline
    /// has matured against the current `now` (§4.5). This is the one
    /// concrete path that drives `schedule()`d tasks to delivery — nothing
    /// else in the dispatch loop calls `SelectableRef::expired`.
    fn check_timer_expiry(&self) {
        let (timer_selectable, now, deadline) = {
            let inner = self.0.borrow();
            (inner.timer_selectable.clone(), inner.now, inner.timer.deadline())
        };
        if let (Some(selectable), Some(deadline)) = (timer_selectable, deadline) {
            if now >= deadline {
                selectable.expired();
            }
        }
    }

    /// The dispatch loop (§4.1). Returns `true` while the reactor still
    /// has potential work, `false` once it is fully drained.
    fn process(&self) -> bool {
        // `mark_at` (test-only) sets an explicit `now` for this cycle; honor
        // it once instead of clobbering it with the real clock immediately.
        let explicit_now = {
            let mut inner = self.0.borrow_mut();
            std::mem::replace(&mut inner.explicit_now, false)
        };
        if !explicit_now {
            self.mark();
        }
        self.check_timer_expiry();

        // Frozen for the whole call: a reactor with nothing but the timer
        // selectable registered still owes exactly one REACTOR_QUIESCED
        // before it may report itself drained. Reading this off `more()`
        // live (instead of a snapshot) would let the flag-clear below race
        // the second "queue empty" check within this same call and skip
        // straight past the quiesce into teardown.
        let startup_quiesce_pending = self.0.borrow().startup_quiesce_pending;
        let mut previous: Option<EventType> = None;

        loop {
            let event = self.0.borrow().collector.peek().cloned();

            match event {
                Some(event) => {
                    if self.0.borrow().yield_flag {
                        self.0.borrow_mut().yield_flag = false;
                        return true;
                    }
                    // Already false here; kept to mirror the observable
                    // flag-clear sequence.
                    self.0.borrow_mut().yield_flag = false;

                    self.pre_dispatch(&event);

                    if let Some(handler) = handler::resolve(&event) {
                        handler.borrow_mut().dispatch(&event);
                    } else if let Some(root) = self.0.borrow().root_handler.clone() {
                        root.borrow_mut().dispatch(&event);
                    }
                    if let Some(global) = self.0.borrow().global_handler.clone() {
                        global.borrow_mut().dispatch(&event);
                    }

                    self.post_dispatch(&event);

                    previous = Some(event.event_type());
                    self.0.borrow_mut().previous = Some(event.event_type());

                    self.0.borrow_mut().collector.pop();
                }
                None if self.more() || startup_quiesce_pending => {
                    let reactor_previous = self.0.borrow().previous;
                    if previous != Some(EventType::ReactorQuiesced)
                        && reactor_previous != Some(EventType::ReactorFinal)
                    {
                        log::trace!(target: "reactor", "quiescing");
                        self.put(EventType::ReactorQuiesced, Context::Reactor(self.downgrade()));
                        self.0.borrow_mut().startup_quiesce_pending = false;
                        continue;
                    } else {
                        return true;
                    }
                }
                None => {
                    let timer_selectable = self.0.borrow().timer_selectable.clone();
                    if let Some(selectable) = timer_selectable {
                        selectable.terminate();
                        self.update(&selectable);
                        self.0.borrow_mut().timer_selectable = None;
                        continue;
                    } else {
                        log::trace!(target: "reactor", "drained");
                        return false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log(Rc<RefCell<Vec<EventType>>>);
    impl Handler for Log {
        fn dispatch(&mut self, event: &Event) {
            self.0.borrow_mut().push(event.event_type());
        }
    }

    #[test]
    fn s1_empty_run_emits_expected_sequence() {
        let reactor = Reactor::new(ReactorConfig::default());
        let log = Rc::new(RefCell::new(Vec::new()));
        reactor.set_global_handler(Rc::new(RefCell::new(Log(log.clone()))));

        reactor.start();
        while reactor.work(1000) {}
        reactor.stop();

        assert_eq!(
            *log.borrow(),
            vec![
                EventType::ReactorInit,
                EventType::SelectableInit,
                EventType::ReactorQuiesced,
                EventType::SelectableFinal,
                EventType::ReactorFinal,
            ]
        );
    }

    #[test]
    fn quiesced_events_are_never_adjacent() {
        let reactor = Reactor::new(ReactorConfig::default());
        let log = Rc::new(RefCell::new(Vec::new()));
        reactor.set_global_handler(Rc::new(RefCell::new(Log(log.clone()))));

        reactor.start();
        while reactor.work(1000) {}
        reactor.stop();

        let events = log.borrow();
        for window in events.windows(2) {
            assert!(!(window[0] == EventType::ReactorQuiesced && window[1] == EventType::ReactorQuiesced));
        }
    }

    #[test]
    fn double_stop_is_a_noop() {
        let reactor = Reactor::new(ReactorConfig::default());
        reactor.start();
        while reactor.work(1000) {}
        assert!(reactor.stop());
        assert!(!reactor.stop());
    }

    #[test]
    fn scheduled_task_delivers_exactly_once() {
        let reactor = Reactor::new(ReactorConfig::default());
        let log = Rc::new(RefCell::new(Vec::new()));
        reactor.start();

        let handler: Rc<RefCell<dyn Handler>> = Rc::new(RefCell::new(Log(log.clone())));
        reactor.schedule(50, handler);

        let later = reactor.now() + Duration::from_millis(50);
        reactor.mark_at(later);
        while reactor.work(1000) {
            reactor.mark_at(later);
        }

        assert_eq!(*log.borrow(), vec![EventType::TimerTask]);
    }

    #[test]
    fn connection_init_binds_reactor_weakref() {
        let reactor = Reactor::new(ReactorConfig::default());
        reactor.start();
        let connection = Connection::new();
        assert!(connection.reactor().is_none());

        reactor.put_event(EventType::ConnectionInit, Context::Connection(connection.clone()));
        while reactor.work(1000) {}

        let bound = connection.reactor().and_then(|w| w.upgrade());
        assert!(bound.is_some());
        assert!(Reactor::from_inner(bound.unwrap()).ptr_eq(&reactor));
        reactor.stop();
    }

    #[test]
    fn yield_mid_dispatch_returns_true_and_resumes() {
        let reactor = Reactor::new(ReactorConfig::default());

        struct Yielder(Reactor);
        impl Handler for Yielder {
            fn dispatch(&mut self, _event: &Event) {
                self.0.yield_now();
            }
        }

        reactor.start();
        reactor.set_global_handler(Rc::new(RefCell::new(Yielder(reactor.clone()))));
        reactor.put_event(EventType::Custom(1), Context::Task(Task::new()));
        reactor.put_event(EventType::Custom(2), Context::Task(Task::new()));

        // Drain the initial REACTOR_INIT + SELECTABLE_INIT first.
        assert!(reactor.work(1000));
        assert!(reactor.work(1000));
        // Custom(1) dispatch sets yield; process() returns true right after.
        let resumed = reactor.work(1000);
        assert!(resumed);
        reactor.stop();
    }

    struct NoopHooks;
    impl SelectableHooks for NoopHooks {}

    /// §8 invariant 3: `more()` is monotone once it goes false, unless new
    /// work is registered — here, a freshly scheduled task.
    #[qcheck_macros::quickcheck]
    fn prop_more_is_monotone_until_new_work(delay_ms: u8) -> qcheck::TestResult {
        let reactor = Reactor::new(ReactorConfig::default());
        reactor.start();
        while reactor.work(1000) {}
        if reactor.more() {
            return qcheck::TestResult::discard();
        }

        let handler: Rc<RefCell<dyn Handler>> = Rc::new(RefCell::new(Log::default()));
        reactor.schedule(delay_ms as u64, handler);
        qcheck::TestResult::from_bool(reactor.more())
    }

    /// §8 invariant 1: every registered selectable's event sequence matches
    /// `INIT . UPDATED* . FINAL?`, with `FINAL` iff it ever became terminal.
    #[test]
    fn selectable_event_sequence_matches_init_updated_final() {
        let reactor = Reactor::new(ReactorConfig::default());
        let log = Rc::new(RefCell::new(Vec::new()));
        reactor.set_global_handler(Rc::new(RefCell::new(Log(log.clone()))));
        reactor.start();

        let hooks: Rc<RefCell<dyn SelectableHooks>> = Rc::new(RefCell::new(NoopHooks));
        let selectable = reactor.register_selectable(hooks);
        reactor.update(&selectable);
        reactor.update(&selectable);
        selectable.terminate();
        reactor.update(&selectable);
        // Idempotent past the first terminal transition (§4.4).
        reactor.update(&selectable);

        while reactor.work(1000) {}
        reactor.stop();

        let events: Vec<EventType> = log
            .borrow()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    EventType::SelectableInit | EventType::SelectableUpdated | EventType::SelectableFinal
                )
            })
            .cloned()
            .collect();

        // Two selectables are live here (timer + ours); events from each
        // interleave in registration/update order but every selectable's
        // own subsequence still matches INIT . UPDATED* . FINAL? — check
        // ours specifically by counting: one INIT, two UPDATED, one FINAL.
        let inits = events.iter().filter(|e| **e == EventType::SelectableInit).count();
        let finals = events.iter().filter(|e| **e == EventType::SelectableFinal).count();
        let updates = events.iter().filter(|e| **e == EventType::SelectableUpdated).count();
        assert_eq!(inits, 2); // timer selectable + ours
        assert_eq!(finals, 2); // both eventually terminate
        assert!(updates >= 2); // our two explicit updates before terminal
    }
}
