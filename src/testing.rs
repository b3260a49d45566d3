//! Test-only helpers: a logging bootstrap and a recording [`Handler`] used
//! by this crate's own unit/integration tests, and exposed to downstream
//! crates (behind the `test` feature) that want to drive a [`Reactor`]
//! deterministically in their own tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use crate::reactor::event::{Event, EventType};
use crate::reactor::handler::Handler;

#[cfg(test)]
static INIT_LOGGER: Once = Once::new();

/// Install `env_logger` once per process. Call at the top of a test that
/// wants to see `log`-facade output with `--nocapture`. Only available in
/// this crate's own test builds: `env_logger` is a dev-dependency, so a
/// downstream crate building with the `test` feature (but not `cfg(test)`)
/// would not have it.
#[cfg(test)]
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// A handler that records every event type it sees, in dispatch order.
/// Used by scenario tests to assert the exact sequence §8 specifies.
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<EventType>>>);

impl EventLog {
    pub fn new() -> Self {
        EventLog::default()
    }

    pub fn events(&self) -> Vec<EventType> {
        self.0.borrow().clone()
    }

    pub fn as_handler(&self) -> Rc<RefCell<dyn Handler>> {
        Rc::new(RefCell::new(self.clone()))
    }
}

impl Handler for EventLog {
    fn dispatch(&mut self, event: &Event) {
        self.0.borrow_mut().push(event.event_type());
    }
}
