//! A concrete, default I/O selector. The I/O selector contract (§6) is
//! consumed by an external driver: this module supplies one working
//! implementation over `mio`, wiring registered sources into a `mio::Poll`
//! the way a host loop would, so the crate is runnable end-to-end without
//! forcing every host to write its own selector from scratch. A host is
//! free to drive `Reactor::update` from a different I/O facility entirely;
//! nothing in `reactor.rs` depends on this module.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};
use thiserror::Error;

use super::selectable::SelectableRef;
use super::Reactor;

/// The one real fallible surface outside handler-land: registering a
/// resource with the OS selector.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("registering resource with the I/O selector failed: {0}")]
    Io(#[from] io::Error),
}

/// The trait boundary for host-driven ready-set computation (§6).
/// `MioSelector` is the one concrete implementation this crate ships; a
/// host may substitute its own (e.g. a deterministic fake in tests) as
/// long as it drives `Reactor::update` the same way.
pub trait Selector {
    /// Block for up to `timeout` waiting for readiness, then run the
    /// affected selectables' `readable`/`writable` hooks and notify the
    /// reactor via `Reactor::update` for each one (§4.4).
    fn poll(&mut self, reactor: &Reactor, timeout: Option<Duration>) -> io::Result<()>;
}

/// Maps `mio` readiness back to the selectable it was registered for, and
/// forwards it into `Reactor::update`.
pub struct MioSelector {
    poll: Poll,
    tokens: HashMap<Token, SelectableRef>,
    next_token: usize,
}

impl MioSelector {
    pub fn new() -> io::Result<Self> {
        Ok(MioSelector {
            poll: Poll::new()?,
            tokens: HashMap::new(),
            next_token: 1,
        })
    }

    /// Register a raw I/O source, associating it with a reactor selectable.
    /// Returns the token assigned, which the caller should hold onto if it
    /// later needs to `deregister`.
    pub fn register(
        &mut self,
        source: &mut dyn Source,
        selectable: SelectableRef,
        interest: Interest,
    ) -> Result<Token, RegisterError> {
        let token = Token(self.next_token);
        self.next_token += 1;
        self.poll.registry().register(source, token, interest)?;
        self.tokens.insert(token, selectable);
        Ok(token)
    }

    pub fn reregister(
        &mut self,
        source: &mut dyn Source,
        token: Token,
        interest: Interest,
    ) -> Result<(), RegisterError> {
        self.poll.registry().reregister(source, token, interest)?;
        Ok(())
    }

    pub fn deregister(&mut self, source: &mut dyn Source, token: Token) -> io::Result<()> {
        self.tokens.remove(&token);
        self.poll.registry().deregister(source)
    }
}

impl Selector for MioSelector {
    /// Block for up to `timeout` waiting for readiness, then run the
    /// corresponding `readable`/`writable` hooks and feed the result into
    /// `reactor.update` for each affected selectable, exactly as §4.4
    /// describes for externally-driven updates.
    fn poll(&mut self, reactor: &Reactor, timeout: Option<Duration>) -> io::Result<()> {
        let mut events = Events::with_capacity(1024);
        self.poll.poll(&mut events, timeout)?;

        for event in events.iter() {
            let Some(selectable) = self.tokens.get(&event.token()).cloned() else {
                log::warn!(target: "reactor::selector", "readiness for unknown token {:?}", event.token());
                continue;
            };
            if event.is_readable() {
                selectable.readable();
            }
            if event.is_writable() {
                selectable.writable();
            }
            reactor.update(&selectable);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A selector that never reports readiness; used to confirm the trait
    /// object boundary compiles and a host's own fake can stand in for
    /// `MioSelector` in tests.
    struct NeverReady;
    impl Selector for NeverReady {
        fn poll(&mut self, _reactor: &Reactor, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn fake_selector_satisfies_the_trait_object_boundary() {
        let reactor = Reactor::new(crate::reactor::ReactorConfig::default());
        let mut selector: Box<dyn Selector> = Box::new(NeverReady);
        reactor.start();
        assert!(selector.poll(&reactor, Some(Duration::from_millis(0))).is_ok());
        reactor.stop();
    }
}
