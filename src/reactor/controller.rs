//! Cross-thread wakeup mechanism (§5: "a second thread may only interact
//! with a reactor by mechanisms defined by the host application, typically
//! a thread-safe wakeup selectable"). This module supplies exactly such a
//! mechanism: a `crossbeam_channel` paired with an `mio::Waker`.
//!
//! The reactor core itself knows nothing about threads; `Controller` and
//! `WakeupSelectable` are an optional pair a host wires up like any other
//! selectable via `Reactor::register_selectable`.

use std::io;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use mio::Waker;

use super::selectable::{SelectableHooks, SelectableRef};
use super::Reactor;

/// A thunk queued from another thread, run on the reactor's own thread the
/// next time the paired `WakeupSelectable` observes readability.
type Command = Box<dyn FnOnce(&Reactor) + Send>;

enum Message {
    Command(Command),
    Shutdown,
}

/// Clonable handle used by other threads to wake and command the reactor.
#[derive(Clone)]
pub struct Controller {
    sender: Sender<Message>,
    waker: Arc<Waker>,
}

impl Controller {
    pub fn wake(&self) -> io::Result<()> {
        log::trace!(target: "reactor::controller", "waking the reactor");
        self.waker.wake()
    }

    /// Queue `command` to run on the reactor's thread, then wake it.
    pub fn command(&self, command: impl FnOnce(&Reactor) + Send + 'static) -> io::Result<()> {
        self.sender
            .send(Message::Command(Box::new(command)))
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        self.wake()
    }

    pub fn shutdown(&self) -> io::Result<()> {
        log::info!(target: "reactor::controller", "requesting reactor shutdown");
        self.sender
            .send(Message::Shutdown)
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        self.wake()
    }
}

/// The selectable half of the pair. Registered once with a reactor via
/// `Reactor::register_selectable`; its `readable` hook drains every queued
/// command and applies it.
pub struct WakeupSelectable {
    receiver: Receiver<Message>,
    shutdown_requested: bool,
}

impl WakeupSelectable {
    /// Build a fresh controller/selectable pair. `waker` must be registered
    /// with whatever I/O selector drives the host loop so that a call to
    /// `Controller::wake` actually produces readiness.
    pub fn new(waker: Arc<Waker>) -> (Controller, Self) {
        let (sender, receiver) = unbounded();
        (
            Controller { sender, waker },
            WakeupSelectable {
                receiver,
                shutdown_requested: false,
            },
        )
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }
}

impl SelectableHooks for WakeupSelectable {
    fn readable(&mut self, selectable: &SelectableRef) {
        let Some(reactor) = selectable.reactor().and_then(|weak| weak.upgrade()) else {
            return;
        };
        let reactor = Reactor::from_inner(reactor);

        loop {
            match self.receiver.try_recv() {
                Ok(Message::Command(command)) => command(&reactor),
                Ok(Message::Shutdown) => {
                    self.shutdown_requested = true;
                    break;
                }
                Err(_) => break,
            }
        }
    }
}
