//! A single-threaded event reactor for an asynchronous messaging stack.
//!
//! The [`reactor`] module owns the dispatch loop: it pulls typed [`Event`]s
//! from a FIFO collector, resolves the most specific handler registered on
//! the entity graph (connection/session/link/delivery/task/selectable), and
//! invokes it followed by a global handler. See `SPEC_FULL.md` at the
//! workspace root for the full design.

pub mod reactor;

#[cfg(any(test, feature = "test"))]
pub mod testing;

pub use reactor::controller::{Controller, WakeupSelectable};
pub use reactor::entity::{Connection, Delivery, Link, Session, Task, Transport};
pub use reactor::event::{Context, EntityClass, Event, EventType};
pub use reactor::handler::Handler;
pub use reactor::selectable::{SelectableHooks, SelectableRef};
pub use reactor::selector::{MioSelector, RegisterError, Selector};
pub use reactor::{ConnectionFinalHook, Reactor, ReactorConfig};
