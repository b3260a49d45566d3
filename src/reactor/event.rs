//! The typed event record the collector carries and the dispatch loop
//! consumes, plus the closed set of event types this crate produces itself.
//!
//! Transport/protocol layers are external collaborators (§1) and may mint
//! their own pass-through event types; those are modeled as an opaque
//! `Custom` variant so the dispatch loop can still route them through the
//! same resolution table without knowing their meaning.

use std::cell::RefCell;
use std::rc::Weak;

use super::entity::{Connection, Delivery, Link, Session, Task, Transport};
use super::selectable::SelectableRef;
use super::ReactorInner;

/// Closed enumeration of event types, per §3. `Custom` carries whatever
/// identifier the transport/protocol layer uses for its own pass-through
/// events; this crate never inspects it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventType {
    ReactorInit,
    ReactorQuiesced,
    ReactorFinal,
    SelectableInit,
    SelectableUpdated,
    SelectableFinal,
    ConnectionInit,
    ConnectionFinal,
    TimerTask,
    Custom(u32),
}

/// Which level of the entity graph an event's context belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EntityClass {
    Reactor,
    Selectable,
    Connection,
    Session,
    Link,
    Delivery,
    Task,
    Transport,
}

/// Non-owning reference to the entity an event concerns. The collector is
/// responsible for keeping the underlying entity alive until `pop` (our
/// `Collector` does so by holding the event, and hence a strong `Handle`
/// clone, in its queue — see `collector.rs`).
#[derive(Clone)]
pub enum Context {
    Reactor(Weak<RefCell<ReactorInner>>),
    Selectable(SelectableRef),
    Connection(Connection),
    Session(Session),
    Link(Link),
    Delivery(Delivery),
    Task(Task),
    Transport(Transport),
}

impl Context {
    pub fn class(&self) -> EntityClass {
        match self {
            Context::Reactor(_) => EntityClass::Reactor,
            Context::Selectable(_) => EntityClass::Selectable,
            Context::Connection(_) => EntityClass::Connection,
            Context::Session(_) => EntityClass::Session,
            Context::Link(_) => EntityClass::Link,
            Context::Delivery(_) => EntityClass::Delivery,
            Context::Task(_) => EntityClass::Task,
            Context::Transport(_) => EntityClass::Transport,
        }
    }
}

/// An immutable event record, consumed exactly once per dispatch step.
#[derive(Clone)]
pub struct Event {
    event_type: EventType,
    class: EntityClass,
    context: Context,
}

impl Event {
    pub fn new(event_type: EventType, context: Context) -> Self {
        let class = context.class();
        Event {
            event_type,
            class,
            context,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn class(&self) -> EntityClass {
        self.class
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("class", &self.class)
            .finish()
    }
}
