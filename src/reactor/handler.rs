//! Handler resolution (§4.3): the handler "tree" is never materialized —
//! it is derived at dispatch time by walking the entity graph for the
//! `HANDLER` attachment, most-specific first.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::event::{Context, Event};
use super::ReactorInner;

/// An opaque event subscriber. Handler errors are swallowed by design (§7):
/// `dispatch` has no `Result` — a handler is expected to handle its own
/// failures.
pub trait Handler {
    fn dispatch(&mut self, event: &Event);
}

/// Resolve the most specific handler registered for `event`'s entity, per
/// the walk in §4.3. Falls through connection-family entities toward their
/// parent (link -> session -> connection) when a level carries no handler,
/// since a link event still "has an associated" session and connection in
/// the table's sense.
pub fn resolve(event: &Event) -> Option<Rc<RefCell<dyn Handler>>> {
    match event.context() {
        Context::Link(link) => link.handler().or_else(|| {
            link.session().and_then(|session| {
                session
                    .handler()
                    .or_else(|| session.connection().and_then(|c| c.handler()))
            })
        }),
        Context::Session(session) => session
            .handler()
            .or_else(|| session.connection().and_then(|c| c.handler())),
        Context::Delivery(delivery) => delivery.link().and_then(|link| {
            link.handler().or_else(|| {
                link.session().and_then(|session| {
                    session
                        .handler()
                        .or_else(|| session.connection().and_then(|c| c.handler()))
                })
            })
        }),
        Context::Connection(connection) => connection.handler(),
        Context::Task(task) => task.handler(),
        Context::Selectable(selectable) => selectable.handler(),
        Context::Reactor(_) | Context::Transport(_) => None,
    }
}

/// The event-class -> owning-reactor lookup table of §4.3. Each entity's
/// weak `REACTOR` attachment (or, for reactor/selectable events, the
/// context itself) names the reactor an event belongs to.
pub fn reactor_of(event: &Event) -> Option<Weak<RefCell<ReactorInner>>> {
    match event.context() {
        Context::Reactor(weak) => Some(weak.clone()),
        Context::Task(task) => task.reactor(),
        Context::Transport(transport) => transport.reactor(),
        Context::Selectable(selectable) => selectable.reactor(),
        Context::Delivery(delivery) => delivery
            .link()
            .and_then(|link| link.session())
            .and_then(|session| session.connection())
            .and_then(|connection| connection.reactor()),
        Context::Link(link) => link
            .session()
            .and_then(|session| session.connection())
            .and_then(|connection| connection.reactor()),
        Context::Session(session) => session.connection().and_then(|c| c.reactor()),
        Context::Connection(connection) => connection.reactor(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::entity::{Connection, Task};
    use crate::reactor::event::EventType;
    use std::rc::Rc;

    struct Recording(Rc<RefCell<Vec<&'static str>>>, &'static str);
    impl Handler for Recording {
        fn dispatch(&mut self, _event: &Event) {
            self.0.borrow_mut().push(self.1);
        }
    }

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Rc<RefCell<dyn Handler>> {
        Rc::new(RefCell::new(Recording(log.clone(), name)))
    }

    #[test]
    fn most_specific_wins() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let connection = Connection::new();
        connection.set_handler(recorder(&log, "connection"));
        let session = connection.new_session();
        session.set_handler(recorder(&log, "session"));
        let link = session.new_link();
        link.set_handler(recorder(&log, "link"));

        let event = Event::new(EventType::Custom(0), Context::Link(link));
        let handler = resolve(&event).expect("link handler resolves");
        handler.borrow_mut().dispatch(&event);

        assert_eq!(*log.borrow(), vec!["link"]);
    }

    #[test]
    fn falls_through_to_connection_when_link_unset() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let connection = Connection::new();
        connection.set_handler(recorder(&log, "connection"));
        let session = connection.new_session();
        let link = session.new_link();

        let event = Event::new(EventType::Custom(0), Context::Link(link));
        let handler = resolve(&event).expect("falls through to connection handler");
        handler.borrow_mut().dispatch(&event);

        assert_eq!(*log.borrow(), vec!["connection"]);
    }

    #[test]
    fn no_handler_resolves_to_none() {
        let task = Task::new();
        let event = Event::new(EventType::TimerTask, Context::Task(task));
        assert!(resolve(&event).is_none());
    }
}
