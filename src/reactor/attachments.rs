use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::handler::Handler;
use super::ReactorInner;

/// Closed set of well-known attachment keys, per the design notes: the
/// `PN_HANDLE` sentinels of the original map to this small enum rather than
/// to an open string-keyed map.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AttachmentKey {
    /// Strong reference to the entity's registered [`Handler`].
    Handler,
    /// Weak reference to the entity's owning reactor.
    Reactor,
    /// Internal marker: has this entity already emitted its terminal event?
    Terminated,
}

/// Per-entity key→value map. Only the three keys in [`AttachmentKey`] are
/// ever populated; modeled as a plain struct rather than a generic map since
/// the value types differ per key and the key set is closed.
#[derive(Default)]
pub struct Attachments {
    handler: Option<Rc<RefCell<dyn Handler>>>,
    reactor: Option<Weak<RefCell<ReactorInner>>>,
    terminated: bool,
}

impl fmt::Debug for Attachments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachments")
            .field("handler", &self.handler.is_some())
            .field("reactor", &self.reactor.is_some())
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl Attachments {
    pub fn handler(&self) -> Option<Rc<RefCell<dyn Handler>>> {
        self.handler.clone()
    }

    pub fn set_handler(&mut self, handler: Rc<RefCell<dyn Handler>>) {
        self.handler = Some(handler);
    }

    pub fn reactor(&self) -> Option<Weak<RefCell<ReactorInner>>> {
        self.reactor.clone()
    }

    pub fn set_reactor(&mut self, reactor: Weak<RefCell<ReactorInner>>) {
        self.reactor = Some(reactor);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn mark_terminated(&mut self) {
        self.terminated = true;
    }
}
