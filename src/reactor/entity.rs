//! The connection/session/link/delivery/task/transport entity graph.
//!
//! None of these types materialize a handler "tree" — per the design notes,
//! the tree is derived at dispatch time by walking the graph looking up the
//! `HANDLER` attachment at each level. These types only hold the structural
//! parent pointers (weak, to avoid ownership cycles) that the walk needs.

use std::fmt;

use super::attachments::Attachments;
use super::handle::{Handle, HasAttachments, WeakHandle};

macro_rules! attachments_only {
    ($data:ident) => {
        impl HasAttachments for $data {
            fn attachments(&self) -> &Attachments {
                &self.attachments
            }
            fn attachments_mut(&mut self) -> &mut Attachments {
                &mut self.attachments
            }
        }
    };
}

#[derive(Default)]
pub struct ConnectionData {
    attachments: Attachments,
}
attachments_only!(ConnectionData);

/// A connection entity. The root of the session/link/delivery hierarchy for
/// one peer.
pub type Connection = Handle<ConnectionData>;

impl fmt::Debug for ConnectionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

impl Connection {
    pub fn new() -> Self {
        Handle::new(ConnectionData::default())
    }

    pub fn new_session(&self) -> Session {
        let session = Handle::new(SessionData {
            connection: self.downgrade(),
            attachments: Attachments::default(),
        });
        session
    }
}

impl Default for Connection {
    fn default() -> Self {
        Connection::new()
    }
}

pub struct SessionData {
    connection: WeakHandle<ConnectionData>,
    attachments: Attachments,
}
attachments_only!(SessionData);

impl fmt::Debug for SessionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

/// A session entity, scoped to one [`Connection`].
pub type Session = Handle<SessionData>;

impl Session {
    pub fn connection(&self) -> Option<Connection> {
        self.borrow().connection.upgrade()
    }

    pub fn new_link(&self) -> Link {
        Handle::new(LinkData {
            session: self.downgrade(),
            attachments: Attachments::default(),
        })
    }
}

pub struct LinkData {
    session: WeakHandle<SessionData>,
    attachments: Attachments,
}
attachments_only!(LinkData);

impl fmt::Debug for LinkData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// A link entity, scoped to one [`Session`]. The most specific level of the
/// connection/session/link hierarchy that handler resolution considers.
pub type Link = Handle<LinkData>;

impl Link {
    pub fn session(&self) -> Option<Session> {
        self.borrow().session.upgrade()
    }

    pub fn new_delivery(&self) -> Delivery {
        Handle::new(DeliveryData {
            link: self.downgrade(),
            attachments: Attachments::default(),
        })
    }
}

pub struct DeliveryData {
    link: WeakHandle<LinkData>,
    attachments: Attachments,
}
attachments_only!(DeliveryData);

impl fmt::Debug for DeliveryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery").finish_non_exhaustive()
    }
}

/// A delivery entity, scoped to one [`Link`]. Has no handler of its own in
/// the resolution table (§4.3); events carrying a delivery resolve through
/// the delivery's link.
pub type Delivery = Handle<DeliveryData>;

impl Delivery {
    pub fn link(&self) -> Option<Link> {
        self.borrow().link.upgrade()
    }
}

#[derive(Default)]
pub struct TaskData {
    attachments: Attachments,
}
attachments_only!(TaskData);

impl fmt::Debug for TaskData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// A scheduled task, produced by [`crate::reactor::Reactor::schedule`]. Its
/// handler and owning reactor are attached directly at schedule time; it has
/// no parent entity.
pub type Task = Handle<TaskData>;

impl Task {
    pub fn new() -> Self {
        Handle::new(TaskData::default())
    }
}

impl Default for Task {
    fn default() -> Self {
        Task::new()
    }
}

#[derive(Default)]
pub struct TransportData {
    attachments: Attachments,
}
attachments_only!(TransportData);

impl fmt::Debug for TransportData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// The protocol-layer transport beneath a connection. Carries its own weak
/// reactor reference per the event→reactor lookup table (§4.3); the
/// transport's internal state machine is treated as an external
/// collaborator, so only the attachment surface handler resolution and
/// reactor lookup need is modeled here.
pub type Transport = Handle<TransportData>;

impl Transport {
    pub fn new() -> Self {
        Handle::new(TransportData::default())
    }
}

impl Default for Transport {
    fn default() -> Self {
        Transport::new()
    }
}
