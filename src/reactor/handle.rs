use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use super::attachments::Attachments;
use super::handler::Handler;
use super::ReactorInner;

/// Implemented by every entity's inner data so that [`Handle`] can provide
/// the handler/reactor accessors common to connections, sessions, links,
/// deliveries, tasks, transports and selectables without repeating them on
/// each type (per §3: "Each entity's attachments own a strong reference to
/// its registered handler; references to the reactor are weak").
pub trait HasAttachments {
    fn attachments(&self) -> &Attachments;
    fn attachments_mut(&mut self) -> &mut Attachments;
}

/// A strongly-owned reference to an entity. The children list (for
/// selectables) or the parent entity (for sessions/links/deliveries) holds
/// one of these; back-references in the other direction are [`WeakHandle`]s.
pub struct Handle<T>(pub(crate) Rc<RefCell<T>>);

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Handle(Rc::clone(&self.0))
    }
}

impl<T> Handle<T> {
    pub fn new(data: T) -> Self {
        Handle(Rc::new(RefCell::new(data)))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakHandle<T> {
        WeakHandle(Rc::downgrade(&self.0))
    }

    pub(crate) fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }
}

impl<T: HasAttachments> Handle<T> {
    pub fn handler(&self) -> Option<Rc<RefCell<dyn Handler>>> {
        self.0.borrow().attachments().handler()
    }

    pub fn set_handler(&self, handler: Rc<RefCell<dyn Handler>>) {
        self.0.borrow_mut().attachments_mut().set_handler(handler);
    }

    pub fn reactor(&self) -> Option<Weak<RefCell<ReactorInner>>> {
        self.0.borrow().attachments().reactor()
    }

    pub fn set_reactor(&self, reactor: Weak<RefCell<ReactorInner>>) {
        self.0.borrow_mut().attachments_mut().set_reactor(reactor);
    }
}

/// A non-owning reference to an entity, used for parent/owner back-pointers
/// so the graph never forms an ownership cycle.
pub struct WeakHandle<T>(Weak<RefCell<T>>);

impl<T> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        WeakHandle(self.0.clone())
    }
}

impl<T> Default for WeakHandle<T> {
    fn default() -> Self {
        WeakHandle(Weak::new())
    }
}

impl<T> WeakHandle<T> {
    pub fn upgrade(&self) -> Option<Handle<T>> {
        self.0.upgrade().map(Handle)
    }
}
