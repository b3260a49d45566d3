//! Registered I/O-capable resources (§3, §4.4).
//!
//! A selectable's callbacks are modeled as a trait object rather than four
//! separate closure fields: `SelectableHooks` gives every method a no-op
//! default, so a registrant (the timer, a wakeup channel, a transport
//! socket) implements only the ones it cares about.

use std::time::Instant;

use super::attachments::Attachments;
use super::handle::{Handle, HasAttachments};

/// Callbacks a registered selectable may respond to. All default to
/// no-ops; `Reactor::register_selectable` takes one of these per
/// selectable.
pub trait SelectableHooks {
    fn readable(&mut self, _selectable: &SelectableRef) {}
    fn writable(&mut self, _selectable: &SelectableRef) {}
    fn expired(&mut self, _selectable: &SelectableRef) {}
    fn release(&mut self) {}
}

pub struct SelectableData {
    attachments: Attachments,
    deadline: Option<Instant>,
    terminal: bool,
    released: bool,
    hooks: std::rc::Rc<std::cell::RefCell<dyn SelectableHooks>>,
}

impl HasAttachments for SelectableData {
    fn attachments(&self) -> &Attachments {
        &self.attachments
    }
    fn attachments_mut(&mut self) -> &mut Attachments {
        &mut self.attachments
    }
}

impl std::fmt::Debug for SelectableData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selectable")
            .field("deadline", &self.deadline)
            .field("terminal", &self.terminal)
            .finish_non_exhaustive()
    }
}

/// A registered selectable. At most one entry per selectable lives in the
/// reactor's children list (§3 uniqueness invariant); this handle is the
/// strong reference the children list holds.
pub type SelectableRef = Handle<SelectableData>;

impl SelectableRef {
    pub(crate) fn create(hooks: std::rc::Rc<std::cell::RefCell<dyn SelectableHooks>>) -> Self {
        Handle::new(SelectableData {
            attachments: Attachments::default(),
            deadline: None,
            terminal: false,
            released: false,
            hooks,
        })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.borrow().deadline
    }

    pub fn set_deadline(&self, deadline: Option<Instant>) {
        self.borrow_mut().deadline = deadline;
    }

    pub fn is_terminal(&self) -> bool {
        self.borrow().terminal
    }

    /// Has this selectable already emitted `SELECTABLE_FINAL`? Distinct
    /// from `is_terminal`: a selectable becomes terminal first, then is
    /// marked finalized the moment `update` publishes the event for it.
    pub(crate) fn already_finalized(&self) -> bool {
        self.borrow().attachments.is_terminated()
    }

    pub(crate) fn mark_finalized(&self) {
        self.borrow_mut().attachments.mark_terminated();
    }

    /// Mark this selectable as done. The next `Reactor::update` call will
    /// publish `SELECTABLE_FINAL` for it.
    pub fn terminate(&self) {
        self.borrow_mut().terminal = true;
    }

    pub fn readable(&self) {
        let hooks = self.borrow().hooks.clone();
        hooks.borrow_mut().readable(self);
    }

    pub fn writable(&self) {
        let hooks = self.borrow().hooks.clone();
        hooks.borrow_mut().writable(self);
    }

    pub fn expired(&self) {
        let hooks = self.borrow().hooks.clone();
        hooks.borrow_mut().expired(self);
    }

    /// Idempotent: a selectable is only ever actually released once, even
    /// if this is called more than once (§7: "releasing a selectable twice
    /// is a no-op after the first").
    pub(crate) fn release(&self) {
        let already_released = {
            let mut data = self.borrow_mut();
            std::mem::replace(&mut data.released, true)
        };
        if !already_released {
            let hooks = self.borrow().hooks.clone();
            hooks.borrow_mut().release();
        }
    }
}
