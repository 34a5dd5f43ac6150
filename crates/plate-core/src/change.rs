use std::collections::BTreeMap;

use crate::ops::Op;

/// Everything applied between two flushes, delivered as one notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Change {
    pub operations: Vec<Op>,
    /// Pending marks were toggled without any op being applied.
    pub marks_changed: bool,
}

impl Change {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && !self.marks_changed
    }

    pub fn touches_value(&self) -> bool {
        self.operations.iter().any(|op| !op.is_selection_op())
    }

    pub fn touches_selection(&self) -> bool {
        self.operations.iter().any(Op::is_selection_op)
    }

    pub fn is_selection_only(&self) -> bool {
        self.touches_selection() && !self.touches_value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeSignal {
    /// Every flushed change.
    Change,
    /// Changes made only of selection ops.
    Selection,
    /// Changes that touched the document value.
    Value,
}

pub type ListenerId = u64;

type Listener = Box<dyn FnMut(&Change)>;

#[derive(Default)]
pub struct ChangeListeners {
    next_id: ListenerId,
    listeners: BTreeMap<ListenerId, (ChangeSignal, Listener)>,
}

impl ChangeListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, signal: ChangeSignal, listener: F) -> ListenerId
    where
        F: FnMut(&Change) + 'static,
    {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners.insert(id, (signal, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&mut self, change: &Change) {
        if change.is_empty() {
            return;
        }
        let selection = change.is_selection_only();
        let value = change.touches_value();
        for (signal, listener) in self.listeners.values_mut() {
            let wanted = match signal {
                ChangeSignal::Change => true,
                ChangeSignal::Selection => selection,
                ChangeSignal::Value => value,
            };
            if wanted {
                listener(change);
            }
        }
    }
}

impl std::fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}
