//! Registry change notifications
//!
//! An explicit observer list owned by each registry. Listeners see every
//! mutation after it takes effect; they cannot veto or reorder operations.

use crate::driver::Driver;

/// Notification emitted on registry mutation
#[derive(Clone, Debug)]
pub enum RegistryEvent {
    /// A driver was validated and stored
    Added(Driver),
    /// A stored driver was removed
    Removed(Driver),
    /// The whole store was cleared
    Cleared,
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&RegistryEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Subscribers {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl Subscribers {
    pub(crate) fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub(crate) fn emit(&self, event: &RegistryEvent) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }
}
