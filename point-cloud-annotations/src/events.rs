//! Named publish/subscribe channel used by the measurement and annotation kernels.
//!
//! Listeners register against an event name (or [`ANY_EVENT`]) and are invoked
//! synchronously, in subscription order, when a matching event is published.
//! Hosts that need to defer work (e.g. queue RPC notifications for the next
//! frame) subscribe a closure that pushes into their own queue.

/// Subscribe to this name to receive every event on the bus.
pub const ANY_EVENT: &str = "*";

/// Event payloads carry the name listeners subscribe with.
pub trait NamedEvent {
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<E> = Box<dyn FnMut(&E) + Send + Sync>;

struct Subscription<E> {
    id: SubscriptionId,
    name: &'static str,
    listener: Listener<E>,
}

pub struct EventBus<E> {
    next_id: u64,
    subscriptions: Vec<Subscription<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            subscriptions: Vec::new(),
        }
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field(
                "subscriptions",
                &self.subscriptions.iter().map(|s| s.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<E: NamedEvent> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events called `name`.
    pub fn subscribe(
        &mut self,
        name: &'static str,
        listener: impl FnMut(&E) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            name,
            listener: Box::new(listener),
        });
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    /// Deliver `event` to every matching listener; returns how many ran.
    pub fn publish(&mut self, event: &E) -> usize {
        let name = event.name();
        let mut delivered = 0;
        for subscription in self
            .subscriptions
            .iter_mut()
            .filter(|s| s.name == name || s.name == ANY_EVENT)
        {
            (subscription.listener)(event);
            delivered += 1;
        }
        delivered
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.subscriptions.iter().filter(|s| s.name == name).count()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
