use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Handler<E> = Box<dyn FnMut(&E) + Send>;

struct Registry<E> {
    next_id: u64,
    handlers: Vec<(u64, Handler<E>)>,
}

trait Unsubscribe: Send + Sync {
    fn remove(&self, id: u64);
}

impl<E: 'static> Unsubscribe for Mutex<Registry<E>> {
    fn remove(&self, id: u64) {
        self.lock().handlers.retain(|(candidate, _)| *candidate != id);
    }
}

/// Handlers registered against a single event type, called in
/// registration order. Handlers must not subscribe or emit re-entrantly.
pub struct Listeners<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: 'static> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> Listeners<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 1,
                handlers: Vec::new(),
            })),
        }
    }

    #[must_use = "dropping the subscription unregisters the handler"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&E) + Send + 'static,
    {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push((id, Box::new(handler)));
        drop(registry);

        let weak: Weak<dyn Unsubscribe> = Arc::downgrade(&self.registry) as Weak<dyn Unsubscribe>;
        Subscription { id, registry: weak }
    }

    pub fn emit(&self, event: &E) {
        let mut registry = self.registry.lock();
        for (_, handler) in registry.handlers.iter_mut() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps a handler registered until dropped.
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Unsubscribe>,
}

impl Subscription {
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handlers_run_in_registration_order() {
        let listeners = Listeners::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = {
            let seen = seen.clone();
            listeners.subscribe(move |value| seen.lock().push(("first", *value)))
        };
        let second = {
            let seen = seen.clone();
            listeners.subscribe(move |value| seen.lock().push(("second", *value)))
        };

        listeners.emit(&7);
        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);
        drop((first, second));
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let listeners = Listeners::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let subscription = {
            let count = count.clone();
            listeners.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        listeners.emit(&());
        assert_eq!(listeners.len(), 1);

        subscription.cancel();
        listeners.emit(&());
        assert!(listeners.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_outliving_listeners_is_harmless() {
        let listeners = Listeners::<()>::new();
        let subscription = listeners.subscribe(|_| {});
        drop(listeners);
        drop(subscription);
    }
}
