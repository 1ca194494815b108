// ── Listener registry ──
//
// Callback listeners registered through the facade. The dispatch task calls
// them in registration order; errors and panics are logged and never reach
// the subscriber.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::warn;

use crate::model::Notification;

/// Error a listener may report back. Logged, never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every delivered [`Notification`].
pub trait EventListener: Send + Sync + 'static {
    fn on_notification(&self, notification: &Notification) -> Result<(), ListenerError>;
}

impl<F> EventListener for F
where
    F: Fn(&Notification) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    fn on_notification(&self, notification: &Notification) -> Result<(), ListenerError> {
        self(notification)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: DashMap<ListenerId, Arc<dyn EventListener>>,
}

impl ListenerRegistry {
    pub(crate) fn register(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, listener);
        id
    }

    pub(crate) fn unregister(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Call every listener with `notification`.
    pub(crate) fn dispatch(&self, notification: &Notification) {
        let mut listeners: Vec<(ListenerId, Arc<dyn EventListener>)> = self
            .listeners
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        listeners.sort_by_key(|(id, _)| *id);

        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.on_notification(notification))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(listener = id.0, error = %e, "listener returned an error"),
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_owned())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".into());
                    warn!(listener = id.0, %message, "listener panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    fn resynced() -> Notification {
        Notification::Resynced {
            at: Utc::now(),
            backfilled: 0,
        }
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let registry = ListenerRegistry::default();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let calls = Arc::clone(&calls);
            registry.register(Arc::new(move |_: &Notification| -> Result<(), ListenerError> {
                calls.lock().unwrap().push(n);
                Ok(())
            }));
        }

        registry.dispatch(&resynced());
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let registry = ListenerRegistry::default();
        let reached = Arc::new(Mutex::new(false));

        registry.register(Arc::new(|_: &Notification| -> Result<(), ListenerError> {
            panic!("listener bug");
        }));
        registry.register(Arc::new(|_: &Notification| -> Result<(), ListenerError> {
            Err("declined".into())
        }));
        let flag = Arc::clone(&reached);
        registry.register(Arc::new(move |_: &Notification| -> Result<(), ListenerError> {
            *flag.lock().unwrap() = true;
            Ok(())
        }));

        registry.dispatch(&resynced());
        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn unregistered_listener_is_not_called() {
        let registry = ListenerRegistry::default();
        let id = registry.register(Arc::new(|_: &Notification| -> Result<(), ListenerError> {
            panic!("should not run");
        }));
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.len(), 0);
        registry.dispatch(&resynced());
    }
}
