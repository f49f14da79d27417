//! Change batching and listener dispatch
//!
//! Mutations enqueue into a pending [`ChangeMap`]; [`EventBus::flush`] takes
//! the whole batch and hands the same map to every interested listener.
//! Listeners run synchronously, in registration order, one flush at a time.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tiddle_types::{ChangeKind, ChangeMap, Title};

/// Which flushes a listener wants to hear about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    /// Every flush
    All,
    /// Only flushes that include this title
    Title(Title),
}

impl EventFilter {
    pub fn matches(&self, changes: &ChangeMap) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Title(title) => changes.contains(title.as_str()),
        }
    }
}

/// The empty string is the catch-all filter
impl From<&str> for EventFilter {
    fn from(filter: &str) -> Self {
        if filter.is_empty() {
            EventFilter::All
        } else {
            EventFilter::Title(Title::new(filter))
        }
    }
}

impl From<Title> for EventFilter {
    fn from(title: Title) -> Self {
        EventFilter::Title(title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type ListenerCallback = Box<dyn FnMut(&ChangeMap) -> anyhow::Result<()> + Send>;

struct Listener {
    id: ListenerId,
    filter: EventFilter,
    callback: ListenerCallback,
}

pub(crate) struct EventBus {
    pending: Mutex<ChangeMap>,
    listeners: Mutex<Vec<Listener>>,
    /// Listeners taken out of `listeners` for the dispatch in progress
    checked_out: Mutex<HashSet<ListenerId>>,
    /// Removals requested for checked-out listeners
    removed: Mutex<HashSet<ListenerId>>,
    dispatching: AtomicBool,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(ChangeMap::new()),
            listeners: Mutex::new(Vec::new()),
            checked_out: Mutex::new(HashSet::new()),
            removed: Mutex::new(HashSet::new()),
            dispatching: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn enqueue(&self, title: &Title, kind: ChangeKind) {
        self.pending.lock().record(title.clone(), kind);
    }

    pub fn pending(&self) -> ChangeMap {
        self.pending.lock().clone()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    pub fn clear(&self) {
        let mut pending = self.pending.lock();
        if !pending.is_empty() {
            tracing::debug!(discarded = pending.len(), "pending changes cleared");
        }
        pending.clear();
    }

    pub fn subscribe(&self, filter: EventFilter, callback: ListenerCallback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push(Listener {
            id,
            filter,
            callback,
        });
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        if listeners.len() != before {
            return true;
        }
        drop(listeners);

        if self.checked_out.lock().contains(&id) {
            return self.removed.lock().insert(id);
        }
        false
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Deliver all pending changes as one batch
    ///
    /// Returns the delivered map. A flush requested from inside a listener is
    /// a no-op; its changes stay pending for the next flush.
    pub fn flush(&self) -> ChangeMap {
        if self.dispatching.swap(true, Ordering::SeqCst) {
            tracing::debug!("flush requested during dispatch, deferring");
            return ChangeMap::new();
        }

        let changes = std::mem::take(&mut *self.pending.lock());
        if changes.is_empty() {
            self.dispatching.store(false, Ordering::SeqCst);
            return changes;
        }

        tracing::debug!(changes = changes.len(), "flushing store changes");

        let mut active = std::mem::take(&mut *self.listeners.lock());
        *self.checked_out.lock() = active.iter().map(|l| l.id).collect();
        for listener in active.iter_mut() {
            if self.removed.lock().contains(&listener.id) || !listener.filter.matches(&changes) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| (listener.callback)(&changes))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(listener = listener.id.0, error = %err, "store listener failed");
                }
                Err(_) => {
                    tracing::error!(listener = listener.id.0, "store listener panicked");
                }
            }
        }

        self.checked_out.lock().clear();
        let removed = std::mem::take(&mut *self.removed.lock());
        active.retain(|l| !removed.contains(&l.id));
        {
            // Listeners registered during dispatch go after the existing ones
            let mut listeners = self.listeners.lock();
            active.append(&mut listeners);
            *listeners = active;
        }

        self.dispatching.store(false, Ordering::SeqCst);
        changes
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &*self.pending.lock())
            .field("listeners", &self.listener_count())
            .field("dispatching", &self.dispatching.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn collecting(bus: &EventBus, filter: EventFilter) -> Arc<Mutex<Vec<ChangeMap>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(
            filter,
            Box::new(move |changes| {
                sink.lock().push(changes.clone());
                Ok(())
            }),
        );
        seen
    }

    #[test]
    fn test_flush_delivers_one_batch() {
        let bus = EventBus::new();
        let seen = collecting(&bus, EventFilter::All);

        bus.enqueue(&Title::new("A"), ChangeKind::Added);
        bus.enqueue(&Title::new("B"), ChangeKind::Added);
        bus.flush();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), 2);
    }

    #[test]
    fn test_empty_flush_dispatches_nothing() {
        let bus = EventBus::new();
        let seen = collecting(&bus, EventFilter::All);

        assert!(bus.flush().is_empty());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_title_filter() {
        let bus = EventBus::new();
        let seen = collecting(&bus, EventFilter::from("Watched"));

        bus.enqueue(&Title::new("Other"), ChangeKind::Modified);
        bus.flush();
        bus.enqueue(&Title::new("Watched"), ChangeKind::Modified);
        bus.enqueue(&Title::new("Other"), ChangeKind::Deleted);
        bus.flush();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), 2);
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        let bus = EventBus::new();
        bus.subscribe(EventFilter::All, Box::new(|_| anyhow::bail!("boom")));
        bus.subscribe(EventFilter::All, Box::new(|_| panic!("listener panic")));
        let seen = collecting(&bus, EventFilter::All);

        bus.enqueue(&Title::new("A"), ChangeKind::Added);
        bus.flush();

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(bus.listener_count(), 3);
        assert!(!bus.has_pending());
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe(EventFilter::All, Box::new(|_| Ok(())));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let gone = bus.subscribe(EventFilter::All, Box::new(|_| Ok(())));
        assert!(bus.unsubscribe(gone));

        let results = Arc::new(Mutex::new(Vec::new()));
        let (inner_bus, inner_results) = (bus.clone(), results.clone());
        let later = Arc::new(Mutex::new(None));
        let later_id = later.clone();
        bus.subscribe(
            EventFilter::All,
            Box::new(move |_| {
                let target = later_id.lock().expect("target registered");
                let mut results = inner_results.lock();
                results.push(inner_bus.unsubscribe(gone));
                results.push(inner_bus.unsubscribe(target));
                results.push(inner_bus.unsubscribe(target));
                Ok(())
            }),
        );
        let seen = collecting(&bus, EventFilter::All);
        *later.lock() = Some(bus.subscribe(EventFilter::All, Box::new(|_| Ok(()))));

        bus.enqueue(&Title::new("A"), ChangeKind::Added);
        bus.flush();

        assert_eq!(*results.lock(), vec![false, true, false]);
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(bus.listener_count(), 2);
    }

    #[test]
    fn test_clear_discards_pending() {
        let bus = EventBus::new();
        let seen = collecting(&bus, EventFilter::All);

        bus.enqueue(&Title::new("A"), ChangeKind::Added);
        bus.clear();
        bus.flush();

        assert!(seen.lock().is_empty());
    }
}
