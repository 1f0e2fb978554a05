//! Table events for observing persistence and deletion.
//!
//! Subscribers receive an event after each durable append and when the
//! table is deleted. The registry that owns a set of tables listens for
//! [`TableEvent::Deleted`] to drop its reference.

use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// An event emitted by a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    /// A change batch reached the table file. Carries the appended log
    /// text. Emitted only for post-initialization (queued) writes.
    Persisted {
        /// The log text that was appended.
        change: String,
    },
    /// The table was closed and its file removed.
    Deleted {
        /// Name of the deleted table.
        name: String,
    },
}

/// Distributes table events to subscribers.
///
/// Events preserve emission order per table. Disconnected subscribers are
/// dropped on the next emit.
#[derive(Default)]
pub(crate) struct EventFeed {
    subscribers: RwLock<Vec<Sender<TableEvent>>>,
}

impl EventFeed {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the feed; the receiver gets all future events.
    pub(crate) fn subscribe(&self) -> Receiver<TableEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all subscribers.
    pub(crate) fn emit(&self, event: TableEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for EventFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFeed")
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_events_in_order() {
        let feed = EventFeed::new();
        let rx = feed.subscribe();

        feed.emit(TableEvent::Persisted {
            change: "_['a'] = 1;\n".into(),
        });
        feed.emit(TableEvent::Deleted {
            name: "cars".into(),
        });

        assert_eq!(
            rx.recv().unwrap(),
            TableEvent::Persisted {
                change: "_['a'] = 1;\n".into()
            }
        );
        assert_eq!(rx.recv().unwrap(), TableEvent::Deleted { name: "cars".into() });
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let feed = EventFeed::new();
        let rx = feed.subscribe();
        drop(rx);

        feed.emit(TableEvent::Deleted { name: "x".into() });
        assert_eq!(feed.subscribers.read().len(), 0);
    }
}
