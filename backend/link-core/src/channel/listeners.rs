//! Subscription table for named events.
//!
//! Shared between a channel's reader task (which dispatches) and its owner
//! (which subscribes). Persistent listeners stay until their receiver is
//! dropped or the name is cleared; one-shot listeners fire once.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

enum Listener {
    Persistent(mpsc::UnboundedSender<Value>),
    Once(oneshot::Sender<Value>),
}

#[derive(Default)]
pub(crate) struct ListenerTable {
    entries: HashMap<String, Vec<Listener>>,
}

impl ListenerTable {
    pub(crate) fn on(&mut self, event: &str) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.entries
            .entry(event.to_string())
            .or_default()
            .push(Listener::Persistent(tx));
        rx
    }

    pub(crate) fn once(&mut self, event: &str) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        self.entries
            .entry(event.to_string())
            .or_default()
            .push(Listener::Once(tx));
        rx
    }

    pub(crate) fn off(&mut self, event: &str) {
        self.entries.remove(event);
    }

    pub(crate) fn listener_count(&self, event: &str) -> usize {
        self.entries.get(event).map_or(0, Vec::len)
    }

    /// Deliver `data` to every listener of `event`.
    ///
    /// Returns how many listeners received it. Closed persistent listeners
    /// and fired one-shot listeners are pruned.
    pub(crate) fn dispatch(&mut self, event: &str, data: Value) -> usize {
        let Some(listeners) = self.entries.remove(event) else {
            return 0;
        };

        let mut delivered = 0;
        let mut kept = Vec::with_capacity(listeners.len());

        for listener in listeners {
            match listener {
                Listener::Persistent(tx) => {
                    if tx.send(data.clone()).is_ok() {
                        delivered += 1;
                        kept.push(Listener::Persistent(tx));
                    }
                }
                Listener::Once(tx) => {
                    if tx.send(data.clone()).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }

        if !kept.is_empty() {
            self.entries.insert(event.to_string(), kept);
        }

        delivered
    }
}
