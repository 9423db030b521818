//! Reporting sink for soft failures and hook execution events
//!
//! The resolution layer never keeps global state; anything it wants to
//! surface without failing the run goes through an [`EventSink`] supplied
//! by the caller.

use std::cell::RefCell;

/// Something worth reporting that does not abort the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A caller-supplied path has no node, source or macro in the manifest
    PathNotInManifest { path: String },

    /// A parent/child map entry references an id that is not in the manifest
    UnresolvedReference { root: String, reference: String },

    /// A hook finished
    HookExecuted {
        hook: String,
        status: i32,
        elapsed_ms: u64,
    },
}

/// Receiver for [`Event`]s
pub trait EventSink {
    fn record(&self, event: &Event);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&self, _event: &Event) {}
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &Event) {
        match event {
            Event::PathNotInManifest { path } => {
                tracing::info!(path = %path, "path not found in manifest");
            }
            Event::UnresolvedReference { root, reference } => {
                tracing::warn!(root = %root, reference = %reference, "skipping unresolvable manifest reference");
            }
            Event::HookExecuted { hook, status, elapsed_ms } => {
                tracing::debug!(hook = %hook, status, elapsed_ms, "hook executed");
            }
        }
    }
}

/// Keeps every event in memory, mostly for tests
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: RefCell<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }
}

impl EventSink for CollectingSink {
    fn record(&self, event: &Event) {
        self.events.borrow_mut().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.record(&Event::PathNotInManifest { path: "a.sql".into() });
        sink.record(&Event::PathNotInManifest { path: "b.sql".into() });

        assert_eq!(
            sink.events(),
            vec![
                Event::PathNotInManifest { path: "a.sql".into() },
                Event::PathNotInManifest { path: "b.sql".into() },
            ]
        );
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let sink = NoopSink;
        sink.record(&Event::HookExecuted { hook: "h".into(), status: 0, elapsed_ms: 1 });
    }
}
