//! Event dispatch for codec instances
//!
//! Each codec instance carries an `ondequeue` slot plus a generic listener
//! registry keyed by event type, mirroring the EventTarget surface of the
//! WebCodecs interfaces. Listener invocations are scheduled by the pipeline
//! dispatcher and never run on the codec worker.

use std::sync::{Arc, RwLock};

/// An event delivered to registered listeners
#[derive(Debug, Clone)]
pub struct Event {
  event_type: String,
}

impl Event {
  pub fn new(event_type: impl Into<String>) -> Self {
    Self {
      event_type: event_type.into(),
    }
  }

  pub fn event_type(&self) -> &str {
    &self.event_type
  }
}

/// Listener callback type
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Options accepted by [`EventTarget::add_event_listener`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AddEventListenerOptions {
  pub capture: bool,
}

struct ListenerEntry {
  event_type: String,
  handler: EventHandler,
  capture: bool,
}

/// Listener registry shared between a codec instance and its dispatcher
#[derive(Default)]
pub struct EventTarget {
  ondequeue: RwLock<Option<EventHandler>>,
  listeners: RwLock<Vec<ListenerEntry>>,
}

impl EventTarget {
  pub fn new() -> Self {
    Self::default()
  }

  /// Install or clear the `ondequeue` handler
  pub fn set_ondequeue(&self, handler: Option<EventHandler>) {
    *self.ondequeue.write().expect("listener lock poisoned") = handler;
  }

  /// Read the current `ondequeue` handler
  pub fn ondequeue(&self) -> Option<EventHandler> {
    self.ondequeue.read().expect("listener lock poisoned").clone()
  }

  /// Register a listener for an event type.
  ///
  /// Registering the same `(type, handler, capture)` triple twice is a no-op,
  /// matching DOM EventTarget semantics. Handler identity is the `Arc`
  /// pointer.
  pub fn add_event_listener(
    &self,
    event_type: &str,
    handler: EventHandler,
    options: AddEventListenerOptions,
  ) {
    let mut listeners = self.listeners.write().expect("listener lock poisoned");
    let exists = listeners.iter().any(|entry| {
      entry.event_type == event_type
        && entry.capture == options.capture
        && Arc::ptr_eq(&entry.handler, &handler)
    });
    if !exists {
      listeners.push(ListenerEntry {
        event_type: event_type.to_string(),
        handler,
        capture: options.capture,
      });
    }
  }

  /// Unregister the listener matching the same `(type, handler, capture)`
  /// triple it was registered with.
  pub fn remove_event_listener(&self, event_type: &str, handler: &EventHandler, capture: bool) {
    let mut listeners = self.listeners.write().expect("listener lock poisoned");
    listeners.retain(|entry| {
      !(entry.event_type == event_type
        && entry.capture == capture
        && Arc::ptr_eq(&entry.handler, handler))
    });
  }

  /// Invoke all listeners registered for the event's type, plus `ondequeue`
  /// when the type is `dequeue`.
  pub fn dispatch_event(&self, event: &Event) {
    // Snapshot handlers so listener callbacks can re-enter the registry
    let handlers: Vec<EventHandler> = {
      let listeners = self.listeners.read().expect("listener lock poisoned");
      listeners
        .iter()
        .filter(|entry| entry.event_type == event.event_type())
        .map(|entry| entry.handler.clone())
        .collect()
    };

    for handler in handlers {
      handler(event);
    }

    if event.event_type() == "dequeue" {
      if let Some(handler) = self.ondequeue() {
        handler(event);
      }
    }
  }

  pub fn has_listeners(&self, event_type: &str) -> bool {
    if event_type == "dequeue" && self.ondequeue().is_some() {
      return true;
    }
    self
      .listeners
      .read()
      .expect("listener lock poisoned")
      .iter()
      .any(|entry| entry.event_type == event_type)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn counting_handler(counter: Arc<AtomicU32>) -> EventHandler {
    Arc::new(move |_event: &Event| {
      counter.fetch_add(1, Ordering::SeqCst);
    })
  }

  #[test]
  fn test_dispatch_invokes_listeners_and_ondequeue() {
    let target = EventTarget::new();
    let count = Arc::new(AtomicU32::new(0));

    target.add_event_listener(
      "dequeue",
      counting_handler(count.clone()),
      AddEventListenerOptions::default(),
    );
    target.set_ondequeue(Some(counting_handler(count.clone())));

    target.dispatch_event(&Event::new("dequeue"));
    assert_eq!(count.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn test_duplicate_registration_is_single() {
    let target = EventTarget::new();
    let count = Arc::new(AtomicU32::new(0));
    let handler = counting_handler(count.clone());

    target.add_event_listener("dequeue", handler.clone(), AddEventListenerOptions::default());
    target.add_event_listener("dequeue", handler.clone(), AddEventListenerOptions::default());

    target.dispatch_event(&Event::new("dequeue"));
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_remove_matches_triple() {
    let target = EventTarget::new();
    let count = Arc::new(AtomicU32::new(0));
    let handler = counting_handler(count.clone());

    target.add_event_listener(
      "dequeue",
      handler.clone(),
      AddEventListenerOptions { capture: true },
    );

    // Wrong capture flag: listener stays registered
    target.remove_event_listener("dequeue", &handler, false);
    target.dispatch_event(&Event::new("dequeue"));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    target.remove_event_listener("dequeue", &handler, true);
    target.dispatch_event(&Event::new("dequeue"));
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_clearing_ondequeue() {
    let target = EventTarget::new();
    let count = Arc::new(AtomicU32::new(0));

    target.set_ondequeue(Some(counting_handler(count.clone())));
    assert!(target.has_listeners("dequeue"));

    target.set_ondequeue(None);
    assert!(target.ondequeue().is_none());

    target.dispatch_event(&Event::new("dequeue"));
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn test_unrelated_event_type() {
    let target = EventTarget::new();
    let count = Arc::new(AtomicU32::new(0));

    target.add_event_listener(
      "dequeue",
      counting_handler(count.clone()),
      AddEventListenerOptions::default(),
    );
    target.dispatch_event(&Event::new("configure"));
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }
}
