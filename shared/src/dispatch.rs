//! Synchronous publish/subscribe between the map and the line charts.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::feature::Feature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DataSelected,
    IndexSelected,
}

#[derive(Debug, Clone)]
pub enum Event {
    /// The ordered list of selected features.
    DataSelected(Vec<Rc<Feature>>),
    /// Hovered position on the shared date axis, `None` when cleared.
    IndexSelected(Option<usize>),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::DataSelected(_) => EventKind::DataSelected,
            Event::IndexSelected(_) => EventKind::IndexSelected,
        }
    }
}

type Handler = Rc<dyn Fn(&Event)>;

#[derive(Default)]
struct Registry {
    handlers: HashMap<EventKind, Vec<(String, Handler)>>,
}

/// Cheaply cloneable handle to a shared handler registry.
///
/// Handlers are keyed by a caller-chosen id; subscribing again with the same
/// id replaces the earlier handler and keeps its position.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Rc<RefCell<Registry>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.borrow();
        f.debug_struct("Dispatcher")
            .field("subscriptions", &registry.handlers.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler_id: impl Into<String>, handler: F)
    where
        F: Fn(&Event) + 'static,
    {
        let handler_id = handler_id.into();
        let handler: Handler = Rc::new(handler);
        let mut registry = self.inner.borrow_mut();
        let list = registry.handlers.entry(kind).or_default();
        match list.iter_mut().find(|(id, _)| *id == handler_id) {
            Some(slot) => slot.1 = handler,
            None => list.push((handler_id, handler)),
        }
    }

    pub fn unsubscribe(&self, kind: EventKind, handler_id: &str) -> bool {
        let mut registry = self.inner.borrow_mut();
        let Some(list) = registry.handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| id != handler_id);
        before != list.len()
    }

    /// Drop every subscription held under `handler_id`.
    pub fn unsubscribe_all(&self, handler_id: &str) {
        let mut registry = self.inner.borrow_mut();
        for list in registry.handlers.values_mut() {
            list.retain(|(id, _)| id != handler_id);
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .borrow()
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to current subscribers in subscription order.
    /// Handlers may publish or (un)subscribe; they see the registry as it
    /// was when this call started.
    pub fn publish(&self, event: Event) {
        let snapshot: Vec<Handler> = self
            .inner
            .borrow()
            .handlers
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, h)| Rc::clone(h)).collect())
            .unwrap_or_default();
        for handler in snapshot {
            handler(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&Event)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let make = move |name: &str| {
            let sink = Rc::clone(&sink);
            let name = name.to_string();
            Box::new(move |event: &Event| {
                let what = match event {
                    Event::DataSelected(features) => format!("data:{}", features.len()),
                    Event::IndexSelected(i) => format!("index:{i:?}"),
                };
                sink.borrow_mut().push(format!("{name} {what}"));
            }) as Box<dyn Fn(&Event)>
        };
        (log, make)
    }

    #[test]
    fn delivers_in_subscription_order() {
        let (log, make) = recorder();
        let d = Dispatcher::new();
        d.subscribe(EventKind::IndexSelected, "chart-a", make("a"));
        d.subscribe(EventKind::IndexSelected, "chart-b", make("b"));
        d.publish(Event::IndexSelected(Some(3)));
        assert_eq!(*log.borrow(), vec!["a index:Some(3)", "b index:Some(3)"]);
    }

    #[test]
    fn same_id_replaces_handler_in_place() {
        let (log, make) = recorder();
        let d = Dispatcher::new();
        d.subscribe(EventKind::IndexSelected, "x", make("first"));
        d.subscribe(EventKind::IndexSelected, "y", make("y"));
        d.subscribe(EventKind::IndexSelected, "x", make("second"));
        assert_eq!(d.subscriber_count(EventKind::IndexSelected), 2);
        d.publish(Event::IndexSelected(None));
        assert_eq!(*log.borrow(), vec!["second index:None", "y index:None"]);
    }

    #[test]
    fn events_are_not_buffered() {
        let (log, make) = recorder();
        let d = Dispatcher::new();
        d.publish(Event::DataSelected(Vec::new()));
        d.subscribe(EventKind::DataSelected, "late", make("late"));
        assert!(log.borrow().is_empty());
        d.publish(Event::IndexSelected(Some(1)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn unsubscribe_removes_handlers() {
        let (log, make) = recorder();
        let d = Dispatcher::new();
        d.subscribe(EventKind::DataSelected, "map", make("map"));
        d.subscribe(EventKind::IndexSelected, "map", make("map"));
        d.subscribe(EventKind::IndexSelected, "chart", make("chart"));
        assert!(d.unsubscribe(EventKind::DataSelected, "map"));
        assert!(!d.unsubscribe(EventKind::DataSelected, "map"));
        d.unsubscribe_all("map");
        d.publish(Event::IndexSelected(Some(0)));
        d.publish(Event::DataSelected(Vec::new()));
        assert_eq!(*log.borrow(), vec!["chart index:Some(0)"]);
    }

    #[test]
    fn handlers_may_publish_reentrantly() {
        let d = Dispatcher::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let inner = d.clone();
        d.subscribe(EventKind::DataSelected, "relay", move |_| {
            inner.publish(Event::IndexSelected(Some(7)));
        });
        let sink = Rc::clone(&seen);
        d.subscribe(EventKind::IndexSelected, "chart", move |e| {
            if let Event::IndexSelected(i) = e {
                sink.borrow_mut().push(*i);
            }
        });
        d.publish(Event::DataSelected(Vec::new()));
        assert_eq!(*seen.borrow(), vec![Some(7)]);
    }
}
