//! Widget observer trait and composite implementation.
//!
//! Defines [`WidgetObserver`] for reacting to the outputs of a
//! [`MapWidget`](crate::MapWidget), [`CompositeWidgetObserver`] which fans out
//! notifications to multiple observers, and [`RecordingObserver`] which keeps
//! everything it is told.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::event::{MetaUpdate, RenderCommand, TriggerEvent};

/// Observer for the outputs of a widget instance.
///
/// Notifications are delivered after the instance has finished processing an
/// input, in the order meta updates, triggers, render commands. The instance
/// does not wait on or react to anything an observer does.
///
/// Used as `Arc<dyn WidgetObserver>`.
pub trait WidgetObserver: Send + Sync {
    /// Called for every meta property the instance updated.
    fn on_meta_update(&self, widget_id: &str, update: &MetaUpdate);

    /// Called for every trigger the host should run.
    fn on_trigger(&self, widget_id: &str, trigger: &TriggerEvent);

    /// Called for every command the rendered map should execute.
    fn on_render(&self, widget_id: &str, command: &RenderCommand);
}

/// Composite observer that fans out to multiple observers.
#[derive(Default)]
pub struct CompositeWidgetObserver {
    observers: Vec<Arc<dyn WidgetObserver>>,
}

impl CompositeWidgetObserver {
    /// Creates a composite observer with the given list of observers.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn WidgetObserver>>) -> Self {
        Self { observers }
    }

    /// Adds an observer after construction.
    pub fn add(&mut self, observer: Arc<dyn WidgetObserver>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl WidgetObserver for CompositeWidgetObserver {
    fn on_meta_update(&self, widget_id: &str, update: &MetaUpdate) {
        for observer in &self.observers {
            observer.on_meta_update(widget_id, update);
        }
    }

    fn on_trigger(&self, widget_id: &str, trigger: &TriggerEvent) {
        for observer in &self.observers {
            observer.on_trigger(widget_id, trigger);
        }
    }

    fn on_render(&self, widget_id: &str, command: &RenderCommand) {
        for observer in &self.observers {
            observer.on_render(widget_id, command);
        }
    }
}

/// One notification received by a [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Notification {
    Meta { widget_id: String, update: MetaUpdate },
    Trigger { widget_id: String, trigger: TriggerEvent },
    Render { widget_id: String, command: RenderCommand },
}

/// Observer that records every notification in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock())
    }

    /// Triggers recorded so far.
    #[must_use]
    pub fn triggers(&self) -> Vec<TriggerEvent> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|notification| match notification {
                Notification::Trigger { trigger, .. } => Some(trigger.clone()),
                _ => None,
            })
            .collect()
    }
}

impl WidgetObserver for RecordingObserver {
    fn on_meta_update(&self, widget_id: &str, update: &MetaUpdate) {
        self.notifications.lock().push(Notification::Meta {
            widget_id: widget_id.to_string(),
            update: update.clone(),
        });
    }

    fn on_trigger(&self, widget_id: &str, trigger: &TriggerEvent) {
        self.notifications.lock().push(Notification::Trigger {
            widget_id: widget_id.to_string(),
            trigger: trigger.clone(),
        });
    }

    fn on_render(&self, widget_id: &str, command: &RenderCommand) {
        self.notifications.lock().push(Notification::Render {
            widget_id: widget_id.to_string(),
            command: command.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mapwidget_core::Value;

    use super::*;
    use crate::geometry::Marker;

    /// Test observer that counts how many times each method is called.
    #[derive(Default)]
    struct CountingObserver {
        meta_count: AtomicUsize,
        trigger_count: AtomicUsize,
        render_count: AtomicUsize,
    }

    impl WidgetObserver for CountingObserver {
        fn on_meta_update(&self, _: &str, _: &MetaUpdate) {
            self.meta_count.fetch_add(1, Ordering::Relaxed);
        }
        fn on_trigger(&self, _: &str, _: &TriggerEvent) {
            self.trigger_count.fetch_add(1, Ordering::Relaxed);
        }
        fn on_render(&self, _: &str, _: &RenderCommand) {
            self.render_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn update() -> MetaUpdate {
        MetaUpdate {
            name: "selectedMarker".to_string(),
            value: Value::Null,
        }
    }

    fn trigger() -> TriggerEvent {
        TriggerEvent {
            property: "onMarkerClick".to_string(),
            handler: Some("{{showAlert('hi')}}".to_string()),
            payload: Marker::at(1.0, 2.0),
        }
    }

    #[test]
    fn empty_composite_does_not_panic() {
        let composite = CompositeWidgetObserver::default();
        assert!(composite.is_empty());
        composite.on_meta_update("map1", &update());
        composite.on_trigger("map1", &trigger());
        composite.on_render("map1", &RenderCommand::SetDragEnabled { enabled: true });
    }

    #[test]
    fn composite_fans_out_to_all_observers() {
        let first = Arc::new(CountingObserver::default());
        let second = Arc::new(CountingObserver::default());
        let mut composite = CompositeWidgetObserver::new(vec![first.clone() as Arc<dyn WidgetObserver>]);
        composite.add(second.clone());
        assert_eq!(composite.len(), 2);

        composite.on_meta_update("map1", &update());
        composite.on_trigger("map1", &trigger());
        composite.on_render("map1", &RenderCommand::SetDragEnabled { enabled: false });
        composite.on_render("map1", &RenderCommand::SetInteraction { pan_zoom: true });

        for observer in [&first, &second] {
            assert_eq!(observer.meta_count.load(Ordering::Relaxed), 1);
            assert_eq!(observer.trigger_count.load(Ordering::Relaxed), 1);
            assert_eq!(observer.render_count.load(Ordering::Relaxed), 2);
        }
    }

    #[test]
    fn recording_observer_keeps_order_and_drains() {
        let recorder = RecordingObserver::new();
        recorder.on_meta_update("map1", &update());
        recorder.on_trigger("map1", &trigger());

        let recorded = recorder.notifications();
        assert_eq!(recorded.len(), 2);
        assert!(matches!(recorded[0], Notification::Meta { .. }));
        assert_eq!(recorder.triggers(), vec![trigger()]);

        assert_eq!(recorder.drain().len(), 2);
        assert!(recorder.notifications().is_empty());
    }
}
