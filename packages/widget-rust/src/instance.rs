//! A live map widget instance: the validated-value API the host talks to.
//!
//! [`MapWidget`] owns one instance's property snapshot, its visibility state
//! and its [`StateReconciler`]. Every call runs to completion (validation,
//! visibility of dependents, state transition, observer notification) before
//! it returns.

use std::collections::BTreeMap;
use std::sync::Arc;

use mapwidget_core::{
    validate, Bindable, Finding, PropertyDescriptor, PropertyRegistry, PropertyValues, Triggerable,
    Value, VisibilityResolver, VisibilitySnapshot,
};

use crate::config::MapWidgetConfig;
use crate::content_config::props;
use crate::event::{EventOutcome, EventRejected, MapEvent};
use crate::observer::WidgetObserver;
use crate::reconciler::{MapViewState, StateReconciler};

/// A raw configuration value as entered in the property pane.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Literal(Value),
    /// A dynamic expression, e.g. `{{Table1.selectedRow.location}}`. Opaque
    /// to the widget; the host evaluates it and calls
    /// [`MapWidget::apply_evaluated`] with the result.
    Binding(String),
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

pub struct MapWidget {
    config: MapWidgetConfig,
    registry: Arc<PropertyRegistry>,
    values: PropertyValues,
    bindings: BTreeMap<String, String>,
    findings: BTreeMap<String, Vec<Finding>>,
    visibility: VisibilityResolver,
    reconciler: StateReconciler,
    observer: Option<Arc<dyn WidgetObserver>>,
}

impl MapWidget {
    /// Creates an instance holding every declared default.
    #[must_use]
    pub fn new(registry: Arc<PropertyRegistry>, config: MapWidgetConfig) -> Self {
        let mut widget = Self {
            visibility: VisibilityResolver::new(Arc::clone(&registry)),
            reconciler: StateReconciler::new(&config),
            config,
            registry,
            values: PropertyValues::new(),
            bindings: BTreeMap::new(),
            findings: BTreeMap::new(),
            observer: None,
        };
        let defaults: Vec<(String, Value)> = widget
            .registry
            .iter()
            .filter_map(|d| d.default_value().map(|v| (d.name.clone(), v.clone())))
            .collect();
        for (name, value) in defaults {
            widget.store(&name, value);
        }
        widget.visibility.recompute_all(&widget.values);
        widget.reconciler.seed(&widget.values);
        widget.sync_live_values(&EventOutcome::default());
        tracing::debug!(
            widget = %widget.config.widget_id,
            widget_type = %widget.registry.widget_type(),
            properties = widget.values.len(),
            "map widget created"
        );
        widget
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn WidgetObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn widget_id(&self) -> &str {
        &self.config.widget_id
    }

    #[must_use]
    pub fn registry(&self) -> &PropertyRegistry {
        &self.registry
    }

    // -- inputs ------------------------------------------------------------

    /// Sets one property from the property pane.
    pub fn set_property(&mut self, name: &str, raw: RawValue) -> EventOutcome {
        self.set_properties(vec![(name.to_string(), raw)])
    }

    /// Sets properties that changed together, e.g. one property-pane save.
    pub fn set_properties(&mut self, changes: Vec<(String, RawValue)>) -> EventOutcome {
        let mut changed = Vec::new();
        for (name, raw) in changes {
            let literal = match raw {
                RawValue::Literal(value) => value,
                RawValue::Binding(expression) => match self.registry.get(&name) {
                    Some(d) if d.is_trigger() => Value::String(expression),
                    Some(d) if !d.accepts_bindings() => {
                        tracing::warn!(
                            widget = %self.config.widget_id,
                            property = %name,
                            "property does not accept bindings; storing the expression as a literal"
                        );
                        Value::String(expression)
                    }
                    _ => {
                        tracing::debug!(widget = %self.config.widget_id, property = %name, "binding awaiting evaluation");
                        self.bindings.insert(name, expression);
                        continue;
                    }
                },
            };
            self.bindings.remove(&name);
            if self.store(&name, literal) {
                changed.push(name);
            }
        }
        self.propagate(&changed)
    }

    /// Applies the host evaluator's result for a bound property.
    pub fn apply_evaluated(&mut self, name: &str, value: Value) -> EventOutcome {
        self.set_property(name, RawValue::Literal(value))
    }

    /// Routes a map event into the reconciler.
    ///
    /// # Errors
    ///
    /// Returns the reconciler's [`EventRejected`]; the view state is unchanged.
    pub fn dispatch(&mut self, event: &MapEvent) -> Result<EventOutcome, EventRejected> {
        match self.reconciler.handle(event) {
            Ok(outcome) => {
                self.sync_live_values(&outcome);
                Ok(self.finish(outcome))
            }
            Err(error) => {
                tracing::warn!(
                    widget = %self.config.widget_id,
                    event = event.name(),
                    %error,
                    "map event rejected"
                );
                Err(error)
            }
        }
    }

    // -- queries -----------------------------------------------------------

    /// Normalized value of a property. Meta properties read the live view state.
    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<Value> {
        if props::LIVE.contains(&name) {
            return self.reconciler.state().meta_value(name);
        }
        self.values.get(name).cloned()
    }

    /// Findings from the last validation of `name`.
    #[must_use]
    pub fn get_findings(&self, name: &str) -> &[Finding] {
        self.findings.get(name).map_or(&[], Vec::as_slice)
    }

    /// Every property with findings.
    #[must_use]
    pub fn findings(&self) -> &BTreeMap<String, Vec<Finding>> {
        &self.findings
    }

    /// Expression waiting for the host evaluator, if any.
    #[must_use]
    pub fn pending_binding(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn is_hidden(&self, name: &str) -> bool {
        self.visibility.is_hidden(name)
    }

    #[must_use]
    pub fn visibility(&self) -> &VisibilitySnapshot {
        self.visibility.snapshot()
    }

    /// Structural problems of the registry, e.g. visibility cycles.
    #[must_use]
    pub fn diagnostics(&self) -> &[Finding] {
        self.visibility.diagnostics()
    }

    #[must_use]
    pub fn view_state(&self) -> &MapViewState {
        self.reconciler.state()
    }

    /// Snapshot of every stored value, hidden properties included.
    #[must_use]
    pub fn values(&self) -> &PropertyValues {
        &self.values
    }

    // -- internals ---------------------------------------------------------

    /// Normalizes and stores a literal. Returns `true` when the stored value changed.
    fn store(&mut self, name: &str, literal: Value) -> bool {
        let (normalized, findings) = match self.registry.get(name) {
            Some(descriptor) => normalize(descriptor, literal),
            None => {
                tracing::debug!(
                    widget = %self.config.widget_id,
                    property = %name,
                    "storing undeclared property unvalidated"
                );
                (Some(literal).filter(|v| !v.is_null()), Vec::new())
            }
        };
        for finding in &findings {
            tracing::warn!(
                widget = %self.config.widget_id,
                property = %name,
                %finding,
                "configuration value corrected"
            );
        }
        let rejected = name == props::CENTER && !findings.is_empty();
        if findings.is_empty() {
            self.findings.remove(name);
        } else {
            self.findings.insert(name.to_string(), findings);
        }
        if rejected {
            tracing::warn!(
                widget = %self.config.widget_id,
                property = %name,
                "rejected center update; keeping current center"
            );
            return false;
        }

        let previous = match normalized {
            Some(value) => self.values.insert(name.to_string(), value),
            None => self.values.remove(name),
        };
        previous.as_ref() != self.values.get(name)
    }

    fn propagate(&mut self, changed: &[String]) -> EventOutcome {
        if changed.is_empty() {
            return EventOutcome::default();
        }
        for name in changed {
            for flipped in self.visibility.on_property_changed(name, &self.values) {
                tracing::debug!(
                    widget = %self.config.widget_id,
                    property = %flipped,
                    hidden = self.visibility.is_hidden(&flipped),
                    "property visibility changed"
                );
            }
        }
        let batch: Vec<(&str, Option<&Value>)> = changed
            .iter()
            .map(|name| (name.as_str(), self.values.get(name)))
            .collect();
        let outcome = self.reconciler.apply_batch(&batch);
        self.sync_live_values(&outcome);
        self.finish(outcome)
    }

    /// Mirrors the reconciler's view into the stored values: meta properties
    /// from the live state, and configured collections a drawing gesture
    /// rewrote from the outcome.
    fn sync_live_values(&mut self, outcome: &EventOutcome) {
        for update in &outcome.meta_updates {
            let name = update.name.as_str();
            if !props::LIVE.contains(&name) && self.registry.contains(name) {
                self.values.insert(update.name.clone(), update.value.clone());
            }
        }
        for name in props::LIVE {
            match self.reconciler.state().meta_value(name) {
                Some(value) => self.values.insert(name.to_string(), value),
                None => self.values.remove(name),
            };
        }
    }

    /// Attaches trigger handlers and notifies the observer.
    fn finish(&self, mut outcome: EventOutcome) -> EventOutcome {
        for trigger in &mut outcome.triggers {
            trigger.handler = self
                .values
                .get(&trigger.property)
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        if let Some(observer) = &self.observer {
            let id = self.config.widget_id.as_str();
            for update in &outcome.meta_updates {
                observer.on_meta_update(id, update);
            }
            for trigger in &outcome.triggers {
                observer.on_trigger(id, trigger);
            }
            for command in &outcome.render {
                observer.on_render(id, command);
            }
        }
        outcome
    }
}

/// Validates a literal against its descriptor. Unusable values fall back to
/// the descriptor's own default.
fn normalize(descriptor: &PropertyDescriptor, literal: Value) -> (Option<Value>, Vec<Finding>) {
    if descriptor.is_trigger() {
        return (Some(literal).filter(|v| !v.is_null()), Vec::new());
    }
    let Some(schema) = descriptor.schema() else {
        return (Some(literal).filter(|v| !v.is_null()), Vec::new());
    };
    let validated = validate(Some(&literal), schema, &descriptor.name);
    let value = validated.value.or_else(|| {
        descriptor
            .default_value()
            .and_then(|default| validate(Some(default), schema, &descriptor.name).value)
    });
    (value, validated.findings)
}

#[cfg(test)]
mod tests {
    use mapwidget_core::{FindingKind, PropertySection, PropertyDescriptor, PropertySchema, VisibilityRule};

    use super::*;
    use crate::content_config::map_widget_registry;
    use crate::event::{DrawnFeature, FeatureShape};
    use crate::geometry::Marker;
    use crate::observer::{Notification, RecordingObserver};

    fn widget() -> MapWidget {
        MapWidget::new(Arc::new(map_widget_registry()), MapWidgetConfig::default())
    }

    fn json(text: &str) -> Value {
        Value::from_json_str(text).unwrap()
    }

    #[test]
    fn defaults_are_normalized_and_seeded() {
        let widget = widget();
        assert_eq!(widget.get_value(props::ZOOM), Some(Value::Int(13)));
        assert!(widget.findings().is_empty());
        // Collection defaults are JSON text; the snapshot holds parsed arrays.
        assert!(matches!(widget.get_value(props::CIRCLES), Some(Value::Array(items)) if items.len() == 1));
        let state = widget.view_state();
        assert_eq!(state.center.lat, 51.505);
        assert_eq!(state.zoom, 13.0);
        assert_eq!(state.circles.len(), 1);
        assert_eq!(state.tile_layers.len(), 1);
        assert!(state.markers.is_empty());
    }

    #[test]
    fn unusable_value_falls_back_to_default_with_finding() {
        let mut widget = widget();
        // The schema's fallback applies before the descriptor default.
        widget.set_property(props::ZOOM, RawValue::Literal(Value::from("abc")));
        assert_eq!(widget.get_value(props::ZOOM), Some(Value::Int(10)));
        assert_eq!(widget.get_findings(props::ZOOM)[0].kind(), FindingKind::TypeMismatch);

        widget.set_property(props::ZOOM, RawValue::Literal(Value::Int(40)));
        assert_eq!(widget.get_value(props::ZOOM), Some(Value::Int(25)));
        assert_eq!(widget.get_findings(props::ZOOM)[0].kind(), FindingKind::OutOfRange);
        assert_eq!(widget.view_state().zoom, 25.0);

        widget.set_property(props::ZOOM, RawValue::Literal(Value::Int(4)));
        assert!(widget.get_findings(props::ZOOM).is_empty());
    }

    #[test]
    fn bindings_wait_for_evaluation() {
        let mut widget = widget();
        widget.set_property(props::ZOOM, RawValue::Binding("{{Slider1.value}}".to_string()));
        assert_eq!(widget.pending_binding(props::ZOOM), Some("{{Slider1.value}}"));
        assert_eq!(widget.get_value(props::ZOOM), Some(Value::Int(13)));

        widget.apply_evaluated(props::ZOOM, Value::Float(3.0));
        assert_eq!(widget.pending_binding(props::ZOOM), None);
        assert_eq!(widget.view_state().zoom, 3.0);
    }

    #[test]
    fn binding_on_non_bindable_property_is_a_literal() {
        let mut widget = widget();
        widget.set_property(
            props::ENABLE_CREATE_MARKER,
            RawValue::Binding("{{Switch1.isSwitchedOn}}".to_string()),
        );
        assert_eq!(widget.pending_binding(props::ENABLE_CREATE_MARKER), None);
        assert_eq!(widget.get_value(props::ENABLE_CREATE_MARKER), Some(Value::Bool(false)));
        assert_eq!(
            widget.get_findings(props::ENABLE_CREATE_MARKER)[0].kind(),
            FindingKind::TypeMismatch
        );
    }

    #[test]
    fn trigger_handler_is_attached_to_trigger_events() {
        let mut widget = widget();
        widget.set_property(
            props::ON_MARKER_CLICK,
            RawValue::Binding("{{showAlert(Map1.selectedMarker.title)}}".to_string()),
        );
        widget.set_property(
            props::DEFAULT_MARKERS,
            RawValue::Literal(json(r#"[{"lat": 1, "long": 2, "title": "A"}]"#)),
        );
        let outcome = widget.dispatch(&MapEvent::MarkerClick { index: 0 }).unwrap();
        assert_eq!(
            outcome.triggers[0].handler.as_deref(),
            Some("{{showAlert(Map1.selectedMarker.title)}}")
        );
        assert_eq!(outcome.triggers[0].payload.title.as_deref(), Some("A"));
        assert_eq!(
            widget.get_value(props::SELECTED_MARKER).and_then(|m| m.get("title").cloned()),
            Some(Value::from("A"))
        );
    }

    #[test]
    fn hidden_values_are_retained() {
        let mut widget = widget();
        let url = widget.get_value(props::URL);
        widget.set_property(props::ENABLE_MAP_LAYER, RawValue::Literal(Value::Bool(false)));
        assert!(widget.is_hidden(props::URL));
        assert_eq!(widget.get_value(props::URL), url);
        widget.set_property(props::ENABLE_MAP_LAYER, RawValue::Literal(Value::Bool(true)));
        assert!(!widget.is_hidden(props::URL));
        assert_eq!(widget.get_value(props::URL), url);
        assert!(widget.view_state().layers.map_layer);
    }

    #[test]
    fn unchanged_value_produces_no_outcome() {
        let mut widget = widget();
        let outcome = widget.set_property(props::ZOOM, RawValue::Literal(Value::Int(13)));
        assert!(outcome.is_empty());
    }

    #[test]
    fn undeclared_properties_are_stored_unvalidated() {
        let mut widget = widget();
        widget.set_property("topRow", RawValue::Literal(Value::Int(4)));
        assert_eq!(widget.get_value("topRow"), Some(Value::Int(4)));
        assert!(widget.get_findings("topRow").is_empty());
    }

    #[test]
    fn observer_sees_outcomes_in_order() {
        let recorder = Arc::new(RecordingObserver::new());
        let mut widget = widget().with_observer(recorder.clone());
        widget.set_property(props::ENABLE_CREATE_MARKER, RawValue::Literal(Value::Bool(true)));
        widget.dispatch(&MapEvent::MapClick { lat: 3.0, long: 4.0 }).unwrap();

        let notifications = recorder.notifications();
        assert!(matches!(notifications.first(), Some(Notification::Meta { .. })));
        assert!(matches!(notifications.last(), Some(Notification::Render { .. })));
        let triggers = recorder.triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].payload, Marker::at(3.0, 4.0).titled(""));
        assert_eq!(triggers[0].handler, None);
    }

    #[test]
    fn rejected_event_leaves_state_and_observer_untouched() {
        let recorder = Arc::new(RecordingObserver::new());
        let mut widget = widget().with_observer(recorder.clone());
        let before = widget.view_state().clone();
        assert!(widget.dispatch(&MapEvent::MarkerClick { index: 0 }).is_err());
        assert_eq!(widget.view_state(), &before);
        assert!(recorder.notifications().is_empty());
    }

    #[test]
    fn deselected_marker_is_not_reported() {
        let mut widget = widget();
        let marker = json(r#"{"lat": 1, "long": 1}"#);
        widget.set_property(props::DEFAULT_MARKERS, RawValue::Literal(json(r#"[{"lat": 1, "long": 1}]"#)));
        widget.set_property(props::SELECTED_MARKER, RawValue::Literal(marker.clone()));
        assert!(widget.get_value(props::SELECTED_MARKER).is_some());

        widget.dispatch(&MapEvent::MarkerDeselected).unwrap();
        assert_eq!(widget.get_value(props::SELECTED_MARKER), None);
        assert_eq!(widget.values().get(props::SELECTED_MARKER), None);

        // The same selection applies again.
        widget.set_property(props::SELECTED_MARKER, RawValue::Literal(marker));
        assert_eq!(widget.view_state().selected_marker, Some(Marker::at(1.0, 1.0)));
    }

    #[test]
    fn unknown_selection_is_not_reported() {
        let mut widget = widget();
        widget.set_property(props::DEFAULT_MARKERS, RawValue::Literal(json(r#"[{"lat": 1, "long": 1}]"#)));
        widget.set_property(props::SELECTED_MARKER, RawValue::Literal(json(r#"{"lat": 9, "long": 9}"#)));
        assert!(widget.view_state().selected_marker.is_none());
        assert_eq!(widget.get_value(props::SELECTED_MARKER), None);
        assert_eq!(widget.values().get(props::SELECTED_MARKER), None);
    }

    #[test]
    fn out_of_range_center_keeps_prior_center() {
        let mut widget = widget();
        let before = widget.view_state().center.clone();
        let outcome = widget.set_property(
            props::CENTER,
            RawValue::Literal(json(r#"{"lat": 200, "long": 0}"#)),
        );
        assert!(outcome.is_empty());
        assert_eq!(widget.view_state().center, before);
        assert_eq!(widget.get_findings(props::CENTER)[0].kind(), FindingKind::OutOfRange);

        widget.set_property(props::CENTER, RawValue::Literal(json(r#"{"lat": 10, "long": 20}"#)));
        assert_eq!(widget.view_state().center.lat, 10.0);
        assert!(widget.get_findings(props::CENTER).is_empty());
    }

    #[test]
    fn drawn_features_are_reported_by_get_value() {
        let mut widget = widget();
        let configured = widget.get_value(props::CIRCLES).unwrap();
        widget
            .dispatch(&MapEvent::GestureStart { shape: FeatureShape::Circle })
            .unwrap();
        widget
            .dispatch(&MapEvent::FeatureCreate(DrawnFeature {
                shape: FeatureShape::Circle,
                index: None,
                data: json(r#"{"lat": 1, "long": 2, "radius": 50}"#),
            }))
            .unwrap();
        assert!(matches!(widget.get_value(props::CIRCLES), Some(Value::Array(items)) if items.len() == 2));

        // Re-evaluating the configured collection replaces the drawn state.
        widget.apply_evaluated(props::CIRCLES, configured);
        assert_eq!(widget.view_state().circles.len(), 1);
    }

    #[test]
    fn cycle_diagnostics_surface_on_the_instance() {
        let mut registry = PropertyRegistry::new("CYCLIC");
        registry.register_section(PropertySection::new(
            "General",
            vec![
                PropertyDescriptor::new("a")
                    .with_schema(PropertySchema::Boolean)
                    .visibility(VisibilityRule::when_enabled("b")),
                PropertyDescriptor::new("b")
                    .with_schema(PropertySchema::Boolean)
                    .visibility(VisibilityRule::when_enabled("a")),
            ],
        ));
        let widget = MapWidget::new(Arc::new(registry), MapWidgetConfig::default());
        assert_eq!(widget.diagnostics().len(), 1);
        assert!(!widget.is_hidden("a"));
    }
}
