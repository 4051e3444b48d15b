//! Runtime state of the map and the transition rules that keep it consistent
//! with property changes and user interaction.
//!
//! [`StateReconciler`] exclusively owns the [`MapViewState`]. Every mutation is
//! routed through either [`StateReconciler::apply_batch`] (configuration or
//! meta properties changed by the host) or [`StateReconciler::handle`]
//! ([`MapEvent`]s from the map surface). Both return an [`EventOutcome`] once
//! the state is fully updated.
//!
//! # Interaction states
//!
//! | From | Input | To |
//! |------|-------|----|
//! | any but `Dragging` | map click, creation enabled | `CreatingMarker` |
//! | any but `Dragging` | marker click | `MarkerSelected` |
//! | `CreatingMarker` | marker drag end | `MarkerSelected` |
//! | any | popup closed | `Idle` |
//! | any | drawing gesture starts | `Dragging` |
//! | `Dragging` | feature created / edited / deleted | previous state |
//! | any | `mapCenter` changed | `Idle` |
//! | any | non-empty markers changed | `Idle` |

use mapwidget_core::{validate, Finding, PropertySchema, PropertyValues, Value};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{MapWidgetConfig, ViewportConfig};
use crate::content_config::props;
use crate::event::{DrawnFeature, EventOutcome, EventRejected, FeatureShape, MapEvent, RenderCommand};
use crate::geometry::{
    coordinates_schema, decode, decode_list, encode, Bounds, Circle, GeoFeature, LatLong, Line,
    Marker, Polygon, TileLayer,
};

// ---------------------------------------------------------------------------
// MapViewState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionState {
    #[default]
    Idle,
    CreatingMarker,
    MarkerSelected,
    /// A drawing gesture is in progress; map clicks and user pan/zoom are ignored.
    Dragging,
}

/// Which optional layers are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct LayerToggles {
    pub map_layer: bool,
    pub tile_layers: bool,
    pub default_markers: bool,
    pub circles: bool,
    pub lines: bool,
    pub polygons: bool,
    pub geo_json: bool,
}

impl Default for LayerToggles {
    fn default() -> Self {
        Self {
            map_layer: true,
            tile_layers: false,
            default_markers: false,
            circles: true,
            lines: false,
            polygons: false,
            geo_json: false,
        }
    }
}

/// Everything the rendered map shows.
///
/// Invariants, checked in debug builds after every transition:
/// - `selected_marker`, when present, is one of `markers`;
/// - `center` is a valid coordinate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapViewState {
    pub center: LatLong,
    pub zoom: f64,
    pub bounds: Option<Bounds>,
    pub markers: Vec<Marker>,
    pub selected_marker: Option<Marker>,
    pub tile_layers: Vec<TileLayer>,
    pub circles: Vec<Circle>,
    pub lines: Vec<Line>,
    pub polygons: Vec<Polygon>,
    pub geo_features: Vec<GeoFeature>,
    pub layers: LayerToggles,
    pub interaction: InteractionState,
    /// Map dragging is disabled while a marker is being placed or inspected.
    pub map_drag_enabled: bool,
    pub pan_zoom_enabled: bool,
}

impl MapViewState {
    fn new(center: LatLong, zoom: f64) -> Self {
        Self {
            center,
            zoom,
            bounds: None,
            markers: Vec::new(),
            selected_marker: None,
            tile_layers: Vec::new(),
            circles: Vec::new(),
            lines: Vec::new(),
            polygons: Vec::new(),
            geo_features: Vec::new(),
            layers: LayerToggles::default(),
            interaction: InteractionState::Idle,
            map_drag_enabled: true,
            pan_zoom_enabled: true,
        }
    }

    /// Current value of a meta property.
    #[must_use]
    pub fn meta_value(&self, name: &str) -> Option<Value> {
        match name {
            props::CENTER => Some(encode(&self.center)),
            props::MARKERS => Some(encode(&self.markers)),
            props::SELECTED_MARKER => self.selected_marker.as_ref().map(encode),
            props::MAP_BOUNDS => self.bounds.as_ref().map(encode),
            _ => None,
        }
    }

    fn selection_is_consistent(&self) -> bool {
        self.selected_marker
            .as_ref()
            .is_none_or(|selected| self.markers.contains(selected))
    }
}

#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::struct_excessive_bools)]
struct MarkerBehavior {
    create: bool,
    replace: bool,
    center_on_click: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeatureOp {
    Create,
    Edit,
    Delete,
}

// ---------------------------------------------------------------------------
// StateReconciler
// ---------------------------------------------------------------------------

/// Owner of one map's [`MapViewState`].
#[derive(Debug)]
pub struct StateReconciler {
    state: MapViewState,
    behavior: MarkerBehavior,
    viewport: ViewportConfig,
    fallback_center: LatLong,
    default_zoom: f64,
    /// Interaction to return to when the current drawing gesture completes.
    resume: InteractionState,
}

impl StateReconciler {
    #[must_use]
    pub fn new(config: &MapWidgetConfig) -> Self {
        let mut reconciler = Self {
            state: MapViewState::new(config.fallback_center.clone(), config.default_zoom),
            behavior: MarkerBehavior::default(),
            viewport: config.viewport,
            fallback_center: config.fallback_center.clone(),
            default_zoom: config.default_zoom,
            resume: InteractionState::Idle,
        };
        reconciler.state.bounds = Some(reconciler.projected_bounds());
        reconciler
    }

    #[must_use]
    pub fn state(&self) -> &MapViewState {
        &self.state
    }

    #[must_use]
    pub fn interaction(&self) -> InteractionState {
        self.state.interaction
    }

    /// Initializes the state from a full set of normalized values without
    /// running any transition. Meta properties present in `values` take
    /// precedence over the configuration they derive from.
    pub fn seed(&mut self, values: &PropertyValues) {
        let center = values
            .get(props::CENTER)
            .or_else(|| values.get(props::MAP_CENTER))
            .and_then(decode::<LatLong>)
            .filter(LatLong::is_valid);
        self.state.center = center.unwrap_or_else(|| self.fallback_center.clone());
        self.state.markers = decode_list(
            values
                .get(props::MARKERS)
                .or_else(|| values.get(props::DEFAULT_MARKERS)),
        );
        self.state.selected_marker = None;
        self.state.interaction = InteractionState::Idle;
        for (name, value) in values {
            if matches!(
                name.as_str(),
                props::CENTER | props::MAP_CENTER | props::MARKERS | props::DEFAULT_MARKERS
            ) {
                continue;
            }
            self.apply_setting(name, Some(value), &mut EventOutcome::default());
        }
        self.state.bounds = Some(self.projected_bounds());
    }

    /// Applies one changed property.
    pub fn apply_property(&mut self, name: &str, value: Option<&Value>) -> EventOutcome {
        self.apply_batch(&[(name, value)])
    }

    /// Applies properties that changed together.
    ///
    /// A `mapCenter` change in the batch is applied last and suppresses
    /// centering on changed markers.
    pub fn apply_batch(&mut self, changes: &[(&str, Option<&Value>)]) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        let recentering = changes.iter().find(|(name, _)| *name == props::MAP_CENTER);
        for (name, value) in changes {
            match *name {
                props::MAP_CENTER => {}
                props::MARKERS | props::DEFAULT_MARKERS => {
                    self.replace_markers(decode_list(*value), recentering.is_none(), &mut outcome);
                }
                props::CENTER => self.set_center(*value, &mut outcome),
                props::SELECTED_MARKER => self.select_external(*value, &mut outcome),
                props::MAP_BOUNDS => {
                    if let Some(bounds) = value.and_then(decode::<Bounds>).filter(Bounds::is_valid) {
                        self.set_bounds(bounds, &mut outcome);
                    }
                }
                _ => self.apply_setting(name, *value, &mut outcome),
            }
        }
        if let Some((_, value)) = recentering {
            self.recenter_from_config(*value, &mut outcome);
        }
        self.check_invariants();
        outcome
    }

    /// Applies a map event, or rejects it leaving the state untouched.
    ///
    /// # Errors
    ///
    /// Returns [`EventRejected`] when the payload fails validation or references
    /// a marker or feature that does not exist.
    pub fn handle(&mut self, event: &MapEvent) -> Result<EventOutcome, EventRejected> {
        let from = self.state.interaction;
        let outcome = match event {
            MapEvent::MapClick { lat, long } => self.on_map_click(*lat, *long),
            MapEvent::MarkerClick { index } => self.on_marker_click(*index),
            MapEvent::MarkerMoved { index, lat, long } => self.on_marker_moved(*index, *lat, *long),
            MapEvent::MarkerDeselected => Ok(self.on_marker_deselected()),
            MapEvent::GestureStart { shape } => Ok(self.on_gesture_start(*shape)),
            MapEvent::FeatureCreate(feature) => self.on_feature(FeatureOp::Create, feature),
            MapEvent::FeatureEdit(feature) => self.on_feature(FeatureOp::Edit, feature),
            MapEvent::FeatureDelete(feature) => self.on_feature(FeatureOp::Delete, feature),
            MapEvent::BoundsChange(bounds) => self.on_bounds_change(bounds),
        }?;
        let to = self.state.interaction;
        if from != to {
            tracing::debug!(event = event.name(), from = ?from, to = ?to, "interaction transition");
        }
        self.check_invariants();
        Ok(outcome)
    }

    // -- property transitions ----------------------------------------------

    fn apply_setting(&mut self, name: &str, value: Option<&Value>, outcome: &mut EventOutcome) {
        let flag = value.and_then(Value::as_bool).unwrap_or(false);
        match name {
            props::ZOOM => {
                self.state.zoom = value.and_then(Value::as_f64).unwrap_or(self.default_zoom);
                self.update_bounds(outcome);
                outcome.render.push(RenderCommand::SetView {
                    center: self.state.center.clone(),
                    zoom: self.state.zoom,
                });
            }
            props::TILE_LAYERS => self.state.tile_layers = decode_list(value),
            props::CIRCLES => self.state.circles = decode_list(value),
            props::LINES => self.state.lines = decode_list(value),
            props::POLYGONS => self.state.polygons = decode_list(value),
            props::GEO_JSON => self.state.geo_features = decode_list(value),
            props::ENABLE_MAP_LAYER => self.state.layers.map_layer = flag,
            props::ENABLE_TILE_LAYERS => self.state.layers.tile_layers = flag,
            props::ENABLE_DEFAULT_MARKERS => self.state.layers.default_markers = flag,
            props::ENABLE_CIRCLES => self.state.layers.circles = flag,
            props::ENABLE_LINES => self.state.layers.lines = flag,
            props::ENABLE_POLYGONS => self.state.layers.polygons = flag,
            props::ENABLE_GEO_JSON => self.state.layers.geo_json = flag,
            props::ENABLE_CREATE_MARKER => self.behavior.create = flag,
            props::ENABLE_REPLACE_MARKER => self.behavior.replace = flag,
            props::IS_CLICKED_MARKER_CENTERED => self.behavior.center_on_click = flag,
            _ => {}
        }
    }

    fn recenter_from_config(&mut self, value: Option<&Value>, outcome: &mut EventOutcome) {
        let Some(center) = value.and_then(decode::<LatLong>).filter(LatLong::is_valid) else {
            tracing::warn!(property = props::MAP_CENTER, "unusable map center; keeping current center");
            return;
        };
        self.enter_idle(outcome);
        self.move_center(center, outcome);
        outcome.render.push(RenderCommand::SetView {
            center: self.state.center.clone(),
            zoom: self.state.zoom,
        });
    }

    fn set_center(&mut self, value: Option<&Value>, outcome: &mut EventOutcome) {
        let Some(center) = value.and_then(decode::<LatLong>).filter(LatLong::is_valid) else {
            tracing::warn!(property = props::CENTER, "rejected center update; keeping current center");
            return;
        };
        self.clear_selection(outcome);
        self.state.center = center;
        self.update_bounds(outcome);
    }

    fn replace_markers(&mut self, markers: Vec<Marker>, recenter: bool, outcome: &mut EventOutcome) {
        if markers == self.state.markers {
            return;
        }
        self.state.markers = markers;
        outcome.meta(props::MARKERS, encode(&self.state.markers));
        match self.state.markers.last().map(Marker::position) {
            Some(last) if recenter => {
                self.enter_idle(outcome);
                self.move_center(last, outcome);
                outcome.render.push(RenderCommand::SetView {
                    center: self.state.center.clone(),
                    zoom: self.state.zoom,
                });
            }
            _ => {
                if !self.state.selection_is_consistent() {
                    self.clear_selection(outcome);
                }
            }
        }
    }

    fn select_external(&mut self, value: Option<&Value>, outcome: &mut EventOutcome) {
        match value.and_then(decode::<Marker>) {
            None => self.clear_selection(outcome),
            Some(marker) if self.state.markers.contains(&marker) => {
                self.state.selected_marker = Some(marker);
                if self.state.interaction == InteractionState::Idle {
                    self.state.interaction = InteractionState::MarkerSelected;
                }
            }
            Some(_) => {
                tracing::debug!(property = props::SELECTED_MARKER, "ignoring selection of an unknown marker");
            }
        }
    }

    // -- event transitions -------------------------------------------------

    fn on_map_click(&mut self, lat: f64, long: f64) -> Result<EventOutcome, EventRejected> {
        if self.state.interaction == InteractionState::Dragging {
            tracing::debug!("map click ignored during drawing gesture");
            return Ok(EventOutcome::suppressed());
        }
        check_coordinates(lat, long, "mapClick")?;
        let mut outcome = EventOutcome::default();
        if !self.behavior.create {
            return Ok(outcome);
        }

        let marker = if self.behavior.replace {
            let carried = self.state.markers.last().and_then(Marker::label).unwrap_or_default();
            Marker::at(lat, long).titled(carried)
        } else {
            Marker::at(lat, long).titled("")
        };
        if self.behavior.replace {
            self.state.markers = vec![marker.clone()];
        } else {
            self.state.markers.push(marker.clone());
        }
        self.state.selected_marker = Some(marker.clone());
        self.state.interaction = InteractionState::CreatingMarker;
        self.state.map_drag_enabled = false;

        outcome.meta(props::MARKERS, encode(&self.state.markers));
        outcome.meta(props::SELECTED_MARKER, encode(&marker));
        outcome.trigger(props::ON_CREATE_MARKER, marker);
        outcome.render.push(RenderCommand::SetDragEnabled { enabled: false });
        Ok(outcome)
    }

    fn on_marker_click(&mut self, index: usize) -> Result<EventOutcome, EventRejected> {
        if self.state.interaction == InteractionState::Dragging {
            tracing::debug!("marker click ignored during drawing gesture");
            return Ok(EventOutcome::suppressed());
        }
        let marker = self.marker_at(index)?.clone();
        let mut outcome = EventOutcome::default();
        self.state.selected_marker = Some(marker.clone());
        self.state.interaction = InteractionState::MarkerSelected;
        self.state.map_drag_enabled = false;
        outcome.meta(props::SELECTED_MARKER, encode(&marker));
        if self.behavior.center_on_click {
            self.move_center(marker.position(), &mut outcome);
        }
        outcome.trigger(props::ON_MARKER_CLICK, marker);
        if self.behavior.center_on_click {
            outcome.render.push(RenderCommand::FlyTo {
                center: self.state.center.clone(),
                zoom: self.state.zoom,
            });
        }
        outcome.render.push(RenderCommand::SetDragEnabled { enabled: false });
        Ok(outcome)
    }

    fn on_marker_moved(&mut self, index: usize, lat: f64, long: f64) -> Result<EventOutcome, EventRejected> {
        check_coordinates(lat, long, "markerMoved")?;
        let previous = self.marker_at(index)?.clone();
        let mut outcome = EventOutcome::default();

        let mut moved = previous.clone();
        moved.lat = lat;
        moved.long = long;
        self.state.markers[index] = moved.clone();
        outcome.meta(props::MARKERS, encode(&self.state.markers));
        if self.state.selected_marker.as_ref() == Some(&previous) {
            outcome.meta(props::SELECTED_MARKER, encode(&moved));
            self.state.selected_marker = Some(moved);
        }
        if self.state.interaction == InteractionState::CreatingMarker {
            self.state.interaction = if self.state.selected_marker.is_some() {
                InteractionState::MarkerSelected
            } else {
                InteractionState::Idle
            };
        }
        self.enable_map_drag(&mut outcome);
        Ok(outcome)
    }

    fn on_marker_deselected(&mut self) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        self.clear_selection(&mut outcome);
        self.enable_map_drag(&mut outcome);
        outcome
    }

    fn on_gesture_start(&mut self, shape: FeatureShape) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        if self.state.interaction == InteractionState::Dragging {
            return outcome;
        }
        tracing::debug!(shape = ?shape, "drawing gesture started");
        self.resume = self.state.interaction;
        self.state.interaction = InteractionState::Dragging;
        self.state.pan_zoom_enabled = false;
        outcome.render.push(RenderCommand::SetInteraction { pan_zoom: false });
        outcome
    }

    fn on_feature(&mut self, op: FeatureOp, feature: &DrawnFeature) -> Result<EventOutcome, EventRejected> {
        let collection = match feature.shape {
            FeatureShape::Circle => edit_collection(&mut self.state.circles, op, feature, &Circle::schema())?,
            FeatureShape::Line => edit_collection(&mut self.state.lines, op, feature, &Line::schema())?,
            FeatureShape::Polygon => {
                edit_collection(&mut self.state.polygons, op, feature, &Polygon::schema())?
            }
            FeatureShape::GeoJson => {
                edit_collection(&mut self.state.geo_features, op, feature, &GeoFeature::schema())?
            }
        };
        let mut outcome = EventOutcome::default();
        outcome.meta(feature.shape.property(), collection);
        self.end_gesture(&mut outcome);
        Ok(outcome)
    }

    fn on_bounds_change(&mut self, bounds: &Bounds) -> Result<EventOutcome, EventRejected> {
        if self.state.interaction == InteractionState::Dragging {
            tracing::debug!("bounds change ignored during drawing gesture");
            return Ok(EventOutcome::suppressed());
        }
        check_coordinates(bounds.south_west.lat, bounds.south_west.long, "boundsChange.southWest")?;
        check_coordinates(bounds.north_east.lat, bounds.north_east.long, "boundsChange.northEast")?;
        let mut outcome = EventOutcome::default();
        self.set_bounds(bounds.clone(), &mut outcome);
        Ok(outcome)
    }

    // -- helpers -----------------------------------------------------------

    fn marker_at(&self, index: usize) -> Result<&Marker, EventRejected> {
        self.state.markers.get(index).ok_or(EventRejected::UnknownMarker {
            index,
            len: self.state.markers.len(),
        })
    }

    fn projected_bounds(&self) -> Bounds {
        Bounds::around(&self.state.center, self.state.zoom, &self.viewport)
    }

    fn move_center(&mut self, center: LatLong, outcome: &mut EventOutcome) {
        self.state.center = center;
        outcome.meta(props::CENTER, encode(&self.state.center));
        self.update_bounds(outcome);
    }

    fn update_bounds(&mut self, outcome: &mut EventOutcome) {
        let bounds = self.projected_bounds();
        self.set_bounds(bounds, outcome);
    }

    /// Structural comparison: an identical rectangle is not an update.
    fn set_bounds(&mut self, bounds: Bounds, outcome: &mut EventOutcome) {
        if self.state.bounds.as_ref() == Some(&bounds) {
            return;
        }
        outcome.meta(props::MAP_BOUNDS, encode(&bounds));
        self.state.bounds = Some(bounds);
    }

    fn clear_selection(&mut self, outcome: &mut EventOutcome) {
        if self.state.selected_marker.take().is_some() {
            outcome.meta(props::SELECTED_MARKER, Value::Null);
        }
        if matches!(
            self.state.interaction,
            InteractionState::MarkerSelected | InteractionState::CreatingMarker
        ) {
            self.state.interaction = InteractionState::Idle;
        }
        if self.resume != InteractionState::Dragging {
            self.resume = InteractionState::Idle;
        }
    }

    fn enable_map_drag(&mut self, outcome: &mut EventOutcome) {
        if !self.state.map_drag_enabled {
            self.state.map_drag_enabled = true;
            outcome.render.push(RenderCommand::SetDragEnabled { enabled: true });
        }
    }

    /// Clears selection and aborts any gesture.
    fn enter_idle(&mut self, outcome: &mut EventOutcome) {
        self.clear_selection(outcome);
        self.end_gesture(outcome);
        self.state.interaction = InteractionState::Idle;
        self.enable_map_drag(outcome);
    }

    fn end_gesture(&mut self, outcome: &mut EventOutcome) {
        if self.state.interaction == InteractionState::Dragging {
            self.state.interaction = std::mem::take(&mut self.resume);
            self.state.pan_zoom_enabled = true;
            outcome.render.push(RenderCommand::SetInteraction { pan_zoom: true });
        }
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.state.selection_is_consistent(),
            "selected marker is not one of the markers"
        );
        debug_assert!(self.state.center.is_valid(), "center out of range");
        debug_assert!(self.resume != InteractionState::Dragging, "gesture resumes into a gesture");
    }
}

/// Validates an event's coordinate pair. Any finding rejects the event.
fn check_coordinates(lat: f64, long: f64, path: &str) -> Result<(), EventRejected> {
    let payload = Value::Map(
        [
            ("lat".to_string(), Value::from(lat)),
            ("long".to_string(), Value::from(long)),
        ]
        .into_iter()
        .collect(),
    );
    let validated = validate(Some(&payload), &coordinates_schema(), path);
    if validated.is_clean() {
        Ok(())
    } else {
        Err(EventRejected::InvalidPayload {
            findings: validated.findings,
        })
    }
}

/// Applies a drawn feature to its collection and returns the new collection.
/// Nothing is modified unless the feature validates and its index exists.
fn edit_collection<T>(
    items: &mut Vec<T>,
    op: FeatureOp,
    feature: &DrawnFeature,
    schema: &PropertySchema,
) -> Result<Value, EventRejected>
where
    T: DeserializeOwned + Serialize,
{
    let path = feature.shape.property();
    let item = if op == FeatureOp::Delete {
        None
    } else {
        Some(decode_feature(feature, schema, path)?)
    };
    let len = items.len();
    let existing = feature.index.filter(|index| *index < len);
    match (op, item, existing) {
        (FeatureOp::Create, Some(item), _) => items.push(item),
        (FeatureOp::Edit, Some(item), Some(index)) => items[index] = item,
        (FeatureOp::Delete, _, Some(index)) => {
            items.remove(index);
        }
        _ => {
            return Err(EventRejected::UnknownFeature {
                shape: feature.shape,
                index: feature.index,
                len,
            })
        }
    }
    Ok(encode(&*items))
}

fn decode_feature<T: DeserializeOwned>(
    feature: &DrawnFeature,
    schema: &PropertySchema,
    path: &str,
) -> Result<T, EventRejected> {
    if feature.data.is_null() {
        return Err(EventRejected::InvalidPayload {
            findings: vec![Finding::MissingRequired {
                path: path.to_string(),
                key: "data".to_string(),
            }],
        });
    }
    let validated = validate(Some(&feature.data), schema, path);
    if !validated.is_clean() {
        return Err(EventRejected::InvalidPayload {
            findings: validated.findings,
        });
    }
    validated
        .value
        .as_ref()
        .and_then(decode)
        .ok_or_else(|| EventRejected::InvalidPayload {
            findings: Vec::new(),
        })
}
