//! Inputs to and outputs of the state reconciler.
//!
//! [`MapEvent`]s come from the mapping and drawing libraries. Every accepted
//! event or property change produces an [`EventOutcome`]: meta property
//! updates, trigger events for the host's action runner, and render commands
//! for the map surface, in that order.

use mapwidget_core::{Finding, Value};
use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds, LatLong, Marker};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Kind of shape a drawing gesture operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureShape {
    Circle,
    Line,
    Polygon,
    GeoJson,
}

impl FeatureShape {
    /// Collection property the shape is stored in.
    #[must_use]
    pub fn property(self) -> &'static str {
        use crate::content_config::props;
        match self {
            Self::Circle => props::CIRCLES,
            Self::Line => props::LINES,
            Self::Polygon => props::POLYGONS,
            Self::GeoJson => props::GEO_JSON,
        }
    }
}

/// A feature reported by the drawing tool. `index` addresses an existing
/// element of the shape's collection for edits and deletions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawnFeature {
    pub shape: FeatureShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default)]
    pub data: Value,
}

/// User interaction reported by the map surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MapEvent {
    MapClick { lat: f64, long: f64 },
    /// `index` into the current markers.
    MarkerClick { index: usize },
    /// A marker drag ended at `lat`/`long`.
    MarkerMoved { index: usize, lat: f64, long: f64 },
    /// The selected marker's popup was closed.
    MarkerDeselected,
    GestureStart { shape: FeatureShape },
    FeatureCreate(DrawnFeature),
    FeatureEdit(DrawnFeature),
    FeatureDelete(DrawnFeature),
    BoundsChange(Bounds),
}

impl MapEvent {
    /// Short name used in log fields.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::MapClick { .. } => "mapClick",
            Self::MarkerClick { .. } => "markerClick",
            Self::MarkerMoved { .. } => "markerMoved",
            Self::MarkerDeselected => "markerDeselected",
            Self::GestureStart { .. } => "gestureStart",
            Self::FeatureCreate(_) => "featureCreate",
            Self::FeatureEdit(_) => "featureEdit",
            Self::FeatureDelete(_) => "featureDelete",
            Self::BoundsChange(_) => "boundsChange",
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// New value of a meta property, e.g. `selectedMarker`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaUpdate {
    pub name: String,
    pub value: Value,
}

/// Request to run the action bound to a trigger property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    /// Trigger property, e.g. `onMarkerClick`.
    pub property: String,
    /// Handler reference currently stored in the property, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    pub payload: Marker,
}

/// Imperative instruction for the rendered map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RenderCommand {
    /// Animated move, used when a clicked marker is centered.
    FlyTo { center: LatLong, zoom: f64 },
    SetView { center: LatLong, zoom: f64 },
    SetDragEnabled { enabled: bool },
    /// Pan and zoom by the user; suppressed while a drawing gesture is in progress.
    SetInteraction { pan_zoom: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOutcome {
    pub meta_updates: Vec<MetaUpdate>,
    pub triggers: Vec<TriggerEvent>,
    pub render: Vec<RenderCommand>,
    /// The event arrived in a state that ignores it.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub suppressed: bool,
}

impl EventOutcome {
    pub(crate) fn suppressed() -> Self {
        Self {
            suppressed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meta_updates.is_empty() && self.triggers.is_empty() && self.render.is_empty()
    }

    pub(crate) fn meta(&mut self, name: &str, value: Value) {
        self.meta_updates.push(MetaUpdate {
            name: name.to_string(),
            value,
        });
    }

    pub(crate) fn trigger(&mut self, property: &str, payload: Marker) {
        self.triggers.push(TriggerEvent {
            property: property.to_string(),
            handler: None,
            payload,
        });
    }

    /// Last update of `name` in this outcome.
    #[must_use]
    pub fn meta_value(&self, name: &str) -> Option<&Value> {
        self.meta_updates
            .iter()
            .rev()
            .find(|update| update.name == name)
            .map(|update| &update.value)
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why an event was refused. The view state is unchanged after a rejection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventRejected {
    #[error("event payload failed validation ({} finding(s)): {}", .findings.len(), first_finding(.findings))]
    InvalidPayload { findings: Vec<Finding> },
    #[error("no marker at index {index} ({len} markers)")]
    UnknownMarker { index: usize, len: usize },
    #[error("no {shape:?} at index {index:?} ({len} present)")]
    UnknownFeature {
        shape: FeatureShape,
        index: Option<usize>,
        len: usize,
    },
}

fn first_finding(findings: &[Finding]) -> String {
    findings
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}
