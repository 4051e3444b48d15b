//! Geometry entities drawn on the map, the schemas their configuration is
//! validated against, and the Web-Mercator bounds projection.
//!
//! Entities are decoded from already-normalized [`Value`]s, so decoding only
//! fails for values that never went through [`validate`](mapwidget_core::validate).

use std::f64::consts::PI;

use mapwidget_core::{KeySchema, PropertySchema, Value};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ViewportConfig;

/// Latitude limit of the square Web-Mercator world.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A coordinate pair, optionally labelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatLong {
    pub lat: f64,
    pub long: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl LatLong {
    #[must_use]
    pub fn new(lat: f64, long: f64) -> Self {
        Self {
            lat,
            long,
            title: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// `true` when `lat` is in `[-90, 90]` and `long` in `[-180, 180]`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.long)
    }

    /// Center objects accepted by `mapCenter` and the meta `center`.
    #[must_use]
    pub fn schema() -> PropertySchema {
        PropertySchema::object(vec![
            KeySchema::required("lat", latitude()),
            KeySchema::required("long", longitude()),
            KeySchema::optional("title", PropertySchema::Text),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub lat: f64,
    pub long: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Marker {
    #[must_use]
    pub fn at(lat: f64, long: f64) -> Self {
        Self {
            lat,
            long,
            title: None,
            popup_text: None,
            description: None,
        }
    }

    #[must_use]
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The marker's display text: `title`, else `popupText`.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.title.as_deref().or(self.popup_text.as_deref())
    }

    /// Position of the marker, labelled with its display text.
    #[must_use]
    pub fn position(&self) -> LatLong {
        LatLong::new(self.lat, self.long).with_title(self.label().map(str::to_string))
    }

    #[must_use]
    pub fn schema() -> PropertySchema {
        PropertySchema::object(vec![
            KeySchema::required("lat", latitude()),
            KeySchema::required("long", longitude()),
            KeySchema::optional("title", PropertySchema::Text),
            KeySchema::optional("popupText", PropertySchema::Text),
            KeySchema::optional("description", PropertySchema::Text),
        ])
    }
}

/// Styling shared by circles, lines and polygons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
}

impl PathOptions {
    fn schema(keys: &[&str]) -> PropertySchema {
        PropertySchema::object(
            keys.iter()
                .map(|key| KeySchema::optional(*key, PropertySchema::Text))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Circle {
    pub lat: f64,
    pub long: f64,
    /// Meters.
    pub radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<PathOptions>,
}

impl Circle {
    #[must_use]
    pub fn schema() -> PropertySchema {
        PropertySchema::object(vec![
            KeySchema::required("lat", latitude()),
            KeySchema::required("long", longitude()),
            KeySchema::required("radius", PropertySchema::number_with_default(0.0, 1_000_000.0, 200.0)),
            KeySchema::optional("title", PropertySchema::Text),
            KeySchema::optional("options", PathOptions::schema(&["title", "color", "fillColor"])),
        ])
    }
}

/// A polyline through `positions` (`[lat, long]` pairs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    #[serde(default)]
    pub positions: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<PathOptions>,
}

impl Line {
    #[must_use]
    pub fn schema() -> PropertySchema {
        PropertySchema::object(vec![
            KeySchema::required("positions", positions()),
            KeySchema::optional("options", PathOptions::schema(&["color"])),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polygon {
    #[serde(default)]
    pub positions: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<PathOptions>,
}

impl Polygon {
    #[must_use]
    pub fn schema() -> PropertySchema {
        PropertySchema::object(vec![
            KeySchema::required("positions", positions()),
            KeySchema::optional("options", PathOptions::schema(&["title", "color", "fillColor"])),
        ])
    }
}

/// An additional raster layer drawn over the base map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileLayer {
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub attribution: String,
    #[serde(default = "full_opacity")]
    pub opacity: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
}

fn full_opacity() -> f64 {
    1.0
}

fn default_max_zoom() -> f64 {
    18.0
}

impl TileLayer {
    #[must_use]
    pub fn schema() -> PropertySchema {
        PropertySchema::object(vec![
            KeySchema::required("name", PropertySchema::Text),
            KeySchema::required("url", PropertySchema::Url),
            KeySchema::required("attribution", PropertySchema::Text),
            KeySchema::optional("opacity", PropertySchema::number_with_default(0.0, 1.0, 1.0)),
            KeySchema::optional("maxZoom", PropertySchema::number_with_default(1.0, 25.0, 18.0)),
        ])
    }
}

/// A GeoJSON feature collection with an optional style expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoFeature {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl GeoFeature {
    #[must_use]
    pub fn schema() -> PropertySchema {
        let feature = PropertySchema::object(vec![
            KeySchema::optional("type", PropertySchema::Text),
            KeySchema::optional("properties", PropertySchema::Any),
            KeySchema::optional("coordinates", PropertySchema::array_of(PropertySchema::Any)),
            KeySchema::optional("geometry", PropertySchema::Any),
        ]);
        PropertySchema::object(vec![
            KeySchema::required("data", PropertySchema::array_of(feature)),
            KeySchema::optional("style", PropertySchema::Text),
        ])
    }
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Visible rectangle of the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub south_west: LatLong,
    pub north_east: LatLong,
}

impl Bounds {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.south_west.is_valid()
            && self.north_east.is_valid()
            && self.south_west.lat <= self.north_east.lat
    }

    /// Rectangle a `viewport` covers when centered on `center` at `zoom`.
    ///
    /// Latitudes are clamped to the Mercator limit and longitudes to
    /// `[-180, 180]`; a viewport wider than the world does not wrap.
    #[must_use]
    pub fn around(center: &LatLong, zoom: f64, viewport: &ViewportConfig) -> Self {
        let scale = viewport.tile_size_px * zoom.exp2();
        let (x, y) = project(center, scale);
        let half_width = viewport.width_px / 2.0;
        let half_height = viewport.height_px / 2.0;
        Self {
            south_west: unproject(x - half_width, y + half_height, scale),
            north_east: unproject(x + half_width, y - half_height, scale),
        }
    }
}

fn project(point: &LatLong, scale: f64) -> (f64, f64) {
    let lat = point.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (point.long + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
    (x, y)
}

fn unproject(x: f64, y: f64, scale: f64) -> LatLong {
    let long = (x / scale * 360.0 - 180.0).clamp(-180.0, 180.0);
    let n = PI * (1.0 - 2.0 * y / scale);
    let lat = n.sinh().atan().to_degrees().clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    LatLong::new(lat, long)
}

// ---------------------------------------------------------------------------
// Schema fragments and decoding
// ---------------------------------------------------------------------------

fn latitude() -> PropertySchema {
    PropertySchema::number_with_default(-90.0, 90.0, 0.0)
}

fn longitude() -> PropertySchema {
    PropertySchema::number_with_default(-180.0, 180.0, 0.0)
}

/// `[[lat, long], ...]`. A pair that is not exactly two usable numbers is dropped.
fn positions() -> PropertySchema {
    PropertySchema::array_of(PropertySchema::tuple(vec![
        PropertySchema::number(-90.0, 90.0),
        PropertySchema::number(-180.0, 180.0),
    ]))
}

/// Schema of an event payload carrying a coordinate pair. Unlike the
/// configuration schemas it declares no defaults, so a missing or unusable
/// coordinate is always reported.
#[must_use]
pub fn coordinates_schema() -> PropertySchema {
    PropertySchema::object(vec![
        KeySchema::required("lat", PropertySchema::number(-90.0, 90.0)),
        KeySchema::required("long", PropertySchema::number(-180.0, 180.0)),
    ])
}

/// Decodes a normalized value into an entity.
pub(crate) fn decode<T: DeserializeOwned>(value: &Value) -> Option<T> {
    match serde_json::from_value(value.to_json()) {
        Ok(decoded) => Some(decoded),
        Err(error) => {
            tracing::debug!(%error, "dropping value that does not decode");
            None
        }
    }
}

/// Decodes every element of a normalized array, dropping the ones that do not decode.
pub(crate) fn decode_list<T: DeserializeOwned>(value: Option<&Value>) -> Vec<T> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(decode).collect())
        .unwrap_or_default()
}

/// Encodes an entity as a [`Value`]. Entities always have a JSON form; a
/// failure yields `Null`.
pub(crate) fn encode<T: Serialize>(item: &T) -> Value {
    serde_json::to_value(item).map_or(Value::Null, Value::from)
}

#[cfg(test)]
mod tests {
    use mapwidget_core::{validate, Finding, FindingKind};

    use super::*;

    fn parse(json: &str) -> Value {
        Value::from_json_str(json).unwrap()
    }

    #[test]
    fn marker_label_prefers_title() {
        let mut marker = Marker::at(1.0, 2.0);
        assert_eq!(marker.label(), None);
        marker.popup_text = Some("popup".to_string());
        assert_eq!(marker.label(), Some("popup"));
        marker.title = Some("title".to_string());
        assert_eq!(marker.label(), Some("title"));
        assert_eq!(marker.position().title.as_deref(), Some("title"));
    }

    #[test]
    fn lat_long_validity() {
        assert!(LatLong::new(90.0, -180.0).is_valid());
        assert!(!LatLong::new(90.5, 0.0).is_valid());
        assert!(!LatLong::new(0.0, 181.0).is_valid());
        assert!(!LatLong::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn default_circle_config_decodes() {
        let raw = parse(
            r#"[{"lat": 51.505, "long": -0.0755, "radius": 200, "title":"Tower Bridge", "options": {"color":"green","fillColor":"green"}}]"#,
        );
        let validated = validate(Some(&raw), &PropertySchema::array_of(Circle::schema()), "circles");
        assert!(validated.is_clean());
        let circles: Vec<Circle> = decode_list(validated.value.as_ref());
        assert_eq!(circles.len(), 1);
        assert_eq!(circles[0].radius, 200.0);
        assert_eq!(circles[0].title.as_deref(), Some("Tower Bridge"));
        assert_eq!(
            circles[0].options.as_ref().and_then(|o| o.fill_color.as_deref()),
            Some("green")
        );
    }

    #[test]
    fn tile_layer_defaults_fill_in() {
        let raw = parse(r#"{"name": "osm", "url": "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png", "attribution": "osm"}"#);
        let validated = validate(Some(&raw), &TileLayer::schema(), "tileLayers[0]");
        let layer: TileLayer = decode(validated.value.as_ref().unwrap()).unwrap();
        assert_eq!(layer.opacity, 1.0);
        assert_eq!(layer.max_zoom, 18.0);
    }

    #[test]
    fn tile_layer_with_script_url_is_dropped() {
        let raw = parse(r#"[{"name": "evil", "url": "javascript:alert(1)", "attribution": ""}]"#);
        let validated = validate(Some(&raw), &PropertySchema::array_of(TileLayer::schema()), "tileLayers");
        assert_eq!(validated.value, Some(Value::Array(Vec::new())));
        assert_eq!(validated.findings[0].kind(), FindingKind::UnsafeUrl);
    }

    #[test]
    fn line_positions_are_pairs_of_numbers() {
        let raw = parse(
            r#"{"positions": [[51.505, -0.09], [51.51, "x"], [51.5], [120, 10]], "options": {"color": "green"}}"#,
        );
        let validated = validate(Some(&raw), &Line::schema(), "lines[0]");
        let line: Line = decode(validated.value.as_ref().unwrap()).unwrap();
        assert_eq!(line.positions, vec![vec![51.505, -0.09], vec![90.0, 10.0]]);
        let kinds: Vec<FindingKind> = validated.findings.iter().map(Finding::kind).collect();
        assert_eq!(
            kinds,
            vec![FindingKind::TypeMismatch, FindingKind::TypeMismatch, FindingKind::OutOfRange]
        );
    }

    #[test]
    fn geo_feature_keeps_feature_objects() {
        let raw = parse(
            r#"{"data": [{"type": "Feature", "properties": {"name": "a"}, "coordinates": [1, 2]}], "style": "blue"}"#,
        );
        let validated = validate(Some(&raw), &GeoFeature::schema(), "geoJSON[0]");
        assert!(validated.is_clean());
        let feature: GeoFeature = decode(validated.value.as_ref().unwrap()).unwrap();
        assert_eq!(feature.data.len(), 1);
        assert_eq!(feature.style.as_deref(), Some("blue"));
    }

    #[test]
    fn coordinates_schema_reports_missing_lat() {
        let raw = parse(r#"{"long": 3}"#);
        let validated = validate(Some(&raw), &coordinates_schema(), "event");
        assert_eq!(validated.findings[0].kind(), FindingKind::MissingRequired);
    }

    #[test]
    fn bounds_are_centered_on_center() {
        let center = LatLong::new(0.0, 0.0);
        let bounds = Bounds::around(&center, 2.0, &ViewportConfig::default());
        assert!(bounds.is_valid());
        assert!((bounds.south_west.long + bounds.north_east.long).abs() < 1e-9);
        assert!((bounds.south_west.lat + bounds.north_east.lat).abs() < 1e-9);
        // 800px at zoom 2 is 800 / 1024 of the world's width.
        assert!((bounds.north_east.long - 140.625).abs() < 1e-9);
    }

    #[test]
    fn bounds_shrink_as_zoom_grows() {
        let center = LatLong::new(51.505, -0.09);
        let viewport = ViewportConfig::default();
        let wide = Bounds::around(&center, 10.0, &viewport);
        let narrow = Bounds::around(&center, 13.0, &viewport);
        let span = |b: &Bounds| b.north_east.long - b.south_west.long;
        assert!(span(&narrow) < span(&wide));
        assert!(narrow.south_west.lat < center.lat && center.lat < narrow.north_east.lat);
    }

    #[test]
    fn bounds_clamp_at_world_edges() {
        let bounds = Bounds::around(&LatLong::new(85.0, 180.0), 0.0, &ViewportConfig::default());
        assert!(bounds.is_valid());
        assert_eq!(bounds.north_east.lat, MAX_MERCATOR_LAT);
        assert_eq!(bounds.north_east.long, 180.0);
    }

    #[test]
    fn encode_uses_camel_case() {
        let mut marker = Marker::at(1.0, 2.0);
        marker.popup_text = Some("p".to_string());
        let encoded = encode(&marker);
        assert_eq!(encoded.get("popupText"), Some(&Value::from("p")));
        assert!(encoded.get("title").is_none());
    }
}
