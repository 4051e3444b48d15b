//! Property pane declaration of the map widget.
//!
//! [`map_widget_registry`] builds the registry shared by every map widget
//! instance: the `General`, `Layers`, `Events` and `Style` sections plus the
//! meta properties the reconciler maintains at runtime.

use mapwidget_core::{
    ControlType, PropertyDescriptor, PropertyRegistry, PropertySchema, PropertySection,
    SubstitutionMode, Value, VisibilityRule,
};

use crate::geometry::{Circle, GeoFeature, LatLong, Line, Marker, Polygon, TileLayer};

/// Widget type name the registry is built for.
pub const WIDGET_TYPE: &str = "MAP_WIDGET";

/// Property names shared by the declaration, the reconciler and the instance.
pub mod props {
    pub const TILE_LAYERS: &str = "tileLayers";
    pub const MAP_CENTER: &str = "mapCenter";
    pub const DEFAULT_MARKERS: &str = "defaultMarkers";
    pub const IS_CLICKED_MARKER_CENTERED: &str = "isClickedMarkerCentered";
    pub const ENABLE_CREATE_MARKER: &str = "enableCreateMarker";
    pub const ENABLE_REPLACE_MARKER: &str = "enableReplaceMarker";
    pub const CIRCLES: &str = "circles";
    pub const LINES: &str = "lines";
    pub const POLYGONS: &str = "polygons";
    pub const GEO_JSON: &str = "geoJSON";
    pub const IS_VISIBLE: &str = "isVisible";
    pub const ANIMATE_LOADING: &str = "animateLoading";
    pub const ALLOW_ZOOM: &str = "allowZoom";
    pub const ZOOM: &str = "zoom";
    pub const ZOOM_LOCATION: &str = "zoomLocation";
    pub const MARKER_TEXT: &str = "markerText";

    pub const ENABLE_MAP_LAYER: &str = "enableMapLayer";
    pub const URL: &str = "url";
    pub const ATTRIBUTION: &str = "attribution";
    pub const MAP_OPACITY: &str = "mapOpacity";
    pub const ENABLE_TILE_LAYERS: &str = "enableTileLayers";
    pub const ENABLE_DEFAULT_MARKERS: &str = "enableDefaultMarkers";
    pub const ENABLE_CIRCLES: &str = "enableCircles";
    pub const ENABLE_LINES: &str = "enableLines";
    pub const ENABLE_POLYGONS: &str = "enablePolygons";
    pub const ENABLE_GEO_JSON: &str = "enableGeoJSON";

    pub const ON_MARKER_CLICK: &str = "onMarkerClick";
    pub const ON_CREATE_MARKER: &str = "onCreateMarker";

    pub const BORDER_RADIUS: &str = "borderRadius";
    pub const BOX_SHADOW: &str = "boxShadow";

    // Meta properties.
    pub const CENTER: &str = "center";
    pub const MARKERS: &str = "markers";
    pub const SELECTED_MARKER: &str = "selectedMarker";
    pub const MAP_BOUNDS: &str = "mapBounds";

    /// Meta properties whose value is owned by the live view state.
    pub const LIVE: [&str; 4] = [CENTER, MARKERS, SELECTED_MARKER, MAP_BOUNDS];
}

const OSM_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_ATTRIBUTION: &str =
    "&copy; <a href='https://www.openstreetmap.org/copyright'>OpenStreetMap</a> contributors";

const DEFAULT_TILE_LAYERS: &str = r#"[{ "name": "OpenStreetMaps", "url": "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png", "attribution": "&copy; <a href=`https://www.openstreetmap.org/copyright`>OpenStreetMap</a> contributors", "opacity": 1 }]"#;
const DEFAULT_CIRCLES: &str = r#"[{"lat": 51.505, "long": -0.0755, "radius": 200, "title":"Tower Bridge", "options": {"color":"green","fillColor":"green"}}]"#;
const DEFAULT_LINES: &str =
    r#"[{"positions":[[51.505, -0.09],[51.51, -0.1],[51.51, -0.12]], "options": {"color":"green"}}]"#;
const DEFAULT_POLYGONS: &str = r#"[{"positions":[[51.515, -0.09],[51.52, -0.1],[51.52, -0.12]], "options": {"color":"green","fillColor":"green", "title":"Tower Bridge"}}]"#;
const DEFAULT_GEO_JSON: &str = r##"[{"data":[{"type": "Feature", "properties": {}, "coordinates": [[51.515, -0.09],[51.52, -0.1],[51.52, -0.12]]}], "style": "#4a83ec"}]"##;

fn default_center() -> Value {
    Value::Map(
        [
            ("lat".to_string(), Value::Float(51.505)),
            ("long".to_string(), Value::Float(-0.09)),
        ]
        .into_iter()
        .collect(),
    )
}

fn switch(name: &str, label: &str) -> PropertyDescriptor {
    PropertyDescriptor::new(name)
        .label(label)
        .control(ControlType::Switch)
        .with_schema(PropertySchema::Boolean)
}

fn bindable_switch(name: &str, label: &str, default: bool) -> PropertyDescriptor {
    switch(name, label).with_default(default).bindable()
}

fn collection(name: &str, label: &str, element: PropertySchema, default: &str) -> PropertyDescriptor {
    PropertyDescriptor::new(name)
        .label(label)
        .with_schema(PropertySchema::array_of(element))
        .with_default(default)
        .bindable()
        .substitution(SubstitutionMode::SmartSubstitute)
}

fn general_section() -> PropertySection {
    PropertySection::new(
        "General",
        vec![
            collection(
                props::TILE_LAYERS,
                "Array of Tile Layers",
                TileLayer::schema(),
                DEFAULT_TILE_LAYERS,
            )
            .help_text("Url and attribution for maptiles, ensure you comply with any usage policy.")
            .visibility(VisibilityRule::unless_enabled(props::ENABLE_TILE_LAYERS)),
            PropertyDescriptor::new(props::MAP_CENTER)
                .label("Initial location")
                .with_schema(LatLong::schema())
                .with_default(default_center())
                .bindable(),
            PropertyDescriptor::new(props::DEFAULT_MARKERS)
                .label("Default markers")
                .help_text("Sets the default markers on the map")
                .with_schema(PropertySchema::array_of(Marker::schema()))
                .with_default(Value::Array(Vec::new()))
                .bindable()
                .substitution(SubstitutionMode::SmartSubstitute)
                .visibility(VisibilityRule::unless_enabled(props::ENABLE_DEFAULT_MARKERS)),
            switch(props::IS_CLICKED_MARKER_CENTERED, "Map & Marker centering")
                .help_text("Controls whether the clicked marker is centered on the map")
                .with_default(false),
            switch(props::ENABLE_CREATE_MARKER, "Create new marker")
                .help_text("Allows users to mark locations on the map")
                .with_default(false),
            switch(props::ENABLE_REPLACE_MARKER, "Replace existing marker")
                .help_text("Replaces the existing marker instead of adding another")
                .with_default(false)
                .visibility(VisibilityRule::unless_enabled(props::ENABLE_CREATE_MARKER)),
            collection(props::CIRCLES, "Circles to draw on Map", Circle::schema(), DEFAULT_CIRCLES)
                .help_text("Draws circles on the map")
                .visibility(VisibilityRule::unless_enabled(props::ENABLE_CIRCLES)),
            collection(props::LINES, "Lines to draw on Map", Line::schema(), DEFAULT_LINES)
                .help_text("Draws lines on the map")
                .visibility(VisibilityRule::unless_enabled(props::ENABLE_LINES)),
            collection(props::POLYGONS, "Polygons to draw on Map", Polygon::schema(), DEFAULT_POLYGONS)
                .help_text("Draws polygons on the map")
                .visibility(VisibilityRule::unless_enabled(props::ENABLE_POLYGONS)),
            collection(
                props::GEO_JSON,
                "GeoJSON features to draw on Map",
                GeoFeature::schema(),
                DEFAULT_GEO_JSON,
            )
            .help_text("Draws GeoJSON features on the map")
            .visibility(VisibilityRule::unless_enabled(props::ENABLE_GEO_JSON)),
            bindable_switch(props::IS_VISIBLE, "Visible", true)
                .help_text("Controls the visibility of the widget"),
            bindable_switch(props::ANIMATE_LOADING, "Animate Loading", true)
                .help_text("Controls the loading of the widget"),
            bindable_switch(props::ALLOW_ZOOM, "Show Zoom control", true)
                .help_text("Controls the visibility of the zoom controls"),
            PropertyDescriptor::new(props::ZOOM)
                .label("Zoom")
                .help_text("Zoom level of map")
                .with_schema(PropertySchema::number_with_default(0.0, 25.0, 10.0))
                .with_default(Value::Int(13))
                .bindable(),
            PropertyDescriptor::new(props::ZOOM_LOCATION)
                .label("Zoom control position")
                .control(ControlType::Dropdown)
                .with_schema(PropertySchema::Text)
                .with_default("topleft")
                .visibility(VisibilityRule::unless_enabled(props::ALLOW_ZOOM)),
            PropertyDescriptor::new(props::MARKER_TEXT)
                .label("Marker Text")
                .help_text("Text of marker in center of map")
                .with_schema(PropertySchema::Text)
                .bindable(),
        ],
    )
}

fn layers_section() -> PropertySection {
    PropertySection::new(
        "Layers",
        vec![
            switch(props::ENABLE_MAP_LAYER, "Base map layer").with_default(true),
            PropertyDescriptor::new(props::URL)
                .label("Tile url")
                .with_schema(PropertySchema::Url)
                .with_default(OSM_TILE_URL)
                .bindable()
                .visibility(VisibilityRule::unless_enabled(props::ENABLE_MAP_LAYER)),
            PropertyDescriptor::new(props::ATTRIBUTION)
                .label("Attribution")
                .with_schema(PropertySchema::Text)
                .with_default(OSM_ATTRIBUTION)
                .bindable()
                .visibility(VisibilityRule::unless_enabled(props::ENABLE_MAP_LAYER)),
            PropertyDescriptor::new(props::MAP_OPACITY)
                .label("Opacity")
                .with_schema(PropertySchema::number_with_default(0.0, 1.0, 1.0))
                .bindable()
                .visibility(VisibilityRule::unless_enabled(props::ENABLE_MAP_LAYER)),
            switch(props::ENABLE_TILE_LAYERS, "Tile layers").with_default(false),
            switch(props::ENABLE_DEFAULT_MARKERS, "Default markers").with_default(false),
            switch(props::ENABLE_CIRCLES, "Circles").with_default(true),
            switch(props::ENABLE_LINES, "Lines").with_default(false),
            switch(props::ENABLE_POLYGONS, "Polygons").with_default(false),
            switch(props::ENABLE_GEO_JSON, "GeoJSON").with_default(false),
        ],
    )
}

fn events_section() -> PropertySection {
    PropertySection::new(
        "Events",
        vec![
            PropertyDescriptor::new(props::ON_MARKER_CLICK)
                .label("onMarkerClick")
                .trigger(),
            PropertyDescriptor::new(props::ON_CREATE_MARKER)
                .label("onCreateMarker")
                .trigger(),
        ],
    )
}

fn style_section() -> PropertySection {
    PropertySection::new(
        "Style",
        vec![
            PropertyDescriptor::new(props::BORDER_RADIUS)
                .label("Border radius")
                .with_schema(PropertySchema::Text)
                .bindable(),
            PropertyDescriptor::new(props::BOX_SHADOW)
                .label("Box shadow")
                .with_schema(PropertySchema::Text)
                .bindable(),
        ],
    )
}

/// Runtime properties owned by the reconciler. They carry no section and are
/// not shown in the property pane.
fn meta_properties() -> Vec<PropertyDescriptor> {
    vec![
        PropertyDescriptor::new(props::CENTER)
            .with_schema(LatLong::schema())
            .derives_from(props::MAP_CENTER),
        PropertyDescriptor::new(props::MARKERS)
            .with_schema(PropertySchema::array_of(Marker::schema()))
            .derives_from(props::DEFAULT_MARKERS),
        PropertyDescriptor::new(props::SELECTED_MARKER).with_schema(Marker::schema()),
        PropertyDescriptor::new(props::MAP_BOUNDS),
    ]
}

/// Builds the registry of the map widget type.
#[must_use]
pub fn map_widget_registry() -> PropertyRegistry {
    let mut registry = PropertyRegistry::new(WIDGET_TYPE);
    registry.register_section(general_section());
    registry.register_section(layers_section());
    registry.register_section(events_section());
    registry.register_section(style_section());
    for descriptor in meta_properties() {
        registry.register(descriptor);
    }
    registry
}
