//! Interactive map widget: property pane declaration, live view state, and
//! the validated-value API a host application drives.

pub mod config;
pub mod content_config;
pub mod event;
pub mod frame;
pub mod geometry;
pub mod instance;
pub mod observer;
pub mod reconciler;

pub use config::{MapWidgetConfig, ViewportConfig};
pub use content_config::{map_widget_registry, props, WIDGET_TYPE};
pub use event::{
    DrawnFeature, EventOutcome, EventRejected, FeatureShape, MapEvent, MetaUpdate, RenderCommand,
    TriggerEvent,
};
pub use frame::{decode_frame, encode_frame};
pub use geometry::{Bounds, Circle, GeoFeature, LatLong, Line, Marker, Polygon, TileLayer};
pub use instance::{MapWidget, RawValue};
pub use observer::{CompositeWidgetObserver, Notification, RecordingObserver, WidgetObserver};
pub use reconciler::{InteractionState, LayerToggles, MapViewState, StateReconciler};
