//! Configuration types for a map widget instance.

use crate::geometry::LatLong;

/// Per-instance configuration: identity plus the rendering surface the
/// reconciler projects bounds onto.
#[derive(Debug, Clone)]
pub struct MapWidgetConfig {
    /// Identifier used in log fields and observer callbacks.
    pub widget_id: String,
    /// Size of the rendered map in CSS pixels.
    pub viewport: ViewportConfig,
    /// Center used when `mapCenter` is unset or unusable.
    pub fallback_center: LatLong,
    /// Zoom used when `zoom` is unset.
    pub default_zoom: f64,
}

impl Default for MapWidgetConfig {
    fn default() -> Self {
        Self {
            widget_id: String::new(),
            viewport: ViewportConfig::default(),
            fallback_center: LatLong::new(40.7128, -74.0060),
            default_zoom: 13.0,
        }
    }
}

/// Dimensions of the rendered map. Bounds are derived from these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    pub width_px: f64,
    pub height_px: f64,
    /// Edge length of one Web-Mercator tile at zoom 0.
    pub tile_size_px: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width_px: 800.0,
            height_px: 600.0,
            tile_size_px: 256.0,
        }
    }
}

impl ViewportConfig {
    /// Parses `WIDTHxHEIGHT`, e.g. `1024x768`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let (width, height) = text.split_once(['x', 'X'])?;
        let width_px: f64 = width.trim().parse().ok()?;
        let height_px: f64 = height.trim().parse().ok()?;
        (width_px > 0.0 && height_px > 0.0 && width_px.is_finite() && height_px.is_finite()).then(
            || Self {
                width_px,
                height_px,
                ..Self::default()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widget_config_defaults() {
        let config = MapWidgetConfig::default();
        assert!(config.widget_id.is_empty());
        assert_eq!(config.viewport, ViewportConfig::default());
        assert_eq!(config.default_zoom, 13.0);
        assert_eq!(config.fallback_center.lat, 40.7128);
    }

    #[test]
    fn viewport_defaults() {
        let viewport = ViewportConfig::default();
        assert_eq!(viewport.width_px, 800.0);
        assert_eq!(viewport.height_px, 600.0);
        assert_eq!(viewport.tile_size_px, 256.0);
    }

    #[test]
    fn viewport_parse() {
        let viewport = ViewportConfig::parse("1024x768").unwrap();
        assert_eq!(viewport.width_px, 1024.0);
        assert_eq!(viewport.height_px, 768.0);
        assert!(ViewportConfig::parse("1024").is_none());
        assert!(ViewportConfig::parse("0x10").is_none());
        assert!(ViewportConfig::parse("ax10").is_none());
    }
}
