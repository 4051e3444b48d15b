//! Replays a recorded map widget session and prints the resulting state.
//!
//! A scenario is a JSON document:
//!
//! ```json
//! {
//!   "properties": { "enableCreateMarker": true, "zoom": "{{Slider1.value}}" },
//!   "events": [ { "type": "mapClick", "lat": 40.7, "long": -74.0 } ]
//! }
//! ```
//!
//! Property values written as `{{...}}` are treated as bindings. Usage:
//!
//!   map-replay --scenario session.json --viewport 1024x768 --log-format json

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use mapwidget::{
    map_widget_registry, EventOutcome, MapEvent, MapViewState, MapWidget, MapWidgetConfig,
    RawValue, ViewportConfig,
};
use mapwidget_core::Value;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "map-replay", about = "Replay a map widget scenario")]
struct Args {
    /// Scenario file
    #[arg(long)]
    scenario: PathBuf,

    /// Viewport used for bounds, as WIDTHxHEIGHT in pixels
    #[arg(long, default_value = "800x600", value_parser = parse_viewport)]
    viewport: ViewportConfig,

    #[arg(long, default_value = "Map1")]
    widget_id: String,

    #[arg(long, value_enum, default_value = "text", env = "MAPWIDGET_LOG_FORMAT")]
    log_format: LogFormat,
}

fn parse_viewport(text: &str) -> Result<ViewportConfig, String> {
    ViewportConfig::parse(text).ok_or_else(|| format!("expected WIDTHxHEIGHT, got {text:?}"))
}

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    properties: BTreeMap<String, Value>,
    #[serde(default)]
    events: Vec<MapEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    widget_id: &'a str,
    view_state: &'a MapViewState,
    hidden: Vec<&'a str>,
    findings: BTreeMap<&'a str, Vec<String>>,
    steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Step {
    Applied(EventOutcome),
    Rejected(String),
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn raw_value(value: Value) -> RawValue {
    match value {
        Value::String(text) if text.trim_start().starts_with("{{") => RawValue::Binding(text),
        other => RawValue::Literal(other),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format);

    let text = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading scenario {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&text)
        .with_context(|| format!("parsing scenario {}", args.scenario.display()))?;

    let config = MapWidgetConfig {
        widget_id: args.widget_id,
        viewport: args.viewport,
        ..MapWidgetConfig::default()
    };
    let mut widget = MapWidget::new(Arc::new(map_widget_registry()), config);
    tracing::info!(
        widget = %widget.widget_id(),
        properties = scenario.properties.len(),
        events = scenario.events.len(),
        "replaying scenario"
    );

    let mut steps = Vec::with_capacity(scenario.events.len() + 1);
    let changes = scenario
        .properties
        .into_iter()
        .map(|(name, value)| (name, raw_value(value)))
        .collect();
    steps.push(Step::Applied(widget.set_properties(changes)));
    for event in &scenario.events {
        steps.push(match widget.dispatch(event) {
            Ok(outcome) => Step::Applied(outcome),
            Err(rejected) => Step::Rejected(rejected.to_string()),
        });
    }

    let report = Report {
        widget_id: widget.widget_id(),
        view_state: widget.view_state(),
        hidden: widget.visibility().hidden(),
        findings: widget
            .findings()
            .iter()
            .map(|(name, findings)| {
                (name.as_str(), findings.iter().map(ToString::to_string).collect())
            })
            .collect(),
        steps,
    };
    let output = serde_json::to_string_pretty(&report).context("serializing report")?;
    println!("{output}");
    Ok(())
}
