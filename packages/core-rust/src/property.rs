//! Property descriptors and the per-widget-type registry that holds them.
//!
//! A widget type is nothing more than an ordered set of [`PropertyDescriptor`]s,
//! grouped into [`PropertySection`]s for the property pane. The registry is
//! built once when the widget type is defined and is read-only afterwards; wrap
//! it in an `Arc` to share it between every instance of the type.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::schema::PropertySchema;
use crate::traits::{Bindable, Derivable, Triggerable};
use crate::types::Value;
use crate::visibility::VisibilityRule;

// ---------------------------------------------------------------------------
// PropertyDescriptor
// ---------------------------------------------------------------------------

/// How the host's binding evaluator substitutes bound expressions.
///
/// Opaque to this crate: it is carried through so the host evaluator can read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubstitutionMode {
    #[default]
    Template,
    SmartSubstitute,
    Parameter,
}

/// Input control the property pane renders for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlType {
    #[default]
    InputText,
    Switch,
    Dropdown,
    ActionSelector,
}

/// Declaration of a single widget property.
///
/// Built with chained setters:
///
/// ```
/// use mapwidget_core::{PropertyDescriptor, PropertySchema, VisibilityRule};
///
/// let url = PropertyDescriptor::new("url")
///     .label("Tile url")
///     .with_schema(PropertySchema::Url)
///     .bindable()
///     .visibility(VisibilityRule::unless_enabled("enableMapLayer"));
/// assert!(url.dependencies.contains("enableMapLayer"));
/// ```
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub label: String,
    pub help_text: Option<String>,
    /// Property-pane section; assigned by [`PropertyRegistry::register_section`].
    pub section: Option<String>,
    pub control: ControlType,
    pub schema: Option<PropertySchema>,
    pub default_value: Option<Value>,
    pub is_bindable: bool,
    pub is_trigger: bool,
    pub substitution: SubstitutionMode,
    /// Every property this one's visibility or computation reads.
    pub dependencies: BTreeSet<String>,
    pub visibility: Option<VisibilityRule>,
    pub derived_from: Option<String>,
}

impl PropertyDescriptor {
    /// A plain, non-bindable property labelled with its own name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            help_text: None,
            section: None,
            control: ControlType::default(),
            schema: None,
            default_value: None,
            is_bindable: false,
            is_trigger: false,
            substitution: SubstitutionMode::default(),
            dependencies: BTreeSet::new(),
            visibility: None,
            derived_from: None,
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn control(mut self, control: ControlType) -> Self {
        self.control = control;
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: PropertySchema) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn bindable(mut self) -> Self {
        self.is_bindable = true;
        self
    }

    /// Marks the property as an action reference. Triggers are always bindable
    /// and never carry a schema.
    #[must_use]
    pub fn trigger(mut self) -> Self {
        self.is_trigger = true;
        self.is_bindable = true;
        self.schema = None;
        self.control = ControlType::ActionSelector;
        self
    }

    #[must_use]
    pub fn substitution(mut self, mode: SubstitutionMode) -> Self {
        self.substitution = mode;
        self
    }

    /// Attaches a visibility rule and records its dependencies.
    #[must_use]
    pub fn visibility(mut self, rule: VisibilityRule) -> Self {
        self.dependencies
            .extend(rule.dependencies().iter().cloned());
        self.visibility = Some(rule);
        self
    }

    /// Declares that this property's runtime value is seeded from `source`.
    #[must_use]
    pub fn derives_from(mut self, source: impl Into<String>) -> Self {
        let source = source.into();
        self.dependencies.insert(source.clone());
        self.derived_from = Some(source);
        self
    }
}

impl Bindable for PropertyDescriptor {
    fn schema(&self) -> Option<&PropertySchema> {
        if self.is_trigger {
            None
        } else {
            self.schema.as_ref()
        }
    }

    fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    fn accepts_bindings(&self) -> bool {
        self.is_bindable
    }
}

impl Triggerable for PropertyDescriptor {
    fn is_trigger(&self) -> bool {
        self.is_trigger
    }
}

impl Derivable for PropertyDescriptor {
    fn derived_from(&self) -> Option<&str> {
        self.derived_from.as_deref()
    }
}

/// A named group of descriptors, e.g. `"General"` or `"Events"`.
#[derive(Debug, Clone)]
pub struct PropertySection {
    pub name: String,
    pub children: Vec<PropertyDescriptor>,
}

impl PropertySection {
    #[must_use]
    pub fn new(name: impl Into<String>, children: Vec<PropertyDescriptor>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

// ---------------------------------------------------------------------------
// PropertyRegistry
// ---------------------------------------------------------------------------

/// Registry of property descriptors for one widget type.
///
/// Keeps declaration order for the property pane and a reverse dependency
/// index (`dependency -> dependents`) so that a property change only has to
/// revisit the descriptors that declared it as a dependency.
///
/// Registering a name twice overwrites the earlier descriptor (last
/// registration wins) while keeping its original position. This is what lets a
/// style section be concatenated after a content section for the same widget.
#[derive(Debug, Clone, Default)]
pub struct PropertyRegistry {
    widget_type: String,
    order: Vec<String>,
    descriptors: HashMap<String, PropertyDescriptor>,
    dependents: HashMap<String, BTreeSet<String>>,
}

impl PropertyRegistry {
    /// Creates an empty registry for the given widget type.
    #[must_use]
    pub fn new(widget_type: impl Into<String>) -> Self {
        Self {
            widget_type: widget_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn widget_type(&self) -> &str {
        &self.widget_type
    }

    /// Register a descriptor. An existing descriptor with the same name is replaced.
    pub fn register(&mut self, descriptor: PropertyDescriptor) {
        let name = descriptor.name.clone();
        for dependency in &descriptor.dependencies {
            self.dependents
                .entry(dependency.clone())
                .or_default()
                .insert(name.clone());
        }
        match self.descriptors.insert(name.clone(), descriptor) {
            Some(previous) => {
                tracing::debug!(
                    widget = %self.widget_type,
                    property = %name,
                    "property descriptor overwritten"
                );
                let current = &self.descriptors[&name].dependencies;
                for stale in previous.dependencies.difference(current) {
                    if let Some(set) = self.dependents.get_mut(stale) {
                        set.remove(&name);
                    }
                }
            }
            None => self.order.push(name),
        }
    }

    /// Register every descriptor of a section, tagging each with the section name.
    pub fn register_section(&mut self, section: PropertySection) {
        for mut descriptor in section.children {
            descriptor.section = Some(section.name.clone());
            self.register(descriptor);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.descriptors.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.order.iter().filter_map(|name| self.descriptors.get(name))
    }

    /// Names of all properties that may hold bound expressions, triggers included.
    #[must_use]
    pub fn all_bindable(&self) -> Vec<&str> {
        self.iter()
            .filter(|d| d.accepts_bindings())
            .map(|d| d.name.as_str())
            .collect()
    }

    /// Names of all trigger properties.
    #[must_use]
    pub fn all_triggers(&self) -> Vec<&str> {
        self.iter()
            .filter(|d| d.is_trigger())
            .map(|d| d.name.as_str())
            .collect()
    }

    /// `(derived, source)` pairs, e.g. `("center", "mapCenter")`.
    #[must_use]
    pub fn derived(&self) -> Vec<(&str, &str)> {
        self.iter()
            .filter_map(|d| Derivable::derived_from(d).map(|source| (d.name.as_str(), source)))
            .collect()
    }

    /// Names of the descriptors that declare `name` as a dependency.
    pub fn dependents_of<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.dependents
            .get(name)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }
}
