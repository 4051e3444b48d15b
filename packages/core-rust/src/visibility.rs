//! Dependency-tracked visibility resolution.
//!
//! Each [`PropertyDescriptor`] may carry a [`VisibilityRule`]: a named, pure
//! predicate plus the list of properties it reads. The predicate only ever sees
//! a [`DependencyView`] restricted to that list, so a rule cannot silently read
//! a property it did not declare.
//!
//! [`VisibilityResolver`] keeps the current [`VisibilitySnapshot`] for one
//! widget instance and, on a property change, re-evaluates only the
//! descriptors that depend on the changed property.
//!
//! # Cycles
//!
//! Declared dependencies form a graph. Any descriptor that can reach itself
//! through that graph is pinned visible, and the cycle is reported once as a
//! [`Finding::VisibilityCycle`] diagnostic.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::property::{PropertyDescriptor, PropertyRegistry};
use crate::schema::Finding;
use crate::types::{PropertyValues, Value};

// ---------------------------------------------------------------------------
// VisibilityRule
// ---------------------------------------------------------------------------

/// Read-only window onto the property values a rule declared.
pub struct DependencyView<'a> {
    values: &'a PropertyValues,
    allowed: &'a [String],
    rule: &'a str,
}

impl DependencyView<'_> {
    /// Value of a declared dependency. Undeclared names read as absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        if self.allowed.iter().any(|allowed| allowed == name) {
            self.values.get(name)
        } else {
            tracing::debug!(
                rule = %self.rule,
                property = %name,
                "visibility rule read an undeclared dependency"
            );
            None
        }
    }

    /// `true` only when the dependency holds `Bool(true)`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}

type Predicate = dyn Fn(&DependencyView<'_>) -> bool + Send + Sync;

/// A named predicate deciding whether a property is hidden.
///
/// The predicate returns `true` for "hidden".
#[derive(Clone)]
pub struct VisibilityRule {
    name: String,
    dependencies: Vec<String>,
    predicate: Arc<Predicate>,
}

impl fmt::Debug for VisibilityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityRule")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl VisibilityRule {
    pub fn new<F>(name: impl Into<String>, dependencies: Vec<String>, predicate: F) -> Self
    where
        F: Fn(&DependencyView<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            dependencies,
            predicate: Arc::new(predicate),
        }
    }

    /// Hidden unless the boolean property `flag` is `true`.
    #[must_use]
    pub fn unless_enabled(flag: &str) -> Self {
        let dependency = flag.to_string();
        Self::new(
            format!("unless:{flag}"),
            vec![dependency.clone()],
            move |view| !view.flag(&dependency),
        )
    }

    /// Hidden while the boolean property `flag` is `true`.
    #[must_use]
    pub fn when_enabled(flag: &str) -> Self {
        let dependency = flag.to_string();
        Self::new(
            format!("when:{flag}"),
            vec![dependency.clone()],
            move |view| view.flag(&dependency),
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Evaluates the rule against `values`. Returns `true` for hidden.
    #[must_use]
    pub fn evaluate(&self, values: &PropertyValues) -> bool {
        let view = DependencyView {
            values,
            allowed: &self.dependencies,
            rule: &self.name,
        };
        (self.predicate)(&view)
    }
}

// ---------------------------------------------------------------------------
// VisibilitySnapshot
// ---------------------------------------------------------------------------

/// Visibility of a single property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PropertyVisibility {
    pub hidden: bool,
}

/// Which properties are currently hidden. Recomputed, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct VisibilitySnapshot {
    entries: BTreeMap<String, PropertyVisibility>,
}

impl VisibilitySnapshot {
    /// Unknown properties are visible.
    #[must_use]
    pub fn is_hidden(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|entry| entry.hidden)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PropertyVisibility)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), *entry))
    }

    /// Names of the hidden properties in lexical order.
    #[must_use]
    pub fn hidden(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, entry)| entry.hidden)
            .map(|(name, _)| name)
            .collect()
    }

    /// Sets an entry, returning `true` when the visibility changed.
    fn set(&mut self, name: &str, hidden: bool) -> bool {
        let previous = self
            .entries
            .insert(name.to_string(), PropertyVisibility { hidden });
        previous.map_or(hidden, |entry| entry.hidden != hidden)
    }
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

/// Visibility of every property plus any structural diagnostics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedVisibility {
    pub snapshot: VisibilitySnapshot,
    pub diagnostics: Vec<Finding>,
}

/// Computes the visibility of every descriptor in `registry` from scratch.
#[must_use]
pub fn resolve(registry: &PropertyRegistry, values: &PropertyValues) -> ResolvedVisibility {
    let (cyclic, diagnostics) = find_cycles(registry);
    let mut snapshot = VisibilitySnapshot::default();
    for descriptor in registry.iter() {
        snapshot.set(&descriptor.name, evaluate(descriptor, &cyclic, values));
    }
    ResolvedVisibility {
        snapshot,
        diagnostics,
    }
}

fn evaluate(descriptor: &PropertyDescriptor, cyclic: &BTreeSet<String>, values: &PropertyValues) -> bool {
    if cyclic.contains(&descriptor.name) {
        return false;
    }
    descriptor
        .visibility
        .as_ref()
        .is_some_and(|rule| rule.evaluate(values))
}

/// Finds every descriptor that can reach itself through declared dependencies
/// and groups them into strongly connected components.
fn find_cycles(registry: &PropertyRegistry) -> (BTreeSet<String>, Vec<Finding>) {
    let reach: HashMap<&str, BTreeSet<&str>> = registry
        .iter()
        .map(|descriptor| (descriptor.name.as_str(), reachable_from(registry, descriptor)))
        .collect();

    let cyclic: BTreeSet<&str> = reach
        .iter()
        .filter(|(name, reached)| reached.contains(*name))
        .map(|(name, _)| *name)
        .collect();

    let mut grouped: BTreeSet<String> = BTreeSet::new();
    let mut diagnostics = Vec::new();
    for name in &cyclic {
        if grouped.contains(*name) {
            continue;
        }
        let members: Vec<String> = cyclic
            .iter()
            .filter(|other| reach[name].contains(*other) && reach[*other].contains(name))
            .map(|member| (*member).to_string())
            .collect();
        grouped.extend(members.iter().cloned());
        tracing::warn!(
            widget = %registry.widget_type(),
            members = ?members,
            "visibility dependency cycle; members pinned visible"
        );
        diagnostics.push(Finding::VisibilityCycle { members });
    }

    (cyclic.into_iter().map(str::to_string).collect(), diagnostics)
}

fn reachable_from<'a>(registry: &'a PropertyRegistry, start: &'a PropertyDescriptor) -> BTreeSet<&'a str> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<&str> = start.dependencies.iter().map(String::as_str).collect();
    while let Some(name) = stack.pop() {
        if !seen.insert(name) {
            continue;
        }
        if let Some(descriptor) = registry.get(name) {
            stack.extend(descriptor.dependencies.iter().map(String::as_str));
        }
    }
    seen
}

// ---------------------------------------------------------------------------
// VisibilityResolver
// ---------------------------------------------------------------------------

/// Per-instance visibility state with incremental updates.
#[derive(Debug)]
pub struct VisibilityResolver {
    registry: Arc<PropertyRegistry>,
    cyclic: BTreeSet<String>,
    diagnostics: Vec<Finding>,
    snapshot: VisibilitySnapshot,
}

impl VisibilityResolver {
    /// Analyses the registry's dependency graph. Call [`recompute_all`](Self::recompute_all)
    /// once the instance's initial values are known.
    #[must_use]
    pub fn new(registry: Arc<PropertyRegistry>) -> Self {
        let (cyclic, diagnostics) = find_cycles(&registry);
        Self {
            registry,
            cyclic,
            diagnostics,
            snapshot: VisibilitySnapshot::default(),
        }
    }

    /// Recomputes every descriptor's visibility.
    pub fn recompute_all(&mut self, values: &PropertyValues) {
        let mut snapshot = VisibilitySnapshot::default();
        for descriptor in self.registry.iter() {
            snapshot.set(&descriptor.name, evaluate(descriptor, &self.cyclic, values));
        }
        self.snapshot = snapshot;
    }

    /// Re-evaluates only the descriptors depending on `changed`. Returns the
    /// names whose visibility flipped.
    pub fn on_property_changed(&mut self, changed: &str, values: &PropertyValues) -> Vec<String> {
        let mut flipped = Vec::new();
        for dependent in self.registry.dependents_of(changed) {
            let Some(descriptor) = self.registry.get(dependent) else {
                continue;
            };
            if descriptor.visibility.is_none() {
                continue;
            }
            let hidden = evaluate(descriptor, &self.cyclic, values);
            if self.snapshot.set(dependent, hidden) {
                tracing::debug!(property = %dependent, hidden, trigger = %changed, "visibility changed");
                flipped.push(dependent.to_string());
            }
        }
        flipped
    }

    #[must_use]
    pub fn is_hidden(&self, name: &str) -> bool {
        self.snapshot.is_hidden(name)
    }

    #[must_use]
    pub fn snapshot(&self) -> &VisibilitySnapshot {
        &self.snapshot
    }

    /// Structural diagnostics found when the resolver was built.
    #[must_use]
    pub fn diagnostics(&self) -> &[Finding] {
        &self.diagnostics
    }
}
