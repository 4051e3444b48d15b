use crate::schema::PropertySchema;
use crate::types::Value;

/// A property that holds data: it has a schema and a default, and its value
/// may be a literal or a bound expression evaluated by the host.
pub trait Bindable {
    /// Schema the (evaluated) value is validated against. `None` means the
    /// value is accepted as-is.
    fn schema(&self) -> Option<&PropertySchema>;

    /// Value used when nothing has been set.
    fn default_value(&self) -> Option<&Value>;

    /// Whether the value may be a dynamic expression instead of a literal.
    fn accepts_bindings(&self) -> bool;
}

/// A property that carries a reference to a user-defined action.
///
/// Trigger values are event-handler references, not data, and are never
/// schema-validated.
pub trait Triggerable {
    fn is_trigger(&self) -> bool;
}

/// A property whose runtime value is computed from another property, e.g. the
/// map's meta `center` seeded from the configured `mapCenter`.
pub trait Derivable {
    /// Name of the property this one is derived from, if any.
    fn derived_from(&self) -> Option<&str>;
}
