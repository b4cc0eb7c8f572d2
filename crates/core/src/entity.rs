//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// CRUD commands are parameterised by an entity type; storage adapters use the
/// identifier to match updated and deleted records against stored ones.
pub trait Entity: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + Send + Sync;

    /// Stable resource name (table, collection, ...) used by storage adapters.
    const RESOURCE: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
