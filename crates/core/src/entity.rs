//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// A fixed asset is an entity: its book value changes every period, but it is
/// still the same asset.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
