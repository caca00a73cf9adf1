//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two instances with the same attribute
/// values are interchangeable. They are immutable; "changing" one means building
/// a new value.
///
/// ```ignore
/// let a = Money::from_major(1_000);
/// let b = Money::from_major(1_000);
/// assert_eq!(a, b);
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
