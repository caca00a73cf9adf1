//! `assetbook-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, and the `Money` value object shared by
//! the depreciation engine and the accounting boundary.

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use entity::Entity;
pub use error::DomainError;
pub use id::{AssetId, JournalRef, UserId};
pub use money::{Money, MONEY_SCALE};
pub use value_object::ValueObject;
