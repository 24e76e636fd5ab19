//! Domain types for bdgeo.
//!
//! - [`Division`], [`District`], [`Upazila`], [`Union`]: the four hierarchy levels
//! - [`Dataset`]: the flat, validated container a store is built from
//! - [`SearchScope`] / [`SearchResults`]: search request and result shapes
//! - [`ParentKind`] / [`Children`]: generic child lookups

mod dataset;
mod entity;
mod search;

pub use dataset::*;
pub use entity::*;
pub use search::*;
