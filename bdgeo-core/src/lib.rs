//! # bdgeo core
//!
//! Core types, errors, and traits for the Bangladesh administrative geography API.
//!
//! This crate provides the building blocks used by every other bdgeo crate:
//!
//! - **Types**: the four hierarchy levels (division, district, upazila, union)
//!   plus the dataset container and search result shapes
//! - **Errors**: the `GeoError` taxonomy shared by stores and the HTTP surface
//! - **Traits**: the `HierarchyStore` interface implemented by each backend
//! - **Names**: name normalization and case-insensitive matching
//!
//! ## Example
//!
//! ```rust
//! use bdgeo_core::{normalize_name, Division};
//!
//! assert_eq!(normalize_name("chattogram-hill"), "Chattogram Hill");
//!
//! let div = Division::new("6", "Dhaka", "ঢাকা");
//! let json = serde_json::to_string(&div).unwrap();
//! assert!(json.contains("bn_name"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod names;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{GeoError, Result};
pub use names::{matches_term, normalize_name, same_name};
pub use traits::*;
pub use types::*;
