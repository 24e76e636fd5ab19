//! # bdgeo store
//!
//! Hierarchy store backends for the Bangladesh geo API.
//!
//! This crate provides two interchangeable implementations of
//! [`HierarchyStore`]:
//!
//! - **Memory**: the bundled dataset (or any validated [`Dataset`]) held as a
//!   nested division → district → upazila → union tree
//! - **Document**: one flat JSON collection per level in a directory, read
//!   on demand with a bounded timeout
//!
//! ## Example
//!
//! ```rust,ignore
//! use bdgeo_store::{MemoryStore, HierarchyStore};
//!
//! let store = MemoryStore::embedded()?;
//! let districts = store.districts_of("dhaka").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod document;
mod memory;

pub use document::{export_dataset, DocumentStore};
pub use memory::MemoryStore;

pub use bdgeo_core::traits::HierarchyStore;
pub use bdgeo_core::types::Dataset;

/// The bundled dataset, as JSON.
pub const EMBEDDED_DATASET: &str = include_str!("../data/bd-geo.json");
