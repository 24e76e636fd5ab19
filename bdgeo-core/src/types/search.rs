//! Search and child-lookup result shapes.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::constants::MIN_SEARCH_TERM_LEN;
use crate::error::{GeoError, Result};
use crate::names::matches_term;
use crate::types::{District, Division, EntityKind, Named, Union, Upazila};

/// Which levels a search covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SearchScope {
    /// Every level
    #[default]
    All,
    /// Divisions only
    Divisions,
    /// Districts only
    Districts,
    /// Upazilas only
    Upazilas,
    /// Unions only
    Unions,
}

impl SearchScope {
    /// Query-string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchScope::All => "all",
            SearchScope::Divisions => "divisions",
            SearchScope::Districts => "districts",
            SearchScope::Upazilas => "upazilas",
            SearchScope::Unions => "unions",
        }
    }

    /// Returns true if `kind` falls inside this scope.
    pub fn includes(&self, kind: EntityKind) -> bool {
        match self {
            SearchScope::All => true,
            SearchScope::Divisions => kind == EntityKind::Division,
            SearchScope::Districts => kind == EntityKind::District,
            SearchScope::Upazilas => kind == EntityKind::Upazila,
            SearchScope::Unions => kind == EntityKind::Union,
        }
    }
}

impl FromStr for SearchScope {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(SearchScope::All),
            "divisions" => Ok(SearchScope::Divisions),
            "districts" => Ok(SearchScope::Districts),
            "upazilas" => Ok(SearchScope::Upazilas),
            "unions" => Ok(SearchScope::Unions),
            other => Err(GeoError::InvalidArgument(format!(
                "unknown search type '{other}', expected one of all, divisions, districts, upazilas, unions"
            ))),
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search matches grouped by level. Levels outside the scope are `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    /// Matching divisions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divisions: Option<Vec<Division>>,
    /// Matching districts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub districts: Option<Vec<District>>,
    /// Matching upazilas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upazilas: Option<Vec<Upazila>>,
    /// Matching unions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unions: Option<Vec<Union>>,
}

impl SearchResults {
    /// Total number of matches across all levels.
    pub fn total(&self) -> usize {
        self.divisions.as_ref().map_or(0, Vec::len)
            + self.districts.as_ref().map_or(0, Vec::len)
            + self.upazilas.as_ref().map_or(0, Vec::len)
            + self.unions.as_ref().map_or(0, Vec::len)
    }
}

/// Children returned by a generic child lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Children {
    /// Districts of a division
    Districts(Vec<District>),
    /// Upazilas of a district
    Upazilas(Vec<Upazila>),
    /// Unions of an upazila
    Unions(Vec<Union>),
}

impl Children {
    /// Number of children.
    pub fn len(&self) -> usize {
        match self {
            Children::Districts(v) => v.len(),
            Children::Upazilas(v) => v.len(),
            Children::Unions(v) => v.len(),
        }
    }

    /// Returns true if there are no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trims a search term and checks its length.
///
/// Length is counted in characters so Bangla terms are not penalized for
/// their UTF-8 width.
pub fn validate_search_term(term: &str) -> Result<&str> {
    let trimmed = term.trim();
    if trimmed.chars().count() < MIN_SEARCH_TERM_LEN {
        return Err(GeoError::InvalidArgument(format!(
            "Search query must be at least {MIN_SEARCH_TERM_LEN} characters long."
        )));
    }
    Ok(trimmed)
}

/// Keeps the items whose name or local name contains `needle_lower`.
pub fn filter_matches<T: Named>(items: Vec<T>, needle_lower: &str) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| {
            matches_term(item.name(), needle_lower) || matches_term(item.local_name(), needle_lower)
        })
        .collect()
}
