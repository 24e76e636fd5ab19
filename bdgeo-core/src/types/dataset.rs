//! Flat dataset container.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{GeoError, Result};
use crate::types::{District, Division, Named, Union, Upazila};

/// The whole hierarchy as four flat, ordered collections.
///
/// This is the interchange shape between backends: the embedded dataset is
/// stored this way, and the document store keeps one collection per field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// All divisions
    pub divisions: Vec<Division>,
    /// All districts
    #[serde(default)]
    pub districts: Vec<District>,
    /// All upazilas
    #[serde(default)]
    pub upazilas: Vec<Upazila>,
    /// All unions
    #[serde(default)]
    pub unions: Vec<Union>,
}

/// Number of entities per level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DatasetCounts {
    /// Division count
    pub divisions: usize,
    /// District count
    pub districts: usize,
    /// Upazila count
    pub upazilas: usize,
    /// Union count
    pub unions: usize,
}

impl Dataset {
    /// Parses a dataset from JSON and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let dataset: Dataset = serde_json::from_str(json)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Checks id uniqueness per level and that every parent reference resolves.
    pub fn validate(&self) -> Result<()> {
        let division_ids = unique_ids("division", &self.divisions)?;
        let district_ids = unique_ids("district", &self.districts)?;
        let upazila_ids = unique_ids("upazila", &self.upazilas)?;
        unique_ids("union", &self.unions)?;

        check_parents("district", &self.districts, &division_ids)?;
        check_parents("upazila", &self.upazilas, &district_ids)?;
        check_parents("union", &self.unions, &upazila_ids)?;

        Ok(())
    }

    /// Returns the number of entities per level.
    pub fn counts(&self) -> DatasetCounts {
        DatasetCounts {
            divisions: self.divisions.len(),
            districts: self.districts.len(),
            upazilas: self.upazilas.len(),
            unions: self.unions.len(),
        }
    }
}

fn unique_ids<'a, T: Named>(level: &str, items: &'a [T]) -> Result<HashSet<&'a str>> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.id().trim().is_empty() {
            return Err(GeoError::InvalidDataset(format!("{level} with empty id")));
        }
        if !seen.insert(item.id()) {
            return Err(GeoError::InvalidDataset(format!(
                "duplicate {level} id '{}'",
                item.id()
            )));
        }
    }
    Ok(seen)
}

fn check_parents<T: Named>(level: &str, items: &[T], parents: &HashSet<&str>) -> Result<()> {
    for item in items {
        let parent = item.parent_id().unwrap_or_default();
        if !parents.contains(parent) {
            return Err(GeoError::InvalidDataset(format!(
                "{level} '{}' references missing parent '{parent}'",
                item.id()
            )));
        }
    }
    Ok(())
}
