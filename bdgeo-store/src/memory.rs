//! In-memory hierarchy store.
//!
//! Holds the dataset as a nested tree. The tree is built once and never
//! mutated, so concurrent reads need no synchronization.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use bdgeo_core::error::{GeoError, Result};
use bdgeo_core::names::{normalize_name, same_name};
use bdgeo_core::traits::HierarchyStore;
use bdgeo_core::types::{Dataset, DatasetCounts, District, Division, Union, Upazila};

use crate::EMBEDDED_DATASET;

#[derive(Debug)]
struct DivisionNode {
    division: Division,
    districts: Vec<DistrictNode>,
}

#[derive(Debug)]
struct DistrictNode {
    district: District,
    upazilas: Vec<UpazilaNode>,
}

#[derive(Debug)]
struct UpazilaNode {
    upazila: Upazila,
    unions: Vec<Union>,
}

/// In-memory hierarchy store.
///
/// # Ordering
///
/// Flat listings walk the tree depth-first, so districts come out in
/// division order then dataset order, and likewise for upazilas and unions.
#[derive(Debug)]
pub struct MemoryStore {
    tree: Vec<DivisionNode>,
    counts: DatasetCounts,
}

impl MemoryStore {
    /// Builds a store from the bundled dataset.
    pub fn embedded() -> Result<Self> {
        let dataset = Dataset::from_json(EMBEDDED_DATASET)?;
        Self::from_dataset(dataset)
    }

    /// Builds a store from a dataset, validating it first.
    pub fn from_dataset(dataset: Dataset) -> Result<Self> {
        dataset.validate()?;
        let counts = dataset.counts();

        let mut unions_by_upazila: HashMap<String, Vec<Union>> = HashMap::new();
        for union in dataset.unions {
            unions_by_upazila
                .entry(union.upazila_id.clone())
                .or_default()
                .push(union);
        }

        let mut upazilas_by_district: HashMap<String, Vec<UpazilaNode>> = HashMap::new();
        for upazila in dataset.upazilas {
            let unions = unions_by_upazila.remove(&upazila.id).unwrap_or_default();
            upazilas_by_district
                .entry(upazila.district_id.clone())
                .or_default()
                .push(UpazilaNode { upazila, unions });
        }

        let mut districts_by_division: HashMap<String, Vec<DistrictNode>> = HashMap::new();
        for district in dataset.districts {
            let upazilas = upazilas_by_district.remove(&district.id).unwrap_or_default();
            districts_by_division
                .entry(district.division_id.clone())
                .or_default()
                .push(DistrictNode { district, upazilas });
        }

        let tree = dataset
            .divisions
            .into_iter()
            .map(|division| {
                let districts = districts_by_division.remove(&division.id).unwrap_or_default();
                DivisionNode { division, districts }
            })
            .collect();

        info!(
            divisions = counts.divisions,
            districts = counts.districts,
            upazilas = counts.upazilas,
            unions = counts.unions,
            "Loaded hierarchy into memory"
        );

        Ok(Self { tree, counts })
    }

    /// Returns the number of entities per level.
    pub fn counts(&self) -> DatasetCounts {
        self.counts
    }

    /// Flattens the tree back into a dataset (for export).
    pub fn dataset(&self) -> Dataset {
        Dataset {
            divisions: self.tree.iter().map(|n| n.division.clone()).collect(),
            districts: self.district_nodes().map(|n| n.district.clone()).collect(),
            upazilas: self.upazila_nodes().map(|n| n.upazila.clone()).collect(),
            unions: self.upazila_nodes().flat_map(|n| n.unions.iter().cloned()).collect(),
        }
    }

    fn district_nodes(&self) -> impl Iterator<Item = &DistrictNode> {
        self.tree.iter().flat_map(|n| n.districts.iter())
    }

    fn upazila_nodes(&self) -> impl Iterator<Item = &UpazilaNode> {
        self.district_nodes().flat_map(|n| n.upazilas.iter())
    }

    /// Resolves a division by exact id, then by normalized name.
    fn find_division(&self, key: &str) -> Option<&DivisionNode> {
        self.tree.iter().find(|n| n.division.id == key).or_else(|| {
            let name = normalize_name(key);
            self.tree.iter().find(|n| same_name(&n.division.name, &name))
        })
    }

    /// Resolves a district by exact id, then by normalized name.
    fn find_district(&self, key: &str) -> Option<&DistrictNode> {
        self.district_nodes().find(|n| n.district.id == key).or_else(|| {
            let name = normalize_name(key);
            self.district_nodes().find(|n| same_name(&n.district.name, &name))
        })
    }

    fn find_upazila(&self, id: &str) -> Option<&UpazilaNode> {
        self.upazila_nodes().find(|n| n.upazila.id == id)
    }
}

#[async_trait]
impl HierarchyStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn divisions(&self) -> Result<Vec<Division>> {
        Ok(self.tree.iter().map(|n| n.division.clone()).collect())
    }

    async fn districts(&self) -> Result<Vec<District>> {
        Ok(self.district_nodes().map(|n| n.district.clone()).collect())
    }

    async fn upazilas(&self) -> Result<Vec<Upazila>> {
        Ok(self.upazila_nodes().map(|n| n.upazila.clone()).collect())
    }

    async fn unions(&self) -> Result<Vec<Union>> {
        Ok(self.upazila_nodes().flat_map(|n| n.unions.iter().cloned()).collect())
    }

    #[instrument(skip(self))]
    async fn districts_of(&self, division: &str) -> Result<Vec<District>> {
        let districts: Vec<District> = self
            .find_division(division)
            .map(|n| n.districts.iter().map(|d| d.district.clone()).collect())
            .unwrap_or_default();

        debug!(count = districts.len(), "Resolved districts");
        non_empty(districts, || format!("No districts found for division: {division}."))
    }

    #[instrument(skip(self))]
    async fn upazilas_of(&self, district: &str) -> Result<Vec<Upazila>> {
        let upazilas: Vec<Upazila> = self
            .find_district(district)
            .map(|n| n.upazilas.iter().map(|u| u.upazila.clone()).collect())
            .unwrap_or_default();

        debug!(count = upazilas.len(), "Resolved upazilas");
        non_empty(upazilas, || format!("No upazilas found for district: {district}."))
    }

    #[instrument(skip(self))]
    async fn unions_of(&self, upazila_id: &str) -> Result<Vec<Union>> {
        let unions = self
            .find_upazila(upazila_id)
            .map(|n| n.unions.clone())
            .unwrap_or_default();

        debug!(count = unions.len(), "Resolved unions");
        non_empty(unions, || format!("No unions found for upazila ID: {upazila_id}."))
    }
}

/// An empty child list is indistinguishable from an unknown parent.
pub(crate) fn non_empty<T>(items: Vec<T>, message: impl FnOnce() -> String) -> Result<Vec<T>> {
    if items.is_empty() {
        Err(GeoError::NotFound(message()))
    } else {
        Ok(items)
    }
}
