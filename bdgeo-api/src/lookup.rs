//! Lookup service: store queries shaped into response envelopes.

use std::sync::Arc;

use tracing::{debug, instrument};

use bdgeo_core::traits::HierarchyStore;
use bdgeo_core::types::{DatasetCounts, District, Division, Named, SearchScope, Union, Upazila};

use crate::dto::{DistrictView, Envelope, SearchResponse, UnionView, UpazilaView};
use crate::error::ApiError;

type Result<T> = std::result::Result<T, ApiError>;

/// Answers geo queries against a [`HierarchyStore`].
#[derive(Clone)]
pub struct LookupService {
    store: Arc<dyn HierarchyStore>,
    diagnostics: bool,
}

impl LookupService {
    /// Wraps a store. With `diagnostics`, server errors carry internal details.
    pub fn new(store: Arc<dyn HierarchyStore>, diagnostics: bool) -> Self {
        Self { store, diagnostics }
    }

    /// Backend name of the wrapped store.
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// The wrapped store.
    pub fn store(&self) -> &Arc<dyn HierarchyStore> {
        &self.store
    }

    fn fail(&self, context: &str) -> impl FnOnce(bdgeo_core::GeoError) -> ApiError + '_ {
        let context = context.to_string();
        move |err| ApiError::from_store(err, &context, self.diagnostics)
    }

    /// All divisions.
    pub async fn divisions(&self) -> Result<Envelope<Vec<Division>>> {
        let divisions = self
            .store
            .divisions()
            .await
            .map_err(self.fail("Failed to retrieve divisions."))?;
        Ok(Envelope::list(divisions, "Successfully retrieved all divisions."))
    }

    /// All districts.
    pub async fn districts(&self) -> Result<Envelope<Vec<District>>> {
        let districts = self
            .store
            .districts()
            .await
            .map_err(self.fail("Failed to retrieve all districts."))?;
        Ok(Envelope::list(districts, "Successfully retrieved all districts."))
    }

    /// All upazilas.
    pub async fn upazilas(&self) -> Result<Envelope<Vec<Upazila>>> {
        let upazilas = self
            .store
            .upazilas()
            .await
            .map_err(self.fail("Failed to retrieve all upazilas."))?;
        Ok(Envelope::list(upazilas, "Successfully retrieved all upazilas."))
    }

    /// All unions.
    pub async fn unions(&self) -> Result<Envelope<Vec<Union>>> {
        let unions = self
            .store
            .unions()
            .await
            .map_err(self.fail("Failed to retrieve all unions."))?;
        Ok(Envelope::list(unions, "Successfully retrieved all unions."))
    }

    /// Districts of a division, by id or name.
    #[instrument(skip(self))]
    pub async fn districts_of(&self, division: &str) -> Result<Envelope<Vec<DistrictView>>> {
        let districts = self
            .store
            .districts_of(division)
            .await
            .map_err(self.fail("Failed to retrieve districts by division."))?;

        let label = match districts.first() {
            Some(first) if first.division_id != division => {
                let divisions = self
                    .store
                    .divisions()
                    .await
                    .map_err(self.fail("Failed to retrieve districts by division."))?;
                stored_name(&divisions, &first.division_id).unwrap_or_else(|| division.to_string())
            }
            _ => division.to_string(),
        };

        let views: Vec<DistrictView> = districts.into_iter().map(Into::into).collect();
        Ok(Envelope::list(
            views,
            format!("Successfully retrieved districts for division: {label}."),
        ))
    }

    /// Upazilas of a district, by id or name.
    #[instrument(skip(self))]
    pub async fn upazilas_of(&self, district: &str) -> Result<Envelope<Vec<UpazilaView>>> {
        let upazilas = self
            .store
            .upazilas_of(district)
            .await
            .map_err(self.fail("Failed to retrieve upazilas by district."))?;

        let label = match upazilas.first() {
            Some(first) if first.district_id != district => {
                let districts = self
                    .store
                    .districts()
                    .await
                    .map_err(self.fail("Failed to retrieve upazilas by district."))?;
                stored_name(&districts, &first.district_id).unwrap_or_else(|| district.to_string())
            }
            _ => district.to_string(),
        };

        let views: Vec<UpazilaView> = upazilas.into_iter().map(Into::into).collect();
        Ok(Envelope::list(
            views,
            format!("Successfully retrieved upazilas for district: {label}."),
        ))
    }

    /// Unions of an upazila, by id.
    #[instrument(skip(self))]
    pub async fn unions_of(&self, upazila_id: &str) -> Result<Envelope<Vec<UnionView>>> {
        let unions = self
            .store
            .unions_of(upazila_id)
            .await
            .map_err(self.fail("Failed to retrieve unions by upazila."))?;

        let views: Vec<UnionView> = unions.into_iter().map(Into::into).collect();
        Ok(Envelope::list(
            views,
            format!("Successfully retrieved unions for upazila ID {upazila_id}."),
        ))
    }

    /// Substring search, optionally restricted to one level.
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str, scope: Option<&str>) -> Result<SearchResponse> {
        let scope: SearchScope = scope
            .unwrap_or_default()
            .parse()
            .map_err(self.fail("Search operation failed"))?;

        let results = self
            .store
            .search(term, scope)
            .await
            .map_err(self.fail("Search operation failed"))?;

        let query = term.trim().to_string();
        let count = results.total();
        debug!(count, scope = %scope, "Search finished");

        Ok(SearchResponse {
            success: true,
            data: results,
            message: format!("Search results for \"{query}\""),
            count,
            query,
            scope: scope.as_str().to_string(),
            timestamp: chrono::Utc::now(),
        })
    }

    /// Entity counts per level.
    pub async fn dataset_counts(&self) -> Result<DatasetCounts> {
        let fail = || self.fail("Failed to count dataset.");
        Ok(DatasetCounts {
            divisions: self.store.divisions().await.map_err(fail())?.len(),
            districts: self.store.districts().await.map_err(fail())?.len(),
            upazilas: self.store.upazilas().await.map_err(fail())?.len(),
            unions: self.store.unions().await.map_err(fail())?.len(),
        })
    }
}

/// Stored name of the entity with `id`. Name keys are echoed this way so
/// every spelling of a name yields the same message.
fn stored_name<P: Named>(entities: &[P], id: &str) -> Option<String> {
    entities
        .iter()
        .find(|e| e.id() == id)
        .map(|e| e.name().to_string())
}
