//! Common traits for bdgeo.
//!
//! The HTTP surface only talks to a `HierarchyStore`, so the embedded
//! dataset and the document store are interchangeable.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    filter_matches, validate_search_term, Children, District, Division, EntityKind, ParentKind,
    SearchResults, SearchScope, Union, Upazila,
};

// ═══════════════════════════════════════════════════════════════════════════════
// HIERARCHY STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only access to the division → district → upazila → union hierarchy.
///
/// Child lookups take a key that is either a parent id (exact match) or, for
/// divisions and districts, a parent name (normalized, case-insensitive).
/// Both an unknown parent and a parent without children are reported as
/// [`GeoError::NotFound`](crate::GeoError::NotFound).
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    /// Short backend name, reported by health checks.
    fn backend(&self) -> &'static str;

    /// All divisions, in insertion order.
    async fn divisions(&self) -> Result<Vec<Division>>;

    /// All districts, in division order then district order.
    async fn districts(&self) -> Result<Vec<District>>;

    /// All upazilas, in ancestor order.
    async fn upazilas(&self) -> Result<Vec<Upazila>>;

    /// All unions, in ancestor order.
    async fn unions(&self) -> Result<Vec<Union>>;

    /// Districts of the division identified by id or name.
    async fn districts_of(&self, division: &str) -> Result<Vec<District>>;

    /// Upazilas of the district identified by id or name.
    async fn upazilas_of(&self, district: &str) -> Result<Vec<Upazila>>;

    /// Unions of the upazila with this id.
    async fn unions_of(&self, upazila_id: &str) -> Result<Vec<Union>>;

    /// Generic child lookup.
    async fn children_of(&self, parent: ParentKind, key: &str) -> Result<Children> {
        Ok(match parent {
            ParentKind::Division => Children::Districts(self.districts_of(key).await?),
            ParentKind::District => Children::Upazilas(self.upazilas_of(key).await?),
            ParentKind::Upazila => Children::Unions(self.unions_of(key).await?),
        })
    }

    /// Case-insensitive substring search over names and Bangla names.
    ///
    /// Fails with `InvalidArgument` if the trimmed term is shorter than
    /// [`MIN_SEARCH_TERM_LEN`](crate::MIN_SEARCH_TERM_LEN).
    async fn search(&self, term: &str, scope: SearchScope) -> Result<SearchResults> {
        let needle = validate_search_term(term)?.to_lowercase();
        let mut results = SearchResults::default();

        if scope.includes(EntityKind::Division) {
            results.divisions = Some(filter_matches(self.divisions().await?, &needle));
        }
        if scope.includes(EntityKind::District) {
            results.districts = Some(filter_matches(self.districts().await?, &needle));
        }
        if scope.includes(EntityKind::Upazila) {
            results.upazilas = Some(filter_matches(self.upazilas().await?, &needle));
        }
        if scope.includes(EntityKind::Union) {
            results.unions = Some(filter_matches(self.unions().await?, &needle));
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeoError;
    use crate::types::Dataset;

    /// Minimal store over a flat dataset, id lookups only.
    struct FlatStore(Dataset);

    #[async_trait]
    impl HierarchyStore for FlatStore {
        fn backend(&self) -> &'static str {
            "flat"
        }
        async fn divisions(&self) -> Result<Vec<Division>> {
            Ok(self.0.divisions.clone())
        }
        async fn districts(&self) -> Result<Vec<District>> {
            Ok(self.0.districts.clone())
        }
        async fn upazilas(&self) -> Result<Vec<Upazila>> {
            Ok(self.0.upazilas.clone())
        }
        async fn unions(&self) -> Result<Vec<Union>> {
            Ok(self.0.unions.clone())
        }
        async fn districts_of(&self, division: &str) -> Result<Vec<District>> {
            Ok(self.0.districts.iter().filter(|d| d.division_id == division).cloned().collect())
        }
        async fn upazilas_of(&self, district: &str) -> Result<Vec<Upazila>> {
            Ok(self.0.upazilas.iter().filter(|u| u.district_id == district).cloned().collect())
        }
        async fn unions_of(&self, upazila_id: &str) -> Result<Vec<Union>> {
            Ok(self.0.unions.iter().filter(|u| u.upazila_id == upazila_id).cloned().collect())
        }
    }

    fn store() -> FlatStore {
        FlatStore(Dataset {
            divisions: vec![Division::new("6", "Dhaka", "ঢাকা"), Division::new("5", "Sylhet", "সিলেট")],
            districts: vec![
                District::new("47", "6", "Dhaka", "ঢাকা"),
                District::new("52", "6", "Faridpur", "ফরিদপুর"),
            ],
            upazilas: vec![Upazila::new("400", "47", "Dhamrai", "ধামরাই")],
            unions: vec![Union::new("4000", "400", "Kulla", "কুল্লা")],
        })
    }

    #[tokio::test]
    async fn test_search_all_scopes() {
        let results = store().search("dha", SearchScope::All).await.unwrap();

        assert_eq!(results.divisions.as_ref().unwrap().len(), 1);
        assert_eq!(results.districts.as_ref().unwrap().len(), 1);
        assert_eq!(results.upazilas.as_ref().unwrap().len(), 1);
        assert_eq!(results.unions.as_ref().unwrap().len(), 0);
        assert_eq!(results.total(), 3);
    }

    #[tokio::test]
    async fn test_search_single_scope() {
        let results = store().search("DHA", SearchScope::Districts).await.unwrap();

        assert!(results.divisions.is_none());
        assert_eq!(results.districts.unwrap()[0].id, "47");
    }

    #[tokio::test]
    async fn test_search_short_term() {
        let err = store().search("d", SearchScope::All).await.unwrap_err();
        assert!(matches!(err, GeoError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_children_of_dispatch() {
        let children = store().children_of(ParentKind::Division, "6").await.unwrap();
        assert!(matches!(children, Children::Districts(ref d) if d.len() == 2));

        let children = store().children_of(ParentKind::Upazila, "400").await.unwrap();
        assert_eq!(children.len(), 1);
    }
}
