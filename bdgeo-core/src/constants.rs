//! Constants shared across the bdgeo crates.

// ═══════════════════════════════════════════════════════════════════════════════
// SEARCH
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum number of characters in a search term (after trimming).
pub const MIN_SEARCH_TERM_LEN: usize = 2;

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENT STORE COLLECTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Collection holding division documents.
pub const DIVISIONS_COLLECTION: &str = "geo_divisions";

/// Collection holding district documents.
pub const DISTRICTS_COLLECTION: &str = "geo_districts";

/// Collection holding upazila documents.
pub const UPAZILAS_COLLECTION: &str = "geo_upazilas";

/// Collection holding union documents.
pub const UNIONS_COLLECTION: &str = "geo_unions";

/// All collections, in hierarchy order.
pub const COLLECTIONS: [&str; 4] = [
    DIVISIONS_COLLECTION,
    DISTRICTS_COLLECTION,
    UPAZILAS_COLLECTION,
    UNIONS_COLLECTION,
];
