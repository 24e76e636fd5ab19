//! DTOs for API requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bdgeo_cache::CacheStats;
use bdgeo_core::types::{DatasetCounts, District, SearchResults, Union, Upazila};

/// Uniform success wrapper.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Always `true`
    pub success: bool,
    /// Payload
    pub data: T,
    /// Human-readable summary
    pub message: String,
    /// Number of items, for list payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Response time, RFC 3339 UTC
    pub timestamp: DateTime<Utc>,
}

impl<T> Envelope<T> {
    /// Wraps a single payload.
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
            count: None,
            timestamp: Utc::now(),
        }
    }

    /// Sets an explicit item count.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

impl<T> Envelope<Vec<T>> {
    /// Wraps a list, counting its items.
    pub fn list(data: Vec<T>, message: impl Into<String>) -> Self {
        let count = data.len();
        Self::new(data, message).with_count(count)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHILD VIEWS
// ═══════════════════════════════════════════════════════════════════════════════

/// District listed under its division, without the parent reference.
#[derive(Debug, Serialize)]
pub struct DistrictView {
    /// District id
    pub id: String,
    /// English name
    pub name: String,
    /// Bangla name
    pub bn_name: String,
    /// Latitude
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    /// Longitude
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<String>,
    /// Official website
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<District> for DistrictView {
    fn from(d: District) -> Self {
        Self {
            id: d.id,
            name: d.name,
            bn_name: d.local_name,
            lat: d.lat,
            lon: d.lon,
            url: d.url,
        }
    }
}

/// Upazila listed under its district, without the parent reference.
#[derive(Debug, Serialize)]
pub struct UpazilaView {
    /// Upazila id
    pub id: String,
    /// English name
    pub name: String,
    /// Bangla name
    pub bn_name: String,
    /// Official website
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<Upazila> for UpazilaView {
    fn from(u: Upazila) -> Self {
        Self {
            id: u.id,
            name: u.name,
            bn_name: u.local_name,
            url: u.url,
        }
    }
}

/// Union listed under its upazila, without the parent reference.
#[derive(Debug, Serialize)]
pub struct UnionView {
    /// Union id
    pub id: String,
    /// English name
    pub name: String,
    /// Bangla name
    pub bn_name: String,
    /// Official website
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<Union> for UnionView {
    fn from(u: Union) -> Self {
        Self {
            id: u.id,
            name: u.name,
            bn_name: u.local_name,
            url: u.url,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEARCH
// ═══════════════════════════════════════════════════════════════════════════════

/// Query string of `GET /search/{term}`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Level filter, `all` when absent
    #[serde(rename = "type")]
    pub scope: Option<String>,
}

/// Search envelope; echoes the query and scope.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Always `true`
    pub success: bool,
    /// Matches per level
    pub data: SearchResults,
    /// Human-readable summary
    pub message: String,
    /// Matches across all levels
    pub count: usize,
    /// Trimmed search term
    pub query: String,
    /// Scope that was searched
    #[serde(rename = "type")]
    pub scope: String,
    /// Response time
    pub timestamp: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPS
// ═══════════════════════════════════════════════════════════════════════════════

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `true`
    pub success: bool,
    /// Service status
    pub status: String,
    /// Store backend name
    pub backend: String,
    /// Seconds since start
    pub uptime_secs: u64,
    /// Response time
    pub timestamp: DateTime<Utc>,
}

/// Traffic and dataset statistics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Requests seen
    pub requests: u64,
    /// Requests answered with a server error
    pub errors: u64,
    /// Percentage of requests that errored, two decimals
    pub error_rate: f64,
    /// Seconds since start
    pub uptime_secs: u64,
    /// Entities per level
    pub dataset: DatasetCounts,
    /// Response cache statistics
    pub cache: CacheStats,
    /// Estimated memory held by cached responses
    pub memory: MemoryUsage,
}

/// Estimated memory held by the response cache.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    /// Buffered response body bytes
    pub cached_bytes: u64,
    /// Same figure in MiB, two decimals
    pub cached_mb: f64,
}

impl MemoryUsage {
    /// Builds the figure from a byte count.
    pub fn from_bytes(bytes: usize) -> Self {
        let cached_bytes = bytes as u64;
        Self {
            cached_bytes,
            cached_mb: (cached_bytes as f64 / 1_048_576.0 * 100.0).round() / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_envelope_counts_items() {
        let env = Envelope::list(vec![1, 2, 3], "three");
        let json = serde_json::to_value(&env).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 3);
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_memory_usage_rounds_to_mib() {
        let usage = MemoryUsage::from_bytes(3 * 1_048_576 / 2);
        assert_eq!(usage.cached_bytes, 1_572_864);
        assert_eq!(usage.cached_mb, 1.5);

        let json = serde_json::to_value(MemoryUsage::from_bytes(0)).unwrap();
        assert_eq!(json["cachedBytes"], 0);
        assert_eq!(json["cachedMb"], 0.0);
    }

    #[test]
    fn test_district_view_drops_parent() {
        let view = DistrictView::from(District::new("10", "10", "Dhaka", "ঢাকা"));
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["id"], "10");
        assert_eq!(json["bn_name"], "ঢাকা");
        assert!(json.get("division_id").is_none());
        assert!(json.get("lat").is_none());
    }
}
