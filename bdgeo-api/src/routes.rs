//! API route configuration.

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::middleware::{get_only, rate_limit, response_cache, track_requests};
use crate::state::AppState;

/// Prefix of the versioned geo routes.
pub const GEO_API_PREFIX: &str = "/geo/v2.0";

/// Creates the API router with all routes configured.
///
/// Geo routes run behind the rate limiter, the response cache and the
/// GET-only guard, in that order. Ops routes skip all three.
pub fn create_router(state: Arc<AppState>) -> Router {
    let geo = Router::new()
        .route("/divisions", get(handlers::list_divisions))
        .route("/districts", get(handlers::list_districts))
        .route("/upazilas", get(handlers::list_upazilas))
        .route("/unions", get(handlers::list_unions))
        .route("/districts/:division", get(handlers::districts_of))
        .route("/upazilas/:district", get(handlers::upazilas_of))
        .route("/unions/:upazila_id", get(handlers::unions_of))
        .route("/search/:term", get(handlers::search))
        .route_layer(from_fn(get_only))
        .layer(from_fn_with_state(state.clone(), response_cache))
        .layer(from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        // Ops
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/cache/stats", get(handlers::cache_stats))
        .route("/cache/clear", post(handlers::clear_cache))

        // Geo
        .nest(GEO_API_PREFIX, geo)

        .fallback(handlers::not_found)
        .layer(from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use bdgeo_cache::{ManualClock, ResponseCache};
    use bdgeo_core::traits::HierarchyStore;
    use bdgeo_core::types::{Dataset, District, Division, Union, Upazila};
    use bdgeo_store::{export_dataset, DocumentStore, MemoryStore};

    use crate::state::ApiConfig;

    fn test_config() -> ApiConfig {
        ApiConfig {
            rate_limit_max: 0,
            ..Default::default()
        }
    }

    fn embedded_store() -> Arc<dyn HierarchyStore> {
        Arc::new(MemoryStore::embedded().unwrap())
    }

    fn scenario_store() -> Arc<dyn HierarchyStore> {
        Arc::new(
            MemoryStore::from_dataset(Dataset {
                divisions: vec![
                    Division::new("10", "Dhaka", "ঢাকা"),
                    Division::new("20", "Sylhet", "সিলেট"),
                ],
                districts: vec![
                    District::new("10", "10", "Dhaka", "ঢাকা"),
                    District::new("21", "20", "Sylhet", "সিলেট"),
                ],
                upazilas: vec![Upazila::new("100", "10", "Savar", "সাভার")],
                unions: vec![Union::new("1000", "100", "Ashulia", "আশুলিয়া")],
            })
            .unwrap(),
        )
    }

    fn test_app(config: ApiConfig, store: Arc<dyn HierarchyStore>) -> Router {
        create_router(Arc::new(AppState::new(config, store)))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, json)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    fn x_cache(headers: &HeaderMap) -> &str {
        headers.get("x-cache").and_then(|v| v.to_str().ok()).unwrap_or("")
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app(test_config(), scenario_store());
        let (status, headers, json) = get(&app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["backend"], "memory");
        assert!(headers.contains_key("x-response-time"));
    }

    #[tokio::test]
    async fn test_districts_of_division_strips_parent() {
        let app = test_app(test_config(), scenario_store());
        let (status, _, json) = get(&app, "/geo/v2.0/districts/10").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 1);
        assert_eq!(json["data"][0]["id"], "10");
        assert_eq!(json["data"][0]["name"], "Dhaka");
        assert!(json["data"][0].get("division_id").is_none());
    }

    #[tokio::test]
    async fn test_unknown_division_is_404_with_empty_data() {
        let app = test_app(test_config(), scenario_store());
        let (status, _, json) = get(&app, "/geo/v2.0/districts/99").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert_eq!(json["data"], serde_json::json!([]));
        assert_eq!(json["message"], "No districts found for division: 99.");
    }

    #[tokio::test]
    async fn test_count_matches_data_len() {
        let app = test_app(test_config(), embedded_store());

        for uri in [
            "/geo/v2.0/divisions",
            "/geo/v2.0/districts",
            "/geo/v2.0/upazilas",
            "/geo/v2.0/unions",
            "/geo/v2.0/districts/6",
            "/geo/v2.0/upazilas/1",
            "/geo/v2.0/unions/1",
        ] {
            let (status, _, json) = get(&app, uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            let len = json["data"].as_array().unwrap().len();
            assert!(len > 0, "{uri}");
            assert_eq!(json["count"].as_u64().unwrap() as usize, len, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_districts_partition_by_division() {
        let app = test_app(test_config(), embedded_store());
        let (_, _, divisions) = get(&app, "/geo/v2.0/divisions").await;
        let (_, _, all) = get(&app, "/geo/v2.0/districts").await;

        let mut collected = BTreeSet::new();
        for division in divisions["data"].as_array().unwrap() {
            let id = division["id"].as_str().unwrap();
            let (status, _, json) = get(&app, &format!("/geo/v2.0/districts/{id}")).await;
            assert_eq!(status, StatusCode::OK);

            for district in json["data"].as_array().unwrap() {
                let district_id = district["id"].as_str().unwrap().to_string();
                let full = all["data"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .find(|d| d["id"] == district_id.as_str())
                    .unwrap();
                assert_eq!(full["division_id"], id);
                assert!(collected.insert(district_id));
            }
        }

        let every: BTreeSet<String> = all["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(collected, every);
    }

    #[tokio::test]
    async fn test_name_lookup_ignores_case() {
        let app = test_app(test_config(), embedded_store());
        let (_, _, lower) = get(&app, "/geo/v2.0/districts/dhaka").await;
        let (_, _, title) = get(&app, "/geo/v2.0/districts/Dhaka").await;
        let (_, _, upper) = get(&app, "/geo/v2.0/districts/DHAKA").await;

        assert!(lower["count"].as_u64().unwrap() > 0);
        assert_eq!(lower["data"], title["data"]);
        assert_eq!(title["data"], upper["data"]);
    }

    #[tokio::test]
    async fn test_cached_name_lookup_keeps_stored_spelling() {
        let app = test_app(test_config(), scenario_store());
        let (_, first, upper) = get(&app, "/geo/v2.0/districts/DHAKA").await;
        let (_, second, lower) = get(&app, "/geo/v2.0/districts/dhaka").await;

        assert_eq!(x_cache(&first), "MISS");
        assert_eq!(x_cache(&second), "HIT");
        assert_eq!(upper["message"], "Successfully retrieved districts for division: Dhaka.");
        assert_eq!(lower, upper);
    }

    #[tokio::test]
    async fn test_upazilas_by_district_name() {
        let app = test_app(test_config(), embedded_store());
        let (status, _, json) = get(&app, "/geo/v2.0/upazilas/comilla").await;

        assert_eq!(status, StatusCode::OK);
        assert!(json["data"]
            .as_array()
            .unwrap()
            .iter()
            .any(|u| u["name"] == "Debidwar"));
        assert!(json["data"][0].get("district_id").is_none());
    }

    #[tokio::test]
    async fn test_search_covers_every_match() {
        let app = test_app(test_config(), embedded_store());
        let (status, _, json) = get(&app, "/geo/v2.0/search/dha").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["query"], "dha");
        assert_eq!(json["type"], "all");
        assert_eq!(json["message"], "Search results for \"dha\"");

        for level in ["divisions", "districts", "upazilas", "unions"] {
            let (_, _, listing) = get(&app, &format!("/geo/v2.0/{level}")).await;
            let found = json["data"][level].as_array().unwrap();

            for entity in listing["data"].as_array().unwrap() {
                let name = entity["name"].as_str().unwrap().to_lowercase();
                let bn_name = entity["bn_name"].as_str().unwrap().to_lowercase();
                if name.contains("dha") || bn_name.contains("dha") {
                    assert!(found.iter().any(|f| f["id"] == entity["id"]), "{level} {name}");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_search_rejects_short_term_and_bad_type() {
        let app = test_app(test_config(), scenario_store());

        let (status, _, json) = get(&app, "/geo/v2.0/search/d").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Search query must be at least 2 characters long.");

        let (status, _, _) = get(&app, "/geo/v2.0/search/dhaka?type=villages").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, json) = get(&app, "/geo/v2.0/search/dhaka?type=districts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 1);
        assert!(json["data"].get("divisions").is_none());
    }

    #[tokio::test]
    async fn test_invalid_param_is_validation_error() {
        let app = test_app(test_config(), scenario_store());
        let (status, _, json) = get(&app, "/geo/v2.0/districts/dhaka!").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Validation failed");
        assert_eq!(json["errors"][0]["field"], "division");
        assert_eq!(json["errors"][0]["value"], "dhaka!");
    }

    #[tokio::test]
    async fn test_second_get_is_cache_hit() {
        let app = test_app(test_config(), scenario_store());

        let (_, first_headers, first) = get(&app, "/geo/v2.0/divisions").await;
        let (_, second_headers, second) = get(&app, "/geo/v2.0/divisions").await;

        assert_eq!(x_cache(&first_headers), "MISS");
        assert_eq!(x_cache(&second_headers), "HIT");
        assert_eq!(first["data"], second["data"]);
        // Cached bytes are replayed as-is.
        assert_eq!(first["timestamp"], second["timestamp"]);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let app = test_app(test_config(), scenario_store());

        let (_, first, _) = get(&app, "/geo/v2.0/districts/99").await;
        let (_, second, _) = get(&app, "/geo/v2.0/districts/99").await;

        assert_eq!(x_cache(&first), "MISS");
        assert_eq!(x_cache(&second), "MISS");
    }

    #[tokio::test]
    async fn test_cache_entry_expires() {
        let config = test_config();
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(ResponseCache::with_clock(config.cache.clone(), clock.clone()));
        let app = create_router(Arc::new(AppState::with_cache(config, scenario_store(), cache)));

        let (_, headers, _) = get(&app, "/geo/v2.0/districts").await;
        assert_eq!(x_cache(&headers), "MISS");
        let (_, headers, _) = get(&app, "/geo/v2.0/districts").await;
        assert_eq!(x_cache(&headers), "HIT");

        clock.advance(Duration::from_secs(300));
        let (_, headers, _) = get(&app, "/geo/v2.0/districts").await;
        assert_eq!(x_cache(&headers), "MISS");
    }

    #[tokio::test]
    async fn test_cache_disabled() {
        let config = ApiConfig {
            enable_cache: false,
            ..test_config()
        };
        let app = test_app(config, scenario_store());

        let (_, headers, _) = get(&app, "/geo/v2.0/divisions").await;
        assert!(!headers.contains_key("x-cache"));
    }

    #[tokio::test]
    async fn test_clear_cache_flushes_entries() {
        let config = ApiConfig {
            admin_token: Some("secret".into()),
            ..test_config()
        };
        let app = test_app(config, scenario_store());

        get(&app, "/geo/v2.0/divisions").await;
        let (_, headers, _) = get(&app, "/geo/v2.0/divisions").await;
        assert_eq!(x_cache(&headers), "HIT");

        let clear = Request::builder()
            .method("POST")
            .uri("/cache/clear")
            .header("x-admin-token", "secret")
            .body(Body::empty())
            .unwrap();
        let (status, _, json) = send(&app, clear).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["keys"], 0);
        assert_eq!(json["data"]["hits"], 1);

        let (_, headers, _) = get(&app, "/geo/v2.0/divisions").await;
        assert_eq!(x_cache(&headers), "MISS");
    }

    #[tokio::test]
    async fn test_clear_cache_requires_token() {
        let closed = test_app(test_config(), scenario_store());
        let post = |token: Option<&str>| {
            let mut builder = Request::builder().method("POST").uri("/cache/clear");
            if let Some(token) = token {
                builder = builder.header("x-admin-token", token);
            }
            builder.body(Body::empty()).unwrap()
        };

        let (status, _, _) = send(&closed, post(Some("anything"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let open = test_app(
            ApiConfig {
                admin_token: Some("secret".into()),
                ..test_config()
            },
            scenario_store(),
        );
        let (status, _, _) = send(&open, post(Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _, _) = send(&open, post(None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cache_stats_endpoint() {
        let app = test_app(test_config(), scenario_store());
        get(&app, "/geo/v2.0/divisions").await;
        get(&app, "/geo/v2.0/divisions").await;

        let (status, _, json) = get(&app, "/cache/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["keys"], 1);
        assert_eq!(json["data"]["hits"], 1);
        assert_eq!(json["data"]["misses"], 1);
        assert_eq!(json["data"]["hitRate"], 0.5);
    }

    #[tokio::test]
    async fn test_post_on_geo_route_is_405() {
        let app = test_app(test_config(), scenario_store());
        let request = Request::builder()
            .method("POST")
            .uri("/geo/v2.0/divisions")
            .body(Body::empty())
            .unwrap();
        let (status, headers, json) = send(&app, request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json["allowedMethods"], serde_json::json!(["GET"]));
        assert_eq!(headers["allow"], "GET");
    }

    #[tokio::test]
    async fn test_rate_limit_per_client() {
        let config = ApiConfig {
            rate_limit_max: 2,
            rate_limit_window_secs: 900,
            ..Default::default()
        };
        let app = test_app(config, scenario_store());
        let from = |ip: &str| {
            Request::builder()
                .uri("/geo/v2.0/divisions")
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap()
        };

        assert_eq!(send(&app, from("198.51.100.1")).await.0, StatusCode::OK);
        assert_eq!(send(&app, from("198.51.100.1")).await.0, StatusCode::OK);

        let (status, headers, json) = send(&app, from("198.51.100.1")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["message"], "Too many requests, please try again later");
        assert!(headers.contains_key("retry-after"));

        assert_eq!(send(&app, from("198.51.100.2")).await.0, StatusCode::OK);

        // Ops routes are not limited.
        let health = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", "198.51.100.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, health).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = test_app(test_config(), scenario_store());

        let (status, _, json) = get(&app, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "API endpoint not found. Please check the URL.");

        let (status, _, _) = get(&app, "/geo/v2.0/villages").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats_counts_requests() {
        let app = test_app(test_config(), scenario_store());
        get(&app, "/geo/v2.0/divisions").await;
        get(&app, "/geo/v2.0/districts/99").await;

        let (status, _, json) = get(&app, "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["requests"], 2);
        assert_eq!(json["data"]["errors"], 0);
        assert_eq!(json["data"]["errorRate"], 0.0);
        assert_eq!(json["data"]["dataset"]["divisions"], 2);
        assert!(json["data"]["memory"]["cachedBytes"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = MemoryStore::embedded().unwrap().dataset();
        export_dataset(&dataset, dir.path()).await.unwrap();
        let store = DocumentStore::connect(dir.path(), Duration::from_secs(5)).await.unwrap();
        let app = test_app(test_config(), Arc::new(store));

        let (status, _, _) = get(&app, "/geo/v2.0/unions").await;
        assert_eq!(status, StatusCode::OK);

        std::fs::remove_file(dir.path().join("geo_unions.json")).unwrap();
        let (status, headers, json) = get(&app, "/geo/v2.0/unions/1").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Database connection error");
        assert_eq!(x_cache(&headers), "MISS");

        let (_, _, json) = get(&app, "/stats").await;
        assert_eq!(json["data"]["errors"], 1);
    }
}
