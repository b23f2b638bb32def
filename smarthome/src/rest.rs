use crate::errors::{Error, Result};
use crate::metrics::{
    gather_metrics, DEVICE_TOGGLES_TOTAL, READINGS_CREATED_TOTAL, READINGS_DELETED_TOTAL,
};
use crate::model::{CreateReadingRequest, Device, DeviceStatus, SensorReading};
use crate::store::{DeviceStore, ReadingStore};
use crate::validate::validate_reading;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Per-router state: the store handle shared by every request.
#[derive(Debug)]
struct AppState<S> {
    store: Arc<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// `/api/temperatures` routes plus `/health` and `/metrics`
pub fn create_sensor_router<S: ReadingStore>(store: Arc<S>) -> Router {
    let state = AppState { store };

    Router::new()
        .route(
            "/api/temperatures",
            get(list_readings::<S>).post(create_reading::<S>),
        )
        .route("/api/temperatures/:id", delete(delete_reading::<S>))
        .with_state(state)
        .merge(ops_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors())
}

/// `/api/devices` routes plus `/health` and `/metrics`
pub fn create_device_router<S: DeviceStore>(store: Arc<S>) -> Router {
    let state = AppState { store };

    Router::new()
        .route("/api/devices", get(list_devices::<S>))
        .route("/api/device/:id/toggle", post(toggle_device::<S>))
        .with_state(state)
        .merge(ops_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors())
}

/// Both route sets on one listener
pub fn create_combined_router<S: ReadingStore + DeviceStore>(store: Arc<S>) -> Router {
    let readings = AppState {
        store: Arc::clone(&store),
    };
    let devices = AppState { store };

    let sensor_routes = Router::new()
        .route(
            "/api/temperatures",
            get(list_readings::<S>).post(create_reading::<S>),
        )
        .route("/api/temperatures/:id", delete(delete_reading::<S>))
        .with_state(readings);
    let device_routes = Router::new()
        .route("/api/devices", get(list_devices::<S>))
        .route("/api/device/:id/toggle", post(toggle_device::<S>))
        .with_state(devices);

    sensor_routes
        .merge(device_routes)
        .merge(ops_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors())
}

fn ops_router() -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(|| async { gather_metrics() }))
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Path ids that are not a valid integer never match a row.
fn parse_id(raw: &str, entity: &'static str) -> Result<i32> {
    raw.parse::<i32>().map_err(|_| Error::not_found(entity, raw))
}

async fn list_readings<S: ReadingStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<SensorReading>>> {
    let readings = state.store.list_readings().await?;
    Ok(Json(readings))
}

async fn create_reading<S: ReadingStore>(
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Result<(StatusCode, Json<SensorReading>)> {
    // An absent, unparsable or non-object body behaves like `{}`.
    let request = CreateReadingRequest::from_body(&body);
    let reading = validate_reading(request)?;

    let stored = state.store.create_reading(reading).await?;
    READINGS_CREATED_TOTAL.inc();
    info!(
        "Stored reading {} from {} ({})",
        stored.id, stored.name, stored.temperature
    );

    Ok((StatusCode::CREATED, Json(stored)))
}

async fn delete_reading<S: ReadingStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id, "temperature reading")?;
    state.store.delete_reading(id).await?;
    READINGS_DELETED_TOTAL.inc();
    info!("Deleted reading {}", id);

    Ok(StatusCode::NO_CONTENT)
}

async fn list_devices<S: DeviceStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<Device>>> {
    let devices = state.store.list_devices().await?;
    Ok(Json(devices))
}

async fn toggle_device<S: DeviceStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<DeviceStatus>> {
    let id = parse_id(&id, "device")?;
    let toggled = state.store.toggle_device(id).await?;
    DEVICE_TOGGLES_TOTAL.inc();
    info!("Device {} switched {}", toggled.id, if toggled.status { "on" } else { "off" });

    Ok(Json(toggled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use axum::response::Response;
    use chrono::DateTime;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        router.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn seeded(names: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        store.seed_devices(&names).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_list_delete_scenario() {
        let store = Arc::new(MemoryStore::new());
        let router = create_sensor_router(store.clone());

        let response = send(
            &router,
            Method::POST,
            "/api/temperatures",
            Some(json!({"name": "kitchen", "temperature": 21.5})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["id"], 1);
        assert_eq!(created["name"], "kitchen");
        assert_eq!(created["temperature"], 21.5);
        let timestamp = created["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
        assert!(timestamp.ends_with('Z'));

        let response = send(&router, Method::GET, "/api/temperatures", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listed = json_body(response).await;
        assert_eq!(listed, json!([created]));

        let response = send(&router, Method::DELETE, "/api/temperatures/1", None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());

        let response = send(&router, Method::GET, "/api/temperatures", None).await;
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_newest_reading_listed_first() {
        let store = Arc::new(MemoryStore::new());
        let router = create_sensor_router(store);

        for (name, temp) in [("a", 1.0), ("b", 2.0), ("c", 3.0)] {
            let response = send(
                &router,
                Method::POST,
                "/api/temperatures",
                Some(json!({"name": name, "temperature": temp})),
            )
            .await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let listed = json_body(send(&router, Method::GET, "/api/temperatures", None).await).await;
        let names: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_create_missing_fields_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        let router = create_sensor_router(store.clone());

        for body in [
            json!({"temperature": 21.5}),
            json!({"name": "kitchen"}),
            json!({"name": null, "temperature": 21.5}),
            json!({"name": "kitchen", "temperature": "hot"}),
        ] {
            let response = send(&router, Method::POST, "/api/temperatures", Some(body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let error = json_body(response).await;
            assert_eq!(error["error"], "validation_error");
        }

        assert_eq!(store.reading_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_without_body() {
        let store = Arc::new(MemoryStore::new());
        let router = create_sensor_router(store.clone());

        let response = send(&router, Method::POST, "/api/temperatures", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.reading_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_with_non_object_body() {
        let store = Arc::new(MemoryStore::new());
        let router = create_sensor_router(store.clone());

        for body in [json!(["kitchen", 21.5]), json!("kitchen"), json!(21.5), json!(null)] {
            let response = send(&router, Method::POST, "/api/temperatures", Some(body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await["error"], "validation_error");
        }

        assert_eq!(store.reading_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_reading_leaves_store_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let router = create_sensor_router(store.clone());

        send(
            &router,
            Method::POST,
            "/api/temperatures",
            Some(json!({"name": "kitchen", "temperature": 20})),
        )
        .await;

        let response = send(&router, Method::DELETE, "/api/temperatures/99", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "not_found");

        let response = send(&router, Method::DELETE, "/api/temperatures/abc", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        assert_eq!(store.reading_count().await, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one() {
        let store = Arc::new(MemoryStore::new());
        let router = create_sensor_router(store.clone());

        for temp in [10, 11, 12] {
            send(
                &router,
                Method::POST,
                "/api/temperatures",
                Some(json!({"name": "hall", "temperature": temp})),
            )
            .await;
        }

        let response = send(&router, Method::DELETE, "/api/temperatures/2", None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let listed = json_body(send(&router, Method::GET, "/api/temperatures", None).await).await;
        let ids: Vec<i64> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_list_devices() {
        let store = seeded(&["lamp", "fan"]).await;
        let router = create_device_router(store);

        let response = send(&router, Method::GET, "/api/devices", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!([
                {"id": 1, "name": "lamp", "status": false},
                {"id": 2, "name": "fan", "status": false}
            ])
        );
    }

    #[tokio::test]
    async fn test_toggle_is_involution() {
        let store = seeded(&["lamp"]).await;
        let router = create_device_router(store.clone());

        let response = send(&router, Method::POST, "/api/device/1/toggle", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"id": 1, "status": true}));

        let response = send(&router, Method::POST, "/api/device/1/toggle", None).await;
        assert_eq!(json_body(response).await, json!({"id": 1, "status": false}));

        assert!(!store.device(1).await.unwrap().status);
    }

    #[tokio::test]
    async fn test_toggle_unknown_device() {
        let store = seeded(&["lamp"]).await;
        let router = create_device_router(store.clone());

        let response = send(&router, Method::POST, "/api/device/42/toggle", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        assert!(!store.device(1).await.unwrap().status);
    }

    #[tokio::test]
    async fn test_concurrent_toggles_lose_no_updates() {
        let store = seeded(&["lamp"]).await;
        let router = create_device_router(store.clone());

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let router = router.clone();
                tokio::spawn(async move {
                    send(&router, Method::POST, "/api/device/1/toggle", None)
                        .await
                        .status()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), StatusCode::OK);
        }

        assert!(!store.device(1).await.unwrap().status);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let router = create_sensor_router(Arc::new(MemoryStore::new()));

        let request = Request::builder()
            .uri("/api/temperatures")
            .header(header::ORIGIN, "http://dashboard.local")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn test_combined_router_serves_both() {
        let store = seeded(&["lamp"]).await;
        let router = create_combined_router(store);

        let response = send(&router, Method::GET, "/api/temperatures", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(&router, Method::GET, "/api/devices", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(&router, Method::GET, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_device_router_has_no_sensor_routes() {
        let router = create_device_router(seeded(&[]).await);

        let response = send(&router, Method::GET, "/api/temperatures", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
