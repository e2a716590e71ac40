//! HTTP API
//!
//! - GET    /health
//! - GET    /storages, POST /storages, GET /storages/:id
//! - GET    /storages/:id/account, POST /storages/:id/account
//! - POST   /storages/:id/account/import
//! - GET    /storages/:id/account/:account_id, DELETE same
//! - GET    /storages/:id/account/:account_id/tasks, POST and DELETE same
//! - GET    /storages/:id/:table/data, POST and DELETE same
//! - GET    /storages/:id/:table/data/:record_id, DELETE same
//!
//! Successful responses are `{"result": ...}`; failures use the error body
//! of [`crate::error::GatewayError`].

mod accounts;
mod data;
mod health;
mod storages;
mod tasks;

pub use health::HealthResponse;
pub use storages::{CreateStorageResponse, StorageView};

use crate::config::ProvisionMode;
use crate::gateway::Gateway;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared state for every endpoint
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub provision_mode: ProvisionMode,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>, provision_mode: ProvisionMode) -> Self {
        Self {
            gateway,
            provision_mode,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub result: T,
}

pub(crate) fn reply<T: Serialize>(result: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { result })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/storages",
            get(storages::list_storages).post(storages::create_storage),
        )
        .route("/storages/:id", get(storages::get_storage))
        .route(
            "/storages/:id/account",
            get(accounts::list_accounts).post(accounts::save_account),
        )
        .route("/storages/:id/account/import", post(accounts::import_accounts))
        .route(
            "/storages/:id/account/:account_id",
            get(accounts::get_account).delete(accounts::delete_account),
        )
        .route(
            "/storages/:id/account/:account_id/tasks",
            get(tasks::list_tasks)
                .post(tasks::save_task)
                .delete(tasks::delete_tasks),
        )
        .route(
            "/storages/:id/:table/data",
            get(data::list_data)
                .post(data::save_data)
                .delete(data::delete_all_data),
        )
        .route(
            "/storages/:id/:table/data/:record_id",
            get(data::get_data).delete(data::delete_data),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;
    use crate::engine::EngineSet;
    use crate::ops::AccountImporter;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(dir: &TempDir, engine: ScriptedEngine, mode: ProvisionMode) -> Router {
        let importer = AccountImporter::new(Duration::from_secs(1)).unwrap();
        let gateway =
            Gateway::open(dir.path(), EngineSet::new().with(Arc::new(engine)), importer).unwrap();
        router(Arc::new(AppState::new(Arc::new(gateway), mode)))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn storage_body(db_name: &str) -> Value {
        json!({
            "engineType": "memory",
            "dbName": db_name,
            "dbPrefixTable": "app",
            "dbPassword": "secret",
            "dbStructure": [{"name": "orders", "structure": {"total": "number"}}]
        })
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir, ScriptedEngine::new(), ProvisionMode::Wait);

        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["storages"], json!(0));
    }

    #[tokio::test]
    async fn test_storage_and_data_flow() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir, ScriptedEngine::new(), ProvisionMode::Wait);

        let (status, body) = call(&app, "POST", "/storages", Some(storage_body("shop"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["result"]["storage"].get("dbPassword").is_none());
        assert_eq!(body["result"]["report"]["tables"].as_array().unwrap().len(), 3);
        let id = body["result"]["storage"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "GET", &format!("/storages/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["tables"], json!(["app_account", "app_task", "orders"]));

        let (status, body) = call(
            &app,
            "POST",
            &format!("/storages/{}/orders/data", id),
            Some(json!({"id": "o-1", "total": 12.5})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["id"], json!("o-1"));

        let (_, body) = call(&app, "GET", &format!("/storages/{}/orders/data", id), None).await;
        assert_eq!(body["result"].as_array().unwrap().len(), 1);

        let (status, body) =
            call(&app, "DELETE", &format!("/storages/{}/orders/data/o-1", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["count"], json!(1));
    }

    #[tokio::test]
    async fn test_account_and_task_routes() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir, ScriptedEngine::new(), ProvisionMode::Wait);

        let (_, body) = call(&app, "POST", "/storages", Some(storage_body("crm"))).await;
        let id = body["result"]["storage"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/storages/{}/account", id),
            Some(json!({"profileKey": "p-1", "name": "Ada"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let account_id = body["result"]["id"].as_str().unwrap().to_string();

        let tasks_uri = format!("/storages/{}/account/{}/tasks", id, account_id);
        let (status, body) =
            call(&app, "POST", &tasks_uri, Some(json!({"title": "follow up"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["profileKey"], json!("p-1"));

        let (_, body) = call(&app, "GET", &tasks_uri, None).await;
        assert_eq!(body["result"].as_array().unwrap().len(), 1);

        let (_, body) = call(&app, "DELETE", &tasks_uri, None).await;
        assert_eq!(body["result"]["count"], json!(1));

        let (status, body) =
            call(&app, "GET", &format!("/storages/{}/account/{}", id, account_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["name"], json!("Ada"));
    }

    #[tokio::test]
    async fn test_resolution_errors_map_to_404() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir, ScriptedEngine::new(), ProvisionMode::Wait);

        let (status, body) = call(&app, "GET", "/storages/nope/orders/data", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("storage_not_found"));

        let (_, body) = call(&app, "POST", "/storages", Some(storage_body("shop"))).await;
        let id = body["result"]["storage"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "GET", &format!("/storages/{}/ghosts/data", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("model_not_found"));
    }

    #[tokio::test]
    async fn test_unreachable_database_is_503_and_storage_is_kept() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir, ScriptedEngine::new().unreachable("shop"), ProvisionMode::Wait);

        let (status, body) = call(&app, "POST", "/storages", Some(storage_body("shop"))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], json!("connection_failed"));
        let storage_id = body["storageId"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "GET", &format!("/storages/{}", storage_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["dbName"], json!("shop"));

        let (_, body) = call(&app, "GET", "/storages", None).await;
        assert_eq!(body["result"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_background_mode_accepts_immediately() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir, ScriptedEngine::new(), ProvisionMode::Background);

        let (status, body) = call(&app, "POST", "/storages", Some(storage_body("shop"))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body["result"]["storage"]["id"].is_string());
        assert!(body["result"]["report"].is_null());
    }

    #[tokio::test]
    async fn test_invalid_storage_is_400() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir, ScriptedEngine::new(), ProvisionMode::Wait);

        let mut body = storage_body("shop");
        body["dbPrefixTable"] = json!("bad prefix");
        let (status, body) = call(&app, "POST", "/storages", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("invalid_request"));
    }
}
