//! Handlers for the `notebookRuntimeTemplates` collection.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::{MockState, RecordedRequest, apply_mask_path, collection_prefix, etag, timestamp};

const COLLECTION: &str = "/v1beta1/projects/{project}/locations/{location}/notebookRuntimeTemplates";
const ITEM: &str = "/v1beta1/projects/{project}/locations/{location}/notebookRuntimeTemplates/{id}";

pub fn router(state: MockState) -> Router {
    Router::new()
        .route(COLLECTION, get(list_templates).post(create_template))
        .route(ITEM, axum::routing::patch(patch_template).delete(delete_template))
        .with_state(state)
}

/// Error body in the remote's `{ "error": { ... } }` shape.
fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = json!({
        "error": {
            "code": status.as_u16(),
            "message": message.into(),
            "status": status.canonical_reason().unwrap_or("UNKNOWN"),
        }
    });
    (status, Json(body)).into_response()
}

fn parse_body(body: &Bytes) -> Result<Option<Value>, Response> {
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid JSON payload: {e}")))
}

/// Records the request, checks the bearer token and serves any canned reply.
async fn admit(
    state: &MockState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Option<Value>,
) -> Result<(), Response> {
    let mut inner = state.inner.write().await;
    inner.requests.push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body,
    });
    debug!(method = %method, path = %uri.path(), "Mock request");

    let expected = format!("Bearer {}", state.token());
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Request had invalid authentication credentials.",
        ));
    }

    let canned = inner
        .canned
        .take_if(|canned| canned.matches(method.as_str()));
    if let Some(canned) = canned {
        let status = StatusCode::from_u16(canned.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return Err((status, Json(canned.body)).into_response());
    }
    Ok(())
}

fn operation_name(project: &str, location: &str) -> String {
    format!(
        "projects/{project}/locations/{location}/operations/{}",
        Uuid::new_v4().as_u128() % 10_000_000_000
    )
}

pub async fn list_templates(
    State(state): State<MockState>,
    Path((project, location)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = admit(&state, &method, &uri, &headers, None).await {
        return response;
    }

    let prefix = collection_prefix(&project, &location);
    let inner = state.inner.read().await;
    let templates: Vec<Value> = inner
        .templates
        .iter()
        .filter(|(name, _)| name.starts_with(&prefix))
        .map(|(_, t)| t.clone())
        .collect();

    // The remote omits the array for an empty collection.
    if templates.is_empty() {
        return Json(json!({})).into_response();
    }
    Json(json!({ "notebookRuntimeTemplates": templates })).into_response()
}

pub async fn create_template(
    State(state): State<MockState>,
    Path((project, location)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    if let Err(response) = admit(&state, &method, &uri, &headers, payload.clone()).await {
        return response;
    }

    let Some(Value::Object(mut template)) = payload else {
        return api_error(StatusCode::BAD_REQUEST, "Request body must be a JSON object.");
    };
    let has_display_name = template
        .get("displayName")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    if !has_display_name {
        return api_error(StatusCode::BAD_REQUEST, "displayName is required.");
    }

    let mut inner = state.inner.write().await;
    let name = format!(
        "{}{}",
        collection_prefix(&project, &location),
        inner.allocate_id()
    );
    let now = timestamp();
    template.insert("name".to_string(), json!(name));
    template.insert("createTime".to_string(), json!(now));
    template.insert("updateTime".to_string(), json!(now));
    template.insert("etag".to_string(), json!(etag()));
    template
        .entry("notebookRuntimeType")
        .or_insert_with(|| json!("USER_DEFINED"));

    let created = Value::Object(template);
    inner.templates.insert(name.clone(), created.clone());
    info!(name = %name, "Mock template created");

    let mut response = created;
    if let Some(obj) = response.as_object_mut() {
        obj.insert(
            "@type".to_string(),
            json!("type.googleapis.com/google.cloud.aiplatform.v1beta1.NotebookRuntimeTemplate"),
        );
    }
    Json(json!({
        "name": operation_name(&project, &location),
        "done": true,
        "response": response,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct PatchParams {
    #[serde(rename = "updateMask")]
    update_mask: Option<String>,
}

pub async fn patch_template(
    State(state): State<MockState>,
    Path((project, location, id)): Path<(String, String, String)>,
    Query(params): Query<PatchParams>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    if let Err(response) = admit(&state, &method, &uri, &headers, payload.clone()).await {
        return response;
    }

    let mask: Vec<String> = params
        .update_mask
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if mask.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "updateMask is required.");
    }

    let name = format!("{}{}", collection_prefix(&project, &location), id);
    let source = payload.unwrap_or_else(|| json!({}));

    let mut inner = state.inner.write().await;
    if let Some(path) = mask.iter().find(|p| !inner.patchable.contains(*p)) {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("Update mask path {path} is not supported."),
        );
    }

    let Some(stored) = inner.templates.get_mut(&name) else {
        return api_error(StatusCode::NOT_FOUND, format!("{name} not found."));
    };
    for path in &mask {
        apply_mask_path(stored, &source, path);
    }
    if let Some(obj) = stored.as_object_mut() {
        obj.insert("updateTime".to_string(), json!(timestamp()));
        obj.insert("etag".to_string(), json!(etag()));
    }
    info!(name = %name, mask = %mask.join(","), "Mock template patched");

    Json(stored.clone()).into_response()
}

pub async fn delete_template(
    State(state): State<MockState>,
    Path((project, location, id)): Path<(String, String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = admit(&state, &method, &uri, &headers, None).await {
        return response;
    }

    let name = format!("{}{}", collection_prefix(&project, &location), id);
    let removed = state.inner.write().await.templates.remove(&name);
    if removed.is_none() {
        return api_error(StatusCode::NOT_FOUND, format!("{name} not found."));
    }
    info!(name = %name, "Mock template deleted");

    Json(json!({
        "name": operation_name(&project, &location),
        "done": true,
        "response": { "@type": "type.googleapis.com/google.protobuf.Empty" },
    }))
    .into_response()
}
