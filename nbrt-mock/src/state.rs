//! In-memory state of the fake API.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Mask paths the real API accepts on PATCH.
pub const DEFAULT_PATCHABLE: &[&str] = &["encryptionSpec.kmsKeyName"];

/// One request as the server saw it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<Value>,
}

/// A canned reply served instead of the next matching request's normal
/// handling. `method: None` matches any request.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub method: Option<String>,
    pub status: u16,
    pub body: Value,
}

impl CannedResponse {
    pub(crate) fn matches(&self, method: &str) -> bool {
        self.method.as_deref().is_none_or(|m| m.eq_ignore_ascii_case(method))
    }
}

pub(crate) struct Inner {
    pub(crate) templates: BTreeMap<String, Value>,
    pub(crate) requests: Vec<RecordedRequest>,
    pub(crate) canned: Option<CannedResponse>,
    pub(crate) patchable: Vec<String>,
    next_id: u64,
}

impl Inner {
    pub(crate) fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct MockState {
    pub(crate) inner: Arc<RwLock<Inner>>,
    token: Arc<String>,
}

pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn etag() -> String {
    Uuid::new_v4().simple().to_string()
}

pub(crate) fn collection_prefix(project: &str, location: &str) -> String {
    format!("projects/{project}/locations/{location}/notebookRuntimeTemplates/")
}

impl MockState {
    /// Requests must carry `Authorization: Bearer <token>`.
    pub fn new(token: &str) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                templates: BTreeMap::new(),
                requests: Vec::new(),
                canned: None,
                patchable: DEFAULT_PATCHABLE.iter().map(|p| p.to_string()).collect(),
                next_id: 1_000_000_000,
            })),
            token: Arc::new(token.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Every request received so far, oldest first.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.read().await.requests.clone()
    }

    pub async fn clear_requests(&self) {
        self.inner.write().await.requests.clear();
    }

    /// Answer the next request with `status` and `body`, bypassing the handler.
    pub async fn respond_next(&self, status: u16, body: Value) {
        self.inner.write().await.canned = Some(CannedResponse {
            method: None,
            status,
            body,
        });
    }

    /// Like [`respond_next`](Self::respond_next), but only for the next
    /// request with the given HTTP method.
    pub async fn respond_next_to(&self, method: &str, status: u16, body: Value) {
        self.inner.write().await.canned = Some(CannedResponse {
            method: Some(method.to_string()),
            status,
            body,
        });
    }

    /// Accept an additional mask path on PATCH.
    pub async fn allow_patch(&self, path: &str) {
        let mut inner = self.inner.write().await;
        if !inner.patchable.iter().any(|p| p == path) {
            inner.patchable.push(path.to_string());
        }
    }

    /// Seed a template directly, as if created out of band. Returns its name.
    pub async fn insert(&self, project: &str, location: &str, mut template: Value) -> String {
        let mut inner = self.inner.write().await;
        let name = format!(
            "{}{}",
            collection_prefix(project, location),
            inner.allocate_id()
        );
        let now = timestamp();
        if let Some(obj) = template.as_object_mut() {
            obj.insert("name".to_string(), json!(name));
            obj.insert("createTime".to_string(), json!(now));
            obj.insert("updateTime".to_string(), json!(now));
            obj.insert("etag".to_string(), json!(etag()));
        }
        inner.templates.insert(name.clone(), template);
        name
    }

    /// Remove a template out of band.
    pub async fn remove(&self, name: &str) -> bool {
        self.inner.write().await.templates.remove(name).is_some()
    }

    pub async fn template(&self, name: &str) -> Option<Value> {
        self.inner.read().await.templates.get(name).cloned()
    }

    pub async fn templates(&self) -> Vec<Value> {
        self.inner.read().await.templates.values().cloned().collect()
    }
}

/// Copy the value at a dotted `path` from `source` into `target`.
///
/// A path missing from `source`, or set to null there, removes the leaf from
/// `target`. Intermediate objects are created as needed.
pub fn apply_mask_path(target: &mut Value, source: &Value, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };

    let mut value = Some(source);
    for segment in &segments {
        value = value.and_then(|v| v.get(*segment));
    }

    let mut cursor = target;
    for segment in parents {
        cursor = match cursor {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }

    if let Value::Object(map) = cursor {
        match value {
            Some(v) if !v.is_null() => {
                map.insert(leaf.to_string(), v.clone());
            }
            _ => {
                map.remove(*leaf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_mask_sets_nested_value() {
        let mut target = json!({ "displayName": "tpl" });
        let source = json!({ "encryptionSpec": { "kmsKeyName": "k1" } });

        apply_mask_path(&mut target, &source, "encryptionSpec.kmsKeyName");
        assert_eq!(
            target,
            json!({ "displayName": "tpl", "encryptionSpec": { "kmsKeyName": "k1" } })
        );
    }

    #[test]
    fn test_apply_mask_null_clears_value() {
        let mut target = json!({ "encryptionSpec": { "kmsKeyName": "k1" } });
        let source = json!({ "encryptionSpec": { "kmsKeyName": null } });

        apply_mask_path(&mut target, &source, "encryptionSpec.kmsKeyName");
        assert_eq!(target, json!({ "encryptionSpec": {} }));
    }

    #[test]
    fn test_apply_mask_ignores_unmasked_fields() {
        let mut target = json!({ "displayName": "old" });
        let source = json!({ "displayName": "new", "labels": { "a": "b" } });

        apply_mask_path(&mut target, &source, "labels");
        assert_eq!(target, json!({ "displayName": "old", "labels": { "a": "b" } }));
    }

    #[tokio::test]
    async fn test_insert_assigns_name_and_times() {
        let state = MockState::new("t");
        let name = state
            .insert("p", "l", json!({ "displayName": "seeded" }))
            .await;

        assert!(name.starts_with("projects/p/locations/l/notebookRuntimeTemplates/"));
        let stored = state.template(&name).await.unwrap();
        assert_eq!(stored["name"], json!(name));
        assert!(stored["createTime"].is_string());
        assert!(state.remove(&name).await);
        assert!(state.templates().await.is_empty());
    }
}
