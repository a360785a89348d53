//! REST client for the notebook runtime template collection.
//!
//! The remote exposes no single-resource GET. Every read lists the whole
//! collection and scans it for the requested name (see [`find_by_name`]), so
//! a read costs O(n) in the number of templates in the project/location.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::credentials::{AccessToken, CredentialProvider};
use crate::error::{ClientError, Result};
use crate::model::{FieldMask, ListNotebookRuntimeTemplatesResponse, NotebookRuntimeTemplate};

/// Location used when none is configured.
pub const DEFAULT_LOCATION: &str = "australia-southeast1";

/// API version segment of the default endpoint.
pub const API_VERSION: &str = "v1beta1";

/// The lifecycle calls the reconciler needs from the remote API.
#[async_trait]
pub trait TemplateApi: Send + Sync {
    /// Every template in the collection. No server-side filtering.
    async fn list(&self) -> Result<Vec<NotebookRuntimeTemplate>>;

    /// List, then linear scan by full resource name.
    async fn get(&self, name: &str) -> Result<NotebookRuntimeTemplate> {
        let templates = self.list().await?;
        find_by_name(templates, name)
    }

    /// Creates the template and returns it as read back from the list.
    async fn create(&self, template: &NotebookRuntimeTemplate) -> Result<NotebookRuntimeTemplate>;

    /// Masked partial update. `template` must carry `name`.
    async fn update(&self, template: &NotebookRuntimeTemplate, mask: &FieldMask) -> Result<()>;

    /// Deletes by full resource name. Succeeds if it is already gone.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Linear scan of a listed collection.
pub fn find_by_name(
    templates: Vec<NotebookRuntimeTemplate>,
    name: &str,
) -> Result<NotebookRuntimeTemplate> {
    templates
        .into_iter()
        .find(|t| t.name.as_deref() == Some(name))
        .ok_or_else(|| ClientError::NotFound(name.to_string()))
}

/// Where the client points.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub project: String,
    pub location: String,
    /// Base URL including the API version. Defaults to the regional endpoint.
    pub endpoint: Option<String>,
}

impl ClientConfig {
    pub fn new(project: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}-aiplatform.googleapis.com/{}",
                self.location, API_VERSION
            ),
        }
    }

    pub fn collection_url(&self) -> String {
        format!(
            "{}/projects/{}/locations/{}/notebookRuntimeTemplates",
            self.endpoint(),
            self.project,
            self.location
        )
    }
}

/// Authenticated client. Holds only immutable state, so one handle per
/// managed instance can be used from independent tasks.
pub struct NotebookClient {
    http: reqwest::Client,
    endpoint: String,
    collection_url: String,
    token: AccessToken,
}

impl std::fmt::Debug for NotebookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookClient")
            .field("collection_url", &self.collection_url)
            .field("token", &self.token)
            .finish()
    }
}

impl NotebookClient {
    /// Builds the client and fetches the bearer token once.
    ///
    /// The token is never refreshed for the lifetime of the client.
    pub async fn new(config: ClientConfig, credentials: &dyn CredentialProvider) -> Result<Self> {
        let token = credentials.access_token().await?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("nbrt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Transport)?;

        let client = Self {
            http,
            endpoint: config.endpoint(),
            collection_url: config.collection_url(),
            token,
        };

        info!(
            collection = %client.collection_url,
            credentials = credentials.name(),
            "Notebook client configured"
        );
        Ok(client)
    }

    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    fn item_url(&self, name: &str) -> String {
        format!("{}/{}", self.endpoint, name.trim_start_matches('/'))
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        query: Option<(&str, String)>,
        body: Option<&B>,
    ) -> Result<String> {
        debug!(method = %method, url = %url, "Sending request");

        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(self.token.secret())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some((key, value)) = query {
            request = request.query(&[(key, value)]);
        }
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = request.send().await.map_err(ClientError::Transport)?;
        let status = response.status();
        let text = response.text().await.map_err(ClientError::Transport)?;

        debug!(method = %method, url = %url, status = status.as_u16(), "Received response");

        if !status.is_success() {
            return Err(ClientError::Response {
                code: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

/// Pulls the template name out of `{ "response": { "name": ... } }`.
fn created_name(body: &str) -> Result<String> {
    let envelope: Value = serde_json::from_str(body)?;
    let response = envelope
        .get("response")
        .ok_or_else(|| ClientError::MalformedOperation("missing response".to_string()))?;
    response
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::MalformedOperation("missing response.name".to_string()))
}

#[async_trait]
impl TemplateApi for NotebookClient {
    async fn list(&self) -> Result<Vec<NotebookRuntimeTemplate>> {
        let body = self
            .send::<()>(Method::GET, &self.collection_url, None, None)
            .await?;
        let list: ListNotebookRuntimeTemplatesResponse = serde_json::from_str(&body)?;
        debug!(count = list.notebook_runtime_templates.len(), "Listed templates");
        Ok(list.notebook_runtime_templates)
    }

    async fn create(&self, template: &NotebookRuntimeTemplate) -> Result<NotebookRuntimeTemplate> {
        let body = self
            .send(Method::POST, &self.collection_url, None, Some(template))
            .await?;
        let name = created_name(&body)?;
        info!(name = %name, "Template created, reading back");
        self.get(&name).await
    }

    async fn update(&self, template: &NotebookRuntimeTemplate, mask: &FieldMask) -> Result<()> {
        let name = template
            .name
            .as_deref()
            .ok_or(ClientError::MissingName)?;
        let url = self.item_url(name);
        self.send(
            Method::PATCH,
            &url,
            Some(("updateMask", mask.to_string())),
            Some(template),
        )
        .await?;
        info!(name = %name, mask = %mask, "Template patched");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let url = self.item_url(name);
        match self.send::<()>(Method::DELETE, &url, None, None).await {
            Ok(_) => {
                info!(name = %name, "Template deleted");
                Ok(())
            }
            Err(ClientError::Response { code, .. }) if code == StatusCode::NOT_FOUND.as_u16() => {
                warn!(name = %name, "Template already gone, treating delete as done");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
