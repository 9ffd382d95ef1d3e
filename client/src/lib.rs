#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use anyhow::Result;
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use shared_types::{
    ClientContext, ConfigItem, ConfigKey, CreateConfigRequest, ListFilter, ResolvedConfig,
    UpdateConfigRequest, VersionRecord,
};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Client for the config center HTTP service
pub struct ConfigClient {
    client: ReqwestClient,
    base_url: String,
}

impl ConfigClient {
    /// Create a new client instance
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn config_url(&self, id: Uuid) -> String {
        format!("{}/configs/{}", self.base_url, id)
    }

    /// Create a configuration item; fails if the key is already taken
    pub async fn create_config(&self, request: &CreateConfigRequest) -> Result<ConfigItem> {
        let url = format!("{}/configs", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;

        if response.status() == StatusCode::CONFLICT {
            anyhow::bail!("Configuration already exists: {}", request.config_key());
        }
        let response = ensure_success(response).await?;

        Ok(response.json().await?)
    }

    pub async fn get_config(&self, id: Uuid) -> Result<ConfigItem> {
        let response = self.client.get(self.config_url(id)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            anyhow::bail!("Configuration not found: {}", id);
        }
        let response = ensure_success(response).await?;

        Ok(response.json().await?)
    }

    pub async fn update_config(&self, id: Uuid, request: &UpdateConfigRequest) -> Result<ConfigItem> {
        let response = self
            .client
            .put(self.config_url(id))
            .json(request)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            anyhow::bail!("Configuration not found: {}", id);
        }
        let response = ensure_success(response).await?;

        Ok(response.json().await?)
    }

    pub async fn delete_config(&self, id: Uuid) -> Result<()> {
        let response = self.client.delete(self.config_url(id)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            anyhow::bail!("Configuration not found: {}", id);
        }
        ensure_success(response).await?;

        Ok(())
    }

    /// List configurations, newest first. `page` starts at 1.
    pub async fn list_configs(
        &self,
        filter: &ListFilter,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<Vec<ConfigItem>> {
        let url = format!("{}/configs", self.base_url);

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(app_id) = &filter.app_id {
            query.push(("app_id", app_id.clone()));
        }
        if let Some(namespace) = &filter.namespace {
            query.push(("namespace", namespace.clone()));
        }
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        if let Some(size) = size {
            query.push(("size", size.to_string()));
        }

        let response = self.client.get(&url).query(&query).send().await?;
        let response = ensure_success(response).await?;

        Ok(response.json().await?)
    }

    /// Version history of an item, newest first
    pub async fn list_versions(&self, id: Uuid) -> Result<Vec<VersionRecord>> {
        let url = format!("{}/versions", self.config_url(id));
        let response = self.client.get(&url).send().await?;
        let response = ensure_success(response).await?;

        Ok(response.json().await?)
    }

    /// Fetch the value this client should run with
    pub async fn pull(
        &self,
        key: &ConfigKey,
        context: Option<&ClientContext>,
    ) -> Result<ResolvedConfig> {
        let url = format!("{}/configs/pull", self.base_url);

        let mut query = vec![
            ("app_id", key.app_id.clone()),
            ("namespace", key.namespace.clone()),
            ("key", key.key.clone()),
        ];
        if let Some(context) = context {
            if let Some(client_id) = &context.client_id {
                query.push(("client_id", client_id.clone()));
            }
            if !context.tags.is_empty() {
                let tags: Vec<&str> = context.tags.iter().map(String::as_str).collect();
                query.push(("client_tags", tags.join(",")));
            }
        }

        let response = self.client.get(&url).query(&query).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            anyhow::bail!("Configuration not found: {}", key);
        }
        let response = ensure_success(response).await?;

        let resolved: ResolvedConfig = response.json().await?;
        debug!(%key, version = resolved.item.version, variant = ?resolved.variant, "Pulled configuration");
        Ok(resolved)
    }

    /// Check if the service is healthy
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        let response = self.client.get(&url).send().await?;

        Ok(response.status() == StatusCode::OK)
    }
}

/// Turns an error status into an error carrying the server's message
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let details = body["details"]
        .as_str()
        .or_else(|| body["error"].as_str())
        .unwrap_or("no details");
    anyhow::bail!("Request failed with {}: {}", status, details)
}
