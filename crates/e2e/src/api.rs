//! Dashboards REST client for setup steps that need no UI

use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{Credentials, Feature, RunConfig};
use crate::error::{E2eError, E2eResult};

pub const SETTINGS_PATH: &str = "/api/opensearch-dashboards/settings";

pub struct DashboardsApi {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl DashboardsApi {
    pub fn new(config: &RunConfig) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config
                .enabled(Feature::SecurityEnabled)
                .then(|| config.credentials.clone()),
        })
    }

    /// Change one advanced setting (`uiSettings`)
    pub async fn set_advanced_setting(&self, key: &str, value: Value) -> E2eResult<()> {
        debug!("Setting advanced setting {} = {}", key, value);
        let body = json!({ "changes": { key: value } });
        let resp = self.request(Method::POST, SETTINGS_PATH).json(&body).send().await?;
        check(SETTINGS_PATH, resp).await.map(|_| ())
    }

    /// Delete a saved object; a missing object counts as deleted
    pub async fn delete_saved_object(&self, kind: &str, id: &str) -> E2eResult<()> {
        let path = format!("/api/saved_objects/{kind}/{id}");
        let resp = self.request(Method::DELETE, &path).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(&path, resp).await.map(|_| ())
    }

    /// Create (or overwrite) an index pattern with a fixed id
    pub async fn create_index_pattern(
        &self,
        id: &str,
        title: &str,
        time_field: Option<&str>,
    ) -> E2eResult<Value> {
        let path = format!("/api/saved_objects/index-pattern/{id}?overwrite=true");
        let mut attributes = json!({ "title": title });
        if let Some(field) = time_field {
            attributes["timeFieldName"] = json!(field);
        }
        let resp = self
            .request(Method::POST, &path)
            .json(&json!({ "attributes": attributes }))
            .send()
            .await?;
        check(&path, resp).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("osd-xsrf", "true");
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }
}

async fn check(path: &str, resp: reqwest::Response) -> E2eResult<Value> {
    let status = resp.status();
    if !status.is_success() {
        return Err(E2eError::Api {
            path: path.to_string(),
            status: status.as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }
    let text = resp.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}
