//! Fixture loader - seeds the search backend before a spec runs
//!
//! Mapping files are either a bare `{ "settings", "mappings" }` document or a
//! stream of archive records `{"type": "index", "value": {...}}`. Data files
//! are a stream of JSON values (NDJSON or blank-line separated), each an
//! archive record `{"type": "doc", "value": {"index", "id", "source"}}` or a
//! raw document source.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{Credentials, Feature, RunConfig};
use crate::error::{E2eError, E2eResult};

/// Upper bound of documents per `_bulk` request
pub const BULK_CHUNK_SIZE: usize = 1600;

/// Index a spec needs before it runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureDescriptor {
    /// Target index name
    pub index: String,

    /// Mapping file, relative to the fixtures directory
    #[serde(default)]
    pub mapping: Option<PathBuf>,

    /// Data file, relative to the fixtures directory
    #[serde(default)]
    pub data: Option<PathBuf>,

    /// Skip seeding when the index already holds documents
    #[serde(default)]
    pub if_needed: bool,

    /// Delete the index once the spec finished
    #[serde(default = "default_delete_after")]
    pub delete_after: bool,
}

fn default_delete_after() -> bool {
    true
}

impl FixtureDescriptor {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            mapping: None,
            data: None,
            if_needed: false,
            delete_after: true,
        }
    }

    pub fn mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.mapping = Some(path.into());
        self
    }

    pub fn data(mut self, path: impl Into<PathBuf>) -> Self {
        self.data = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub index: String,
    pub documents: usize,
    /// Seeding was skipped because the index already held documents
    pub skipped: bool,
}

/// Index settings as sent on creation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexMapping {
    pub settings: Option<Value>,
    pub mappings: Option<Value>,
    pub aliases: Option<Value>,
}

/// One document bound for `_bulk`
#[derive(Debug, Clone, PartialEq)]
pub struct BulkDocument {
    pub index: String,
    pub id: Option<String>,
    pub source: Value,
}

/// HTTP client for the backend seeding interface
pub struct FixtureLoader {
    client: reqwest::Client,
    opensearch_url: String,
    base_url: String,
    credentials: Option<Credentials>,
    via_proxy: bool,
    root: PathBuf,
}

impl FixtureLoader {
    /// Loader resolving fixture paths against `root`
    pub fn new(config: &RunConfig, root: impl Into<PathBuf>) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .build()?;

        Ok(Self {
            client,
            opensearch_url: config.opensearch_url.trim_end_matches('/').to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config
                .enabled(Feature::SecurityEnabled)
                .then(|| config.credentials.clone()),
            via_proxy: config.enabled(Feature::EndpointWithProxy),
            root: root.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the index and bulk insert its documents; both files are parsed
    /// before the first request
    pub async fn load(&self, fixture: &FixtureDescriptor) -> E2eResult<SeedReport> {
        info!("Seeding index {}", fixture.index);

        let mapping = match &fixture.mapping {
            Some(path) => {
                let content = self.read(path).await?;
                Some(
                    parse_mapping(&content, &fixture.index)
                        .map_err(|reason| self.fixture_error(path, reason))?,
                )
            }
            None => None,
        };
        let docs = match &fixture.data {
            Some(path) => {
                let content = self.read(path).await?;
                parse_documents(&content, &fixture.index)
                    .map_err(|reason| self.fixture_error(path, reason))?
            }
            None => Vec::new(),
        };

        if let Some(mapping) = &mapping {
            self.create_index(&fixture.index, mapping).await?;
        }

        let mut documents = 0;
        for chunk in docs.chunks(BULK_CHUNK_SIZE) {
            self.bulk(&fixture.index, chunk).await?;
            documents += chunk.len();
        }

        info!("Seeded {} document(s) into {}", documents, fixture.index);
        Ok(SeedReport {
            index: fixture.index.clone(),
            documents,
            skipped: false,
        })
    }

    /// Seed only when the index is missing or empty
    pub async fn import_if_needed(&self, fixture: &FixtureDescriptor) -> E2eResult<SeedReport> {
        match self.existing_count(&fixture.index).await? {
            Some(count) if count > 0 => {
                info!("Index {} already holds {} document(s), skipping", fixture.index, count);
                Ok(SeedReport {
                    index: fixture.index.clone(),
                    documents: 0,
                    skipped: true,
                })
            }
            _ => self.load(fixture).await,
        }
    }

    /// Seed honoring the descriptor's `if_needed` flag
    pub async fn seed(&self, fixture: &FixtureDescriptor) -> E2eResult<SeedReport> {
        if fixture.if_needed {
            self.import_if_needed(fixture).await
        } else {
            self.load(fixture).await
        }
    }

    /// Delete an index; a missing index counts as deleted
    pub async fn delete_index(&self, index: &str) -> E2eResult<()> {
        let resp = self.request(Method::DELETE, index).send().await?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!("Deleted index {} ({})", index, status);
            return Ok(());
        }
        Err(seed_error(index, resp).await)
    }

    /// Document count of an existing index
    pub async fn count(&self, index: &str) -> E2eResult<u64> {
        match self.existing_count(index).await? {
            Some(count) => Ok(count),
            None => Err(E2eError::Seed {
                index: index.to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
                body: "index does not exist".to_string(),
            }),
        }
    }

    async fn existing_count(&self, index: &str) -> E2eResult<Option<u64>> {
        let resp = self
            .request(Method::GET, &format!("{index}/_count"))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(seed_error(index, resp).await);
        }
        let body: Value = resp.json().await?;
        Ok(Some(body["count"].as_u64().unwrap_or(0)))
    }

    async fn create_index(&self, index: &str, mapping: &IndexMapping) -> E2eResult<()> {
        let mut body = json!({});
        if let Some(settings) = &mapping.settings {
            body["settings"] = settings.clone();
        }
        if let Some(mappings) = &mapping.mappings {
            body["mappings"] = mappings.clone();
        }
        if let Some(aliases) = &mapping.aliases {
            body["aliases"] = aliases.clone();
        }

        let resp = self.request(Method::PUT, index).json(&body).send().await?;
        if resp.status().is_success() {
            debug!("Created index {}", index);
            return Ok(());
        }

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if status != StatusCode::BAD_REQUEST || !text.contains("resource_already_exists_exception") {
            return Err(E2eError::Seed {
                index: index.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let Some(mappings) = &mapping.mappings else {
            return Ok(());
        };
        debug!("Index {} exists, updating its mapping", index);
        let resp = self
            .request(Method::PUT, &format!("{index}/_mapping"))
            .json(mappings)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(seed_error(index, resp).await);
        }
        Ok(())
    }

    async fn bulk(&self, index: &str, docs: &[BulkDocument]) -> E2eResult<()> {
        debug!("Bulk indexing {} document(s) into {}", docs.len(), index);
        let resp = self
            .request(Method::POST, "_bulk?refresh=wait_for")
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(bulk_body(docs)?)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(seed_error(index, resp).await);
        }

        let body: Value = resp.json().await?;
        if body["errors"].as_bool().unwrap_or(false) {
            return Err(E2eError::Seed {
                index: index.to_string(),
                status: 200,
                body: first_bulk_error(&body),
            });
        }
        Ok(())
    }

    /// Backend request, routed through the dashboards console proxy when configured
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = if self.via_proxy {
            self.client
                .post(format!("{}/api/console/proxy", self.base_url))
                .query(&[("path", path), ("method", method.as_str())])
                .header("osd-xsrf", "true")
        } else {
            self.client
                .request(method, format!("{}/{}", self.opensearch_url, path))
        };

        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }

    async fn read(&self, path: &Path) -> E2eResult<String> {
        let full = self.root.join(path);
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| self.fixture_error(path, e.to_string()))
    }

    fn fixture_error(&self, path: &Path, reason: String) -> E2eError {
        E2eError::Fixture {
            path: self.root.join(path).display().to_string(),
            reason,
        }
    }
}

async fn seed_error(index: &str, resp: reqwest::Response) -> E2eError {
    let status = resp.status().as_u16();
    E2eError::Seed {
        index: index.to_string(),
        status,
        body: resp.text().await.unwrap_or_default(),
    }
}

fn json_stream(content: &str) -> Result<Vec<Value>, String> {
    serde_json::Deserializer::from_str(content)
        .into_iter::<Value>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())
}

/// Settings for `index` from a bare mapping document or an archive stream.
///
/// Records naming another index are skipped; a record without a name
/// applies to `index`.
pub fn parse_mapping(content: &str, index: &str) -> Result<IndexMapping, String> {
    let values = json_stream(content)?;
    if values.is_empty() {
        return Err("mapping file is empty".to_string());
    }

    for value in &values {
        let body = match archive_kind(value) {
            Some("index") => &value["value"],
            Some(other) => return Err(format!("unexpected archive record type '{other}'")),
            None => value,
        };
        if body["index"].as_str().is_some_and(|name| name != index) {
            continue;
        }
        return Ok(IndexMapping {
            settings: non_null(&body["settings"]),
            mappings: non_null(&body["mappings"]),
            aliases: non_null(&body["aliases"]),
        });
    }

    Err(format!("no mapping for index '{index}'"))
}

/// Documents of a data file, all bound for `index`.
///
/// Archive records naming another index are rejected so a fixture only ever
/// writes to the index it creates and cleans up.
pub fn parse_documents(content: &str, index: &str) -> Result<Vec<BulkDocument>, String> {
    let mut docs = Vec::new();
    for value in json_stream(content)? {
        let doc = match archive_kind(&value) {
            Some("doc") => {
                let record = &value["value"];
                if let Some(other) = record["index"].as_str().filter(|name| *name != index) {
                    return Err(format!(
                        "archive doc record targets index '{other}', expected '{index}'"
                    ));
                }
                BulkDocument {
                    index: index.to_string(),
                    id: record["id"].as_str().map(str::to_string),
                    source: non_null(&record["source"])
                        .ok_or_else(|| "archive doc record without source".to_string())?,
                }
            }
            Some(other) => return Err(format!("unexpected archive record type '{other}'")),
            None => BulkDocument {
                index: index.to_string(),
                id: None,
                source: value.clone(),
            },
        };
        docs.push(doc);
    }
    Ok(docs)
}

/// NDJSON body of a `_bulk` request
pub fn bulk_body(docs: &[BulkDocument]) -> E2eResult<String> {
    let mut body = String::new();
    for doc in docs {
        let action = match &doc.id {
            Some(id) => json!({ "index": { "_index": doc.index, "_id": id } }),
            None => json!({ "index": { "_index": doc.index } }),
        };
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&doc.source)?);
        body.push('\n');
    }
    Ok(body)
}

fn first_bulk_error(body: &Value) -> String {
    body["items"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|item| item.as_object()?.values().next())
        .find_map(|result| {
            let error = &result["error"];
            (!error.is_null()).then(|| error.to_string())
        })
        .unwrap_or_else(|| "bulk response reported errors".to_string())
}

/// Record type of an archive entry; plain documents have none
fn archive_kind(value: &Value) -> Option<&str> {
    value.get("value")?;
    value["type"].as_str()
}

fn non_null(value: &Value) -> Option<Value> {
    (!value.is_null()).then(|| value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_mapping_document() {
        let content = r#"{"settings": {"number_of_shards": 1}, "mappings": {"properties": {"title": {"type": "text"}}}}"#;
        let mapping = parse_mapping(content, "logstash-2015.09.22").unwrap();
        assert_eq!(mapping.settings.unwrap()["number_of_shards"], 1);
        assert_eq!(mapping.mappings.unwrap()["properties"]["title"]["type"], "text");
        assert!(mapping.aliases.is_none());
    }

    #[test]
    fn test_archive_mapping_picks_matching_index() {
        let content = r#"
{"type": "index", "value": {"index": "other", "mappings": {"properties": {"a": {"type": "long"}}}}}

{"type": "index", "value": {"index": "logstash-2015.09.22", "aliases": {"logstash": {}}, "mappings": {"properties": {"b": {"type": "keyword"}}}}}
"#;
        let mapping = parse_mapping(content, "logstash-2015.09.22").unwrap();
        assert_eq!(mapping.mappings.unwrap()["properties"]["b"]["type"], "keyword");
        assert!(mapping.aliases.is_some());
    }

    #[test]
    fn test_empty_mapping_is_an_error() {
        assert!(parse_mapping("  \n", "x").is_err());
    }

    #[test]
    fn test_archive_without_record_for_index_is_an_error() {
        let content = r#"{"type": "index", "value": {"index": "other", "mappings": {"properties": {"a": {"type": "long"}}}}}"#;
        let err = parse_mapping(content, "logstash-2015.09.22").unwrap_err();
        assert!(err.contains("logstash-2015.09.22"));
    }

    #[test]
    fn test_documents_from_archive_and_raw_sources() {
        let content = r#"{"type": "doc", "value": {"index": "logstash-a", "id": "1", "source": {"bytes": 10}}}
{"type": "doc", "value": {"id": "2", "source": {"bytes": 15}}}
{"bytes": 20, "type": "apache"}
{"bytes": 30}"#;
        let docs = parse_documents(content, "logstash-a").unwrap();
        assert_eq!(docs.len(), 4);
        assert!(docs.iter().all(|d| d.index == "logstash-a"));
        assert_eq!(docs[0].id.as_deref(), Some("1"));
        assert_eq!(docs[1].id.as_deref(), Some("2"));
        assert_eq!(docs[3].source["bytes"], 30);
    }

    #[test]
    fn test_doc_record_for_another_index_is_rejected() {
        let content = r#"{"type": "doc", "value": {"index": "logstash-2015.09.20", "id": "1", "source": {"bytes": 10}}}"#;
        let err = parse_documents(content, "logstash-2015.09.22").unwrap_err();
        assert!(err.contains("logstash-2015.09.20"));
    }

    #[test]
    fn test_doc_record_without_source_is_rejected() {
        let content = r#"{"type": "doc", "value": {"index": "x", "id": "1"}}"#;
        assert!(parse_documents(content, "x").is_err());
    }

    #[test]
    fn test_bulk_body_is_ndjson() {
        let docs = vec![
            BulkDocument {
                index: "books".to_string(),
                id: Some("7".to_string()),
                source: json!({"title": "Newsletter"}),
            },
            BulkDocument {
                index: "books".to_string(),
                id: None,
                source: json!({"title": "Almanac"}),
            },
        ];
        let body = bulk_body(&docs).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));
        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_id"], "7");
        let action: Value = serde_json::from_str(lines[2]).unwrap();
        assert!(action["index"].get("_id").is_none());
    }

    #[test]
    fn test_first_bulk_error_reason() {
        let body = json!({
            "errors": true,
            "items": [
                {"index": {"status": 201}},
                {"index": {"status": 400, "error": {"type": "mapper_parsing_exception"}}}
            ]
        });
        assert!(first_bulk_error(&body).contains("mapper_parsing_exception"));
    }

    #[test]
    fn test_descriptor_defaults_from_yaml() {
        let descriptor: FixtureDescriptor =
            serde_yaml::from_str("index: logstash-2015.09.22\ndata: logstash/data.json\n").unwrap();
        assert!(descriptor.delete_after);
        assert!(!descriptor.if_needed);
        assert!(descriptor.mapping.is_none());
    }
}
