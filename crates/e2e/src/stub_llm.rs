//! Stub LLM endpoint for assistant specs
//!
//! Every request body is matched by substring against two prompt markers and
//! answered with the matching canned JSON after an artificial delay. Any
//! other body gets an empty `200`.

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};

/// Start of the chat agent's system prompt
pub const CHAT_MARKER: &str = "Assistant is a large language model";

/// Start of the follow-up suggestions prompt
pub const SUGGESTIONS_MARKER: &str = "You are an AI that only speaks JSON";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StubLlmConfig {
    pub chat_marker: String,
    pub chat_response: PathBuf,
    pub suggestions_marker: String,
    pub suggestions_response: PathBuf,
    /// Delay before every matched response
    pub delay_ms: u64,
}

impl Default for StubLlmConfig {
    fn default() -> Self {
        Self {
            chat_marker: CHAT_MARKER.to_string(),
            chat_response: PathBuf::from("fixtures/llm/chat_response.json"),
            suggestions_marker: SUGGESTIONS_MARKER.to_string(),
            suggestions_response: PathBuf::from("fixtures/llm/suggestions_response.json"),
            delay_ms: 1000,
        }
    }
}

impl StubLlmConfig {
    /// Point both responses at files under `dir`
    pub fn with_fixture_dir(mut self, dir: &Path) -> Self {
        self.chat_response = dir.join("chat_response.json");
        self.suggestions_response = dir.join("suggestions_response.json");
        self
    }
}

struct StubState {
    canned: Vec<(String, String)>,
    delay: Duration,
}

impl StubState {
    async fn load(config: &StubLlmConfig) -> E2eResult<Self> {
        let mut canned = Vec::new();
        for (marker, path) in [
            (&config.chat_marker, &config.chat_response),
            (&config.suggestions_marker, &config.suggestions_response),
        ] {
            let body = tokio::fs::read_to_string(path).await.map_err(|e| E2eError::Fixture {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            serde_json::from_str::<serde_json::Value>(&body)?;
            canned.push((marker.clone(), body));
        }
        Ok(Self {
            canned,
            delay: Duration::from_millis(config.delay_ms),
        })
    }

    fn response_for(&self, body: &str) -> Option<&str> {
        self.canned
            .iter()
            .find(|(marker, _)| body.contains(marker.as_str()))
            .map(|(_, response)| response.as_str())
    }
}

/// Running stub server
pub struct StubLlmHandle {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl StubLlmHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

fn router(state: Arc<StubState>) -> Router {
    Router::new()
        .fallback(completion_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` (port 0 for an ephemeral port) and serve on a background task
pub async fn spawn(config: &StubLlmConfig, addr: SocketAddr) -> E2eResult<StubLlmHandle> {
    let state = Arc::new(StubState::load(config).await?);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    info!("Stub LLM listening on {}", addr);
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(state)).await {
            tracing::error!("Stub LLM server stopped: {}", e);
        }
    });

    Ok(StubLlmHandle { addr, task })
}

/// Serve in the foreground until the process is stopped
pub async fn serve(config: &StubLlmConfig, addr: SocketAddr) -> E2eResult<()> {
    let state = Arc::new(StubState::load(config).await?);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Stub LLM listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn completion_handler(State(state): State<Arc<StubState>>, body: String) -> Response {
    match state.response_for(&body) {
        Some(canned) => {
            debug!("Stub LLM matched a prompt marker, replying after {:?}", state.delay);
            tokio::time::sleep(state.delay).await;
            (StatusCode::OK, [(CONTENT_TYPE, "application/json")], canned.to_string()).into_response()
        }
        None => {
            debug!("Stub LLM received an unmatched body ({} bytes)", body.len());
            StatusCode::OK.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> StubState {
        StubState {
            canned: vec![
                ("chat-marker".to_string(), r#"{"chat": true}"#.to_string()),
                ("suggest-marker".to_string(), r#"{"suggest": true}"#.to_string()),
            ],
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_response_for_matches_substring() {
        let state = state();
        assert_eq!(
            state.response_for(r#"{"prompt": "... chat-marker ..."}"#),
            Some(r#"{"chat": true}"#)
        );
        assert_eq!(
            state.response_for("xx suggest-marker"),
            Some(r#"{"suggest": true}"#)
        );
        assert_eq!(state.response_for("nothing to see"), None);
    }

    #[test]
    fn test_fixture_dir_rebases_both_responses() {
        let config = StubLlmConfig::default().with_fixture_dir(Path::new("/tmp/llm"));
        assert_eq!(config.chat_response, PathBuf::from("/tmp/llm/chat_response.json"));
        assert_eq!(
            config.suggestions_response,
            PathBuf::from("/tmp/llm/suggestions_response.json")
        );
    }
}
