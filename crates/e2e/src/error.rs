//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("WebDriver failed to start: {0}")]
    DriverStartup(String),

    #[error("WebDriver health check failed after {0} attempts")]
    DriverHealthCheck(usize),

    #[error("Browser error: {0}")]
    Driver(String),

    #[error("Fixture seeding failed for '{index}': HTTP {status} - {body}")]
    Seed {
        index: String,
        status: u16,
        body: String,
    },

    #[error("Dashboards API {path} returned HTTP {status}: {body}")]
    Api {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Invalid fixture {path}: {reason}")]
    Fixture { path: String, reason: String },

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timed out after {elapsed_ms} ms waiting for: {condition}")]
    Timeout { condition: String, elapsed_ms: u64 },

    #[error("Uncaught exception in page: {0}")]
    UncaughtException(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),
}

impl E2eError {
    /// Whether re-running the whole operation may succeed (async layout shifts).
    pub fn is_retryable(&self) -> bool {
        matches!(self, E2eError::Timeout { .. } | E2eError::ElementNotFound(_))
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
