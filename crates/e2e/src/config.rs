//! Runner configuration
//!
//! Read once at process start from an optional TOML file, then overridden by
//! `OSD_E2E_*` environment variables. The runner receives it as an
//! `Arc<RunConfig>` and never mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "OSD_E2E_";

/// Complete configuration for one test run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Dashboards base URL
    pub base_url: String,

    /// Search backend URL used for fixture seeding
    pub opensearch_url: String,

    /// Credentials used for login and backend requests when security is on
    pub credentials: Credentials,

    /// Timeouts and polling cadence
    pub timeouts: Timeouts,

    /// Feature flags gating specs
    pub features: FeatureFlags,

    /// Browser session settings
    pub browser: BrowserConfig,

    /// Whole-operation retries for the super date picker
    pub date_picker_retries: u32,

    /// Upper bound of confirmation dialogs dismissed during a saved-object import
    pub max_import_confirmations: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5601".to_string(),
            opensearch_url: "http://localhost:9200".to_string(),
            credentials: Credentials::default(),
            timeouts: Timeouts::default(),
            features: FeatureFlags::default(),
            browser: BrowserConfig::default(),
            date_picker_retries: 3,
            max_import_confirmations: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Default bound for element lookups and wait commands
    pub default_command_ms: u64,

    /// Bound for page navigation
    pub page_load_ms: u64,

    /// Bound for backend HTTP requests
    pub request_ms: u64,

    /// Sleep between two probes of a polled condition
    pub poll_interval_ms: u64,

    /// Fixed pause before `wait_for_loader` starts polling
    pub loader_buffer_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default_command_ms: 60_000,
            page_load_ms: 120_000,
            request_ms: 60_000,
            poll_interval_ms: 100,
            loader_buffer_ms: 0,
        }
    }
}

impl Timeouts {
    pub fn default_command(&self) -> Duration {
        Duration::from_millis(self.default_command_ms)
    }

    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn loader_buffer(&self) -> Duration {
        Duration::from_millis(self.loader_buffer_ms)
    }
}

/// Boolean switches describing the deployment under test
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub security_enabled: bool,
    pub aggregation_view: bool,
    pub vis_builder_enabled: bool,
    pub datasource_management_enabled: bool,
    pub ml_commons_enabled: bool,
    pub endpoint_with_proxy: bool,
    pub managed_service: bool,
    /// Suppress command records for every command, not only quiet ones
    pub quiet_commands: bool,
}

/// Names a single feature flag; used by specs in `requires` / `skip_when`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    SecurityEnabled,
    AggregationView,
    VisBuilderEnabled,
    DatasourceManagementEnabled,
    MlCommonsEnabled,
    EndpointWithProxy,
    ManagedService,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::SecurityEnabled,
        Feature::AggregationView,
        Feature::VisBuilderEnabled,
        Feature::DatasourceManagementEnabled,
        Feature::MlCommonsEnabled,
        Feature::EndpointWithProxy,
        Feature::ManagedService,
    ];

    /// Environment variable (without prefix) that toggles this feature
    pub fn env_key(&self) -> &'static str {
        match self {
            Feature::SecurityEnabled => "SECURITY_ENABLED",
            Feature::AggregationView => "AGGREGATION_VIEW",
            Feature::VisBuilderEnabled => "VISBUILDER_ENABLED",
            Feature::DatasourceManagementEnabled => "DATASOURCE_MANAGEMENT_ENABLED",
            Feature::MlCommonsEnabled => "ML_COMMONS_DASHBOARDS_ENABLED",
            Feature::EndpointWithProxy => "ENDPOINT_WITH_PROXY",
            Feature::ManagedService => "MANAGED_SERVICE_ENDPOINT",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Firefox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver / geckodriver)
    pub webdriver_url: String,
    pub kind: BrowserKind,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            kind: BrowserKind::Chrome,
            headless: true,
            viewport_width: 2000,
            viewport_height: 1320,
        }
    }
}

impl RunConfig {
    /// Load configuration from an optional TOML file, then apply process environment overrides
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_toml(&std::fs::read_to_string(path)?)?,
            Some(path) => {
                return Err(E2eError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )))
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> E2eResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `OSD_E2E_*` overrides. `lookup` receives the full variable name.
    pub fn apply_env<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));

        if let Some(v) = get("BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = get("OPENSEARCH_URL") {
            self.opensearch_url = v;
        }
        if let Some(v) = get("USERNAME") {
            self.credentials.username = v;
        }
        if let Some(v) = get("PASSWORD") {
            self.credentials.password = v;
        }
        if let Some(v) = get("WEBDRIVER_URL") {
            self.browser.webdriver_url = v;
        }
        if let Some(v) = get("BROWSER") {
            self.browser.kind = match v.to_ascii_lowercase().as_str() {
                "chrome" | "chromium" => BrowserKind::Chrome,
                "firefox" => BrowserKind::Firefox,
                other => return Err(E2eError::Config(format!("unknown browser '{other}'"))),
            };
        }
        if let Some(v) = get("HEADLESS") {
            self.browser.headless = parse_flag("HEADLESS", &v)?;
        }
        if let Some(v) = get("DEFAULT_COMMAND_TIMEOUT_MS") {
            self.timeouts.default_command_ms = parse_number("DEFAULT_COMMAND_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("PAGE_LOAD_TIMEOUT_MS") {
            self.timeouts.page_load_ms = parse_number("PAGE_LOAD_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("REQUEST_TIMEOUT_MS") {
            self.timeouts.request_ms = parse_number("REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("WAIT_FOR_LOADER_BUFFER_MS") {
            self.timeouts.loader_buffer_ms = parse_number("WAIT_FOR_LOADER_BUFFER_MS", &v)?;
        }
        if let Some(v) = get("QUIET_COMMANDS") {
            self.features.quiet_commands = parse_flag("QUIET_COMMANDS", &v)?;
        }

        for feature in Feature::ALL {
            if let Some(v) = get(feature.env_key()) {
                let on = parse_flag(feature.env_key(), &v)?;
                *self.features.flag_mut(feature) = on;
            }
        }

        Ok(())
    }

    /// Whether a feature flag is switched on
    pub fn enabled(&self, feature: Feature) -> bool {
        self.features.flag(feature)
    }

    /// Absolute URL for a dashboards path
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl FeatureFlags {
    pub fn flag(&self, feature: Feature) -> bool {
        match feature {
            Feature::SecurityEnabled => self.security_enabled,
            Feature::AggregationView => self.aggregation_view,
            Feature::VisBuilderEnabled => self.vis_builder_enabled,
            Feature::DatasourceManagementEnabled => self.datasource_management_enabled,
            Feature::MlCommonsEnabled => self.ml_commons_enabled,
            Feature::EndpointWithProxy => self.endpoint_with_proxy,
            Feature::ManagedService => self.managed_service,
        }
    }

    fn flag_mut(&mut self, feature: Feature) -> &mut bool {
        match feature {
            Feature::SecurityEnabled => &mut self.security_enabled,
            Feature::AggregationView => &mut self.aggregation_view,
            Feature::VisBuilderEnabled => &mut self.vis_builder_enabled,
            Feature::DatasourceManagementEnabled => &mut self.datasource_management_enabled,
            Feature::MlCommonsEnabled => &mut self.ml_commons_enabled,
            Feature::EndpointWithProxy => &mut self.endpoint_with_proxy,
            Feature::ManagedService => &mut self.managed_service,
        }
    }
}

fn parse_flag(key: &str, value: &str) -> E2eResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(E2eError::Config(format!(
            "{ENV_PREFIX}{key}: expected a boolean, got '{other}'"
        ))),
    }
}

fn parse_number(key: &str, value: &str) -> E2eResult<u64> {
    value.trim().parse().map_err(|_| {
        E2eError::Config(format!("{ENV_PREFIX}{key}: expected milliseconds, got '{value}'"))
    })
}
