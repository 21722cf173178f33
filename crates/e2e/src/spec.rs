//! Declarative YAML test specification
//!
//! One file describes one spec: the features it needs, the fixtures it owns,
//! one-time and per-test hooks, and its tests. Every step is tagged by
//! `action`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::commands::{ImportMode, QueryLanguage};
use crate::config::{Feature, RunConfig};
use crate::error::{E2eError, E2eResult};
use crate::fixtures::FixtureDescriptor;
use crate::selector::Selector;

/// A complete test specification parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this spec
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering specs
    #[serde(default)]
    pub tags: Vec<String>,

    /// Features that must be switched on for the spec to run
    #[serde(default)]
    pub requires: Vec<Feature>,

    /// Features that must be switched off for the spec to run
    #[serde(default)]
    pub skip_when: Vec<Feature>,

    /// Page exceptions are logged instead of failing the test
    #[serde(default)]
    pub ignore_uncaught_exceptions: bool,

    /// Indices seeded before the first test
    #[serde(default)]
    pub fixtures: Vec<FixtureDescriptor>,

    /// Steps run once before the first test
    #[serde(default)]
    pub setup: Vec<TestStep>,

    /// Steps run once after the last test
    #[serde(default)]
    pub teardown: Vec<TestStep>,

    #[serde(default)]
    pub before_each: Vec<TestStep>,

    #[serde(default)]
    pub after_each: Vec<TestStep>,

    pub tests: Vec<TestCase>,

    /// File the spec was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub steps: Vec<TestStep>,
}

/// A single step in a test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a dashboards path
    Visit {
        path: String,
        #[serde(default)]
        wait_for_loader: bool,
    },

    Click {
        selector: Selector,
        #[serde(default)]
        contains: Option<String>,
        /// Pick the n-th match instead of the first
        #[serde(default)]
        index: Option<usize>,
    },

    Type {
        selector: Selector,
        text: String,
        #[serde(default)]
        clear: bool,
    },

    PressEnter {
        selector: Selector,
    },

    /// Wait for an element to show up or go away
    Wait {
        selector: Selector,
        #[serde(default)]
        state: WaitState,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep {
        ms: u64,
    },

    /// Assert something about an element
    Assert {
        selector: Selector,
        /// Narrow the lookup to elements containing this text
        #[serde(default)]
        contains: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        attribute: Option<AttributeAssertion>,
        #[serde(default)]
        css: Option<CssAssertion>,
    },

    Screenshot {
        name: String,
    },

    /// Log a message (for debugging)
    Log {
        message: String,
    },

    WaitForLoader {
        #[serde(default)]
        enhancements: bool,
    },

    WaitForSearch,

    SetTopNavDate {
        start: String,
        end: String,
        #[serde(default = "default_true")]
        submit: bool,
    },

    AssertTopNavDate {
        start: String,
        end: String,
    },

    SetQuery {
        query: String,
        #[serde(default = "default_true")]
        submit: bool,
        #[serde(default)]
        language: Option<QueryLanguage>,
    },

    SubmitFilter {
        field: String,
        operator: String,
        #[serde(default)]
        value: String,
    },

    /// Reopen a filter pill and compare what its editor holds
    AssertFilter {
        field: String,
        operator: String,
        #[serde(default)]
        value: String,
    },

    AssertHits {
        expected: String,
    },

    ImportSavedObjects {
        file: PathBuf,
        #[serde(default)]
        data_source: Option<String>,
        #[serde(default)]
        mode: ImportMode,
        #[serde(default = "default_true")]
        overwrite: bool,
        /// Titles that must appear in the import summary
        #[serde(default)]
        expect_titles: Vec<String>,
        /// Every imported object must (or must not) be a new copy
        #[serde(default)]
        expect_new: Option<bool>,
    },

    ClickPanelMenuItem {
        panel: String,
        item: String,
    },

    SelectDataSource {
        title: String,
    },

    SetConsoleFontSize {
        size: u32,
    },

    AssertConsoleFontSize {
        size: u32,
    },

    /// Log in with the configured credentials
    Login,

    AddSampleData {
        id: String,
    },

    SetAdvancedSetting {
        key: String,
        value: serde_json::Value,
    },

    DeleteSavedObject {
        #[serde(rename = "type")]
        kind: String,
        id: String,
    },

    CreateIndexPattern {
        id: String,
        title: String,
        #[serde(default)]
        time_field: Option<String>,
    },

    /// Document count of a seeded index
    AssertIndexCount {
        index: String,
        #[serde(default = "default_min_count")]
        at_least: u64,
    },
}

fn default_true() -> bool {
    true
}

fn default_min_count() -> u64 {
    1
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Absent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeAssertion {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CssAssertion {
    pub property: String,
    pub value: String,
}

impl TestStep {
    /// Action tag as written in YAML
    pub fn action(&self) -> &'static str {
        match self {
            TestStep::Visit { .. } => "visit",
            TestStep::Click { .. } => "click",
            TestStep::Type { .. } => "type",
            TestStep::PressEnter { .. } => "press_enter",
            TestStep::Wait { .. } => "wait",
            TestStep::Sleep { .. } => "sleep",
            TestStep::Assert { .. } => "assert",
            TestStep::Screenshot { .. } => "screenshot",
            TestStep::Log { .. } => "log",
            TestStep::WaitForLoader { .. } => "wait_for_loader",
            TestStep::WaitForSearch => "wait_for_search",
            TestStep::SetTopNavDate { .. } => "set_top_nav_date",
            TestStep::AssertTopNavDate { .. } => "assert_top_nav_date",
            TestStep::SetQuery { .. } => "set_query",
            TestStep::SubmitFilter { .. } => "submit_filter",
            TestStep::AssertFilter { .. } => "assert_filter",
            TestStep::AssertHits { .. } => "assert_hits",
            TestStep::ImportSavedObjects { .. } => "import_saved_objects",
            TestStep::ClickPanelMenuItem { .. } => "click_panel_menu_item",
            TestStep::SelectDataSource { .. } => "select_data_source",
            TestStep::SetConsoleFontSize { .. } => "set_console_font_size",
            TestStep::AssertConsoleFontSize { .. } => "assert_console_font_size",
            TestStep::Login => "login",
            TestStep::AddSampleData { .. } => "add_sample_data",
            TestStep::SetAdvancedSetting { .. } => "set_advanced_setting",
            TestStep::DeleteSavedObject { .. } => "delete_saved_object",
            TestStep::CreateIndexPattern { .. } => "create_index_pattern",
            TestStep::AssertIndexCount { .. } => "assert_index_count",
        }
    }
}

impl fmt::Display for TestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = self.action();
        match self {
            TestStep::Visit { path, .. } => write!(f, "{action} {path}"),
            TestStep::Click { selector, contains: Some(text), .. } => {
                write!(f, "{action} {selector} containing '{text}'")
            }
            TestStep::Click { selector, .. }
            | TestStep::Type { selector, .. }
            | TestStep::PressEnter { selector }
            | TestStep::Wait { selector, .. }
            | TestStep::Assert { selector, .. } => write!(f, "{action} {selector}"),
            TestStep::Sleep { ms } => write!(f, "{action} {ms}ms"),
            TestStep::Screenshot { name } => write!(f, "{action} {name}"),
            TestStep::SetTopNavDate { start, end, .. } | TestStep::AssertTopNavDate { start, end } => {
                write!(f, "{action} {start} -> {end}")
            }
            TestStep::SetQuery { query, .. } => write!(f, "{action} '{query}'"),
            TestStep::SubmitFilter { field, operator, value }
            | TestStep::AssertFilter { field, operator, value } => {
                write!(f, "{action} {field} {operator} {value}")
            }
            TestStep::AssertHits { expected } => write!(f, "{action} {expected}"),
            TestStep::ImportSavedObjects { file, .. } => write!(f, "{action} {}", file.display()),
            TestStep::ClickPanelMenuItem { panel, item } => write!(f, "{action} {panel} > {item}"),
            TestStep::SelectDataSource { title } => write!(f, "{action} {title}"),
            TestStep::SetConsoleFontSize { size } | TestStep::AssertConsoleFontSize { size } => {
                write!(f, "{action} {size}px")
            }
            TestStep::AddSampleData { id } => write!(f, "{action} {id}"),
            TestStep::SetAdvancedSetting { key, value } => write!(f, "{action} {key}={value}"),
            TestStep::DeleteSavedObject { kind, id } => write!(f, "{action} {kind}/{id}"),
            TestStep::CreateIndexPattern { title, .. } => write!(f, "{action} {title}"),
            TestStep::AssertIndexCount { index, at_least } => {
                write!(f, "{action} {index} >= {at_least}")
            }
            TestStep::Log { .. }
            | TestStep::WaitForLoader { .. }
            | TestStep::WaitForSearch
            | TestStep::Login => f.write_str(action),
        }
    }
}

impl TestSpec {
    /// Parse a test spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a test spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut spec = Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))?;
        spec.source = Some(path.to_path_buf());
        Ok(spec)
    }

    /// Load all test specs from a directory, ordered by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(E2eError::SpecParse(format!(
                    "duplicate spec name '{}'",
                    spec.name
                )));
            }
        }

        Ok(specs)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Filter specs whose name contains `pattern`
    pub fn filter_by_name<'a>(specs: &'a [Self], pattern: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.name.contains(pattern)).collect()
    }

    /// Why this spec cannot run under `config`, if it cannot
    pub fn skip_reason(&self, config: &RunConfig) -> Option<String> {
        if let Some(missing) = self.requires.iter().find(|f| !config.enabled(**f)) {
            return Some(format!("requires {:?}", missing));
        }
        if let Some(present) = self.skip_when.iter().find(|f| config.enabled(**f)) {
            return Some(format!("skipped when {:?} is enabled", present));
        }
        None
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("spec has no name".to_string()));
        }
        if self.tests.is_empty() {
            return Err(E2eError::SpecParse(format!("spec '{}' has no tests", self.name)));
        }
        let mut seen = HashSet::new();
        for test in &self.tests {
            if !seen.insert(test.name.as_str()) {
                return Err(E2eError::SpecParse(format!(
                    "spec '{}' has two tests named '{}'",
                    self.name, test.name
                )));
            }
        }
        Ok(())
    }
}
