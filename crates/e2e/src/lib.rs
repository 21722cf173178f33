//! OpenSearch Dashboards E2E Test Harness
//!
//! This crate drives a real browser against a running dashboards instance and
//! its search backend:
//! - Seeds fixture indices over the backend's HTTP API
//! - Drives the browser over WebDriver through the [`Page`] seam
//! - Waits on rendered UI state with a single polling primitive
//! - Parses declarative YAML test specs and reports results as JSON
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RunConfig (TOML + OSD_E2E_* env) ──► Arc, read-only         │
//! │  TestRunner<P: Page>                                        │
//! │    ├── FixtureLoader::seed(descriptor) -> SeedReport        │
//! │    ├── run_spec(spec) -> SpecResult                         │
//! │    │     setup, before_each, steps, after_each, teardown    │
//! │    └── write_results() -> test-results.json                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Commands<'a, P>  (quiet / timeout options, CommandLog)     │
//! │    ├── get / contains / wait_for_* ──► await_condition      │
//! │    ├── Located: first, last, find, closest, click, ...      │
//! │    └── named commands: wait_for_loader, set_top_nav_date,   │
//! │        submit_filter_from_dropdown, import_saved_objects    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page (seam)                                                │
//! │    ├── WebDriverPage (thirtyfour, chromedriver/geckodriver) │
//! │    └── MemoryPage (in-memory DOM for tests)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod browser;
pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod fixtures;
pub mod memory;
pub mod pages;
pub mod poll;
pub mod runner;
pub mod selector;
pub mod spec;
pub mod stub_llm;

pub use browser::{Page, WebDriverPage};
pub use commands::{Commands, Located};
pub use config::{Feature, RunConfig};
pub use error::{E2eError, E2eResult};
pub use fixtures::{FixtureDescriptor, FixtureLoader};
pub use memory::MemoryPage;
pub use runner::{RunnerOptions, TestRunner, TestSuiteResult};
pub use selector::Selector;
pub use spec::{TestSpec, TestStep};
