//! Test runner: fixtures, hooks, steps and the JSON report

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::api::DashboardsApi;
use crate::browser::Page;
use crate::commands::date_picker::DateRange;
use crate::commands::{loader, CommandLog, CommandRecord, Commands, ImportSavedObjects};
use crate::config::RunConfig;
use crate::error::{E2eError, E2eResult};
use crate::fixtures::{FixtureLoader, SeedReport};
use crate::pages::{HomePage, LoginPage};
use crate::poll::await_condition;
use crate::selector::Selector;
use crate::spec::{TestSpec, TestStep, WaitState};

/// Result of executing a test step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    /// Commands issued by a failing test, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandRecord>,
    #[serde(default)]
    pub screenshot: Option<PathBuf>,
    /// Page URL at the moment the test failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_url: Option<String>,
}

impl TestResult {
    fn failed(name: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            duration_ms: 0,
            steps: Vec::new(),
            error: Some(error),
            commands: Vec::new(),
            screenshot: None,
            failure_url: None,
        }
    }
}

/// Result of running one spec file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecResult {
    pub name: String,
    pub source: Option<PathBuf>,
    /// Why the spec did not run, when it was gated off
    pub skipped: Option<String>,
    pub fixtures: Vec<SeedReport>,
    pub duration_ms: u64,
    pub tests: Vec<TestResult>,
}

/// Result of running all specs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub specs: Vec<SpecResult>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Paths and filters of one run
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub specs_dir: PathBuf,
    /// Root for fixture descriptors and saved-object exports
    pub fixtures_dir: PathBuf,
    pub output_dir: PathBuf,
    pub tag: Option<String>,
    pub name: Option<String>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            specs_dir: PathBuf::from("crates/e2e/specs"),
            fixtures_dir: PathBuf::from("crates/e2e/fixtures"),
            output_dir: PathBuf::from("test-results"),
            tag: None,
            name: None,
        }
    }
}

impl RunnerOptions {
    /// Load specs from `specs_dir` and apply the tag and name filters
    pub fn load_specs(&self) -> E2eResult<Vec<TestSpec>> {
        let mut specs = TestSpec::load_all(&self.specs_dir)?;
        if let Some(tag) = &self.tag {
            specs = TestSpec::filter_by_tag(&specs, tag).into_iter().cloned().collect();
        }
        if let Some(name) = &self.name {
            specs = TestSpec::filter_by_name(&specs, name).into_iter().cloned().collect();
        }
        Ok(specs)
    }
}

/// What a run would do, without a browser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedSpec {
    pub name: String,
    pub skipped: Option<String>,
    pub fixtures: Vec<String>,
    pub tests: Vec<PlannedTest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTest {
    pub name: String,
    pub steps: Vec<String>,
}

/// Describe every spec as it would run under `config`
pub fn plan(config: &RunConfig, specs: &[TestSpec]) -> Vec<PlannedSpec> {
    specs
        .iter()
        .map(|spec| PlannedSpec {
            name: spec.name.clone(),
            skipped: spec.skip_reason(config),
            fixtures: spec.fixtures.iter().map(|f| f.index.clone()).collect(),
            tests: spec
                .tests
                .iter()
                .map(|test| PlannedTest {
                    name: test.name.clone(),
                    steps: spec
                        .before_each
                        .iter()
                        .chain(&test.steps)
                        .chain(&spec.after_each)
                        .map(|step| step.to_string())
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

/// Main E2E test runner
pub struct TestRunner<P: Page> {
    config: Arc<RunConfig>,
    page: P,
    fixtures: FixtureLoader,
    api: DashboardsApi,
    log: CommandLog,
    options: RunnerOptions,
}

impl<P: Page> TestRunner<P> {
    pub fn new(config: Arc<RunConfig>, page: P, options: RunnerOptions) -> E2eResult<Self> {
        let fixtures = FixtureLoader::new(&config, &options.fixtures_dir)?;
        let api = DashboardsApi::new(&config)?;
        Ok(Self {
            config,
            page,
            fixtures,
            api,
            log: CommandLog::new(),
            options,
        })
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    fn commands(&self) -> Commands<'_, P> {
        Commands::new(&self.page, &self.config, &self.log)
    }

    /// Run every spec selected by the runner options
    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        let specs = self.options.load_specs()?;
        Ok(self.run_specs(&specs).await)
    }

    /// Run every selected spec and write the report, then hand back the page
    /// whatever the outcome so the caller can always close the session
    pub async fn run_and_report(self) -> (E2eResult<TestSuiteResult>, P) {
        let outcome = match self.run_all().await {
            Ok(results) => self.write_results(&results).map(|_| results),
            Err(e) => Err(e),
        };
        (outcome, self.page)
    }

    /// Run a list of test specs
    pub async fn run_specs(&self, specs: &[TestSpec]) -> TestSuiteResult {
        let start = Instant::now();
        let mut results = Vec::new();
        let (mut passed, mut failed, mut skipped) = (0, 0, 0);

        info!("Running {} spec(s)...", specs.len());

        for spec in specs {
            let result = self.run_spec(spec).await;
            if result.skipped.is_some() {
                skipped += spec.tests.len();
            }
            for test in &result.tests {
                if test.success {
                    passed += 1;
                    info!("✓ {} > {} ({} ms)", spec.name, test.name, test.duration_ms);
                } else {
                    failed += 1;
                    error!(
                        "✗ {} > {} - {}",
                        spec.name,
                        test.name,
                        test.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        TestSuiteResult {
            total: passed + failed + skipped,
            passed,
            failed,
            skipped,
            duration_ms,
            specs: results,
        }
    }

    /// Run a single spec: fixtures, setup, every test, teardown, cleanup
    pub async fn run_spec(&self, spec: &TestSpec) -> SpecResult {
        let start = Instant::now();
        let mut result = SpecResult {
            name: spec.name.clone(),
            source: spec.source.clone(),
            skipped: None,
            fixtures: Vec::new(),
            duration_ms: 0,
            tests: Vec::new(),
        };

        if let Some(reason) = spec.skip_reason(&self.config) {
            info!("Skipping {}: {}", spec.name, reason);
            result.skipped = Some(reason);
            return result;
        }

        debug!("Running spec: {}", spec.name);
        self.log.drain();

        let mut touched = Vec::new();
        let prepared = match self.seed(spec, &mut result.fixtures, &mut touched).await {
            Ok(()) => self
                .run_steps(spec, &spec.setup, &mut Vec::new())
                .await
                .map_err(|e| format!("setup failed: {e}")),
            Err(e) => Err(format!("fixture seeding failed: {e}")),
        };

        match prepared {
            Ok(()) => {
                for test in &spec.tests {
                    let test_result = self.run_test(spec, &test.name, &test.steps).await;
                    result.tests.push(test_result);
                }
            }
            Err(reason) => {
                result.tests = spec
                    .tests
                    .iter()
                    .map(|test| TestResult::failed(&test.name, reason.clone()))
                    .collect();
            }
        }

        if let Err(e) = self.run_steps(spec, &spec.teardown, &mut Vec::new()).await {
            warn!("Teardown of {} failed: {}", spec.name, e);
        }
        self.cleanup(spec, &touched).await;

        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    /// Seed every fixture in order. `touched` collects the indices the backend
    /// may now hold, including one whose seeding failed after its first request.
    async fn seed(
        &self,
        spec: &TestSpec,
        reports: &mut Vec<SeedReport>,
        touched: &mut Vec<String>,
    ) -> E2eResult<()> {
        for fixture in &spec.fixtures {
            match self.fixtures.seed(fixture).await {
                Ok(report) => {
                    touched.push(fixture.index.clone());
                    reports.push(report);
                }
                // unreadable fixture files fail before any request
                Err(e @ E2eError::Fixture { .. }) => return Err(e),
                Err(e) => {
                    touched.push(fixture.index.clone());
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Delete the indices this spec touched and asked to drop
    async fn cleanup(&self, spec: &TestSpec, touched: &[String]) {
        for fixture in &spec.fixtures {
            if !fixture.delete_after || !touched.contains(&fixture.index) {
                continue;
            }
            if let Err(e) = self.fixtures.delete_index(&fixture.index).await {
                warn!("Failed to delete fixture index {}: {}", fixture.index, e);
            }
        }
    }

    async fn run_test(&self, spec: &TestSpec, name: &str, steps: &[TestStep]) -> TestResult {
        let start = Instant::now();
        self.log.drain();
        if let Err(e) = self.page.take_uncaught_errors().await {
            debug!("Could not clear page errors: {}", e);
        }

        let mut step_results = Vec::new();
        let mut outcome = self.run_steps(spec, &spec.before_each, &mut step_results).await;
        if outcome.is_ok() {
            outcome = self.run_steps(spec, steps, &mut step_results).await;
        }

        let mut screenshot = None;
        let mut failure_url = None;
        if outcome.is_err() {
            failure_url = match self.page.current_url().await {
                Ok(url) => Some(url),
                Err(e) => {
                    debug!("Could not read page URL: {}", e);
                    None
                }
            };
            screenshot = self.failure_screenshot(&spec.name, name).await;
        }

        let after = self.run_steps(spec, &spec.after_each, &mut step_results).await;
        if outcome.is_ok() {
            outcome = after;
        }

        let commands = self.log.drain();
        let error = outcome.err().map(|e| e.to_string());
        TestResult {
            name: name.to_string(),
            success: error.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps: step_results,
            commands: if error.is_some() { commands } else { Vec::new() },
            error,
            screenshot,
            failure_url,
        }
    }

    /// Run steps in order, stopping at the first failure
    async fn run_steps(
        &self,
        spec: &TestSpec,
        steps: &[TestStep],
        results: &mut Vec<StepResult>,
    ) -> E2eResult<()> {
        for step in steps {
            let start = Instant::now();
            let name = step.to_string();
            debug!("Executing step: {}", name);

            let outcome = match self.execute_step(step).await {
                Ok(()) => self.check_page_errors(spec).await,
                Err(e) => Err(e),
            };

            let duration_ms = start.elapsed().as_millis() as u64;
            match outcome {
                Ok(()) => results.push(StepResult {
                    step: name,
                    success: true,
                    duration_ms,
                    error: None,
                }),
                Err(e) => {
                    results.push(StepResult {
                        step: name.clone(),
                        success: false,
                        duration_ms,
                        error: Some(e.to_string()),
                    });
                    return Err(E2eError::StepFailed {
                        step: name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn check_page_errors(&self, spec: &TestSpec) -> E2eResult<()> {
        let errors = self.page.take_uncaught_errors().await?;
        if errors.is_empty() {
            return Ok(());
        }
        if spec.ignore_uncaught_exceptions {
            for message in &errors {
                warn!("Ignoring uncaught exception: {}", message);
            }
            return Ok(());
        }
        Err(E2eError::UncaughtException(errors.join("; ")))
    }

    async fn failure_screenshot(&self, spec: &str, test: &str) -> Option<PathBuf> {
        let name = format!("{} - {} (failed)", spec, test);
        match self.save_screenshot(&name).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Failed to capture failure screenshot: {}", e);
                None
            }
        }
    }

    async fn save_screenshot(&self, name: &str) -> E2eResult<Option<PathBuf>> {
        let Some(png) = self.page.screenshot_png().await? else {
            debug!("Page cannot render screenshots, skipping {}", name);
            return Ok(None);
        };
        let dir = self.options.output_dir.join("screenshots");
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.png", file_name(name)));
        tokio::fs::write(&path, png).await?;
        Ok(Some(path))
    }

    /// Execute a single test step
    pub async fn execute_step(&self, step: &TestStep) -> E2eResult<()> {
        let cmds = self.commands();

        match step {
            TestStep::Visit { path, wait_for_loader } => {
                cmds.visit(path).await?;
                if *wait_for_loader {
                    cmds.wait_for_loader(false).await?;
                }
            }
            TestStep::Click { selector, contains, index } => {
                let found = match contains {
                    Some(text) => cmds.contains(selector.clone(), text).await?,
                    None => cmds.get(selector.clone()).await?,
                };
                found.eq(index.unwrap_or(0))?.click().await?;
            }
            TestStep::Type { selector, text, clear } => {
                let input = cmds.get(selector.clone()).await?.first()?;
                if *clear {
                    input.clear().await?;
                }
                input.type_text(text).await?;
            }
            TestStep::PressEnter { selector } => {
                cmds.get(selector.clone()).await?.press_enter().await?;
            }
            TestStep::Wait { selector, state, timeout_ms } => {
                let cmds = match timeout_ms {
                    Some(ms) => cmds.timeout(Duration::from_millis(*ms)),
                    None => cmds,
                };
                match state {
                    WaitState::Visible => {
                        cmds.wait_for_present(selector.clone()).await?;
                    }
                    WaitState::Absent => cmds.wait_for_absent(selector.clone()).await?,
                }
            }
            TestStep::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            TestStep::Assert {
                selector,
                contains,
                text,
                text_contains,
                visible,
                count,
                attribute,
                css,
            } => {
                if let Some(expected) = count {
                    self.assert_count(cmds, selector, contains.as_deref(), *expected).await?;
                    if *expected == 0 {
                        return Ok(());
                    }
                }
                if *visible == Some(false) {
                    return cmds.wait_for_absent(selector.clone()).await;
                }

                let found = match contains {
                    Some(t) => cmds.contains(selector.clone(), t).await?,
                    None => cmds.get(selector.clone()).await?,
                };
                if *visible == Some(true) {
                    cmds.quiet().wait_for_present(selector.clone()).await?;
                }
                if let Some(expected) = text {
                    found.should_have_text(expected).await?;
                }
                if let Some(expected) = text_contains {
                    found.should_contain_text(expected).await?;
                }
                if let Some(attr) = attribute {
                    cmds.wait_for_attribute(selector.clone(), &attr.name, &attr.value)
                        .await?;
                }
                if let Some(css) = css {
                    let found = &found;
                    await_condition(cmds.poll_options(), move || async move {
                        let actual = found.css_value(&css.property).await?;
                        Ok((actual == css.value).then_some(()))
                    })
                    .await?
                    .settled(format!("{} to have {}: {}", selector, css.property, css.value))?;
                }
            }
            TestStep::Screenshot { name } => {
                if let Some(path) = self.save_screenshot(name).await? {
                    info!("Screenshot saved to {}", path.display());
                }
            }
            TestStep::Log { message } => {
                info!("[TEST LOG] {}", message);
            }
            TestStep::WaitForLoader { enhancements } => {
                cmds.wait_for_loader(*enhancements).await?;
            }
            TestStep::WaitForSearch => {
                cmds.wait_for_search().await?;
            }
            TestStep::SetTopNavDate { start, end, submit } => {
                cmds.set_top_nav_date(start, end, *submit).await?;
            }
            TestStep::AssertTopNavDate { start, end } => {
                let shown = cmds.top_nav_date().await?;
                let expected = DateRange::new(start.as_str(), end.as_str());
                if shown.normalized() != expected.normalized() {
                    return Err(E2eError::AssertionFailed(format!(
                        "expected date range '{start}' -> '{end}', picker shows '{}' -> '{}'",
                        shown.start, shown.end
                    )));
                }
            }
            TestStep::SetQuery { query, submit, language } => {
                cmds.set_top_nav_query(query, *submit, *language).await?;
            }
            TestStep::SubmitFilter { field, operator, value } => {
                cmds.submit_filter_from_dropdown(field, operator, value).await?;
            }
            TestStep::AssertFilter { field, operator, value } => {
                let filter = cmds.read_filter(field).await?;
                if filter.field != *field || filter.operator != *operator || filter.value != *value {
                    return Err(E2eError::AssertionFailed(format!(
                        "expected filter '{field} {operator} {value}', editor holds '{} {} {}'",
                        filter.field, filter.operator, filter.value
                    )));
                }
            }
            TestStep::AssertHits { expected } => {
                cmds.get_by_test_id(loader::QUERY_HITS)
                    .await?
                    .should_have_text(expected)
                    .await?;
            }
            TestStep::ImportSavedObjects {
                file,
                data_source,
                mode,
                overwrite,
                expect_titles,
                expect_new,
            } => {
                let options = ImportSavedObjects {
                    file: self.options.fixtures_dir.join(file),
                    data_source: data_source.clone(),
                    mode: *mode,
                    overwrite: *overwrite,
                };
                let report = cmds.import_saved_objects(&options).await?;

                for title in expect_titles {
                    if !report.objects.iter().any(|o| o.title == *title) {
                        return Err(E2eError::AssertionFailed(format!(
                            "'{title}' missing from the import summary"
                        )));
                    }
                }
                if let Some(expected) = expect_new {
                    if let Some(object) = report.objects.iter().find(|o| o.is_new != *expected) {
                        return Err(E2eError::AssertionFailed(format!(
                            "'{}' new copy marker is {}, expected {}",
                            object.title, object.is_new, expected
                        )));
                    }
                }
            }
            TestStep::ClickPanelMenuItem { panel, item } => {
                let panel = cmds.vis_panel_by_title(panel).await?;
                cmds.open_panel_menu(&panel).await?;
                cmds.click_panel_menu_item(item).await?;
            }
            TestStep::SelectDataSource { title } => {
                cmds.select_data_source(title).await?;
            }
            TestStep::SetConsoleFontSize { size } => {
                cmds.set_console_font_size(*size).await?;
            }
            TestStep::AssertConsoleFontSize { size } => {
                let expected = *size;
                await_condition(cmds.poll_options(), move || async move {
                    let actual = cmds.console_font_size().await?;
                    Ok((actual == expected).then_some(()))
                })
                .await?
                .settled(format!("console font size to be {expected}px"))?;
            }
            TestStep::Login => {
                LoginPage::new(cmds).login(&self.config.credentials).await?;
            }
            TestStep::AddSampleData { id } => {
                let home = HomePage::new(cmds);
                home.open_sample_data().await?;
                home.add_sample_data(id).await?;
            }
            TestStep::SetAdvancedSetting { key, value } => {
                self.api.set_advanced_setting(key, value.clone()).await?;
            }
            TestStep::DeleteSavedObject { kind, id } => {
                self.api.delete_saved_object(kind, id).await?;
            }
            TestStep::CreateIndexPattern { id, title, time_field } => {
                self.api
                    .create_index_pattern(id, title, time_field.as_deref())
                    .await?;
            }
            TestStep::AssertIndexCount { index, at_least } => {
                let count = self.fixtures.count(index).await?;
                if count < *at_least {
                    return Err(E2eError::AssertionFailed(format!(
                        "index {index} holds {count} document(s), expected at least {at_least}"
                    )));
                }
            }
        }
        Ok(())
    }

    async fn assert_count(
        &self,
        cmds: Commands<'_, P>,
        selector: &Selector,
        contains: Option<&str>,
        expected: usize,
    ) -> E2eResult<()> {
        let page = cmds.page();
        let last = &parking_lot::Mutex::new(0usize);
        let outcome = await_condition(cmds.poll_options(), move || async move {
            let mut matched = 0;
            for element in page.query(None, selector).await? {
                let counted = match contains {
                    Some(text) => page.text(&element).await?.contains(text),
                    None => true,
                };
                if counted {
                    matched += 1;
                }
            }
            *last.lock() = matched;
            Ok((matched == expected).then_some(()))
        })
        .await?;

        if outcome.is_settled() {
            return Ok(());
        }
        Err(E2eError::AssertionFailed(format!(
            "expected {expected} element(s) matching {selector}, found {}",
            *last.lock()
        )))
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.options.output_dir, results)
    }
}

/// Write `test-results.json` into `output_dir`
pub fn write_results(output_dir: &Path, results: &TestSuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

fn file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_is_filesystem_safe() {
        assert_eq!(file_name("discover > adds a filter (failed)"), "discover___adds_a_filter__failed_");
    }

    #[test]
    fn test_plan_expands_hooks_and_gating() {
        let spec = TestSpec::from_yaml(
            r#"
name: planned
requires: [ml_commons_enabled]
fixtures:
  - index: books
before_each:
  - action: visit
    path: /app/home
tests:
  - name: one
    steps:
      - action: sleep
        ms: 5
"#,
        )
        .unwrap();

        let config = RunConfig::default();
        let planned = plan(&config, &[spec]);
        assert_eq!(planned[0].fixtures, vec!["books".to_string()]);
        assert!(planned[0].skipped.is_some());
        assert_eq!(planned[0].tests[0].steps, vec!["visit /app/home", "sleep 5ms"]);
    }
}
