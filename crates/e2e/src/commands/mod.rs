//! Command layer
//!
//! [`Commands`] bundles the page, the run configuration and the command log.
//! It is `Copy`; [`Commands::quiet`] and [`Commands::timeout`] return adjusted
//! copies, so options apply to exactly the commands issued through them.
//!
//! Lookups return a [`Located`] handle that later commands consume:
//!
//! ```ignore
//! let panel = cy.vis_panel_by_title("Unique Visitors").await?;
//! cy.open_panel_menu(&panel).await?;
//! cy.click_panel_menu_item("Inspect").await?;
//! ```

pub mod console;
pub mod data_source;
pub mod date_picker;
pub mod loader;
mod located;
mod log;
pub mod panels;
pub mod query_bar;
pub mod saved_objects;

pub use date_picker::DateRange;
pub use located::Located;
pub use log::{CommandLog, CommandRecord};
pub use query_bar::{FilterSnapshot, QueryLanguage};
pub use saved_objects::{ImportMode, ImportReport, ImportSavedObjects, ImportedObject};

use std::time::Duration;
use tracing::debug;

use crate::browser::Page;
use crate::config::RunConfig;
use crate::error::E2eResult;
use crate::poll::{await_condition, PollOptions};
use crate::selector::Selector;

/// Per-invocation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOptions {
    /// Skip the command record for this invocation
    pub quiet: bool,

    /// Override of the default command timeout
    pub timeout: Option<Duration>,
}

/// Entry point of every browser interaction
pub struct Commands<'a, P: Page> {
    page: &'a P,
    config: &'a RunConfig,
    log: &'a CommandLog,
    options: CommandOptions,
}

impl<'a, P: Page> Clone for Commands<'a, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, P: Page> Copy for Commands<'a, P> {}

impl<'a, P: Page> Commands<'a, P> {
    pub fn new(page: &'a P, config: &'a RunConfig, log: &'a CommandLog) -> Self {
        Self {
            page,
            config,
            log,
            options: CommandOptions::default(),
        }
    }

    pub fn page(&self) -> &'a P {
        self.page
    }

    pub fn config(&self) -> &'a RunConfig {
        self.config
    }

    pub fn options(&self) -> CommandOptions {
        self.options
    }

    /// Same commands without command records
    pub fn quiet(mut self) -> Self {
        self.options.quiet = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Log a command record unless suppressed
    pub fn record(&self, name: &str, display_name: &str, message: impl AsRef<str>) {
        if self.options.quiet || self.config.features.quiet_commands {
            return;
        }
        self.log.record(name, display_name, message.as_ref());
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions::new(
            self.config.timeouts.poll_interval(),
            self.options
                .timeout
                .unwrap_or_else(|| self.config.timeouts.default_command()),
        )
    }

    /// Navigate to a dashboards path (or absolute URL)
    pub async fn visit(&self, path: &str) -> E2eResult<()> {
        let url = self.config.url(path);
        self.record("visit", "visit", &url);
        self.page.goto(&url).await
    }

    /// Poll until at least one element matches
    pub async fn get(&self, selector: Selector) -> E2eResult<Located<'a, P>> {
        self.locate(None, selector, None).await
    }

    pub async fn get_by_test_id(&self, id: &str) -> E2eResult<Located<'a, P>> {
        self.get(Selector::test_subj(id)).await
    }

    pub async fn get_by_test_id_prefix(&self, prefix: &str) -> E2eResult<Located<'a, P>> {
        self.get(Selector::test_subj_prefix(prefix)).await
    }

    /// Poll until an element matching `selector` has rendered text containing `text`
    pub async fn contains(&self, selector: Selector, text: &str) -> E2eResult<Located<'a, P>> {
        self.locate(None, selector, Some(text)).await
    }

    /// Elements matching right now, without waiting
    pub async fn query_now(&self, selector: &Selector) -> E2eResult<Vec<P::Element>> {
        self.page.query(None, selector).await
    }

    /// Poll until a displayed element matches
    pub async fn wait_for_present(&self, selector: Selector) -> E2eResult<Located<'a, P>> {
        let cmds = *self;
        let sel = &selector;
        let elements = await_condition(self.poll_options(), move || async move {
            let mut shown = Vec::new();
            for element in cmds.page.query(None, sel).await? {
                if cmds.page.is_displayed(&element).await? {
                    shown.push(element);
                }
            }
            Ok((!shown.is_empty()).then_some(shown))
        })
        .await?
        .settled(format!("{sel} to be visible"))?;

        Ok(Located::new(*self, selector.to_string(), elements))
    }

    /// Poll until no displayed element matches
    pub async fn wait_for_absent(&self, selector: Selector) -> E2eResult<()> {
        let cmds = *self;
        let sel = &selector;
        await_condition(self.poll_options(), move || async move {
            for element in cmds.page.query(None, sel).await? {
                if cmds.page.is_displayed(&element).await? {
                    return Ok(None);
                }
            }
            Ok(Some(()))
        })
        .await?
        .settled(format!("{sel} to be gone"))
    }

    /// Poll until the first match carries `name="value"`
    pub async fn wait_for_attribute(&self, selector: Selector, name: &str, value: &str) -> E2eResult<Located<'a, P>> {
        let cmds = *self;
        let sel = &selector;
        let elements = await_condition(self.poll_options(), move || async move {
            let found = cmds.page.query(None, sel).await?;
            match found.first() {
                Some(first) if cmds.page.attribute(first, name).await?.as_deref() == Some(value) => {
                    Ok(Some(found))
                }
                _ => Ok(None),
            }
        })
        .await?
        .settled(format!("{sel} to have {name}=\"{value}\""))?;

        Ok(Located::new(*self, selector.to_string(), elements))
    }

    /// Click every match of `selector` while one is present, at most `max` times.
    /// Returns the number of clicks.
    pub async fn click_while_present(&self, selector: Selector, max: u32) -> E2eResult<u32> {
        let mut clicks = 0;
        while clicks < max {
            let found = self.page.query(None, &selector).await?;
            let mut target = None;
            for element in found {
                if self.page.is_displayed(&element).await? {
                    target = Some(element);
                    break;
                }
            }
            let Some(element) = target else {
                break;
            };
            self.page.click(&element).await?;
            clicks += 1;
            tokio::time::sleep(self.config.timeouts.poll_interval()).await;
        }
        debug!("clicked {} {} time(s)", selector, clicks);
        Ok(clicks)
    }

    pub(crate) async fn locate(
        &self,
        scope: Option<&P::Element>,
        selector: Selector,
        text: Option<&str>,
    ) -> E2eResult<Located<'a, P>> {
        let cmds = *self;
        let sel = &selector;
        let elements = await_condition(self.poll_options(), move || async move {
            let found = cmds.page.query(scope, sel).await?;
            let matched = match text {
                None => found,
                Some(text) => {
                    let mut matched = Vec::new();
                    for element in found {
                        if cmds.page.text(&element).await?.contains(text) {
                            matched.push(element);
                        }
                    }
                    matched
                }
            };
            Ok((!matched.is_empty()).then_some(matched))
        })
        .await?
        .settled(match text {
            Some(text) => format!("{sel} containing '{text}'"),
            None => format!("{sel} to exist"),
        })?;

        debug!("located {} element(s) for {}", elements.len(), selector);
        let description = match text {
            Some(text) => format!("{selector} containing '{text}'"),
            None => selector.to_string(),
        };
        Ok(Located::new(*self, description, elements))
    }
}
