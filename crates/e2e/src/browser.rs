//! Browser seam
//!
//! [`Page`] is everything the command layer needs from a browser session.
//! [`WebDriverPage`] drives a real browser over the W3C WebDriver protocol;
//! [`crate::memory::MemoryPage`] implements the same trait over an in-memory DOM.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::path::Path;
use thirtyfour::prelude::*;
use tracing::{debug, info};

use crate::config::{BrowserConfig, BrowserKind, Timeouts};
use crate::error::{E2eError, E2eResult};
use crate::selector::Selector;

/// A single browser page/session
#[async_trait]
pub trait Page: Send + Sync {
    /// Handle to one element of the page
    type Element: Clone + Debug + Send + Sync;

    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    /// All elements matching `selector`, in document order, optionally scoped to a subtree
    async fn query(&self, scope: Option<&Self::Element>, selector: &Selector) -> E2eResult<Vec<Self::Element>>;

    /// Nearest ancestor-or-self matching `selector`
    async fn closest(&self, element: &Self::Element, selector: &Selector) -> E2eResult<Option<Self::Element>>;

    async fn click(&self, element: &Self::Element) -> E2eResult<()>;

    async fn type_text(&self, element: &Self::Element, text: &str) -> E2eResult<()>;

    async fn press_enter(&self, element: &Self::Element) -> E2eResult<()>;

    async fn clear(&self, element: &Self::Element) -> E2eResult<()>;

    /// Rendered text of the element and its descendants
    async fn text(&self, element: &Self::Element) -> E2eResult<String>;

    /// Current `value` property of form controls
    async fn value(&self, element: &Self::Element) -> E2eResult<Option<String>>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> E2eResult<Option<String>>;

    /// Computed style property
    async fn css_value(&self, element: &Self::Element, name: &str) -> E2eResult<String>;

    async fn is_displayed(&self, element: &Self::Element) -> E2eResult<bool>;

    /// Attach a local file to an `<input type="file">`
    async fn upload(&self, element: &Self::Element, path: &Path) -> E2eResult<()>;

    /// Drain uncaught exceptions raised by the page since the last call
    async fn take_uncaught_errors(&self) -> E2eResult<Vec<String>>;

    /// PNG of the viewport, when the backend can render one
    async fn screenshot_png(&self) -> E2eResult<Option<Vec<u8>>>;
}

const ERROR_HOOK_JS: &str = r#"
if (!window.__osdE2eErrors) {
  window.__osdE2eErrors = [];
  window.addEventListener('error', function (e) { window.__osdE2eErrors.push(String(e.message)); });
  window.addEventListener('unhandledrejection', function (e) { window.__osdE2eErrors.push(String(e.reason)); });
}
"#;

const DRAIN_ERRORS_JS: &str = r#"
var errors = window.__osdE2eErrors || [];
window.__osdE2eErrors = [];
return errors;
"#;

const CLOSEST_JS: &str = "return arguments[0].closest(arguments[1]);";

/// WebDriver-backed browser page
pub struct WebDriverPage {
    driver: WebDriver,
}

impl WebDriverPage {
    /// Open a new browser session on the configured WebDriver endpoint
    pub async fn connect(config: &BrowserConfig, timeouts: &Timeouts) -> E2eResult<Self> {
        info!(
            "Opening {:?} session via {} (headless: {})",
            config.kind, config.webdriver_url, config.headless
        );

        let driver = match config.kind {
            BrowserKind::Chrome => {
                let mut caps = DesiredCapabilities::chrome();
                if config.headless {
                    caps.set_headless()?;
                }
                caps.add_arg(&format!(
                    "--window-size={},{}",
                    config.viewport_width, config.viewport_height
                ))?;
                WebDriver::new(config.webdriver_url.as_str(), caps).await?
            }
            BrowserKind::Firefox => {
                let mut caps = DesiredCapabilities::firefox();
                if config.headless {
                    caps.set_headless()?;
                }
                WebDriver::new(config.webdriver_url.as_str(), caps).await?
            }
        };

        driver.set_page_load_timeout(timeouts.page_load()).await?;

        Ok(Self { driver })
    }

    /// End the browser session
    pub async fn quit(self) -> E2eResult<()> {
        self.driver.quit().await?;
        Ok(())
    }
}

#[async_trait]
impl Page for WebDriverPage {
    type Element = WebElement;

    async fn goto(&self, url: &str) -> E2eResult<()> {
        debug!("goto {}", url);
        self.driver.goto(url).await?;
        self.driver.execute(ERROR_HOOK_JS, Vec::new()).await?;
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn query(&self, scope: Option<&WebElement>, selector: &Selector) -> E2eResult<Vec<WebElement>> {
        let by = By::Css(selector.to_css());
        let found = match scope {
            Some(element) => element.find_all(by).await?,
            None => self.driver.find_all(by).await?,
        };
        Ok(found)
    }

    async fn closest(&self, element: &WebElement, selector: &Selector) -> E2eResult<Option<WebElement>> {
        let args = vec![element.to_json()?, Value::String(selector.to_css())];
        let ret = self.driver.execute(CLOSEST_JS, args).await?;
        if ret.json().is_null() {
            return Ok(None);
        }
        Ok(Some(ret.element()?))
    }

    async fn click(&self, element: &WebElement) -> E2eResult<()> {
        element.click().await?;
        Ok(())
    }

    async fn type_text(&self, element: &WebElement, text: &str) -> E2eResult<()> {
        element.send_keys(text).await?;
        Ok(())
    }

    async fn press_enter(&self, element: &WebElement) -> E2eResult<()> {
        element.send_keys(Key::Enter).await?;
        Ok(())
    }

    async fn clear(&self, element: &WebElement) -> E2eResult<()> {
        element.clear().await?;
        Ok(())
    }

    async fn text(&self, element: &WebElement) -> E2eResult<String> {
        Ok(element.text().await?)
    }

    async fn value(&self, element: &WebElement) -> E2eResult<Option<String>> {
        Ok(element.prop("value").await?)
    }

    async fn attribute(&self, element: &WebElement, name: &str) -> E2eResult<Option<String>> {
        Ok(element.attr(name).await?)
    }

    async fn css_value(&self, element: &WebElement, name: &str) -> E2eResult<String> {
        Ok(element.css_value(name).await?)
    }

    async fn is_displayed(&self, element: &WebElement) -> E2eResult<bool> {
        Ok(element.is_displayed().await?)
    }

    async fn upload(&self, element: &WebElement, path: &Path) -> E2eResult<()> {
        let absolute = std::fs::canonicalize(path)?;
        element.send_keys(absolute.display().to_string()).await?;
        Ok(())
    }

    async fn take_uncaught_errors(&self) -> E2eResult<Vec<String>> {
        let ret = self.driver.execute(DRAIN_ERRORS_JS, Vec::new()).await?;
        serde_json::from_value(ret.json().clone())
            .map_err(|e| E2eError::Driver(format!("unexpected error list from page: {e}")))
    }

    async fn screenshot_png(&self) -> E2eResult<Option<Vec<u8>>> {
        Ok(Some(self.driver.screenshot_as_png().await?))
    }
}
