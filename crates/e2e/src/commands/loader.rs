use crate::browser::Page;
use crate::commands::Commands;
use crate::error::E2eResult;
use crate::selector::Selector;

/// Global progress bar rendered while the app fetches data
pub const LOADING_INDICATOR: &str = "globalLoadingIndicator";

/// Rendered once the header has finished loading with the new navigation
pub const RECENT_ITEMS_BUTTON: &str = "recentItemsSectionButton";

/// Discover hit counter
pub const QUERY_HITS: &str = "discoverQueryHits";

impl<'a, P: Page> Commands<'a, P> {
    /// Block until the page has finished loading.
    ///
    /// Sleeps the configured loader buffer, then waits for the global loading
    /// indicator to go away, or with the enhanced navigation for the recent
    /// items control to render.
    pub async fn wait_for_loader(&self, enhancements: bool) -> E2eResult<()> {
        self.record("waitForLoader", "wait", "page load");

        let buffer = self.config().timeouts.loader_buffer();
        if !buffer.is_zero() {
            tokio::time::sleep(buffer).await;
        }

        let quiet = self.quiet();
        if enhancements {
            quiet
                .wait_for_present(Selector::test_subj(RECENT_ITEMS_BUTTON))
                .await
                .map(|_| ())
        } else {
            quiet.wait_for_absent(Selector::test_subj(LOADING_INDICATOR)).await
        }
    }

    /// Block until a submitted search has rendered its hit counter
    pub async fn wait_for_search(&self) -> E2eResult<()> {
        self.record("waitForSearch", "wait", "search results");

        let quiet = self.quiet();
        quiet.wait_for_absent(Selector::test_subj(LOADING_INDICATOR)).await?;
        quiet.wait_for_present(Selector::test_subj(QUERY_HITS)).await?;
        Ok(())
    }

    /// Trimmed text of the Discover hit counter
    pub async fn query_hits(&self) -> E2eResult<String> {
        let hits = self.quiet().get_by_test_id(QUERY_HITS).await?;
        Ok(hits.text().await?.trim().to_string())
    }
}
