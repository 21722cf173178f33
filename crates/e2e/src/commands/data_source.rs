use crate::browser::Page;
use crate::commands::Commands;
use crate::error::E2eResult;
use crate::selector::Selector;

pub const DATA_SOURCE_BUTTON: &str = "dataSourceSelectableButton";
pub const DATA_SOURCE_POPOVER: &str = "dataSourceSelectableContextMenuPopover";
pub const OPTION: &str = r#"[role="option"]"#;

impl<'a, P: Page> Commands<'a, P> {
    /// Pick `title` in the data source selectable and wait for the button to show it
    pub async fn select_data_source(&self, title: &str) -> E2eResult<()> {
        self.record("selectDataSource", "data source", title);
        let cmds = self.quiet();

        cmds.get_by_test_id(DATA_SOURCE_BUTTON).await?.click().await?;
        let popover = cmds
            .wait_for_present(Selector::test_subj(DATA_SOURCE_POPOVER))
            .await?;
        popover
            .find_containing(Selector::css(OPTION), title)
            .await?
            .first()?
            .click()
            .await?;

        cmds.contains(Selector::test_subj(DATA_SOURCE_BUTTON), title)
            .await?;
        Ok(())
    }
}
