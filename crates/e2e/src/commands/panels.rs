use crate::browser::Page;
use crate::commands::{Commands, Located};
use crate::error::E2eResult;
use crate::selector::Selector;

pub const PANEL: &str = "embeddablePanel";
pub const PANEL_TITLE: &str = "dashboardPanelTitle";
pub const PANEL_MENU_TOGGLE: &str = "embeddablePanelToggleMenuIcon";
pub const PANEL_MENU: &str = "embeddablePanelContextMenuOpen";
pub const PANEL_ACTION_PREFIX: &str = "embeddablePanelAction-";

impl<'a, P: Page> Commands<'a, P> {
    /// Dashboard panel whose title contains `title`
    pub async fn vis_panel_by_title(&self, title: &str) -> E2eResult<Located<'a, P>> {
        self.record("getVisPanelByTitle", "panel", title);
        self.quiet()
            .contains(Selector::test_subj(PANEL_TITLE), title)
            .await?
            .first()?
            .closest(Selector::test_subj(PANEL))
            .await
    }

    /// Open the context menu of `panel` and return the open menu
    pub async fn open_panel_menu(&self, panel: &Located<'a, P>) -> E2eResult<Located<'a, P>> {
        self.record("openVisContextMenu", "panel menu", panel.description());
        panel
            .find(Selector::test_subj(PANEL_MENU_TOGGLE))
            .await?
            .click()
            .await?;
        self.quiet().wait_for_present(Selector::test_subj(PANEL_MENU)).await
    }

    /// Click the entry of the open panel menu labelled `item`
    pub async fn click_panel_menu_item(&self, item: &str) -> E2eResult<()> {
        self.record("clickVisPanelMenuItem", "panel menu item", item);
        let cmds = self.quiet();
        let menu = cmds.wait_for_present(Selector::test_subj(PANEL_MENU)).await?;
        menu.find_containing(Selector::test_subj_prefix(PANEL_ACTION_PREFIX), item)
            .await?
            .first()?
            .click()
            .await?;
        Ok(())
    }
}
