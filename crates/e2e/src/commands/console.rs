use once_cell::sync::Lazy;
use regex::Regex;

use crate::browser::Page;
use crate::commands::Commands;
use crate::error::{E2eError, E2eResult};
use crate::selector::Selector;

pub const CONSOLE_PATH: &str = "/app/dev_tools#/console";
pub const SETTINGS_BUTTON: &str = "consoleSettingsButton";
pub const FONT_SIZE_INPUT: &str = "setting-font-size-input";
pub const SAVE_SETTINGS: &str = "settings-save-button";
pub const EDITOR: &str = "#ConAppEditor";

static PX: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)px\s*$").ok());

/// Parse a computed CSS length such as `20px`
pub fn parse_px(value: &str) -> E2eResult<u32> {
    PX.as_ref()
        .and_then(|re| re.captures(value))
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(|px| px.round() as u32)
        .ok_or_else(|| E2eError::AssertionFailed(format!("'{value}' is not a px length")))
}

impl<'a, P: Page> Commands<'a, P> {
    /// Change the console editor font size through the settings modal
    pub async fn set_console_font_size(&self, size: u32) -> E2eResult<()> {
        self.record("setConsoleFontSize", "font size", size.to_string());
        let cmds = self.quiet();

        cmds.get_by_test_id(SETTINGS_BUTTON).await?.click().await?;
        let input = cmds.get_by_test_id(FONT_SIZE_INPUT).await?;
        input.clear().await?;
        input.type_text(&size.to_string()).await?;
        cmds.get_by_test_id(SAVE_SETTINGS).await?.click().await?;
        cmds.wait_for_absent(Selector::test_subj(FONT_SIZE_INPUT)).await
    }

    /// Rendered font size of the console editor in px
    pub async fn console_font_size(&self) -> E2eResult<u32> {
        let editor = self.quiet().get(Selector::css(EDITOR)).await?;
        parse_px(&editor.css_value("font-size").await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("20px", 20)]
    #[test_case(" 24px ", 24)]
    #[test_case("13.5px", 14)]
    fn test_parse_px(input: &str, expected: u32) {
        assert_eq!(parse_px(input).unwrap(), expected);
    }

    #[test_case("")]
    #[test_case("1.2em")]
    #[test_case("px")]
    fn test_parse_px_rejects(input: &str) {
        assert!(parse_px(input).is_err());
    }
}
