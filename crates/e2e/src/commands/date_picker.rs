use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::browser::Page;
use crate::commands::Commands;
use crate::error::{E2eError, E2eResult};
use crate::poll::retry_bounded;
use crate::selector::Selector;

pub const SHOW_DATES_BUTTON: &str = "superDatePickerShowDatesButton";
pub const START_DATE_BUTTON: &str = "superDatePickerstartDatePopoverButton";
pub const END_DATE_BUTTON: &str = "superDatePickerendDatePopoverButton";
pub const ABSOLUTE_TAB: &str = "superDatePickerAbsoluteTab";
pub const ABSOLUTE_DATE_INPUT: &str = "superDatePickerAbsoluteDateInput";
pub const QUERY_SUBMIT_BUTTON: &str = "querySubmitButton";

/// Absolute date format rendered by the picker, e.g. `Sep 19, 2015 @ 06:31:44.000`
pub const DATE_FORMAT: &str = "%b %-d, %Y @ %H:%M:%S%.3f";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Range between two timestamps in the picker's display format
    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self::new(start.format(DATE_FORMAT).to_string(), end.format(DATE_FORMAT).to_string())
    }

    /// Parse one side of the range back into a timestamp
    pub fn parse_side(value: &str) -> E2eResult<NaiveDateTime> {
        NaiveDateTime::parse_from_str(value.trim(), "%b %d, %Y @ %H:%M:%S%.3f")
            .map_err(|e| E2eError::AssertionFailed(format!("'{value}' is not a picker date: {e}")))
    }

    /// Absolute ranges re-rendered in the picker's display format; relative
    /// ranges such as `now-15m` stay as written
    pub fn normalized(&self) -> Self {
        match (Self::parse_side(&self.start), Self::parse_side(&self.end)) {
            (Ok(start), Ok(end)) => Self::between(start, end),
            _ => self.clone(),
        }
    }
}

impl<'a, P: Page> Commands<'a, P> {
    /// Set the absolute start and end of the super date picker.
    ///
    /// The picker re-renders while the page settles, so a failed lookup
    /// restarts the whole sequence, up to `date_picker_retries` times.
    pub async fn set_top_nav_date(&self, start: &str, end: &str, submit: bool) -> E2eResult<()> {
        self.record(
            "setTopNavDate",
            "set date",
            format!("Start: {start} :: End: {end}"),
        );

        let cmds = self.quiet();
        retry_bounded(
            self.config().date_picker_retries,
            "set top nav date",
            move |_| async move {
                cmds.expand_date_picker().await?;
                cmds.set_absolute_date(START_DATE_BUTTON, start).await?;
                cmds.set_absolute_date(END_DATE_BUTTON, end).await?;
                if submit {
                    cmds.update_top_nav().await?;
                }
                Ok(())
            },
        )
        .await
    }

    /// Read the range currently shown by the picker
    pub async fn top_nav_date(&self) -> E2eResult<DateRange> {
        let quiet = self.quiet();
        let start = quiet.get_by_test_id(START_DATE_BUTTON).await?.last()?.text().await?;
        let end = quiet.get_by_test_id(END_DATE_BUTTON).await?.last()?.text().await?;
        Ok(DateRange::new(start.trim(), end.trim()))
    }

    /// Click the query bar's update button
    pub async fn update_top_nav(&self) -> E2eResult<()> {
        self.record("updateTopNav", "update", "submit query bar");
        self.quiet()
            .get_by_test_id(QUERY_SUBMIT_BUTTON)
            .await?
            .click()
            .await?;
        Ok(())
    }

    async fn expand_date_picker(&self) -> E2eResult<()> {
        // Collapsed pickers show a single "show dates" button instead of start/end.
        for element in self.query_now(&Selector::test_subj(SHOW_DATES_BUTTON)).await? {
            if self.page().is_displayed(&element).await? {
                self.page().click(&element).await?;
                break;
            }
        }
        Ok(())
    }

    async fn set_absolute_date(&self, popover_button: &str, value: &str) -> E2eResult<()> {
        self.get_by_test_id(popover_button).await?.last()?.click().await?;
        self.get_by_test_id(ABSOLUTE_TAB).await?.last()?.click().await?;

        let input = self.get_by_test_id(ABSOLUTE_DATE_INPUT).await?.last()?;
        input.click().await?;
        input.clear().await?;
        input.type_text(value).await?;
        input.press_enter().await?;
        Ok(())
    }
}
