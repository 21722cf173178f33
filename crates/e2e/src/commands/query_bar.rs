use serde::{Deserialize, Serialize};

use crate::browser::Page;
use crate::commands::{Commands, Located};
use crate::error::E2eResult;
use crate::selector::Selector;

pub const QUERY_INPUT: &str = "queryInput";
pub const LANGUAGE_BUTTON: &str = "switchQueryLanguageButton";
pub const LANGUAGE_TOGGLE: &str = "languageToggle";
pub const ADD_FILTER: &str = "addFilter";
pub const FILTER_FIELD: &str = "filterFieldSuggestionList";
pub const FILTER_OPERATOR: &str = "filterOperatorList";
pub const FILTER_PARAMS_PREFIX: &str = "filterParams";
pub const SAVE_FILTER: &str = "saveFilter";
pub const CANCEL_FILTER: &str = "cancelSaveFilter";
pub const EDIT_FILTER: &str = "editFilter";
pub const COMBO_BOX_INPUT: &str = "comboBoxSearchInput";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryLanguage {
    Dql,
    Lucene,
}

impl QueryLanguage {
    /// Label shown on the language switch
    pub fn label(&self) -> &'static str {
        match self {
            QueryLanguage::Dql => "DQL",
            QueryLanguage::Lucene => "Lucene",
        }
    }
}

/// Filter as shown by its editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSnapshot {
    pub label: String,
    pub field: String,
    pub operator: String,
    pub value: String,
}

/// Test subject fragment of a rendered filter pill for `field`
pub fn filter_pill(field: &str) -> Selector {
    Selector::test_subj_contains(format!("filter-key-{field}"))
}

impl<'a, P: Page> Commands<'a, P> {
    /// Type a query into the query bar, optionally switching language and submitting it
    pub async fn set_top_nav_query(
        &self,
        query: &str,
        submit: bool,
        language: Option<QueryLanguage>,
    ) -> E2eResult<()> {
        self.record("setTopNavQuery", "set query", query);
        let cmds = self.quiet();

        if let Some(language) = language {
            cmds.set_query_language(language).await?;
        }

        let input = cmds.get_by_test_id(QUERY_INPUT).await?;
        input.clear().await?;
        input.type_text(query).await?;

        if submit {
            cmds.update_top_nav().await?;
            cmds.wait_for_search().await?;
        }
        Ok(())
    }

    /// Switch the query bar between DQL and Lucene
    pub async fn set_query_language(&self, language: QueryLanguage) -> E2eResult<()> {
        self.record("setQueryLanguage", "language", language.label());
        let cmds = self.quiet();

        let button = cmds.get_by_test_id(LANGUAGE_BUTTON).await?;
        if button.text().await?.trim() == language.label() {
            return Ok(());
        }
        button.click().await?;
        cmds.get_by_test_id(LANGUAGE_TOGGLE).await?.click().await?;
        cmds.contains(Selector::test_subj(LANGUAGE_BUTTON), language.label())
            .await?;
        Ok(())
    }

    /// Add a filter through the filter editor popover and wait for its pill.
    ///
    /// An empty `value` skips the params editor (operators such as "exists").
    pub async fn submit_filter_from_dropdown(
        &self,
        field: &str,
        operator: &str,
        value: &str,
    ) -> E2eResult<Located<'a, P>> {
        self.record(
            "submitFilterFromDropDown",
            "filter",
            format!("{field} {operator} {value}"),
        );
        let cmds = self.quiet();

        cmds.get_by_test_id(ADD_FILTER).await?.click().await?;

        let field_box = cmds.wait_for_present(Selector::test_subj(FILTER_FIELD)).await?;
        cmds.fill_combo_box(&field_box, field).await?;

        let operator_box = cmds.wait_for_present(Selector::test_subj(FILTER_OPERATOR)).await?;
        cmds.fill_combo_box(&operator_box, operator).await?;

        if !value.is_empty() {
            let params = cmds
                .wait_for_present(Selector::test_subj_prefix(FILTER_PARAMS_PREFIX))
                .await?
                .last()?;
            cmds.fill_combo_box(&params, value).await?;
        }

        cmds.get_by_test_id(SAVE_FILTER).await?.click().await?;
        cmds.wait_for_loader(false).await?;
        cmds.get(filter_pill(field)).await
    }

    /// Reopen the editor of the pill for `field` and read back what it holds
    pub async fn read_filter(&self, field: &str) -> E2eResult<FilterSnapshot> {
        self.record("readFilter", "filter", field);
        let cmds = self.quiet();

        let pill = cmds.get(filter_pill(field)).await?;
        let label = pill.text().await?.trim().to_string();
        pill.click().await?;
        cmds.get_by_test_id(EDIT_FILTER).await?.click().await?;

        let field_value = cmds.combo_box_text(Selector::test_subj(FILTER_FIELD)).await?;
        let operator = cmds.combo_box_text(Selector::test_subj(FILTER_OPERATOR)).await?;
        let value = match cmds.query_now(&Selector::test_subj_prefix(FILTER_PARAMS_PREFIX)).await?.last() {
            Some(params) => self.page().text(params).await?.trim().to_string(),
            None => String::new(),
        };

        cmds.get_by_test_id(CANCEL_FILTER).await?.click().await?;

        Ok(FilterSnapshot {
            label,
            field: field_value,
            operator,
            value,
        })
    }

    /// Type into a combo box's search input and commit with Enter
    pub(crate) async fn fill_combo_box(&self, combo: &Located<'a, P>, text: &str) -> E2eResult<()> {
        combo.click().await?;
        let scope = combo.elements().first();
        let inner = match scope {
            Some(scope) => {
                self.page()
                    .query(Some(scope), &Selector::test_subj(COMBO_BOX_INPUT))
                    .await?
            }
            None => Vec::new(),
        };

        match inner.into_iter().next() {
            Some(input) => {
                self.page().type_text(&input, text).await?;
                self.page().press_enter(&input).await?;
            }
            None => {
                combo.type_text(text).await?;
                combo.press_enter().await?;
            }
        }
        Ok(())
    }

    async fn combo_box_text(&self, selector: Selector) -> E2eResult<String> {
        let combo = self.get(selector).await?;
        if let Some(value) = combo.value().await? {
            if !value.is_empty() {
                return Ok(value);
            }
        }
        Ok(combo.text().await?.trim().to_string())
    }
}
