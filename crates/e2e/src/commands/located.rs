use std::path::Path;

use crate::browser::Page;
use crate::commands::Commands;
use crate::error::{E2eError, E2eResult};
use crate::poll::await_condition;
use crate::selector::Selector;

/// Elements produced by a lookup, the subject of the next command.
///
/// Actions work on the first element; narrow with [`Located::last`] or
/// [`Located::eq`] first when a lookup matches several.
pub struct Located<'a, P: Page> {
    cmds: Commands<'a, P>,
    description: String,
    elements: Vec<P::Element>,
}

impl<'a, P: Page> Clone for Located<'a, P> {
    fn clone(&self) -> Self {
        Self {
            cmds: self.cmds,
            description: self.description.clone(),
            elements: self.elements.clone(),
        }
    }
}

impl<'a, P: Page> std::fmt::Debug for Located<'a, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Located")
            .field("description", &self.description)
            .field("elements", &self.elements)
            .finish()
    }
}

impl<'a, P: Page> Located<'a, P> {
    pub(crate) fn new(cmds: Commands<'a, P>, description: String, elements: Vec<P::Element>) -> Self {
        Self {
            cmds,
            description,
            elements,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn elements(&self) -> &[P::Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn first(self) -> E2eResult<Self> {
        self.eq(0)
    }

    pub fn last(self) -> E2eResult<Self> {
        match self.elements.len() {
            0 => Err(E2eError::ElementNotFound(self.description)),
            n => self.eq(n - 1),
        }
    }

    /// Narrow to the element at `index`
    pub fn eq(self, index: usize) -> E2eResult<Self> {
        match self.elements.get(index) {
            Some(element) => Ok(Self {
                cmds: self.cmds,
                description: format!("{}[{}]", self.description, index),
                elements: vec![element.clone()],
            }),
            None => Err(E2eError::ElementNotFound(format!(
                "{}[{}] (only {} matched)",
                self.description,
                index,
                self.elements.len()
            ))),
        }
    }

    fn subject(&self) -> E2eResult<&P::Element> {
        self.elements
            .first()
            .ok_or_else(|| E2eError::ElementNotFound(self.description.clone()))
    }

    /// Poll for descendants of the first element
    pub async fn find(&self, selector: Selector) -> E2eResult<Located<'a, P>> {
        let scope = self.subject()?;
        self.cmds.locate(Some(scope), selector, None).await
    }

    /// Poll for descendants of the first element whose text contains `text`
    pub async fn find_containing(&self, selector: Selector, text: &str) -> E2eResult<Located<'a, P>> {
        let scope = self.subject()?;
        self.cmds.locate(Some(scope), selector, Some(text)).await
    }

    /// Nearest ancestor-or-self of the first element matching `selector`
    pub async fn closest(&self, selector: Selector) -> E2eResult<Located<'a, P>> {
        let element = self.subject()?;
        match self.cmds.page().closest(element, &selector).await? {
            Some(found) => Ok(Located::new(
                self.cmds,
                format!("{} < {}", self.description, selector),
                vec![found],
            )),
            None => Err(E2eError::ElementNotFound(format!(
                "no ancestor {} of {}",
                selector, self.description
            ))),
        }
    }

    pub async fn click(&self) -> E2eResult<&Self> {
        self.cmds.page().click(self.subject()?).await?;
        Ok(self)
    }

    pub async fn type_text(&self, text: &str) -> E2eResult<&Self> {
        self.cmds.page().type_text(self.subject()?, text).await?;
        Ok(self)
    }

    pub async fn press_enter(&self) -> E2eResult<&Self> {
        self.cmds.page().press_enter(self.subject()?).await?;
        Ok(self)
    }

    pub async fn clear(&self) -> E2eResult<&Self> {
        self.cmds.page().clear(self.subject()?).await?;
        Ok(self)
    }

    pub async fn upload(&self, path: &Path) -> E2eResult<&Self> {
        self.cmds.page().upload(self.subject()?, path).await?;
        Ok(self)
    }

    pub async fn text(&self) -> E2eResult<String> {
        self.cmds.page().text(self.subject()?).await
    }

    pub async fn value(&self) -> E2eResult<Option<String>> {
        self.cmds.page().value(self.subject()?).await
    }

    pub async fn attribute(&self, name: &str) -> E2eResult<Option<String>> {
        self.cmds.page().attribute(self.subject()?, name).await
    }

    pub async fn css_value(&self, name: &str) -> E2eResult<String> {
        self.cmds.page().css_value(self.subject()?, name).await
    }

    pub async fn is_displayed(&self) -> E2eResult<bool> {
        self.cmds.page().is_displayed(self.subject()?).await
    }

    /// Poll until the trimmed text equals `expected`
    pub async fn should_have_text(&self, expected: &str) -> E2eResult<&Self> {
        self.should_text(expected, |actual| actual.trim() == expected, "to equal")
            .await
    }

    /// Poll until the text contains `expected`
    pub async fn should_contain_text(&self, expected: &str) -> E2eResult<&Self> {
        self.should_text(expected, |actual| actual.contains(expected), "to contain")
            .await
    }

    async fn should_text<F>(&self, expected: &str, check: F, verb: &str) -> E2eResult<&Self>
    where
        F: Fn(&str) -> bool,
    {
        let page = self.cmds.page();
        let element = self.subject()?;
        let check = &check;
        let last = &parking_lot::Mutex::new(String::new());

        let outcome = await_condition(self.cmds.poll_options(), move || async move {
            let actual = page.text(element).await?;
            let held = check(&actual);
            *last.lock() = actual;
            Ok(held.then_some(()))
        })
        .await?;

        if outcome.is_settled() {
            return Ok(self);
        }
        Err(E2eError::AssertionFailed(format!(
            "expected text of {} {} '{}', found '{}'",
            self.description,
            verb,
            expected,
            last.lock().trim()
        )))
    }
}
