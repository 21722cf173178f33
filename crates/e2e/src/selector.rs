//! Element selectors built on the `data-test-subj` tagging convention
//!
//! Specs write selectors as strings:
//!
//! - `subj=queryInput` matches `[data-test-subj="queryInput"]`
//! - `subj^=filterParamsComboBox` matches a test subject prefix
//! - `subj*=filter-key-extension` matches a test subject fragment
//! - anything else is passed through as CSS

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{E2eError, E2eResult};

/// DOM attribute carrying stable test identifiers
pub const TEST_SUBJ_ATTR: &str = "data-test-subj";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Selector {
    TestSubj(String),
    TestSubjPrefix(String),
    TestSubjContains(String),
    Css(String),
}

impl Selector {
    pub fn test_subj(id: impl Into<String>) -> Self {
        Selector::TestSubj(id.into())
    }

    pub fn test_subj_prefix(prefix: impl Into<String>) -> Self {
        Selector::TestSubjPrefix(prefix.into())
    }

    pub fn test_subj_contains(fragment: impl Into<String>) -> Self {
        Selector::TestSubjContains(fragment.into())
    }

    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css(css.into())
    }

    pub fn parse(raw: &str) -> E2eResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(E2eError::SpecParse("empty selector".to_string()));
        }

        let parsed = if let Some(rest) = raw.strip_prefix("subj^=") {
            Selector::TestSubjPrefix(rest.to_string())
        } else if let Some(rest) = raw.strip_prefix("subj*=") {
            Selector::TestSubjContains(rest.to_string())
        } else if let Some(rest) = raw.strip_prefix("subj=") {
            Selector::TestSubj(rest.to_string())
        } else {
            Selector::Css(raw.to_string())
        };

        match &parsed {
            Selector::TestSubj(v) | Selector::TestSubjPrefix(v) | Selector::TestSubjContains(v)
                if v.is_empty() =>
            {
                Err(E2eError::SpecParse(format!("selector '{raw}' has no test subject")))
            }
            _ => Ok(parsed),
        }
    }

    /// CSS form understood by the browser
    pub fn to_css(&self) -> String {
        match self {
            Selector::TestSubj(v) => format!("[{TEST_SUBJ_ATTR}=\"{}\"]", escape(v)),
            Selector::TestSubjPrefix(v) => format!("[{TEST_SUBJ_ATTR}^=\"{}\"]", escape(v)),
            Selector::TestSubjContains(v) => format!("[{TEST_SUBJ_ATTR}*=\"{}\"]", escape(v)),
            Selector::Css(css) => css.clone(),
        }
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::TestSubj(v) => write!(f, "subj={v}"),
            Selector::TestSubjPrefix(v) => write!(f, "subj^={v}"),
            Selector::TestSubjContains(v) => write!(f, "subj*={v}"),
            Selector::Css(css) => f.write_str(css),
        }
    }
}

impl TryFrom<String> for Selector {
    type Error = E2eError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Selector::parse(&value)
    }
}

impl From<Selector> for String {
    fn from(value: Selector) -> Self {
        value.to_string()
    }
}
