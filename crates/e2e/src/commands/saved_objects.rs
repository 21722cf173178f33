use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::browser::Page;
use crate::commands::Commands;
use crate::error::{E2eError, E2eResult};
use crate::poll::await_condition;
use crate::selector::Selector;

pub const SAVED_OBJECTS_PATH: &str = "/app/objects";
pub const IMPORT_OBJECTS: &str = "importObjects";
pub const IMPORT_FLYOUT: &str = "importSavedObjectsFlyout";
pub const FILE_INPUT: &str = r#"input[type="file"]"#;
pub const DATA_SOURCE_COMBO: &str = "dataSourceSelectorComboBox";
pub const CREATE_NEW_COPIES: &str = "savedObjectsManagement-importModeControl-createNewCopiesEnabled";
pub const CHECK_CONFLICTS: &str = "savedObjectsManagement-importModeControl-createNewCopiesDisabled";
pub const OVERWRITE_ENABLED: &str = "savedObjectsManagement-importModeControl-overwriteEnabled";
pub const OVERWRITE_DISABLED: &str = "savedObjectsManagement-importModeControl-overwriteDisabled";
pub const IMPORT_BUTTON: &str = "importSavedObjectsImportBtn";
pub const CONFIRM_BUTTON: &str = "confirmModalConfirmButton";
pub const DONE_BUTTON: &str = "importSavedObjectsDoneBtn";
pub const RESULT_ROW: &str = "importSavedObjectsRow";
pub const RESULT_TITLE: &str = "importSavedObjectsTitle";
pub const NEW_BADGE: &str = "importSavedObjectsNewBadge";
pub const ERROR_PREFIX: &str = "importSavedObjectsError";
pub const DANGER_CALLOUT: &str = ".euiCallOut--danger";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Assign fresh ids to every imported object
    CreateNewCopies,
    /// Keep ids and resolve conflicts with existing objects
    #[default]
    CheckConflicts,
}

/// Options of the saved-object import flyout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSavedObjects {
    /// Export file (`.ndjson`) to upload
    pub file: PathBuf,

    /// Title of the data source to import into
    #[serde(default)]
    pub data_source: Option<String>,

    #[serde(default)]
    pub mode: ImportMode,

    /// Overwrite conflicting objects without asking (conflict-check mode only)
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

fn default_overwrite() -> bool {
    true
}

impl ImportSavedObjects {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            data_source: None,
            mode: ImportMode::default(),
            overwrite: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedObject {
    pub title: String,
    /// Marked as a newly created copy in the import summary
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub confirmations: u32,
    pub objects: Vec<ImportedObject>,
}

enum ImportStage<E> {
    Done,
    Confirm(E),
}

impl<'a, P: Page> Commands<'a, P> {
    /// Import a saved-object export through the management UI.
    ///
    /// Conflict confirmations are dismissed one at a time as they appear, up to
    /// `max_import_confirmations`; the import must then reach its summary with
    /// no error callout left in the flyout. Result rows are not inspected, so
    /// object titles never count as errors.
    pub async fn import_saved_objects(&self, options: &ImportSavedObjects) -> E2eResult<ImportReport> {
        self.record(
            "importSavedObjects",
            "import",
            format!(
                "{} ({:?}, overwrite: {}, data source: {})",
                options.file.display(),
                options.mode,
                options.overwrite,
                options.data_source.as_deref().unwrap_or("default")
            ),
        );
        let cmds = self.quiet();

        cmds.get_by_test_id(IMPORT_OBJECTS).await?.click().await?;
        cmds.get(Selector::css(FILE_INPUT)).await?.upload(&options.file).await?;

        if let Some(title) = &options.data_source {
            let combo = cmds.get_by_test_id(DATA_SOURCE_COMBO).await?;
            cmds.fill_combo_box(&combo, title).await?;
        }

        match options.mode {
            ImportMode::CreateNewCopies => {
                cmds.get_by_test_id(CREATE_NEW_COPIES).await?.click().await?;
            }
            ImportMode::CheckConflicts => {
                cmds.get_by_test_id(CHECK_CONFLICTS).await?.click().await?;
                let overwrite = if options.overwrite {
                    OVERWRITE_ENABLED
                } else {
                    OVERWRITE_DISABLED
                };
                cmds.get_by_test_id(overwrite).await?.click().await?;
            }
        }

        cmds.get_by_test_id(IMPORT_BUTTON).await?.click().await?;

        let max = self.config().max_import_confirmations;
        let mut confirmations = 0;
        loop {
            match cmds.next_import_stage().await? {
                ImportStage::Done => break,
                ImportStage::Confirm(button) => {
                    if confirmations >= max {
                        return Err(E2eError::AssertionFailed(format!(
                            "import still asking for confirmation after {max} dialogs"
                        )));
                    }
                    self.page().click(&button).await?;
                    confirmations += 1;
                }
            }
        }

        let objects = cmds.import_summary().await?;

        let errors = cmds.import_errors().await?;
        if !errors.is_empty() {
            return Err(E2eError::AssertionFailed(format!(
                "import summary reports an error: {}",
                errors.join("; ")
            )));
        }

        cmds.get_by_test_id(DONE_BUTTON).await?.click().await?;

        Ok(ImportReport {
            confirmations,
            objects,
        })
    }

    /// Wait until the import either finished or shows a confirmation dialog
    async fn next_import_stage(&self) -> E2eResult<ImportStage<P::Element>> {
        let page = self.page();
        let done = &Selector::test_subj(DONE_BUTTON);
        let confirm = &Selector::test_subj(CONFIRM_BUTTON);

        await_condition(self.poll_options(), move || async move {
            for element in page.query(None, done).await? {
                if page.is_displayed(&element).await? {
                    return Ok(Some(ImportStage::Done));
                }
            }
            for element in page.query(None, confirm).await? {
                if page.is_displayed(&element).await? {
                    return Ok(Some(ImportStage::Confirm(element)));
                }
            }
            Ok(None)
        })
        .await?
        .settled("saved object import to finish")
    }

    /// Texts of the visible error elements inside the import flyout
    async fn import_errors(&self) -> E2eResult<Vec<String>> {
        let page = self.page();
        let flyouts = self.query_now(&Selector::test_subj(IMPORT_FLYOUT)).await?;
        let Some(flyout) = flyouts.into_iter().next() else {
            return Ok(Vec::new());
        };

        let mut errors = Vec::new();
        for selector in [Selector::test_subj_prefix(ERROR_PREFIX), Selector::css(DANGER_CALLOUT)] {
            for element in page.query(Some(&flyout), &selector).await? {
                if page.is_displayed(&element).await? {
                    errors.push(page.text(&element).await?.trim().to_string());
                }
            }
        }
        Ok(errors)
    }

    async fn import_summary(&self) -> E2eResult<Vec<ImportedObject>> {
        let mut objects = Vec::new();
        for row in self.query_now(&Selector::test_subj(RESULT_ROW)).await? {
            let title = match self
                .page()
                .query(Some(&row), &Selector::test_subj(RESULT_TITLE))
                .await?
                .first()
            {
                Some(title) => self.page().text(title).await?,
                None => self.page().text(&row).await?,
            };
            let is_new = !self
                .page()
                .query(Some(&row), &Selector::test_subj(NEW_BADGE))
                .await?
                .is_empty();
            objects.push(ImportedObject {
                title: title.trim().to_string(),
                is_new,
            });
        }
        Ok(objects)
    }
}
