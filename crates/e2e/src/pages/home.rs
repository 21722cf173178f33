use crate::browser::Page;
use crate::commands::Commands;
use crate::error::E2eResult;
use crate::selector::Selector;

pub const HOME_PATH: &str = "/app/home";
pub const SAMPLE_DATA_PATH: &str = "/app/home#/tutorial_directory/sampleData";

/// Button that installs the sample data set `id`
pub fn add_sample_data_button(id: &str) -> Selector {
    Selector::test_subj(format!("addSampleDataSet{id}"))
}

/// Button shown in place of the add button once `id` is installed
pub fn remove_sample_data_button(id: &str) -> Selector {
    Selector::test_subj(format!("removeSampleDataSet{id}"))
}

/// Dashboards home and its sample data tab
pub struct HomePage<'a, P: Page> {
    cmds: Commands<'a, P>,
}

impl<'a, P: Page> HomePage<'a, P> {
    pub fn new(cmds: Commands<'a, P>) -> Self {
        Self { cmds }
    }

    pub async fn visit(&self) -> E2eResult<()> {
        self.cmds.visit(HOME_PATH).await?;
        self.cmds.quiet().wait_for_loader(false).await
    }

    pub async fn open_sample_data(&self) -> E2eResult<()> {
        self.cmds.visit(SAMPLE_DATA_PATH).await?;
        self.cmds.quiet().wait_for_loader(false).await
    }

    /// Install sample data set `id` (`flights`, `ecommerce`, `logs`) unless it already is
    pub async fn add_sample_data(&self, id: &str) -> E2eResult<()> {
        self.cmds.record("addSampleData", "sample data", id);
        if self.sample_data_installed(id).await? {
            return Ok(());
        }
        let quiet = self.cmds.quiet();
        quiet.get(add_sample_data_button(id)).await?.click().await?;
        quiet.get(remove_sample_data_button(id)).await?;
        Ok(())
    }

    /// Whether the sample data card for `id` offers removal right now
    pub async fn sample_data_installed(&self, id: &str) -> E2eResult<bool> {
        Ok(!self
            .cmds
            .query_now(&remove_sample_data_button(id))
            .await?
            .is_empty())
    }
}
