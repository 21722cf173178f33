use crate::browser::Page;
use crate::commands::Commands;
use crate::config::Credentials;
use crate::error::E2eResult;

pub const LOGIN_PATH: &str = "/app/login";
pub const USERNAME_INPUT: &str = "user-name";
pub const PASSWORD_INPUT: &str = "password";
pub const SUBMIT_BUTTON: &str = "submit";

/// Security plugin login form
pub struct LoginPage<'a, P: Page> {
    cmds: Commands<'a, P>,
}

impl<'a, P: Page> LoginPage<'a, P> {
    pub fn new(cmds: Commands<'a, P>) -> Self {
        Self { cmds }
    }

    pub async fn visit(&self) -> E2eResult<()> {
        self.cmds.visit(LOGIN_PATH).await
    }

    pub async fn enter_username(&self, username: &str) -> E2eResult<()> {
        let input = self.cmds.quiet().get_by_test_id(USERNAME_INPUT).await?;
        input.clear().await?;
        input.type_text(username).await?;
        Ok(())
    }

    pub async fn enter_password(&self, password: &str) -> E2eResult<()> {
        let input = self.cmds.quiet().get_by_test_id(PASSWORD_INPUT).await?;
        input.clear().await?;
        input.type_text(password).await?;
        Ok(())
    }

    pub async fn submit(&self) -> E2eResult<()> {
        self.cmds.quiet().get_by_test_id(SUBMIT_BUTTON).await?.click().await?;
        Ok(())
    }

    /// Full login: open the form, fill both fields, submit and wait for the app shell
    pub async fn login(&self, credentials: &Credentials) -> E2eResult<()> {
        self.cmds.record("login", "login", &credentials.username);
        self.visit().await?;
        self.enter_username(&credentials.username).await?;
        self.enter_password(&credentials.password).await?;
        self.submit().await?;
        self.cmds.quiet().wait_for_loader(false).await
    }
}
