//! Sign-in screen

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use super::Navigable;
use crate::driver::{Locator, Page};
use crate::error::E2eResult;
use crate::expect::{expect_text_contains, expect_url_matches, expect_visible};

pub struct LoginPage {
    page: Arc<dyn Page>,
}

impl LoginPage {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn email_input() -> Locator {
        Locator::placeholder("Email")
    }

    pub fn password_input() -> Locator {
        Locator::placeholder("Password")
    }

    pub fn submit_button() -> Locator {
        Locator::role_named("button", "Sign in")
    }

    pub fn error_message() -> Locator {
        Locator::css(".el-form-item__error, .el-message--error")
    }

    /// Button in the header showing the signed-in user
    pub fn user_button(username: &str) -> Locator {
        Locator::role_named("button", username)
    }

    pub async fn login(&self, email: &str, password: &str) -> E2eResult<()> {
        self.page.fill(&Self::email_input(), email).await?;
        self.page.fill(&Self::password_input(), password).await?;
        self.page.click(&Self::submit_button()).await
    }

    /// Landed on the serverless dashboard with the user menu rendered
    pub async fn check_logged_in(&self, username: &str, timeout: Duration) -> E2eResult<()> {
        let landing = Regex::new(r"/serverless")?;
        expect_url_matches(self.page.as_ref(), &landing, timeout).await?;
        expect_visible(self.page.as_ref(), &Self::user_button(username), timeout).await
    }

    pub async fn check_login_rejected(&self, timeout: Duration) -> E2eResult<()> {
        expect_visible(self.page.as_ref(), &Self::error_message(), timeout).await?;
        expect_text_contains(self.page.as_ref(), &Self::error_message(), "Invalid", timeout).await
    }
}

impl Navigable for LoginPage {
    fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    fn path(&self) -> &str {
        "/login"
    }
}
