//! Team management

use std::sync::Arc;
use std::time::Duration;

use super::{confirm_box_ok, dialog, open_dialog, table_row, toast, Navigable};
use crate::driver::{Locator, Page};
use crate::error::{E2eError, E2eResult};
use crate::expect::{expect_hidden, expect_text_contains, expect_visible};

pub struct TeamsPage {
    page: Arc<dyn Page>,
}

impl TeamsPage {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn create_button() -> Locator {
        Locator::role_named("button", "Create Team")
    }

    pub fn name_input() -> Locator {
        Locator::placeholder("Team name")
    }

    pub fn submit_button() -> Locator {
        Locator::css(".el-dialog__footer .el-button--primary")
    }

    pub async fn create_team(&self, name: &str, timeout: Duration) -> E2eResult<()> {
        open_dialog(self.page.as_ref(), &Self::create_button(), timeout).await?;
        self.page.fill(&Self::name_input(), name).await?;
        self.page.click(&Self::submit_button()).await?;
        expect_hidden(self.page.as_ref(), &dialog(), timeout).await
    }

    pub fn delete_button(name: &str) -> Locator {
        table_row(name).first().locate(Locator::role_named("button", "Delete"))
    }

    /// Refuses to click anything unless the team is actually listed
    pub async fn delete_team(&self, name: &str, timeout: Duration) -> E2eResult<()> {
        let row = table_row(name);
        if !self.page.is_visible(&row).await? {
            return Err(E2eError::assertion(format!("team {} is not listed", name)));
        }
        self.page.click(&Self::delete_button(name)).await?;
        self.page.click(&confirm_box_ok()).await?;
        expect_hidden(self.page.as_ref(), &row, timeout).await
    }

    pub async fn check_team_listed(&self, name: &str, timeout: Duration) -> E2eResult<()> {
        expect_visible(self.page.as_ref(), &table_row(name), timeout).await
    }

    pub async fn check_team_absent(&self, name: &str, timeout: Duration) -> E2eResult<()> {
        expect_hidden(self.page.as_ref(), &table_row(name), timeout).await
    }

    pub async fn check_toast(&self, text: &str, timeout: Duration) -> E2eResult<()> {
        expect_text_contains(self.page.as_ref(), &toast(), text, timeout).await
    }
}

impl Navigable for TeamsPage {
    fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    fn path(&self) -> &str {
        "/teams"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPage;

    #[tokio::test(start_paused = true)]
    async fn test_create_retries_opener_but_submits_once() {
        let mock = MockPage::new();
        mock.reveal_after(&TeamsPage::create_button(), 2, &dialog());
        let teams = TeamsPage::new(mock.clone());

        // dialog never closes in the mock, so the final wait fails
        assert!(teams.create_team("qa-team", Duration::from_secs(3)).await.is_err());
        assert_eq!(mock.clicks_on(&TeamsPage::create_button()), 2);
        assert_eq!(mock.clicks_on(&TeamsPage::submit_button()), 1);
    }

    #[tokio::test]
    async fn test_delete_requires_listed_team() {
        let mock = MockPage::new();
        let teams = TeamsPage::new(mock.clone());
        assert!(teams.delete_team("ghost", Duration::from_secs(1)).await.is_err());
        assert!(mock.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toast_and_absent_checks() {
        let mock = MockPage::new();
        mock.set_texts(&toast(), &["Team qa-team deleted"]);
        let teams = TeamsPage::new(mock.clone());

        teams.check_toast("deleted", Duration::from_secs(1)).await.unwrap();
        teams.check_team_absent("qa-team", Duration::from_secs(1)).await.unwrap();
        mock.set_visible(&table_row("qa-team"), true);
        assert!(teams.check_team_absent("qa-team", Duration::from_secs(1)).await.is_err());
    }
}
