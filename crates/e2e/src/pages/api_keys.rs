//! API key management

use std::sync::Arc;
use std::time::Duration;

use super::{confirm_box_ok, dialog, open_dialog, table_row, toast, Navigable};
use crate::driver::{Locator, Page};
use crate::error::{E2eError, E2eResult};
use crate::expect::{expect_hidden, expect_text_contains, expect_visible};
use crate::retry::retry_until;

/// How long the copy toast is given inside a retry
const TRANSITION: Duration = Duration::from_millis(1500);

pub struct ApiKeysPage {
    page: Arc<dyn Page>,
}

impl ApiKeysPage {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn create_button() -> Locator {
        Locator::role_named("button", "Create API Key")
    }

    pub fn name_input() -> Locator {
        Locator::placeholder("Key name")
    }

    pub fn confirm_button() -> Locator {
        Locator::css(".el-dialog__footer .el-button--primary")
    }

    pub fn copy_icon(name: &str) -> Locator {
        table_row(name).first().locate(Locator::css(".copy-icon"))
    }

    pub fn delete_button(name: &str) -> Locator {
        table_row(name).first().locate(Locator::role_named("button", "Delete"))
    }

    pub async fn open_create_dialog(&self, timeout: Duration) -> E2eResult<()> {
        open_dialog(self.page.as_ref(), &Self::create_button(), timeout).await
    }

    /// Submits once; the confirm click is not retried
    pub async fn create_key(&self, name: &str, timeout: Duration) -> E2eResult<()> {
        self.open_create_dialog(timeout).await?;
        self.page.fill(&Self::name_input(), name).await?;
        self.page.click(&Self::confirm_button()).await?;
        expect_hidden(self.page.as_ref(), &dialog(), timeout).await
    }

    pub async fn copy_key(&self, name: &str, timeout: Duration) -> E2eResult<()> {
        let page = self.page.as_ref();
        let icon = Self::copy_icon(name);
        let icon = &icon;
        retry_until(timeout, || async move {
            page.click(icon).await?;
            expect_text_contains(page, &toast(), "Copied", TRANSITION).await
        })
        .await
    }

    pub async fn delete_key(&self, name: &str, timeout: Duration) -> E2eResult<()> {
        let row = table_row(name);
        if !self.page.is_visible(&row).await? {
            return Err(E2eError::assertion(format!("API key {} is not listed", name)));
        }
        self.page.click(&Self::delete_button(name)).await?;
        self.page.click(&confirm_box_ok()).await?;
        expect_hidden(self.page.as_ref(), &row, timeout).await
    }

    pub async fn check_key_listed(&self, name: &str, timeout: Duration) -> E2eResult<()> {
        expect_visible(self.page.as_ref(), &table_row(name), timeout).await
    }

    pub async fn check_key_absent(&self, name: &str, timeout: Duration) -> E2eResult<()> {
        expect_hidden(self.page.as_ref(), &table_row(name), timeout).await
    }
}

impl Navigable for ApiKeysPage {
    fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    fn path(&self) -> &str {
        "/api-keys"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPage;

    #[tokio::test(start_paused = true)]
    async fn test_open_dialog_retries_until_it_appears() {
        let mock = MockPage::new();
        mock.reveal_after(&ApiKeysPage::create_button(), 3, &dialog());
        let keys = ApiKeysPage::new(mock.clone());

        keys.open_create_dialog(Duration::from_secs(10)).await.unwrap();
        assert_eq!(mock.clicks_on(&ApiKeysPage::create_button()), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_key_submits_once() {
        let mock = MockPage::new();
        mock.set_visible(&dialog(), true);
        let keys = ApiKeysPage::new(mock.clone());

        // dialog never closes, so the final check fails, but confirm is clicked once
        let err = keys.create_key("ci-key", Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, E2eError::AssertionFailed(_)));
        assert_eq!(mock.clicks_on(&ApiKeysPage::confirm_button()), 1);
        assert_eq!(mock.input_value(&ApiKeysPage::name_input()).await.unwrap(), "ci-key");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_requires_listed_key() {
        let mock = MockPage::new();
        let keys = ApiKeysPage::new(mock.clone());
        let err = keys.delete_key("ghost", Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("ghost"));
        assert!(mock.clicks().is_empty());
        keys.check_key_absent("ghost", Duration::from_secs(1)).await.unwrap();
    }
}
