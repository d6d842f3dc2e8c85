//! SSH keys used when launching GPU instances

use std::sync::Arc;
use std::time::Duration;

use super::{dialog, open_dialog, table_row, Navigable};
use crate::driver::{Locator, Page};
use crate::error::E2eResult;
use crate::expect::{expect_hidden, expect_visible};

pub struct SshKeysPage {
    page: Arc<dyn Page>,
}

impl SshKeysPage {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn add_button() -> Locator {
        Locator::role_named("button", "Add SSH Key")
    }

    pub fn name_input() -> Locator {
        Locator::placeholder("Key name")
    }

    pub fn public_key_input() -> Locator {
        Locator::placeholder("ssh-rsa AAAA...")
    }

    pub fn save_button() -> Locator {
        Locator::css(".el-dialog__footer .el-button--primary")
    }

    pub async fn add_key(&self, name: &str, public_key: &str, timeout: Duration) -> E2eResult<()> {
        open_dialog(self.page.as_ref(), &Self::add_button(), timeout).await?;
        self.page.fill(&Self::name_input(), name).await?;
        self.page.fill(&Self::public_key_input(), public_key).await?;
        self.page.click(&Self::save_button()).await?;
        expect_hidden(self.page.as_ref(), &dialog(), timeout).await
    }

    pub async fn check_key_listed(&self, name: &str, timeout: Duration) -> E2eResult<()> {
        expect_visible(self.page.as_ref(), &table_row(name), timeout).await
    }
}

impl Navigable for SshKeysPage {
    fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    fn path(&self) -> &str {
        "/ssh-keys"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPage;

    #[tokio::test(start_paused = true)]
    async fn test_add_key_fills_and_saves_once() {
        let mock = MockPage::new();
        mock.reveal_after(&SshKeysPage::add_button(), 1, &dialog());
        let keys = SshKeysPage::new(mock.clone());

        // dialog stays open in the mock, so the close wait fails after saving
        assert!(keys.add_key("test-key", "ssh-ed25519 AAAA", Duration::from_secs(3)).await.is_err());
        assert_eq!(mock.clicks_on(&SshKeysPage::add_button()), 1);
        assert_eq!(mock.clicks_on(&SshKeysPage::save_button()), 1);
        assert_eq!(mock.fills().len(), 2);
    }
}
