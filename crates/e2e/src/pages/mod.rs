//! Page objects
//!
//! One struct per screen. Each holds the shared page handle plus its own
//! locators, and exposes intent-named actions (`create_key`) separately from
//! checks (`check_key_listed`) so scenario steps read and fail by name.
//! Generic navigation lives on [`Navigable`]; there is no deeper hierarchy.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::driver::{Locator, Page};
use crate::error::E2eResult;
use crate::expect::expect_visible;
use crate::retry::retry_until;

pub mod api_keys;
pub mod audit_log;
pub mod billing;
pub mod login;
pub mod serverless;
pub mod ssh_keys;
pub mod teams;

pub use api_keys::ApiKeysPage;
pub use audit_log::AuditLogPage;
pub use billing::BillingPage;
pub use login::LoginPage;
pub use serverless::ServerlessPage;
pub use ssh_keys::SshKeysPage;
pub use teams::TeamsPage;

/// Navigation shared by every page object
#[async_trait]
pub trait Navigable: Send + Sync {
    fn page(&self) -> &dyn Page;

    /// Route relative to the portal base URL
    fn path(&self) -> &str;

    async fn visit(&self) -> E2eResult<()> {
        self.page().goto(self.path()).await?;
        self.page().wait_for_load().await
    }

    async fn wait_for_load(&self) -> E2eResult<()> {
        self.page().wait_for_load().await
    }

    async fn title(&self) -> E2eResult<String> {
        self.page().title().await
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        self.page().screenshot(path, true).await
    }
}

// Element Plus widgets shared across screens

pub(crate) fn dialog() -> Locator {
    Locator::css(".el-dialog")
}

pub(crate) fn toast() -> Locator {
    Locator::css(".el-message")
}

pub(crate) fn confirm_box_ok() -> Locator {
    Locator::css(".el-message-box__btns .el-button--primary")
}

pub(crate) fn table_row(text: &str) -> Locator {
    Locator::css(".el-table__row").with_text(text)
}

/// One open transition inside a retry
const DIALOG_TRANSITION: Duration = Duration::from_secs(2);

/// Click `opener` until the dialog shows. Once the dialog is visible, even
/// mid-animation, the opener sits behind its overlay and is not clicked again.
pub(crate) async fn open_dialog(page: &dyn Page, opener: &Locator, timeout: Duration) -> E2eResult<()> {
    retry_until(timeout, || async move {
        if !page.is_visible(&dialog()).await? {
            page.click(opener).await?;
        }
        expect_visible(page, &dialog(), DIALOG_TRANSITION).await
    })
    .await
}
