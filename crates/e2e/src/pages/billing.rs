//! Billing: payment methods, card entry, invoices

use std::sync::Arc;
use std::time::Duration;

use super::{confirm_box_ok, open_dialog, table_row, Navigable};
use crate::driver::{Locator, Page};
use crate::error::{E2eError, E2eResult};
use crate::expect::{expect_count, expect_hidden, expect_text_contains, expect_visible};

/// Payment-provider round trips are slow
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

const CARD_FRAME: &str = "iframe[name^=\"__privateStripeFrame\"]";

pub struct BillingPage {
    page: Arc<dyn Page>,
}

impl BillingPage {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn add_card_button() -> Locator {
        Locator::role_named("button", "Add Payment Method")
    }

    pub fn card_number_input() -> Locator {
        Locator::in_frame(CARD_FRAME, Locator::placeholder("Card number"))
    }

    pub fn expiry_input() -> Locator {
        Locator::in_frame(CARD_FRAME, Locator::placeholder("MM / YY"))
    }

    pub fn cvc_input() -> Locator {
        Locator::in_frame(CARD_FRAME, Locator::placeholder("CVC"))
    }

    pub fn save_card_button() -> Locator {
        Locator::css(".el-dialog__footer .el-button--primary")
    }

    pub fn card_error() -> Locator {
        Locator::css(".card-error, .el-message--error")
    }

    pub fn invoice_rows() -> Locator {
        Locator::css(".invoice-table .el-table__row")
    }

    pub fn card_row(last4: &str) -> Locator {
        table_row(&format!("•••• {}", last4))
    }

    pub async fn open_add_card(&self, timeout: Duration) -> E2eResult<()> {
        open_dialog(self.page.as_ref(), &Self::add_card_button(), timeout).await
    }

    /// Fill the card form and submit it once
    pub async fn submit_card(&self, number: &str, expiry: &str, cvc: &str) -> E2eResult<()> {
        self.open_add_card(Duration::from_secs(15)).await?;
        self.page.fill(&Self::card_number_input(), number).await?;
        self.page.fill(&Self::expiry_input(), expiry).await?;
        self.page.fill(&Self::cvc_input(), cvc).await?;
        self.page.click(&Self::save_card_button()).await
    }

    pub async fn invoice_count(&self) -> E2eResult<usize> {
        self.page.count(&Self::invoice_rows()).await
    }

    pub async fn delete_specific_card(&self, last4: &str, timeout: Duration) -> E2eResult<()> {
        let row = Self::card_row(last4);
        if !self.page.is_visible(&row).await? {
            return Err(E2eError::assertion(format!("card ending {} is not listed", last4)));
        }
        self.page
            .click(&row.clone().first().locate(Locator::role_named("button", "Delete")))
            .await?;
        self.page.click(&confirm_box_ok()).await?;
        expect_hidden(self.page.as_ref(), &row, timeout).await
    }

    pub async fn check_card_declined(&self, timeout: Duration) -> E2eResult<()> {
        expect_text_contains(self.page.as_ref(), &Self::card_error(), "card was declined", timeout).await
    }

    pub async fn check_card_listed(&self, last4: &str, timeout: Duration) -> E2eResult<()> {
        expect_visible(self.page.as_ref(), &Self::card_row(last4), timeout).await
    }

    pub async fn check_invoice_count(&self, expected: usize, timeout: Duration) -> E2eResult<()> {
        expect_count(self.page.as_ref(), &Self::invoice_rows(), expected, timeout).await
    }
}

impl Navigable for BillingPage {
    fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    fn path(&self) -> &str {
        "/billing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPage;
    use crate::pages::dialog;

    #[tokio::test(start_paused = true)]
    async fn test_submit_card_fills_provider_frame() {
        let mock = MockPage::new();
        mock.set_visible(&dialog(), true);
        let billing = BillingPage::new(mock.clone());

        billing.submit_card("4000000000000002", "12/34", "123").await.unwrap();

        let fills = mock.fills();
        assert_eq!(fills.len(), 3);
        assert!(fills[0].0.contains("__privateStripeFrame"));
        assert_eq!(fills[0].1, "4000000000000002");
        assert_eq!(mock.clicks_on(&BillingPage::save_card_button()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_declined_message() {
        let mock = MockPage::new();
        mock.set_texts(&BillingPage::card_error(), &["Your card was declined."]);
        let billing = BillingPage::new(mock.clone());
        billing.check_card_declined(Duration::from_secs(10)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_card_refuses_unlisted_card() {
        let mock = MockPage::new();
        let billing = BillingPage::new(mock.clone());

        let err = billing.delete_specific_card("0002", Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("card ending 0002 is not listed"));
        assert!(mock.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_listed_card_confirms_once() {
        let mock = MockPage::new();
        mock.set_visible(&BillingPage::card_row("4242"), true);
        let billing = BillingPage::new(mock.clone());
        billing.check_card_listed("4242", Duration::from_secs(1)).await.unwrap();

        // the row never disappears in the mock
        assert!(billing.delete_specific_card("4242", Duration::from_secs(1)).await.is_err());
        assert_eq!(mock.clicks().len(), 2);
        assert_eq!(mock.clicks_on(&confirm_box_ok()), 1);
    }
}
