use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::{E2eError, E2eResult};
use crate::lifecycle::{AuthMode, ScenarioContext};
use crate::pages::{BillingPage, Navigable};

/// Test-card field in the payment fixture
const GENERIC_DECLINE: &str = "generic";

pub fn declined_card_generic(ctx: &mut ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    async move {
        ctx.login(AuthMode::InjectedToken, "valid").await?;
        let payment = ctx.data.payment()?.clone();
        let card = ctx.data.declined_card(GENERIC_DECLINE)?.to_string();
        let expiry = payment.field("expiry")?;
        let cvc = payment.field("cvc")?;

        let invoices_before = ctx.api.list_invoices().await?.len();

        let billing = BillingPage::new(ctx.page.clone());
        billing.visit().await?;
        let rows_before = billing.invoice_count().await?;

        billing.submit_card(&card, expiry, cvc).await?;
        billing.check_card_declined(std::time::Duration::from_secs(10)).await?;
        billing.check_invoice_count(rows_before, ctx.timeout()).await?;

        let invoices_after = ctx.api.list_invoices().await?.len();
        if invoices_after != invoices_before {
            return Err(E2eError::assertion(format!(
                "declined card created an invoice: {} before, {} after",
                invoices_before, invoices_after
            )));
        }

        let last4 = &card[card.len().saturating_sub(4)..];
        let stored = ctx
            .api
            .list_payment_methods()
            .await?
            .into_iter()
            .find(|m| m.last4.as_deref() == Some(last4));
        if let Some(method) = stored {
            ctx.defer_cleanup(format!("delete card ending {}", last4), move |api| async move {
                api.delete_payment_method(&method.id).await
            });
            return Err(E2eError::assertion(format!("declined card ending {} was saved", last4)));
        }
        Ok(())
    }
    .boxed()
}
