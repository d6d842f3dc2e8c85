use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::E2eResult;
use crate::lifecycle::{AuthMode, ScenarioContext};
use crate::pages::audit_log::{cards_on_page, last_page};
use crate::pages::{AuditLogPage, Navigable};

const PAGE_SIZE: u32 = 20;

pub fn audit_log_pagination(ctx: &mut ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    async move {
        ctx.login(AuthMode::InjectedToken, "valid").await?;
        let total = ctx.api.audit_logs(1, PAGE_SIZE).await?.pagination.total;

        let audit = AuditLogPage::new(ctx.page.clone());
        audit.visit().await?;
        audit.set_page_size(PAGE_SIZE, ctx.timeout()).await?;

        audit
            .check_cards_per_page(cards_on_page(total, PAGE_SIZE, 1), ctx.timeout())
            .await?;
        audit.check_pagination(total, PAGE_SIZE, ctx.timeout()).await?;

        let last = last_page(total, PAGE_SIZE);
        let mut visited = vec![2, last];
        visited.dedup();
        for number in visited.into_iter().filter(|n| (2..=last).contains(n)) {
            audit.go_to_page(number).await?;
            audit
                .check_cards_per_page(cards_on_page(total, PAGE_SIZE, number), ctx.timeout())
                .await?;
        }
        Ok(())
    }
    .boxed()
}
