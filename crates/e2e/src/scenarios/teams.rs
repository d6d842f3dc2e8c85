use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::E2eResult;
use crate::lifecycle::{unique_name, AuthMode, ScenarioContext};
use crate::pages::{Navigable, TeamsPage};

pub fn team_create_and_delete(ctx: &mut ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    async move {
        ctx.login(AuthMode::InjectedToken, "valid").await?;
        let name = unique_name("e2e-team");
        // safety net if the UI delete below never happens
        let cleanup_name = name.clone();
        ctx.defer_cleanup(format!("delete team {}", name), |api| async move {
            api.delete_team_by_name(&cleanup_name).await
        });

        let teams = TeamsPage::new(ctx.page.clone());
        teams.visit().await?;
        teams.create_team(&name, ctx.timeout()).await?;
        teams.check_team_listed(&name, ctx.timeout()).await?;

        teams.delete_team(&name, ctx.timeout()).await?;
        teams.check_team_absent(&name, ctx.timeout()).await
    }
    .boxed()
}
