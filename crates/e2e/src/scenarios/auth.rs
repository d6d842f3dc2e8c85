use futures::future::BoxFuture;
use futures::FutureExt;
use regex::Regex;

use crate::error::E2eResult;
use crate::expect::expect_url_matches;
use crate::lifecycle::{ScenarioContext, LOGIN_TIMEOUT};
use crate::pages::{LoginPage, Navigable, ServerlessPage};

pub fn login_redirects_to_serverless(ctx: &mut ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    async move {
        let creds = ctx.data.group("valid")?.clone();
        let username = creds.username()?;

        let login = LoginPage::new(ctx.page.clone());
        login.visit().await?;
        login.login(&creds.email, &creds.password).await?;
        login.check_logged_in(username, LOGIN_TIMEOUT).await?;

        ServerlessPage::new(ctx.page.clone()).check_ui(ctx.timeout()).await
    }
    .boxed()
}

pub fn invalid_login_shows_error(ctx: &mut ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    async move {
        let creds = ctx.data.group("invalid")?.clone();

        let login = LoginPage::new(ctx.page.clone());
        login.visit().await?;
        login.login(&creds.email, &creds.password).await?;
        login.check_login_rejected(ctx.timeout()).await?;

        let still_on_login = Regex::new(r"/login")?;
        expect_url_matches(ctx.page.as_ref(), &still_on_login, ctx.timeout()).await
    }
    .boxed()
}
