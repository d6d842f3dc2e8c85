use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::E2eResult;
use crate::lifecycle::{unique_name, AuthMode, ScenarioContext};
use crate::pages::{ApiKeysPage, Navigable, SshKeysPage};

const SSH_KEY_NAME: &str = "test-key";
const SSH_PUBLIC_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl e2e@portal.test";

pub fn ssh_key_create(ctx: &mut ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    async move {
        ctx.login(AuthMode::InjectedToken, "valid").await?;
        ctx.defer_cleanup(format!("delete SSH key {}", SSH_KEY_NAME), |api| async move {
            api.delete_ssh_key_by_name(SSH_KEY_NAME).await
        });

        let keys = SshKeysPage::new(ctx.page.clone());
        keys.visit().await?;
        keys.add_key(SSH_KEY_NAME, SSH_PUBLIC_KEY, ctx.timeout()).await?;
        keys.check_key_listed(SSH_KEY_NAME, ctx.timeout()).await
    }
    .boxed()
}

pub fn api_key_create_and_copy(ctx: &mut ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    async move {
        ctx.login(AuthMode::InjectedToken, "valid").await?;
        let name = unique_name("e2e-key");
        let cleanup_name = name.clone();
        ctx.defer_cleanup(format!("delete API key {}", name), |api| async move {
            api.delete_api_key_by_name(&cleanup_name).await
        });

        let keys = ApiKeysPage::new(ctx.page.clone());
        keys.visit().await?;
        keys.create_key(&name, ctx.timeout()).await?;
        keys.check_key_listed(&name, ctx.timeout()).await?;
        keys.copy_key(&name, ctx.timeout()).await
    }
    .boxed()
}
