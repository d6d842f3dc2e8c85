//! Polling assertions
//!
//! Condition-based waits built on the driver's own waiting where it has one
//! and on [`retry_until`] where it does not. Failures come back as
//! `AssertionFailed` carrying the last observed value.

use std::time::Duration;

use regex::Regex;

use crate::driver::{Locator, Page, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::retry::retry_until;

pub async fn expect_visible(page: &dyn Page, locator: &Locator, timeout: Duration) -> E2eResult<()> {
    expect_state(page, locator, WaitState::Visible, timeout).await
}

pub async fn expect_hidden(page: &dyn Page, locator: &Locator, timeout: Duration) -> E2eResult<()> {
    expect_state(page, locator, WaitState::Hidden, timeout).await
}

async fn expect_state(page: &dyn Page, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()> {
    page.wait_for(locator, state, timeout).await.map_err(|e| match e {
        E2eError::Timeout(_) => E2eError::assertion(format!(
            "expected {} to be {} within {}ms",
            locator,
            state.as_str(),
            timeout.as_millis()
        )),
        other => other,
    })
}

pub async fn expect_text_contains(
    page: &dyn Page,
    locator: &Locator,
    expected: &str,
    timeout: Duration,
) -> E2eResult<()> {
    retry_until(timeout, || async move {
        let texts = page.inner_texts(locator).await?;
        if texts.iter().any(|t| t.contains(expected)) {
            Ok(())
        } else {
            Err(E2eError::assertion(format!(
                "expected {} to contain {:?}, got {:?}",
                locator, expected, texts
            )))
        }
    })
    .await
}

pub async fn expect_count(page: &dyn Page, locator: &Locator, expected: usize, timeout: Duration) -> E2eResult<()> {
    retry_until(timeout, || async move {
        let actual = page.count(locator).await?;
        if actual == expected {
            Ok(())
        } else {
            Err(E2eError::assertion(format!(
                "expected {} matches for {}, got {}",
                expected, locator, actual
            )))
        }
    })
    .await
}

pub async fn expect_url_matches(page: &dyn Page, pattern: &Regex, timeout: Duration) -> E2eResult<()> {
    retry_until(timeout, || async move {
        let url = page.url().await?;
        if pattern.is_match(&url) {
            Ok(())
        } else {
            Err(E2eError::assertion(format!(
                "expected URL to match /{}/, got {}",
                pattern.as_str(),
                url
            )))
        }
    })
    .await
}

pub async fn expect_attribute(
    page: &dyn Page,
    locator: &Locator,
    name: &str,
    expected: &str,
    timeout: Duration,
) -> E2eResult<()> {
    retry_until(timeout, || async move {
        let actual = page.get_attribute(locator, name).await?;
        if actual.as_deref() == Some(expected) {
            Ok(())
        } else {
            Err(E2eError::assertion(format!(
                "expected {}[{}] = {:?}, got {:?}",
                locator, name, expected, actual
            )))
        }
    })
    .await
}
