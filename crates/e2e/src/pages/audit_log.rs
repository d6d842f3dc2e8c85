//! Audit log list with Element Plus pagination

use std::sync::Arc;
use std::time::Duration;

use super::Navigable;
use crate::driver::{Locator, Page};
use crate::error::{E2eError, E2eResult};
use crate::expect::{expect_count, expect_hidden, expect_visible};
use crate::retry::retry_until;

pub struct AuditLogPage {
    page: Arc<dyn Page>,
}

/// Last page number for `total` entries; an empty list still shows page 1
pub fn last_page(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    let pages = total.div_ceil(page_size as u64);
    pages.max(1) as u32
}

/// Cards rendered on `page`: full pages up to a possibly partial last one
pub fn cards_on_page(total: u64, page_size: u32, page: u32) -> usize {
    let before = page.saturating_sub(1) as u64 * page_size as u64;
    total.saturating_sub(before).min(page_size as u64) as usize
}

/// Page buttons that must always be offered: page 1 and the last page
pub fn pagination_pages(total: u64, page_size: u32) -> Vec<u32> {
    let last = last_page(total, page_size);
    if last == 1 {
        vec![1]
    } else {
        vec![1, last]
    }
}

impl AuditLogPage {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn cards() -> Locator {
        Locator::css(".audit-log-card")
    }

    pub fn pager_items() -> Locator {
        Locator::css(".el-pagination .el-pager li")
    }

    pub fn page_size_select() -> Locator {
        Locator::css(".el-pagination__sizes .el-select")
    }

    pub fn page_size_option(size: u32) -> Locator {
        Locator::css(".el-select-dropdown__item").with_text(format!("{}/page", size))
    }

    /// The select toggles on click, so it is only clicked while closed
    pub async fn set_page_size(&self, size: u32, timeout: Duration) -> E2eResult<()> {
        let page = self.page.as_ref();
        let option = Self::page_size_option(size);
        let option = &option;
        retry_until(timeout, || async move {
            if !page.is_visible(option).await? {
                page.click(&Self::page_size_select()).await?;
            }
            expect_visible(page, option, Duration::from_secs(2)).await?;
            page.click(option).await?;
            expect_hidden(page, option, Duration::from_secs(2)).await
        })
        .await
    }

    pub async fn go_to_page(&self, number: u32) -> E2eResult<()> {
        self.page
            .click(&Self::pager_items().locate(Locator::exact_text(number.to_string())))
            .await
    }

    /// Page numbers currently rendered in the pager (ellipses skipped)
    pub async fn page_numbers(&self) -> E2eResult<Vec<u32>> {
        let texts = self.page.inner_texts(&Self::pager_items()).await?;
        Ok(texts.iter().filter_map(|t| t.trim().parse().ok()).collect())
    }

    pub async fn check_cards_per_page(&self, expected: usize, timeout: Duration) -> E2eResult<()> {
        expect_count(self.page.as_ref(), &Self::cards(), expected, timeout).await
    }

    /// Page 1 and the computed last page must both be offered
    pub async fn check_pagination(&self, total: u64, page_size: u32, timeout: Duration) -> E2eResult<()> {
        let expected = pagination_pages(total, page_size);
        let expected = &expected;
        retry_until(timeout, || async move {
            let numbers = self.page_numbers().await?;
            if expected.iter().all(|p| numbers.contains(p)) {
                Ok(())
            } else {
                Err(E2eError::assertion(format!(
                    "expected pager to show pages {:?}, got {:?}",
                    expected, numbers
                )))
            }
        })
        .await
    }
}

impl Navigable for AuditLogPage {
    fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    fn path(&self) -> &str {
        "/audit-logs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPage;
    use test_case::test_case;

    #[test_case(0, 20, 1 ; "empty list")]
    #[test_case(20, 20, 1 ; "exactly one page")]
    #[test_case(21, 20, 2 ; "one spill-over entry")]
    #[test_case(45, 20, 3 ; "partial last page")]
    #[test_case(5, 0, 1 ; "zero page size")]
    fn test_last_page(total: u64, page_size: u32, expected: u32) {
        assert_eq!(last_page(total, page_size), expected);
    }

    #[test_case(45, 20, 1, 20 ; "first page full")]
    #[test_case(45, 20, 2, 20 ; "middle page full")]
    #[test_case(45, 20, 3, 5 ; "last page remainder")]
    #[test_case(40, 20, 2, 20 ; "last page exactly full")]
    #[test_case(7, 20, 1, 7 ; "short single page")]
    #[test_case(7, 20, 2, 0 ; "past the end")]
    fn test_cards_on_page(total: u64, page_size: u32, page: u32, expected: usize) {
        assert_eq!(cards_on_page(total, page_size, page), expected);
    }

    #[test]
    fn test_pagination_pages() {
        assert_eq!(pagination_pages(0, 20), vec![1]);
        assert_eq!(pagination_pages(20, 20), vec![1]);
        assert_eq!(pagination_pages(235, 20), vec![1, 12]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_numbers_skip_ellipsis() {
        let mock = MockPage::new();
        mock.set_texts(&AuditLogPage::pager_items(), &["1", "2", "3", "", "12"]);
        let audit = AuditLogPage::new(mock.clone());

        assert_eq!(audit.page_numbers().await.unwrap(), vec![1, 2, 3, 12]);
        audit.check_pagination(235, 20, Duration::from_secs(1)).await.unwrap();
        assert!(audit.check_pagination(400, 20, Duration::from_millis(300)).await.is_err());
    }

    #[tokio::test]
    async fn test_go_to_page_clicks_the_numbered_button() {
        let mock = MockPage::new();
        let audit = AuditLogPage::new(mock.clone());
        audit.go_to_page(3).await.unwrap();
        let button = AuditLogPage::pager_items().locate(Locator::exact_text("3"));
        assert_eq!(mock.clicks_on(&button), 1);
        assert_eq!(mock.clicks().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_page_size_opens_closed_select_only() {
        let mock = MockPage::new();
        let option = AuditLogPage::page_size_option(20);
        mock.reveal_after(&AuditLogPage::page_size_select(), 1, &option);
        let audit = AuditLogPage::new(mock.clone());

        // option stays visible in the mock, so the close check keeps failing
        let result = audit.set_page_size(20, Duration::from_secs(3)).await;
        assert!(result.is_err());
        assert_eq!(mock.clicks_on(&AuditLogPage::page_size_select()), 1);
        assert!(mock.clicks_on(&option) > 1);
    }
}
