/// Page-shaped results over a fetch function and a count function
///
/// [`paginate`] normalizes the requested page, asks the caller for one page of
/// rows (`limit`, `offset`) and for the total row count, and assembles a
/// [`Page`]. An empty result serializes as `"data": []`, never `null`.
///
/// # Example
///
/// ```no_run
/// use campaign_shared::models::campaign::Campaign;
/// use campaign_shared::pagination::{paginate, PageRequest};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let page = paginate(
///     PageRequest::new(Some(2), Some(10)),
///     |limit, offset| Campaign::list_public(&pool, limit, offset),
///     Campaign::count_public(&pool),
/// )
/// .await?;
/// println!("{} of {}", page.data.len(), page.meta.total_items);
/// # Ok(())
/// # }
/// ```

use std::future::Future;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;

/// Requested page, typically deserialized from the query string
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageRequest {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self { page, per_page }
    }

    /// 1-based page; missing or non-positive values become 1
    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE)
    }

    /// Page size; missing or non-positive values become 10, large ones are capped at 100
    pub fn per_page(&self) -> i64 {
        self.per_page
            .filter(|n| *n >= 1)
            .unwrap_or(DEFAULT_PER_PAGE)
            .min(MAX_PER_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.per_page()
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }
}

/// Navigation data returned beside every page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub per_page: i64,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
}

impl PageMeta {
    pub fn new(request: &PageRequest, total_items: i64) -> Self {
        let per_page = request.per_page();

        if total_items <= 0 {
            return Self {
                current_page: 1,
                total_pages: 1,
                total_items: 0,
                per_page,
                next_page: None,
                prev_page: None,
            };
        }

        let current_page = request.page();
        let total_pages = (total_items + per_page - 1) / per_page;

        Self {
            current_page,
            total_pages,
            total_items,
            per_page,
            next_page: (current_page < total_pages).then(|| current_page + 1),
            prev_page: (current_page > 1).then(|| current_page - 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// Runs `fetch(limit, offset)` and `count` together and builds the page
pub async fn paginate<T, E, F, FetchFut, CountFut>(request: PageRequest, fetch: F, count: CountFut) -> Result<Page<T>, E>
where
    F: FnOnce(i64, i64) -> FetchFut,
    FetchFut: Future<Output = Result<Vec<T>, E>>,
    CountFut: Future<Output = Result<i64, E>>,
{
    let (data, total) = futures::try_join!(fetch(request.limit(), request.offset()), count)?;

    Ok(Page {
        data,
        meta: PageMeta::new(&request, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn rows(total: i64, limit: i64, offset: i64) -> Result<Vec<i64>, ()> {
        Ok((offset..total).take(limit as usize).collect())
    }

    #[test]
    fn test_request_defaults_and_normalization() {
        let empty = PageRequest::default();
        assert_eq!((empty.page(), empty.per_page(), empty.offset()), (1, 10, 0));

        let negative = PageRequest::new(Some(-3), Some(0));
        assert_eq!((negative.page(), negative.per_page()), (1, 10));

        let huge = PageRequest::new(Some(3), Some(10_000));
        assert_eq!(huge.per_page(), MAX_PER_PAGE);
        assert_eq!(huge.offset(), 200);
    }

    #[tokio::test]
    async fn test_empty_result() {
        let page = paginate(PageRequest::new(Some(4), Some(10)), |l, o| rows(0, l, o), async { Ok(0) })
            .await
            .unwrap();

        assert!(page.data.is_empty());
        assert_eq!(
            page.meta,
            PageMeta {
                current_page: 1,
                total_pages: 1,
                total_items: 0,
                per_page: 10,
                next_page: None,
                prev_page: None,
            }
        );

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["data"], serde_json::json!([]));
        assert!(json["meta"]["next_page"].is_null());
    }

    #[tokio::test]
    async fn test_middle_page() {
        let page = paginate(PageRequest::new(Some(2), Some(10)), |l, o| rows(25, l, o), async { Ok(25) })
            .await
            .unwrap();

        assert_eq!(page.data, (10..20).collect::<Vec<_>>());
        assert_eq!(page.meta.total_pages, 3);
        assert_eq!(page.meta.next_page, Some(3));
        assert_eq!(page.meta.prev_page, Some(1));
    }

    #[tokio::test]
    async fn test_last_page_has_no_next() {
        let page = paginate(PageRequest::new(Some(3), Some(10)), |l, o| rows(25, l, o), async { Ok(25) })
            .await
            .unwrap();

        assert_eq!(page.data.len(), 5);
        assert_eq!(page.meta.next_page, None);
        assert_eq!(page.meta.prev_page, Some(2));
    }

    #[tokio::test]
    async fn test_single_page() {
        let meta = PageMeta::new(&PageRequest::default(), 10);
        assert_eq!((meta.total_pages, meta.next_page, meta.prev_page), (1, None, None));
    }

    #[tokio::test]
    async fn test_count_error_propagates() {
        let result = paginate(PageRequest::default(), |l, o| rows(5, l, o), async { Err::<i64, ()>(()) }).await;
        assert!(result.is_err());
    }
}
