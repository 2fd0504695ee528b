//! Page-number pagination shared by every listing surface. `page` is
//! 1-based; `pages` is `ceil(total / limit)`, floored at 1 so an empty
//! result set still reports one (empty) page.

/// Normalizes an optional `(page, limit)` pair into a Postgres-ready
/// `(limit, offset)` plus the page count a response envelope reports back.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// `page` defaults to 1 and is clamped to at least 1; `limit` defaults
    /// to `default_limit` and is clamped to `[1, max_limit]`.
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    pub fn limit_i64(&self) -> i64 {
        self.limit as i64
    }

    /// `ceil(total / limit)`, floored at 1.
    pub fn total_pages(&self, total: i64) -> u32 {
        if total <= 0 {
            return 1;
        }
        let limit = self.limit as i64;
        (((total + limit - 1) / limit) as u32).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamps() {
        let p = Pagination::new(None, None, 10, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 10);
        assert_eq!(p.offset(), 0);

        let p = Pagination::new(Some(0), Some(0), 10, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 1);

        let p = Pagination::new(Some(3), Some(500), 10, 100);
        assert_eq!(p.limit, 100);
        assert_eq!(p.offset(), 200);
    }

    #[test]
    fn total_pages_ceils_and_floors_at_one() {
        let p = Pagination::new(Some(1), Some(10), 10, 100);
        assert_eq!(p.total_pages(0), 1);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(11), 2);
        assert_eq!(p.total_pages(100), 10);
    }

    #[test]
    fn page_past_the_end_still_reports_the_true_total() {
        let p = Pagination::new(Some(99), Some(10), 10, 100);
        assert_eq!(p.total_pages(3), 1);
        assert_eq!(p.offset(), 980);
    }
}
