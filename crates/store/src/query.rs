use chrono::{DateTime, Utc};

use crate::{OrderStatus, UserId};

/// Builder for constructing order listing queries.
///
/// Filters combine with AND. Results are ordered by start time, then id, and
/// the total count always refers to the filtered set before pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    /// Only orders assigned to this employee.
    pub employee_id: Option<UserId>,

    /// Only orders on vehicles owned by this customer.
    pub customer_id: Option<UserId>,

    /// Only orders in this status.
    pub status: Option<OrderStatus>,

    /// Only orders started at or after this instant.
    pub started_from: Option<DateTime<Utc>>,

    /// Only orders started strictly before this instant.
    pub started_before: Option<DateTime<Utc>>,

    /// Number of orders to skip.
    pub offset: Option<usize>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,
}

impl OrderQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for every in-progress order.
    pub fn in_progress() -> Self {
        Self {
            status: Some(OrderStatus::InProgress),
            ..Default::default()
        }
    }

    /// Filters by assigned employee.
    pub fn employee_id(mut self, id: UserId) -> Self {
        self.employee_id = Some(id);
        self
    }

    /// Filters by vehicle owner.
    pub fn customer_id(mut self, id: UserId) -> Self {
        self.customer_id = Some(id);
        self
    }

    /// Filters by status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters to orders started within `[from, before)`.
    pub fn started_between(mut self, from: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.started_from = Some(from);
        self.started_before = Some(before);
        self
    }

    /// Skips this many orders before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Limits the number of orders returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if the start time falls within the requested window.
    pub fn matches_start_time(&self, start_time: DateTime<Utc>) -> bool {
        if let Some(from) = self.started_from
            && start_time < from
        {
            return false;
        }
        if let Some(before) = self.started_before
            && start_time >= before
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn in_progress_query_sets_only_status() {
        let query = OrderQuery::in_progress();
        assert_eq!(query.status, Some(OrderStatus::InProgress));
        assert!(query.employee_id.is_none());
        assert!(query.limit.is_none());
    }

    #[test]
    fn query_builder_chain() {
        let employee = UserId::new();
        let query = OrderQuery::new()
            .employee_id(employee)
            .status(OrderStatus::Completed)
            .offset(20)
            .limit(10);

        assert_eq!(query.employee_id, Some(employee));
        assert_eq!(query.status, Some(OrderStatus::Completed));
        assert_eq!(query.offset, Some(20));
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn start_window_is_half_open() {
        let from = Utc::now();
        let before = from + Duration::days(1);
        let query = OrderQuery::new().started_between(from, before);

        assert!(query.matches_start_time(from));
        assert!(query.matches_start_time(before - Duration::seconds(1)));
        assert!(!query.matches_start_time(before));
        assert!(!query.matches_start_time(from - Duration::seconds(1)));
        assert!(OrderQuery::new().matches_start_time(from));
    }
}
