//! Order listing parameters and page sorting.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use store::{OrderStatus, ParseEnumError};

use super::OrderView;

/// Default page size when none is given.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Field an order page can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Id,
    Status,
    StartTime,
    EndTime,
    TotalTime,
    TotalPrice,
}

impl SortKey {
    fn compare(&self, a: &OrderView, b: &OrderView) -> Ordering {
        match self {
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::Status => a.status.cmp(&b.status),
            // Display times share one format and offset, so text order is time order
            SortKey::StartTime => a.start_time.cmp(&b.start_time),
            SortKey::EndTime => a.end_time.cmp(&b.end_time),
            SortKey::TotalTime => a.total_time.cmp(&b.total_time),
            SortKey::TotalPrice => a.total_price.cmp(&b.total_price),
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(SortKey::Id),
            "status" => Ok(SortKey::Status),
            "start_time" | "start_date" => Ok(SortKey::StartTime),
            "end_time" | "end_date" => Ok(SortKey::EndTime),
            "total_time" | "totalTime" => Ok(SortKey::TotalTime),
            "total_price" | "totalPrice" => Ok(SortKey::TotalPrice),
            other => Err(ParseEnumError {
                kind: "sort key",
                value: other.to_string(),
            }),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ParseEnumError {
                kind: "sort order",
                value: other.to_string(),
            }),
        }
    }
}

/// Parameters of an order listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOrders {
    pub skip: usize,
    pub limit: usize,
    pub status: Option<OrderStatus>,
    pub sort_by: Vec<SortKey>,
    pub sort_order: SortOrder,
}

impl Default for ListOrders {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
            status: None,
            sort_by: Vec::new(),
            sort_order: SortOrder::default(),
        }
    }
}

impl ListOrders {
    /// Creates a listing of the first page with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of orders to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the page size.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Filters by status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sorts the page by these keys, most significant first.
    pub fn sort_by(mut self, keys: impl IntoIterator<Item = SortKey>, order: SortOrder) -> Self {
        self.sort_by = keys.into_iter().collect();
        self.sort_order = order;
        self
    }
}

/// A page of orders with the size of the filtered set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPage {
    pub total_count: u64,
    pub orders: Vec<OrderView>,
}

/// Sorts a materialized page in place.
///
/// Only the rows already on the page are reordered; pagination happens
/// first. Keys compare in sequence, the direction applies to every key, and
/// rows equal on all keys keep their page order.
pub fn sort_page(orders: &mut [OrderView], keys: &[SortKey], order: SortOrder) {
    if keys.is_empty() {
        return;
    }

    orders.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ordering = key.compare(a, b);
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}
