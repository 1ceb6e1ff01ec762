//! Order status and user role vocabularies shared by every layer.

use serde::{Deserialize, Serialize};

/// Error returned when a stored or transmitted enum label is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// The state of a wash order.
///
/// State transitions:
/// ```text
/// InProgress ──(end_time elapsed, observed by a sweep)──► Completed
/// ```
/// There is no way back: a completed order is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Services may still be attached; completion not yet observed.
    #[default]
    InProgress,

    /// The end time elapsed and a sweep recorded it (terminal state).
    Completed,
}

impl OrderStatus {
    /// Returns true if services can be attached in this state.
    pub fn can_add_services(&self) -> bool {
        matches!(self, OrderStatus::InProgress)
    }

    /// Returns true if a sweep may complete an order in this state.
    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::InProgress)
    }

    /// Returns the storage label.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
        }
    }

    /// Returns the numeric code used by clients (1 = in progress, 2 = completed).
    pub fn code(&self) -> i32 {
        match self {
            OrderStatus::InProgress => 1,
            OrderStatus::Completed => 2,
        }
    }

    /// Resolves a numeric client code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(OrderStatus::InProgress),
            2 => Some(OrderStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(OrderStatus::InProgress),
            "completed" => Ok(OrderStatus::Completed),
            other => Err(ParseEnumError {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Employee,
    Customer,
}

impl Role {
    /// Returns the storage label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Employee => "employee",
            Role::Customer => "customer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "administrator" => Ok(Role::Administrator),
            "employee" => Ok(Role::Employee),
            "customer" => Ok(Role::Customer),
            other => Err(ParseEnumError {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}
