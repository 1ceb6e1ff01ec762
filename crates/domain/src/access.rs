//! Access control for authenticated callers.

use serde::{Deserialize, Serialize};
use store::{OrderQuery, Role, UserId};
use thiserror::Error;

/// Errors raised when a caller is not allowed to act.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// No principal accompanied the request.
    #[error("Authentication required")]
    Unauthenticated,

    /// The principal's role does not permit the action.
    #[error("Role {role} may not {action}")]
    Forbidden { role: Role, action: &'static str },
}

/// An authenticated principal supplied by the upstream auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    /// Creates a caller.
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Fails with `Forbidden` unless the caller holds one of `allowed`.
    pub fn require(&self, allowed: &[Role], action: &'static str) -> Result<(), AccessError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AccessError::Forbidden {
                role: self.role,
                action,
            })
        }
    }

    /// Fails with `Forbidden` unless the caller is an administrator.
    pub fn require_administrator(&self, action: &'static str) -> Result<(), AccessError> {
        self.require(&[Role::Administrator], action)
    }

    /// Restricts an order query to the rows this caller may see.
    ///
    /// Employees see orders assigned to them, customers see orders on
    /// vehicles they own, administrators see everything.
    pub fn scope(&self, query: OrderQuery) -> OrderQuery {
        match self.role {
            Role::Administrator => query,
            Role::Employee => query.employee_id(self.user_id),
            Role::Customer => query.customer_id(self.user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_accepts_listed_roles() {
        let employee = Caller::new(UserId::new(), Role::Employee);
        assert!(employee.require(&[Role::Administrator, Role::Employee], "list").is_ok());
        assert_eq!(
            employee.require_administrator("delete orders"),
            Err(AccessError::Forbidden {
                role: Role::Employee,
                action: "delete orders"
            })
        );
    }

    #[test]
    fn test_scope_by_role() {
        let user_id = UserId::new();

        let admin = Caller::new(user_id, Role::Administrator).scope(OrderQuery::new());
        assert_eq!(admin, OrderQuery::new());

        let employee = Caller::new(user_id, Role::Employee).scope(OrderQuery::new());
        assert_eq!(employee.employee_id, Some(user_id));
        assert!(employee.customer_id.is_none());

        let customer = Caller::new(user_id, Role::Customer).scope(OrderQuery::new());
        assert_eq!(customer.customer_id, Some(user_id));
        assert!(customer.employee_id.is_none());
    }
}
